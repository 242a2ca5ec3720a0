//! Integration tests for the devout soundcard output
//!
//! Test categories:
//! - Timing: tempo to note offset, loop wrap, events
//! - ALSA: negotiation, device fallback, underrun/suspend recovery
//! - GStreamer: callback rendezvous, stop while parked
//! - Ring: concurrent sub-block writers, buffer rotation
//!
//! Run with:
//! ```bash
//! cargo test -p devout --test integration_tests
//! ```

mod helpers;
mod integration;

pub use integration::*;
