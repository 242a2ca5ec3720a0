//! Integration test modules for devout
//!
//! - timing: Delay/attack table driven through real play periods
//! - alsa: PCM devout against the dummy device
//! - gstreamer: Callback devout with a test-driven server thread
//! - ring: Output ring under concurrent producers

pub mod alsa;
pub mod gstreamer;
pub mod ring;
pub mod timing;
