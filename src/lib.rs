//! # Devout - sample-accurate soundcard output
//!
//! Device output ("devout") built from modular subsystems.
//!
//! ## Architecture
//!
//! Devout is an umbrella crate that coordinates:
//! - **devout-core** - Sample formats, output ring, delay/attack tick table, task model
//! - **devout-dsp** - Fast pitch-shift kernel for every sample format
//! - **devout-io** - ALSA-style and GStreamer-style device backends
//!
//! ## Quick Start
//!
//! ```ignore
//! use devout::prelude::*;
//!
//! let devout = DevoutBuilder::new()
//!     .bpm(120.0)
//!     .launcher(Arc::new(InlineLauncher))
//!     .build_alsa(DummyPcm::single())?;
//!
//! devout.init()?;
//! devout.play(); // one hardware period
//! println!("{}", devout.uptime());
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - cpal hardware output
//! - `cpal` - [`CpalPcm`] backend and `DevoutBuilder::build_cpal`

/// Re-export of devout-core for direct access
pub use devout_core as core;

/// Re-export of devout-dsp for direct access
pub use devout_dsp as dsp;

/// Re-export of devout-io for direct access
pub use devout_io as io;

// Core types
pub use devout_core::{
    format_uptime,
    AtomicDouble,
    AtomicFlag,
    // Ring
    BufferHandle,
    CardInfo,
    Complex,
    // Timing
    DelayAttackTable,
    DevoutConfig,
    DevoutState,
    // Tasks
    InlineLauncher,
    LoopConfig,
    LoopState,
    OutputRing,
    PcmInfo,
    Presets,
    RingLayout,
    RingSlots,
    // Formats
    Sample,
    SampleFormat,
    SampleSlice,
    SampleSliceMut,
    SlotGuard,
    // Soundcard
    Soundcard,
    SoundcardEvent,
    SoundcardStatus,
    SoundcardTask,
    SubBlockGuard,
    TaskKind,
    TaskLauncher,
    ThreadLauncher,
    TimingSnapshot,
    PERIOD,
};

// Pitch shifting
pub use devout_dsp::{pitch_dispatch, Frequencies, PitchShiftState, Vibrato};

// Backends
#[cfg(feature = "cpal")]
pub use devout_io::CpalPcm;
pub use devout_io::{
    encode_period, AlsaDevout, DummyCard, DummyPcm, DummyProbe, Endian, GstreamerClient,
    GstreamerDevout, GstreamerPort, HwParams, Negotiated, PcmBackend, PcmError, PcmFormat,
};

mod builder;
mod error;

pub use builder::DevoutBuilder;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    pub use std::sync::Arc;

    // Builder and backends
    pub use crate::{AlsaDevout, DevoutBuilder, DummyPcm, GstreamerDevout};

    #[cfg(feature = "cpal")]
    pub use crate::CpalPcm;

    // Essential types
    pub use crate::{
        DevoutConfig, InlineLauncher, Presets, SampleFormat, Soundcard, SoundcardEvent,
        SoundcardStatus, ThreadLauncher,
    };

    // DSP
    pub use crate::{PitchShiftState, Vibrato};
}
