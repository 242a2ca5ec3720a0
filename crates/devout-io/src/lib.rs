//! Soundcard output backends.
//!
//! - [`AlsaDevout`]: 4-slot ring written to a blocking [`PcmBackend`]
//!   (cpal or the in-memory [`DummyPcm`])
//! - [`GstreamerDevout`]: 8-slot ring drained by a server callback through
//!   [`GstreamerClient::process`]

pub mod alsa;
pub mod encode;
pub mod gstreamer;
pub mod pcm;

pub use alsa::AlsaDevout;
pub use encode::encode_period;
pub use gstreamer::{GstreamerClient, GstreamerDevout, GstreamerPort};
#[cfg(feature = "cpal")]
pub use pcm::CpalPcm;
pub use pcm::{
    DummyCard, DummyPcm, DummyProbe, Endian, HwParams, Negotiated, PcmBackend, PcmError,
    PcmFormat,
};

pub use devout_core::{
    CardInfo, DevoutConfig, PcmInfo, Presets, Soundcard, SoundcardEvent, SoundcardStatus,
};
