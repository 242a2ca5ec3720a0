//! Platform PCM seam used by [`AlsaDevout`](crate::AlsaDevout).
//!
//! The sequence is fixed: `open` → `set_hw_params` → (`wait_available` →
//! `write_interleaved`)* → `close`. `prepare` and `resume` recover the stream
//! after an underrun or a suspend.

#[cfg(feature = "cpal")]
mod cpal;
mod dummy;

#[cfg(feature = "cpal")]
pub use self::cpal::CpalPcm;
pub use dummy::{DummyCard, DummyPcm, DummyProbe};

use std::time::Duration;

use devout_core::{CardInfo, PcmInfo, SampleFormat};
use thiserror::Error;

/// Errors raised on the play path. Always recovered or logged there.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PcmError {
    #[error("Buffer underrun")]
    Underrun,

    #[error("Stream suspended")]
    Suspended,

    #[error("Resource temporarily unavailable")]
    Again,

    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("PCM error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

/// Sample layout the device expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub format: SampleFormat,
    pub endian: Endian,
    pub signed: bool,
}

impl PcmFormat {
    /// Native-endian, signed layout for ring samples of `format`.
    pub fn native(format: SampleFormat) -> Self {
        Self {
            format: wire_format(format),
            endian: Endian::native(),
            signed: true,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.format.word_size()
    }
}

/// Format written to the device for ring samples of `format`.
///
/// Complex samples are written as their real part.
pub fn wire_format(format: SampleFormat) -> SampleFormat {
    match format {
        SampleFormat::Complex => SampleFormat::Double,
        other => other,
    }
}

/// Requested hardware parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwParams {
    pub channels: usize,
    pub rate: u32,
    pub buffer_size: usize,
    pub format: SampleFormat,
}

/// What the device accepted. `rate` may differ from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub channels: usize,
    pub rate: u32,
    pub buffer_size: usize,
    pub format: PcmFormat,
}

impl Negotiated {
    pub fn frame_bytes(&self) -> usize {
        self.channels * self.format.bytes_per_sample()
    }
}

pub trait PcmBackend: Send {
    /// `(card_id, card_name)` hints for every output card.
    fn card_hints(&self) -> Vec<CardInfo>;

    fn pcm_info(&self, card_id: &str) -> devout_core::Result<PcmInfo>;

    fn open(&mut self, device: &str) -> devout_core::Result<()>;

    fn set_hw_params(&mut self, params: &HwParams) -> devout_core::Result<Negotiated>;

    /// Wait up to `timeout` for room to write. Returns frames available.
    fn wait_available(&mut self, timeout: Duration) -> Result<usize, PcmError>;

    /// Write interleaved frames. Returns frames written.
    fn write_interleaved(&mut self, bytes: &[u8], frames: usize) -> Result<usize, PcmError>;

    fn prepare(&mut self) -> Result<(), PcmError>;

    /// `Err(PcmError::Again)` while the device is still suspended.
    fn resume(&mut self) -> Result<(), PcmError>;

    fn close(&mut self);
}
