//! Centralized error type for the devout umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] devout_core::Error),

    #[error("DSP: {0}")]
    Dsp(#[from] devout_dsp::Error),

    #[error("PCM: {0}")]
    Pcm(#[from] devout_io::PcmError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
