//! Error types for devout-dsp.

use devout_core::SampleFormat;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Non-positive frequency: base {base_freq} Hz, intermediate {im_freq} Hz, new {new_freq} Hz")]
    InvalidFrequency {
        base_freq: f64,
        im_freq: f64,
        new_freq: f64,
    },

    #[error("Format mismatch: state is {expected:?}, buffer is {actual:?}")]
    FormatMismatch {
        expected: SampleFormat,
        actual: SampleFormat,
    },

    #[error("Unknown sample format code: {0:#x}")]
    UnknownFormat(u32),

    #[error("Buffer too short: need {needed} samples, got {actual}")]
    BufferTooShort { needed: usize, actual: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;
