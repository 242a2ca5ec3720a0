//! Error types for devout-core.

use thiserror::Error;

/// Error type for devout-core operations.
///
/// The device variants are the negotiation taxonomy raised by `init()`. Each
/// carries the platform-provided message verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unable to open pcm device: {0}")]
    DeviceOpenFailed(String),

    #[error("broken configuration for playback: no configurations available: {0}")]
    BrokenConfiguration(String),

    #[error("access type not available for playback: {0}")]
    AccessTypeUnavailable(String),

    #[error("sample format not available for playback: {0}")]
    SampleFormatUnavailable(String),

    #[error("channels count not available for playbacks: {0}")]
    ChannelsUnavailable(String),

    #[error("rate not available for playback: {0}")]
    SampleRateUnavailable(String),

    #[error("unable to set buffer size for playback: {0}")]
    BufferSizeUnavailable(String),

    #[error("unable to set hw params for playback: {0}")]
    HwParamsRejected(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be positive and finite")]
    InvalidTempo(f64),

    #[error("Stale buffer handle for slot {slot}: generation {handle} but ring is at {current}")]
    StaleBuffer {
        slot: usize,
        handle: u64,
        current: u64,
    },

    #[error("Sub-block out of range: channel {channel}, sub-block {sub_block}")]
    SubBlockOutOfRange { channel: usize, sub_block: usize },

    #[error("Config parse error: {0}")]
    Config(String),

    #[error("Task launcher error: {0}")]
    TaskLauncher(String),
}

impl Error {
    /// True for the hardware negotiation categories raised by `init()`.
    pub fn is_negotiation(&self) -> bool {
        matches!(
            self,
            Error::DeviceOpenFailed(_)
                | Error::BrokenConfiguration(_)
                | Error::AccessTypeUnavailable(_)
                | Error::SampleFormatUnavailable(_)
                | Error::ChannelsUnavailable(_)
                | Error::SampleRateUnavailable(_)
                | Error::BufferSizeUnavailable(_)
                | Error::HwParamsRejected(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_categories() {
        assert!(Error::ChannelsUnavailable("x".into()).is_negotiation());
        assert!(Error::HwParamsRejected("x".into()).is_negotiation());
        assert!(!Error::UnknownDevice("hw:9,0".into()).is_negotiation());
        assert!(!Error::InvalidTempo(-1.0).is_negotiation());
    }

    #[test]
    fn test_platform_message_kept_verbatim() {
        let err = Error::DeviceOpenFailed("No such file or directory".into());
        assert!(err.to_string().ends_with("No such file or directory"));
    }
}
