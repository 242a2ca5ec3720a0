//! Soundcard configuration.

use serde::{Deserialize, Serialize};

use crate::format::SampleFormat;
use crate::{Error, Result};

pub const DEFAULT_SAMPLERATE: u32 = 44100;
pub const DEFAULT_BUFFER_SIZE: usize = 512;
pub const DEFAULT_PCM_CHANNELS: usize = 2;
pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_DELAY_FACTOR: f64 = 1.0;
pub const DEFAULT_SUB_BLOCK_COUNT: usize = 8;

/// The four hardware presets, always applied together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presets {
    pub pcm_channels: usize,
    pub samplerate: u32,
    pub buffer_size: usize,
    pub format: SampleFormat,
}

impl Default for Presets {
    fn default() -> Self {
        Self {
            pcm_channels: DEFAULT_PCM_CHANNELS,
            samplerate: DEFAULT_SAMPLERATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            format: SampleFormat::Signed16,
        }
    }
}

impl Presets {
    pub fn new(pcm_channels: usize, samplerate: u32, buffer_size: usize, format: SampleFormat) -> Self {
        Self {
            pcm_channels,
            samplerate,
            buffer_size,
            format,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pcm_channels == 0 {
            return Err(Error::InvalidConfig("pcm_channels must be at least 1".into()));
        }
        if self.samplerate == 0 {
            return Err(Error::InvalidConfig("samplerate must be positive".into()));
        }
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig("buffer_size must be positive".into()));
        }
        Ok(())
    }

    /// Bytes in one ring slot.
    pub fn slot_bytes(&self) -> usize {
        self.pcm_channels * self.buffer_size * self.format.word_size()
    }

    /// Wall-clock length of one hardware period.
    pub fn period_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.buffer_size as f64 / self.samplerate as f64)
    }
}

/// Loop region in note offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub left: u64,
    pub right: u64,
    pub enabled: bool,
}

/// Full configuration of one output soundcard.
///
/// Presets are flattened so a `[soundcard]` table reads like:
///
/// ```toml
/// [soundcard]
/// device = "hw:0,0"
/// pcm_channels = 2
/// samplerate = 48000
/// buffer_size = 1024
/// format = "signed16"
/// bpm = 120.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevoutConfig {
    pub device: Option<String>,
    #[serde(flatten)]
    pub presets: Presets,
    pub bpm: f64,
    pub delay_factor: f64,
    pub sub_block_count: usize,
    pub start_note_offset: u64,
    #[serde(rename = "loop")]
    pub loop_region: LoopConfig,
    pub resume_retry_ms: u64,
    pub resume_max_retries: u32,
}

impl Default for DevoutConfig {
    fn default() -> Self {
        Self {
            device: None,
            presets: Presets::default(),
            bpm: DEFAULT_BPM,
            delay_factor: DEFAULT_DELAY_FACTOR,
            sub_block_count: DEFAULT_SUB_BLOCK_COUNT,
            start_note_offset: 0,
            loop_region: LoopConfig::default(),
            resume_retry_ms: 1,
            resume_max_retries: 1000,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    soundcard: DevoutConfig,
}

impl DevoutConfig {
    pub fn validate(&self) -> Result<()> {
        self.presets.validate()?;

        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(Error::InvalidTempo(self.bpm));
        }
        if !(self.delay_factor.is_finite() && self.delay_factor > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "delay_factor {} must be positive and finite",
                self.delay_factor
            )));
        }
        if self.sub_block_count == 0 || self.sub_block_count > self.presets.buffer_size {
            return Err(Error::InvalidConfig(format!(
                "sub_block_count {} out of range (1-{})",
                self.sub_block_count, self.presets.buffer_size
            )));
        }
        if self.loop_region.enabled && self.loop_region.left >= self.loop_region.right {
            return Err(Error::InvalidConfig(format!(
                "loop left {} must be before loop right {}",
                self.loop_region.left, self.loop_region.right
            )));
        }
        Ok(())
    }

    /// Parse the `[soundcard]` section of a TOML document and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(s)?;
        file.soundcard.validate()?;
        Ok(file.soundcard)
    }
}
