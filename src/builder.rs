//! Builder for configuring and constructing a soundcard devout.

use std::path::Path;
use std::sync::Arc;

use devout_core::{
    DevoutConfig, LoopConfig, Presets, SampleFormat, Soundcard, TaskLauncher, ThreadLauncher,
};
use devout_io::{AlsaDevout, GstreamerDevout, PcmBackend};
use tracing::debug;

use crate::Result;

/// Starts from [`DevoutConfig::default`] (44.1 kHz, 512 frames, stereo
/// `Signed16`, 120 bpm). Without an explicit launcher, every built devout
/// gets its own [`ThreadLauncher`].
///
/// # Example
///
/// ```ignore
/// use devout::prelude::*;
///
/// let devout = DevoutBuilder::new()
///     .samplerate(48000)
///     .buffer_size(1024)
///     .bpm(128.0)
///     .build_cpal()?;
///
/// devout.init()?;
/// loop {
///     devout.play();
/// }
/// ```
#[derive(Default)]
pub struct DevoutBuilder {
    config: DevoutConfig,
    launcher: Option<Arc<dyn TaskLauncher>>,
    gstreamer_cards: Option<usize>,
}

impl DevoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DevoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the `[soundcard]` table of a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(Self::new().config(DevoutConfig::from_toml_str(s)?))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.config.device = Some(device.into());
        self
    }

    pub fn presets(mut self, presets: Presets) -> Self {
        self.config.presets = presets;
        self
    }

    /// Default: 2
    pub fn channels(mut self, channels: usize) -> Self {
        self.config.presets.pcm_channels = channels;
        self
    }

    /// Default: 44100
    pub fn samplerate(mut self, samplerate: u32) -> Self {
        self.config.presets.samplerate = samplerate;
        self
    }

    /// Frames per period. Default: 512
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.presets.buffer_size = buffer_size;
        self
    }

    pub fn format(mut self, format: SampleFormat) -> Self {
        self.config.presets.format = format;
        self
    }

    pub fn bpm(mut self, bpm: f64) -> Self {
        self.config.bpm = bpm;
        self
    }

    pub fn delay_factor(mut self, delay_factor: f64) -> Self {
        self.config.delay_factor = delay_factor;
        self
    }

    pub fn sub_block_count(mut self, sub_block_count: usize) -> Self {
        self.config.sub_block_count = sub_block_count;
        self
    }

    pub fn start_note_offset(mut self, offset: u64) -> Self {
        self.config.start_note_offset = offset;
        self
    }

    pub fn loop_region(mut self, left: u64, right: u64, enabled: bool) -> Self {
        self.config.loop_region = LoopConfig {
            left,
            right,
            enabled,
        };
        self
    }

    /// Where the per-period tasks go. Use
    /// [`InlineLauncher`](devout_core::InlineLauncher) for deterministic
    /// single-threaded runs.
    pub fn launcher(mut self, launcher: Arc<dyn TaskLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Number of `ags-gstreamer-devout-N` ids. Default: 1
    pub fn gstreamer_cards(mut self, cards: usize) -> Self {
        self.gstreamer_cards = Some(cards);
        self
    }

    fn take_launcher(&mut self) -> Result<Arc<dyn TaskLauncher>> {
        match self.launcher.take() {
            Some(launcher) => Ok(launcher),
            None => Ok(Arc::new(ThreadLauncher::start()?)),
        }
    }

    /// ALSA-style devout over any PCM backend.
    pub fn build_alsa<P: PcmBackend + 'static>(mut self, pcm: P) -> Result<Arc<AlsaDevout<P>>> {
        self.config.validate()?;
        let launcher = self.take_launcher()?;
        let devout = AlsaDevout::new(pcm, &self.config, launcher)?;
        if let Some(device) = &self.config.device {
            devout.set_device(device)?;
        }
        debug!(presets = ?self.config.presets, bpm = self.config.bpm, "Built ALSA devout");
        Ok(devout)
    }

    /// ALSA-style devout on the default cpal host.
    #[cfg(feature = "cpal")]
    pub fn build_cpal(self) -> Result<Arc<AlsaDevout<devout_io::CpalPcm>>> {
        self.build_alsa(devout_io::CpalPcm::new())
    }

    pub fn build_gstreamer(mut self) -> Result<Arc<GstreamerDevout>> {
        self.config.validate()?;
        let launcher = self.take_launcher()?;
        let cards = self.gstreamer_cards.unwrap_or(1);
        let devout = GstreamerDevout::with_cards(&self.config, launcher, cards)?;
        debug!(presets = ?self.config.presets, cards, "Built GStreamer devout");
        Ok(devout)
    }
}
