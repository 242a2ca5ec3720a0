//! The soundcard trait implemented by every output backend.

use crate::config::Presets;
use crate::ring::BufferHandle;
use crate::state::DevoutState;
use crate::timing::{LoopState, TimingSnapshot};
use crate::Result;

/// Observable soundcard transitions. Listeners run after the default action.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundcardEvent {
    /// One hardware period was accounted.
    Tic,
    /// A 1/16 boundary was crossed; carries the new note offset.
    OffsetChanged(u64),
    Stopped,
    /// A play-path failure that was logged and swallowed.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundcardStatus {
    Uninitialized,
    Initialized,
    Playing,
}

/// One enumerated output card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    pub id: String,
    pub name: String,
}

/// Hardware limits of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmInfo {
    pub channels_min: usize,
    pub channels_max: usize,
    pub rate_min: u32,
    pub rate_max: u32,
    pub buffer_size_min: usize,
    pub buffer_size_max: usize,
}

/// A device output ("devout").
///
/// Backends provide device selection, negotiation and the play path; every
/// buffer and timing accessor is provided on top of [`DevoutState`].
pub trait Soundcard: Send + Sync {
    fn state(&self) -> &DevoutState;

    /// `(card_id, card_name)` pairs this backend can open.
    fn list_cards(&self) -> Vec<CardInfo>;

    fn pcm_info(&self, card_id: &str) -> Result<PcmInfo>;

    /// Select a device. Unknown ids are rejected and the current device kept.
    fn set_device(&self, device: &str) -> Result<()>;

    /// Negotiate hardware parameters and enter `Initialized`.
    fn init(&self) -> Result<()>;

    /// Play one hardware period. A no-op unless initialized.
    fn play(&self);

    /// Release hardware and return to `Uninitialized`.
    fn stop(&self);

    fn set_presets(&self, presets: Presets) -> Result<()> {
        self.state().apply_presets(presets)
    }

    fn device(&self) -> Option<String> {
        self.state().device()
    }

    fn presets(&self) -> Presets {
        self.state().presets()
    }

    fn status(&self) -> SoundcardStatus {
        self.state().status()
    }

    fn is_starting(&self) -> bool {
        self.state().is_starting()
    }

    fn tic(&self) {
        self.state().tic();
    }

    fn offset_changed(&self) {
        self.state().offset_changed();
    }

    fn buffer(&self) -> BufferHandle {
        self.state().buffer()
    }

    fn next_buffer(&self) -> BufferHandle {
        self.state().next_buffer()
    }

    fn prev_buffer(&self) -> BufferHandle {
        self.state().prev_buffer()
    }

    fn clear_buffer(&self) {
        self.state().clear_buffer();
    }

    fn switch_buffer_flag(&self) {
        self.state().switch_buffer_flag();
    }

    fn sub_block_count(&self) -> usize {
        self.state().sub_block_count()
    }

    fn bpm(&self) -> f64 {
        self.state().bpm()
    }

    fn set_bpm(&self, bpm: f64) -> Result<()> {
        self.state().set_bpm(bpm)
    }

    fn delay_factor(&self) -> f64 {
        self.state().delay_factor()
    }

    fn set_delay_factor(&self, delay_factor: f64) -> Result<()> {
        self.state().set_delay_factor(delay_factor)
    }

    fn absolute_delay(&self) -> f64 {
        self.state().timing().absolute_delay()
    }

    fn delay(&self) -> f64 {
        self.state().timing().delay()
    }

    fn attack(&self) -> usize {
        self.state().timing().attack()
    }

    fn delay_counter(&self) -> f64 {
        self.state().timing().delay_counter()
    }

    fn note_offset(&self) -> u64 {
        self.state().timing().note_offset()
    }

    fn set_note_offset(&self, offset: u64) {
        self.state().timing().set_note_offset(offset);
    }

    fn note_offset_absolute(&self) -> u64 {
        self.state().timing().note_offset_absolute()
    }

    fn set_note_offset_absolute(&self, offset: u64) {
        self.state().timing().set_note_offset_absolute(offset);
    }

    fn start_note_offset(&self) -> u64 {
        self.state().timing().start_note_offset()
    }

    fn set_start_note_offset(&self, offset: u64) {
        self.state().timing().set_start_note_offset(offset);
    }

    fn loop_state(&self) -> LoopState {
        self.state().loop_state()
    }

    fn set_loop(&self, left: u64, right: u64, enabled: bool) {
        self.state().set_loop(left, right, enabled);
    }

    fn timing(&self) -> TimingSnapshot {
        self.state().timing_snapshot()
    }

    fn uptime(&self) -> String {
        self.state().timing().uptime()
    }

    fn add_listener(&self, listener: Box<dyn Fn(&SoundcardEvent) + Send + Sync>) {
        self.state().add_listener(listener);
    }
}
