//! State shared by every soundcard backend: presets, ring, tick table, flags.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use crate::config::{DevoutConfig, Presets};
use crate::lockfree::{AtomicDouble, AtomicFlag};
use crate::ring::{BufferHandle, OutputRing, RingSlots};
use crate::soundcard::{SoundcardEvent, SoundcardStatus};
use crate::timing::{DelayAttackTable, LoopState, TimingSnapshot};
use crate::Result;

type Listener = Box<dyn Fn(&SoundcardEvent) + Send + Sync>;

pub struct DevoutState {
    device: RwLock<Option<String>>,
    presets: RwLock<Presets>,
    ring: RwLock<OutputRing>,
    timing: Mutex<DelayAttackTable>,

    initialized: AtomicFlag,
    playing: AtomicFlag,
    starting: AtomicFlag,

    bpm: AtomicDouble,
    delay_factor: AtomicDouble,

    listeners: RwLock<Vec<Listener>>,
}

impl DevoutState {
    pub fn new(slots: RingSlots, config: &DevoutConfig) -> Self {
        let presets = config.presets;
        let mut timing = DelayAttackTable::new(
            presets.samplerate,
            presets.buffer_size,
            config.bpm,
            config.delay_factor,
        );
        timing.set_start_note_offset(config.start_note_offset);
        timing.reset_note_offset();
        timing.set_loop(
            config.loop_region.left,
            config.loop_region.right,
            config.loop_region.enabled,
        );

        Self {
            device: RwLock::new(config.device.clone()),
            presets: RwLock::new(presets),
            ring: RwLock::new(OutputRing::new(slots, &presets, config.sub_block_count)),
            timing: Mutex::new(timing),
            initialized: AtomicFlag::new(false),
            playing: AtomicFlag::new(false),
            starting: AtomicFlag::new(false),
            bpm: AtomicDouble::new(config.bpm),
            delay_factor: AtomicDouble::new(config.delay_factor),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn device(&self) -> Option<String> {
        self.device.read().clone()
    }

    /// Store a device id that the backend has already validated.
    pub fn store_device(&self, device: &str) {
        debug!(device, "Soundcard device selected");
        *self.device.write() = Some(device.to_string());
    }

    pub fn presets(&self) -> Presets {
        *self.presets.read()
    }

    /// Validate and apply presets, reallocating the ring and the tick table.
    pub fn apply_presets(&self, presets: Presets) -> Result<()> {
        presets.validate()?;

        let mut ring = self.ring.write();
        *self.presets.write() = presets;
        ring.realloc(presets.pcm_channels, presets.buffer_size, presets.format);
        self.timing
            .lock()
            .set_presets(presets.samplerate, presets.buffer_size);

        debug!(
            pcm_channels = presets.pcm_channels,
            samplerate = presets.samplerate,
            buffer_size = presets.buffer_size,
            format = ?presets.format,
            "Soundcard presets applied"
        );
        Ok(())
    }

    /// Shared access to the ring. Reallocation waits for every reader.
    pub fn ring(&self) -> RwLockReadGuard<'_, OutputRing> {
        self.ring.read()
    }

    pub fn timing(&self) -> MutexGuard<'_, DelayAttackTable> {
        self.timing.lock()
    }

    pub fn timing_snapshot(&self) -> TimingSnapshot {
        self.timing.lock().snapshot()
    }

    pub fn buffer(&self) -> BufferHandle {
        self.ring.read().buffer()
    }

    pub fn next_buffer(&self) -> BufferHandle {
        self.ring.read().next_buffer()
    }

    pub fn prev_buffer(&self) -> BufferHandle {
        self.ring.read().prev_buffer()
    }

    pub fn sub_block_count(&self) -> usize {
        self.ring.read().sub_block_count()
    }

    pub fn set_sub_block_count(&self, sub_block_count: usize) {
        self.ring.write().set_sub_block_count(sub_block_count);
    }

    /// Zero the slot the device consumed this period.
    pub fn clear_buffer(&self) {
        let ring = self.ring.read();
        if let Err(e) = ring.clear(ring.next_buffer()) {
            warn!("Clear buffer failed: {}", e);
        }
    }

    pub fn switch_buffer_flag(&self) {
        self.ring.read().switch_buffer_flag();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn set_initialized(&self, value: bool) {
        self.initialized.set(value);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.get()
    }

    pub fn set_playing(&self, value: bool) {
        self.playing.set(value);
    }

    pub fn is_starting(&self) -> bool {
        self.starting.get()
    }

    pub fn set_starting(&self, value: bool) {
        self.starting.set(value);
    }

    /// Clear `starting`, returning whether it was set.
    pub fn take_starting(&self) -> bool {
        self.starting.take()
    }

    pub fn status(&self) -> SoundcardStatus {
        if !self.is_initialized() {
            SoundcardStatus::Uninitialized
        } else if self.is_playing() {
            SoundcardStatus::Playing
        } else {
            SoundcardStatus::Initialized
        }
    }

    /// Lock-free read.
    pub fn bpm(&self) -> f64 {
        self.bpm.get()
    }

    pub fn set_bpm(&self, bpm: f64) -> Result<()> {
        self.timing.lock().set_bpm(bpm)?;
        self.bpm.set(bpm);
        debug!(bpm, "Soundcard tempo changed");
        Ok(())
    }

    /// Lock-free read.
    pub fn delay_factor(&self) -> f64 {
        self.delay_factor.get()
    }

    pub fn set_delay_factor(&self, delay_factor: f64) -> Result<()> {
        self.timing.lock().set_delay_factor(delay_factor)?;
        self.delay_factor.set(delay_factor);
        Ok(())
    }

    pub fn loop_state(&self) -> LoopState {
        self.timing.lock().loop_state()
    }

    pub fn set_loop(&self, left: u64, right: u64, enabled: bool) {
        self.timing.lock().set_loop(left, right, enabled);
    }

    /// Advance the tick table by one period, then notify listeners.
    pub fn tic(&self) {
        let crossed = self.timing.lock().tic();
        self.emit(&SoundcardEvent::Tic);
        if let Some(note_offset) = crossed {
            self.emit(&SoundcardEvent::OffsetChanged(note_offset));
        }
    }

    pub fn offset_changed(&self) {
        let note_offset = {
            let mut timing = self.timing.lock();
            timing.offset_changed();
            timing.note_offset()
        };
        self.emit(&SoundcardEvent::OffsetChanged(note_offset));
    }

    /// Zero all slots and restart the tick table. Run by `init()`.
    pub fn reset_for_init(&self) {
        self.ring.read().clear_all();
        self.timing.lock().reset_counters();
    }

    /// Rewind to the start offset, zero all slots and drop every flag.
    pub fn reset_for_stop(&self) {
        {
            let mut timing = self.timing.lock();
            timing.reset_note_offset();
            timing.reset_counters();
        }
        self.ring.read().clear_all();
        self.playing.set(false);
        self.starting.set(false);
        self.initialized.set(false);
    }

    pub fn add_listener(&self, listener: impl Fn(&SoundcardEvent) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    pub fn emit(&self, event: &SoundcardEvent) {
        for listener in self.listeners.read().iter() {
            listener(event);
        }
    }
}

impl core::fmt::Debug for DevoutState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DevoutState")
            .field("device", &self.device())
            .field("presets", &self.presets())
            .field("status", &self.status())
            .field("bpm", &self.bpm())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleFormat;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn state() -> DevoutState {
        DevoutState::new(RingSlots::Four, &DevoutConfig::default())
    }

    #[test]
    fn test_apply_presets_reallocates() {
        let state = state();
        let stale = state.buffer();
        state
            .apply_presets(Presets::new(4, 48000, 256, SampleFormat::Double))
            .unwrap();

        let layout = state.ring().layout();
        assert_eq!(layout.slot_bytes, 4 * 256 * 8);
        assert_eq!(state.timing().samplerate(), 48000);
        assert!(state.ring().lock_buffer(stale).is_err());
    }

    #[test]
    fn test_apply_presets_rejects_invalid() {
        let state = state();
        assert!(state
            .apply_presets(Presets::new(0, 48000, 256, SampleFormat::Double))
            .is_err());
        assert_eq!(state.presets(), Presets::default());
    }

    #[test]
    fn test_status() {
        let state = state();
        assert_eq!(state.status(), SoundcardStatus::Uninitialized);
        state.set_initialized(true);
        assert_eq!(state.status(), SoundcardStatus::Initialized);
        state.set_playing(true);
        assert_eq!(state.status(), SoundcardStatus::Playing);
        state.reset_for_stop();
        assert_eq!(state.status(), SoundcardStatus::Uninitialized);
    }

    #[test]
    fn test_listeners_run_after_default_action() {
        let state = Arc::new(state());
        let seen = Arc::new(AtomicU64::new(0));

        let observer = state.clone();
        let seen_clone = seen.clone();
        state.add_listener(move |event| {
            if let SoundcardEvent::OffsetChanged(offset) = event {
                assert_eq!(observer.timing().note_offset(), *offset);
                seen_clone.store(*offset, Ordering::SeqCst);
            }
        });

        for _ in 0..8 {
            state.tic();
        }
        assert!(seen.load(Ordering::SeqCst) > 0);
        assert_eq!(seen.load(Ordering::SeqCst), state.timing().note_offset());
    }

    #[test]
    fn test_clear_buffer_zeroes_next() {
        let state = state();
        {
            let ring = state.ring();
            let guard = ring.lock_buffer(ring.next_buffer()).unwrap();
            guard.with_bytes_mut(|b| b.fill(1));
        }
        state.clear_buffer();
        let ring = state.ring();
        ring.lock_buffer(ring.next_buffer())
            .unwrap()
            .with_bytes(|b| assert!(b.iter().all(|&x| x == 0)));
    }

    #[test]
    fn test_bpm_mirror() {
        let state = state();
        state.set_bpm(90.0).unwrap();
        assert_eq!(state.bpm(), 90.0);
        assert!(state.set_bpm(-1.0).is_err());
        assert_eq!(state.bpm(), 90.0);
        assert_eq!(state.timing().bpm(), 90.0);
    }
}
