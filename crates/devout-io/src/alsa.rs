//! ALSA-style devout: a 4-slot ring written to a blocking PCM device.

use std::sync::{Arc, Weak};
use std::time::Duration;

use devout_core::{
    CardInfo, DevoutConfig, DevoutState, Error, PcmInfo, Presets, Result, RingSlots, Soundcard,
    SoundcardEvent, SoundcardTask, TaskLauncher,
};
use parking_lot::{Mutex, MutexGuard, ReentrantMutex};
use tracing::{debug, error, info, warn};

use crate::encode::encode_period;
use crate::pcm::{HwParams, Negotiated, PcmBackend, PcmError};

/// Device output over a [`PcmBackend`].
///
/// Each `play()` encodes the ring's next slot into the device layout, waits
/// at most one period for room, writes it, then hands `tic-device`,
/// `clear-buffer` and `switch-buffer-flag` to the launcher.
pub struct AlsaDevout<P: PcmBackend> {
    this: Weak<Self>,
    state: DevoutState,
    /// Serializes device selection, presets, init and stop.
    lock: ReentrantMutex<()>,
    pcm: Mutex<P>,
    negotiated: Mutex<Option<Negotiated>>,
    encoded: Mutex<Vec<u8>>,
    launcher: Arc<dyn TaskLauncher>,
    resume_retry: Duration,
    resume_max_retries: u32,
}

impl<P: PcmBackend + 'static> AlsaDevout<P> {
    pub fn new(pcm: P, config: &DevoutConfig, launcher: Arc<dyn TaskLauncher>) -> Result<Arc<Self>> {
        config.validate()?;

        Ok(Arc::new_cyclic(|this| Self {
            this: this.clone(),
            state: DevoutState::new(RingSlots::Four, config),
            lock: ReentrantMutex::new(()),
            pcm: Mutex::new(pcm),
            negotiated: Mutex::new(None),
            encoded: Mutex::new(Vec::new()),
            launcher,
            resume_retry: Duration::from_millis(config.resume_retry_ms),
            resume_max_retries: config.resume_max_retries,
        }))
    }

    /// Direct access to the PCM device.
    pub fn pcm(&self) -> MutexGuard<'_, P> {
        self.pcm.lock()
    }

    /// Parameters accepted by the device at the last `init()`.
    pub fn negotiated(&self) -> Option<Negotiated> {
        *self.negotiated.lock()
    }

    fn open_with_fallback(&self, pcm: &mut P, device: &str) -> Result<()> {
        match pcm.open(device) {
            Ok(()) => Ok(()),
            Err(e) => match device.split_once(',') {
                Some((card, _)) => {
                    warn!(device, fallback = card, "Open failed ({}), retrying without subdevice", e);
                    pcm.open(card)
                }
                None => Err(e),
            },
        }
    }

    fn negotiate(&self, presets: &Presets) -> Result<Negotiated> {
        let device = match self.state.device() {
            Some(device) => device,
            None => self
                .list_cards()
                .into_iter()
                .next()
                .map(|card| card.id)
                .ok_or_else(|| Error::DeviceOpenFailed("no output device available".into()))?,
        };

        let mut pcm = self.pcm.lock();
        self.open_with_fallback(&mut pcm, &device)?;

        let params = HwParams {
            channels: presets.pcm_channels,
            rate: presets.samplerate,
            buffer_size: presets.buffer_size,
            format: presets.format,
        };
        let result = pcm
            .set_hw_params(&params)
            .and_then(|negotiated| self.adopt_rate(*presets, &negotiated).map(|()| negotiated));
        if result.is_err() {
            pcm.close();
        }
        result
    }

    /// Take over the rate the device settled on, so ticks follow its clock.
    fn adopt_rate(&self, presets: Presets, negotiated: &Negotiated) -> Result<()> {
        if negotiated.rate == presets.samplerate {
            return Ok(());
        }
        warn!(
            requested = presets.samplerate,
            actual = negotiated.rate,
            "Device rate differs from preset, adopting device rate"
        );
        self.state.apply_presets(Presets {
            samplerate: negotiated.rate,
            ..presets
        })
    }

    /// Write one encoded period, recovering from underrun and suspend in place.
    fn write_period(&self, pcm: &mut P, bytes: &[u8], frames: usize) {
        let mut result = pcm.write_interleaved(bytes, frames);

        match result {
            Err(PcmError::Underrun) => {
                warn!("Playback underrun, re-preparing stream");
                if let Err(e) = pcm.prepare() {
                    error!("Can't recover from underrun, prepare failed: {}", e);
                }
                result = pcm.write_interleaved(bytes, frames);
            }
            Err(PcmError::Suspended) => {
                warn!("Playback suspended, resuming");
                self.resume(pcm);
                result = pcm.write_interleaved(bytes, frames);
            }
            _ => {}
        }

        if let Err(e) = result {
            error!("Playback write failed: {}", e);
            self.state.emit(&SoundcardEvent::Error(e.to_string()));
        }
    }

    fn resume(&self, pcm: &mut P) {
        for _ in 0..self.resume_max_retries {
            match pcm.resume() {
                Err(PcmError::Again) => std::thread::sleep(self.resume_retry),
                Ok(()) => return,
                Err(e) => {
                    warn!("Resume failed ({}), re-preparing stream", e);
                    if let Err(e) = pcm.prepare() {
                        error!("Can't recover from suspend, prepare failed: {}", e);
                    }
                    return;
                }
            }
        }
        warn!(retries = self.resume_max_retries, "Stream still suspended");
    }

    fn issue_tasks(&self) {
        if let Some(this) = self.this.upgrade() {
            let soundcard: Arc<dyn Soundcard> = this;
            self.launcher.add_tasks(SoundcardTask::period(soundcard));
        }
    }
}

impl<P: PcmBackend + 'static> Soundcard for AlsaDevout<P> {
    fn state(&self) -> &DevoutState {
        &self.state
    }

    fn list_cards(&self) -> Vec<CardInfo> {
        self.pcm.lock().card_hints()
    }

    fn pcm_info(&self, card_id: &str) -> Result<PcmInfo> {
        self.pcm.lock().pcm_info(card_id)
    }

    fn set_device(&self, device: &str) -> Result<()> {
        let _guard = self.lock.lock();

        let known = self.list_cards().iter().any(|card| {
            card.id == device || device.split_once(',').is_some_and(|(id, _)| id == card.id)
        });
        if !known {
            warn!(device, "Unknown soundcard device");
            return Err(Error::UnknownDevice(device.to_string()));
        }
        self.state.store_device(device);
        Ok(())
    }

    /// Apply presets. An initialized device is closed and negotiated again
    /// with the new parameters.
    fn set_presets(&self, presets: Presets) -> Result<()> {
        let _guard = self.lock.lock();
        presets.validate()?;
        if !self.state.is_initialized() {
            return self.state.apply_presets(presets);
        }

        *self.negotiated.lock() = None;
        self.pcm.lock().close();
        self.state.set_playing(false);
        self.state.apply_presets(presets)?;
        debug!("Presets changed while initialized, renegotiating");
        self.init()
    }

    fn init(&self) -> Result<()> {
        let _guard = self.lock.lock();
        self.state.set_starting(true);

        let presets = self.state.presets();
        let negotiated = match self.negotiate(&presets) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                self.state.set_starting(false);
                self.state.set_initialized(false);
                error!("Soundcard init failed: {}", e);
                self.state.emit(&SoundcardEvent::Error(e.to_string()));
                return Err(e);
            }
        };

        *self.negotiated.lock() = Some(negotiated);
        {
            let mut encoded = self.encoded.lock();
            encoded.clear();
            encoded.reserve(negotiated.buffer_size * negotiated.frame_bytes());
        }

        self.state.reset_for_init();
        self.state.set_initialized(true);

        info!(
            device = ?self.state.device(),
            rate = negotiated.rate,
            channels = negotiated.channels,
            buffer_size = negotiated.buffer_size,
            "Soundcard initialized"
        );
        Ok(())
    }

    fn play(&self) {
        if !self.state.is_initialized() {
            return;
        }
        if self.state.take_starting() {
            debug!("First playback period");
        }
        self.state.set_playing(true);

        let Some(negotiated) = self.negotiated() else {
            return;
        };
        let presets = self.state.presets();

        let mut encoded = self.encoded.lock();
        {
            let ring = self.state.ring();
            match ring.lock_buffer(ring.next_buffer()) {
                Ok(slot) => slot.with_bytes(|bytes| {
                    encode_period(bytes, presets.format, negotiated.format, &mut encoded)
                }),
                Err(e) => {
                    warn!("Can't read next buffer: {}", e);
                    return;
                }
            };
        }

        let frames = negotiated.buffer_size;
        {
            let mut pcm = self.pcm.lock();
            match pcm.wait_available(presets.period_duration()) {
                Ok(_) => {}
                Err(PcmError::Underrun) => {
                    warn!("Playback underrun while waiting, re-preparing stream");
                    if let Err(e) = pcm.prepare() {
                        warn!("Can't recover from underrun, prepare failed: {}", e);
                    }
                }
                Err(PcmError::Again) => debug!("Device not ready within one period"),
                Err(e) => warn!("Wait for device failed: {}", e),
            }
            self.write_period(&mut pcm, &encoded, frames);
        }
        drop(encoded);

        self.issue_tasks();
    }

    fn stop(&self) {
        let _guard = self.lock.lock();
        if !self.state.is_initialized() {
            return;
        }

        self.pcm.lock().close();
        *self.negotiated.lock() = None;
        *self.encoded.lock() = Vec::new();

        self.state.reset_for_stop();
        self.state.emit(&SoundcardEvent::Stopped);
        info!("Soundcard stopped");
    }
}

impl<P: PcmBackend> core::fmt::Debug for AlsaDevout<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AlsaDevout")
            .field("state", &self.state)
            .finish()
    }
}
