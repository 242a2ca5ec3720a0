use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use devout_core::{
    CardInfo, DevoutConfig, DevoutState, Error, PcmInfo, Presets, Result, RingSlots, Soundcard,
    SoundcardEvent, SoundcardTask, TaskLauncher,
};
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use tracing::{debug, info, warn};

use super::GstreamerClient;

/// Device ids are `ags-gstreamer-devout-<N>`.
pub const DEVICE_PREFIX: &str = "ags-gstreamer-devout-";

const DEFAULT_CARDS: usize = 1;

const PCM_INFO: PcmInfo = PcmInfo {
    channels_min: 1,
    channels_max: 64,
    rate_min: 8000,
    rate_max: 192_000,
    buffer_size_min: 64,
    buffer_size_max: 8192,
};

/// One side of the play/callback handshake.
#[derive(Default)]
struct Rendezvous {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Rendezvous {
    fn signal(&self) {
        *self.done.lock() = true;
        self.cond.notify_all();
    }

    fn reset(&self) {
        *self.done.lock() = false;
    }
}

/// Device output drained by an external server callback.
///
/// `play()` signals "callback done", then parks until the client's
/// [`process`](GstreamerClient::process) has copied the period out and
/// signalled "callback finish done". The first period after `init()` skips
/// the handshake so a server that is not yet running can't deadlock startup.
pub struct GstreamerDevout {
    this: Weak<Self>,
    state: DevoutState,
    lock: ReentrantMutex<()>,
    client: GstreamerClient,
    card_count: usize,
    callback: Rendezvous,
    finish: Rendezvous,
    launcher: Arc<dyn TaskLauncher>,
}

impl GstreamerDevout {
    pub fn new(config: &DevoutConfig, launcher: Arc<dyn TaskLauncher>) -> Result<Arc<Self>> {
        Self::with_cards(config, launcher, DEFAULT_CARDS)
    }

    /// A devout exposing `card_count` device ids.
    pub fn with_cards(
        config: &DevoutConfig,
        launcher: Arc<dyn TaskLauncher>,
        card_count: usize,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        if card_count == 0 {
            return Err(Error::InvalidConfig("card count must be at least 1".into()));
        }

        let devout = Arc::new_cyclic(|this: &Weak<Self>| {
            let client = GstreamerClient::new("ags-gstreamer-client");
            client.connect(this.clone());
            Self {
                this: this.clone(),
                state: DevoutState::new(RingSlots::Eight, config),
                lock: ReentrantMutex::new(()),
                client,
                card_count,
                callback: Rendezvous::default(),
                finish: Rendezvous::default(),
                launcher,
            }
        });

        match config.device.as_deref() {
            Some(device) => devout.set_device(device)?,
            None => devout.set_device(&device_id(0))?,
        }
        Ok(devout)
    }

    pub fn client(&self) -> &GstreamerClient {
        &self.client
    }

    fn card_index(&self, device: &str) -> Option<usize> {
        device
            .strip_prefix(DEVICE_PREFIX)?
            .parse::<usize>()
            .ok()
            .filter(|card| *card < self.card_count)
    }

    fn current_card(&self) -> usize {
        self.state
            .device()
            .and_then(|device| self.card_index(&device))
            .unwrap_or(0)
    }

    /// Callback side: wait for `play()` to hand over a period.
    ///
    /// Returns `false` on timeout or when the devout stopped meanwhile.
    pub(crate) fn await_callback(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.callback.done.lock();
        while !*done && self.state.is_initialized() {
            if self.callback.cond.wait_until(&mut done, deadline).timed_out() {
                break;
            }
        }
        let delivered = *done && self.state.is_initialized();
        *done = false;
        delivered
    }

    pub(crate) fn finish_callback(&self) {
        self.finish.signal();
    }

    /// Play side of the handshake. Never called with `lock` held.
    fn rendezvous(&self) {
        self.finish.reset();
        self.callback.signal();

        let mut finished = self.finish.done.lock();
        while !*finished && self.state.is_initialized() {
            self.finish.cond.wait(&mut finished);
        }
        *finished = false;
    }

    fn issue_tasks(&self) {
        if let Some(this) = self.this.upgrade() {
            let soundcard: Arc<dyn Soundcard> = this;
            self.launcher.add_tasks(SoundcardTask::period(soundcard));
        }
    }
}

fn device_id(card: usize) -> String {
    format!("{}{}", DEVICE_PREFIX, card)
}

impl Soundcard for GstreamerDevout {
    fn state(&self) -> &DevoutState {
        &self.state
    }

    fn list_cards(&self) -> Vec<CardInfo> {
        (0..self.card_count)
            .map(|card| CardInfo {
                id: device_id(card),
                name: format!("GStreamer devout {}", card),
            })
            .collect()
    }

    fn pcm_info(&self, card_id: &str) -> Result<PcmInfo> {
        match self.card_index(card_id) {
            Some(_) => Ok(PCM_INFO),
            None => Err(Error::UnknownDevice(card_id.to_string())),
        }
    }

    fn set_device(&self, device: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let Some(card) = self.card_index(device) else {
            warn!(device, "Unknown soundcard device");
            return Err(Error::UnknownDevice(device.to_string()));
        };

        self.state.store_device(device);
        let presets = self.state.presets();
        self.client
            .update_ports(card, presets.pcm_channels, presets.buffer_size);
        Ok(())
    }

    fn set_presets(&self, presets: Presets) -> Result<()> {
        let _guard = self.lock.lock();
        self.state.apply_presets(presets)?;
        self.client
            .update_ports(self.current_card(), presets.pcm_channels, presets.buffer_size);
        Ok(())
    }

    fn init(&self) -> Result<()> {
        let _guard = self.lock.lock();

        self.callback.reset();
        self.finish.reset();
        self.state.set_starting(true);
        self.state.reset_for_init();
        self.state.set_initialized(true);

        info!(device = ?self.state.device(), "Soundcard initialized");
        Ok(())
    }

    fn play(&self) {
        if !self.state.is_initialized() {
            return;
        }
        let first = self.state.take_starting();
        self.state.set_playing(true);

        if first {
            debug!("First playback period, skipping callback handshake");
        } else if self.client.is_activated() {
            self.rendezvous();
        }

        if !self.state.is_initialized() {
            return;
        }
        self.issue_tasks();
    }

    fn stop(&self) {
        let _guard = self.lock.lock();
        if !self.state.is_initialized() {
            return;
        }

        // Flags drop first so both waiters see the stop once woken.
        self.state.reset_for_stop();
        self.callback.signal();
        self.finish.signal();

        self.state.emit(&SoundcardEvent::Stopped);
        info!("Soundcard stopped");
    }
}

impl core::fmt::Debug for GstreamerDevout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GstreamerDevout")
            .field("state", &self.state)
            .field("client", &self.client)
            .finish()
    }
}
