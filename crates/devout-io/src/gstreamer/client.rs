use std::sync::{Arc, Weak};
use std::time::Duration;

use devout_core::{AtomicFlag, Soundcard};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{port_name, GstreamerDevout};

/// One mono output port; holds the last period delivered to the server.
#[derive(Debug)]
pub struct GstreamerPort {
    name: String,
    channel: usize,
    samples: Mutex<Vec<f32>>,
}

impl GstreamerPort {
    fn new(card: usize, channel: usize, buffer_size: usize) -> Self {
        Self {
            name: port_name(card, channel),
            channel,
            samples: Mutex::new(vec![0.0; buffer_size]),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Copy of the port buffer, normalized to `[-1, 1]`.
    pub fn samples(&self) -> Vec<f32> {
        self.samples.lock().clone()
    }
}

/// The audio-server side of a [`GstreamerDevout`].
///
/// While activated, the server thread calls [`process`](Self::process) once
/// per period; each call pairs with exactly one `play()` on the devout.
pub struct GstreamerClient {
    name: String,
    activated: AtomicFlag,
    card: Mutex<usize>,
    ports: RwLock<Vec<Arc<GstreamerPort>>>,
    devout: RwLock<Weak<GstreamerDevout>>,
}

impl GstreamerClient {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activated: AtomicFlag::new(false),
            card: Mutex::new(0),
            ports: RwLock::new(Vec::new()),
            devout: RwLock::new(Weak::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn activate(&self) {
        self.activated.set(true);
        debug!(client = %self.name, "Client activated");
    }

    pub fn deactivate(&self) {
        self.activated.set(false);
        debug!(client = %self.name, "Client deactivated");
    }

    pub fn is_activated(&self) -> bool {
        self.activated.get()
    }

    pub fn ports(&self) -> Vec<Arc<GstreamerPort>> {
        self.ports.read().clone()
    }

    pub fn port_names(&self) -> Vec<String> {
        self.ports.read().iter().map(|p| p.name.clone()).collect()
    }

    pub(crate) fn connect(&self, devout: Weak<GstreamerDevout>) {
        *self.devout.write() = devout;
    }

    /// Register or unregister ports until there is one per channel.
    pub(crate) fn update_ports(&self, card: usize, channels: usize, buffer_size: usize) {
        let mut ports = self.ports.write();
        let mut current_card = self.card.lock();

        if *current_card != card {
            for port in ports.drain(..) {
                debug!(port = %port.name, "Unregistered port");
            }
            *current_card = card;
        }

        while ports.len() > channels {
            if let Some(port) = ports.pop() {
                debug!(port = %port.name, "Unregistered port");
            }
        }
        for port in ports.iter() {
            port.samples.lock().resize(buffer_size, 0.0);
        }
        while ports.len() < channels {
            let port = GstreamerPort::new(card, ports.len(), buffer_size);
            debug!(port = %port.name, "Registered port");
            ports.push(Arc::new(port));
        }
    }

    /// Server callback for one period.
    ///
    /// Waits up to `timeout` for the devout to hand over a period, copies the
    /// ring's next slot into the port buffers and releases the devout. Returns
    /// `false` when nothing was delivered.
    pub fn process(&self, timeout: Duration) -> bool {
        let Some(devout) = self.devout.read().upgrade() else {
            return false;
        };
        if !self.is_activated() || !devout.await_callback(timeout) {
            return false;
        }

        self.fill_ports(&devout);
        devout.finish_callback();
        true
    }

    fn fill_ports(&self, devout: &GstreamerDevout) {
        let presets = devout.presets();
        let format = presets.format;
        let word_size = format.word_size();
        let channels = presets.pcm_channels;
        let ports = self.ports.read();

        let ring = devout.state().ring();
        let slot = match ring.lock_buffer(ring.next_buffer()) {
            Ok(slot) => slot,
            Err(e) => {
                warn!("Can't read next buffer: {}", e);
                return;
            }
        };
        slot.with_bytes(|bytes| {
            for port in ports.iter().filter(|p| p.channel < channels) {
                let mut samples = port.samples.lock();
                samples.resize(presets.buffer_size, 0.0);
                for (frame, out) in samples.iter_mut().enumerate() {
                    let at = (frame * channels + port.channel) * word_size;
                    *out = bytes
                        .get(at..at + word_size)
                        .map_or(0.0, |b| format.decode_normalized(b) as f32);
                }
            }
        });
    }
}

impl core::fmt::Debug for GstreamerClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GstreamerClient")
            .field("name", &self.name)
            .field("activated", &self.is_activated())
            .field("ports", &self.port_names())
            .finish()
    }
}
