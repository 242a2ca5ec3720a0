//! In-memory PCM device for tests and headless runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devout_core::{CardInfo, Error, PcmInfo, SampleFormat};
use parking_lot::Mutex;

use super::{Endian, HwParams, Negotiated, PcmBackend, PcmError, PcmFormat};

/// One fake card and its capabilities.
#[derive(Debug, Clone)]
pub struct DummyCard {
    pub id: String,
    pub name: String,
    pub info: PcmInfo,
    pub formats: Vec<SampleFormat>,
    pub interleaved: bool,
    pub endian: Endian,
    pub signed: bool,
}

impl DummyCard {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            info: PcmInfo {
                channels_min: 1,
                channels_max: 32,
                rate_min: 8000,
                rate_max: 192_000,
                buffer_size_min: 16,
                buffer_size_max: 16384,
            },
            formats: SampleFormat::ALL
                .into_iter()
                .filter(|f| *f != SampleFormat::Complex)
                .collect(),
            interleaved: true,
            endian: Endian::native(),
            signed: true,
        }
    }
}

/// Shared view into a [`DummyPcm`], kept by tests after the device is moved
/// into a backend.
#[derive(Debug, Default)]
pub struct DummyProbe {
    written: Mutex<Vec<u8>>,
    writes: AtomicUsize,
    open_attempts: Mutex<Vec<String>>,
    prepares: AtomicUsize,
    resumes: AtomicUsize,
    closes: AtomicUsize,
    pending_underruns: AtomicUsize,
    pending_wait_underruns: AtomicUsize,
    /// `resume()` answers `Again` this many more times.
    suspend_polls: AtomicUsize,
    suspended: AtomicBool,
}

impl DummyProbe {
    /// Everything written since the last [`take_written`](Self::take_written).
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut *self.written.lock())
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }

    pub fn open_attempts(&self) -> Vec<String> {
        self.open_attempts.lock().clone()
    }

    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::Acquire)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::Acquire)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }

    /// The next write fails with an underrun.
    pub fn inject_underrun(&self) {
        self.pending_underruns.fetch_add(1, Ordering::AcqRel);
    }

    /// The next `wait_available()` fails with an underrun.
    pub fn inject_wait_underrun(&self) {
        self.pending_wait_underruns.fetch_add(1, Ordering::AcqRel);
    }

    /// The next write fails with a suspend; `resume()` then answers `Again`
    /// `polls` times before succeeding.
    pub fn inject_suspend(&self, polls: usize) {
        self.suspended.store(true, Ordering::Release);
        self.suspend_polls.store(polls, Ordering::Release);
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    fn take_underrun(&self) -> bool {
        take_one(&self.pending_underruns)
    }

    fn take_wait_underrun(&self) -> bool {
        take_one(&self.pending_wait_underruns)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

pub struct DummyPcm {
    cards: Vec<DummyCard>,
    open: Option<usize>,
    hw: Option<Negotiated>,
    probe: Arc<DummyProbe>,
}

impl DummyPcm {
    pub fn new(cards: Vec<DummyCard>) -> Self {
        Self {
            cards,
            open: None,
            hw: None,
            probe: Arc::new(DummyProbe::default()),
        }
    }

    /// Single card `hw:0` accepting every format.
    pub fn single() -> Self {
        Self::new(vec![DummyCard::new("hw:0", "Dummy Output")])
    }

    pub fn probe(&self) -> Arc<DummyProbe> {
        self.probe.clone()
    }

    pub fn negotiated(&self) -> Option<Negotiated> {
        self.hw
    }

    fn card(&self, card_id: &str) -> Option<&DummyCard> {
        self.cards.iter().find(|c| c.id == card_id)
    }
}

impl PcmBackend for DummyPcm {
    fn card_hints(&self) -> Vec<CardInfo> {
        self.cards
            .iter()
            .map(|c| CardInfo {
                id: c.id.clone(),
                name: c.name.clone(),
            })
            .collect()
    }

    fn pcm_info(&self, card_id: &str) -> devout_core::Result<PcmInfo> {
        self.card(card_id)
            .map(|c| c.info)
            .ok_or_else(|| Error::UnknownDevice(card_id.to_string()))
    }

    fn open(&mut self, device: &str) -> devout_core::Result<()> {
        self.probe.open_attempts.lock().push(device.to_string());
        match self.cards.iter().position(|c| c.id == device) {
            Some(index) => {
                self.open = Some(index);
                Ok(())
            }
            None => Err(Error::DeviceOpenFailed(format!(
                "{}: No such file or directory",
                device
            ))),
        }
    }

    fn set_hw_params(&mut self, params: &HwParams) -> devout_core::Result<Negotiated> {
        let card = self
            .open
            .and_then(|i| self.cards.get(i))
            .ok_or_else(|| Error::BrokenConfiguration("device not open".into()))?;
        let info = card.info;

        if !card.interleaved {
            return Err(Error::AccessTypeUnavailable("RW_INTERLEAVED".into()));
        }
        let format = PcmFormat {
            format: super::wire_format(params.format),
            endian: card.endian,
            signed: card.signed,
        };
        if !card.formats.contains(&format.format) {
            return Err(Error::SampleFormatUnavailable(format!("{:?}", format.format)));
        }
        if !(info.channels_min..=info.channels_max).contains(&params.channels) {
            return Err(Error::ChannelsUnavailable(format!(
                "{} (supported {}-{})",
                params.channels, info.channels_min, info.channels_max
            )));
        }
        if params.rate == 0 {
            return Err(Error::SampleRateUnavailable("0 Hz".into()));
        }
        if !(info.buffer_size_min..=info.buffer_size_max).contains(&params.buffer_size) {
            return Err(Error::BufferSizeUnavailable(format!(
                "{} (supported {}-{})",
                params.buffer_size, info.buffer_size_min, info.buffer_size_max
            )));
        }

        let negotiated = Negotiated {
            channels: params.channels,
            rate: params.rate.clamp(info.rate_min, info.rate_max),
            buffer_size: params.buffer_size,
            format,
        };
        self.hw = Some(negotiated);
        Ok(negotiated)
    }

    fn wait_available(&mut self, _timeout: Duration) -> Result<usize, PcmError> {
        let hw = self
            .hw
            .ok_or_else(|| PcmError::Other("device not configured".into()))?;
        if self.probe.take_wait_underrun() {
            return Err(PcmError::Underrun);
        }
        Ok(hw.buffer_size)
    }

    fn write_interleaved(&mut self, bytes: &[u8], frames: usize) -> Result<usize, PcmError> {
        let hw = self
            .hw
            .ok_or_else(|| PcmError::Other("device not configured".into()))?;
        if bytes.len() != frames * hw.frame_bytes() {
            return Err(PcmError::Other(format!(
                "{} bytes for {} frames of {} bytes",
                bytes.len(),
                frames,
                hw.frame_bytes()
            )));
        }
        if self.probe.is_suspended() {
            return Err(PcmError::Suspended);
        }
        if self.probe.take_underrun() {
            return Err(PcmError::Underrun);
        }
        self.probe.written.lock().extend_from_slice(bytes);
        self.probe.writes.fetch_add(1, Ordering::AcqRel);
        Ok(frames)
    }

    fn prepare(&mut self) -> Result<(), PcmError> {
        self.probe.prepares.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PcmError> {
        self.probe.resumes.fetch_add(1, Ordering::AcqRel);
        let again = self
            .probe
            .suspend_polls
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if again {
            Err(PcmError::Again)
        } else {
            self.probe.suspended.store(false, Ordering::Release);
            Ok(())
        }
    }

    fn close(&mut self) {
        self.open = None;
        self.hw = None;
        self.probe.closes.fetch_add(1, Ordering::AcqRel);
    }
}
