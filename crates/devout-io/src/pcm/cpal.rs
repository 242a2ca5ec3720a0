//! cpal-backed PCM device.
//!
//! Writes go into a lock-free byte queue drained by the cpal callback; the
//! callback raises an underrun flag when it runs dry and wakes writers
//! waiting for room.

use std::sync::Arc;
use std::time::Duration;

use ::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use devout_core::{AtomicFlag, CardInfo, Error, PcmInfo, SampleFormat};
use parking_lot::{Condvar, Mutex};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use tracing::{debug, warn};

use super::{HwParams, Negotiated, PcmBackend, PcmError, PcmFormat};

/// Periods of audio the queue holds ahead of the callback.
const QUEUE_PERIODS: usize = 4;

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
struct StreamHandle(::cpal::Stream);

// SAFETY: The stream is only reached through `&mut CpalPcm`, which the devout
// keeps behind a Mutex, so it is never accessed concurrently. It is dropped
// on `close()`.
unsafe impl Send for StreamHandle {}

#[derive(Default)]
struct Shared {
    lock: Mutex<()>,
    room: Condvar,
    primed: AtomicFlag,
    underrun: AtomicFlag,
    disconnected: AtomicFlag,
}

pub struct CpalPcm {
    device_name: Option<String>,
    stream: Option<StreamHandle>,
    producer: Option<HeapProd<u8>>,
    shared: Arc<Shared>,
    hw: Option<Negotiated>,
}

impl CpalPcm {
    pub fn new() -> Self {
        Self {
            device_name: None,
            stream: None,
            producer: None,
            shared: Arc::new(Shared::default()),
            hw: None,
        }
    }

    fn get_device(name: &str) -> devout_core::Result<::cpal::Device> {
        let host = ::cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| Error::DeviceOpenFailed(e.to_string()))?;

        for device in devices {
            if device.name().map(|n| n == name).unwrap_or(false) {
                return Ok(device);
            }
        }
        Err(Error::DeviceOpenFailed(format!("{}: no such output device", name)))
    }

    fn sample_format(format: SampleFormat) -> Option<::cpal::SampleFormat> {
        match format {
            SampleFormat::Signed8 => Some(::cpal::SampleFormat::I8),
            SampleFormat::Signed16 => Some(::cpal::SampleFormat::I16),
            SampleFormat::Signed32 => Some(::cpal::SampleFormat::I32),
            SampleFormat::Signed64 => Some(::cpal::SampleFormat::I64),
            SampleFormat::Float => Some(::cpal::SampleFormat::F32),
            SampleFormat::Double => Some(::cpal::SampleFormat::F64),
            SampleFormat::Signed24 | SampleFormat::Complex => None,
        }
    }

    fn period_bytes(&self) -> usize {
        self.hw.map_or(0, |hw| hw.buffer_size * hw.frame_bytes())
    }
}

impl Default for CpalPcm {
    fn default() -> Self {
        Self::new()
    }
}

impl PcmBackend for CpalPcm {
    fn card_hints(&self) -> Vec<CardInfo> {
        let host = ::cpal::default_host();
        match host.output_devices() {
            Ok(devices) => devices
                .filter_map(|d| d.name().ok())
                .map(|name| CardInfo {
                    id: name.clone(),
                    name,
                })
                .collect(),
            Err(e) => {
                warn!("Failed to enumerate output devices: {}", e);
                Vec::new()
            }
        }
    }

    fn pcm_info(&self, card_id: &str) -> devout_core::Result<PcmInfo> {
        let device =
            Self::get_device(card_id).map_err(|_| Error::UnknownDevice(card_id.to_string()))?;
        let configs = device
            .supported_output_configs()
            .map_err(|e| Error::BrokenConfiguration(e.to_string()))?;

        let mut info: Option<PcmInfo> = None;
        for config in configs {
            let (bs_min, bs_max) = match config.buffer_size() {
                ::cpal::SupportedBufferSize::Range { min, max } => (*min as usize, *max as usize),
                ::cpal::SupportedBufferSize::Unknown => (0, usize::MAX),
            };
            let current = PcmInfo {
                channels_min: config.channels() as usize,
                channels_max: config.channels() as usize,
                rate_min: config.min_sample_rate().0,
                rate_max: config.max_sample_rate().0,
                buffer_size_min: bs_min,
                buffer_size_max: bs_max,
            };
            info = Some(match info {
                None => current,
                Some(acc) => PcmInfo {
                    channels_min: acc.channels_min.min(current.channels_min),
                    channels_max: acc.channels_max.max(current.channels_max),
                    rate_min: acc.rate_min.min(current.rate_min),
                    rate_max: acc.rate_max.max(current.rate_max),
                    buffer_size_min: acc.buffer_size_min.min(current.buffer_size_min),
                    buffer_size_max: acc.buffer_size_max.max(current.buffer_size_max),
                },
            });
        }
        info.ok_or_else(|| Error::BrokenConfiguration("no configurations available".into()))
    }

    fn open(&mut self, device: &str) -> devout_core::Result<()> {
        Self::get_device(device)?;
        self.device_name = Some(device.to_string());
        Ok(())
    }

    fn set_hw_params(&mut self, params: &HwParams) -> devout_core::Result<Negotiated> {
        let name = self
            .device_name
            .clone()
            .ok_or_else(|| Error::BrokenConfiguration("device not open".into()))?;
        let device = Self::get_device(&name)?;

        let mut configs: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::BrokenConfiguration(e.to_string()))?
            .collect();
        if configs.is_empty() {
            return Err(Error::BrokenConfiguration("no configurations available".into()));
        }

        let format = PcmFormat::native(params.format);
        let cpal_format = Self::sample_format(format.format)
            .ok_or_else(|| Error::SampleFormatUnavailable(format!("{:?}", params.format)))?;
        configs.retain(|c| c.sample_format() == cpal_format);
        if configs.is_empty() {
            return Err(Error::SampleFormatUnavailable(format!("{:?}", cpal_format)));
        }

        configs.retain(|c| c.channels() as usize == params.channels);
        let Some(first) = configs.first() else {
            return Err(Error::ChannelsUnavailable(params.channels.to_string()));
        };

        // rate near: prefer a range containing the request, else clamp into the first
        let range = configs
            .iter()
            .find(|c| (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&params.rate))
            .unwrap_or(first);
        let rate = params
            .rate
            .clamp(range.min_sample_rate().0, range.max_sample_rate().0);
        if rate == 0 {
            return Err(Error::SampleRateUnavailable(params.rate.to_string()));
        }

        let buffer_size = match range.buffer_size() {
            ::cpal::SupportedBufferSize::Range { min, max }
                if !(*min as usize..=*max as usize).contains(&params.buffer_size) =>
            {
                return Err(Error::BufferSizeUnavailable(format!(
                    "{} (supported {}-{})",
                    params.buffer_size, min, max
                )));
            }
            _ => ::cpal::BufferSize::Fixed(params.buffer_size as u32),
        };

        let config = ::cpal::StreamConfig {
            channels: params.channels as u16,
            sample_rate: ::cpal::SampleRate(rate),
            buffer_size,
        };

        let negotiated = Negotiated {
            channels: params.channels,
            rate,
            buffer_size: params.buffer_size,
            format,
        };
        let period_bytes = negotiated.buffer_size * negotiated.frame_bytes();
        let (producer, mut consumer) = HeapRb::<u8>::new(period_bytes * QUEUE_PERIODS).split();

        let shared = Arc::new(Shared::default());
        let callback_shared = shared.clone();
        let error_shared = shared.clone();

        let stream = device
            .build_output_stream_raw(
                &config,
                cpal_format,
                move |data: &mut ::cpal::Data, _: &::cpal::OutputCallbackInfo| {
                    let bytes = data.bytes_mut();
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        consumer.pop_slice(bytes)
                    }));
                    let read = result.unwrap_or(0);
                    if read < bytes.len() {
                        bytes[read..].fill(0);
                        if callback_shared.primed.get() {
                            callback_shared.underrun.set(true);
                        }
                    }
                    callback_shared.room.notify_all();
                },
                move |err| {
                    if let ::cpal::StreamError::DeviceNotAvailable = err {
                        error_shared.disconnected.set(true);
                    }
                    error_shared.room.notify_all();
                },
                None,
            )
            .map_err(|e| Error::HwParamsRejected(e.to_string()))?;
        stream
            .play()
            .map_err(|e| Error::HwParamsRejected(e.to_string()))?;

        debug!(device = %name, rate, channels = params.channels, ?cpal_format, "cpal stream started");

        self.stream = Some(StreamHandle(stream));
        self.producer = Some(producer);
        self.shared = shared;
        self.hw = Some(negotiated);
        Ok(negotiated)
    }

    fn wait_available(&mut self, timeout: Duration) -> Result<usize, PcmError> {
        let period_bytes = self.period_bytes();
        let frame_bytes = self.hw.map_or(1, |hw| hw.frame_bytes().max(1));
        let producer = self
            .producer
            .as_ref()
            .ok_or_else(|| PcmError::Other("stream not configured".into()))?;

        if self.shared.disconnected.get() {
            return Err(PcmError::Disconnected("output device lost".into()));
        }
        if self.shared.underrun.take() {
            return Err(PcmError::Underrun);
        }

        if producer.vacant_len() < period_bytes {
            let mut guard = self.shared.lock.lock();
            let _ = self.shared.room.wait_for(&mut guard, timeout);
        }

        let vacant = producer.vacant_len();
        if vacant < period_bytes {
            return Err(PcmError::Again);
        }
        Ok(vacant / frame_bytes)
    }

    fn write_interleaved(&mut self, bytes: &[u8], _frames: usize) -> Result<usize, PcmError> {
        let frame_bytes = self.hw.map_or(1, |hw| hw.frame_bytes().max(1));
        let producer = self
            .producer
            .as_mut()
            .ok_or_else(|| PcmError::Other("stream not configured".into()))?;

        if self.shared.disconnected.get() {
            return Err(PcmError::Disconnected("output device lost".into()));
        }
        let pushed = producer.push_slice(bytes);
        self.shared.primed.set(true);
        Ok(pushed / frame_bytes)
    }

    fn prepare(&mut self) -> Result<(), PcmError> {
        self.shared.underrun.set(false);
        self.shared.primed.set(false);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PcmError> {
        match &self.stream {
            Some(stream) => stream.0.play().map_err(|e| PcmError::Other(e.to_string())),
            None => Err(PcmError::Other("stream not configured".into())),
        }
    }

    fn close(&mut self) {
        self.stream = None;
        self.producer = None;
        self.hw = None;
        self.device_name = None;
    }
}
