//! Pitch-shift state: parameters, vibrato and typed scratch buffers.

use devout_core::{Complex, SampleFormat, SampleSlice, SampleSliceMut};
use tracing::{debug, warn};

use crate::kernel::{self, PitchParams};
use crate::sample::PitchSample;
use crate::{Error, Result};

/// Vibrato applied to the low and new stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vibrato {
    pub enabled: bool,
    pub gain: f64,
    pub lfo_depth: f64,
    pub lfo_freq: f64,
    /// Extra tuning in cents.
    pub tuning: f64,
}

impl Default for Vibrato {
    fn default() -> Self {
        Self {
            enabled: false,
            gain: 1.0,
            lfo_depth: 0.0,
            lfo_freq: 6.0,
            tuning: 0.0,
        }
    }
}

/// The four stage buffers for one sample type.
#[derive(Debug, Clone, Default)]
pub struct ScratchSet<T> {
    pub(crate) mix: Vec<T>,
    pub(crate) im_mix: Vec<T>,
    pub(crate) low_mix: Vec<T>,
    pub(crate) new_mix: Vec<T>,
}

impl<T: PitchSample> ScratchSet<T> {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            mix: vec![T::default(); len],
            im_mix: vec![T::default(); len],
            low_mix: vec![T::default(); len],
            new_mix: vec![T::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.mix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mix.is_empty()
    }
}

/// Scratch buffers typed by the state's sample format.
#[derive(Debug, Clone)]
pub enum Scratch {
    Signed8(ScratchSet<i8>),
    Signed16(ScratchSet<i16>),
    Signed24(ScratchSet<i32>),
    Signed32(ScratchSet<i32>),
    Signed64(ScratchSet<i64>),
    Float(ScratchSet<f32>),
    Double(ScratchSet<f64>),
    Complex(ScratchSet<Complex>),
}

impl Scratch {
    pub fn new(format: SampleFormat, len: usize) -> Self {
        match format {
            SampleFormat::Signed8 => Scratch::Signed8(ScratchSet::new(len)),
            SampleFormat::Signed16 => Scratch::Signed16(ScratchSet::new(len)),
            SampleFormat::Signed24 => Scratch::Signed24(ScratchSet::new(len)),
            SampleFormat::Signed32 => Scratch::Signed32(ScratchSet::new(len)),
            SampleFormat::Signed64 => Scratch::Signed64(ScratchSet::new(len)),
            SampleFormat::Float => Scratch::Float(ScratchSet::new(len)),
            SampleFormat::Double => Scratch::Double(ScratchSet::new(len)),
            SampleFormat::Complex => Scratch::Complex(ScratchSet::new(len)),
        }
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            Scratch::Signed8(_) => SampleFormat::Signed8,
            Scratch::Signed16(_) => SampleFormat::Signed16,
            Scratch::Signed24(_) => SampleFormat::Signed24,
            Scratch::Signed32(_) => SampleFormat::Signed32,
            Scratch::Signed64(_) => SampleFormat::Signed64,
            Scratch::Float(_) => SampleFormat::Float,
            Scratch::Double(_) => SampleFormat::Double,
            Scratch::Complex(_) => SampleFormat::Complex,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Scratch::Signed8(s) => s.len(),
            Scratch::Signed16(s) => s.len(),
            Scratch::Signed24(s) | Scratch::Signed32(s) => s.len(),
            Scratch::Signed64(s) => s.len(),
            Scratch::Float(s) => s.len(),
            Scratch::Double(s) => s.len(),
            Scratch::Complex(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-voice pitch-shift context.
///
/// Scratch buffers always match `format` and hold at least `buffer_length`
/// samples; they are only reallocated when the format or the maximum buffer
/// length changes.
#[derive(Debug, Clone)]
pub struct PitchShiftState {
    format: SampleFormat,
    samplerate: u32,
    buffer_length: usize,
    max_buffer_length: usize,
    source_stride: usize,
    destination_stride: usize,
    base_key: f64,
    tuning: f64,
    vibrato: Vibrato,
    offset: u64,
    scratch: Scratch,
}

impl PitchShiftState {
    pub fn new(format: SampleFormat, samplerate: u32, max_buffer_length: usize) -> Self {
        Self {
            format,
            samplerate,
            buffer_length: max_buffer_length,
            max_buffer_length,
            source_stride: 1,
            destination_stride: 1,
            base_key: 0.0,
            tuning: 0.0,
            vibrato: Vibrato::default(),
            offset: 0,
            scratch: Scratch::new(format, max_buffer_length),
        }
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn set_format(&mut self, format: SampleFormat) {
        if format != self.format {
            self.format = format;
            self.scratch = Scratch::new(format, self.max_buffer_length);
            debug!(?format, len = self.max_buffer_length, "Pitch scratch reallocated");
        }
    }

    /// Set the format from its numeric code. Unknown codes keep the current format.
    pub fn set_format_code(&mut self, code: u32) -> Result<()> {
        match SampleFormat::from_code(code) {
            Some(format) => {
                self.set_format(format);
                Ok(())
            }
            None => {
                warn!("Unknown sample format code {:#x}", code);
                Err(Error::UnknownFormat(code))
            }
        }
    }

    pub fn max_buffer_length(&self) -> usize {
        self.max_buffer_length
    }

    pub fn set_max_buffer_length(&mut self, max_buffer_length: usize) {
        if max_buffer_length != self.max_buffer_length {
            self.max_buffer_length = max_buffer_length;
            self.buffer_length = self.buffer_length.min(max_buffer_length);
            self.scratch = Scratch::new(self.format, max_buffer_length);
            debug!(format = ?self.format, len = max_buffer_length, "Pitch scratch reallocated");
        }
    }

    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    /// Samples processed per call. Grows the scratch buffers if needed.
    pub fn set_buffer_length(&mut self, buffer_length: usize) {
        if buffer_length > self.max_buffer_length {
            self.set_max_buffer_length(buffer_length);
        }
        self.buffer_length = buffer_length;
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn set_samplerate(&mut self, samplerate: u32) {
        self.samplerate = samplerate;
    }

    pub fn set_strides(&mut self, source_stride: usize, destination_stride: usize) {
        self.source_stride = source_stride.max(1);
        self.destination_stride = destination_stride.max(1);
    }

    pub fn source_stride(&self) -> usize {
        self.source_stride
    }

    pub fn destination_stride(&self) -> usize {
        self.destination_stride
    }

    /// Semitones from A4.
    pub fn base_key(&self) -> f64 {
        self.base_key
    }

    pub fn set_base_key(&mut self, base_key: f64) {
        self.base_key = base_key;
    }

    /// Cents.
    pub fn tuning(&self) -> f64 {
        self.tuning
    }

    pub fn set_tuning(&mut self, tuning: f64) {
        self.tuning = tuning;
    }

    pub fn vibrato(&self) -> Vibrato {
        self.vibrato
    }

    pub fn set_vibrato(&mut self, vibrato: Vibrato) {
        self.vibrato = vibrato;
    }

    /// Samples rendered so far; drives the vibrato LFO phase.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    fn params(&self) -> PitchParams {
        PitchParams {
            format: self.format,
            samplerate: self.samplerate as f64,
            base_key: self.base_key,
            tuning: self.tuning,
            vibrato: self.vibrato,
            offset: self.offset,
        }
    }

    /// Pitch-shift `buffer_length` samples of `source` into `destination`.
    ///
    /// On error nothing is written to `destination`.
    pub fn pitch<T: PitchSample>(&mut self, source: &[T], destination: &mut [T]) -> Result<()> {
        let params = self.params();
        let buffer_length = self.buffer_length;
        let (source_stride, destination_stride) = (self.source_stride, self.destination_stride);
        let format = self.format;

        let scratch = T::scratch_mut(&mut self.scratch).ok_or(Error::FormatMismatch {
            expected: format,
            actual: T::format(),
        })?;

        kernel::pitch(
            &params,
            scratch,
            source,
            source_stride,
            destination,
            destination_stride,
            buffer_length,
        )?;

        self.offset += buffer_length as u64;
        Ok(())
    }
}

/// Run the kernel variant matching `state.format()`.
///
/// Buffers tagged with another format are rejected with a warning and
/// `destination` is left untouched.
pub fn pitch_dispatch(
    state: &mut PitchShiftState,
    source: SampleSlice<'_>,
    destination: SampleSliceMut<'_>,
) -> Result<()> {
    let expected = state.format();
    if source.format() != expected || destination.format() != expected {
        let actual = if source.format() != expected {
            source.format()
        } else {
            destination.format()
        };
        warn!(?expected, ?actual, "Pitch dispatch format mismatch");
        return Err(Error::FormatMismatch { expected, actual });
    }

    match (source, destination) {
        (SampleSlice::Signed8(s), SampleSliceMut::Signed8(d)) => state.pitch(s, d),
        (SampleSlice::Signed16(s), SampleSliceMut::Signed16(d)) => state.pitch(s, d),
        (SampleSlice::Signed24(s), SampleSliceMut::Signed24(d)) => state.pitch(s, d),
        (SampleSlice::Signed32(s), SampleSliceMut::Signed32(d)) => state.pitch(s, d),
        (SampleSlice::Signed64(s), SampleSliceMut::Signed64(d)) => state.pitch(s, d),
        (SampleSlice::Float(s), SampleSliceMut::Float(d)) => state.pitch(s, d),
        (SampleSlice::Double(s), SampleSliceMut::Double(d)) => state.pitch(s, d),
        (SampleSlice::Complex(s), SampleSliceMut::Complex(d)) => state.pitch(s, d),
        (s, _) => Err(Error::FormatMismatch {
            expected,
            actual: s.format(),
        }),
    }
}
