//! Four-buffer fast pitch shift.
//!
//! 1. `mix`: verbatim copy of the source.
//! 2. `im_mix`: `mix` blended with its phase-shifted self over the base period,
//!    shifted towards an intermediate frequency.
//! 3. `low_mix`: the same against the octave-below period.
//! 4. `new_mix`: `mix` blended with `im_mix` and `low_mix` (half each) at the
//!    new period, scaled by `new_freq / base_freq`.
//!
//! With zero tuning every blend weight is zero and the kernel is an identity.

use std::f64::consts::PI;

use devout_core::SampleFormat;
use tracing::warn;

use crate::sample::PitchSample;
use crate::state::{ScratchSet, Vibrato};
use crate::{Error, Result};

const A4: f64 = 440.0;

#[derive(Debug, Clone, Copy)]
pub(crate) struct PitchParams {
    /// Output format; narrower than `T` for 24-bit samples.
    pub format: SampleFormat,
    pub samplerate: f64,
    pub base_key: f64,
    pub tuning: f64,
    pub vibrato: Vibrato,
    pub offset: u64,
}

impl PitchParams {
    /// Tuning in cents for sample `i` of the current call.
    #[inline]
    fn tuning_at(&self, i: usize) -> f64 {
        if !self.vibrato.enabled {
            return self.tuning;
        }
        let v = &self.vibrato;
        let t = (self.offset + i as u64) as f64 / self.samplerate;
        self.tuning + v.tuning + v.gain * v.lfo_depth * (2.0 * PI * v.lfo_freq * t).sin()
    }
}

#[inline]
fn key_freq(key: f64) -> f64 {
    2f64.powf(key / 12.0) * A4
}

/// Derived frequencies and periods for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frequencies {
    pub base_freq: f64,
    pub low_freq: f64,
    pub new_freq: f64,
    pub im_freq: f64,
    pub freq_period: f64,
    pub im_freq_period: f64,
    pub low_freq_period: f64,
    pub new_freq_period: f64,
    pub volume: f64,
}

impl Frequencies {
    pub fn compute(base_key: f64, tuning: f64, samplerate: f64) -> Self {
        let base_freq = key_freq(base_key);
        let low_freq = key_freq(base_key - 12.0);
        let new_freq = key_freq(base_key + tuning / 100.0);
        let im_factor = if tuning <= 0.0 { 1.25 } else { 0.75 };
        let im_freq = key_freq(base_key + im_factor * tuning / 100.0);

        Self {
            base_freq,
            low_freq,
            new_freq,
            im_freq,
            freq_period: 2.0 * PI * samplerate / base_freq,
            im_freq_period: 2.0 * PI * samplerate / im_freq,
            low_freq_period: samplerate / low_freq,
            new_freq_period: samplerate / new_freq,
            volume: new_freq / base_freq,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.base_freq, self.im_freq, self.new_freq, self.low_freq]
            .iter()
            .all(|f| f.is_finite() && *f > 0.0)
    }
}

/// `1 - min / max`; zero when the periods agree.
#[inline]
fn weight(a: f64, b: f64) -> f64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    if hi <= 0.0 || !hi.is_finite() {
        0.0
    } else {
        1.0 - lo / hi
    }
}

/// Position of sample `i` after scaling its phase within its period window.
#[inline]
fn phase_index(i: usize, period: f64, ratio: f64, len: usize) -> usize {
    let period = if period.is_finite() { period.max(1.0) } else { 1.0 };
    let x = i as f64;
    let window = (x / period).floor() * period;
    let shifted = window + ((x - window) * ratio).rem_euclid(period);
    (shifted.max(0.0) as usize).min(len - 1)
}

fn required_len(buffer_length: usize, stride: usize) -> usize {
    (buffer_length - 1) * stride + 1
}

pub(crate) fn pitch<T: PitchSample>(
    params: &PitchParams,
    scratch: &mut ScratchSet<T>,
    source: &[T],
    source_stride: usize,
    destination: &mut [T],
    destination_stride: usize,
    buffer_length: usize,
) -> Result<()> {
    let f = Frequencies::compute(params.base_key, params.tuning, params.samplerate);
    if !f.is_valid() {
        warn!(
            base_freq = f.base_freq,
            im_freq = f.im_freq,
            new_freq = f.new_freq,
            "Pitch shift rejected: non-positive frequency"
        );
        return Err(Error::InvalidFrequency {
            base_freq: f.base_freq,
            im_freq: f.im_freq,
            new_freq: f.new_freq,
        });
    }

    let n = buffer_length;
    if n == 0 {
        return Ok(());
    }
    for (needed, actual) in [
        (required_len(n, source_stride), source.len()),
        (required_len(n, destination_stride), destination.len()),
        (n, scratch.len()),
    ] {
        if actual < needed {
            warn!(needed, actual, "Pitch shift rejected: buffer too short");
            return Err(Error::BufferTooShort { needed, actual });
        }
    }

    let ScratchSet {
        mix,
        im_mix,
        low_mix,
        new_mix,
    } = scratch;
    let (mix, im_mix, low_mix, new_mix) =
        (&mut mix[..n], &mut im_mix[..n], &mut low_mix[..n], &mut new_mix[..n]);

    for (i, sample) in mix.iter_mut().enumerate() {
        *sample = source[i * source_stride];
    }

    let im_weight = weight(f.freq_period, f.im_freq_period);
    let im_ratio = f.im_freq / f.base_freq;
    for i in 0..n {
        let j = phase_index(i, f.freq_period, im_ratio, n);
        im_mix[i] = T::blend(mix[i], mix[j], im_weight);
    }

    let base_period = params.samplerate / f.base_freq;
    let stage = |i: usize| {
        let tuning = params.tuning_at(i);
        let new_freq = key_freq(params.base_key + tuning / 100.0);
        let new_freq_period = params.samplerate / new_freq;
        (new_freq, new_freq_period, new_freq / f.base_freq)
    };

    for i in 0..n {
        let (_, new_freq_period, ratio) = stage(i);
        let low_weight = weight(2.0 * new_freq_period, f.low_freq_period);
        let j = phase_index(i, f.low_freq_period, ratio, n);
        low_mix[i] = T::blend(mix[i], mix[j], low_weight);
    }

    for i in 0..n {
        let (new_freq, new_freq_period, ratio) = stage(i);
        let volume = new_freq / f.base_freq;
        let new_weight = weight(new_freq_period, base_period);
        let j = phase_index(i, new_freq_period, ratio, n);
        new_mix[i] = T::combine(mix[i], im_mix[j], low_mix[j], new_weight, volume);
    }

    for (i, sample) in new_mix.iter().enumerate() {
        destination[i * destination_stride] = sample.narrow(params.format);
    }
    Ok(())
}
