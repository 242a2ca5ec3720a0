//! Per-format arithmetic for the pitch kernel.
//!
//! Integer formats compute each stage in `f64` and truncate back with an `as`
//! cast. Float formats round-trip through `f64`; complex samples are
//! processed component-wise. 24-bit samples live in `i32` and are clamped to
//! 24 bits on output.

use devout_core::{Complex, SampleFormat};

use crate::state::{Scratch, ScratchSet};

const S24_MIN: i32 = -0x80_0000;
const S24_MAX: i32 = 0x7F_FFFF;

pub trait PitchSample: Copy + Default + Send + Sync + 'static {
    /// `a * (1 - t) + b * t`
    fn blend(a: Self, b: Self, t: f64) -> Self;

    /// `volume * (mix * (1 - t) + t * (im / 2 + low / 2))`
    fn combine(mix: Self, im: Self, low: Self, t: f64, volume: f64) -> Self;

    /// The scratch set for this sample type, if `scratch` holds one.
    fn scratch_mut(scratch: &mut Scratch) -> Option<&mut ScratchSet<Self>>;

    /// Nominal format of this sample type. `i32` reports `Signed32`.
    fn format() -> SampleFormat;

    /// Bring a result into the range of `format`, which may be narrower than
    /// the type.
    #[inline]
    fn narrow(self, _format: SampleFormat) -> Self {
        self
    }
}

#[inline]
fn blend_f64(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

#[inline]
fn combine_f64(mix: f64, im: f64, low: f64, t: f64, volume: f64) -> f64 {
    volume * (mix * (1.0 - t) + t * (0.5 * im + 0.5 * low))
}

macro_rules! impl_pitch_sample {
    ($t:ty, $format:expr, $($variant:ident)|+ $(; $narrow:ident => $min:expr, $max:expr)?) => {
        impl PitchSample for $t {
            #[inline]
            fn blend(a: Self, b: Self, t: f64) -> Self {
                blend_f64(a as f64, b as f64, t) as $t
            }

            #[inline]
            fn combine(mix: Self, im: Self, low: Self, t: f64, volume: f64) -> Self {
                combine_f64(mix as f64, im as f64, low as f64, t, volume) as $t
            }

            fn scratch_mut(scratch: &mut Scratch) -> Option<&mut ScratchSet<Self>> {
                match scratch {
                    $(Scratch::$variant(set))|+ => Some(set),
                    _ => None,
                }
            }

            fn format() -> SampleFormat {
                $format
            }

            $(
                #[inline]
                fn narrow(self, format: SampleFormat) -> Self {
                    if format == SampleFormat::$narrow {
                        self.clamp($min, $max)
                    } else {
                        self
                    }
                }
            )?
        }
    };
}

impl_pitch_sample!(i8, SampleFormat::Signed8, Signed8);
impl_pitch_sample!(i16, SampleFormat::Signed16, Signed16);
impl_pitch_sample!(i32, SampleFormat::Signed32, Signed24 | Signed32; Signed24 => S24_MIN, S24_MAX);
impl_pitch_sample!(i64, SampleFormat::Signed64, Signed64);
impl_pitch_sample!(f32, SampleFormat::Float, Float);
impl_pitch_sample!(f64, SampleFormat::Double, Double);

impl PitchSample for Complex {
    #[inline]
    fn blend(a: Self, b: Self, t: f64) -> Self {
        Complex::new(blend_f64(a.re, b.re, t), blend_f64(a.im, b.im, t))
    }

    #[inline]
    fn combine(mix: Self, im: Self, low: Self, t: f64, volume: f64) -> Self {
        Complex::new(
            combine_f64(mix.re, im.re, low.re, t, volume),
            combine_f64(mix.im, im.im, low.im, t, volume),
        )
    }

    fn scratch_mut(scratch: &mut Scratch) -> Option<&mut ScratchSet<Self>> {
        match scratch {
            Scratch::Complex(set) => Some(set),
            _ => None,
        }
    }

    fn format() -> SampleFormat {
        SampleFormat::Complex
    }
}
