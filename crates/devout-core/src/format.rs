//! Sample formats and format-tagged sample slices.

use serde::{Deserialize, Serialize};

/// Complex sample: a pair of doubles.
pub type Complex = num_complex::Complex<f64>;

/// Sample format of a soundcard buffer.
///
/// `Signed24` samples are stored in 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    Signed8,
    #[default]
    Signed16,
    Signed24,
    Signed32,
    Signed64,
    Float,
    Double,
    Complex,
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 8] = [
        SampleFormat::Signed8,
        SampleFormat::Signed16,
        SampleFormat::Signed24,
        SampleFormat::Signed32,
        SampleFormat::Signed64,
        SampleFormat::Float,
        SampleFormat::Double,
        SampleFormat::Complex,
    ];

    /// Bytes per sample as stored in a ring slot.
    #[inline]
    pub const fn word_size(self) -> usize {
        match self {
            SampleFormat::Signed8 => 1,
            SampleFormat::Signed16 => 2,
            SampleFormat::Signed24 | SampleFormat::Signed32 | SampleFormat::Float => 4,
            SampleFormat::Signed64 | SampleFormat::Double => 8,
            SampleFormat::Complex => 16,
        }
    }

    /// Stable numeric code used by configuration files and foreign callers.
    pub const fn code(self) -> u32 {
        match self {
            SampleFormat::Signed8 => 0x10,
            SampleFormat::Signed16 => 0x20,
            SampleFormat::Signed24 => 0x40,
            SampleFormat::Signed32 => 0x80,
            SampleFormat::Signed64 => 0x100,
            SampleFormat::Float => 0x200,
            SampleFormat::Double => 0x400,
            SampleFormat::Complex => 0x800,
        }
    }

    /// Inverse of [`code`](Self::code). Unknown codes yield `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }

    /// True for the integer formats, which truncate at every DSP stage.
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            SampleFormat::Signed8
                | SampleFormat::Signed16
                | SampleFormat::Signed24
                | SampleFormat::Signed32
                | SampleFormat::Signed64
        )
    }

    /// Full-scale magnitude of one sample, used when converting to float.
    pub fn full_scale(self) -> f64 {
        match self {
            SampleFormat::Signed8 => 127.0,
            SampleFormat::Signed16 => 32767.0,
            SampleFormat::Signed24 => 8_388_607.0,
            SampleFormat::Signed32 => 2_147_483_647.0,
            SampleFormat::Signed64 => 9_223_372_036_854_775_807.0,
            SampleFormat::Float | SampleFormat::Double | SampleFormat::Complex => 1.0,
        }
    }

    /// Decode the sample at `bytes[..word_size]` (native endian) to a
    /// normalized `f64`. Complex samples yield their real part.
    pub fn decode_normalized(self, bytes: &[u8]) -> f64 {
        let raw = match self {
            SampleFormat::Signed8 => i8::from_ne_bytes([bytes[0]]) as f64,
            SampleFormat::Signed16 => i16::from_ne_bytes([bytes[0], bytes[1]]) as f64,
            SampleFormat::Signed24 | SampleFormat::Signed32 => {
                i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            SampleFormat::Signed64 => i64::from_ne_bytes(word::<8>(bytes)) as f64,
            SampleFormat::Float => f32::from_ne_bytes(word::<4>(bytes)) as f64,
            SampleFormat::Double => f64::from_ne_bytes(word::<8>(bytes)),
            SampleFormat::Complex => f64::from_ne_bytes(word::<8>(bytes)),
        };
        raw / self.full_scale()
    }
}

#[inline]
fn word<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// A plain-old-data sample type that can live in a ring slot.
pub trait Sample: Copy + Default + Send + Sync + 'static {
    const SIZE: usize;

    fn read_ne(bytes: &[u8]) -> Self;
    fn write_ne(self, out: &mut [u8]);
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                const SIZE: usize = core::mem::size_of::<$t>();

                #[inline]
                fn read_ne(bytes: &[u8]) -> Self {
                    <$t>::from_ne_bytes(word::<{ core::mem::size_of::<$t>() }>(bytes))
                }

                #[inline]
                fn write_ne(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_sample!(i8, i16, i32, i64, f32, f64);

impl Sample for Complex {
    const SIZE: usize = 16;

    #[inline]
    fn read_ne(bytes: &[u8]) -> Self {
        Complex::new(f64::read_ne(&bytes[..8]), f64::read_ne(&bytes[8..16]))
    }

    #[inline]
    fn write_ne(self, out: &mut [u8]) {
        self.re.write_ne(&mut out[..8]);
        self.im.write_ne(&mut out[8..16]);
    }
}

/// Decode a native-endian byte run into typed samples.
pub fn samples_from_bytes<T: Sample>(bytes: &[u8], out: &mut [T]) {
    for (sample, chunk) in out.iter_mut().zip(bytes.chunks_exact(T::SIZE)) {
        *sample = T::read_ne(chunk);
    }
}

/// Encode typed samples into a native-endian byte run.
pub fn samples_to_bytes<T: Sample>(samples: &[T], out: &mut [u8]) {
    for (sample, chunk) in samples.iter().zip(out.chunks_exact_mut(T::SIZE)) {
        sample.write_ne(chunk);
    }
}

/// Format-tagged immutable sample slice.
#[derive(Debug, Clone, Copy)]
pub enum SampleSlice<'a> {
    Signed8(&'a [i8]),
    Signed16(&'a [i16]),
    Signed24(&'a [i32]),
    Signed32(&'a [i32]),
    Signed64(&'a [i64]),
    Float(&'a [f32]),
    Double(&'a [f64]),
    Complex(&'a [Complex]),
}

/// Format-tagged mutable sample slice.
#[derive(Debug)]
pub enum SampleSliceMut<'a> {
    Signed8(&'a mut [i8]),
    Signed16(&'a mut [i16]),
    Signed24(&'a mut [i32]),
    Signed32(&'a mut [i32]),
    Signed64(&'a mut [i64]),
    Float(&'a mut [f32]),
    Double(&'a mut [f64]),
    Complex(&'a mut [Complex]),
}

macro_rules! slice_accessors {
    ($name:ident) => {
        impl $name<'_> {
            pub fn format(&self) -> SampleFormat {
                match self {
                    $name::Signed8(_) => SampleFormat::Signed8,
                    $name::Signed16(_) => SampleFormat::Signed16,
                    $name::Signed24(_) => SampleFormat::Signed24,
                    $name::Signed32(_) => SampleFormat::Signed32,
                    $name::Signed64(_) => SampleFormat::Signed64,
                    $name::Float(_) => SampleFormat::Float,
                    $name::Double(_) => SampleFormat::Double,
                    $name::Complex(_) => SampleFormat::Complex,
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $name::Signed8(s) => s.len(),
                    $name::Signed16(s) => s.len(),
                    $name::Signed24(s) | $name::Signed32(s) => s.len(),
                    $name::Signed64(s) => s.len(),
                    $name::Float(s) => s.len(),
                    $name::Double(s) => s.len(),
                    $name::Complex(s) => s.len(),
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }
    };
}

slice_accessors!(SampleSlice);
slice_accessors!(SampleSliceMut);
