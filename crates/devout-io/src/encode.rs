//! Ring slot to device byte layout.

use devout_core::SampleFormat;

use crate::pcm::{Endian, PcmFormat};

const S24_MIN: i32 = -0x80_0000;
const S24_MAX: i32 = 0x7F_FFFF;

macro_rules! put {
    ($out:expr, $value:expr, $endian:expr) => {
        match $endian {
            Endian::Little => $out.extend_from_slice(&$value.to_le_bytes()),
            Endian::Big => $out.extend_from_slice(&$value.to_be_bytes()),
        }
    };
}

#[inline]
fn word<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Convert one interleaved ring slot of `format` samples into `target`'s
/// layout, replacing the contents of `out`.
///
/// Unsigned targets use offset binary. 24-bit samples are clamped and kept in
/// 32-bit containers.
pub fn encode_period(src: &[u8], format: SampleFormat, target: PcmFormat, out: &mut Vec<u8>) {
    let word_size = format.word_size();
    let samples = src.len() / word_size;
    out.clear();
    out.reserve(samples * target.bytes_per_sample());

    let endian = target.endian;
    for chunk in src.chunks_exact(word_size) {
        match format {
            SampleFormat::Signed8 => {
                let v = chunk[0];
                out.push(if target.signed { v } else { v ^ 0x80 });
            }
            SampleFormat::Signed16 => {
                let v = i16::from_ne_bytes(word(chunk)) as u16;
                put!(out, if target.signed { v } else { v ^ 0x8000 }, endian);
            }
            SampleFormat::Signed24 => {
                let v = i32::from_ne_bytes(word(chunk)).clamp(S24_MIN, S24_MAX);
                let u = if target.signed {
                    v as u32
                } else {
                    (v + 0x80_0000) as u32
                };
                put!(out, u, endian);
            }
            SampleFormat::Signed32 => {
                let v = i32::from_ne_bytes(word(chunk)) as u32;
                put!(out, if target.signed { v } else { v ^ 0x8000_0000 }, endian);
            }
            SampleFormat::Signed64 => {
                let v = i64::from_ne_bytes(word(chunk)) as u64;
                put!(out, if target.signed { v } else { v ^ (1 << 63) }, endian);
            }
            SampleFormat::Float => {
                put!(out, f32::from_ne_bytes(word(chunk)), endian);
            }
            SampleFormat::Double | SampleFormat::Complex => {
                put!(out, f64::from_ne_bytes(word(chunk)), endian);
            }
        }
    }
}
