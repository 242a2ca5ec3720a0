//! Delay/attack table fill.

/// Table entries per tempo period.
pub const PERIOD: usize = 16;

/// Entries stored: the current period plus one period of look-ahead.
pub const TABLE_LEN: usize = 2 * PERIOD;

/// Hardware periods between 1/16 boundaries.
///
/// `60 * (samplerate / buffer_size / bpm) * (1/16) * (1/delay_factor)`
pub fn absolute_delay(samplerate: u32, buffer_size: usize, bpm: f64, delay_factor: f64) -> f64 {
    if buffer_size == 0 || bpm <= 0.0 || delay_factor <= 0.0 {
        return 0.0;
    }
    60.0 * ((samplerate as f64 / buffer_size as f64) / bpm) * (1.0 / 16.0) * (1.0 / delay_factor)
}

/// Fill `delay` and `attack` for ticks starting at frame `phase`.
///
/// Tick `k` lands on frame `floor(phase + k * frames_per_tic)`. Delays are
/// differences of those integer frames, so any run of consecutive entries
/// sums to within one frame of real time.
pub(crate) fn fill(
    phase: f64,
    frames_per_tic: f64,
    buffer_size: usize,
    delay: &mut [f64; TABLE_LEN],
    attack: &mut [usize; TABLE_LEN],
) {
    let bs = buffer_size.max(1) as f64;
    let frame = |k: usize| (phase + k as f64 * frames_per_tic).floor();

    let mut here = frame(0);
    for k in 0..TABLE_LEN {
        let next = frame(k + 1);
        attack[k] = (here.rem_euclid(bs)) as usize;
        delay[k] = (next - here) / bs;
        here = next;
    }
}

/// Phase of the next table cycle, wrapped into one hardware buffer.
#[inline]
pub(crate) fn next_phase(phase: f64, frames_per_tic: f64, buffer_size: usize) -> f64 {
    (phase + PERIOD as f64 * frames_per_tic).rem_euclid(buffer_size.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_absolute_delay() {
        assert_relative_eq!(
            absolute_delay(44100, 1024, 120.0, 1.0),
            1.345_825_195_312_5,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            absolute_delay(44100, 1024, 120.0, 2.0),
            absolute_delay(44100, 1024, 240.0, 1.0)
        );
        assert_eq!(absolute_delay(44100, 0, 120.0, 1.0), 0.0);
    }

    #[test]
    fn test_integer_grid() {
        let mut delay = [0.0; TABLE_LEN];
        let mut attack = [0; TABLE_LEN];
        // 2 periods per tic exactly
        fill(0.0, 512.0, 256, &mut delay, &mut attack);
        assert!(delay.iter().all(|&d| d == 2.0));
        assert!(attack.iter().all(|&a| a == 0));
    }

    #[test]
    fn test_fractional_distribution() {
        let mut delay = [0.0; TABLE_LEN];
        let mut attack = [0; TABLE_LEN];
        fill(0.0, 1.5 * 100.0, 100, &mut delay, &mut attack);
        assert_eq!(&attack[..4], &[0, 50, 0, 50]);
        assert_relative_eq!(delay.iter().sum::<f64>(), 1.5 * TABLE_LEN as f64);
    }

    #[test]
    fn test_next_phase_wraps() {
        assert_relative_eq!(next_phase(10.0, 100.5, 64), (10.0 + 1608.0f64).rem_euclid(64.0));
    }
}
