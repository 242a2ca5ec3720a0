//! Test helpers and fixtures for devout integration tests
//!
//! Every backend here runs on [`DummyPcm`] or a test-driven gstreamer
//! client; nothing touches real audio hardware.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-9): Exact operations (identity pitch on floats)
//! - `INT16_EPSILON`: 16-bit quantization on normalized port samples
//! - `NOTE_TOLERANCE` (1.0): Tick counting against the ideal note count

#![allow(dead_code)]

pub mod tolerances;

use std::sync::Arc;
use std::time::{Duration, Instant};

use devout::prelude::*;
use devout::DummyProbe;

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Standard period size for deterministic testing
pub const TEST_BUFFER_SIZE: usize = 1024;

pub const TEST_BPM: f64 = 120.0;

pub fn test_presets() -> Presets {
    Presets::new(2, TEST_SAMPLE_RATE, TEST_BUFFER_SIZE, SampleFormat::Signed16)
}

/// Route `tracing` output through the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// ALSA-style devout on a single dummy card, with inline task execution.
pub fn test_alsa() -> (Arc<AlsaDevout<DummyPcm>>, Arc<DummyProbe>) {
    init_tracing();
    let pcm = DummyPcm::single();
    let probe = pcm.probe();
    let devout = DevoutBuilder::new()
        .presets(test_presets())
        .bpm(TEST_BPM)
        .launcher(Arc::new(InlineLauncher))
        .build_alsa(pcm)
        .expect("Failed to create test devout");
    (devout, probe)
}

/// GStreamer-style devout with inline task execution. The client starts
/// deactivated.
pub fn test_gstreamer() -> Arc<GstreamerDevout> {
    init_tracing();
    DevoutBuilder::new()
        .presets(test_presets())
        .bpm(TEST_BPM)
        .launcher(Arc::new(InlineLauncher))
        .build_gstreamer()
        .expect("Failed to create test devout")
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: u32, num_samples: usize) -> Vec<f64> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (2.0 * std::f64::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Integer staircase [0, 1, 2, ..., n-1].
pub fn generate_staircase(num_samples: usize) -> Vec<i64> {
    (0..num_samples as i64).collect()
}

/// Quantize a normalized signal to 16-bit.
pub fn to_i16(samples: &[f64]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

/// Interleave one 16-bit frame value per channel across `frames` frames.
pub fn interleaved_i16(frames: usize, per_channel: &[i16]) -> Vec<i16> {
    (0..frames)
        .flat_map(|_| per_channel.iter().copied())
        .collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Poll `condition` every millisecond until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
