//! Tolerance constants for soundcard and DSP testing.

/// Floating point rounding errors (passthrough, exact gain).
pub const FLOAT_EPSILON: f64 = 1e-9;

/// Normalized port samples decoded from 16-bit integers.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;

/// Note counting against `periods / absolute_delay`.
/// One note of slack for the frame-floored delay boundary.
pub const NOTE_TOLERANCE: f64 = 1.0;
