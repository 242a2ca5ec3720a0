//! Atomic cells behind the soundcard's status flags and tempo mirrors.
//!
//! The play path and the launcher thread read these every period without
//! taking the state locks.

use atomic_float::AtomicF64;
use std::sync::atomic::{AtomicBool, Ordering};

/// One soundcard status bit (`initialized`, `playing`, `starting`, ...).
///
/// Padded to its own cache line; the flags of one devout sit next to each
/// other and are written from different threads.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct AtomicFlag(AtomicBool);

impl AtomicFlag {
    pub const fn new(value: bool) -> Self {
        Self(AtomicBool::new(value))
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::Release);
    }

    /// Clear the flag, returning whether it was set. Only one caller sees `true`.
    #[inline]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Last accepted bpm or delay factor, mirrored out of the tick table.
#[derive(Debug)]
pub struct AtomicDouble(AtomicF64);

impl AtomicDouble {
    pub fn new(value: f64) -> Self {
        Self(AtomicF64::new(value))
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.0.store(value, Ordering::Release);
    }
}

impl Default for AtomicDouble {
    fn default() -> Self {
        Self::new(0.0)
    }
}
