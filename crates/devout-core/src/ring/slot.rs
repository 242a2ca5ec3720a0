//! Slot storage and the RAII guards handed out by [`OutputRing`](super::OutputRing).

use core::cell::UnsafeCell;
use core::ops::Range;
use std::sync::atomic::{AtomicIsize, Ordering};

use parking_lot::{MutexGuard, ReentrantMutex, ReentrantMutexGuard};

use super::OutputRing;
use crate::format::Sample;

const MUT_BORROWED: isize = -1;

/// One ring slot: interleaved frames plus its whole-slot lock.
pub(super) struct Slot {
    pub(super) lock: ReentrantMutex<()>,
    /// Borrow state of `data` for the lock owner: 0 free, >0 shared, -1 exclusive.
    borrow: AtomicIsize,
    data: Box<[UnsafeCell<u8>]>,
}

// SAFETY: `data` is only touched through `SlotGuard` (whole-slot lock plus
// every sub-block lock of the slot) or `SubBlockGuard` (one sub-block lock,
// disjoint frames of one channel). `borrow` is only modified by the thread
// holding `lock`.
unsafe impl Sync for Slot {}

impl Slot {
    pub(super) fn new(len: usize) -> Self {
        Self {
            lock: ReentrantMutex::new(()),
            borrow: AtomicIsize::new(0),
            data: (0..len).map(|_| UnsafeCell::new(0)).collect(),
        }
    }

    #[inline]
    pub(super) fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        // UnsafeCell<u8> is repr(transparent) over u8.
        self.data.as_ptr() as *mut u8
    }
}

/// Whole-slot lock, obtained from [`OutputRing::lock_buffer`].
///
/// The underlying mutex is re-entrant, so the same thread may lock a slot it
/// already holds.
pub struct SlotGuard<'a> {
    pub(super) ring: &'a OutputRing,
    pub(super) slot: usize,
    pub(super) _guard: ReentrantMutexGuard<'a, ()>,
}

impl SlotGuard<'_> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Read the slot's bytes. Blocks until no sub-block of the slot is held,
    /// so calling it while this thread holds a [`SubBlockGuard`] of the same
    /// slot deadlocks.
    ///
    /// # Panics
    ///
    /// If called inside [`with_bytes_mut`](Self::with_bytes_mut) on the same slot.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let slot = &self.ring.slots[self.slot];
        let prev = slot.borrow.load(Ordering::Acquire);
        assert!(prev != MUT_BORROWED, "slot {} already mutably borrowed", self.slot);

        let _sub_blocks = if prev == 0 {
            self.ring.lock_all_sub_blocks(self.slot)
        } else {
            Vec::new()
        };
        slot.borrow.store(prev + 1, Ordering::Release);
        let _restore = BorrowRestore {
            borrow: &slot.borrow,
            prev,
        };

        // SAFETY: all sub-block locks of this slot are held (by this call or
        // an enclosing one on this thread) and no exclusive borrow is live.
        let bytes = unsafe { core::slice::from_raw_parts(slot.base() as *const u8, slot.len()) };
        f(bytes)
    }

    /// Mutate the slot's bytes. Blocks until no sub-block of the slot is held;
    /// the same deadlock as [`with_bytes`](Self::with_bytes) applies.
    ///
    /// # Panics
    ///
    /// If the slot is already borrowed through this lock.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let slot = &self.ring.slots[self.slot];
        let prev = slot.borrow.load(Ordering::Acquire);
        assert!(prev == 0, "slot {} already borrowed", self.slot);

        let _sub_blocks = self.ring.lock_all_sub_blocks(self.slot);
        slot.borrow.store(MUT_BORROWED, Ordering::Release);
        let _restore = BorrowRestore {
            borrow: &slot.borrow,
            prev: 0,
        };

        // SAFETY: exclusive: whole-slot lock, every sub-block lock, no other borrow.
        let bytes = unsafe { core::slice::from_raw_parts_mut(slot.base(), slot.len()) };
        f(bytes)
    }

    pub fn fill_zero(&self) {
        self.with_bytes_mut(|bytes| bytes.fill(0));
    }
}

/// Puts a slot's borrow state back, also when the closure unwinds. Dropped
/// before the sub-block locks it was taken under.
struct BorrowRestore<'a> {
    borrow: &'a AtomicIsize,
    prev: isize,
}

impl Drop for BorrowRestore<'_> {
    fn drop(&mut self) {
        self.borrow.store(self.prev, Ordering::Release);
    }
}

/// One `(channel, sub_block)` region of a slot, obtained from
/// [`OutputRing::try_lock_sub_block`].
pub struct SubBlockGuard<'a> {
    pub(super) ring: &'a OutputRing,
    pub(super) slot: usize,
    pub(super) channel: usize,
    pub(super) sub_block: usize,
    pub(super) frames: Range<usize>,
    pub(super) _guard: MutexGuard<'a, ()>,
}

impl SubBlockGuard<'_> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn sub_block(&self) -> usize {
        self.sub_block
    }

    /// Frame range covered by this sub-block.
    pub fn frames(&self) -> Range<usize> {
        self.frames.clone()
    }

    /// Number of samples (frames of this channel) covered.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    fn sample_offset(&self, frame: usize) -> usize {
        let word = self.ring.format.word_size();
        (frame * self.ring.pcm_channels + self.channel) * word
    }

    /// Copy this region's samples, packed, into `out`. Returns samples copied.
    pub fn read_into(&self, out: &mut [u8]) -> usize {
        let word = self.ring.format.word_size();
        let count = self.len().min(out.len() / word);
        let base = self.ring.slots[self.slot].base();

        for (i, frame) in self.frames.clone().take(count).enumerate() {
            // SAFETY: in-bounds by layout; this sub-block lock covers these
            // bytes and no whole-slot borrow can be live concurrently.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    base.add(self.sample_offset(frame)) as *const u8,
                    out.as_mut_ptr().add(i * word),
                    word,
                );
            }
        }
        count
    }

    /// Copy packed samples from `src` into this region. Returns samples copied.
    pub fn write_from(&self, src: &[u8]) -> usize {
        let word = self.ring.format.word_size();
        let count = self.len().min(src.len() / word);
        let base = self.ring.slots[self.slot].base();

        for (i, frame) in self.frames.clone().take(count).enumerate() {
            // SAFETY: see `read_into`.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    src.as_ptr().add(i * word),
                    base.add(self.sample_offset(frame)),
                    word,
                );
            }
        }
        count
    }

    /// Typed write. Returns 0 if `T` does not match the ring's word size.
    pub fn write_samples<T: Sample>(&self, src: &[T]) -> usize {
        if T::SIZE != self.ring.format.word_size() {
            return 0;
        }
        let mut word = [0u8; 16];
        let mut written = 0;
        for (sample, frame) in src.iter().zip(self.frames.clone()) {
            sample.write_ne(&mut word);
            // SAFETY: see `read_into`.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    word.as_ptr(),
                    self.ring.slots[self.slot].base().add(self.sample_offset(frame)),
                    T::SIZE,
                );
            }
            written += 1;
        }
        written
    }

    /// Typed read. Returns 0 if `T` does not match the ring's word size.
    pub fn read_samples<T: Sample>(&self, out: &mut [T]) -> usize {
        if T::SIZE != self.ring.format.word_size() {
            return 0;
        }
        let mut word = [0u8; 16];
        let mut read = 0;
        for (sample, frame) in out.iter_mut().zip(self.frames.clone()) {
            // SAFETY: see `read_into`.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    self.ring.slots[self.slot].base().add(self.sample_offset(frame)) as *const u8,
                    word.as_mut_ptr(),
                    T::SIZE,
                );
            }
            *sample = T::read_ne(&word);
            read += 1;
        }
        read
    }

    pub fn fill_zero(&self) {
        let word = self.ring.format.word_size();
        let base = self.ring.slots[self.slot].base();
        for frame in self.frames.clone() {
            // SAFETY: see `read_into`.
            unsafe {
                core::ptr::write_bytes(base.add(self.sample_offset(frame)), 0, word);
            }
        }
    }
}
