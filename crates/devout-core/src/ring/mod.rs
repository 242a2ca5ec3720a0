//! N-slot output buffer ring shared by the mixer and the device writer.
//!
//! Exactly one slot is *current* (filled by producers). The device reads the
//! slot after it, and [`OutputRing::switch_buffer_flag`] advances the ring by
//! one step per hardware period.
//!
//! Slots are addressed by [`BufferHandle`] rather than by pointer. Every
//! [`OutputRing::realloc`] bumps the ring generation, and a handle from an
//! older generation is rejected with [`Error::StaleBuffer`].

mod slot;

pub use slot::{SlotGuard, SubBlockGuard};

use core::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::config::Presets;
use crate::format::SampleFormat;
use crate::{Error, Result};
use slot::Slot;

/// Number of ring slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingSlots {
    Four,
    Eight,
}

impl RingSlots {
    #[inline]
    pub const fn count(self) -> usize {
        match self {
            RingSlots::Four => 4,
            RingSlots::Eight => 8,
        }
    }
}

/// Identifies one slot at one ring generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    slot: usize,
    generation: u64,
}

impl BufferHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Current shape of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLayout {
    pub slots: usize,
    pub pcm_channels: usize,
    pub buffer_size: usize,
    pub format: SampleFormat,
    pub sub_block_count: usize,
    pub slot_bytes: usize,
    pub generation: u64,
}

pub struct OutputRing {
    slots: Vec<Slot>,
    /// Indexed `slot * channels * sbc + channel * sbc + sub_block`.
    sub_block_locks: Vec<Mutex<()>>,
    current: AtomicUsize,
    generation: u64,
    pcm_channels: usize,
    buffer_size: usize,
    format: SampleFormat,
    sub_block_count: usize,
}

impl OutputRing {
    pub fn new(slots: RingSlots, presets: &Presets, sub_block_count: usize) -> Self {
        let count = slots.count();
        let slot_bytes = presets.slot_bytes();
        let sub_block_count = sub_block_count.max(1);

        Self {
            slots: (0..count).map(|_| Slot::new(slot_bytes)).collect(),
            sub_block_locks: (0..count * presets.pcm_channels * sub_block_count)
                .map(|_| Mutex::new(()))
                .collect(),
            current: AtomicUsize::new(0),
            generation: 0,
            pcm_channels: presets.pcm_channels,
            buffer_size: presets.buffer_size,
            format: presets.format,
            sub_block_count,
        }
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn layout(&self) -> RingLayout {
        RingLayout {
            slots: self.slots.len(),
            pcm_channels: self.pcm_channels,
            buffer_size: self.buffer_size,
            format: self.format,
            sub_block_count: self.sub_block_count,
            slot_bytes: self.slots.first().map_or(0, Slot::len),
            generation: self.generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sub_block_count(&self) -> usize {
        self.sub_block_count
    }

    /// Index of the current slot.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    #[inline]
    fn handle(&self, slot: usize) -> BufferHandle {
        BufferHandle {
            slot,
            generation: self.generation,
        }
    }

    /// The slot producers are filling.
    pub fn buffer(&self) -> BufferHandle {
        self.handle(self.current_index())
    }

    /// The slot the device should play next.
    pub fn next_buffer(&self) -> BufferHandle {
        let n = self.slots.len();
        self.handle((self.current_index() + 1) % n)
    }

    /// The slot before current, played during the last period.
    pub fn prev_buffer(&self) -> BufferHandle {
        let n = self.slots.len();
        self.handle((self.current_index() + n - 1) % n)
    }

    /// Advance current by exactly one slot.
    pub fn switch_buffer_flag(&self) {
        let n = self.slots.len();
        let _ = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % n));
    }

    fn check(&self, handle: BufferHandle) -> Result<()> {
        if handle.generation != self.generation || handle.slot >= self.slots.len() {
            return Err(Error::StaleBuffer {
                slot: handle.slot,
                handle: handle.generation,
                current: self.generation,
            });
        }
        Ok(())
    }

    /// Acquire the whole-slot lock. Re-entrant for the owning thread.
    pub fn lock_buffer(&self, handle: BufferHandle) -> Result<SlotGuard<'_>> {
        self.check(handle)?;
        Ok(SlotGuard {
            ring: self,
            slot: handle.slot,
            _guard: self.slots[handle.slot].lock.lock(),
        })
    }

    /// Like [`lock_buffer`](Self::lock_buffer) but never blocks.
    pub fn try_lock_buffer(&self, handle: BufferHandle) -> Result<Option<SlotGuard<'_>>> {
        self.check(handle)?;
        Ok(self.slots[handle.slot]
            .lock
            .try_lock()
            .map(|guard| SlotGuard {
                ring: self,
                slot: handle.slot,
                _guard: guard,
            }))
    }

    /// Frames covered by `sub_block`. The last sub-block absorbs the remainder.
    pub fn sub_block_frames(&self, sub_block: usize) -> Range<usize> {
        let len = self.buffer_size / self.sub_block_count;
        let start = sub_block * len;
        if sub_block + 1 == self.sub_block_count {
            start..self.buffer_size
        } else {
            start..start + len
        }
    }

    #[inline]
    fn sub_block_index(&self, slot: usize, channel: usize, sub_block: usize) -> usize {
        let sbc = self.sub_block_count;
        slot * self.pcm_channels * sbc + channel * sbc + sub_block
    }

    /// Non-blocking claim of one channel's sub-block in a slot.
    ///
    /// `Ok(None)` means another writer (or a whole-slot borrow) holds it.
    pub fn try_lock_sub_block(
        &self,
        handle: BufferHandle,
        channel: usize,
        sub_block: usize,
    ) -> Result<Option<SubBlockGuard<'_>>> {
        self.check(handle)?;
        if channel >= self.pcm_channels || sub_block >= self.sub_block_count {
            return Err(Error::SubBlockOutOfRange { channel, sub_block });
        }

        let index = self.sub_block_index(handle.slot, channel, sub_block);
        Ok(self.sub_block_locks[index].try_lock().map(|guard| SubBlockGuard {
            ring: self,
            slot: handle.slot,
            channel,
            sub_block,
            frames: self.sub_block_frames(sub_block),
            _guard: guard,
        }))
    }

    /// Locks every sub-block of `slot` in index order.
    fn lock_all_sub_blocks(&self, slot: usize) -> Vec<MutexGuard<'_, ()>> {
        let start = self.sub_block_index(slot, 0, 0);
        let end = start + self.pcm_channels * self.sub_block_count;
        self.sub_block_locks[start..end].iter().map(|m| m.lock()).collect()
    }

    /// Zero one slot.
    pub fn clear(&self, handle: BufferHandle) -> Result<()> {
        self.lock_buffer(handle)?.fill_zero();
        Ok(())
    }

    /// Zero every slot.
    pub fn clear_all(&self) {
        for slot in 0..self.slots.len() {
            if let Ok(guard) = self.lock_buffer(self.handle(slot)) {
                guard.fill_zero();
            }
        }
    }

    /// Drop and reallocate every slot for a new shape.
    ///
    /// Existing sub-block locks are kept where the pool index range survives.
    pub fn realloc(&mut self, pcm_channels: usize, buffer_size: usize, format: SampleFormat) {
        let n = self.slots.len();
        let slot_bytes = pcm_channels * buffer_size * format.word_size();

        self.slots = (0..n).map(|_| Slot::new(slot_bytes)).collect();
        self.pcm_channels = pcm_channels;
        self.buffer_size = buffer_size;
        self.format = format;
        self.sub_block_locks
            .resize_with(n * pcm_channels * self.sub_block_count, Mutex::default);
        self.generation += 1;

        debug!(
            slots = n,
            pcm_channels,
            buffer_size,
            ?format,
            generation = self.generation,
            "Output ring reallocated"
        );
    }

    pub fn set_sub_block_count(&mut self, sub_block_count: usize) {
        self.sub_block_count = sub_block_count.max(1);
        let n = self.slots.len();
        self.sub_block_locks
            .resize_with(n * self.pcm_channels * self.sub_block_count, Mutex::default);
    }
}

impl core::fmt::Debug for OutputRing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OutputRing")
            .field("layout", &self.layout())
            .field("current", &self.current_index())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ring(slots: RingSlots) -> OutputRing {
        OutputRing::new(slots, &Presets::new(2, 44100, 64, SampleFormat::Signed16), 4)
    }

    #[test]
    fn test_slot_layout() {
        let ring = ring(RingSlots::Four);
        let layout = ring.layout();
        assert_eq!(layout.slots, 4);
        assert_eq!(layout.slot_bytes, 2 * 64 * 2);
        assert_eq!(layout.generation, 0);
        assert_eq!(ring.sub_block_locks.len(), 4 * 2 * 4);
    }

    #[test]
    fn test_neighbour_handles() {
        let ring = ring(RingSlots::Four);
        assert_eq!(ring.buffer().slot(), 0);
        assert_eq!(ring.next_buffer().slot(), 1);
        assert_eq!(ring.prev_buffer().slot(), 3);

        ring.switch_buffer_flag();
        assert_eq!(ring.buffer().slot(), 1);
        assert_eq!(ring.prev_buffer().slot(), 0);
    }

    #[test]
    fn test_reentrant_lock() {
        let ring = ring(RingSlots::Four);
        let handle = ring.buffer();
        let outer = ring.lock_buffer(handle).unwrap();
        let inner = ring.lock_buffer(handle).unwrap();
        inner.with_bytes_mut(|b| b[0] = 7);
        outer.with_bytes(|b| assert_eq!(b[0], 7));
    }

    #[test]
    fn test_nested_shared_borrow() {
        let ring = ring(RingSlots::Four);
        let guard = ring.lock_buffer(ring.buffer()).unwrap();
        guard.with_bytes(|outer| {
            guard.with_bytes(|inner| assert_eq!(outer.len(), inner.len()));
        });
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn test_nested_mut_borrow_panics() {
        let ring = ring(RingSlots::Four);
        let guard = ring.lock_buffer(ring.buffer()).unwrap();
        guard.with_bytes(|_| guard.with_bytes_mut(|_| ()));
    }

    #[test]
    fn test_borrow_released_after_panic() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let ring = ring(RingSlots::Four);
        let guard = ring.lock_buffer(ring.buffer()).unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| {
            guard.with_bytes_mut(|_| panic!("writer failed"));
        }));
        assert!(result.is_err());
        let result = catch_unwind(AssertUnwindSafe(|| {
            guard.with_bytes(|_| panic!("reader failed"));
        }));
        assert!(result.is_err());

        guard.with_bytes_mut(|b| b[0] = 3);
        guard.with_bytes(|b| assert_eq!(b[0], 3));
        drop(guard);
        assert!(ring.try_lock_sub_block(ring.buffer(), 0, 0).unwrap().is_some());
    }

    #[test]
    fn test_stale_handle_after_realloc() {
        let mut ring = ring(RingSlots::Eight);
        let stale = ring.next_buffer();
        ring.realloc(4, 128, SampleFormat::Float);

        assert!(matches!(
            ring.lock_buffer(stale),
            Err(Error::StaleBuffer { handle: 0, current: 1, .. })
        ));
        assert!(ring.try_lock_sub_block(stale, 0, 0).is_err());
        assert!(ring.lock_buffer(ring.next_buffer()).is_ok());
        assert_eq!(ring.layout().slot_bytes, 4 * 128 * 4);
        assert_eq!(ring.sub_block_locks.len(), 8 * 4 * 4);
    }

    #[test]
    fn test_sub_block_frames() {
        let mut ring = OutputRing::new(
            RingSlots::Four,
            &Presets::new(1, 44100, 10, SampleFormat::Float),
            3,
        );
        assert_eq!(ring.sub_block_frames(0), 0..3);
        assert_eq!(ring.sub_block_frames(1), 3..6);
        assert_eq!(ring.sub_block_frames(2), 6..10);

        ring.set_sub_block_count(2);
        assert_eq!(ring.sub_block_frames(1), 5..10);
        assert_eq!(ring.sub_block_locks.len(), 4 * 2);
    }

    #[test]
    fn test_sub_block_out_of_range() {
        let ring = ring(RingSlots::Four);
        let h = ring.buffer();
        assert_eq!(
            ring.try_lock_sub_block(h, 2, 0).err(),
            Some(Error::SubBlockOutOfRange { channel: 2, sub_block: 0 })
        );
        assert!(ring.try_lock_sub_block(h, 0, 4).is_err());
    }

    #[test]
    fn test_sub_block_writes_interleave() {
        let ring = ring(RingSlots::Four);
        let h = ring.buffer();

        let left = ring.try_lock_sub_block(h, 0, 1).unwrap().unwrap();
        let right = ring.try_lock_sub_block(h, 1, 1).unwrap().unwrap();
        assert_eq!(left.frames(), 16..32);
        assert_eq!(left.write_samples(&[100i16; 16]), 16);
        assert_eq!(right.write_samples(&[-100i16; 16]), 16);
        assert_eq!(left.write_samples(&[1.0f32; 16]), 0);

        let mut back = [0i16; 16];
        assert_eq!(right.read_samples(&mut back), 16);
        assert_eq!(back, [-100; 16]);
        drop((left, right));

        let guard = ring.lock_buffer(h).unwrap();
        guard.with_bytes(|bytes| {
            let frame = 16 * 4;
            assert_eq!(i16::from_ne_bytes([bytes[frame], bytes[frame + 1]]), 100);
            assert_eq!(i16::from_ne_bytes([bytes[frame + 2], bytes[frame + 3]]), -100);
            assert_eq!(bytes[0], 0);
        });
    }

    #[test]
    fn test_sub_block_contention() {
        let ring = ring(RingSlots::Four);
        let h = ring.buffer();
        let held = ring.try_lock_sub_block(h, 0, 0).unwrap();
        assert!(held.is_some());
        assert!(ring.try_lock_sub_block(h, 0, 0).unwrap().is_none());
        assert!(ring.try_lock_sub_block(h, 0, 1).unwrap().is_some());
        drop(held);
        assert!(ring.try_lock_sub_block(h, 0, 0).unwrap().is_some());
    }

    #[test]
    fn test_whole_slot_borrow_excludes_sub_blocks() {
        let ring = ring(RingSlots::Four);
        let h = ring.buffer();
        let guard = ring.lock_buffer(h).unwrap();
        guard.with_bytes_mut(|_| {
            assert!(ring.try_lock_sub_block(h, 1, 3).unwrap().is_none());
        });
        assert!(ring.try_lock_sub_block(h, 1, 3).unwrap().is_some());
    }

    #[test]
    fn test_clear() {
        let ring = ring(RingSlots::Four);
        let h = ring.prev_buffer();
        ring.lock_buffer(h).unwrap().with_bytes_mut(|b| b.fill(0xAB));
        ring.clear(h).unwrap();
        ring.lock_buffer(h)
            .unwrap()
            .with_bytes(|b| assert!(b.iter().all(|&x| x == 0)));
    }

    #[test]
    fn test_sub_block_raw_copy() {
        let ring = ring(RingSlots::Four);
        let h = ring.next_buffer();
        let sb = ring.try_lock_sub_block(h, 1, 3).unwrap().unwrap();
        let src: Vec<u8> = (0..32u8).collect();
        assert_eq!(sb.write_from(&src), 16);

        let mut out = [0u8; 32];
        assert_eq!(sb.read_into(&mut out), 16);
        assert_eq!(&out[..], &src[..]);

        sb.fill_zero();
        sb.read_into(&mut out);
        assert!(out.iter().all(|&b| b == 0));
    }

    proptest! {
        #[test]
        fn prop_full_cycle_returns_to_start(four in any::<bool>(), start in 0usize..8) {
            let slots = if four { RingSlots::Four } else { RingSlots::Eight };
            let ring = ring(slots);
            for _ in 0..start {
                ring.switch_buffer_flag();
            }
            let before = ring.buffer();
            for _ in 0..slots.count() {
                ring.switch_buffer_flag();
            }
            prop_assert_eq!(ring.buffer(), before);
        }
    }
}
