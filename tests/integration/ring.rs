//! Output ring integration tests
//!
//! Producers write disjoint sub-blocks from many threads while the devout
//! owns the ring.

use std::sync::{Arc, Barrier};
use std::thread;

use devout::prelude::*;

use crate::helpers::*;

/// One thread per (channel, sub-block); each stamps its own id across its
/// frames. A whole-slot read afterwards sees every stamp where it belongs.
#[test]
fn test_concurrent_sub_block_writers() {
    let (devout, _) = test_alsa();
    devout.init().unwrap();

    let channels = devout.presets().pcm_channels;
    let sub_blocks = devout.sub_block_count();
    let handle = devout.buffer();
    let barrier = Arc::new(Barrier::new(channels * sub_blocks));

    let workers: Vec<_> = (0..channels)
        .flat_map(|channel| (0..sub_blocks).map(move |sub_block| (channel, sub_block)))
        .map(|(channel, sub_block)| {
            let devout = devout.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let stamp = (channel * 100 + sub_block) as i16;
                barrier.wait();
                for _ in 0..200 {
                    let ring = devout.state().ring();
                    let guard = ring
                        .try_lock_sub_block(handle, channel, sub_block)
                        .unwrap()
                        .expect("sub-block owned by another writer");
                    let samples = vec![stamp; guard.len()];
                    assert_eq!(guard.write_samples(&samples), guard.len());
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let ring = devout.state().ring();
    let mut interleaved = vec![0i16; TEST_BUFFER_SIZE * channels];
    ring.lock_buffer(handle).unwrap().with_bytes(|bytes| {
        devout::core::format::samples_from_bytes(bytes, &mut interleaved)
    });
    for sub_block in 0..sub_blocks {
        for frame in ring.sub_block_frames(sub_block) {
            for channel in 0..channels {
                assert_eq!(
                    interleaved[frame * channels + channel],
                    (channel * 100 + sub_block) as i16,
                    "frame {} channel {}",
                    frame,
                    channel
                );
            }
        }
    }
}

/// A whole-slot lock excludes sub-block writers on that slot only.
#[test]
fn test_slot_lock_excludes_sub_blocks() {
    let (devout, _) = test_alsa();
    let ring = devout.state().ring();
    let current = ring.buffer();
    let next = ring.next_buffer();

    let slot = ring.lock_buffer(current).unwrap();
    slot.with_bytes(|_| {
        assert!(ring.try_lock_sub_block(current, 0, 0).unwrap().is_none());
        assert!(ring.try_lock_sub_block(next, 0, 0).unwrap().is_some());
    });
    drop(slot);
    assert!(ring.try_lock_sub_block(current, 1, 3).unwrap().is_some());
}

/// Changing presets reallocates the ring and invalidates old handles.
#[test]
fn test_presets_change_reallocates() {
    let (devout, _) = test_alsa();
    let stale = devout.buffer();

    devout
        .set_presets(Presets::new(4, 48000, 256, SampleFormat::Float))
        .unwrap();
    let ring = devout.state().ring();
    assert_eq!(ring.layout().slot_bytes, 4 * 256 * 4);
    assert!(ring.lock_buffer(stale).is_err());
    assert!(ring.lock_buffer(devout.buffer()).is_ok());
    drop(ring);

    assert!(
        (devout.absolute_delay() - 60.0 * (48000.0 / 256.0) / 120.0 / 16.0).abs() < 1e-9
    );
}
