//! Timing integration tests
//!
//! Drives the delay/attack table through real play periods with inline task
//! execution, so every `tic` happens before `play()` returns.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use devout::prelude::*;
use proptest::prelude::*;

use crate::helpers::tolerances::*;
use crate::helpers::*;

/// 16 periods at 44.1 kHz / 1024 frames / 120 bpm advance about
/// 16 / absolute_delay notes.
#[test]
fn test_end_to_end_note_count() {
    let (devout, probe) = test_alsa();
    devout.init().unwrap();

    let absolute_delay = devout.absolute_delay();
    assert_abs_diff_eq!(absolute_delay, 1.3458251953125, epsilon = FLOAT_EPSILON);

    for _ in 0..16 {
        devout.play();
    }

    let expected = 16.0 / absolute_delay;
    let actual = devout.note_offset() as f64;
    assert!(
        (actual - expected).abs() <= NOTE_TOLERANCE,
        "note_offset {} vs expected {:.3}",
        actual,
        expected
    );
    assert_eq!(probe.writes(), 16);
    assert_eq!(devout.note_offset_absolute(), devout.note_offset());
}

/// Listeners see one `Tic` per period and one `OffsetChanged` per note.
#[test]
fn test_events_follow_ticks() {
    let (devout, _) = test_alsa();
    let tics = Arc::new(AtomicUsize::new(0));
    let last_offset = Arc::new(AtomicU64::new(0));
    let changes = Arc::new(AtomicUsize::new(0));

    {
        let (tics, last_offset, changes) = (tics.clone(), last_offset.clone(), changes.clone());
        devout.add_listener(Box::new(move |event| match event {
            SoundcardEvent::Tic => {
                tics.fetch_add(1, Ordering::Relaxed);
            }
            SoundcardEvent::OffsetChanged(offset) => {
                last_offset.store(*offset, Ordering::Relaxed);
                changes.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }));
    }

    devout.init().unwrap();
    for _ in 0..40 {
        devout.play();
    }

    assert_eq!(tics.load(Ordering::Relaxed), 40);
    assert_eq!(changes.load(Ordering::Relaxed) as u64, devout.note_offset());
    assert_eq!(last_offset.load(Ordering::Relaxed), devout.note_offset());
}

/// The note offset wraps inside the loop while the absolute offset keeps counting.
#[test]
fn test_loop_wrap_through_play() {
    let (devout, _) = test_alsa();
    devout.set_loop(2, 4, true);
    devout.init().unwrap();

    for _ in 0..64 {
        devout.play();
        assert!(devout.note_offset() < 4);
    }
    assert!(devout.note_offset() >= 2);
    assert!(devout.note_offset_absolute() > 4);
    assert!(devout.loop_state().offset > 0);
}

/// Doubling the tempo roughly doubles the notes per period.
#[test]
fn test_tempo_change_mid_run() {
    let (devout, _) = test_alsa();
    devout.init().unwrap();
    for _ in 0..32 {
        devout.play();
    }
    let slow = devout.note_offset();

    devout.set_bpm(240.0).unwrap();
    assert!((devout.absolute_delay() - 1.3458251953125 / 2.0).abs() < FLOAT_EPSILON);
    for _ in 0..32 {
        devout.play();
    }
    let fast = devout.note_offset() - slow;
    assert!(fast > slow, "fast {} slow {}", fast, slow);
}

#[test]
fn test_invalid_tempo_keeps_previous() {
    let (devout, _) = test_alsa();
    assert!(devout.set_bpm(0.0).is_err());
    assert!(devout.set_bpm(f64::NAN).is_err());
    assert_eq!(devout.bpm(), TEST_BPM);
}

#[test]
fn test_stop_rewinds_to_start_offset() {
    let (devout, _) = test_alsa();
    devout.set_start_note_offset(8);
    devout.init().unwrap();
    devout.set_note_offset(8);
    for _ in 0..10 {
        devout.play();
    }
    assert!(devout.note_offset() > 8);

    devout.stop();
    assert_eq!(devout.note_offset(), 8);
    assert_eq!(devout.delay_counter(), 0.0);
    assert_eq!(devout.note_offset_absolute(), 8);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any tempo and period size: after K periods the note offset stays
    /// within one note of K / absolute_delay.
    #[test]
    fn prop_note_count_tracks_tempo(
        bpm in 40.0f64..300.0,
        buffer_size in prop::sample::select(vec![64usize, 128, 256, 512, 1024, 2048]),
        periods in 16usize..400,
    ) {
        let devout = DevoutBuilder::new()
            .buffer_size(buffer_size)
            .bpm(bpm)
            .sub_block_count(1)
            .launcher(Arc::new(InlineLauncher))
            .build_alsa(DummyPcm::single())
            .unwrap();
        devout.init().unwrap();
        for _ in 0..periods {
            devout.play();
        }

        let absolute_delay = devout.absolute_delay();
        prop_assume!(absolute_delay >= 1.0);
        let expected = periods as f64 / absolute_delay;
        prop_assert!((devout.note_offset() as f64 - expected).abs() <= NOTE_TOLERANCE + 0.5);
    }
}
