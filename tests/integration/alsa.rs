//! ALSA-style devout integration tests
//!
//! Negotiation, device-name fallback and play-path recovery against the
//! dummy PCM device.

use std::sync::Arc;

use devout::core::Error as CoreError;
use devout::prelude::*;
use devout::{DummyCard, Endian, PcmFormat};

use crate::helpers::*;

fn devout_on(cards: Vec<DummyCard>) -> (Arc<AlsaDevout<DummyPcm>>, Arc<devout::DummyProbe>) {
    let pcm = DummyPcm::new(cards);
    let probe = pcm.probe();
    let devout = DevoutBuilder::new()
        .presets(test_presets())
        .launcher(Arc::new(InlineLauncher))
        .build_alsa(pcm)
        .unwrap();
    (devout, probe)
}

#[test]
fn test_lifecycle() {
    let (devout, probe) = test_alsa();
    assert_eq!(devout.status(), SoundcardStatus::Uninitialized);

    devout.init().unwrap();
    assert_eq!(devout.status(), SoundcardStatus::Initialized);
    assert_eq!(devout.device(), None);
    assert_eq!(probe.open_attempts(), ["hw:0"]);

    devout.play();
    assert_eq!(devout.status(), SoundcardStatus::Playing);

    devout.stop();
    assert_eq!(devout.status(), SoundcardStatus::Uninitialized);
    devout.play();
    assert_eq!(probe.writes(), 1);
}

#[test]
fn test_subdevice_falls_back_to_card() {
    let (devout, probe) = devout_on(vec![
        DummyCard::new("hw:0", "Onboard"),
        DummyCard::new("hw:1", "USB Audio"),
    ]);
    devout.set_device("hw:1,0").unwrap();
    devout.init().unwrap();

    assert_eq!(probe.open_attempts(), ["hw:1,0", "hw:1"]);
    assert_eq!(devout.negotiated().map(|n| n.channels), Some(2));
}

#[test]
fn test_negotiation_errors_surface() {
    let mut card = DummyCard::new("hw:0", "Float only");
    card.formats = vec![SampleFormat::Float];
    let (devout, _) = devout_on(vec![card]);

    let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
    {
        let events = events.clone();
        devout.add_listener(Box::new(move |event| events.lock().push(event.clone())));
    }

    let err = devout.init().unwrap_err();
    assert!(matches!(err, CoreError::SampleFormatUnavailable(_)));
    assert_eq!(devout.status(), SoundcardStatus::Uninitialized);
    assert!(matches!(events.lock().as_slice(), [SoundcardEvent::Error(_)]));

    // a supported format succeeds on the same device
    devout
        .set_presets(Presets::new(2, 44100, 1024, SampleFormat::Float))
        .unwrap();
    devout.init().unwrap();
    assert_eq!(devout.status(), SoundcardStatus::Initialized);
}

#[test]
fn test_big_endian_unsigned_target() {
    let mut card = DummyCard::new("hw:0", "Odd codec");
    card.endian = Endian::Big;
    card.signed = false;
    let (devout, probe) = devout_on(vec![card]);
    devout.init().unwrap();
    assert_eq!(
        devout.negotiated().map(|n| n.format),
        Some(PcmFormat {
            format: SampleFormat::Signed16,
            endian: Endian::Big,
            signed: false,
        })
    );

    let frames = interleaved_i16(TEST_BUFFER_SIZE, &[0x0102, -1]);
    {
        let ring = devout.state().ring();
        let slot = ring.lock_buffer(ring.next_buffer()).unwrap();
        slot.with_bytes_mut(|bytes| devout::core::format::samples_to_bytes(&frames, bytes));
    }
    devout.play();

    let written = probe.take_written();
    assert_eq!(written.len(), TEST_BUFFER_SIZE * 2 * 2);
    // 0x0102 ^ 0x8000 big-endian, then -1 (0xffff) ^ 0x8000
    assert_eq!(&written[..4], &[0x81, 0x02, 0x7f, 0xff]);
}

#[test]
fn test_recovers_from_underrun_and_suspend() {
    let (devout, probe) = test_alsa();
    devout.init().unwrap();

    probe.inject_underrun();
    devout.play();
    probe.inject_suspend(5);
    devout.play();
    devout.play();

    assert_eq!(probe.prepares(), 1);
    assert_eq!(probe.resumes(), 6);
    assert_eq!(probe.writes(), 3);
    assert_eq!(devout.buffer().slot(), 3);
}

#[test]
fn test_filled_slot_plays_after_rotation() {
    let (devout, probe) = test_alsa();
    devout.init().unwrap();

    // producers fill the current slot; it is played N-1 periods later
    let frames = interleaved_i16(TEST_BUFFER_SIZE, &[1000, -1000]);
    {
        let ring = devout.state().ring();
        let slot = ring.lock_buffer(ring.buffer()).unwrap();
        slot.with_bytes_mut(|bytes| devout::core::format::samples_to_bytes(&frames, bytes));
    }

    for period in 0..4 {
        probe.take_written();
        devout.play();
        let written = probe.take_written();
        let silent = written.iter().all(|&b| b == 0);
        assert_eq!(silent, period != 3, "period {}", period);
    }
}

/// Dropping a playing devout while its default launcher still holds queued
/// tasks releases the devout, and its launcher, on the launcher's own worker.
#[test]
fn test_drop_with_queued_tasks() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Once;
    use std::time::Duration;

    static WORKER_PANICKED: AtomicBool = AtomicBool::new(false);
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if std::thread::current().name() == Some("devout-task-launcher") {
                WORKER_PANICKED.store(true, Ordering::SeqCst);
            }
            previous(info);
        }));
    });

    init_tracing();
    for _ in 0..20 {
        let pcm = DummyPcm::single();
        let probe = pcm.probe();
        let devout = DevoutBuilder::new()
            .presets(test_presets())
            .build_alsa(pcm)
            .unwrap();
        devout.init().unwrap();
        for _ in 0..200 {
            devout.play();
        }
        drop(devout);

        // the pcm is released once the last queued task has run
        assert!(wait_until(Duration::from_secs(5), || Arc::strong_count(&probe) == 1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!WORKER_PANICKED.load(Ordering::SeqCst));
    }
}
