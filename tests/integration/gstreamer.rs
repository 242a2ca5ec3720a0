//! GStreamer-style devout integration tests
//!
//! A test thread plays the audio server: it calls `process()` once per
//! period while the main thread drives `play()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use devout::prelude::*;

use crate::helpers::tolerances::*;
use crate::helpers::*;

/// Server loop: process periods until told to quit, returning how many were delivered.
fn spawn_server(
    devout: Arc<GstreamerDevout>,
    quit: Arc<AtomicBool>,
) -> thread::JoinHandle<usize> {
    thread::spawn(move || {
        let mut delivered = 0;
        while !quit.load(Ordering::Acquire) {
            if devout.client().process(Duration::from_millis(5)) {
                delivered += 1;
            }
        }
        delivered
    })
}

#[test]
fn test_server_drains_every_period() {
    let devout = test_gstreamer();
    devout.client().activate();
    devout.init().unwrap();

    let quit = Arc::new(AtomicBool::new(false));
    let server = spawn_server(devout.clone(), quit.clone());

    for _ in 0..12 {
        devout.play();
    }
    quit.store(true, Ordering::Release);
    let delivered = server.join().unwrap();

    // the first period bypasses the handshake
    assert_eq!(delivered, 11);
    assert_eq!(devout.buffer().slot(), 12 % 8);
    assert!(devout.note_offset() > 0);
}

#[test]
fn test_ports_carry_slot_audio() {
    let devout = test_gstreamer();
    devout.client().activate();
    devout.init().unwrap();
    devout.play();

    let frames = interleaved_i16(TEST_BUFFER_SIZE, &[8192, -32767]);
    {
        let ring = devout.state().ring();
        let slot = ring.lock_buffer(ring.next_buffer()).unwrap();
        slot.with_bytes_mut(|bytes| devout::core::format::samples_to_bytes(&frames, bytes));
    }

    let quit = Arc::new(AtomicBool::new(false));
    let server = spawn_server(devout.clone(), quit.clone());
    devout.play();
    quit.store(true, Ordering::Release);
    assert_eq!(server.join().unwrap(), 1);

    let ports = devout.client().ports();
    assert_eq!(ports.len(), 2);
    let left = ports[0].samples();
    let right = ports[1].samples();
    assert_eq!(left.len(), TEST_BUFFER_SIZE);
    assert!(left.iter().all(|s| (s - 8192.0 / 32767.0).abs() <= INT16_EPSILON));
    assert!((peak(&right) - 1.0).abs() <= INT16_EPSILON);
}

/// `stop()` must release a `play()` parked on a server that never calls back.
#[test]
fn test_stop_unblocks_parked_play() {
    let devout = test_gstreamer();
    devout.client().activate();
    devout.init().unwrap();
    devout.play();

    let (tx, rx) = mpsc::channel();
    let player = {
        let devout = devout.clone();
        thread::spawn(move || {
            devout.play();
            let _ = tx.send(devout.status());
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    devout.stop();

    let status = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("play() stayed parked after stop()");
    assert_eq!(status, SoundcardStatus::Uninitialized);
    player.join().unwrap();
    assert_eq!(devout.status(), SoundcardStatus::Uninitialized);
}

/// A server waiting in `process()` is released by `stop()` too.
#[test]
fn test_stop_releases_waiting_server() {
    let devout = test_gstreamer();
    devout.client().activate();
    devout.init().unwrap();

    let server = {
        let devout = devout.clone();
        thread::spawn(move || devout.client().process(Duration::from_secs(30)))
    };
    thread::sleep(Duration::from_millis(20));
    devout.stop();
    assert!(!server.join().unwrap());
}

#[test]
fn test_restart_after_stop() {
    let devout = test_gstreamer();
    devout.client().activate();
    devout.init().unwrap();
    devout.play();
    devout.stop();

    devout.init().unwrap();
    assert!(devout.is_starting());
    // bypassed again, so no server is needed
    devout.play();
    assert_eq!(devout.status(), SoundcardStatus::Playing);
}
