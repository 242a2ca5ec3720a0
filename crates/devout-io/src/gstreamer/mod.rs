//! GStreamer-style devout: an 8-slot ring drained by an audio-server
//! callback thread through a two-condvar rendezvous.

mod client;
mod devout;

pub use client::{GstreamerClient, GstreamerPort};
pub use devout::{GstreamerDevout, DEVICE_PREFIX};

/// Port name for `channel` on `card`, e.g. `ags0-0001`.
pub fn port_name(card: usize, channel: usize) -> String {
    format!("ags{}-{:04}", card, channel)
}
