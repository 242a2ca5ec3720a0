//! Soundcard output core: sample formats, the multi-buffer output ring,
//! the delay/attack tick table and the soundcard task model.
//!
//! # Primary API
//!
//! - [`OutputRing`]: N-slot ring with whole-slot and sub-block locks
//! - [`DelayAttackTable`]: tempo to hardware-period scheduling
//! - [`Soundcard`]: trait implemented by every device output backend
//! - [`TaskLauncher`]: receives the per-period `tic`/`clear`/`switch` tasks

pub mod config;
pub mod error;
pub mod format;
pub mod lockfree;
pub mod ring;
pub mod soundcard;
pub mod state;
pub mod task;
pub mod timing;

pub use config::{DevoutConfig, LoopConfig, Presets};
pub use error::{Error, Result};
pub use format::{Complex, Sample, SampleFormat, SampleSlice, SampleSliceMut};
pub use lockfree::{AtomicDouble, AtomicFlag};
pub use ring::{BufferHandle, OutputRing, RingLayout, RingSlots, SlotGuard, SubBlockGuard};
pub use soundcard::{CardInfo, PcmInfo, Soundcard, SoundcardEvent, SoundcardStatus};
pub use state::DevoutState;
pub use task::{InlineLauncher, SoundcardTask, TaskKind, TaskLauncher, ThreadLauncher};
pub use timing::{format_uptime, DelayAttackTable, LoopState, TimingSnapshot, PERIOD};
