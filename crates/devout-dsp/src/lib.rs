//! Fast pitch shift over every devout sample format.
//!
//! ```ignore
//! use devout_dsp::{pitch_dispatch, PitchShiftState};
//! use devout_core::{SampleFormat, SampleSlice, SampleSliceMut};
//!
//! let mut state = PitchShiftState::new(SampleFormat::Signed16, 44100, 1024);
//! state.set_tuning(-50.0);
//! pitch_dispatch(&mut state, SampleSlice::Signed16(&src), SampleSliceMut::Signed16(&mut dst))?;
//! ```

mod error;
pub use error::{Error, Result};

mod kernel;
pub use kernel::Frequencies;

mod sample;
pub use sample::PitchSample;

mod state;
pub use state::{pitch_dispatch, PitchShiftState, Scratch, ScratchSet, Vibrato};
