//! Tempo to hardware-period scheduling.
//!
//! [`DelayAttackTable`] turns `(samplerate, buffer_size, bpm, delay_factor)`
//! into a cycle of `(delay, attack)` pairs: how many hardware periods until
//! the next 1/16 boundary, and at which frame of the period it falls. The
//! backend calls [`DelayAttackTable::tic`] once per period; that is the only
//! place `note_offset` advances.

mod table;

pub use table::{absolute_delay, PERIOD, TABLE_LEN};

use crate::{Error, Result};

const EPSILON: f64 = 1e-9;

/// Read-only copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSnapshot {
    pub absolute_delay: f64,
    pub delay: f64,
    pub attack: usize,
    pub tact_counter: f64,
    pub delay_counter: f64,
    pub tic_counter: usize,
    pub note_offset: u64,
    pub note_offset_absolute: u64,
    pub loop_offset: u64,
}

/// Loop region state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopState {
    pub left: u64,
    pub right: u64,
    pub enabled: bool,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct DelayAttackTable {
    samplerate: u32,
    buffer_size: usize,
    bpm: f64,
    delay_factor: f64,

    absolute_delay: f64,
    phase: f64,
    delay: [f64; TABLE_LEN],
    attack: [usize; TABLE_LEN],

    tact_counter: f64,
    delay_counter: f64,
    tic_counter: usize,

    note_offset: u64,
    note_offset_absolute: u64,
    start_note_offset: u64,

    loop_left: u64,
    loop_right: u64,
    do_loop: bool,
    loop_offset: u64,
}

impl DelayAttackTable {
    pub fn new(samplerate: u32, buffer_size: usize, bpm: f64, delay_factor: f64) -> Self {
        let mut table = Self {
            samplerate,
            buffer_size,
            bpm,
            delay_factor,
            absolute_delay: 0.0,
            phase: 0.0,
            delay: [0.0; TABLE_LEN],
            attack: [0; TABLE_LEN],
            tact_counter: 0.0,
            delay_counter: 0.0,
            tic_counter: 0,
            note_offset: 0,
            note_offset_absolute: 0,
            start_note_offset: 0,
            loop_left: 0,
            loop_right: 64,
            do_loop: false,
            loop_offset: 0,
        };
        table.recompute();
        table
    }

    #[inline]
    fn frames_per_tic(&self) -> f64 {
        self.absolute_delay * self.buffer_size as f64
    }

    /// Recompute `absolute_delay` and refill both tables from the current phase.
    pub fn recompute(&mut self) {
        self.absolute_delay =
            absolute_delay(self.samplerate, self.buffer_size, self.bpm, self.delay_factor);
        self.phase = self.phase.rem_euclid(self.buffer_size.max(1) as f64);
        table::fill(
            self.phase,
            self.frames_per_tic(),
            self.buffer_size,
            &mut self.delay,
            &mut self.attack,
        );
    }

    pub fn set_presets(&mut self, samplerate: u32, buffer_size: usize) {
        self.samplerate = samplerate;
        self.buffer_size = buffer_size;
        self.recompute();
    }

    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(Error::InvalidTempo(bpm));
        }
        self.bpm = bpm;
        self.recompute();
        Ok(())
    }

    pub fn set_delay_factor(&mut self, delay_factor: f64) -> Result<()> {
        if !(delay_factor.is_finite() && delay_factor > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "delay_factor {delay_factor} must be positive and finite"
            )));
        }
        self.delay_factor = delay_factor;
        self.recompute();
        Ok(())
    }

    /// Advance by one hardware period.
    ///
    /// Returns the new `note_offset` if a 1/16 boundary was crossed.
    pub fn tic(&mut self) -> Option<u64> {
        let delay = self.delay[self.tic_counter];

        if self.delay_counter + 1.0 + EPSILON >= delay.floor() {
            let next = self.note_offset + 1;
            if self.do_loop && next == self.loop_right {
                self.note_offset = self.loop_left;
                self.loop_offset += self.loop_right - self.loop_left;
            } else {
                self.note_offset = next;
            }
            self.note_offset_absolute += 1;

            self.offset_changed();

            self.delay_counter = self.delay_counter + 1.0 - delay;
            self.tact_counter += 1.0;
            Some(self.note_offset)
        } else {
            self.delay_counter += 1.0;
            None
        }
    }

    /// Select the next `(delay, attack)` pair, re-anchoring at the period wrap.
    pub fn offset_changed(&mut self) {
        self.tic_counter = (self.tic_counter + 1) % PERIOD;
        if self.tic_counter == 0 {
            self.phase = table::next_phase(self.phase, self.frames_per_tic(), self.buffer_size);
            table::fill(
                self.phase,
                self.frames_per_tic(),
                self.buffer_size,
                &mut self.delay,
                &mut self.attack,
            );
        }
    }

    /// Zero tact/delay/tic counters and restart the table at frame 0.
    pub fn reset_counters(&mut self) {
        self.tact_counter = 0.0;
        self.delay_counter = 0.0;
        self.tic_counter = 0;
        self.phase = 0.0;
        self.recompute();
    }

    /// Rewind both note offsets to the start offset.
    pub fn reset_note_offset(&mut self) {
        self.note_offset = self.start_note_offset;
        self.note_offset_absolute = self.start_note_offset;
        self.loop_offset = 0;
    }

    pub fn set_start_note_offset(&mut self, offset: u64) {
        self.start_note_offset = offset;
    }

    pub fn set_note_offset(&mut self, offset: u64) {
        self.note_offset = offset;
    }

    pub fn set_note_offset_absolute(&mut self, offset: u64) {
        self.note_offset_absolute = offset;
    }

    pub fn set_loop(&mut self, left: u64, right: u64, enabled: bool) {
        self.loop_left = left;
        self.loop_right = right;
        self.do_loop = enabled;
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn delay_factor(&self) -> f64 {
        self.delay_factor
    }

    pub fn absolute_delay(&self) -> f64 {
        self.absolute_delay
    }

    /// Delay of the current table entry.
    pub fn delay(&self) -> f64 {
        self.delay[self.tic_counter]
    }

    /// Attack of the current table entry.
    pub fn attack(&self) -> usize {
        self.attack[self.tic_counter]
    }

    pub fn delay_table(&self) -> &[f64; TABLE_LEN] {
        &self.delay
    }

    pub fn attack_table(&self) -> &[usize; TABLE_LEN] {
        &self.attack
    }

    pub fn delay_counter(&self) -> f64 {
        self.delay_counter
    }

    pub fn tact_counter(&self) -> f64 {
        self.tact_counter
    }

    pub fn tic_counter(&self) -> usize {
        self.tic_counter
    }

    pub fn note_offset(&self) -> u64 {
        self.note_offset
    }

    pub fn note_offset_absolute(&self) -> u64 {
        self.note_offset_absolute
    }

    pub fn start_note_offset(&self) -> u64 {
        self.start_note_offset
    }

    pub fn loop_state(&self) -> LoopState {
        LoopState {
            left: self.loop_left,
            right: self.loop_right,
            enabled: self.do_loop,
            offset: self.loop_offset,
        }
    }

    pub fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            absolute_delay: self.absolute_delay,
            delay: self.delay(),
            attack: self.attack(),
            tact_counter: self.tact_counter,
            delay_counter: self.delay_counter,
            tic_counter: self.tic_counter,
            note_offset: self.note_offset,
            note_offset_absolute: self.note_offset_absolute,
            loop_offset: self.loop_offset,
        }
    }

    /// Elapsed playback time as `MM:SS.mmm`.
    pub fn uptime(&self) -> String {
        let seconds = if self.samplerate == 0 {
            0.0
        } else {
            self.note_offset_absolute as f64 * self.frames_per_tic() / self.samplerate as f64
        };
        format_uptime(seconds)
    }
}

/// Format seconds as `MM:SS.mmm`. Minutes do not wrap.
pub fn format_uptime(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).floor() as u64;
    let minutes = total_ms / 60_000;
    let secs = (total_ms / 1000) % 60;
    let ms = total_ms % 1000;
    format!("{minutes:02}:{secs:02}.{ms:03}")
}
