//! Step pattern: two melodic pulse voices and one noise voice.
//!
//! `None` means rest (pulse) or off (noise). The persisted format encodes it
//! as `-1`; see [`crate::song`].

use alloc::vec;
use alloc::vec::Vec;

/// Conventional pattern length (one bar of sixteenth notes).
pub const STEPS: usize = 16;

/// A fixed-length step sequence.
///
/// Sequences shorter than `steps` are legal; lookups past their end are rests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// MIDI notes (0..=127) for voice 1.
    pub pulse1: Vec<Option<u8>>,
    /// MIDI notes (0..=127) for voice 2.
    pub pulse2: Vec<Option<u8>>,
    /// Noise pitch index per step (0..=7 at render time).
    pub noise: Vec<Option<u8>>,
    pub steps: usize,
}

impl Pattern {
    /// All-rest pattern of `steps` steps.
    pub fn new(steps: usize) -> Self {
        Self {
            pulse1: vec![None; steps],
            pulse2: vec![None; steps],
            noise: vec![None; steps],
            steps,
        }
    }

    #[inline]
    pub fn pulse1_at(&self, step: usize) -> Option<u8> {
        self.pulse1.get(step).copied().flatten()
    }

    #[inline]
    pub fn pulse2_at(&self, step: usize) -> Option<u8> {
        self.pulse2.get(step).copied().flatten()
    }

    #[inline]
    pub fn noise_at(&self, step: usize) -> Option<u8> {
        self.noise.get(step).copied().flatten()
    }

    pub fn set_pulse1(&mut self, step: usize, note: Option<u8>) {
        if let Some(slot) = self.pulse1.get_mut(step) {
            *slot = note;
        }
    }

    pub fn set_pulse2(&mut self, step: usize, note: Option<u8>) {
        if let Some(slot) = self.pulse2.get_mut(step) {
            *slot = note;
        }
    }

    pub fn set_noise(&mut self, step: usize, index: Option<u8>) {
        if let Some(slot) = self.noise.get_mut(step) {
            *slot = index;
        }
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new(STEPS)
    }
}
