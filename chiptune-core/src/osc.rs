//! Oscillator math for the three voices.
//!
//! Everything here is stateless; running phase and LFSR state are threaded
//! by the caller (see [`crate::synth::StreamState`]).
//!
//! - Pulse voices: MIDI note → phase increment, variable-duty square
//! - Voice 1 may instead be a sine
//! - Noise voice: 15-bit Game Boy LFSR clocked at `4000 / 2^k` Hz

use crate::dsp::{clamp, m_powf, m_round, TAU};

/// Seed of the noise LFSR (all 15 bits set).
pub const LFSR_SEED: u16 = 0x7FFF;

/// Base noise clock for index 0, in Hz. Index `k` divides it by `2^k`.
pub const NOISE_BASE_HZ: f32 = 4000.0;

/// Highest noise pitch index used at render time.
pub const NOISE_INDEX_MAX: u8 = 7;

/// Equal-tempered MIDI → per-sample phase increment (A4 = note 69 = 440 Hz).
#[inline]
pub fn note_to_phase_increment(midi_note: u8, sample_rate: u32) -> f32 {
    let semis = (i32::from(midi_note) - 69) as f32 / 12.0;
    let freq = 440.0 * m_powf(2.0, semis);
    freq / sample_rate as f32
}

/// +1 while `phase < duty`, −1 for the rest of the period.
#[inline]
pub fn square_wave(phase: f32, duty: f32) -> f32 {
    if phase < duty { 1.0 } else { -1.0 }
}

/// `sin(phase * 2π)`; polynomial approximation under `fast-math`.
#[inline]
pub fn sine_wave(phase: f32) -> f32 {
    cfg_if::cfg_if! {
        if #[cfg(feature = "fast-math")] {
            // Range reduce to [-π, π], then sin(x) ≈ x * (a + b x^2 + c x^4)
            let mut xr = phase * TAU;
            if xr > core::f32::consts::PI {
                xr -= TAU;
            }
            let x2 = xr * xr;
            xr * (0.999_979_3 + x2 * (-0.166_624_43 + x2 * 0.008_308_979))
        } else {
            crate::dsp::m_sin(phase * TAU)
        }
    }
}

/// One LFSR clock: returns `(new_state, polarity)`.
///
/// Feedback is bit0 XOR bit1, shifted in at bit 14. In short mode the
/// feedback bit also overwrites bit 6, which gives the buzzy 7-bit flavour
/// without switching to a real 7-bit register.
#[inline]
pub fn noise_step(lfsr: u16, short_mode: bool) -> (u16, i8) {
    let fb = (lfsr ^ (lfsr >> 1)) & 0x1;
    let mut next = (lfsr >> 1) | (fb << 14);
    if short_mode {
        next = (next & !(1 << 6)) | (fb << 6);
    }
    let polarity = if next & 1 == 1 { 1 } else { -1 };
    (next, polarity)
}

/// Samples between LFSR clocks for `noise_index` (clamped to 0..=7), minimum 1.
#[inline]
pub fn noise_period_samples(noise_index: u8, sample_rate: u32) -> u32 {
    let k = noise_index.min(NOISE_INDEX_MAX);
    let clock_hz = NOISE_BASE_HZ / f32::from(1u16 << k);
    let period = m_round(sample_rate as f32 / clock_hz);
    clamp(period, 1.0, u32::MAX as f32) as u32
}

/// Owned LFSR, for callers that don't thread the raw `u16` themselves.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Lfsr {
    state: u16,
}

impl Lfsr {
    #[inline]
    pub fn new() -> Self {
        Self { state: LFSR_SEED }
    }

    /// Start from `seed`; a zero seed would lock the register and is replaced by [`LFSR_SEED`].
    #[inline]
    pub fn with_seed(seed: u16) -> Self {
        let state = seed & 0x7FFF;
        Self { state: if state == 0 { LFSR_SEED } else { state } }
    }

    #[inline]
    pub fn state(&self) -> u16 {
        self.state
    }

    /// Advance one clock and return the output polarity.
    #[inline]
    pub fn clock(&mut self, short_mode: bool) -> i8 {
        let (next, polarity) = noise_step(self.state, short_mode);
        self.state = next;
        polarity
    }
}

impl Default for Lfsr {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440_over_sample_rate() {
        for sr in [8_000u32, 22_050, 44_100, 48_000] {
            let inc = note_to_phase_increment(69, sr);
            assert!((inc - 440.0 / sr as f32).abs() < 1e-9, "sr={sr} inc={inc}");
        }
    }

    #[test]
    fn octave_doubles_increment() {
        let a4 = note_to_phase_increment(69, 22_050);
        let a5 = note_to_phase_increment(81, 22_050);
        assert!((a5 - 2.0 * a4).abs() < 1e-6, "a4={a4} a5={a5}");
        let a3 = note_to_phase_increment(57, 22_050);
        assert!((a4 - 2.0 * a3).abs() < 1e-6);
    }

    #[test]
    fn square_follows_duty() {
        assert_eq!(square_wave(0.1, 0.125), 1.0);
        assert_eq!(square_wave(0.125, 0.125), -1.0);
        assert_eq!(square_wave(0.74, 0.75), 1.0);
        assert_eq!(square_wave(0.99, 1.0), 1.0);
    }

    #[test]
    fn sine_hits_quadrants() {
        assert!(sine_wave(0.0).abs() < 1e-3);
        assert!((sine_wave(0.25) - 1.0).abs() < 1e-3);
        assert!((sine_wave(0.75) + 1.0).abs() < 1e-3);
    }

    #[test]
    fn first_lfsr_clock_from_seed() {
        // 0x7FFF: bit0 ^ bit1 == 0, so a zero enters at bit 14.
        let (next, pol) = noise_step(LFSR_SEED, false);
        assert_eq!(next, 0x3FFF);
        assert_eq!(pol, 1);
    }

    #[test]
    fn long_mode_never_locks_and_has_full_period() {
        let mut l = Lfsr::new();
        let mut period = 0usize;
        loop {
            l.clock(false);
            period += 1;
            assert_ne!(l.state(), 0, "locked after {period} clocks");
            if l.state() == LFSR_SEED {
                break;
            }
            assert!(period <= 40_000, "no cycle found");
        }
        assert_eq!(period, 32_767);
    }

    #[test]
    fn short_mode_never_locks() {
        let mut l = Lfsr::new();
        let mut states = std::collections::HashSet::new();
        for _ in 0..100_000 {
            l.clock(true);
            assert_ne!(l.state(), 0);
            states.insert(l.state());
        }
        // the bit-6 override collapses the walk onto a short 127-state cycle
        assert_eq!(states.len(), 127);
    }

    #[test]
    fn zero_seed_is_replaced() {
        assert_eq!(Lfsr::with_seed(0).state(), LFSR_SEED);
        assert_eq!(Lfsr::with_seed(0x8000).state(), LFSR_SEED);
        assert_eq!(Lfsr::with_seed(0x1234).state(), 0x1234);
    }

    #[test]
    fn noise_period_halves_clock_per_index() {
        assert_eq!(noise_period_samples(0, 8_000), 2);
        assert_eq!(noise_period_samples(1, 8_000), 4);
        assert_eq!(noise_period_samples(3, 8_000), 16);
        assert_eq!(noise_period_samples(7, 8_000), 256);
        // clamped above 7
        assert_eq!(noise_period_samples(12, 8_000), 256);
        // minimum of one sample
        assert_eq!(noise_period_samples(0, 1_000), 1);
    }
}
