//! `GbSynth`: two pulse voices + one noise voice, rendered to mono 16-bit PCM.
//!
//! Two entry points share one per-sample kernel:
//! - [`GbSynth::render`] renders a whole pattern into a fresh `Vec<i16>`.
//! - [`GbSynth::render_block`] renders at most `out.len()` samples into a
//!   caller buffer and records where it stopped in a [`StreamState`], so a
//!   pull-based sink can stream a pattern with a fixed-size buffer.
//!
//! Concatenating `render_block` output over any chunking is sample-identical
//! to `render`: the kernel reads only the stream state and the absolute
//! sample position inside the current step.

use alloc::vec;
use alloc::vec::Vec;

use crate::dsp::{m_round, quantize_i16, wrap_phase01};
use crate::envelopes::EdgeFade;
use crate::osc::{
    noise_period_samples, noise_step, note_to_phase_increment, sine_wave, square_wave, LFSR_SEED,
};
use crate::pattern::Pattern;

/// Default output rate of the speaker path.
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

/// Mix gain of each pulse voice (also used when voice 1 is a sine).
pub const GAIN_PULSE: f32 = 0.50;

/// Mix gain of the noise voice.
pub const GAIN_NOISE: f32 = 0.40;

/// Per-render voicing. `Default` is 50% duty on both pulses, long noise, square voice 1.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderOptions {
    pub duty1: f32,
    pub duty2: f32,
    /// Force LFSR bit 6 for the short (7-bit flavoured) noise.
    pub noise_short: bool,
    /// Voice 1 plays a sine instead of a square.
    pub ch1_sine: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { duty1: 0.5, duty2: 0.5, noise_short: false, ch1_sine: false }
    }
}

/// Where a stream left off.
///
/// Only valid together with the pattern, tempo and options it was advanced
/// with. The step length is recomputed from the tempo on every call, so a
/// tempo change between calls takes effect immediately, mid-step included.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StreamState {
    /// Current step; `pattern.steps` means finished.
    pub step: usize,
    /// Offset inside the current step, in [0, step_samples).
    pub sample_in_step: usize,
    pub phase1: f32,
    pub phase2: f32,
    /// 15-bit noise register, never zero.
    pub lfsr: u16,
    /// Last noise output, ±1.
    pub current_noise: i8,
    /// Samples left until the next LFSR clock.
    pub noise_countdown: i32,
}

impl StreamState {
    #[inline]
    pub fn new() -> Self {
        Self {
            step: 0,
            sample_in_step: 0,
            phase1: 0.0,
            phase2: 0.0,
            lfsr: LFSR_SEED,
            current_noise: 1,
            noise_countdown: 0,
        }
    }

    #[inline]
    pub fn is_finished(&self, pattern: &Pattern) -> bool {
        self.step >= pattern.steps
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

/// What sounds during one step.
#[derive(Copy, Clone, Debug)]
struct StepVoices {
    inc1: Option<f32>,
    inc2: Option<f32>,
    noise_period: Option<i32>,
}

/// Game-Boy-style synth bound to one output sample rate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GbSynth {
    sample_rate: u32,
}

impl GbSynth {
    #[inline]
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate: sample_rate.max(1) }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per step: one sixteenth note at `bpm`, at least 1. `bpm == 0` counts as 1.
    #[inline]
    pub fn step_samples(&self, bpm: u32) -> usize {
        let step_sec = 60.0 / bpm.max(1) as f32 / 4.0;
        let n = m_round(step_sec * self.sample_rate as f32);
        if n < 1.0 { 1 } else { n as usize }
    }

    /// Length of a full render of `pattern` at `bpm`.
    #[inline]
    pub fn total_samples(&self, pattern: &Pattern, bpm: u32) -> usize {
        self.step_samples(bpm).saturating_mul(pattern.steps)
    }

    fn step_voices(&self, pattern: &Pattern, step: usize) -> StepVoices {
        let sr = self.sample_rate;
        StepVoices {
            inc1: pattern.pulse1_at(step).map(|n| note_to_phase_increment(n, sr)),
            inc2: pattern.pulse2_at(step).map(|n| note_to_phase_increment(n, sr)),
            noise_period: pattern
                .noise_at(step)
                .map(|k| i32::try_from(noise_period_samples(k, sr)).unwrap_or(i32::MAX)),
        }
    }

    /// Per-sample kernel: `out[i]` is sample `start + i` of the current step.
    fn fill_span(
        voices: &StepVoices,
        opts: &RenderOptions,
        fade: &EdgeFade,
        start: usize,
        st: &mut StreamState,
        out: &mut [i16],
    ) {
        for (i, slot) in out.iter_mut().enumerate() {
            let mut mix = 0.0f32;

            if let Some(inc) = voices.inc1 {
                st.phase1 = wrap_phase01(st.phase1 + inc);
                let v = if opts.ch1_sine {
                    sine_wave(st.phase1)
                } else {
                    square_wave(st.phase1, opts.duty1)
                };
                mix += v * GAIN_PULSE;
            }

            if let Some(inc) = voices.inc2 {
                st.phase2 = wrap_phase01(st.phase2 + inc);
                mix += square_wave(st.phase2, opts.duty2) * GAIN_PULSE;
            }

            if let Some(period) = voices.noise_period {
                st.noise_countdown = st.noise_countdown.saturating_sub(1);
                if st.noise_countdown <= 0 {
                    let (next, polarity) = noise_step(st.lfsr, opts.noise_short);
                    st.lfsr = next;
                    st.current_noise = polarity;
                    st.noise_countdown = period;
                }
                mix += f32::from(st.current_noise) * GAIN_NOISE;
            }

            *slot = quantize_i16(mix * fade.gain(start + i));
        }
    }

    /// Render the whole pattern at `bpm` into a new buffer of
    /// [`total_samples`](Self::total_samples) samples.
    pub fn render(&self, pattern: &Pattern, bpm: u32, opts: &RenderOptions) -> Vec<i16> {
        let step_samples = self.step_samples(bpm);
        let fade = EdgeFade::for_step(step_samples);
        let mut out = vec![0i16; self.total_samples(pattern, bpm)];
        let mut st = StreamState::new();

        for (step, chunk) in out.chunks_mut(step_samples).enumerate() {
            let voices = self.step_voices(pattern, step);
            if voices.noise_period.is_some() {
                // clock the LFSR on the first noise sample of the step
                st.noise_countdown = 0;
            }
            Self::fill_span(&voices, opts, &fade, 0, &mut st, chunk);
        }
        out
    }

    /// Render up to `out.len()` samples of `pattern`, resuming from `state`.
    ///
    /// Returns the number of samples written. Fewer than `out.len()` means
    /// the pattern finished (`state.step == pattern.steps`); an empty `out`
    /// is a no-op returning 0.
    pub fn render_block(
        &self,
        pattern: &Pattern,
        bpm: u32,
        opts: &RenderOptions,
        state: &mut StreamState,
        out: &mut [i16],
    ) -> usize {
        if out.is_empty() {
            return 0;
        }
        let step_samples = self.step_samples(bpm);
        let fade = EdgeFade::for_step(step_samples);

        let mut written = 0usize;
        while written < out.len() && state.step < pattern.steps {
            let voices = self.step_voices(pattern, state.step);
            if state.sample_in_step == 0 && voices.noise_period.is_some() {
                state.noise_countdown = 0;
            }

            // saturating: a tempo raise between calls can leave the cursor past the new step end
            let remain = step_samples.saturating_sub(state.sample_in_step);
            let to_gen = (out.len() - written).min(remain);
            let start = state.sample_in_step;
            Self::fill_span(&voices, opts, &fade, start, state, &mut out[written..written + to_gen]);

            written += to_gen;
            state.sample_in_step += to_gen;
            if state.sample_in_step >= step_samples {
                state.sample_in_step = 0;
                state.step += 1;
            }
        }
        written
    }
}

impl Default for GbSynth {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

// ------------------------------------ Tests --------------------------------------
