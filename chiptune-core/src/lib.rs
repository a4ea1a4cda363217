#![cfg_attr(not(feature = "std"), no_std)]
//! Chiptune Core: a Game-Boy-style synth kernel (2x pulse + noise), `no_std`-ready.
//!
//! Features
//! - `std`       : (default) use the Rust standard library
//! - `no-std`    : build with `#![no_std]` (+ `alloc`) and use `libm`/`micromath` math backends
//! - `fast-math` : polynomial sine for the optional sine voice
//! - `simd`      : `wide`-based volume scaling in [`dsp::scale_i16_in_place`]
//!
//! Modules
//! - [`dsp`]       : math backend, clamps, phase wrap, PCM quantize/scale
//! - [`osc`]       : MIDI → phase increment, square/sine/LFSR noise
//! - [`envelopes`] : per-step edge fade
//! - [`pattern`]   : 16-step two-pulse + noise pattern
//! - [`synth`]     : `GbSynth` bulk render + streaming `render_block` with `StreamState`
//! - [`song`]      : persisted `tempo=..;d2=..;ns=..;p1=..;p2=..;nz=..;` format
//!
//! Design
//! - `render_block` never allocates; it writes into the caller's buffer
//! - Bulk and streaming rendering share one per-sample kernel, so any chunking
//!   of a stream is sample-identical to a single bulk render
//! - No global state, no I/O

extern crate alloc;

pub mod dsp;
pub mod envelopes;
pub mod osc;
pub mod pattern;
pub mod song;
pub mod synth;

pub use pattern::{Pattern, STEPS};
pub use song::{Song, DUTY_TABLE};
pub use synth::{GbSynth, RenderOptions, StreamState};

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{clamp, quantize_i16, scale_i16_in_place, wrap_phase01, TAU};
    pub use crate::envelopes::EdgeFade;
    pub use crate::osc::{
        noise_period_samples, noise_step, note_to_phase_increment, sine_wave, square_wave, Lfsr,
        LFSR_SEED,
    };
    pub use crate::pattern::{Pattern, STEPS};
    pub use crate::song::{Song, DUTY_TABLE};
    pub use crate::synth::{GbSynth, RenderOptions, StreamState};
}
