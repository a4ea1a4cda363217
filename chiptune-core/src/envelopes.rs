//! Per-step envelope.
//!
//! Every pattern step starts and ends with a short linear ramp so the hard
//! note changes of the square/noise voices do not click at step boundaries.
//! The ramp is a pure function of the absolute sample position inside the
//! step, which is what lets the streaming renderer resume mid-step and still
//! match a bulk render exactly.

use crate::dsp::clamp;

/// Upper bound of the edge ramp, in samples.
pub const MAX_FADE_SAMPLES: usize = 128;

/// Linear fade-in/fade-out over the first and last `len` samples of a step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EdgeFade {
    len: usize,
    step_samples: usize,
}

impl EdgeFade {
    /// Ramp length is `min(128, step_samples / 6)`.
    #[inline]
    pub fn for_step(step_samples: usize) -> Self {
        Self {
            len: MAX_FADE_SAMPLES.min(step_samples / 6),
            step_samples,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Gain in [0, 1] for sample `si` (0-based) of the step.
    #[inline]
    pub fn gain(&self, si: usize) -> f32 {
        if self.len == 0 {
            return 1.0;
        }
        let len = self.len as f32;
        let env = if si < self.len {
            si as f32 / len
        } else if si + self.len > self.step_samples {
            // past `step_samples - len`; saturating keeps out-of-step positions at 0
            self.step_samples.saturating_sub(si) as f32 / len
        } else {
            1.0
        };
        clamp(env, 0.0, 1.0)
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_length_is_capped() {
        assert_eq!(EdgeFade::for_step(1000).len(), 128);
        assert_eq!(EdgeFade::for_step(600).len(), 100);
        assert_eq!(EdgeFade::for_step(5).len(), 0);
    }

    #[test]
    fn ramps_up_then_down() {
        let f = EdgeFade::for_step(1000);
        assert_eq!(f.gain(0), 0.0);
        assert!((f.gain(64) - 0.5).abs() < 1e-6);
        assert_eq!(f.gain(128), 1.0);
        assert_eq!(f.gain(500), 1.0);
        assert_eq!(f.gain(872), 1.0);
        assert!((f.gain(873) - 127.0 / 128.0).abs() < 1e-6);
        assert!((f.gain(999) - 1.0 / 128.0).abs() < 1e-6);
    }

    #[test]
    fn tiny_steps_are_unfaded() {
        let f = EdgeFade::for_step(3);
        assert!(f.is_empty());
        assert_eq!(f.gain(0), 1.0);
        assert_eq!(f.gain(2), 1.0);
    }
}
