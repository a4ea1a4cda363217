//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Clean, side-effect free helpers that are easy to test
//!
//! Features used by this file:
//! - `simd` : 8-lane volume scaling via `wide`
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Argument and return domains are documented per function.

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // micromath preferred if explicitly requested (works in no_std)
    if #[cfg(feature = "micromath")] {
        use micromath::F32Ext as _;
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] pub(crate) fn m_powf(x: f32, y: f32) -> f32 { x.powf(y) }
        #[inline] pub(crate) fn m_round(x: f32) -> f32 { x.round() }
        #[inline] pub(crate) fn m_floor(x: f32) -> f32 { x.floor() }
    // libm (C math) in no_std
    } else if #[cfg(feature = "no-std")] {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] pub(crate) fn m_powf(x: f32, y: f32) -> f32 { libm::powf(x, y) }
        #[inline] pub(crate) fn m_round(x: f32) -> f32 { libm::roundf(x) }
        #[inline] pub(crate) fn m_floor(x: f32) -> f32 { libm::floorf(x) }
    // std backend
    } else {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] pub(crate) fn m_powf(x: f32, y: f32) -> f32 { x.powf(y) }
        #[inline] pub(crate) fn m_round(x: f32) -> f32 { x.round() }
        #[inline] pub(crate) fn m_floor(x: f32) -> f32 { x.floor() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π
pub const TAU: f32 = 2.0 * PI;

/// Full-scale positive 16-bit sample.
pub const I16_FULL_SCALE: f32 = 32767.0;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

/// Wrap an oscillator phase that was just advanced by one increment back into [0, 1).
///
/// The common case (one subtraction) matches a plain `if p >= 1 { p -= 1 }`;
/// increments ≥ 1 fall through to a floor-based wrap.
#[inline]
pub fn wrap_phase01(mut p: f32) -> f32 {
    if p >= 1.0 {
        p -= 1.0;
        if p >= 1.0 {
            p -= m_floor(p);
        }
    }
    p
}

/// Round half away from zero (same as C `lround` on the values we feed it).
#[inline]
pub fn round(x: f32) -> f32 {
    m_round(x)
}

// --------------------------------- PCM helpers -----------------------------------

/// Clamp `x` to [-1, 1] and quantize to signed 16-bit via `round(x * 32767)`.
#[inline]
pub fn quantize_i16(x: f32) -> i16 {
    let s = clamp(x, -1.0, 1.0);
    // |s * 32767| <= 32767, so the cast cannot saturate.
    m_round(s * I16_FULL_SCALE) as i16
}

#[inline]
fn scale_one(s: f32) -> i16 {
    // `as i32` truncates toward zero; then saturate into i16.
    (s as i32).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// In-place volume scaling: `x = clamp_i16(trunc(x * volume))`, with `volume` clamped to [0, 1].
#[inline]
pub fn scale_i16_in_place(buf: &mut [i16], volume: f32) {
    let v = clamp(volume, 0.0, 1.0);
    if v >= 1.0 {
        return;
    }

    cfg_if! {
        if #[cfg(feature = "simd")] {
            use wide::f32x8;
            let gain = f32x8::splat(v);
            let mut chunks = buf.chunks_exact_mut(8);
            for c in &mut chunks {
                let mut lanes = [0.0f32; 8];
                for (l, s) in lanes.iter_mut().zip(c.iter()) {
                    *l = f32::from(*s);
                }
                let scaled = (f32x8::from(lanes) * gain).to_array();
                for (s, l) in c.iter_mut().zip(scaled.iter()) {
                    *s = scale_one(*l);
                }
            }
            for s in chunks.into_remainder() {
                *s = scale_one(f32::from(*s) * v);
            }
        } else {
            for s in buf.iter_mut() {
                *s = scale_one(f32::from(*s) * v);
            }
        }
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_is_bounded() {
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.25, -1.0, 1.0), 0.25);
    }

    #[test]
    fn wrap_phase_stays_in_unit_interval() {
        assert_eq!(wrap_phase01(0.5), 0.5);
        assert!((wrap_phase01(1.25) - 0.25).abs() < 1e-6);
        let p = wrap_phase01(3.75);
        assert!((0.0..1.0).contains(&p), "p={p}");
        assert!((p - 0.75).abs() < 1e-6);
    }

    #[test]
    fn quantize_clamps_and_rounds() {
        assert_eq!(quantize_i16(0.0), 0);
        assert_eq!(quantize_i16(1.0), 32767);
        assert_eq!(quantize_i16(1.4), 32767);
        assert_eq!(quantize_i16(-1.4), -32767);
        assert_eq!(quantize_i16(0.6), 19660);
    }

    #[test]
    fn scale_truncates_and_respects_unity() {
        let mut buf = [1000i16, -1000, 32767, -32768, 3, 0, 7, -7, 9, 11];
        let orig = buf;
        scale_i16_in_place(&mut buf, 1.0);
        assert_eq!(buf, orig);

        scale_i16_in_place(&mut buf, 0.5);
        assert_eq!(buf, [500, -500, 16383, -16384, 1, 0, 3, -3, 4, 5]);

        scale_i16_in_place(&mut buf, -3.0);
        assert!(buf.iter().all(|&s| s == 0));
    }
}
