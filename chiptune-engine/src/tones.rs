//! Sine tone bursts, note sequences and the held-key sidetone.
//!
//! A tone is the sine body, a 20 ms linear fade-out and ~5 ms of silence,
//! all produced by one [`ToneSource`]. A [`Sidetone`] has no length; it runs
//! until its owner stops it (see [`crate::player::spawn_tone`]). Samples are
//! truncated toward zero.

use std::f32::consts::TAU;

use crate::error::Result;
use crate::playback::{play_fill, Fill, PlaybackReport, CHUNK_FRAMES};
use crate::sink::AudioSink;

/// Fade-out length after the tone body.
pub const FADE_MS: u32 = 20;
/// Silence written between the tones of a sequence.
pub const GAP_MS: u32 = 10;

/// Morse key sidetone pitch.
pub const SIDETONE_HZ: f32 = 2300.0;
/// Morse key sidetone volume.
pub const SIDETONE_VOLUME: f32 = 0.6;
/// Frames per sidetone write.
pub const SIDETONE_CHUNK: usize = 256;
/// Linear fade written once a sidetone stops.
pub const SIDETONE_FADE: usize = 128;
/// Silence after the fade.
pub const SIDETONE_TAIL: usize = 64;

/// One note of a sequence.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tone {
    pub freq_hz: f32,
    pub duration_ms: u32,
}

impl Tone {
    pub const fn new(freq_hz: f32, duration_ms: u32) -> Self {
        Self { freq_hz, duration_ms }
    }
}

/// Fill source for a single tone: body, fade-out, silence.
#[derive(Clone, Debug)]
pub struct ToneSource {
    phase: f32,
    phase_inc: f32,
    volume: f32,
    body: usize,
    fade: usize,
    silence: usize,
    pos: usize,
}

impl ToneSource {
    pub fn new(tone: Tone, volume: f32, sample_rate: u32) -> Self {
        let sr = sample_rate.max(1);
        let body = (tone.duration_ms as f32 / 1000.0 * sr as f32) as usize;
        let fade = ((sr as f32 * (FADE_MS as f32 / 1000.0)) as usize)
            .max(1)
            .min(CHUNK_FRAMES);
        Self {
            phase: 0.0,
            phase_inc: TAU * tone.freq_hz / sr as f32,
            volume: clamp_volume(volume),
            body,
            fade,
            silence: ((sr / 200) as usize).min(CHUNK_FRAMES),
            pos: 0,
        }
    }

    /// Body + fade + silence.
    pub fn total_samples(&self) -> usize {
        self.body + self.fade + self.silence
    }

    pub fn is_finished(&self) -> bool {
        self.pos >= self.total_samples()
    }

    #[inline]
    fn next_sine(&mut self, amp: f32) -> i16 {
        let s = self.phase.sin() * amp;
        self.phase += self.phase_inc;
        if self.phase > TAU {
            self.phase -= TAU;
        }
        (s * 32767.0) as i16
    }
}

impl Fill for ToneSource {
    fn fill(&mut self, dst: &mut [i16]) -> usize {
        let mut n = 0;
        for out in dst.iter_mut() {
            let pos = self.pos;
            *out = if pos < self.body {
                self.next_sine(self.volume)
            } else if pos < self.body + self.fade {
                let i = (pos - self.body) as f32;
                let amp = self.volume * (1.0 - i / self.fade as f32);
                self.next_sine(amp)
            } else if pos < self.total_samples() {
                0
            } else {
                break;
            };
            self.pos += 1;
            n += 1;
        }
        n
    }
}

/// Free-running sine for a held key.
///
/// Frequency and volume are arguments of every call, so they can change
/// between chunks; the phase carries over and a retune does not click.
#[derive(Clone, Debug)]
pub struct Sidetone {
    phase: f32,
    sample_rate: f32,
}

impl Sidetone {
    pub fn new(sample_rate: u32) -> Self {
        Self { phase: 0.0, sample_rate: sample_rate.max(1) as f32 }
    }

    /// Fill `dst` at `freq_hz` and `volume`.
    pub fn render(&mut self, freq_hz: f32, volume: f32, dst: &mut [i16]) {
        let inc = self.phase_inc(freq_hz);
        let v = clamp_volume(volume);
        for out in dst.iter_mut() {
            *out = self.next(inc, v);
        }
    }

    /// Linear ramp from `volume` down to zero across `dst`.
    pub fn fade_out(&mut self, freq_hz: f32, volume: f32, dst: &mut [i16]) {
        let inc = self.phase_inc(freq_hz);
        let v = clamp_volume(volume);
        let n = dst.len() as f32;
        for (i, out) in dst.iter_mut().enumerate() {
            *out = self.next(inc, v * (1.0 - i as f32 / n));
        }
    }

    fn phase_inc(&self, freq_hz: f32) -> f32 {
        TAU * freq_hz.max(0.0) / self.sample_rate
    }

    #[inline]
    fn next(&mut self, inc: f32, amp: f32) -> i16 {
        let s = self.phase.sin() * amp;
        self.phase += inc;
        if self.phase > TAU {
            self.phase = self.phase.rem_euclid(TAU);
        }
        (s * 32767.0) as i16
    }
}

/// Clamp to [0, 1]; NaN mutes.
pub(crate) fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) }
}

/// Play one tone at `volume` (applied inside the tone, not by the driver).
pub fn play_tone<S>(sink: &mut S, tone: Tone, volume: f32) -> Result<PlaybackReport>
where
    S: AudioSink + ?Sized,
{
    let mut src = ToneSource::new(tone, volume, sink.sample_rate());
    let total = src.total_samples();
    play_fill(sink, total, 1.0, None, &mut src)
}

/// Play `tones` back to back with a short gap after each.
pub fn play_sequence<S>(sink: &mut S, tones: &[Tone], volume: f32) -> Result<PlaybackReport>
where
    S: AudioSink + ?Sized,
{
    let gap = gap_frames(sink.sample_rate());
    let channels = usize::from(sink.channels().max(1));
    let silence = vec![0i16; gap * channels];

    let mut report = PlaybackReport::default();
    for &tone in tones {
        report.frames_played += play_tone(sink, tone, volume)?.frames_played;
        if gap > 0 {
            sink.write(&silence)?;
        }
    }
    log::debug!(
        target: "audio::playback",
        "sequence done: {} tones, {} frames",
        tones.len(),
        report.frames_played
    );
    Ok(report)
}

fn gap_frames(sample_rate: u32) -> usize {
    (u64::from(sample_rate) * u64::from(GAP_MS) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn drain(src: &mut ToneSource) -> Vec<i16> {
        let mut out = Vec::new();
        let mut buf = [0i16; 100];
        loop {
            let n = src.fill(&mut buf);
            out.extend_from_slice(&buf[..n]);
            if n == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn tone_lengths_follow_sample_rate() {
        let src = ToneSource::new(Tone::new(440.0, 100), 0.5, 8_000);
        // 800 body + 160 fade + 40 silence
        assert_eq!(src.total_samples(), 1_000);

        // fade is capped at one chunk
        let src = ToneSource::new(Tone::new(440.0, 0), 0.5, 48_000);
        assert_eq!(src.total_samples(), 512 + 240);
    }

    #[test]
    fn tone_starts_at_zero_and_ends_silent() {
        let mut src = ToneSource::new(Tone::new(1_000.0, 50), 1.0, 8_000);
        let out = drain(&mut src);
        assert_eq!(out.len(), 400 + 160 + 40);
        assert_eq!(out[0], 0);
        assert!(out.iter().any(|&s| s > 30_000));
        assert!(out[560..].iter().all(|&s| s == 0));
        assert!(src.is_finished());
    }

    #[test]
    fn volume_scales_peak() {
        let mut src = ToneSource::new(Tone::new(2_000.0, 20), 0.25, 8_000);
        let out = drain(&mut src);
        let peak = out.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak <= 8_192, "peak {peak}");
        assert!(peak >= 8_000, "peak {peak}");
    }

    fn sign_changes(buf: &[i16]) -> usize {
        let signs: Vec<bool> = buf.iter().filter(|&&s| s != 0).map(|&s| s > 0).collect();
        signs.windows(2).filter(|w| w[0] != w[1]).count()
    }

    #[test]
    fn sidetone_retunes_without_restarting() {
        let mut tone = Sidetone::new(8_000);
        let mut a = [0i16; SIDETONE_CHUNK];
        let mut b = [0i16; SIDETONE_CHUNK];
        tone.render(700.0, 0.6, &mut a);
        tone.render(1_900.0, 0.3, &mut b);

        // 22.4 and 60.8 cycles per chunk
        assert!((42..=47).contains(&sign_changes(&a)), "{}", sign_changes(&a));
        assert!((119..=124).contains(&sign_changes(&b)), "{}", sign_changes(&b));

        let peak = |buf: &[i16]| buf.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        assert!((18_000..=19_661).contains(&peak(&a)), "{}", peak(&a));
        assert!((8_800..=9_831).contains(&peak(&b)), "{}", peak(&b));

        // phase carried across the retune: no restart at zero
        let mut fresh = [0i16; SIDETONE_CHUNK];
        Sidetone::new(8_000).render(1_900.0, 0.3, &mut fresh);
        assert_ne!(b, fresh);
    }

    #[test]
    fn sidetone_fade_decays_to_zero() {
        let mut tone = Sidetone::new(8_000);
        let mut body = [0i16; SIDETONE_CHUNK];
        tone.render(SIDETONE_HZ, 1.0, &mut body);
        let mut fade = [0i16; SIDETONE_FADE];
        tone.fade_out(SIDETONE_HZ, 1.0, &mut fade);
        for (i, s) in fade.iter().enumerate() {
            let bound = 32_767.0 * (1.0 - i as f32 / SIDETONE_FADE as f32);
            assert!(f32::from(s.unsigned_abs()) <= bound + 1.0, "i={i} s={s}");
        }
        assert!(fade[..16].iter().any(|s| s.unsigned_abs() > 20_000));
    }

    #[test]
    fn sidetone_ignores_negative_pitch() {
        let mut tone = Sidetone::new(8_000);
        let mut buf = [1i16; 32];
        tone.render(-440.0, 1.0, &mut buf);
        assert!(buf.iter().all(|&s| s == 0));
    }

    #[test]
    fn fade_is_monotonic_envelope() {
        let mut src = ToneSource::new(Tone::new(2_000.0, 0), 1.0, 8_000);
        let out = drain(&mut src);
        // 2 kHz at 8 kHz: odd samples sit on the crests
        let peaks: Vec<u16> = out[1..160].iter().step_by(2).map(|s| s.unsigned_abs()).collect();
        assert!(peaks.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn sequence_adds_gap_after_each_tone() {
        let mut sink = MemorySink::new(8_000, 2);
        let seq = [Tone::new(523.25, 10), Tone::new(659.26, 10)];
        let report = play_sequence(&mut sink, &seq, 0.5).unwrap();
        // (80 + 160 + 40) per tone
        assert_eq!(report.frames_played, 2 * 280);
        assert_eq!(sink.first_channel().len(), 2 * (280 + 80));
    }
}
