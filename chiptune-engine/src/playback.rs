//! Pull-based playback driver.
//!
//! The driver owns the chunking: it asks a [`Fill`] source for at most
//! [`CHUNK_FRAMES`] mono samples at a time, scales them by the volume,
//! duplicates them to every sink channel and writes the chunk. A stream is
//! primed with a few milliseconds of silence and always ends with a short
//! silent tail so the amplifier settles without a pop, cancelled or not.

use std::sync::atomic::{AtomicBool, Ordering};

use chiptune_core::dsp::scale_i16_in_place;

use crate::error::Result;
use crate::sink::AudioSink;

/// Largest mono chunk pulled from a source per write.
pub const CHUNK_FRAMES: usize = 512;

/// Pulls mono PCM. Returns how many samples were written to `dst`; 0 ends playback.
pub trait Fill {
    fn fill(&mut self, dst: &mut [i16]) -> usize;
}

impl<F> Fill for F
where
    F: FnMut(&mut [i16]) -> usize,
{
    #[inline]
    fn fill(&mut self, dst: &mut [i16]) -> usize {
        self(dst)
    }
}

/// Outcome of a playback call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Source frames delivered to the sink, silence padding excluded.
    pub frames_played: usize,
    /// Stopped because the cancel flag was raised.
    pub cancelled: bool,
}

/// Priming/tail silence length: ~5 ms, capped at one chunk.
#[inline]
pub fn silence_frames(sample_rate: u32) -> usize {
    ((sample_rate / 200) as usize).clamp(1, CHUNK_FRAMES)
}

/// Stream `total_samples` mono samples from `fill` to `sink`.
///
/// `volume` is clamped to [0, 1]. `cancel` is polled before every chunk;
/// once set, no more data is pulled and the silent tail is written.
pub fn play_mono16_stream<S, F>(
    sink: &mut S,
    total_samples: usize,
    volume: f32,
    cancel: Option<&AtomicBool>,
    fill: &mut F,
) -> Result<PlaybackReport>
where
    S: AudioSink + ?Sized,
    F: Fill + ?Sized,
{
    let channels = usize::from(sink.channels().max(1));
    let pad = silence_frames(sink.sample_rate());
    let mut frames = Vec::with_capacity(CHUNK_FRAMES * channels);

    log::debug!(
        target: "audio::playback",
        "stream start: {total_samples} samples @ {} Hz x{channels}, volume {volume:.2}",
        sink.sample_rate()
    );

    write_silence(sink, pad, channels, &mut frames)?;
    let report = pump(sink, total_samples, volume, cancel, fill, channels, &mut frames)?;
    write_silence(sink, pad, channels, &mut frames)?;

    if report.cancelled {
        log::info!(target: "audio::playback", "stream cancelled after {} frames", report.frames_played);
    } else {
        log::debug!(target: "audio::playback", "stream done: {} frames", report.frames_played);
    }
    Ok(report)
}

/// Same as [`play_mono16_stream`] without the silence padding.
pub fn play_fill<S, F>(
    sink: &mut S,
    total_samples: usize,
    volume: f32,
    cancel: Option<&AtomicBool>,
    fill: &mut F,
) -> Result<PlaybackReport>
where
    S: AudioSink + ?Sized,
    F: Fill + ?Sized,
{
    let channels = usize::from(sink.channels().max(1));
    let mut frames = Vec::with_capacity(CHUNK_FRAMES.min(total_samples) * channels);
    pump(sink, total_samples, volume, cancel, fill, channels, &mut frames)
}

/// Play an already-rendered mono buffer (no silence padding).
pub fn play_mono16<S>(sink: &mut S, samples: &[i16], volume: f32) -> Result<PlaybackReport>
where
    S: AudioSink + ?Sized,
{
    let mut pos = 0usize;
    let mut source = |dst: &mut [i16]| {
        let n = dst.len().min(samples.len() - pos);
        dst[..n].copy_from_slice(&samples[pos..pos + n]);
        pos += n;
        n
    };
    play_fill(sink, samples.len(), volume, None, &mut source)
}

fn pump<S, F>(
    sink: &mut S,
    total_samples: usize,
    volume: f32,
    cancel: Option<&AtomicBool>,
    fill: &mut F,
    channels: usize,
    frames: &mut Vec<i16>,
) -> Result<PlaybackReport>
where
    S: AudioSink + ?Sized,
    F: Fill + ?Sized,
{
    let mut mono = [0i16; CHUNK_FRAMES];
    let mut report = PlaybackReport::default();
    let mut remaining = total_samples;

    while remaining > 0 {
        if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
            report.cancelled = true;
            break;
        }
        let want = remaining.min(CHUNK_FRAMES);
        let got = fill.fill(&mut mono[..want]).min(want);
        if got == 0 {
            break;
        }
        scale_i16_in_place(&mut mono[..got], volume);
        interleave(&mono[..got], channels, frames);
        sink.write(frames)?;

        report.frames_played += got;
        remaining -= got;
    }
    Ok(report)
}

pub(crate) fn interleave(mono: &[i16], channels: usize, out: &mut Vec<i16>) {
    out.clear();
    for &s in mono {
        out.extend(std::iter::repeat(s).take(channels));
    }
}

fn write_silence<S>(sink: &mut S, frames: usize, channels: usize, buf: &mut Vec<i16>) -> Result<()>
where
    S: AudioSink + ?Sized,
{
    buf.clear();
    buf.resize(frames * channels, 0);
    sink.write(buf)
}
