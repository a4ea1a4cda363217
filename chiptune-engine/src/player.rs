//! Background playback threads.
//!
//! The thread owns the sink and the stream cursor. The caller keeps a
//! [`PlaybackHandle`] that only sees two atomics: the cancel flag the
//! driver polls between chunks, and the last step that was rendered.
//!
//! A sidetone ([`spawn_tone`]) works the same way, except that it has no end:
//! pitch and volume live in atomics (f32 bits) the thread reads before each
//! chunk, and stopping it writes a short fade and silence.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chiptune_core::Song;

use crate::error::{AudioError, Result};
use crate::playback::{interleave, play_mono16_stream, Fill, PlaybackReport};
use crate::sink::AudioSink;
use crate::stream::PatternStream;
use crate::tones::{clamp_volume, Sidetone, SIDETONE_CHUNK, SIDETONE_FADE, SIDETONE_HZ, SIDETONE_TAIL};

const NO_STEP: usize = usize::MAX;

/// Handle to a song playing on its own thread. Dropping it stops playback.
pub struct PlaybackHandle {
    cancel: Arc<AtomicBool>,
    playhead: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<PlaybackReport>>>,
}

/// Play `song` on a new thread.
///
/// `make_sink` runs on that thread, so sinks that must stay on the thread
/// that created them (cpal streams) work too.
pub fn spawn_playback<S, M>(
    make_sink: M,
    song: Song,
    volume: f32,
    ch1_sine: bool,
) -> Result<PlaybackHandle>
where
    S: AudioSink + 'static,
    M: FnOnce() -> Result<S> + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let playhead = Arc::new(AtomicUsize::new(NO_STEP));
    let finished = Arc::new(AtomicBool::new(false));

    let thread = {
        let cancel = Arc::clone(&cancel);
        let playhead = Arc::clone(&playhead);
        let finished = Arc::clone(&finished);
        thread::Builder::new()
            .name("chiptune-playback".into())
            .spawn(move || {
                let result = run(make_sink, song, volume, ch1_sine, &cancel, &playhead);
                if let Err(e) = &result {
                    log::error!(target: "audio::player", "playback failed: {e}");
                }
                finished.store(true, Ordering::Release);
                result
            })?
    };

    Ok(PlaybackHandle {
        cancel,
        playhead,
        finished,
        thread: Some(thread),
    })
}

fn run<S, M>(
    make_sink: M,
    song: Song,
    volume: f32,
    ch1_sine: bool,
    cancel: &AtomicBool,
    playhead: &AtomicUsize,
) -> Result<PlaybackReport>
where
    S: AudioSink,
    M: FnOnce() -> Result<S>,
{
    let mut sink = make_sink()?;
    let mut stream = PatternStream::new(sink.sample_rate(), song, ch1_sine);
    let total = stream.total_samples();
    log::debug!(target: "audio::player", "playing {total} samples at {} Hz", sink.sample_rate());

    let mut fill = |dst: &mut [i16]| {
        let n = stream.fill(dst);
        if let Some(step) = stream.playhead() {
            playhead.store(step, Ordering::Release);
        }
        n
    };
    let report = play_mono16_stream(&mut sink, total, volume, Some(cancel), &mut fill)?;
    sink.flush()?;
    Ok(report)
}

impl PlaybackHandle {
    /// Step being rendered; `None` until the first block.
    pub fn playhead(&self) -> Option<usize> {
        match self.playhead.load(Ordering::Acquire) {
            NO_STEP => None,
            step => Some(step),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Raise the cancel flag and wait for the thread.
    pub fn stop(mut self) -> Result<PlaybackReport> {
        self.cancel.store(true, Ordering::Release);
        self.wait()
    }

    /// Wait for the song to end.
    pub fn join(mut self) -> Result<PlaybackReport> {
        self.wait()
    }

    fn wait(&mut self) -> Result<PlaybackReport> {
        match self.thread.take() {
            Some(t) => t
                .join()
                .map_err(|_| AudioError::Stream("playback thread panicked".into()))?,
            None => Ok(PlaybackReport::default()),
        }
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel.store(true, Ordering::Release);
            let _ = self.wait();
        }
    }
}

// ----- Sidetone -----

/// Handle to a running sidetone. Dropping it stops the tone.
pub struct ToneHandle {
    freq_bits: Arc<AtomicU32>,
    volume_bits: Arc<AtomicU32>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<usize>>>,
}

/// Start a continuous sine at `freq_hz` on a new thread.
///
/// The tone is written in 256-frame chunks until [`ToneHandle::stop`]; a
/// negative or non-finite pitch falls back to the 2300 Hz key tone.
pub fn spawn_tone<S, M>(make_sink: M, freq_hz: f32, volume: f32) -> Result<ToneHandle>
where
    S: AudioSink + 'static,
    M: FnOnce() -> Result<S> + Send + 'static,
{
    let freq = usable_freq(freq_hz).unwrap_or(SIDETONE_HZ);
    let freq_bits = Arc::new(AtomicU32::new(freq.to_bits()));
    let volume_bits = Arc::new(AtomicU32::new(clamp_volume(volume).to_bits()));
    let running = Arc::new(AtomicBool::new(true));

    let thread = {
        let freq_bits = Arc::clone(&freq_bits);
        let volume_bits = Arc::clone(&volume_bits);
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("chiptune-sidetone".into())
            .spawn(move || {
                let result = run_tone(make_sink, &freq_bits, &volume_bits, &running);
                if let Err(e) = &result {
                    log::error!(target: "audio::player", "sidetone failed: {e}");
                }
                result
            })?
    };

    Ok(ToneHandle {
        freq_bits,
        volume_bits,
        running,
        thread: Some(thread),
    })
}

fn usable_freq(freq_hz: f32) -> Option<f32> {
    (freq_hz.is_finite() && freq_hz >= 0.0).then_some(freq_hz)
}

fn load_f32(bits: &AtomicU32) -> f32 {
    f32::from_bits(bits.load(Ordering::Acquire))
}

fn run_tone<S, M>(
    make_sink: M,
    freq: &AtomicU32,
    volume: &AtomicU32,
    running: &AtomicBool,
) -> Result<usize>
where
    S: AudioSink,
    M: FnOnce() -> Result<S>,
{
    let mut sink = make_sink()?;
    let channels = usize::from(sink.channels().max(1));
    let mut tone = Sidetone::new(sink.sample_rate());
    let mut mono = [0i16; SIDETONE_CHUNK];
    let mut frames = Vec::with_capacity(SIDETONE_CHUNK * channels);
    let mut played = 0usize;

    log::debug!(target: "audio::player", "sidetone start at {} Hz", sink.sample_rate());
    while running.load(Ordering::Acquire) {
        tone.render(load_f32(freq), load_f32(volume), &mut mono);
        interleave(&mono, channels, &mut frames);
        sink.write(&frames)?;
        played += SIDETONE_CHUNK;
    }

    let mut fade = [0i16; SIDETONE_FADE];
    tone.fade_out(load_f32(freq), load_f32(volume), &mut fade);
    interleave(&fade, channels, &mut frames);
    sink.write(&frames)?;

    frames.clear();
    frames.resize(SIDETONE_TAIL * channels, 0);
    sink.write(&frames)?;
    sink.flush()?;

    log::debug!(target: "audio::player", "sidetone stopped after {played} frames");
    Ok(played)
}

impl ToneHandle {
    /// Retune in place; heard from the next chunk. A negative or non-finite
    /// pitch keeps the current one.
    pub fn set(&self, freq_hz: f32, volume: f32) {
        if let Some(freq) = usable_freq(freq_hz) {
            self.freq_bits.store(freq.to_bits(), Ordering::Release);
        }
        self.volume_bits.store(clamp_volume(volume).to_bits(), Ordering::Release);
    }

    /// Fade out and wait for the thread. Returns the tone frames written
    /// before the fade.
    pub fn stop(mut self) -> Result<usize> {
        self.halt()
    }

    fn halt(&mut self) -> Result<usize> {
        self.running.store(false, Ordering::Release);
        match self.thread.take() {
            Some(t) => t
                .join()
                .map_err(|_| AudioError::Stream("sidetone thread panicked".into()))?,
            None => Ok(0),
        }
    }
}

impl Drop for ToneHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.halt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use chiptune_core::{GbSynth, Pattern};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records into shared memory and sleeps per write to mimic a device.
    struct SlowSink {
        out: Arc<Mutex<Vec<i16>>>,
        delay: Duration,
    }

    impl AudioSink for SlowSink {
        fn sample_rate(&self) -> u32 {
            8_000
        }
        fn channels(&self) -> u16 {
            1
        }
        fn write(&mut self, interleaved: &[i16]) -> Result<()> {
            self.out.lock().unwrap().extend_from_slice(interleaved);
            thread::sleep(self.delay);
            Ok(())
        }
    }

    fn song() -> Song {
        let mut pattern = Pattern::default();
        for step in 0..16 {
            pattern.set_pulse1(step, Some(60 + step as u8));
        }
        Song { tempo: 120, ..Song::new(pattern) }
    }

    #[test]
    fn join_plays_to_the_end() {
        let handle = spawn_playback(|| Ok(MemorySink::new(8_000, 1)), song(), 1.0, false).unwrap();
        let report = handle.join().unwrap();
        let total = GbSynth::new(8_000).total_samples(&song().pattern, 120);
        assert_eq!(report, PlaybackReport { frames_played: total, cancelled: false });
    }

    #[test]
    fn stop_cancels_and_reports_playhead() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink_out = Arc::clone(&out);
        let handle = spawn_playback(
            move || Ok(SlowSink { out: sink_out, delay: Duration::from_millis(20) }),
            song(),
            1.0,
            false,
        )
        .unwrap();

        while handle.playhead().is_none() {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(handle.playhead().unwrap() < 16);

        let report = handle.stop().unwrap();
        assert!(report.cancelled);
        // 16 steps of 1000 samples at 8 kHz, 120 bpm
        assert!(report.frames_played < 16_000);
        assert!(!out.lock().unwrap().is_empty());
    }

    /// Stereo `MemorySink` shared with the test, paced like a device.
    #[derive(Clone)]
    struct SharedSink(Arc<Mutex<MemorySink>>);

    impl SharedSink {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(MemorySink::new(8_000, 2))))
        }

        fn left(&self) -> Vec<i16> {
            self.0.lock().unwrap().first_channel()
        }

        fn wait_for_frames(&self, frames: usize) {
            while self.left().len() < frames {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    impl AudioSink for SharedSink {
        fn sample_rate(&self) -> u32 {
            8_000
        }
        fn channels(&self) -> u16 {
            2
        }
        fn write(&mut self, interleaved: &[i16]) -> Result<()> {
            self.0.lock().unwrap().write(interleaved)?;
            thread::sleep(Duration::from_millis(1));
            Ok(())
        }
    }

    fn peak(buf: &[i16]) -> u16 {
        buf.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
    }

    #[test]
    fn tone_retunes_while_running() {
        let sink = SharedSink::new();
        let worker = sink.clone();
        let handle = spawn_tone(move || Ok(worker), 700.0, 0.6).unwrap();

        sink.wait_for_frames(SIDETONE_CHUNK);
        handle.set(1_900.0, 0.3);
        let seen = sink.left().len();
        // the chunk in flight may still be old; the ones after it are not
        sink.wait_for_frames(seen + 3 * SIDETONE_CHUNK);
        let played = handle.stop().unwrap();

        let left = sink.left();
        assert_eq!(left.len(), played + SIDETONE_FADE + SIDETONE_TAIL);
        let first = &left[..SIDETONE_CHUNK];
        let last = &left[played - SIDETONE_CHUNK..played];
        assert!(peak(first) > 18_000, "{}", peak(first));
        assert!((8_800..=9_831).contains(&peak(last)), "{}", peak(last));

        let stereo = sink.0.lock().unwrap().samples().to_vec();
        assert!(stereo.chunks_exact(2).all(|f| f[0] == f[1]));
    }

    #[test]
    fn tone_stop_fades_then_goes_silent() {
        let sink = SharedSink::new();
        let worker = sink.clone();
        let handle = spawn_tone(move || Ok(worker), 1_000.0, 1.0).unwrap();
        sink.wait_for_frames(2 * SIDETONE_CHUNK);
        let played = handle.stop().unwrap();

        let left = sink.left();
        assert_eq!(played % SIDETONE_CHUNK, 0);
        assert_eq!(left.len(), played + SIDETONE_FADE + SIDETONE_TAIL);

        let fade = &left[played..played + SIDETONE_FADE];
        for (i, s) in fade.iter().enumerate() {
            let bound = 32_767.0 * (1.0 - i as f32 / SIDETONE_FADE as f32);
            assert!(f32::from(s.unsigned_abs()) <= bound + 1.0, "i={i} s={s}");
        }
        assert!(peak(&fade[..16]) > 20_000, "{}", peak(&fade[..16]));
        assert!(left[played + SIDETONE_FADE..].iter().all(|&s| s == 0));
    }

    #[test]
    fn dropped_tone_still_ends_silent() {
        let sink = SharedSink::new();
        let worker = sink.clone();
        drop(spawn_tone(move || Ok(worker), f32::NAN, 0.5).unwrap());

        let left = sink.left();
        assert!(left.len() >= SIDETONE_FADE + SIDETONE_TAIL);
        assert_eq!((left.len() - SIDETONE_FADE - SIDETONE_TAIL) % SIDETONE_CHUNK, 0);
        assert!(left[left.len() - SIDETONE_TAIL..].iter().all(|&s| s == 0));
    }

    #[test]
    fn tone_sink_errors_come_back_from_stop() {
        let handle = spawn_tone(
            || Err::<MemorySink, _>(AudioError::Device("no device".into())),
            SIDETONE_HZ,
            0.5,
        )
        .unwrap();
        assert!(matches!(handle.stop(), Err(AudioError::Device(_))));
    }

    #[test]
    fn sink_errors_come_back_from_join() {
        let handle = spawn_playback(
            || Err::<MemorySink, _>(AudioError::Device("no device".into())),
            song(),
            1.0,
            false,
        )
        .unwrap();
        assert!(matches!(handle.join(), Err(AudioError::Device(_))));
    }
}
