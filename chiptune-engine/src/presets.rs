//! Boot sounds: two tone sequences, a synth jingle and saved-song playback.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;

use chiptune_core::{GbSynth, Pattern, RenderOptions};

use crate::error::Result;
use crate::playback::{play_mono16, play_mono16_stream, PlaybackReport};
use crate::sink::AudioSink;
use crate::store::{load_song, KvStore, SongSlot};
use crate::stream::PatternStream;
use crate::tones::{play_sequence, Tone};

mod hz {
    pub const D4: f32 = 293.66;
    pub const G4: f32 = 392.00;
    pub const A4: f32 = 440.00;
    pub const B4: f32 = 493.88;
    pub const C5: f32 = 523.25;
    pub const D5: f32 = 587.33;
    pub const E5: f32 = 659.26;
    pub const G5: f32 = 783.99;
    pub const A5: f32 = 880.00;
    pub const FS5: f32 = 739.99;
    pub const C6: f32 = 1046.50;
}

/// Bright C-major arpeggio.
pub const CUTE: &[Tone] = &[
    Tone::new(hz::C5, 80),
    Tone::new(hz::E5, 80),
    Tone::new(hz::G5, 80),
    Tone::new(hz::C6, 100),
    Tone::new(hz::G5, 60),
    Tone::new(hz::C6, 120),
    Tone::new(hz::A5, 70),
    Tone::new(hz::G5, 70),
    Tone::new(hz::E5, 90),
    Tone::new(hz::C6, 120),
];
pub const CUTE_VOLUME: f32 = 0.5;

/// Slower rising fifths and fourths ending on D.
pub const MAJESTIC: &[Tone] = &[
    Tone::new(hz::D4, 180),
    Tone::new(hz::A4, 180),
    Tone::new(hz::D5, 260),
    Tone::new(hz::G4, 160),
    Tone::new(hz::B4, 160),
    Tone::new(hz::G5, 220),
    Tone::new(hz::A4, 180),
    Tone::new(hz::D5, 220),
    Tone::new(hz::FS5, 260),
    Tone::new(hz::E5, 240),
    Tone::new(hz::D5, 420),
];
pub const MAJESTIC_VOLUME: f32 = 0.55;

pub const GB_TEMPO: u32 = 140;
pub const GB_VOLUME: f32 = 0.9;
pub const SONG_VOLUME: f32 = 0.9;

/// Arpeggio on voice 1, harmony on voice 2, a tap every beat.
pub fn gb_pattern() -> Pattern {
    let mut pat = Pattern::default();
    for (step, note) in [(0, 60), (4, 64), (8, 67), (12, 72)] {
        pat.set_pulse1(step, Some(note));
    }
    for (step, note) in [(2, 67), (6, 71), (10, 74), (14, 76)] {
        pat.set_pulse2(step, Some(note));
    }
    for (step, idx) in [(3, 3), (7, 2), (11, 3), (15, 1)] {
        pat.set_noise(step, Some(idx));
    }
    pat
}

/// Thin 12.5% lead over a square harmony, short noise.
pub fn gb_options() -> RenderOptions {
    RenderOptions {
        duty1: 0.125,
        duty2: 0.5,
        noise_short: true,
        ch1_sine: false,
    }
}

pub fn play_cute<S: AudioSink + ?Sized>(sink: &mut S, volume: f32) -> Result<PlaybackReport> {
    play_sequence(sink, CUTE, volume)
}

pub fn play_majestic<S: AudioSink + ?Sized>(sink: &mut S, volume: f32) -> Result<PlaybackReport> {
    play_sequence(sink, MAJESTIC, volume)
}

/// Renders the whole jingle up front; it is short.
pub fn play_gb<S: AudioSink + ?Sized>(sink: &mut S, volume: f32) -> Result<PlaybackReport> {
    let pcm = GbSynth::new(sink.sample_rate()).render(&gb_pattern(), GB_TEMPO, &gb_options());
    play_mono16(sink, &pcm, volume)
}

/// Stream a saved slot with voice 1 as a sine. `Ok(None)` when the slot is empty.
pub fn play_song<S, K>(
    sink: &mut S,
    store: &K,
    slot: SongSlot,
    volume: f32,
    cancel: Option<&AtomicBool>,
) -> Result<Option<PlaybackReport>>
where
    S: AudioSink + ?Sized,
    K: KvStore + ?Sized,
{
    let Some(song) = load_song(store, slot) else {
        log::debug!(target: "audio::playback", "slot {slot} is empty");
        return Ok(None);
    };
    let mut stream = PatternStream::new(sink.sample_rate(), song, true);
    let total = stream.total_samples();
    play_mono16_stream(sink, total, volume, cancel, &mut stream).map(Some)
}

/// A selectable boot sound.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootSound {
    Cute,
    Majestic,
    Gb,
    Song(SongSlot),
}

impl BootSound {
    pub fn default_volume(self) -> f32 {
        match self {
            BootSound::Cute => CUTE_VOLUME,
            BootSound::Majestic => MAJESTIC_VOLUME,
            BootSound::Gb => GB_VOLUME,
            BootSound::Song(_) => SONG_VOLUME,
        }
    }

    /// Play through `sink`. An empty song slot plays nothing.
    pub fn play<S, K>(self, sink: &mut S, store: &K, volume: f32) -> Result<PlaybackReport>
    where
        S: AudioSink + ?Sized,
        K: KvStore + ?Sized,
    {
        match self {
            BootSound::Cute => play_cute(sink, volume),
            BootSound::Majestic => play_majestic(sink, volume),
            BootSound::Gb => play_gb(sink, volume),
            BootSound::Song(slot) => {
                Ok(play_song(sink, store, slot, volume, None)?.unwrap_or_default())
            }
        }
    }
}

impl fmt::Display for BootSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootSound::Cute => f.write_str("cute"),
            BootSound::Majestic => f.write_str("majestic"),
            BootSound::Gb => f.write_str("gb"),
            BootSound::Song(slot) => write!(f, "song{slot}"),
        }
    }
}

impl FromStr for BootSound {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "cute" => Ok(BootSound::Cute),
            "majestic" => Ok(BootSound::Majestic),
            "gb" => Ok(BootSound::Gb),
            other => other
                .strip_prefix("song")
                .and_then(|n| n.parse::<u8>().ok())
                .and_then(SongSlot::new)
                .map(BootSound::Song)
                .ok_or_else(|| format!("unknown boot sound {s:?} (cute, majestic, gb, song1..song3)")),
        }
    }
}
