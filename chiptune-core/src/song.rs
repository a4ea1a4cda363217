//! Persisted song format.
//!
//! ```text
//! tempo=<int>;d2=<0..3>;ns=<0|1>;p1=<16 csv>;p2=<16 csv>;nz=<16 csv>;
//! ```
//!
//! Loading never fails: missing or malformed fields fall back to defaults
//! (tempo 120, duty index 2, long noise, all rests). Lists are padded with
//! `-1` or truncated to 16 entries, and noise entries are clamped to
//! [-1, 2] to stay compatible with older saves that only had three drums.
//! List elements read like C `strtol`: no leading digits means 0.

use alloc::string::String;
use alloc::vec::Vec;
use core::convert::Infallible;
use core::fmt;
use core::str::FromStr;

use crate::pattern::{Pattern, STEPS};
use crate::synth::RenderOptions;

/// Duty cycle per `d2` index.
pub const DUTY_TABLE: [f32; 4] = [0.125, 0.25, 0.5, 0.75];

pub const DEFAULT_TEMPO: u32 = 120;
pub const DEFAULT_DUTY_INDEX: u8 = 2;

/// Voice 1 duty; not persisted.
pub const DEFAULT_DUTY1: f32 = 0.5;

/// Highest noise index accepted on load.
pub const NOISE_LOAD_MAX: u8 = 2;

const MIDI_MAX: u8 = 127;

/// A pattern plus the playback settings saved alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Song {
    pub tempo: u32,
    /// Index into [`DUTY_TABLE`] for voice 2.
    pub duty2_index: u8,
    pub noise_short: bool,
    pub pattern: Pattern,
}

impl Song {
    pub fn new(pattern: Pattern) -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            duty2_index: DEFAULT_DUTY_INDEX,
            noise_short: false,
            pattern,
        }
    }

    /// Voice 2 duty cycle; indices past the table use the last entry.
    #[inline]
    pub fn duty2(&self) -> f32 {
        DUTY_TABLE[usize::from(self.duty2_index).min(DUTY_TABLE.len() - 1)]
    }

    /// Voicing for this song's playback.
    pub fn render_options(&self, ch1_sine: bool) -> RenderOptions {
        RenderOptions {
            duty1: DEFAULT_DUTY1,
            duty2: self.duty2(),
            noise_short: self.noise_short,
            ch1_sine,
        }
    }

    /// Parse a persisted string. Never fails; see the module docs for defaults.
    pub fn parse(s: &str) -> Self {
        let mut song = Self::default();

        if let Some(tempo) = field(s, "tempo").and_then(leading_int) {
            if tempo > 0 {
                song.tempo = u32::try_from(tempo).unwrap_or(u32::MAX);
            }
        }
        if let Some(d2) = field(s, "d2").and_then(leading_int) {
            // 0..=2 pick their duty; anything else (negative too) is the widest
            song.duty2_index = if (0..=2).contains(&d2) { d2 as u8 } else { 3 };
        }
        if let Some(ns) = field(s, "ns").and_then(leading_int) {
            song.noise_short = ns != 0;
        }

        if let Some(list) = field(s, "p1") {
            song.pattern.pulse1 = parse_list(list, note_from_int);
        }
        if let Some(list) = field(s, "p2") {
            song.pattern.pulse2 = parse_list(list, note_from_int);
        }
        if let Some(list) = field(s, "nz") {
            song.pattern.noise = parse_list(list, noise_from_int);
        }
        song
    }

    /// Serialize to the persisted format (always 16 entries per list).
    pub fn to_persisted(&self) -> String {
        alloc::string::ToString::to_string(self)
    }
}

impl Default for Song {
    fn default() -> Self {
        Self::new(Pattern::default())
    }
}

impl FromStr for Song {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tempo={};d2={};ns={};",
            self.tempo,
            self.duty2_index,
            u8::from(self.noise_short)
        )?;
        write_list(f, "p1", |i| self.pattern.pulse1_at(i))?;
        write_list(f, "p2", |i| self.pattern.pulse2_at(i))?;
        write_list(f, "nz", |i| self.pattern.noise_at(i))
    }
}

fn write_list(
    f: &mut fmt::Formatter<'_>,
    key: &str,
    at: impl Fn(usize) -> Option<u8>,
) -> fmt::Result {
    write!(f, "{key}=")?;
    for i in 0..STEPS {
        if i > 0 {
            f.write_str(",")?;
        }
        match at(i) {
            Some(v) => write!(f, "{v}")?,
            None => f.write_str("-1")?,
        }
    }
    f.write_str(";")
}

/// Trimmed value of the first `key=value` segment; `None` when absent or empty.
fn field<'a>(s: &'a str, key: &str) -> Option<&'a str> {
    s.split(';')
        .filter_map(|seg| seg.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// `strtol`-style: optional sign then decimal digits, trailing junk ignored.
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits.bytes().take_while(u8::is_ascii_digit).count();
    if end == 0 {
        return None;
    }
    let mut v: i64 = 0;
    for b in digits[..end].bytes() {
        v = v.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    Some(if neg { -v } else { v })
}

fn note_from_int(v: i64) -> Option<u8> {
    if v < 0 { None } else { Some(v.min(i64::from(MIDI_MAX)) as u8) }
}

fn noise_from_int(v: i64) -> Option<u8> {
    if v < 0 { None } else { Some(v.min(i64::from(NOISE_LOAD_MAX)) as u8) }
}

fn parse_list(list: &str, conv: fn(i64) -> Option<u8>) -> Vec<Option<u8>> {
    let mut out: Vec<Option<u8>> = list
        .split(',')
        .take(STEPS)
        .map(|item| conv(leading_int(item).unwrap_or(0)))
        .collect();
    out.resize(STEPS, None);
    out
}

// ------------------------------------ Tests --------------------------------------
