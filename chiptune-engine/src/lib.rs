//! Chiptune Engine: playback around the `chiptune-core` synth.
//!
//! Crate layout:
//! - [`sink`]     : `AudioSink` trait and the in-memory `MemorySink`
//! - [`playback`] : pull-based streaming driver (`Fill`, volume, cancel, silence padding)
//! - [`stream`]   : `PatternStream`, a `Fill` source over `GbSynth::render_block`
//! - [`tones`]    : sine tone bursts, note sequences, key sidetone
//! - [`presets`]  : boot sounds and saved-song playback
//! - [`store`]    : key/value store, song slots
//! - [`settings`] : persisted sound on/off + volume
//! - [`wav`]      : 16-bit WAV file sink (hound)
//! - [`realtime`] : cpal output sink (feature `realtime`)
//! - [`player`]   : background song thread (stop + playhead) and sidetone thread
//!
//! The synth never sees the sink; everything in between is plain `&mut`
//! handles, no globals.

pub mod error;
pub mod player;
pub mod playback;
pub mod presets;
pub mod settings;
pub mod sink;
pub mod store;
pub mod stream;
pub mod tones;
pub mod wav;

cfg_if::cfg_if! {
    if #[cfg(feature = "realtime")] {
        pub mod realtime;
        pub use realtime::{CpalSink, DeviceOptions};
    }
}

// Re-export some commonly used items to make downstream imports ergonomic.
pub use error::{AudioError, Result};
pub use playback::{play_fill, play_mono16, play_mono16_stream, Fill, PlaybackReport};
pub use player::{spawn_playback, spawn_tone, PlaybackHandle, ToneHandle};
pub use presets::BootSound;
pub use settings::SoundSettings;
pub use sink::{AudioSink, MemorySink};
pub use store::{load_song, save_song, FileStore, KvStore, MemoryStore, SongSlot};
pub use stream::PatternStream;
pub use tones::{play_sequence, play_tone, Sidetone, Tone, ToneSource};
pub use wav::WavSink;

pub use chiptune_core::{GbSynth, Pattern, RenderOptions, Song, StreamState};
