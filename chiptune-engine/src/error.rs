//! Error type shared by sinks, stores and the player.

/// Playback and persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("audio output disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, AudioError>;
