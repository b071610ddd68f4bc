//! Error types for the fireside voice system

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur in the voice pipeline
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        VoiceError::Transport(err.to_string())
    }
}

impl VoiceError {
    /// Whether this error is a deliberate cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, VoiceError::Cancelled)
    }
}
