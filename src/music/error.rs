use thiserror::Error;

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("User is not in a voice channel")]
    VoiceUnavailable,

    #[error("No result found: {0}")]
    NotFound(String),

    #[error("Failed to join voice channel: {0}")]
    ConnectionFailed(String),

    #[error("Nothing is playing")]
    NothingPlaying,

    #[error("No active playback session")]
    NothingActive,

    #[error("Failed to decode audio: {0}")]
    DecodeFailed(String),

    #[error("Playback session was closed before the request completed")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;
