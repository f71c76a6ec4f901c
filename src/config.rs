//! Runtime configuration, read from the environment (and `.env` via dotenv).

use std::time::Duration;
use tracing::debug;

use crate::music::{MusicError, MusicResult, PlaybackSettings};

const DEFAULT_YTDLP_PATH: &str = "yt-dlp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub discord_token: String,
    /// Executable used both to resolve metadata and to stream audio.
    pub ytdlp_path: String,
    pub playback: PlaybackSettings,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> MusicResult<Self> {
        if dotenv::dotenv().is_err() {
            debug!("No .env file found, using the process environment only");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> MusicResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| MusicError::ConfigError("DISCORD_TOKEN is not set".to_string()))?;

        let ytdlp_path = lookup("YTDLP_PATH")
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_YTDLP_PATH.to_string());

        let defaults = PlaybackSettings::default();
        let idle_timeout = duration_var(&lookup, "IDLE_TIMEOUT", defaults.idle_timeout)?;
        let resolve_timeout = duration_var(&lookup, "RESOLVE_TIMEOUT", defaults.resolve_timeout)?;

        if idle_timeout.is_zero() {
            return Err(MusicError::ConfigError(
                "IDLE_TIMEOUT must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            discord_token,
            ytdlp_path,
            playback: PlaybackSettings {
                idle_timeout,
                resolve_timeout,
            },
        })
    }
}

fn duration_var<F>(lookup: &F, key: &str, default: Duration) -> MusicResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => humantime::parse_duration(value.trim())
            .map_err(|e| MusicError::ConfigError(format!("{} is invalid ({}): {}", key, value, e))),
        None => Ok(default),
    }
}
