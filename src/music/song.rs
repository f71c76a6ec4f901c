//! Defines the `Song` value type and its construction from `yt-dlp` output.

use serde::Deserialize;
use std::time::Duration;

use super::error::{MusicError, MusicResult};

/// A resolved, playable song. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    /// The title of the song.
    pub title: String,
    /// Canonical page URL, handed to the decoder.
    pub url: String,
    /// Duration of the song; zero for live streams.
    pub duration: Duration,
    /// The name of the user who requested the song.
    pub requested_by: String,
}

/// Subset of the `yt-dlp --dump-json` document we care about.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
}

impl Song {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        duration: Duration,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            duration,
            requested_by: requested_by.into(),
        }
    }

    /// Builds a `Song` from the captured stdout of `yt-dlp --dump-json`.
    ///
    /// Only the first non-empty line is considered; searches print one JSON
    /// document per entry. A document without `webpage_url` cannot be played
    /// and is reported as `NotFound`.
    pub fn from_ytdlp_json(stdout: &[u8], requested_by: &str) -> MusicResult<Song> {
        let text = std::str::from_utf8(stdout)
            .map_err(|e| MusicError::NotFound(format!("metadata is not valid UTF-8: {}", e)))?;

        let line = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| MusicError::NotFound("yt-dlp returned no metadata".to_string()))?;

        let info: VideoInfo = serde_json::from_str(line)
            .map_err(|e| MusicError::NotFound(format!("Failed to parse video metadata: {}", e)))?;

        let url = info
            .webpage_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| MusicError::NotFound("metadata has no webpage_url".to_string()))?;

        let duration = info
            .duration
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_default();

        Ok(Song {
            title: info.title.unwrap_or_else(|| "Unknown Title".to_string()),
            url,
            duration,
            requested_by: requested_by.to_string(),
        })
    }
}
