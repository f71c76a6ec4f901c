//! Resolves a user query into song metadata using the `yt-dlp` command-line tool.
//! No audio is streamed here; the decoder does that once the song reaches the head
//! of its queue.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use super::error::{MusicError, MusicResult};
use super::song::Song;

/// Turns a query (URL or free-text search) into a `Song`.
/// Implementations must not block the runtime; the manager calls this
/// outside of any per-guild exclusive section.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Song>;
}

/// `Resolver` backed by `yt-dlp --dump-json`.
pub struct YtDlpResolver {
    program: String,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Maps a query onto the argument `yt-dlp` expects: URLs and explicit
    /// `ytsearchN:` queries pass through, anything else becomes a
    /// single-result YouTube search.
    pub fn search_target(query: &str) -> String {
        let query = query.trim();

        let is_web_url = Url::parse(query)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);

        if is_web_url || has_search_prefix(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        }
    }
}

/// True for `ytsearch:`, `ytsearchN:`, `ytsearchall:` and the `ytsearchdate`
/// variants of those.
fn has_search_prefix(query: &str) -> bool {
    let Some((prefix, _)) = query.split_once(':') else {
        return false;
    };
    let Some(count) = prefix
        .strip_prefix("ytsearchdate")
        .or_else(|| prefix.strip_prefix("ytsearch"))
    else {
        return false;
    };
    count.is_empty() || count == "all" || count.bytes().all(|b| b.is_ascii_digit())
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Song> {
        let target = Self::search_target(query);
        info!("Resolving metadata for: {}", target);

        // kill_on_drop: a caller-side timeout drops this future and must take the process with it
        let output = Command::new(&self.program)
            .args(["--dump-json", "--no-playlist", "--quiet", &target])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                MusicError::NotFound(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} exited with {}: {}", self.program, output.status, stderr.trim());
            return Err(MusicError::NotFound(format!(
                "No match for query: {}",
                query.trim()
            )));
        }

        Song::from_ytdlp_json(&output.stdout, requested_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("https://www.youtube.com/watch?v=abc", "https://www.youtube.com/watch?v=abc" ; "youtube url passes through")]
    #[test_case("http://soundcloud.com/a/b", "http://soundcloud.com/a/b" ; "plain http url passes through")]
    #[test_case("ytsearch1:\"daft punk\"", "ytsearch1:\"daft punk\"" ; "explicit search passes through")]
    #[test_case("ytsearch5:lofi", "ytsearch5:lofi" ; "search with count passes through")]
    #[test_case("ytsearch:lofi", "ytsearch:lofi" ; "bare search prefix passes through")]
    #[test_case("ytsearchall:lofi", "ytsearchall:lofi" ; "search all passes through")]
    #[test_case("ytsearchdate3:news", "ytsearchdate3:news" ; "date search passes through")]
    #[test_case("ytsearching for love", "ytsearch1:ytsearching for love" ; "lookalike word is searched")]
    #[test_case("ytsearchx: remix", "ytsearch1:ytsearchx: remix" ; "malformed prefix is searched")]
    #[test_case("daft punk around the world", "ytsearch1:daft punk around the world" ; "free text becomes search")]
    #[test_case("  lofi beats ", "ytsearch1:lofi beats" ; "free text is trimmed")]
    #[test_case("ftp://example.com/song.mp3", "ytsearch1:ftp://example.com/song.mp3" ; "non web scheme is searched")]
    fn test_search_target(query: &str, expected: &str) {
        assert_eq!(YtDlpResolver::search_target(query), expected);
    }

    /// A missing executable is reported as NotFound, never a panic.
    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let resolver = YtDlpResolver::new("definitely-not-a-real-yt-dlp-binary");

        let result = resolver.resolve("anything", "me").await;

        assert_matches!(result, Err(MusicError::NotFound(_)));
    }

    /// A process that exits nonzero is treated as no match.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_not_found() {
        let resolver = YtDlpResolver::new("false");

        let result = resolver.resolve("anything", "me").await;

        assert_matches!(result, Err(MusicError::NotFound(_)));
    }

    /// Output that is not JSON is treated as malformed metadata.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_unparsable_output_is_not_found() {
        // `echo` succeeds and prints its arguments, which are not JSON
        let resolver = YtDlpResolver::new("echo");

        let result = resolver.resolve("anything", "me").await;

        assert_matches!(result, Err(MusicError::NotFound(_)));
    }
}
