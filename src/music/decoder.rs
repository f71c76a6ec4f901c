//! Spawns one `yt-dlp` process per song to turn a page URL into an audio byte
//! stream, and supervises it until it exits or is stopped.

use std::io::Read;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, warn};

use super::error::{MusicError, MusicResult};
use super::events::{CycleNotifier, PlaybackEvent};

/// Blocking byte stream consumed by the sink.
pub type AudioBytes = Box<dyn Read + Send + Sync>;

/// Control handle for a running decoder process.
pub trait DecoderProcess: Send + Sync {
    /// Terminates the process and releases its handles.
    /// Safe to call more than once and after the process already exited.
    fn stop(&mut self);
}

/// A started decode: the audio output plus the handle that owns the process.
pub struct DecodeStream {
    pub audio: AudioBytes,
    pub process: Box<dyn DecoderProcess>,
}

impl std::fmt::Debug for DecodeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeStream").finish_non_exhaustive()
    }
}

/// Starts decoders. Failures and exits of the started process are reported
/// through `notifier` rather than the return value.
pub trait Decoder: Send + Sync {
    fn start(&self, url: &str, notifier: CycleNotifier) -> MusicResult<DecodeStream>;
}

/// `Decoder` that pipes `yt-dlp -o -` into the sink.
pub struct YtDlpDecoder {
    program: String,
}

impl YtDlpDecoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for YtDlpDecoder {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl Decoder for YtDlpDecoder {
    fn start(&self, url: &str, notifier: CycleNotifier) -> MusicResult<DecodeStream> {
        let mut child = Command::new(&self.program)
            .args([
                url,
                "-f",
                "bestaudio[ext=opus]/bestaudio/best",
                "-o",
                "-",
                "--quiet",
                "--no-playlist",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MusicError::DecodeFailed(format!("Failed to spawn {}: {}", self.program, e))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MusicError::DecodeFailed("decoder stdout was not captured".to_string())
        })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, notifier.clone()));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(supervise(child, stop_rx, notifier));

        Ok(DecodeStream {
            // the sink reads on its own threads, outside the runtime
            audio: Box::new(SyncIoBridge::new(stdout)),
            process: Box::new(YtDlpProcess {
                stop_tx: Some(stop_tx),
            }),
        })
    }
}

/// Handle to a supervised `yt-dlp` child. Dropping it stops the process.
struct YtDlpProcess {
    stop_tx: Option<oneshot::Sender<()>>,
}

impl DecoderProcess for YtDlpProcess {
    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // the supervisor may already be gone if the process exited
            let _ = stop_tx.send(());
        }
    }
}

impl Drop for YtDlpProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Waits for the child to exit or for a stop request, whichever comes first.
/// A requested stop kills and reaps the child without reporting an exit.
async fn supervise(mut child: Child, stop_rx: oneshot::Receiver<()>, notifier: CycleNotifier) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                debug!("Decoder for cycle {} exited with {}", notifier.cycle(), status);
                notifier.notify(PlaybackEvent::DecoderExited(status.code()));
            }
            Err(e) => {
                warn!("Failed to wait on decoder for cycle {}: {}", notifier.cycle(), e);
                notifier.notify(PlaybackEvent::DecoderExited(None));
            }
        },
        _ = stop_rx => {
            if let Err(e) = child.kill().await {
                debug!("Decoder for cycle {} was already gone: {}", notifier.cycle(), e);
            }
        }
    }
}

async fn forward_stderr(stderr: ChildStderr, notifier: CycleNotifier) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if !line.is_empty() {
            notifier.notify(PlaybackEvent::DecoderStderr(line.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::events::CycleEvent;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn notifier(cycle: u64) -> (CycleNotifier, mpsc::UnboundedReceiver<CycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CycleNotifier::new(cycle, tx), rx)
    }

    #[tokio::test]
    async fn test_spawn_failure_is_decode_failed() {
        let decoder = YtDlpDecoder::new("definitely-not-a-real-yt-dlp-binary");
        let (notifier, _rx) = notifier(1);

        let result = decoder.start("https://example.com", notifier);

        assert_matches!(result, Err(MusicError::DecodeFailed(_)));
    }

    /// A failing process reports its exit code, tagged with its cycle.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_process_reports_exit_code() {
        let decoder = YtDlpDecoder::new("false");
        let (notifier, mut rx) = notifier(7);

        let _stream = decoder.start("https://example.com", notifier).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match rx.recv().await {
                    Some(CycleEvent {
                        event: PlaybackEvent::DecoderStderr(_),
                        ..
                    }) => continue,
                    other => return other,
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(
            event,
            Some(CycleEvent {
                cycle: 7,
                event: PlaybackEvent::DecoderExited(Some(1)),
            })
        );
    }

    /// Stopping a process that already exited must be harmless, twice over.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_after_exit_is_safe() {
        let decoder = YtDlpDecoder::new("true");
        let (notifier, mut rx) = notifier(1);

        let mut stream = decoder.start("https://example.com", notifier).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;

        stream.process.stop();
        stream.process.stop();
    }

    /// Stopping a live process kills and reaps it, and the kill is not
    /// mistaken for an exit of its own.
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_stop_kills_running_process() {
        let dir = std::env::temp_dir();
        let tag = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        let pid_file = dir.join(format!("rusty-dj-decoder-{}.pid", tag));
        let script = dir.join(format!("rusty-dj-decoder-{}.sh", tag));
        std::fs::write(
            &script,
            format!("echo $$ > {}\nexec sleep 30\n", pid_file.display()),
        )
        .unwrap();

        // `sh <script> -f ...` runs the script with the decoder flags as arguments
        let decoder = YtDlpDecoder::new("sh");
        let (notifier, mut rx) = notifier(3);
        let mut stream = decoder.start(script.to_str().unwrap(), notifier).unwrap();

        let pid: u32 = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Ok(text) = std::fs::read_to_string(&pid_file) {
                    if let Ok(pid) = text.trim().parse() {
                        return pid;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        let proc_entry = std::path::PathBuf::from(format!("/proc/{}", pid));
        assert!(proc_entry.exists());

        stream.process.stop();

        tokio::time::timeout(Duration::from_secs(10), async {
            while proc_entry.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let mut events = Vec::new();
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(500), rx.recv()).await
        {
            events.push(event);
        }
        assert!(
            !events
                .iter()
                .any(|e| matches!(e.event, PlaybackEvent::DecoderExited(_))),
            "unexpected exit events: {:?}",
            events
        );

        stream.process.stop();
        let _ = std::fs::remove_file(&script);
        let _ = std::fs::remove_file(&pid_file);
    }
}
