//! In-memory stand-ins for yt-dlp and the voice connection.
//!
//! The fakes record what the manager asked of them so tests can assert on
//! leaks (processes still running, sinks never released) as well as order.

use async_trait::async_trait;
use mockall::mock;
use rusty_dj::music::{
    AudioBytes, CycleNotifier, DecodeStream, Decoder, DecoderProcess, MusicError, MusicResult,
    PlaybackEvent, Resolver, Sink, SinkConnector, Song,
};
use serenity::model::id::{ChannelId, GuildId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::fixtures;

mock! {
    pub Resolver {}

    #[async_trait]
    impl Resolver for Resolver {
        async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Song>;
    }
}

/// Resolves `query` to `fixtures::song(query)` after a per-query delay.
/// Queries listed as missing resolve to `NotFound`.
#[derive(Default)]
pub struct FakeResolver {
    delays: HashMap<String, Duration>,
    missing: HashSet<String>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn with_missing(mut self, query: &str) -> Self {
        self.missing.insert(query.to_string());
        self
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Song> {
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        if self.missing.contains(query) {
            return Err(MusicError::NotFound(query.to_string()));
        }
        let mut song = fixtures::song(query);
        song.requested_by = requested_by.to_string();
        Ok(song)
    }
}

/// What the fake decoder saw.
#[derive(Default)]
pub struct DecoderLog {
    started: Mutex<Vec<(String, CycleNotifier)>>,
    running: AtomicUsize,
}

impl DecoderLog {
    /// URLs of every decoder that was started, in order.
    pub fn started(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Decoders started but never stopped.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Raises `event` as if the `index`-th started decoder produced it.
    pub fn emit(&self, index: usize, event: PlaybackEvent) {
        let started = self.started.lock().unwrap();
        started[index].1.notify(event);
    }
}

/// Decoder that never spawns anything. URLs listed as unspawnable fail
/// like a missing binary would.
#[derive(Default)]
pub struct FakeDecoder {
    log: Arc<DecoderLog>,
    unspawnable: HashSet<String>,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unspawnable(mut self, name: &str) -> Self {
        self.unspawnable.insert(fixtures::song(name).url);
        self
    }

    pub fn log(&self) -> Arc<DecoderLog> {
        Arc::clone(&self.log)
    }
}

impl Decoder for FakeDecoder {
    fn start(&self, url: &str, notifier: CycleNotifier) -> MusicResult<DecodeStream> {
        if self.unspawnable.contains(url) {
            return Err(MusicError::DecodeFailed(format!("cannot spawn for {}", url)));
        }

        self.log
            .started
            .lock()
            .unwrap()
            .push((url.to_string(), notifier));
        self.log.running.fetch_add(1, Ordering::SeqCst);

        Ok(DecodeStream {
            audio: Box::new(std::io::empty()),
            process: Box::new(FakeProcess {
                log: Arc::clone(&self.log),
                stopped: false,
            }),
        })
    }
}

struct FakeProcess {
    log: Arc<DecoderLog>,
    stopped: bool,
}

impl DecoderProcess for FakeProcess {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.log.running.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Shared view of every sink the fake connector handed out.
#[derive(Default)]
pub struct SinkProbe {
    attaches: AtomicUsize,
    releases: AtomicUsize,
    plays: AtomicUsize,
    current: Mutex<Option<(CycleNotifier, Arc<AtomicBool>)>>,
}

impl SinkProbe {
    pub fn attaches(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    /// The current stream ran to its end.
    pub fn finish_current(&self) {
        self.go_idle();
    }

    /// Emits the single idle notification of the current stream, if it has
    /// not gone idle yet, the way a voice player does when its track ends
    /// or is stopped.
    fn go_idle(&self) {
        if let Some((notifier, fired)) = self.current.lock().unwrap().as_ref() {
            if !fired.swap(true, Ordering::SeqCst) {
                notifier.notify(PlaybackEvent::SinkIdle);
            }
        }
    }
}

pub struct FakeConnector {
    probe: Arc<SinkProbe>,
    fail: bool,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(SinkProbe::default()),
            fail: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn probe(&self) -> Arc<SinkProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl SinkConnector for FakeConnector {
    async fn attach(&self, _guild_id: GuildId, channel_id: ChannelId) -> MusicResult<Box<dyn Sink>> {
        if self.fail {
            return Err(MusicError::ConnectionFailed(format!(
                "channel {} unreachable",
                channel_id
            )));
        }
        self.probe.attaches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSink {
            probe: Arc::clone(&self.probe),
        }))
    }
}

struct FakeSink {
    probe: Arc<SinkProbe>,
}

#[async_trait]
impl Sink for FakeSink {
    async fn play(&mut self, _audio: AudioBytes, notifier: CycleNotifier) {
        // a new stream supersedes the old one, which goes idle
        self.probe.go_idle();
        self.probe.plays.fetch_add(1, Ordering::SeqCst);
        *self.probe.current.lock().unwrap() = Some((notifier, Arc::new(AtomicBool::new(false))));
    }

    async fn stop(&mut self, _force: bool) {
        self.probe.go_idle();
    }

    async fn release(self: Box<Self>) {
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
    }
}
