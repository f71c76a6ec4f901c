//! Public entry points of the playback core.
//!
//! `PlaybackManager` keeps one session per guild in a concurrent map and
//! routes every call to the owning session. Metadata resolution, the only
//! slow part of `enqueue`, runs in the caller's task before the song is
//! handed to the session, so a search in flight never blocks `skip` or
//! `stop` for the same guild.

use futures::future::join_all;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use super::decoder::Decoder;
use super::error::{MusicError, MusicResult};
use super::guild_queue::QueueSnapshot;
use super::resolver::Resolver;
use super::session::{self, CloseReason, Enqueued, Registry, SessionDeps, SessionHandle};
use super::sink::SinkConnector;
use super::song::Song;

/// Default idle window before an empty session leaves its channel.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
/// Default bound on a single metadata lookup.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    pub idle_timeout: Duration,
    pub resolve_timeout: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }
}

pub struct PlaybackManager {
    sessions: Arc<Registry>,
    resolver: Arc<dyn Resolver>,
    deps: SessionDeps,
    resolve_timeout: Duration,
    generations: AtomicU64,
}

impl PlaybackManager {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        decoder: Arc<dyn Decoder>,
        connector: Arc<dyn SinkConnector>,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(Registry::new()),
            resolver,
            deps: SessionDeps {
                decoder,
                connector,
                idle_timeout: settings.idle_timeout,
            },
            resolve_timeout: settings.resolve_timeout,
            generations: AtomicU64::new(0),
        }
    }

    /// Resolves `query` and appends it to the guild's queue, joining
    /// `voice_channel` first if the guild has no session yet.
    ///
    /// Songs are appended in the order their lookups complete, which is not
    /// necessarily the order they were requested.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        query: &str,
        requested_by: &str,
        voice_channel: Option<ChannelId>,
    ) -> MusicResult<Enqueued> {
        let mut session = self.connect(guild_id, voice_channel).await?;
        let song = self.resolve(query, requested_by).await?;

        let mut reconnected = false;
        loop {
            match session.append(song.clone()).await {
                Ok(enqueued) => return Ok(enqueued),
                // nobody asked to leave; the channel just went quiet while we searched
                Err(CloseReason::IdleTimeout) if !reconnected => {
                    info!(
                        "Session for guild {} expired while resolving \"{}\", reconnecting",
                        guild_id, song.title
                    );
                    reconnected = true;
                    session = self.connect(guild_id, voice_channel).await?;
                }
                Err(reason) => {
                    info!(
                        "Dropping \"{}\" for guild {}: session closed ({:?})",
                        song.title, guild_id, reason
                    );
                    return Err(MusicError::SessionClosed);
                }
            }
        }
    }

    /// Stops the current song; the next one starts exactly as if it had ended.
    pub async fn skip(&self, guild_id: GuildId) -> MusicResult<Song> {
        match self.session(guild_id) {
            Some(session) => session.skip().await,
            None => Err(MusicError::NothingPlaying),
        }
    }

    /// Clears the queue, kills the decoder and leaves the voice channel.
    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<()> {
        match self.session(guild_id) {
            Some(session) => session.stop().await,
            None => Err(MusicError::NothingActive),
        }
    }

    /// Pending songs, currently playing first. Empty without a session.
    pub async fn list(&self, guild_id: GuildId) -> Vec<Song> {
        self.snapshot(guild_id)
            .await
            .map(|snapshot| snapshot.songs)
            .unwrap_or_default()
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Option<QueueSnapshot> {
        self.session(guild_id)?.snapshot().await
    }

    pub fn is_active(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    /// Stops every session. Used on shutdown.
    pub async fn stop_all(&self) {
        let sessions: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        info!("Stopping {} playback sessions", sessions.len());
        join_all(sessions.iter().map(SessionHandle::stop)).await;
    }

    fn session(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions
            .get(&guild_id)
            .map(|entry| entry.value().clone())
    }

    async fn connect(
        &self,
        guild_id: GuildId,
        voice_channel: Option<ChannelId>,
    ) -> MusicResult<SessionHandle> {
        let session = match voice_channel {
            Some(channel_id) => self
                .sessions
                .entry(guild_id)
                .or_insert_with(|| {
                    let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
                    info!("Creating playback session for guild {}", guild_id);
                    session::spawn(
                        guild_id,
                        channel_id,
                        generation,
                        self.deps.clone(),
                        Arc::downgrade(&self.sessions),
                    )
                })
                .value()
                .clone(),
            None => self
                .session(guild_id)
                .ok_or(MusicError::VoiceUnavailable)?,
        };

        session.connected().await?;
        Ok(session)
    }

    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Song> {
        match tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(query, requested_by))
            .await
        {
            Ok(Ok(song)) => Ok(song),
            Ok(Err(MusicError::NotFound(reason))) => Err(MusicError::NotFound(reason)),
            Ok(Err(other)) => Err(MusicError::NotFound(other.to_string())),
            Err(_) => {
                warn!(
                    "Resolving \"{}\" took longer than {:?}, giving up",
                    query, self.resolve_timeout
                );
                Err(MusicError::NotFound(format!(
                    "Timed out looking up: {}",
                    query
                )))
            }
        }
    }
}
