//! The exclusive section of one guild.
//!
//! Every guild with an open voice connection gets a task that owns its
//! `GuildQueue`. Commands from callers and events from the decoder and sink
//! arrive on channels and are applied one at a time, so no two mutations of
//! the same queue can interleave while different guilds never contend.

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::decoder::Decoder;
use super::error::{MusicError, MusicResult};
use super::events::{CycleEvent, CycleNotifier, PlaybackEvent};
use super::guild_queue::{GuildQueue, QueueSnapshot};
use super::sink::SinkConnector;
use super::song::Song;

/// Guild id -> live session. Shared between the manager and its sessions.
pub(crate) type Registry = DashMap<GuildId, SessionHandle>;

/// Outcome of a successful enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    pub song: Song,
    /// Index in the queue; `0` means the song is the one playing now.
    pub position: usize,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Stopped,
    IdleTimeout,
    ConnectionFailed,
}

/// What moved the queue forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Finished,
    DecodeFailed,
    Skip,
}

pub(crate) enum Command {
    Append {
        song: Song,
        reply: oneshot::Sender<Enqueued>,
    },
    Skip {
        reply: oneshot::Sender<MusicResult<Song>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },
}

#[derive(Debug, Clone)]
enum Connection {
    Pending,
    Ready,
    Failed(MusicError),
}

/// Collaborators every session needs.
#[derive(Clone)]
pub(crate) struct SessionDeps {
    pub decoder: Arc<dyn Decoder>,
    pub connector: Arc<dyn SinkConnector>,
    pub idle_timeout: Duration,
}

/// Cheap, cloneable address of a running session.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    generation: u64,
    commands: mpsc::UnboundedSender<Command>,
    connection: watch::Receiver<Connection>,
    closed: Arc<OnceLock<CloseReason>>,
}

impl SessionHandle {
    /// Waits until the sink is attached, or reports why it never will be.
    pub async fn connected(&self) -> MusicResult<()> {
        let mut connection = self.connection.clone();
        let state = connection
            .wait_for(|state| !matches!(state, Connection::Pending))
            .await
            .map_err(|_| MusicError::ConnectionFailed("session ended while connecting".to_string()))?;

        match &*state {
            Connection::Failed(err) => Err(err.clone()),
            _ => Ok(()),
        }
    }

    pub async fn append(&self, song: Song) -> Result<Enqueued, CloseReason> {
        self.request(|reply| Command::Append { song, reply }).await
    }

    pub async fn skip(&self) -> MusicResult<Song> {
        self.request(|reply| Command::Skip { reply })
            .await
            .unwrap_or(Err(MusicError::NothingPlaying))
    }

    pub async fn stop(&self) -> MusicResult<()> {
        self.request(|reply| Command::Stop { reply })
            .await
            .map_err(|_| MusicError::NothingActive)
    }

    pub async fn snapshot(&self) -> Option<QueueSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await.ok()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CloseReason> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(command(reply)).is_err() {
            return Err(self.close_reason());
        }
        response.await.map_err(|_| self.close_reason())
    }

    fn close_reason(&self) -> CloseReason {
        // set before the command channel is dropped, so a dropped reply always finds it
        self.closed.get().copied().unwrap_or(CloseReason::Stopped)
    }
}

/// Starts the session task for `guild_id`. The task attaches the sink first;
/// callers learn the outcome through `SessionHandle::connected`.
pub(crate) fn spawn(
    guild_id: GuildId,
    channel_id: ChannelId,
    generation: u64,
    deps: SessionDeps,
    registry: Weak<Registry>,
) -> SessionHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (connection_tx, connection_rx) = watch::channel(Connection::Pending);
    let closed = Arc::new(OnceLock::new());

    let exit = SessionExit {
        guild_id,
        generation,
        registry,
        closed: Arc::clone(&closed),
    };

    let span = info_span!("session", guild_id = %guild_id, generation);
    tokio::spawn(
        connect_and_run(guild_id, channel_id, deps, commands_rx, connection_tx, exit)
            .instrument(span),
    );

    SessionHandle {
        generation,
        commands: commands_tx,
        connection: connection_rx,
        closed,
    }
}

async fn connect_and_run(
    guild_id: GuildId,
    channel_id: ChannelId,
    deps: SessionDeps,
    commands: mpsc::UnboundedReceiver<Command>,
    connection: watch::Sender<Connection>,
    exit: SessionExit,
) {
    let sink = match deps.connector.attach(guild_id, channel_id).await {
        Ok(sink) => sink,
        Err(err) => {
            error!("Could not connect to voice channel {}: {}", channel_id, err);
            exit.close(CloseReason::ConnectionFailed);
            connection.send_replace(Connection::Failed(err));
            return;
        }
    };
    connection.send_replace(Connection::Ready);

    let (events_tx, events) = mpsc::unbounded_channel();
    let mut queue = GuildQueue::new(guild_id, sink);
    // a session whose first lookup fails must still be reclaimed
    queue.arm_idle(deps.idle_timeout);

    Session {
        queue,
        commands,
        events_tx,
        events,
        decoder: deps.decoder,
        idle_timeout: deps.idle_timeout,
    }
    .run(exit)
    .await;
}

/// Unregisters a finished session, but never a newer one for the same guild.
struct SessionExit {
    guild_id: GuildId,
    generation: u64,
    registry: Weak<Registry>,
    closed: Arc<OnceLock<CloseReason>>,
}

impl SessionExit {
    fn close(&self, reason: CloseReason) {
        let _ = self.closed.set(reason);
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_if(&self.guild_id, |_, handle| {
                handle.generation == self.generation
            });
        }
    }
}

struct Session {
    queue: GuildQueue,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<CycleEvent>,
    events: mpsc::UnboundedReceiver<CycleEvent>,
    decoder: Arc<dyn Decoder>,
    idle_timeout: Duration,
}

impl Session {
    async fn run(mut self, exit: SessionExit) {
        let (reason, ack) = loop {
            let deadline = self.queue.idle_deadline();

            tokio::select! {
                biased;

                Some(event) = self.events.recv() => self.on_event(event).await,

                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(ack) = self.on_command(command).await {
                            break (CloseReason::Stopped, Some(ack));
                        }
                    }
                    // the manager is gone
                    None => break (CloseReason::Stopped, None),
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.queue.is_expired(Instant::now()) {
                        info!("Leaving voice channel due to inactivity");
                        break (CloseReason::IdleTimeout, None);
                    }
                }
            }
        };

        let Session {
            queue, commands, ..
        } = self;

        // tear down before unregistering so a new session cannot join while this one leaves
        queue.teardown().await;
        exit.close(reason);
        drop(commands);

        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    async fn on_command(&mut self, command: Command) -> ControlFlow<oneshot::Sender<()>> {
        match command {
            Command::Append { song, reply } => {
                info!("Queued \"{}\" requested by {}", song.title, song.requested_by);
                let position = self.queue.push(song.clone());
                if !self.queue.is_playing() {
                    self.start_playback().await;
                }
                let _ = reply.send(Enqueued { song, position });
            }
            Command::Skip { reply } => {
                let skipped = match self.queue.playing_cycle() {
                    Some(cycle) => self
                        .advance(cycle, Trigger::Skip)
                        .await
                        .ok_or(MusicError::NothingPlaying),
                    None => Err(MusicError::NothingPlaying),
                };
                let _ = reply.send(skipped);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.queue.snapshot());
            }
            Command::Stop { reply } => {
                info!("Stop requested, clearing {} queued songs", self.queue.len());
                return ControlFlow::Break(reply);
            }
        }
        ControlFlow::Continue(())
    }

    async fn on_event(&mut self, CycleEvent { cycle, event }: CycleEvent) {
        match event {
            PlaybackEvent::SinkIdle => {
                self.advance(cycle, Trigger::Finished).await;
            }
            PlaybackEvent::DecoderExited(Some(0)) => {
                debug!("Decoder for cycle {} finished writing", cycle);
            }
            PlaybackEvent::DecoderExited(code) => {
                if self.queue.playing_cycle() == Some(cycle) {
                    warn!("Decoder for cycle {} failed with exit code {:?}", cycle, code);
                }
                self.advance(cycle, Trigger::DecodeFailed).await;
            }
            PlaybackEvent::DecoderStderr(line) => {
                warn!("yt-dlp (cycle {}): {}", cycle, line);
            }
        }
    }

    /// Streams the head of the queue. A song whose decoder cannot even be
    /// spawned is dropped and the next one is tried.
    async fn start_playback(&mut self) {
        while let Some(song) = self.queue.head().cloned() {
            let cycle = self.queue.next_cycle();
            let notifier = CycleNotifier::new(cycle, self.events_tx.clone());

            match self.decoder.start(&song.url, notifier.clone()) {
                Ok(stream) => {
                    info!("Starting playback: \"{}\" (cycle {})", song.title, cycle);
                    self.queue.begin(cycle, stream.process);
                    self.queue.sink_mut().play(stream.audio, notifier).await;
                    return;
                }
                Err(err) => {
                    error!("Error playing \"{}\", skipping: {}", song.title, err);
                    self.queue.discard_head();
                }
            }
        }

        self.queue.arm_idle(self.idle_timeout);
    }

    /// The single transition out of a playback cycle, whatever triggered it.
    /// Events for any cycle other than the one in flight are stale and ignored,
    /// so each cycle advances at most once.
    async fn advance(&mut self, cycle: u64, trigger: Trigger) -> Option<Song> {
        if self.queue.playing_cycle() != Some(cycle) {
            debug!("Ignoring {:?} for stale cycle {}", trigger, cycle);
            return None;
        }

        let finished = self.queue.finish_current();
        self.queue.sink_mut().stop(trigger == Trigger::Skip).await;

        if let Some(song) = &finished {
            info!("Advancing past \"{}\" ({:?})", song.title, trigger);
        }

        self.start_playback().await;
        finished
    }
}
