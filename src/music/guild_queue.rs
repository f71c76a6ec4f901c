use serenity::model::id::GuildId;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::decoder::DecoderProcess;
use super::sink::Sink;
use super::song::Song;

/// Whether a decode/stream cycle is in flight. The decoder process is owned
/// by the `Playing` state, so it cannot outlive playback.
pub enum PlaybackState {
    Idle {
        deadline: Option<Instant>,
    },
    Playing {
        cycle: u64,
        process: Box<dyn DecoderProcess>,
    },
}

/// Read-only view of a guild's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Pending songs; the first one is streaming when `playing` is true.
    pub songs: Vec<Song>,
    pub playing: bool,
    pub idle_deadline: Option<Instant>,
}

/// Per-guild playback state. Only the guild's session task touches it.
pub struct GuildQueue {
    guild_id: GuildId,
    pending: VecDeque<Song>,
    state: PlaybackState,
    sink: Box<dyn Sink>,
    last_cycle: u64,
}

impl GuildQueue {
    pub fn new(guild_id: GuildId, sink: Box<dyn Sink>) -> Self {
        Self {
            guild_id,
            pending: VecDeque::new(),
            state: PlaybackState::Idle { deadline: None },
            sink,
            last_cycle: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Appends a song and cancels any pending idle teardown.
    pub fn push(&mut self, song: Song) -> usize {
        self.pending.push_back(song);
        if let PlaybackState::Idle { deadline } = &mut self.state {
            *deadline = None;
        }
        self.pending.len() - 1
    }

    pub fn head(&self) -> Option<&Song> {
        self.pending.front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing { .. })
    }

    /// Cycle of the stream in flight, if any.
    pub fn playing_cycle(&self) -> Option<u64> {
        match self.state {
            PlaybackState::Playing { cycle, .. } => Some(cycle),
            PlaybackState::Idle { .. } => None,
        }
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        match self.state {
            PlaybackState::Idle { deadline } => deadline,
            PlaybackState::Playing { .. } => None,
        }
    }

    /// Hands out a fresh cycle number; never reused within a session.
    pub fn next_cycle(&mut self) -> u64 {
        self.last_cycle += 1;
        self.last_cycle
    }

    /// Idle -> Playing for the head song.
    pub fn begin(&mut self, cycle: u64, process: Box<dyn DecoderProcess>) {
        debug_assert!(!self.is_playing(), "a cycle is already in flight");
        self.state = PlaybackState::Playing { cycle, process };
    }

    /// Playing -> Idle: stops the decoder and removes the head song.
    /// Returns the finished song, or `None` when nothing was playing.
    pub fn finish_current(&mut self) -> Option<Song> {
        match std::mem::replace(&mut self.state, PlaybackState::Idle { deadline: None }) {
            PlaybackState::Playing { mut process, cycle } => {
                process.stop();
                let finished = self.pending.pop_front();
                debug!("Cycle {} finished in guild {}", cycle, self.guild_id);
                finished
            }
            idle => {
                self.state = idle;
                None
            }
        }
    }

    /// Drops a head song that never started playing.
    pub fn discard_head(&mut self) -> Option<Song> {
        if self.is_playing() {
            return None;
        }
        self.pending.pop_front()
    }

    /// Starts the idle window if the queue is idle and empty.
    pub fn arm_idle(&mut self, window: Duration) {
        if let PlaybackState::Idle { deadline } = &mut self.state {
            if self.pending.is_empty() && deadline.is_none() {
                *deadline = Some(Instant::now() + window);
                info!(
                    "Queue empty in guild {}, leaving in {}s unless something is queued",
                    self.guild_id,
                    window.as_secs()
                );
            }
        }
    }

    /// True when the idle window has elapsed with nothing queued or playing.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.state {
            PlaybackState::Idle {
                deadline: Some(deadline),
            } => self.pending.is_empty() && now >= deadline,
            _ => false,
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            songs: self.pending.iter().cloned().collect(),
            playing: self.is_playing(),
            idle_deadline: self.idle_deadline(),
        }
    }

    pub fn sink_mut(&mut self) -> &mut dyn Sink {
        self.sink.as_mut()
    }

    /// Stops playback, releases the sink and drops every pending song.
    /// Consumes the queue, so the sink is released exactly once.
    pub async fn teardown(mut self) {
        self.pending.clear();
        if let PlaybackState::Playing { mut process, .. } =
            std::mem::replace(&mut self.state, PlaybackState::Idle { deadline: None })
        {
            process.stop();
        }
        self.sink.stop(true).await;
        self.sink.release().await;
        info!("Playback session for guild {} torn down", self.guild_id);
    }
}
