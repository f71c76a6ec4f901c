//! Wraps the Songbird voice connection and player into the minimal sink the
//! playback manager drives: attach, play, stop, release.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::core::io::{MediaSource, ReadOnlySource};
use songbird::input::{AudioStream, Input, LiveInput};
use songbird::tracks::TrackHandle;
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::decoder::AudioBytes;
use super::error::{MusicError, MusicResult};
use super::events::{CycleNotifier, PlaybackEvent};

/// Opens a sink bound to a voice channel.
#[async_trait]
pub trait SinkConnector: Send + Sync {
    async fn attach(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<Box<dyn Sink>>;
}

/// A connected audio output for one guild.
#[async_trait]
pub trait Sink: Send {
    /// Starts rendering `audio`, superseding whatever was playing.
    /// `notifier` must receive exactly one `SinkIdle` for this stream, even
    /// when rendering fails outright.
    async fn play(&mut self, audio: AudioBytes, notifier: CycleNotifier);

    /// Halts rendering. `force` also drops anything else queued on the connection.
    async fn stop(&mut self, force: bool);

    /// Stops and closes the connection.
    async fn release(self: Box<Self>);
}

/// Connects sinks through the Songbird voice manager.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl SinkConnector for SongbirdConnector {
    async fn attach(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<Box<dyn Sink>> {
        match self.manager.join(guild_id, channel_id).await {
            Ok(call) => {
                info!("Joined voice channel {} in guild {}", channel_id, guild_id);
                Ok(Box::new(SongbirdSink {
                    manager: Arc::clone(&self.manager),
                    guild_id,
                    call,
                    current: None,
                }))
            }
            Err(err) => {
                warn!(
                    "Failed to join voice channel {} for guild {}: {}",
                    channel_id, guild_id, err
                );
                // join leaves a half-open call behind on failure
                if let Err(e) = self.manager.remove(guild_id).await {
                    debug!("No call to clean up for guild {}: {}", guild_id, e);
                }
                Err(MusicError::ConnectionFailed(err.to_string()))
            }
        }
    }
}

pub struct SongbirdSink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    current: Option<TrackHandle>,
}

#[async_trait]
impl Sink for SongbirdSink {
    async fn play(&mut self, audio: AudioBytes, notifier: CycleNotifier) {
        let source: Box<dyn MediaSource> = Box::new(ReadOnlySource::new(audio));
        let input = Input::Live(
            LiveInput::Raw(AudioStream {
                input: source,
                hint: None,
            }),
            None,
        );

        let track = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        let idle = IdleNotifier::new(notifier);
        for event in [TrackEvent::End, TrackEvent::Error] {
            if let Err(e) = track.add_event(Event::Track(event), idle.clone()) {
                // the track is already gone, so no event will ever arrive
                warn!("Failed to watch track in guild {}: {}", self.guild_id, e);
                idle.fire();
            }
        }

        self.current = Some(track);
    }

    async fn stop(&mut self, force: bool) {
        if force {
            self.call.lock().await.stop();
            self.current = None;
        } else if let Some(track) = self.current.take() {
            if let Err(e) = track.stop() {
                debug!("Track in guild {} already stopped: {}", self.guild_id, e);
            }
        }
    }

    async fn release(self: Box<Self>) {
        let mut sink = self;
        sink.stop(true).await;
        match sink.manager.remove(sink.guild_id).await {
            Ok(()) => info!("Left voice channel in guild {}", sink.guild_id),
            Err(e) => warn!("Failed to leave voice channel in guild {}: {}", sink.guild_id, e),
        }
    }
}

/// Forwards the first end-or-error event of a track as `SinkIdle`.
/// Registered for both events; the flag keeps it to one notification.
#[derive(Clone)]
struct IdleNotifier {
    notifier: CycleNotifier,
    fired: Arc<AtomicBool>,
}

impl IdleNotifier {
    fn new(notifier: CycleNotifier) -> Self {
        Self {
            notifier,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    fn fire(&self) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            self.notifier.notify(PlaybackEvent::SinkIdle);
        }
    }
}

#[async_trait]
impl VoiceEventHandler for IdleNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in tracks.iter() {
                debug!(
                    "Track for cycle {} went idle: {:?}",
                    self.notifier.cycle(),
                    state.playing
                );
            }
        }
        self.fire();
        None
    }
}
