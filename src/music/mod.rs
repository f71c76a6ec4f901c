//! Per-guild music playback: queues, decoder processes, voice sinks and the
//! manager that ties them together.

pub mod decoder;
pub mod error;
pub mod events;
pub mod guild_queue;
pub mod manager;
pub mod resolver;
mod session;
pub mod sink;
pub mod song;

pub use decoder::{AudioBytes, DecodeStream, Decoder, DecoderProcess, YtDlpDecoder};
pub use error::{MusicError, MusicResult};
pub use events::{CycleEvent, CycleNotifier, PlaybackEvent};
pub use guild_queue::QueueSnapshot;
pub use manager::{PlaybackManager, PlaybackSettings};
pub use resolver::{Resolver, YtDlpResolver};
pub use session::{CloseReason, Enqueued};
pub use sink::{Sink, SinkConnector, SongbirdConnector};
pub use song::Song;
