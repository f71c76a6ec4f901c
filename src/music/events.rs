//! Playback events raised by the decoder and the sink, tagged with the
//! playback cycle they belong to.

use tokio::sync::mpsc::UnboundedSender;

/// Something that happened to the stream of one playback cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The sink finished, failed or was stopped. Sent exactly once per cycle.
    SinkIdle,
    /// A diagnostic line written by the decoder on its error channel.
    DecoderStderr(String),
    /// The decoder process exited on its own. `None` means killed by a signal.
    DecoderExited(Option<i32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleEvent {
    pub cycle: u64,
    pub event: PlaybackEvent,
}

/// Sends events for a single playback cycle back to the owning session.
#[derive(Debug, Clone)]
pub struct CycleNotifier {
    cycle: u64,
    tx: UnboundedSender<CycleEvent>,
}

impl CycleNotifier {
    pub fn new(cycle: u64, tx: UnboundedSender<CycleEvent>) -> Self {
        Self { cycle, tx }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Delivers `event`. A closed session simply drops it.
    pub fn notify(&self, event: PlaybackEvent) {
        let _ = self.tx.send(CycleEvent {
            cycle: self.cycle,
            event,
        });
    }
}
