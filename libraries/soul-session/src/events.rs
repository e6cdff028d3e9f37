//! Session observers and events
//!
//! Two kinds of outputs for UI binding:
//! - latest-value streams (`watch`) for queue, mode, progress and transport;
//!   a new subscriber sees the current value immediately
//! - a `broadcast` stream of [`SessionEvent`]s for one-off notifications

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::focus::FocusState;
use crate::types::{
    AudioId, EngineStatus, PlaybackModeState, PlaybackProgressState, PlaybackQueue,
    TransportState,
};

/// Events emitted by the playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Engine now works on a different item
    TrackChanged {
        /// ID of the new (current) track
        audio_id: AudioId,
        /// ID of the previous track (if any)
        previous_audio_id: Option<AudioId>,
    },

    /// Queue contents or position changed
    QueueChanged {
        /// New queue length
        length: usize,
        /// Current index after the change
        current_index: usize,
    },

    /// Shuffle or repeat changed
    ModeChanged(PlaybackModeState),

    /// Engine status changed
    StatusChanged(EngineStatus),

    /// Audio focus moved
    FocusChanged(FocusState),

    /// Playback reached the end of the queue with repeat off
    QueueEnded,

    /// A command was rejected; the reason is also returned to the caller
    CommandRejected {
        /// Command name
        command: String,
        /// Error message
        reason: String,
    },

    /// Engine or persistence failure
    Error {
        /// Error message
        message: String,
    },
}

/// Read side handed to subscribers
#[derive(Clone)]
pub struct SessionWatchers {
    pub queue: watch::Receiver<PlaybackQueue>,
    pub mode: watch::Receiver<PlaybackModeState>,
    pub progress: watch::Receiver<PlaybackProgressState>,
    pub transport: watch::Receiver<TransportState>,
}

/// Write side, owned by the session tasks
pub(crate) struct SessionPublisher {
    pub queue: watch::Sender<PlaybackQueue>,
    pub mode: watch::Sender<PlaybackModeState>,
    pub transport: watch::Sender<TransportState>,
    pub events: broadcast::Sender<SessionEvent>,
}

/// Build the observer channels
///
/// The progress sender goes to the Progress Ticker, which is its only writer.
pub(crate) fn channels(
    event_buffer: usize,
) -> (
    SessionPublisher,
    watch::Sender<PlaybackProgressState>,
    SessionWatchers,
) {
    let (queue_tx, queue_rx) = watch::channel(PlaybackQueue::default());
    let (mode_tx, mode_rx) = watch::channel(PlaybackModeState::default());
    let (progress_tx, progress_rx) = watch::channel(PlaybackProgressState::default());
    let (transport_tx, transport_rx) = watch::channel(TransportState {
        connected: true,
        ..TransportState::default()
    });
    let (events_tx, _) = broadcast::channel(event_buffer.max(1));

    (
        SessionPublisher {
            queue: queue_tx,
            mode: mode_tx,
            transport: transport_tx,
            events: events_tx,
        },
        progress_tx,
        SessionWatchers {
            queue: queue_rx,
            mode: mode_rx,
            progress: progress_rx,
            transport: transport_rx,
        },
    )
}

impl SessionPublisher {
    /// Emit an event; having no subscribers is fine
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub fn publish_queue(&self, queue: PlaybackQueue) {
        let length = queue.len();
        let current_index = queue.current_index;
        self.queue.send_replace(queue);
        self.emit(SessionEvent::QueueChanged {
            length,
            current_index,
        });
    }

    pub fn publish_mode(&self, mode: PlaybackModeState) {
        let changed = self.mode.send_if_modified(|current| {
            if *current == mode {
                false
            } else {
                *current = mode;
                true
            }
        });
        if changed {
            self.emit(SessionEvent::ModeChanged(mode));
        }
    }

    /// Publish transport state, emitting events for status and track moves
    pub fn publish_transport(&self, next: TransportState) {
        let previous = self.transport.send_replace(next.clone());
        if previous.status != next.status {
            self.emit(SessionEvent::StatusChanged(next.status));
        }
        if previous.current != next.current {
            if let Some(audio_id) = next.current {
                self.emit(SessionEvent::TrackChanged {
                    audio_id,
                    previous_audio_id: previous.current,
                });
            }
        }
    }
}
