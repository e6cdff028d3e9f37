//! Transport commands
//!
//! The closed command set is the single inbound API of the session. UI
//! actions, hardware media buttons and notification actions all become one
//! of these.

use std::time::Duration;

use crate::source::QueueSource;
use crate::types::{AudioId, RepeatMode, ShuffleMode};

/// Context for [`TransportCommand::PlayFromId`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayExtras {
    /// Collection the id belongs to; empty plays the id alone
    pub ids: Vec<AudioId>,

    /// Where the collection came from
    pub source: QueueSource,

    /// Caption for the queue
    pub title: Option<String>,
}

/// Commands accepted by the session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    /// Start or resume playback of the current entry
    Play,

    /// Pause playback
    Pause,

    /// Stop playback and release audio focus
    Stop,

    /// Seek within the current entry
    SeekTo(Duration),

    /// Next entry, honoring repeat mode
    SkipNext,

    /// Previous entry, or restart of the current one when well into it
    SkipPrevious,

    /// Jump to a queue index and play it
    SkipToQueueIndex(usize),

    /// Build a queue around `id` and play it
    PlayFromId { id: AudioId, extras: PlayExtras },

    /// Set repeat mode
    SetRepeatMode(RepeatMode),

    /// Set shuffle mode
    SetShuffleMode(ShuffleMode),

    /// Restore the last session (cold start) or resync with the live engine (warm reconnect)
    RestoreSavedState,

    /// Toggle repeat-one
    RepeatCurrentOne,

    /// Toggle repeat-all
    RepeatCurrentAll,

    /// Insert after the current entry
    EnqueueNext(AudioId),

    /// Remove the entry at a queue position
    RemoveByPosition(usize),

    /// Remove the first entry with this id
    RemoveById(AudioId),

    /// Replace queue contents, keeping the current track current when it survives
    ReplaceQueue {
        ids: Vec<AudioId>,
        title: Option<String>,
    },

    /// Shuffle the ids and play from the first one
    PlayAllShuffled {
        ids: Vec<AudioId>,
        title: Option<String>,
        source: QueueSource,
    },

    /// Exchange two queue entries
    SwapPositions { from: usize, to: usize },
}

impl TransportCommand {
    /// Short name for logs and rejection events
    pub fn name(&self) -> &'static str {
        match self {
            TransportCommand::Play => "Play",
            TransportCommand::Pause => "Pause",
            TransportCommand::Stop => "Stop",
            TransportCommand::SeekTo(_) => "SeekTo",
            TransportCommand::SkipNext => "SkipNext",
            TransportCommand::SkipPrevious => "SkipPrevious",
            TransportCommand::SkipToQueueIndex(_) => "SkipToQueueIndex",
            TransportCommand::PlayFromId { .. } => "PlayFromId",
            TransportCommand::SetRepeatMode(_) => "SetRepeatMode",
            TransportCommand::SetShuffleMode(_) => "SetShuffleMode",
            TransportCommand::RestoreSavedState => "RestoreSavedState",
            TransportCommand::RepeatCurrentOne => "RepeatCurrentOne",
            TransportCommand::RepeatCurrentAll => "RepeatCurrentAll",
            TransportCommand::EnqueueNext(_) => "EnqueueNext",
            TransportCommand::RemoveByPosition(_) => "RemoveByPosition",
            TransportCommand::RemoveById(_) => "RemoveById",
            TransportCommand::ReplaceQueue { .. } => "ReplaceQueue",
            TransportCommand::PlayAllShuffled { .. } => "PlayAllShuffled",
            TransportCommand::SwapPositions { .. } => "SwapPositions",
        }
    }

    /// Shuffle/repeat updates; consecutive ones may be coalesced
    pub fn is_mode_update(&self) -> bool {
        matches!(
            self,
            TransportCommand::SetRepeatMode(_) | TransportCommand::SetShuffleMode(_)
        )
    }
}

/// How an accepted command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// State changed (or was already as requested)
    Applied,

    /// Play intent parked until the platform grants audio focus
    AwaitingFocus,

    /// Skipped past the last entry with repeat off; playback stopped
    EndOfQueue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_mode_setters_coalesce() {
        assert!(TransportCommand::SetRepeatMode(RepeatMode::All).is_mode_update());
        assert!(TransportCommand::SetShuffleMode(ShuffleMode::All).is_mode_update());
        assert!(!TransportCommand::RepeatCurrentOne.is_mode_update());
        assert!(!TransportCommand::Play.is_mode_update());
    }

    #[test]
    fn names_match_variants() {
        assert_eq!(TransportCommand::SkipToQueueIndex(3).name(), "SkipToQueueIndex");
        assert_eq!(
            TransportCommand::SwapPositions { from: 0, to: 1 }.name(),
            "SwapPositions"
        );
    }
}
