//! Error types for playback session coordination

use thiserror::Error;

/// Errors raised by a Player Engine implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The media could not be opened or decoded
    #[error("Failed to load media {id}: {reason}")]
    Load { id: String, reason: String },

    /// Network or stream failure while playing
    #[error("Stream error: {0}")]
    Stream(String),

    /// The engine does not support the requested operation right now
    #[error("Unsupported engine operation: {0}")]
    Unsupported(String),
}

/// Session errors
///
/// Every rejected command is reported back to its caller with one of these.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Index outside `[0, len)`
    #[error("Index out of range: {index} (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Operation needs a valid, non-empty queue
    #[error("Queue is empty")]
    EmptyQueue,

    /// No queue entry carries the given id
    #[error("Audio not in queue: {0}")]
    NotInQueue(String),

    /// The platform refused the audio focus request
    #[error("Audio focus request denied")]
    FocusDenied,

    /// Player Engine failure
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Metadata could not be resolved for the requested ids
    #[error("Metadata resolution failed: {0}")]
    Resolve(String),

    /// Session store failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The session actor is no longer running
    #[error("Playback session closed")]
    SessionClosed,
}

impl SessionError {
    /// Whether the error was caused by the caller's input rather than a collaborator
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SessionError::IndexOutOfRange { .. }
                | SessionError::EmptyQueue
                | SessionError::NotInQueue(_)
        )
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
