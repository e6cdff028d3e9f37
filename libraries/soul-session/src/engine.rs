//! Player Engine contract
//!
//! The session never decodes or renders audio. Platform code (desktop
//! output, mobile bridge, a test double) implements [`PlayerEngine`] and the
//! dispatcher drives it.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::EngineError;
use crate::types::{AudioId, AudioMetadata, EngineStatus};

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Opaque playback backend
///
/// Transport calls are async because loading media can take network time.
/// Telemetry getters are synchronous and cheap; the Progress Ticker polls them.
#[async_trait]
pub trait PlayerEngine: Send + Sync {
    /// Load media and get ready to play it; does not start output
    async fn prepare(&self, audio: &AudioMetadata) -> EngineResult<()>;

    /// Start or resume audible output
    async fn play(&self) -> EngineResult<()>;

    /// Pause output, keeping the loaded media
    async fn pause(&self) -> EngineResult<()>;

    /// Stop output and unload media
    async fn stop(&self) -> EngineResult<()>;

    /// Seek within the loaded media
    async fn seek_to(&self, position: Duration) -> EngineResult<()>;

    /// Output volume, 0.0-1.0
    async fn set_volume(&self, volume: f32) -> EngineResult<()>;

    /// Current playback position
    fn position(&self) -> Duration;

    /// Buffered position
    fn buffered_position(&self) -> Duration;

    /// Duration of the loaded media, `None` if unknown
    fn duration(&self) -> Option<Duration>;

    /// Current status
    fn status(&self) -> EngineStatus;

    /// Id of the loaded media, if any
    fn current_media(&self) -> Option<AudioId>;
}

/// Asynchronous notifications from the engine
///
/// Delivered through the same serialized entry point as transport commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The item with this id played to its end
    ///
    /// Carries the id so a report that races a skip or stop can be told apart
    /// from one about the entry the session is on now.
    Completed(AudioId),

    /// Decode or network failure during playback
    Failed(String),

    /// Status moved without a command (buffering, resumed after stall)
    StatusChanged(EngineStatus),
}
