//! Soul Player - Playback Session
//!
//! Coordinates a playback session around an external player engine.
//!
//! This crate provides:
//! - Queue store (ordered entries, current index, provenance, shuffle/repeat)
//! - Transport command dispatcher (play, pause, skip, seek, queue edits)
//! - Audio focus arbitration (duck, transient loss, resume on gain)
//! - Progress ticker (position/buffer telemetry while playing)
//! - Session persistence and best-effort restore on cold start
//!
//! # Architecture
//!
//! `soul-session` never decodes audio. The platform supplies:
//! - a [`PlayerEngine`] that prepares and plays media
//! - a [`MetadataResolver`] that turns ids into [`AudioMetadata`]
//! - a [`SessionStore`] for the saved session
//! - a [`FocusPlatform`] for audio focus ([`ExclusiveOutput`] where there is none)
//!
//! All commands, focus callbacks and engine events go through one
//! [`SessionHandle`] and are applied strictly in arrival order. State is
//! observed through `watch` channels (latest value) and a `broadcast` of
//! [`SessionEvent`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use soul_session::{
//!     CatalogResolver, AudioMetadata, ExclusiveOutput, MemorySessionStore, PlaybackSession,
//!     PlayerEngine, SessionConfig, SessionServices, TransportCommand, PlayExtras,
//! };
//! use std::sync::Arc;
//!
//! # async fn run(engine: Arc<dyn PlayerEngine>) -> soul_session::Result<()> {
//! let resolver = CatalogResolver::new([
//!     AudioMetadata::new("a", "First"),
//!     AudioMetadata::new("b", "Second"),
//! ]);
//!
//! let session = PlaybackSession::spawn(
//!     SessionConfig::default(),
//!     SessionServices {
//!         engine,
//!         resolver: Arc::new(resolver),
//!         store: Arc::new(MemorySessionStore::new()),
//!         focus: Arc::new(ExclusiveOutput),
//!     },
//! );
//!
//! session.send(TransportCommand::RestoreSavedState).await?;
//! session
//!     .send(TransportCommand::PlayFromId {
//!         id: "a".into(),
//!         extras: PlayExtras {
//!             ids: vec!["a".into(), "b".into()],
//!             ..Default::default()
//!         },
//!     })
//!     .await?;
//!
//! let mut transport = session.transport();
//! transport.changed().await.ok();
//! println!("{:?}", *transport.borrow());
//!
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod command;
mod dispatcher;
mod engine;
mod error;
mod events;
mod focus;
mod persist;
mod progress;
mod queue;
mod resolver;
pub mod shuffle;
pub mod source;
pub mod types;

// Public exports
pub use command::{CommandOutcome, PlayExtras, TransportCommand};
pub use dispatcher::{PlaybackSession, SessionHandle, SessionServices};
pub use engine::{EngineEvent, EngineResult, PlayerEngine};
pub use error::{EngineError, Result, SessionError};
pub use events::{SessionEvent, SessionWatchers};
pub use focus::{
    AudioFocusArbiter, AudioFocusEvent, ExclusiveOutput, FocusAction, FocusDecision,
    FocusPlatform, FocusRequestResult, FocusState,
};
pub use persist::{
    FileSessionStore, MemorySessionStore, SavedSession, SessionPersister, SessionStore,
};
pub use queue::{Advance, QueueStore, Removal, StartPosition};
pub use resolver::{CatalogResolver, MetadataResolver};
pub use source::{QueueSource, SearchVariant};
pub use types::{
    AudioId, AudioMetadata, Direction, EngineStatus, PlaybackModeState, PlaybackProgressState,
    PlaybackQueue, RepeatMode, SessionConfig, ShuffleMode, TransportState,
};
