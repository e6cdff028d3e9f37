//! Core types for playback sessions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::source::QueueSource;

/// Catalog identifier of an audio track
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioId(String);

impl AudioId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AudioId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AudioId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Resolved metadata for a queue entry
///
/// Produced by the metadata resolver whenever the queue is built from bare ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    /// Catalog identifier
    pub id: AudioId,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Album name (optional)
    pub album: Option<String>,

    /// Track duration, when the catalog knows it
    pub duration: Option<Duration>,

    /// Local file path or stream URL handed to the engine
    pub uri: String,
}

impl AudioMetadata {
    /// Minimal metadata with only an id and a title
    pub fn new(id: impl Into<AudioId>, title: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            uri: id.to_string(),
            id,
            title: title.into(),
            artist: String::new(),
            album: None,
            duration: None,
        }
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when queue ends
    #[default]
    None,

    /// Loop current track only
    One,

    /// Loop entire queue
    All,
}

/// Shuffle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// Play in queue order
    #[default]
    None,

    /// Queue was shuffled
    All,
}

/// Shuffle and repeat flags
///
/// Independent axes: repeat-one and shuffle may combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackModeState {
    pub shuffle: ShuffleMode,
    pub repeat: RepeatMode,
}

/// Direction for queue navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Player Engine status, mirrored by the session rather than duplicated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Nothing loaded
    #[default]
    Idle,

    /// Loading media
    Preparing,

    /// Audible playback
    Playing,

    /// Paused mid-track
    Paused,

    /// Waiting for data while playing
    Buffering,

    /// Last operation failed
    Error,
}

impl EngineStatus {
    /// Statuses during which position telemetry moves
    pub fn is_active(self) -> bool {
        matches!(self, EngineStatus::Playing | EngineStatus::Buffering)
    }

    /// Statuses that count as "live transport state" for warm reconnects
    pub fn is_live(self) -> bool {
        !matches!(self, EngineStatus::Idle | EngineStatus::Error)
    }
}

/// Snapshot of the play queue
///
/// `ids` and `audios` are parallel sequences in queue order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackQueue {
    pub ids: Vec<AudioId>,
    pub audios: Vec<AudioMetadata>,
    pub source: QueueSource,
    pub title: Option<String>,
    pub current_index: usize,
    pub is_valid: bool,
}

impl PlaybackQueue {
    /// Currently selected entry, `None` when the queue is invalid
    pub fn current_audio(&self) -> Option<&AudioMetadata> {
        if self.is_valid {
            self.audios.get(self.current_index)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.audios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audios.is_empty()
    }
}

/// Elapsed/buffered/total telemetry for the current item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackProgressState {
    /// Track duration (zero when unknown)
    pub total: Duration,

    /// Current playback position
    pub elapsed: Duration,

    /// Buffered position
    pub buffered: Duration,

    /// Furthest position observed for the current item; never decreases
    pub last_known_position: Duration,
}

impl PlaybackProgressState {
    /// Normalized playback progress in `[0, 1]`
    pub fn progress(&self) -> f32 {
        ratio(self.elapsed, self.total)
    }

    /// Normalized buffer progress in `[0, 1]`
    pub fn buffered_progress(&self) -> f32 {
        ratio(self.buffered, self.total)
    }

    /// Next sample for the same item, keeping `last_known_position` monotonic
    pub fn advance_to(&self, total: Duration, elapsed: Duration, buffered: Duration) -> Self {
        Self {
            total,
            elapsed,
            buffered,
            last_known_position: self.last_known_position.max(elapsed),
        }
    }
}

fn ratio(part: Duration, total: Duration) -> f32 {
    if total.is_zero() {
        return 0.0;
    }
    (part.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0) as f32
}

/// Connection and status view published to observers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransportState {
    /// False once the session actor has shut down
    pub connected: bool,

    /// Engine status as last observed
    pub status: EngineStatus,

    /// Item the engine is working on
    pub current: Option<AudioId>,

    /// A play request is parked until audio focus is granted
    pub awaiting_focus: bool,
}

/// Configuration for a playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Progress Ticker polling interval (default: 500ms)
    pub progress_interval_ms: u64,

    /// Output volume while ducked, 0.0-1.0 (default: 0.2)
    pub duck_volume: f32,

    /// Inbound command channel capacity (default: 64)
    pub command_buffer: usize,

    /// Event broadcast capacity (default: 128)
    pub event_buffer: usize,

    /// Seek to the persisted position the first time a restored item plays (default: true)
    pub restore_position: bool,

    /// Persist the session on every pause, not only on queue changes (default: true)
    pub persist_position_on_pause: bool,

    /// Previous restarts the track when further in than this; 0 disables (default: 3000ms)
    pub previous_restart_threshold_ms: u64,
}

impl SessionConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn previous_restart_threshold(&self) -> Option<Duration> {
        (self.previous_restart_threshold_ms > 0)
            .then(|| Duration::from_millis(self.previous_restart_threshold_ms))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 500,
            duck_volume: 0.2,
            command_buffer: 64,
            event_buffer: 128,
            restore_position: true,
            persist_position_on_pause: true,
            previous_restart_threshold_ms: 3000,
        }
    }
}
