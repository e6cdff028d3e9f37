//! Queue Store
//!
//! Owns the ordered play queue, the current position, queue provenance and
//! the shuffle/repeat flags. Pure in-memory state machine: every operation is
//! synchronous and deterministic.
//!
//! Position-adjusting operations (enqueue, remove, swap) keep the *current
//! track* current rather than keeping the raw index stable.
//!
//! ```text
//! ids:     [A, B, C, D]
//! current:        ^ index 2
//! remove(0) -> [B, C, D], index 1, still C
//! swap(1,3) -> [B, D, C], index 2, still C
//! ```

use crate::error::{Result, SessionError};
use crate::source::QueueSource;
use crate::types::{
    AudioId, AudioMetadata, Direction, PlaybackModeState, PlaybackQueue, RepeatMode, ShuffleMode,
};

/// Where to start after loading a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Start at an explicit index
    Index(usize),

    /// First track of a freshly shuffled queue
    FirstAfterShuffle,
}

/// Result of [`QueueStore::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// `current_index` now points at this entry
    Moved(usize),

    /// Advanced past the last entry with repeat off; queue is now invalid
    EndOfQueue,
}

/// Result of a removal
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    /// The removed entry
    pub removed: AudioMetadata,

    /// Position the entry was removed from
    pub position: usize,

    /// The removed entry was the current one
    pub was_current: bool,
}

/// In-memory owner of [`PlaybackQueue`] and [`PlaybackModeState`]
#[derive(Debug, Clone, Default)]
pub struct QueueStore {
    audios: Vec<AudioMetadata>,
    source: QueueSource,
    title: Option<String>,
    current_index: usize,
    is_valid: bool,
    mode: PlaybackModeState,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue wholesale and start at index 0
    ///
    /// The queue is valid iff `audios` is non-empty.
    pub fn set_queue(&mut self, audios: Vec<AudioMetadata>, source: QueueSource, title: Option<String>) {
        self.audios = audios;
        self.source = source;
        self.title = title;
        self.current_index = 0;
        self.is_valid = !self.audios.is_empty();
    }

    /// Choose where playback of a freshly loaded queue starts
    pub fn start_at(&mut self, start: StartPosition) -> Result<()> {
        match start {
            StartPosition::Index(index) => self.skip_to_index(index),
            StartPosition::FirstAfterShuffle => {
                if self.audios.is_empty() {
                    return Err(SessionError::EmptyQueue);
                }
                self.current_index = 0;
                self.is_valid = true;
                Ok(())
            }
        }
    }

    /// Load a queue and seed the start position in one step
    ///
    /// On an out-of-range start the queue stays loaded but starts at 0.
    pub fn replace_and_play_from(
        &mut self,
        audios: Vec<AudioMetadata>,
        source: QueueSource,
        title: Option<String>,
        start: StartPosition,
    ) -> Result<()> {
        self.set_queue(audios, source, title);
        if self.audios.is_empty() {
            return Err(SessionError::EmptyQueue);
        }
        self.start_at(start)
    }

    /// Move the current index one step, honoring the repeat mode
    pub fn advance(&mut self, direction: Direction) -> Result<Advance> {
        let len = self.audios.len();
        if len == 0 {
            return Err(SessionError::EmptyQueue);
        }
        let current = self.current_index.min(len - 1);

        let next = match (self.mode.repeat, direction) {
            (RepeatMode::One, _) => Some(current),
            (RepeatMode::All, Direction::Forward) => Some((current + 1) % len),
            (RepeatMode::All, Direction::Backward) => Some(current.checked_sub(1).unwrap_or(len - 1)),
            (RepeatMode::None, Direction::Forward) => (current + 1 < len).then_some(current + 1),
            (RepeatMode::None, Direction::Backward) => Some(current.saturating_sub(1)),
        };

        match next {
            Some(index) => {
                self.current_index = index;
                self.is_valid = true;
                Ok(Advance::Moved(index))
            }
            None => {
                self.current_index = current;
                self.is_valid = false;
                Ok(Advance::EndOfQueue)
            }
        }
    }

    /// Jump to an index
    pub fn skip_to_index(&mut self, index: usize) -> Result<()> {
        if index >= self.audios.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.audios.len(),
            });
        }
        self.current_index = index;
        self.is_valid = true;
        Ok(())
    }

    /// Insert right after the current entry without changing what is current
    ///
    /// On an empty queue the entry becomes the whole, valid queue.
    pub fn enqueue_next(&mut self, audio: AudioMetadata) -> usize {
        if self.audios.is_empty() {
            self.audios.push(audio);
            self.current_index = 0;
            self.is_valid = true;
            return 0;
        }
        let position = self.current_index + 1;
        self.audios.insert(position, audio);
        position
    }

    /// Remove the entry at `position`
    ///
    /// Removing before the current entry shifts the index down. Removing the
    /// current entry makes the entry now at that position current, wrapping to
    /// 0 when the last entry was removed. An emptied queue becomes invalid.
    pub fn remove_by_position(&mut self, position: usize) -> Result<Removal> {
        if position >= self.audios.len() {
            return Err(SessionError::IndexOutOfRange {
                index: position,
                len: self.audios.len(),
            });
        }

        let removed = self.audios.remove(position);
        let was_current = position == self.current_index;

        if self.audios.is_empty() {
            self.current_index = 0;
            self.is_valid = false;
        } else if position < self.current_index {
            self.current_index -= 1;
        } else if was_current && self.current_index >= self.audios.len() {
            self.current_index = 0;
        }

        Ok(Removal {
            removed,
            position,
            was_current,
        })
    }

    /// Remove the first entry carrying `id`
    pub fn remove_by_id(&mut self, id: &AudioId) -> Result<Removal> {
        let position = self
            .position_of(id)
            .ok_or_else(|| SessionError::NotInQueue(id.to_string()))?;
        self.remove_by_position(position)
    }

    /// Exchange two entries; the current track stays current
    pub fn swap(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.audios.len();
        for index in [from, to] {
            if index >= len {
                return Err(SessionError::IndexOutOfRange { index, len });
            }
        }

        self.audios.swap(from, to);
        if self.current_index == from {
            self.current_index = to;
        } else if self.current_index == to {
            self.current_index = from;
        }
        Ok(())
    }

    /// Update shuffle and/or repeat flags
    ///
    /// Never reorders the queue; shuffled order is supplied by the caller.
    pub fn set_mode(&mut self, shuffle: Option<ShuffleMode>, repeat: Option<RepeatMode>) {
        if let Some(shuffle) = shuffle {
            self.mode.shuffle = shuffle;
        }
        if let Some(repeat) = repeat {
            self.mode.repeat = repeat;
        }
    }

    /// Reorder the entries after the current one, keeping the current entry in place
    ///
    /// `reorder` receives the tail slice and may permute it freely.
    pub fn reorder_upcoming(&mut self, reorder: impl FnOnce(&mut [AudioMetadata])) {
        if self.audios.is_empty() {
            return;
        }
        let start = (self.current_index + 1).min(self.audios.len());
        reorder(&mut self.audios[start..]);
    }

    /// Re-point at the entry carrying `id` if it is in the queue
    pub fn select_id(&mut self, id: &AudioId) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.current_index = index;
                self.is_valid = true;
                true
            }
            None => false,
        }
    }

    fn position_of(&self, id: &AudioId) -> Option<usize> {
        self.audios.iter().position(|audio| &audio.id == id)
    }

    /// Current entry, `None` when the queue is invalid
    pub fn current(&self) -> Option<&AudioMetadata> {
        if self.is_valid {
            self.audios.get(self.current_index)
        } else {
            None
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn len(&self) -> usize {
        self.audios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audios.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AudioMetadata> {
        self.audios.get(index)
    }

    pub fn ids(&self) -> Vec<AudioId> {
        self.audios.iter().map(|audio| audio.id.clone()).collect()
    }

    pub fn source(&self) -> &QueueSource {
        &self.source
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn mode(&self) -> PlaybackModeState {
        self.mode
    }

    /// Read-only snapshot for observers
    pub fn snapshot(&self) -> PlaybackQueue {
        PlaybackQueue {
            ids: self.ids(),
            audios: self.audios.clone(),
            source: self.source.clone(),
            title: self.title.clone(),
            current_index: self.current_index,
            is_valid: self.is_valid,
        }
    }
}
