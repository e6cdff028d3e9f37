//! Audio Focus Arbiter
//!
//! The audio output is shared with other applications. Nothing in the
//! session starts audible playback without going through
//! [`AudioFocusArbiter::request`], and platform focus callbacks are mapped to
//! transport actions here:
//!
//! | Event                  | Action                                              |
//! |------------------------|-----------------------------------------------------|
//! | `Gained`               | resume if a transient loss paused us, else restore volume |
//! | `Lost`                 | pause, forget any pending resume                    |
//! | `LostTransient`        | pause and remember to resume, only if playing       |
//! | `LostTransientCanDuck` | lower volume, keep playing                          |

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Outcome of a platform focus request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusRequestResult {
    /// Focus is ours now
    Granted,

    /// Platform will deliver `Gained` later
    Delayed,

    /// Platform refused
    Denied,
}

/// Focus callbacks from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFocusEvent {
    Gained,
    Lost,
    LostTransient,
    LostTransientCanDuck,
}

/// Platform audio-focus API
#[cfg_attr(test, mockall::automock)]
pub trait FocusPlatform: Send + Sync {
    fn request_focus(&self) -> FocusRequestResult;

    fn abandon_focus(&self);
}

/// Platform without focus arbitration: every request is granted
#[derive(Debug, Default, Clone, Copy)]
pub struct ExclusiveOutput;

impl FocusPlatform for ExclusiveOutput {
    fn request_focus(&self) -> FocusRequestResult {
        FocusRequestResult::Granted
    }

    fn abandon_focus(&self) {}
}

/// Where the session stands with the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusState {
    /// Not holding focus
    #[default]
    Released,

    /// Request answered with `Delayed`, waiting for `Gained`
    Pending,

    /// Holding focus at full volume
    Held,

    /// Holding focus at reduced volume
    Ducked,

    /// Temporarily lost; `resume_on_gain` is set only if we were playing
    LostTransient { resume_on_gain: bool },

    /// Permanently lost; the user must restart playback
    Lost,
}

/// Decision for a play request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDecision {
    Granted,
    Deferred,
    Denied,
}

/// What the dispatcher must do in response to a focus event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusAction {
    None,
    /// Resume playback paused by a transient loss
    Resume,
    /// Start the play intent parked while focus was pending
    PlayPending,
    /// Back to full volume
    RestoreVolume,
    /// Pause for good
    Pause,
    /// Pause, expecting to resume on gain
    PauseTransient,
    /// Lower volume
    Duck,
}

/// Focus state machine over a [`FocusPlatform`]
pub struct AudioFocusArbiter {
    platform: std::sync::Arc<dyn FocusPlatform>,
    state: FocusState,
    /// Output volume is still lowered by an earlier duck
    ducked: bool,
}

impl AudioFocusArbiter {
    pub fn new(platform: std::sync::Arc<dyn FocusPlatform>) -> Self {
        Self {
            platform,
            state: FocusState::Released,
            ducked: false,
        }
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    /// Ask for focus before audible playback
    pub fn request(&mut self) -> FocusDecision {
        if matches!(self.state, FocusState::Held | FocusState::Ducked) {
            return FocusDecision::Granted;
        }

        let result = self.platform.request_focus();
        debug!("Audio focus request: {:?} (was {:?})", result, self.state);
        match result {
            FocusRequestResult::Granted => {
                self.state = FocusState::Held;
                FocusDecision::Granted
            }
            FocusRequestResult::Delayed => {
                self.state = FocusState::Pending;
                FocusDecision::Deferred
            }
            FocusRequestResult::Denied => FocusDecision::Denied,
        }
    }

    /// Map a platform callback to an action
    ///
    /// `playing` is whether audible playback is active at the moment of the event.
    pub fn on_event(&mut self, event: AudioFocusEvent, playing: bool) -> FocusAction {
        let previous = self.state;
        let action = match event {
            AudioFocusEvent::Gained => {
                self.state = FocusState::Held;
                match previous {
                    FocusState::Pending => FocusAction::PlayPending,
                    FocusState::LostTransient {
                        resume_on_gain: true,
                    } => FocusAction::Resume,
                    _ => {
                        self.ducked = false;
                        FocusAction::RestoreVolume
                    }
                }
            }
            AudioFocusEvent::Lost => {
                self.state = FocusState::Lost;
                FocusAction::Pause
            }
            AudioFocusEvent::LostTransient => {
                let already_resuming = matches!(
                    previous,
                    FocusState::LostTransient {
                        resume_on_gain: true
                    }
                );
                let resume_on_gain = playing || already_resuming;
                self.state = FocusState::LostTransient { resume_on_gain };
                if playing {
                    FocusAction::PauseTransient
                } else {
                    FocusAction::None
                }
            }
            AudioFocusEvent::LostTransientCanDuck => {
                self.state = FocusState::Ducked;
                self.ducked = true;
                FocusAction::Duck
            }
        };

        info!(
            "Audio focus {:?}: {:?} -> {:?}, action {:?}",
            event, previous, self.state, action
        );
        action
    }

    /// Whether output must go back to full volume before it starts again
    ///
    /// True once per duck, and only after focus is fully held again.
    pub fn take_volume_restore(&mut self) -> bool {
        if self.ducked && self.state == FocusState::Held {
            self.ducked = false;
            return true;
        }
        false
    }

    /// Forget a pending resume; an explicit pause must win over a later `Gained`
    pub fn clear_pending_resume(&mut self) {
        if let FocusState::LostTransient {
            resume_on_gain: true,
        } = self.state
        {
            self.state = FocusState::LostTransient {
                resume_on_gain: false,
            };
        }
    }

    /// Give focus back to the platform
    pub fn abandon(&mut self) {
        if self.state != FocusState::Released {
            self.platform.abandon_focus();
            self.state = FocusState::Released;
        }
    }
}
