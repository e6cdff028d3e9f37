//! Simulated Player Engine
//!
//! Stands in for a real audio backend: position advances with the clock
//! while "playing", loads take a configurable latency, and reaching the end
//! of an item reports [`EngineEvent::Completed`] with its id on the event channel.
//! URIs starting with `fail:` refuse to load.

use async_trait::async_trait;
use soul_session::{
    AudioId, AudioMetadata, EngineError, EngineEvent, EngineResult, EngineStatus, PlayerEngine,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Length used for items the catalog has no duration for
const DEFAULT_DURATION: Duration = Duration::from_secs(180);

#[derive(Default)]
struct SimState {
    media: Option<AudioMetadata>,
    status: EngineStatus,
    /// Position accumulated before `started`
    offset: Duration,
    started: Option<Instant>,
    volume: f32,
    end_timer: Option<CancellationToken>,
}

impl SimState {
    fn length(&self) -> Duration {
        self.media
            .as_ref()
            .and_then(|m| m.duration)
            .unwrap_or(DEFAULT_DURATION)
    }

    fn position(&self) -> Duration {
        let running = self.started.map(|s| s.elapsed()).unwrap_or_default();
        (self.offset + running).min(self.length())
    }

    /// Fold running time into `offset` and stop the clock
    fn halt_clock(&mut self) {
        self.offset = self.position();
        self.started = None;
        if let Some(timer) = self.end_timer.take() {
            timer.cancel();
        }
    }
}

pub struct SimulatedEngine {
    state: Arc<Mutex<SimState>>,
    events: mpsc::UnboundedSender<EngineEvent>,
    load_latency: Duration,
}

impl SimulatedEngine {
    pub fn new(load_latency: Duration, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                volume: 1.0,
                ..SimState::default()
            })),
            events,
            load_latency,
        }
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the clock and schedule the end-of-item notification
    fn run_clock(&self, state: &mut SimState) {
        let Some(id) = state.media.as_ref().map(|m| m.id.clone()) else {
            return;
        };
        state.halt_clock();
        state.started = Some(Instant::now());
        state.status = EngineStatus::Playing;

        let remaining = state.length().saturating_sub(state.offset);
        let token = CancellationToken::new();
        state.end_timer = Some(token.clone());

        let shared = self.state.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(remaining) => {
                    {
                        let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                        state.offset = state.length();
                        state.started = None;
                        state.end_timer = None;
                        state.status = EngineStatus::Paused;
                    }
                    let _ = events.send(EngineEvent::Completed(id));
                }
            }
        });
    }
}

#[async_trait]
impl PlayerEngine for SimulatedEngine {
    async fn prepare(&self, audio: &AudioMetadata) -> EngineResult<()> {
        {
            let mut state = self.lock();
            state.halt_clock();
            state.status = EngineStatus::Preparing;
        }

        tokio::time::sleep(self.load_latency).await;

        let mut state = self.lock();
        if audio.uri.starts_with("fail:") {
            state.media = None;
            state.status = EngineStatus::Error;
            return Err(EngineError::Load {
                id: audio.id.to_string(),
                reason: format!("cannot open {}", audio.uri),
            });
        }
        state.media = Some(audio.clone());
        state.offset = Duration::ZERO;
        state.status = EngineStatus::Paused;
        Ok(())
    }

    async fn play(&self) -> EngineResult<()> {
        let mut state = self.lock();
        if state.media.is_none() {
            return Err(EngineError::Unsupported("play without media".to_string()));
        }
        if state.status != EngineStatus::Playing {
            self.run_clock(&mut state);
        }
        Ok(())
    }

    async fn pause(&self) -> EngineResult<()> {
        let mut state = self.lock();
        state.halt_clock();
        if state.media.is_some() {
            state.status = EngineStatus::Paused;
        }
        Ok(())
    }

    async fn stop(&self) -> EngineResult<()> {
        let mut state = self.lock();
        state.halt_clock();
        state.media = None;
        state.offset = Duration::ZERO;
        state.status = EngineStatus::Idle;
        Ok(())
    }

    async fn seek_to(&self, position: Duration) -> EngineResult<()> {
        let mut state = self.lock();
        if state.media.is_none() {
            return Err(EngineError::Unsupported("seek without media".to_string()));
        }
        let playing = state.status == EngineStatus::Playing;
        state.halt_clock();
        state.offset = position.min(state.length());
        if playing {
            self.run_clock(&mut state);
        }
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> EngineResult<()> {
        self.lock().volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn position(&self) -> Duration {
        self.lock().position()
    }

    fn buffered_position(&self) -> Duration {
        let state = self.lock();
        // Pretend the stream buffers ten seconds ahead
        (state.position() + Duration::from_secs(10)).min(state.length())
    }

    fn duration(&self) -> Option<Duration> {
        let state = self.lock();
        state.media.as_ref().map(|_| state.length())
    }

    fn status(&self) -> EngineStatus {
        self.lock().status
    }

    fn current_media(&self) -> Option<AudioId> {
        self.lock().media.as_ref().map(|m| m.id.clone())
    }
}
