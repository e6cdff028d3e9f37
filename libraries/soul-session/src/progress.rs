//! Progress Ticker
//!
//! Strictly an observer: while the engine is playing or buffering it polls
//! position telemetry at a fixed interval and publishes
//! [`PlaybackProgressState`] snapshots. Outside the active set it takes one
//! sample per transport change and otherwise sleeps on the transport watch,
//! so leaving the active state is the cancellation.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::engine::PlayerEngine;
use crate::types::{AudioId, PlaybackProgressState, TransportState};

pub(crate) struct ProgressTicker {
    engine: Arc<dyn PlayerEngine>,
    interval: Duration,
    transport: watch::Receiver<TransportState>,
    progress: watch::Sender<PlaybackProgressState>,
    shutdown: CancellationToken,
}

impl ProgressTicker {
    pub(crate) fn new(
        engine: Arc<dyn PlayerEngine>,
        interval: Duration,
        transport: watch::Receiver<TransportState>,
        progress: watch::Sender<PlaybackProgressState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            interval,
            transport,
            progress,
            shutdown,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let Self {
            engine,
            interval,
            mut transport,
            progress,
            shutdown,
        } = self;

        let mut media: Option<AudioId> = None;

        loop {
            let state = transport.borrow_and_update().clone();
            if state.current != media {
                media = state.current.clone();
                progress.send_replace(PlaybackProgressState::default());
            }
            sample(engine.as_ref(), &progress);

            if state.status.is_active() {
                match poll(engine.as_ref(), interval, &mut transport, &progress, &shutdown).await {
                    PollExit::Shutdown => return,
                    PollExit::TransportChanged => continue,
                    PollExit::EngineInactive => {}
                }
            }

            tokio::select! {
                () = shutdown.cancelled() => return,
                changed = transport.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

enum PollExit {
    Shutdown,
    TransportChanged,
    EngineInactive,
}

/// Sample at `interval` until the transport changes or the engine goes quiet
async fn poll(
    engine: &dyn PlayerEngine,
    interval: Duration,
    transport: &mut watch::Receiver<TransportState>,
    progress: &watch::Sender<PlaybackProgressState>,
    shutdown: &CancellationToken,
) -> PollExit {
    trace!("Progress polling started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately; the caller just sampled
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return PollExit::Shutdown,
            changed = transport.changed() => {
                return if changed.is_err() {
                    PollExit::Shutdown
                } else {
                    PollExit::TransportChanged
                };
            }
            _ = ticker.tick() => {
                sample(engine, progress);
                if !engine.status().is_active() {
                    trace!("Progress polling stopped, engine {:?}", engine.status());
                    return PollExit::EngineInactive;
                }
            }
        }
    }
}

fn sample(engine: &dyn PlayerEngine, progress: &watch::Sender<PlaybackProgressState>) {
    let total = engine.duration().unwrap_or_default();
    let elapsed = engine.position();
    let buffered = engine.buffered_position();
    progress.send_modify(|state| *state = state.advance_to(total, elapsed, buffered));
}
