//! Transport Command Dispatcher
//!
//! Coordinates queue, audio focus, persistence and the Player Engine.
//!
//! # Architecture
//!
//! One actor task owns the [`QueueStore`] and handles a single input at a
//! time: transport commands, focus callbacks and engine events all arrive on
//! the same channel, in arrival order. That ordering is what keeps a skip and
//! a remove from producing an inconsistent current index.
//!
//! Loading media (prepare, optional seek, play) can take network time, so it
//! runs as a cancellable job next to the actor. The actor keeps accepting
//! commands meanwhile; a newer load, Pause or Stop cancels the job, and a
//! job's completion report is applied only if it is still the latest one.
//!
//! ```text
//!  UI / media keys / focus / engine
//!            │
//!            ▼
//!     ┌─────────────┐   prepare+play   ┌──────────┐
//!     │ SessionActor │ ───────────────▶ │ load job │──▶ PlayerEngine
//!     └─────────────┘ ◀─────────────── └──────────┘
//!       │  │   │         LoadReport
//!       │  │   └─▶ watch / broadcast observers ──▶ ProgressTicker
//!       │  └─────▶ AudioFocusArbiter
//!       └────────▶ SessionPersister
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{CommandOutcome, PlayExtras, TransportCommand};
use crate::engine::{EngineEvent, EngineResult, PlayerEngine};
use crate::error::EngineError;
use crate::error::{Result, SessionError};
use crate::events::{self, SessionEvent, SessionPublisher, SessionWatchers};
use crate::focus::{
    AudioFocusArbiter, AudioFocusEvent, FocusAction, FocusDecision, FocusPlatform, FocusState,
};
use crate::persist::{SavedSession, SessionPersister, SessionStore};
use crate::progress::ProgressTicker;
use crate::queue::{Advance, QueueStore, Removal, StartPosition};
use crate::resolver::MetadataResolver;
use crate::shuffle;
use crate::source::QueueSource;
use crate::types::{
    AudioId, AudioMetadata, Direction, EngineStatus, PlaybackModeState, PlaybackProgressState,
    PlaybackQueue, RepeatMode, SessionConfig, ShuffleMode, TransportState,
};

/// External collaborators of a session
#[derive(Clone)]
pub struct SessionServices {
    pub engine: Arc<dyn PlayerEngine>,
    pub resolver: Arc<dyn MetadataResolver>,
    pub store: Arc<dyn SessionStore>,
    pub focus: Arc<dyn FocusPlatform>,
}

/// Entry point for starting a session
pub struct PlaybackSession;

impl PlaybackSession {
    /// Spawn the dispatcher actor and the Progress Ticker
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: SessionConfig, services: SessionServices) -> SessionHandle {
        let (inbox_tx, inbox_rx) = mpsc::channel(config.command_buffer.max(1));
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let (publisher, progress_tx, watchers) = events::channels(config.event_buffer);
        let events = publisher.events.clone();
        let shutdown = CancellationToken::new();

        ProgressTicker::new(
            services.engine.clone(),
            config.progress_interval(),
            watchers.transport.clone(),
            progress_tx,
            shutdown.clone(),
        )
        .spawn();

        let actor = SessionActor {
            engine: services.engine,
            resolver: services.resolver,
            persister: SessionPersister::new(services.store),
            focus: AudioFocusArbiter::new(services.focus),
            queue: QueueStore::new(),
            publisher,
            config,
            intent: None,
            load: None,
            generation: 0,
            reports: reports_tx,
            media: None,
            last_error: None,
            resume: None,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(actor.run(inbox_rx, reports_rx));

        SessionHandle {
            inbox: inbox_tx,
            watchers,
            events,
            shutdown,
        }
    }
}

/// Cloneable front door of a running session
#[derive(Clone)]
pub struct SessionHandle {
    inbox: mpsc::Sender<Input>,
    watchers: SessionWatchers,
    events: broadcast::Sender<SessionEvent>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    /// Submit a command and wait for its outcome
    pub async fn send(&self, command: TransportCommand) -> Result<CommandOutcome> {
        let (reply, outcome) = oneshot::channel();
        self.inbox
            .send(Input::Command { command, reply })
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        outcome.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Deliver a platform audio-focus callback
    pub async fn notify_focus(&self, event: AudioFocusEvent) -> Result<()> {
        self.inbox
            .send(Input::Focus(event))
            .await
            .map_err(|_| SessionError::SessionClosed)
    }

    /// Deliver an asynchronous engine notification
    pub async fn notify_engine(&self, event: EngineEvent) -> Result<()> {
        self.inbox
            .send(Input::Engine(event))
            .await
            .map_err(|_| SessionError::SessionClosed)
    }

    pub fn queue(&self) -> watch::Receiver<PlaybackQueue> {
        self.watchers.queue.clone()
    }

    pub fn mode(&self) -> watch::Receiver<PlaybackModeState> {
        self.watchers.mode.clone()
    }

    pub fn progress(&self) -> watch::Receiver<PlaybackProgressState> {
        self.watchers.progress.clone()
    }

    pub fn transport(&self) -> watch::Receiver<TransportState> {
        self.watchers.transport.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Persist, stop background tasks and close the session
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        if self.inbox.send(Input::Shutdown { reply }).await.is_err() {
            return Ok(());
        }
        let _ = done.await;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

enum Input {
    Command {
        command: TransportCommand,
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    Focus(AudioFocusEvent),
    Engine(EngineEvent),
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// How playback of the current entry should start once focus allows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Start {
    /// Engine already holds the current entry; just play
    Resume,
    /// Prepare the current entry, then play
    Load,
}

/// In-flight prepare/play job
struct LoadJob {
    generation: u64,
    token: CancellationToken,
    autoplay: bool,
    audio_id: AudioId,
    seek: Option<Duration>,
}

struct LoadReport {
    generation: u64,
    audio_id: AudioId,
    result: EngineResult<()>,
}

struct SessionActor {
    engine: Arc<dyn PlayerEngine>,
    resolver: Arc<dyn MetadataResolver>,
    persister: SessionPersister,
    focus: AudioFocusArbiter,
    queue: QueueStore,
    publisher: SessionPublisher,
    config: SessionConfig,

    /// Play request parked until audio focus is granted
    intent: Option<Start>,
    load: Option<LoadJob>,
    generation: u64,
    reports: mpsc::UnboundedSender<LoadReport>,

    /// Entry handed to the engine
    media: Option<AudioId>,
    /// Set by engine failures until the next successful transport action
    last_error: Option<String>,
    /// Restored position, applied the first time this entry is loaded
    resume: Option<(AudioId, Duration)>,
    shutdown: CancellationToken,
}

impl SessionActor {
    async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Input>,
        mut reports: mpsc::UnboundedReceiver<LoadReport>,
    ) {
        info!("Playback session started");
        self.publish_all();
        let mut carry: Option<Input> = None;

        loop {
            let input = match carry.take() {
                Some(input) => input,
                None => tokio::select! {
                    Some(report) = reports.recv() => {
                        self.on_load_report(report).await;
                        continue;
                    }
                    input = inbox.recv() => match input {
                        Some(input) => input,
                        None => break,
                    },
                },
            };

            match input {
                Input::Command { command, reply } if command.is_mode_update() => {
                    let mut batch = vec![(command, reply)];
                    loop {
                        match inbox.try_recv() {
                            Ok(Input::Command { command, reply }) if command.is_mode_update() => {
                                batch.push((command, reply));
                            }
                            Ok(other) => {
                                carry = Some(other);
                                break;
                            }
                            Err(_) => break,
                        }
                    }
                    self.apply_mode_batch(batch).await;
                }
                Input::Command { command, reply } => {
                    let name = command.name();
                    debug!("Command {:?}", command);
                    let result = self.handle(command).await;
                    if let Err(e) = &result {
                        warn!("{} rejected: {}", name, e);
                        self.publisher.emit(SessionEvent::CommandRejected {
                            command: name.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    let _ = reply.send(result);
                }
                Input::Focus(event) => self.on_focus_event(event).await,
                Input::Engine(event) => self.on_engine_event(event).await,
                Input::Shutdown { reply } => {
                    self.close().await;
                    let _ = reply.send(());
                    return;
                }
            }
        }

        self.close().await;
    }

    async fn close(&mut self) {
        self.cancel_load();
        self.persist().await;
        self.shutdown.cancel();
        self.publisher.transport.send_modify(|t| t.connected = false);
        info!("Playback session closed");
    }

    async fn handle(&mut self, command: TransportCommand) -> Result<CommandOutcome> {
        match command {
            TransportCommand::Play => self.play().await,
            TransportCommand::Pause => self.pause().await,
            TransportCommand::Stop => self.stop().await,
            TransportCommand::SeekTo(position) => self.seek(position).await,
            TransportCommand::SkipNext => self.skip(Direction::Forward).await,
            TransportCommand::SkipPrevious => self.skip_previous().await,
            TransportCommand::SkipToQueueIndex(index) => {
                self.queue.skip_to_index(index)?;
                self.publish_queue();
                self.begin_playback(Start::Load).await
            }
            TransportCommand::PlayFromId { id, extras } => self.play_from_id(id, extras).await,
            TransportCommand::SetRepeatMode(repeat) => {
                self.apply_mode(None, Some(repeat)).await;
                Ok(CommandOutcome::Applied)
            }
            TransportCommand::SetShuffleMode(shuffle) => {
                self.apply_mode(Some(shuffle), None).await;
                Ok(CommandOutcome::Applied)
            }
            TransportCommand::RestoreSavedState => self.restore().await,
            TransportCommand::RepeatCurrentOne => {
                let repeat = toggle(self.queue.mode().repeat, RepeatMode::One);
                self.apply_mode(None, Some(repeat)).await;
                Ok(CommandOutcome::Applied)
            }
            TransportCommand::RepeatCurrentAll => {
                let repeat = toggle(self.queue.mode().repeat, RepeatMode::All);
                self.apply_mode(None, Some(repeat)).await;
                Ok(CommandOutcome::Applied)
            }
            TransportCommand::EnqueueNext(id) => {
                let audio = self.resolve_one(&id).await?;
                let position = self.queue.enqueue_next(audio);
                debug!("Enqueued {} at {}", id, position);
                self.publish_queue();
                self.persist().await;
                Ok(CommandOutcome::Applied)
            }
            TransportCommand::RemoveByPosition(position) => {
                let removal = self.queue.remove_by_position(position)?;
                self.after_removal(&removal).await
            }
            TransportCommand::RemoveById(id) => {
                let removal = self.queue.remove_by_id(&id)?;
                self.after_removal(&removal).await
            }
            TransportCommand::ReplaceQueue { ids, title } => self.replace_queue(ids, title).await,
            TransportCommand::PlayAllShuffled { ids, title, source } => {
                self.play_all_shuffled(ids, title, source).await
            }
            TransportCommand::SwapPositions { from, to } => {
                // The current track stays current, so the engine keeps playing it
                self.queue.swap(from, to)?;
                self.publish_queue();
                self.persist().await;
                Ok(CommandOutcome::Applied)
            }
        }
    }

    // ===== Transport =====

    async fn play(&mut self) -> Result<CommandOutcome> {
        if self.queue.is_empty() {
            return Err(SessionError::EmptyQueue);
        }
        if !self.queue.is_valid() {
            // Queue ran out earlier; start over
            self.queue.skip_to_index(0)?;
            self.publish_queue();
        }

        if self.current_is_loaded() {
            let starting = self.load.as_ref().is_some_and(|job| job.autoplay);
            if (starting || self.engine.status().is_active()) && self.focus_is_held() {
                return Ok(CommandOutcome::Applied);
            }
            self.begin_playback(Start::Resume).await
        } else {
            self.begin_playback(Start::Load).await
        }
    }

    async fn pause(&mut self) -> Result<CommandOutcome> {
        self.intent = None;
        self.focus.clear_pending_resume();
        if self.load.as_ref().is_some_and(|job| job.autoplay) {
            // Keep the media loading, just don't start it
            self.reload_current(false);
        }
        if self.media.is_some() {
            let result = self.engine.pause().await;
            self.engine_call(result)?;
        }
        self.publish_transport();
        if self.config.persist_position_on_pause {
            self.persist().await;
        }
        Ok(CommandOutcome::Applied)
    }

    async fn stop(&mut self) -> Result<CommandOutcome> {
        self.halt().await?;
        self.persist().await;
        Ok(CommandOutcome::Applied)
    }

    /// Stop the engine, drop pending intents and give focus back
    async fn halt(&mut self) -> Result<()> {
        self.intent = None;
        self.cancel_load();
        let result = if self.media.take().is_some() {
            self.engine.stop().await
        } else {
            Ok(())
        };
        self.focus.abandon();
        self.publish_transport();
        self.engine_call(result)
    }

    async fn seek(&mut self, position: Duration) -> Result<CommandOutcome> {
        let current = self.queue.current().ok_or(SessionError::EmptyQueue)?;
        let loaded = self.current_is_loaded();
        // The engine only knows the length of what it holds
        let total = if loaded {
            self.engine.duration()
        } else {
            current.duration
        };
        let current = current.id.clone();
        let position = match total {
            Some(total) if !total.is_zero() => position.min(total),
            _ => position,
        };

        if loaded {
            let result = self.engine.seek_to(position).await;
            self.engine_call(result)?;
        } else {
            // Applied when the entry is next loaded
            self.resume = Some((current, position));
        }
        self.publish_transport();
        Ok(CommandOutcome::Applied)
    }

    async fn skip(&mut self, direction: Direction) -> Result<CommandOutcome> {
        match self.queue.advance(direction)? {
            Advance::Moved(index) => {
                debug!("Advanced {:?} to {}", direction, index);
                self.publish_queue();
                self.begin_playback(Start::Load).await
            }
            Advance::EndOfQueue => self.end_of_queue().await,
        }
    }

    async fn skip_previous(&mut self) -> Result<CommandOutcome> {
        if let Some(threshold) = self.config.previous_restart_threshold() {
            if self.current_is_loaded() && self.engine.position() > threshold {
                let result = self.engine.seek_to(Duration::ZERO).await;
                self.engine_call(result)?;
                self.publish_transport();
                return Ok(CommandOutcome::Applied);
            }
        }
        self.skip(Direction::Backward).await
    }

    async fn end_of_queue(&mut self) -> Result<CommandOutcome> {
        info!("End of queue reached");
        self.publish_queue();
        self.halt().await?;
        self.publisher.emit(SessionEvent::QueueEnded);
        self.persist().await;
        Ok(CommandOutcome::EndOfQueue)
    }

    // ===== Queue building =====

    async fn play_from_id(&mut self, id: AudioId, extras: PlayExtras) -> Result<CommandOutcome> {
        let single = extras.ids.is_empty();
        let ids = if single { vec![id.clone()] } else { extras.ids };

        let audios = self.resolver.resolve(&ids).await?;
        let start = audios
            .iter()
            .position(|audio| audio.id == id)
            .ok_or_else(|| SessionError::Resolve(format!("{id} could not be resolved")))?;

        let source = match extras.source {
            QueueSource::Unknown if single => QueueSource::SingleAudio,
            source => source,
        };
        self.queue
            .replace_and_play_from(audios, source, extras.title, StartPosition::Index(start))?;
        self.publish_queue();
        self.persist().await;
        self.begin_playback(Start::Load).await
    }

    async fn play_all_shuffled(
        &mut self,
        ids: Vec<AudioId>,
        title: Option<String>,
        source: QueueSource,
    ) -> Result<CommandOutcome> {
        let mut audios = self.resolver.resolve(&ids).await?;
        if audios.is_empty() {
            return Err(SessionError::EmptyQueue);
        }
        shuffle::shuffle(&mut audios);

        self.queue
            .replace_and_play_from(audios, source, title, StartPosition::FirstAfterShuffle)?;
        self.queue.set_mode(Some(ShuffleMode::All), None);
        self.publish_queue();
        self.publisher.publish_mode(self.queue.mode());
        self.persist().await;
        self.begin_playback(Start::Load).await
    }

    async fn replace_queue(
        &mut self,
        ids: Vec<AudioId>,
        title: Option<String>,
    ) -> Result<CommandOutcome> {
        let audios = self.resolver.resolve(&ids).await?;
        let previous = self.queue.current().map(|audio| audio.id.clone());
        let source = self.queue.source().clone();

        self.queue.set_queue(audios, source, title);
        let kept = previous.as_ref().is_some_and(|id| self.queue.select_id(id));
        self.publish_queue();

        let outcome = if kept || previous.is_none() {
            Ok(CommandOutcome::Applied)
        } else {
            self.repoint().await
        };
        self.persist().await;
        outcome
    }

    async fn after_removal(&mut self, removal: &Removal) -> Result<CommandOutcome> {
        debug!(
            "Removed {} from {} (current: {})",
            removal.removed.id, removal.position, removal.was_current
        );
        self.publish_queue();
        let outcome = if removal.was_current {
            self.repoint().await
        } else {
            Ok(CommandOutcome::Applied)
        };
        self.persist().await;
        outcome
    }

    /// Point the engine at the new current entry after the old one went away
    ///
    /// Active playback continues with the new entry; paused playback gets the
    /// new entry prepared but stays paused; an emptied queue stops.
    async fn repoint(&mut self) -> Result<CommandOutcome> {
        if !self.queue.is_valid() {
            self.halt().await?;
            return Ok(CommandOutcome::Applied);
        }
        if self.media.is_none() {
            return Ok(CommandOutcome::Applied);
        }

        if self.is_playing() || self.intent.is_some() {
            self.begin_playback(Start::Load).await
        } else {
            self.reload_current(false);
            self.publish_transport();
            Ok(CommandOutcome::Applied)
        }
    }

    // ===== Mode =====

    async fn apply_mode_batch(
        &mut self,
        batch: Vec<(TransportCommand, oneshot::Sender<Result<CommandOutcome>>)>,
    ) {
        let fold = fold_modes(
            self.queue.mode().shuffle,
            batch.iter().map(|(command, _)| command),
        );
        if batch.len() > 1 {
            debug!("Coalesced {} mode updates", batch.len());
        }

        self.set_modes(fold.shuffle, fold.repeat, fold.reshuffle)
            .await;
        for (_, reply) in batch {
            let _ = reply.send(Ok(CommandOutcome::Applied));
        }
    }

    async fn apply_mode(&mut self, shuffle: Option<ShuffleMode>, repeat: Option<RepeatMode>) {
        let reshuffle =
            shuffle == Some(ShuffleMode::All) && self.queue.mode().shuffle == ShuffleMode::None;
        self.set_modes(shuffle, repeat, reshuffle).await;
    }

    async fn set_modes(
        &mut self,
        shuffle: Option<ShuffleMode>,
        repeat: Option<RepeatMode>,
        reshuffle: bool,
    ) {
        let before = self.queue.mode();
        if reshuffle {
            // Shuffle from here: the playing track stays, the rest is reordered
            self.queue.reorder_upcoming(shuffle::shuffle);
            self.publish_queue();
        }
        self.queue.set_mode(shuffle, repeat);
        let after = self.queue.mode();
        if after != before {
            info!("Playback mode: {:?}", after);
            self.publisher.publish_mode(after);
        }
        if reshuffle || after != before {
            self.persist().await;
        }
    }

    // ===== Restore =====

    async fn restore(&mut self) -> Result<CommandOutcome> {
        if self.engine.status().is_live() {
            // Warm reconnect: the running engine is the source of truth
            if let Some(id) = self.engine.current_media() {
                if !self.queue.select_id(&id) {
                    let audio = self.resolve_one(&id).await?;
                    self.queue.set_queue(vec![audio], QueueSource::SingleAudio, None);
                }
                self.media = Some(id);
            }
            info!("Resynchronized with running engine");
            self.publish_all();
            return Ok(CommandOutcome::Applied);
        }

        if !self.queue.is_empty() {
            // In-memory state from this process outranks the saved record
            self.publish_all();
            return Ok(CommandOutcome::Applied);
        }

        let Some(saved) = self.persister.restore().await else {
            debug!("No saved session to restore");
            return Ok(CommandOutcome::Applied);
        };

        let audios = self.resolver.resolve(&saved.ids).await?;
        if audios.is_empty() {
            warn!("Saved session entries no longer resolve");
            return Ok(CommandOutcome::Applied);
        }
        let ids: Vec<AudioId> = audios.iter().map(|audio| audio.id.clone()).collect();
        let index = saved.resume_index(&ids);

        self.queue.replace_and_play_from(
            audios,
            saved.source.clone(),
            saved.title.clone(),
            StartPosition::Index(index),
        )?;
        self.queue.set_mode(Some(saved.shuffle), Some(saved.repeat));

        self.resume = None;
        if self.config.restore_position && !saved.position().is_zero() {
            if let Some(current) = self.queue.current() {
                if saved.current_id.as_ref() == Some(&current.id) {
                    self.resume = Some((current.id.clone(), saved.position()));
                }
            }
        }

        info!(
            "Restored session: {} entries, index {}",
            self.queue.len(),
            index
        );
        self.publish_all();
        Ok(CommandOutcome::Applied)
    }

    // ===== Focus and engine events =====

    async fn on_focus_event(&mut self, event: AudioFocusEvent) {
        let action = self.focus.on_event(event, self.is_playing());
        let result = match action {
            FocusAction::None => Ok(()),
            FocusAction::Resume => self.execute(Start::Resume).await,
            FocusAction::PlayPending => match self.intent.take() {
                Some(start) => self.execute(start).await,
                None => Ok(()),
            },
            FocusAction::RestoreVolume => self.restore_volume().await,
            FocusAction::Duck => {
                let result = self.engine.set_volume(self.config.duck_volume).await;
                self.engine_call(result)
            }
            FocusAction::PauseTransient => self.pause_output().await,
            FocusAction::Pause => {
                self.intent = None;
                let result = self.pause_output().await;
                self.persist().await;
                result
            }
        };

        self.publisher
            .emit(SessionEvent::FocusChanged(self.focus.state()));
        if let Err(e) = result {
            self.report_error(&e);
        }
        self.publish_transport();
    }

    async fn pause_output(&mut self) -> Result<()> {
        if self.load.as_ref().is_some_and(|job| job.autoplay) {
            self.reload_current(false);
        }
        if self.media.is_some() {
            let result = self.engine.pause().await;
            self.engine_call(result)?;
        }
        Ok(())
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        debug!("Engine event {:?}", event);
        match event {
            EngineEvent::Completed(id) => {
                if self.load.is_some() || self.media.as_ref() != Some(&id) {
                    debug!("Ignoring completion of {} (on {:?})", id, self.media);
                    return;
                }
                let result = match self.queue.advance(Direction::Forward) {
                    Ok(Advance::Moved(_)) => {
                        self.publish_queue();
                        self.begin_playback(Start::Load).await.map(|_| ())
                    }
                    Ok(Advance::EndOfQueue) => self.end_of_queue().await.map(|_| ()),
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    self.report_error(&e);
                }
            }
            EngineEvent::Failed(message) => {
                warn!("Engine failure: {}", message);
                self.last_error = Some(message.clone());
                self.publisher.emit(SessionEvent::Error { message });
            }
            EngineEvent::StatusChanged(status) => {
                if status != EngineStatus::Error {
                    self.last_error = None;
                }
            }
        }
        self.publish_transport();
    }

    // ===== Engine driving =====

    /// Gate audible playback on audio focus
    async fn begin_playback(&mut self, start: Start) -> Result<CommandOutcome> {
        if self.queue.current().is_none() {
            return Err(SessionError::EmptyQueue);
        }

        match self.focus.request() {
            FocusDecision::Granted => {
                self.intent = None;
                self.execute(start).await?;
                Ok(CommandOutcome::Applied)
            }
            FocusDecision::Deferred => {
                debug!("Play parked until audio focus is granted");
                if start == Start::Load {
                    // Prepare silently; the grant then only has to press play
                    self.reload_current(false);
                }
                // A newer request replaces an older parked one
                self.intent = Some(Start::Resume);
                self.publish_transport();
                Ok(CommandOutcome::AwaitingFocus)
            }
            FocusDecision::Denied => {
                self.intent = None;
                Err(SessionError::FocusDenied)
            }
        }
    }

    /// Start output once focus is held
    async fn execute(&mut self, start: Start) -> Result<()> {
        if self.focus.take_volume_restore() {
            self.restore_volume().await?;
        }

        let resume = start == Start::Resume && self.current_is_loaded() && self.load.is_none();
        if resume {
            self.last_error = None;
            let result = self.engine.play().await;
            self.engine_call(result)?;
        } else {
            self.reload_current(true);
        }
        self.publish_transport();
        Ok(())
    }

    async fn restore_volume(&mut self) -> Result<()> {
        let result = self.engine.set_volume(1.0).await;
        self.engine_call(result)
    }

    /// Spawn a load job for the current entry, cancelling any earlier one
    fn reload_current(&mut self, autoplay: bool) {
        self.cancel_load();
        let Some(audio) = self.queue.current().cloned() else {
            return;
        };

        let seek = match &self.resume {
            Some((id, position)) if *id == audio.id => {
                let position = *position;
                self.resume = None;
                Some(position)
            }
            _ => None,
        };

        self.generation += 1;
        let generation = self.generation;
        let token = self.shutdown.child_token();
        self.load = Some(LoadJob {
            generation,
            token: token.clone(),
            autoplay,
            audio_id: audio.id.clone(),
            seek,
        });
        self.media = Some(audio.id.clone());
        self.last_error = None;

        debug!(
            "Loading {} (generation {}, autoplay {})",
            audio.id, generation, autoplay
        );
        let engine = self.engine.clone();
        let reports = self.reports.clone();
        tokio::spawn(async move {
            let audio_id = audio.id.clone();
            let work = async {
                engine.prepare(&audio).await?;
                if let Some(position) = seek {
                    engine.seek_to(position).await?;
                }
                if autoplay {
                    engine.play().await?;
                }
                Ok::<_, EngineError>(())
            };
            let result = tokio::select! {
                () = token.cancelled() => return,
                result = work => result,
            };
            let _ = reports.send(LoadReport {
                generation,
                audio_id,
                result,
            });
        });
    }

    async fn on_load_report(&mut self, report: LoadReport) {
        let current = self
            .load
            .as_ref()
            .is_some_and(|job| job.generation == report.generation);
        if !current {
            debug!("Dropping stale load report {}", report.generation);
            return;
        }
        let Some(job) = self.load.take() else {
            return;
        };

        match report.result {
            Ok(()) => debug!("Loaded {}", report.audio_id),
            Err(e) => {
                // Queue and position stay put so the user can retry or skip.
                // The engine holds nothing, so a retry has to prepare again.
                warn!("Failed to load {}: {}", report.audio_id, e);
                self.media = None;
                if let Some(seek) = job.seek {
                    self.resume = Some((job.audio_id, seek));
                }
                self.last_error = Some(e.to_string());
                self.publisher.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
            }
        }
        self.publish_transport();
    }

    fn cancel_load(&mut self) {
        if let Some(job) = self.load.take() {
            debug!("Cancelling load generation {}", job.generation);
            job.token.cancel();
            if let Some(seek) = job.seek {
                // Not applied yet; the next load of this entry picks it up
                self.resume = Some((job.audio_id, seek));
            }
        }
    }

    fn engine_call(&mut self, result: EngineResult<()>) -> Result<()> {
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
        }
        result.map_err(SessionError::from)
    }

    // ===== Helpers =====

    async fn resolve_one(&self, id: &AudioId) -> Result<AudioMetadata> {
        self.resolver
            .resolve(std::slice::from_ref(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::Resolve(format!("{id} could not be resolved")))
    }

    fn current_is_loaded(&self) -> bool {
        match (self.queue.current(), &self.media) {
            (Some(current), Some(media)) => &current.id == media,
            _ => false,
        }
    }

    fn focus_is_held(&self) -> bool {
        matches!(self.focus.state(), FocusState::Held | FocusState::Ducked)
    }

    fn is_playing(&self) -> bool {
        self.engine.status().is_active() || self.load.as_ref().is_some_and(|job| job.autoplay)
    }

    fn status(&self) -> EngineStatus {
        if self.last_error.is_some() {
            EngineStatus::Error
        } else if self.load.is_some() {
            EngineStatus::Preparing
        } else if self.media.is_none() {
            EngineStatus::Idle
        } else {
            self.engine.status()
        }
    }

    fn report_error(&self, error: &SessionError) {
        warn!("{}", error);
        self.publisher.emit(SessionEvent::Error {
            message: error.to_string(),
        });
    }

    async fn persist(&self) {
        let position = if self.current_is_loaded() {
            self.engine.position()
        } else {
            self.resume
                .as_ref()
                .map(|(_, position)| *position)
                .unwrap_or_default()
        };
        let session = SavedSession::capture(&self.queue, position);
        if let Err(e) = self.persister.save(&session).await {
            warn!("Failed to persist session: {}", e);
            self.publisher.emit(SessionEvent::Error {
                message: e.to_string(),
            });
        }
    }

    fn publish_queue(&self) {
        self.publisher.publish_queue(self.queue.snapshot());
    }

    fn publish_transport(&self) {
        self.publisher.publish_transport(TransportState {
            connected: true,
            status: self.status(),
            current: self.media.clone(),
            awaiting_focus: self.intent.is_some(),
        });
    }

    fn publish_all(&self) {
        self.publish_queue();
        self.publisher.publish_mode(self.queue.mode());
        self.publish_transport();
    }
}

/// Net effect of a run of queued mode updates
#[derive(Debug, PartialEq, Eq)]
struct ModeFold {
    shuffle: Option<ShuffleMode>,
    repeat: Option<RepeatMode>,
    /// Some update in the run turned shuffle on
    reshuffle: bool,
}

/// Collapse mode updates to their last values, keeping any reshuffle an
/// intermediate `None` then `All` flip would have caused
fn fold_modes<'a>(
    mut shuffle_now: ShuffleMode,
    commands: impl IntoIterator<Item = &'a TransportCommand>,
) -> ModeFold {
    let mut fold = ModeFold {
        shuffle: None,
        repeat: None,
        reshuffle: false,
    };
    for command in commands {
        match command {
            TransportCommand::SetShuffleMode(mode) => {
                if *mode == ShuffleMode::All && shuffle_now == ShuffleMode::None {
                    fold.reshuffle = true;
                }
                shuffle_now = *mode;
                fold.shuffle = Some(*mode);
            }
            TransportCommand::SetRepeatMode(mode) => fold.repeat = Some(*mode),
            _ => {}
        }
    }
    fold
}

fn toggle(current: RepeatMode, target: RepeatMode) -> RepeatMode {
    if current == target {
        RepeatMode::None
    } else {
        target
    }
}
