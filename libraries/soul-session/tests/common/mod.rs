//! Shared fakes for session integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use soul_session::{
    AudioId, AudioMetadata, CatalogResolver, EngineError, EngineResult, EngineStatus,
    FocusPlatform, FocusRequestResult, MemorySessionStore, PlaybackSession, PlayerEngine,
    SessionConfig, SessionHandle, SessionServices,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

// ===== Engine =====

/// Calls received by [`FakeEngine`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Prepare(AudioId),
    Play,
    Pause,
    Stop,
    Seek(Duration),
    Volume(f32),
}

/// Engine that records calls and models status transitions
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    status: Mutex<EngineStatus>,
    media: Mutex<Option<AudioId>>,
    position: Mutex<Duration>,
    failing: Mutex<HashSet<AudioId>>,
    prepare_delay: Mutex<Duration>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn prepared(&self) -> Vec<AudioId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Prepare(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn fail_on(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.into());
    }

    pub fn unfail(&self, id: &str) {
        self.failing.lock().unwrap().remove(&AudioId::from(id));
    }

    pub fn volumes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Volume(_)))
            .collect()
    }

    pub fn set_prepare_delay(&self, delay: Duration) {
        *self.prepare_delay.lock().unwrap() = delay;
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock().unwrap() = position;
    }

    /// Pretend media is already playing, as after a UI reconnect
    pub fn set_live(&self, id: &str, status: EngineStatus) {
        *self.media.lock().unwrap() = Some(id.into());
        *self.status.lock().unwrap() = status;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PlayerEngine for FakeEngine {
    async fn prepare(&self, audio: &AudioMetadata) -> EngineResult<()> {
        self.record(Call::Prepare(audio.id.clone()));
        *self.status.lock().unwrap() = EngineStatus::Preparing;

        let delay = *self.prepare_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&audio.id) {
            *self.status.lock().unwrap() = EngineStatus::Error;
            return Err(EngineError::Load {
                id: audio.id.to_string(),
                reason: "unreadable".to_string(),
            });
        }

        *self.media.lock().unwrap() = Some(audio.id.clone());
        *self.position.lock().unwrap() = Duration::ZERO;
        *self.status.lock().unwrap() = EngineStatus::Paused;
        Ok(())
    }

    async fn play(&self) -> EngineResult<()> {
        self.record(Call::Play);
        *self.status.lock().unwrap() = EngineStatus::Playing;
        Ok(())
    }

    async fn pause(&self) -> EngineResult<()> {
        self.record(Call::Pause);
        *self.status.lock().unwrap() = EngineStatus::Paused;
        Ok(())
    }

    async fn stop(&self) -> EngineResult<()> {
        self.record(Call::Stop);
        *self.status.lock().unwrap() = EngineStatus::Idle;
        *self.media.lock().unwrap() = None;
        Ok(())
    }

    async fn seek_to(&self, position: Duration) -> EngineResult<()> {
        self.record(Call::Seek(position));
        *self.position.lock().unwrap() = position;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> EngineResult<()> {
        self.record(Call::Volume(volume));
        Ok(())
    }

    fn position(&self) -> Duration {
        *self.position.lock().unwrap()
    }

    fn buffered_position(&self) -> Duration {
        *self.position.lock().unwrap()
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(180))
    }

    fn status(&self) -> EngineStatus {
        *self.status.lock().unwrap()
    }

    fn current_media(&self) -> Option<AudioId> {
        self.media.lock().unwrap().clone()
    }
}

// ===== Focus =====

/// Focus platform answering every request with a scripted result
pub struct ScriptedFocus {
    answer: Mutex<FocusRequestResult>,
    pub requests: AtomicUsize,
    pub abandons: AtomicUsize,
}

impl ScriptedFocus {
    pub fn new(answer: FocusRequestResult) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(answer),
            requests: AtomicUsize::new(0),
            abandons: AtomicUsize::new(0),
        })
    }

    pub fn answer(&self, answer: FocusRequestResult) {
        *self.answer.lock().unwrap() = answer;
    }

    pub fn abandoned(&self) -> usize {
        self.abandons.load(Ordering::SeqCst)
    }
}

impl FocusPlatform for ScriptedFocus {
    fn request_focus(&self) -> FocusRequestResult {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.answer.lock().unwrap()
    }

    fn abandon_focus(&self) {
        self.abandons.fetch_add(1, Ordering::SeqCst);
    }
}

// ===== Session =====

pub fn audio(id: &str) -> AudioMetadata {
    AudioMetadata::new(id, format!("Track {}", id.to_uppercase()))
}

pub fn ids(ids: &[&str]) -> Vec<AudioId> {
    ids.iter().map(|id| AudioId::from(*id)).collect()
}

pub fn catalog(ids: &[&str]) -> CatalogResolver {
    CatalogResolver::new(ids.iter().map(|id| audio(id)))
}

fn catalog_with_lengths(ids: &[&str], lengths: &[(&str, Duration)]) -> CatalogResolver {
    CatalogResolver::new(ids.iter().map(|id| {
        let mut audio = audio(id);
        audio.duration = lengths
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, length)| *length);
        audio
    }))
}

pub struct TestSession {
    pub handle: SessionHandle,
    pub engine: Arc<FakeEngine>,
    pub focus: Arc<ScriptedFocus>,
    pub store: Arc<MemorySessionStore>,
}

pub struct Builder {
    catalog: Vec<&'static str>,
    lengths: Vec<(&'static str, Duration)>,
    store: Arc<MemorySessionStore>,
    focus: FocusRequestResult,
    engine: Arc<FakeEngine>,
    config: SessionConfig,
}

impl Builder {
    pub fn new(catalog: &[&'static str]) -> Self {
        Self {
            catalog: catalog.to_vec(),
            lengths: Vec::new(),
            store: Arc::new(MemorySessionStore::new()),
            focus: FocusRequestResult::Granted,
            engine: FakeEngine::new(),
            config: SessionConfig::default(),
        }
    }

    /// Give a catalog entry a known duration
    pub fn length(mut self, id: &'static str, length: Duration) -> Self {
        self.lengths.push((id, length));
        self
    }

    pub fn store(mut self, store: MemorySessionStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn focus(mut self, focus: FocusRequestResult) -> Self {
        self.focus = focus;
        self
    }

    pub fn engine(mut self, engine: Arc<FakeEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn spawn(self) -> TestSession {
        let focus = ScriptedFocus::new(self.focus);
        let handle = PlaybackSession::spawn(
            self.config,
            SessionServices {
                engine: self.engine.clone(),
                resolver: Arc::new(catalog_with_lengths(&self.catalog, &self.lengths)),
                store: self.store.clone(),
                focus: focus.clone(),
            },
        );
        TestSession {
            handle,
            engine: self.engine,
            focus,
            store: self.store,
        }
    }
}

/// Wait until the watched value satisfies `pred`
pub async fn wait_for<T: Clone>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("session closed")
        .clone()
}

/// Wait until the engine is playing `id`
pub async fn wait_playing(session: &TestSession, id: &str) {
    let mut transport = session.handle.transport();
    let id = AudioId::from(id);
    wait_for(&mut transport, |t| {
        t.status == EngineStatus::Playing && t.current.as_ref() == Some(&id)
    })
    .await;
}
