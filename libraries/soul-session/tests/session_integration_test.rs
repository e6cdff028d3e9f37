//! Integration tests for the playback session
//!
//! Drive a spawned session through its handle against a fake engine and
//! check what the engine was asked to do and what observers saw.

mod common;

use common::{ids, wait_for, wait_playing, Builder, Call, FakeEngine, TestSession};
use soul_session::{
    AudioFocusEvent, AudioId, CommandOutcome, EngineEvent, EngineStatus, FocusRequestResult,
    FocusState,
    MemorySessionStore, PlayExtras, PlayerEngine, QueueSource, RepeatMode, SavedSession, SessionError,
    SessionEvent, ShuffleMode, TransportCommand,
};
use std::collections::HashSet;
use std::time::Duration;

// ===== Helpers =====

async fn play_from(session: &TestSession, id: &str, queue: &[&str]) -> CommandOutcome {
    session
        .handle
        .send(TransportCommand::PlayFromId {
            id: id.into(),
            extras: PlayExtras {
                ids: ids(queue),
                source: QueueSource::Album,
                title: Some("Album".to_string()),
            },
        })
        .await
        .unwrap()
}

/// Round-trip a no-op command so every earlier input has been applied
async fn settle(session: &TestSession) {
    let repeat = session.handle.mode().borrow().repeat;
    session
        .handle
        .send(TransportCommand::SetRepeatMode(repeat))
        .await
        .unwrap();
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

// ===== Queue navigation =====

#[tokio::test]
async fn test_skip_twice_then_remove_current_last_wraps_to_start() {
    let session = Builder::new(&["a", "b", "c"]).spawn();
    play_from(&session, "a", &["a", "b", "c"]).await;
    wait_playing(&session, "a").await;

    session.handle.send(TransportCommand::SkipNext).await.unwrap();
    session.handle.send(TransportCommand::SkipNext).await.unwrap();
    {
        let queue = session.handle.queue();
        let queue = queue.borrow();
        assert_eq!(queue.current_index, 2);
        assert_eq!(queue.current_audio().unwrap().id, AudioId::from("c"));
    }
    wait_playing(&session, "c").await;

    session
        .handle
        .send(TransportCommand::RemoveByPosition(2))
        .await
        .unwrap();

    let queue = session.handle.queue().borrow().clone();
    assert_eq!(queue.ids, ids(&["a", "b"]));
    assert!(queue.is_valid);
    assert_eq!(queue.current_index, 0);

    // Playback was active, so it continues with the new current entry
    wait_playing(&session, "a").await;
}

#[tokio::test]
async fn test_end_of_queue_stops_and_play_restarts_from_top() {
    let session = Builder::new(&["a", "b"]).spawn();
    let mut events = session.handle.events();
    play_from(&session, "b", &["a", "b"]).await;
    wait_playing(&session, "b").await;

    let outcome = session.handle.send(TransportCommand::SkipNext).await.unwrap();
    assert_eq!(outcome, CommandOutcome::EndOfQueue);

    let queue = session.handle.queue().borrow().clone();
    assert!(!queue.is_valid);
    assert_eq!(queue.current_index, 1);
    assert_eq!(session.engine.count(&Call::Stop), 1);
    assert_eq!(session.handle.transport().borrow().status, EngineStatus::Idle);
    assert!(drain(&mut events).contains(&SessionEvent::QueueEnded));

    session.handle.send(TransportCommand::Play).await.unwrap();
    wait_playing(&session, "a").await;
    assert_eq!(session.handle.queue().borrow().current_index, 0);
}

#[tokio::test]
async fn test_repeat_all_wraps_forward() {
    let session = Builder::new(&["a", "b"]).spawn();
    play_from(&session, "b", &["a", "b"]).await;
    session
        .handle
        .send(TransportCommand::SetRepeatMode(RepeatMode::All))
        .await
        .unwrap();

    let outcome = session.handle.send(TransportCommand::SkipNext).await.unwrap();
    assert_eq!(outcome, CommandOutcome::Applied);
    wait_playing(&session, "a").await;
}

#[tokio::test]
async fn test_skip_previous_restarts_when_well_into_track() {
    let session = Builder::new(&["a", "b"]).spawn();
    play_from(&session, "b", &["a", "b"]).await;
    wait_playing(&session, "b").await;

    session.engine.set_position(Duration::from_secs(10));
    session
        .handle
        .send(TransportCommand::SkipPrevious)
        .await
        .unwrap();
    assert_eq!(session.handle.queue().borrow().current_index, 1);
    assert!(session.engine.calls().contains(&Call::Seek(Duration::ZERO)));

    session.engine.set_position(Duration::from_secs(1));
    session
        .handle
        .send(TransportCommand::SkipPrevious)
        .await
        .unwrap();
    assert_eq!(session.handle.queue().borrow().current_index, 0);
    wait_playing(&session, "a").await;
}

#[tokio::test]
async fn test_skip_to_out_of_range_index_is_rejected() {
    let session = Builder::new(&["a", "b"]).spawn();
    let mut events = session.handle.events();
    play_from(&session, "a", &["a", "b"]).await;

    let err = session
        .handle
        .send(TransportCommand::SkipToQueueIndex(5))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::IndexOutOfRange { index: 5, len: 2 }));
    assert_eq!(session.handle.queue().borrow().current_index, 0);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        SessionEvent::CommandRejected { command, .. } if command == "SkipToQueueIndex"
    )));
}

#[tokio::test]
async fn test_completed_advances_to_next_entry() {
    let session = Builder::new(&["a", "b"]).spawn();
    play_from(&session, "a", &["a", "b"]).await;
    wait_playing(&session, "a").await;

    session
        .handle
        .notify_engine(EngineEvent::Completed("a".into()))
        .await
        .unwrap();
    wait_playing(&session, "b").await;
    assert_eq!(session.handle.queue().borrow().current_index, 1);
}

#[tokio::test]
async fn test_completion_after_stop_is_ignored() {
    let session = Builder::new(&["a", "b"]).spawn();
    play_from(&session, "a", &["a", "b"]).await;
    wait_playing(&session, "a").await;
    session.handle.send(TransportCommand::Stop).await.unwrap();

    session
        .handle
        .notify_engine(EngineEvent::Completed("a".into()))
        .await
        .unwrap();
    settle(&session).await;

    assert_eq!(session.engine.prepared(), ids(&["a"]));
    assert_eq!(session.engine.count(&Call::Play), 1);
    assert_eq!(session.handle.queue().borrow().current_index, 0);
    assert_eq!(session.handle.transport().borrow().status, EngineStatus::Idle);
}

#[tokio::test]
async fn test_late_completion_of_skipped_track_is_ignored() {
    let session = Builder::new(&["a", "b", "c"]).spawn();
    play_from(&session, "a", &["a", "b", "c"]).await;
    wait_playing(&session, "a").await;
    session.handle.send(TransportCommand::SkipNext).await.unwrap();
    wait_playing(&session, "b").await;

    session
        .handle
        .notify_engine(EngineEvent::Completed("a".into()))
        .await
        .unwrap();
    settle(&session).await;

    assert_eq!(session.handle.queue().borrow().current_index, 1);
    assert_eq!(session.engine.prepared(), ids(&["a", "b"]));
    wait_playing(&session, "b").await;
}

#[tokio::test]
async fn test_newer_load_cancels_slow_one() {
    let session = Builder::new(&["a", "b"]).spawn();
    session
        .engine
        .set_prepare_delay(Duration::from_millis(200));

    play_from(&session, "a", &["a", "b"]).await;
    session
        .handle
        .send(TransportCommand::SkipToQueueIndex(1))
        .await
        .unwrap();

    wait_playing(&session, "b").await;
    assert_eq!(session.engine.count(&Call::Play), 1);
}

// ===== Transport =====

#[tokio::test]
async fn test_pause_then_play_resumes_without_reloading() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;

    session.handle.send(TransportCommand::Pause).await.unwrap();
    assert_eq!(session.handle.transport().borrow().status, EngineStatus::Paused);

    session.handle.send(TransportCommand::Play).await.unwrap();
    wait_playing(&session, "a").await;
    assert_eq!(session.engine.prepared(), ids(&["a"]));
    assert_eq!(session.engine.count(&Call::Play), 2);
}

#[tokio::test]
async fn test_seek_on_empty_queue_is_rejected() {
    let session = Builder::new(&["a"]).spawn();
    let err = session
        .handle
        .send(TransportCommand::SeekTo(Duration::from_secs(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::EmptyQueue));
    assert!(session.engine.calls().is_empty());
}

#[tokio::test]
async fn test_seek_clamps_to_duration() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;

    session
        .handle
        .send(TransportCommand::SeekTo(Duration::from_secs(999)))
        .await
        .unwrap();
    assert!(session
        .engine
        .calls()
        .contains(&Call::Seek(Duration::from_secs(180))));
}

#[tokio::test]
async fn test_seek_before_load_clamps_to_entry_length() {
    let saved = r#"{"ids": ["x", "y"], "current_index": 1}"#;
    let session = Builder::new(&["x", "y"])
        .length("y", Duration::from_secs(60))
        .store(MemorySessionStore::with_contents(saved))
        .spawn();
    session
        .handle
        .send(TransportCommand::RestoreSavedState)
        .await
        .unwrap();

    session
        .handle
        .send(TransportCommand::SeekTo(Duration::from_secs(999)))
        .await
        .unwrap();
    session.handle.send(TransportCommand::Play).await.unwrap();
    wait_playing(&session, "y").await;

    assert_eq!(
        session.engine.calls(),
        vec![
            Call::Prepare("y".into()),
            Call::Seek(Duration::from_secs(60)),
            Call::Play
        ]
    );
}

#[tokio::test]
async fn test_engine_failure_keeps_queue_position() {
    let session = Builder::new(&["a", "b"]).spawn();
    let mut events = session.handle.events();
    session.engine.fail_on("b");
    play_from(&session, "a", &["a", "b"]).await;
    wait_playing(&session, "a").await;

    session.handle.send(TransportCommand::SkipNext).await.unwrap();

    let mut transport = session.handle.transport();
    wait_for(&mut transport, |t| t.status == EngineStatus::Error).await;
    let queue = session.handle.queue().borrow().clone();
    assert_eq!(queue.current_index, 1);
    assert!(queue.is_valid);
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, SessionEvent::Error { .. })));
}

#[tokio::test]
async fn test_play_after_failed_load_prepares_again() {
    let session = Builder::new(&["a"]).spawn();
    session.engine.fail_on("a");
    play_from(&session, "a", &["a"]).await;

    let mut transport = session.handle.transport();
    let failed = wait_for(&mut transport, |t| t.status == EngineStatus::Error).await;
    assert_eq!(failed.current, None);

    session.engine.unfail("a");
    session.handle.send(TransportCommand::Play).await.unwrap();
    wait_playing(&session, "a").await;
    assert_eq!(session.engine.prepared(), ids(&["a", "a"]));
    assert_eq!(session.engine.current_media(), Some("a".into()));
}

// ===== Queue editing =====

#[tokio::test]
async fn test_remove_current_while_paused_prepares_without_playing() {
    let session = Builder::new(&["a", "b", "c"]).spawn();
    play_from(&session, "a", &["a", "b", "c"]).await;
    wait_playing(&session, "a").await;
    session.handle.send(TransportCommand::Pause).await.unwrap();

    session
        .handle
        .send(TransportCommand::RemoveById("a".into()))
        .await
        .unwrap();

    let mut transport = session.handle.transport();
    let b = AudioId::from("b");
    wait_for(&mut transport, |t| {
        t.current.as_ref() == Some(&b) && t.status == EngineStatus::Paused
    })
    .await;
    assert_eq!(session.engine.count(&Call::Play), 1);
    assert_eq!(session.handle.queue().borrow().ids, ids(&["b", "c"]));
}

#[tokio::test]
async fn test_removing_only_entry_stops_playback() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;

    session
        .handle
        .send(TransportCommand::RemoveByPosition(0))
        .await
        .unwrap();

    assert!(!session.handle.queue().borrow().is_valid);
    assert_eq!(session.engine.count(&Call::Stop), 1);
    assert_eq!(session.handle.transport().borrow().status, EngineStatus::Idle);
}

#[tokio::test]
async fn test_enqueue_next_and_swap_keep_current_track() {
    let session = Builder::new(&["a", "b", "c"]).spawn();
    play_from(&session, "a", &["a", "b"]).await;
    wait_playing(&session, "a").await;

    session
        .handle
        .send(TransportCommand::EnqueueNext("c".into()))
        .await
        .unwrap();
    assert_eq!(session.handle.queue().borrow().ids, ids(&["a", "c", "b"]));

    session
        .handle
        .send(TransportCommand::SwapPositions { from: 0, to: 2 })
        .await
        .unwrap();
    let queue = session.handle.queue().borrow().clone();
    assert_eq!(queue.ids, ids(&["b", "c", "a"]));
    assert_eq!(queue.current_index, 2);
    assert_eq!(session.engine.prepared(), ids(&["a"]));

    let err = session
        .handle
        .send(TransportCommand::EnqueueNext("missing".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Resolve(_)));
}

#[tokio::test]
async fn test_replace_queue_keeps_surviving_current() {
    let session = Builder::new(&["a", "b", "c", "d"]).spawn();
    play_from(&session, "b", &["a", "b", "c"]).await;
    wait_playing(&session, "b").await;

    session
        .handle
        .send(TransportCommand::ReplaceQueue {
            ids: ids(&["d", "b"]),
            title: Some("Edited".to_string()),
        })
        .await
        .unwrap();

    let queue = session.handle.queue().borrow().clone();
    assert_eq!(queue.ids, ids(&["d", "b"]));
    assert_eq!(queue.current_index, 1);
    assert_eq!(queue.source, QueueSource::Album);
    assert_eq!(queue.title.as_deref(), Some("Edited"));
    assert_eq!(session.engine.prepared(), ids(&["b"]));
}

#[tokio::test]
async fn test_play_all_shuffled_enables_shuffle() {
    let all = ["a", "b", "c", "d", "e"];
    let session = Builder::new(&all).spawn();

    session
        .handle
        .send(TransportCommand::PlayAllShuffled {
            ids: ids(&all),
            title: None,
            source: QueueSource::Downloads,
        })
        .await
        .unwrap();

    let queue = session.handle.queue().borrow().clone();
    assert_eq!(queue.current_index, 0);
    let got: HashSet<_> = queue.ids.iter().cloned().collect();
    assert_eq!(got, ids(&all).into_iter().collect::<HashSet<_>>());
    assert_eq!(session.handle.mode().borrow().shuffle, ShuffleMode::All);

    let first = queue.ids[0].clone();
    wait_playing(&session, first.as_str()).await;
}

#[tokio::test]
async fn test_enabling_shuffle_keeps_played_and_current_entries() {
    let all = ["a", "b", "c", "d", "e", "f"];
    let session = Builder::new(&all).spawn();
    play_from(&session, "c", &all).await;

    session
        .handle
        .send(TransportCommand::SetShuffleMode(ShuffleMode::All))
        .await
        .unwrap();

    let queue = session.handle.queue().borrow().clone();
    assert_eq!(queue.current_index, 2);
    assert_eq!(&queue.ids[..3], &ids(&["a", "b", "c"])[..]);
    let upcoming: HashSet<_> = queue.ids[3..].iter().cloned().collect();
    assert_eq!(upcoming, ids(&["d", "e", "f"]).into_iter().collect::<HashSet<_>>());
}

#[tokio::test]
async fn test_mode_updates_settle_on_last_value() {
    let session = Builder::new(&["a"]).spawn();
    let handle = &session.handle;

    let (first, second, third) = tokio::join!(
        handle.send(TransportCommand::SetRepeatMode(RepeatMode::One)),
        handle.send(TransportCommand::SetShuffleMode(ShuffleMode::All)),
        handle.send(TransportCommand::SetRepeatMode(RepeatMode::All)),
    );
    assert!(first.is_ok() && second.is_ok() && third.is_ok());

    let mode = *handle.mode().borrow();
    assert_eq!(mode.repeat, RepeatMode::All);
    assert_eq!(mode.shuffle, ShuffleMode::All);

    handle.send(TransportCommand::RepeatCurrentAll).await.unwrap();
    assert_eq!(handle.mode().borrow().repeat, RepeatMode::None);
    handle.send(TransportCommand::RepeatCurrentOne).await.unwrap();
    assert_eq!(handle.mode().borrow().repeat, RepeatMode::One);
}

// ===== Audio focus =====

#[tokio::test]
async fn test_deferred_focus_play_is_cancelled_by_stop() {
    let session = Builder::new(&["a"])
        .focus(FocusRequestResult::Delayed)
        .spawn();

    let outcome = play_from(&session, "a", &["a"]).await;
    assert_eq!(outcome, CommandOutcome::AwaitingFocus);
    assert!(session.handle.transport().borrow().awaiting_focus);

    session.handle.send(TransportCommand::Stop).await.unwrap();
    assert!(!session.handle.transport().borrow().awaiting_focus);

    session
        .handle
        .notify_focus(AudioFocusEvent::Gained)
        .await
        .unwrap();
    settle(&session).await;

    assert_eq!(session.engine.count(&Call::Play), 0);
    assert_eq!(session.focus.abandoned(), 1);
}

#[tokio::test]
async fn test_deferred_focus_plays_once_granted() {
    let session = Builder::new(&["a"])
        .focus(FocusRequestResult::Delayed)
        .spawn();

    let outcome = play_from(&session, "a", &["a"]).await;
    assert_eq!(outcome, CommandOutcome::AwaitingFocus);
    assert_eq!(session.engine.count(&Call::Play), 0);

    session
        .handle
        .notify_focus(AudioFocusEvent::Gained)
        .await
        .unwrap();
    wait_playing(&session, "a").await;
    assert!(!session.handle.transport().borrow().awaiting_focus);
}

#[tokio::test]
async fn test_denied_focus_rejects_play() {
    let session = Builder::new(&["a"])
        .focus(FocusRequestResult::Denied)
        .spawn();

    let err = session
        .handle
        .send(TransportCommand::PlayFromId {
            id: "a".into(),
            extras: PlayExtras::default(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::FocusDenied));
    assert_eq!(session.engine.count(&Call::Play), 0);
    assert_eq!(
        session.handle.queue().borrow().source,
        QueueSource::SingleAudio
    );
}

#[tokio::test]
async fn test_transient_loss_resumes_only_if_playing() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;

    session
        .handle
        .notify_focus(AudioFocusEvent::LostTransient)
        .await
        .unwrap();
    settle(&session).await;
    assert_eq!(session.engine.count(&Call::Pause), 1);

    session
        .handle
        .notify_focus(AudioFocusEvent::Gained)
        .await
        .unwrap();
    settle(&session).await;
    assert_eq!(session.engine.count(&Call::Play), 2);
    assert_eq!(session.handle.transport().borrow().status, EngineStatus::Playing);
}

#[tokio::test]
async fn test_transient_loss_while_paused_does_not_resume() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;
    session.handle.send(TransportCommand::Pause).await.unwrap();

    session
        .handle
        .notify_focus(AudioFocusEvent::LostTransient)
        .await
        .unwrap();
    session
        .handle
        .notify_focus(AudioFocusEvent::Gained)
        .await
        .unwrap();
    settle(&session).await;

    assert_eq!(session.engine.count(&Call::Play), 1);
    assert!(session.engine.calls().contains(&Call::Volume(1.0)));
}

#[tokio::test]
async fn test_explicit_pause_during_transient_loss_wins() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;

    session
        .handle
        .notify_focus(AudioFocusEvent::LostTransient)
        .await
        .unwrap();
    session.handle.send(TransportCommand::Pause).await.unwrap();
    session
        .handle
        .notify_focus(AudioFocusEvent::Gained)
        .await
        .unwrap();
    settle(&session).await;

    assert_eq!(session.engine.count(&Call::Play), 1);
}

#[tokio::test]
async fn test_duck_and_restore_volume() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;
    let mut events = session.handle.events();

    session
        .handle
        .notify_focus(AudioFocusEvent::LostTransientCanDuck)
        .await
        .unwrap();
    session
        .handle
        .notify_focus(AudioFocusEvent::Gained)
        .await
        .unwrap();
    settle(&session).await;

    assert_eq!(
        session.engine.volumes(),
        vec![Call::Volume(0.2), Call::Volume(1.0)]
    );
    assert_eq!(session.engine.count(&Call::Pause), 0);

    let seen = drain(&mut events);
    assert!(seen.contains(&SessionEvent::FocusChanged(FocusState::Ducked)));
    assert!(seen.contains(&SessionEvent::FocusChanged(FocusState::Held)));
}

#[tokio::test]
async fn test_play_after_duck_then_loss_restores_volume() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;

    session
        .handle
        .notify_focus(AudioFocusEvent::LostTransientCanDuck)
        .await
        .unwrap();
    session
        .handle
        .notify_focus(AudioFocusEvent::Lost)
        .await
        .unwrap();
    settle(&session).await;
    assert_eq!(session.engine.count(&Call::Pause), 1);

    session.handle.send(TransportCommand::Play).await.unwrap();
    wait_playing(&session, "a").await;
    assert_eq!(
        session.engine.volumes(),
        vec![Call::Volume(0.2), Call::Volume(1.0)]
    );
}

#[tokio::test]
async fn test_resume_after_duck_then_transient_loss_restores_volume() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;

    for event in [
        AudioFocusEvent::LostTransientCanDuck,
        AudioFocusEvent::LostTransient,
        AudioFocusEvent::Gained,
    ] {
        session.handle.notify_focus(event).await.unwrap();
    }
    settle(&session).await;

    assert_eq!(session.engine.count(&Call::Play), 2);
    assert_eq!(
        session.engine.volumes(),
        vec![Call::Volume(0.2), Call::Volume(1.0)]
    );
    assert_eq!(session.handle.transport().borrow().status, EngineStatus::Playing);
}

// ===== Persistence and restore =====

#[tokio::test]
async fn test_cold_restore_selects_saved_entry_without_playing() {
    let saved = r#"{"ids": ["x", "y"], "current_index": 1, "shuffle": "none", "repeat": "all"}"#;
    let session = Builder::new(&["x", "y"])
        .store(MemorySessionStore::with_contents(saved))
        .spawn();

    session
        .handle
        .send(TransportCommand::RestoreSavedState)
        .await
        .unwrap();

    let queue = session.handle.queue().borrow().clone();
    assert_eq!(queue.current_audio().unwrap().id, AudioId::from("y"));
    assert_eq!(session.handle.mode().borrow().repeat, RepeatMode::All);
    assert!(session.engine.calls().is_empty());
    assert_eq!(session.handle.transport().borrow().status, EngineStatus::Idle);
}

#[tokio::test]
async fn test_restored_position_applies_on_first_play() {
    let saved = r#"{"ids": ["x", "y"], "current_index": 0, "current_id": "y", "position_ms": 42000}"#;
    let session = Builder::new(&["x", "y"])
        .store(MemorySessionStore::with_contents(saved))
        .spawn();

    session
        .handle
        .send(TransportCommand::RestoreSavedState)
        .await
        .unwrap();
    assert_eq!(session.handle.queue().borrow().current_index, 1);

    session.handle.send(TransportCommand::Play).await.unwrap();
    wait_playing(&session, "y").await;
    assert_eq!(
        session.engine.calls(),
        vec![
            Call::Prepare("y".into()),
            Call::Seek(Duration::from_secs(42)),
            Call::Play
        ]
    );
}

#[tokio::test]
async fn test_corrupt_saved_session_restores_nothing() {
    let session = Builder::new(&["x"])
        .store(MemorySessionStore::with_contents("{ broken"))
        .spawn();

    let outcome = session
        .handle
        .send(TransportCommand::RestoreSavedState)
        .await
        .unwrap();
    assert_eq!(outcome, CommandOutcome::Applied);
    assert!(session.handle.queue().borrow().is_empty());
}

#[tokio::test]
async fn test_warm_reconnect_follows_running_engine() {
    let engine = FakeEngine::new();
    engine.set_live("b", EngineStatus::Playing);
    let session = Builder::new(&["a", "b"]).engine(engine).spawn();

    session
        .handle
        .send(TransportCommand::RestoreSavedState)
        .await
        .unwrap();

    let queue = session.handle.queue().borrow().clone();
    assert_eq!(queue.current_audio().unwrap().id, AudioId::from("b"));
    let transport = session.handle.transport().borrow().clone();
    assert_eq!(transport.current, Some("b".into()));
    assert_eq!(transport.status, EngineStatus::Playing);
    assert!(session.engine.prepared().is_empty());
}

#[tokio::test]
async fn test_queue_changes_are_persisted() {
    let session = Builder::new(&["a", "b", "c"]).spawn();
    play_from(&session, "b", &["a", "b", "c"]).await;

    let saved = SavedSession::decode(&session.store.contents().unwrap()).unwrap();
    assert_eq!(saved.ids, ids(&["a", "b", "c"]));
    assert_eq!(saved.current_id, Some("b".into()));
    assert_eq!(saved.source, QueueSource::Album);
    assert_eq!(saved.title.as_deref(), Some("Album"));
}

#[tokio::test]
async fn test_shutdown_closes_session() {
    let session = Builder::new(&["a"]).spawn();
    play_from(&session, "a", &["a"]).await;
    wait_playing(&session, "a").await;

    session.handle.shutdown().await.unwrap();
    assert!(session.handle.is_closed());
    assert!(!session.handle.transport().borrow().connected);

    let err = session
        .handle
        .send(TransportCommand::Play)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SessionClosed));
    assert!(session.store.contents().is_some());
}
