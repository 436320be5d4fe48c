// Integration tests for the recording session state machine
//
// A scripted engine stands in for the encoder so every acknowledgement,
// segment and error can be placed exactly.

mod common;

use anyhow::Result;
use common::{scripted_session, SCRIPTED_MIME};
use std::time::Duration;
use stream_captor::{
    EngineError, EngineErrorPolicy, EngineState, LogLevel, RecorderOptions, RecorderState,
    SessionError,
};

fn force_stop() -> RecorderOptions {
    RecorderOptions {
        engine_error_policy: EngineErrorPolicy::ForceStop,
        ..RecorderOptions::default()
    }
}

#[tokio::test]
async fn test_artifact_concatenates_non_empty_segments() -> Result<()> {
    let (mut session, engine, _logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    engine.emit_data(1, 0);
    engine.emit_data(2, 10);
    engine.emit_data(3, 20);
    engine.emit_data(4, 0);
    engine.emit_data(5, 5);

    let artifact = session.stop().await?;

    assert_eq!(artifact.len(), 35);
    assert_eq!(artifact.segment_count(), 3);
    assert_eq!(artifact.mime_type(), SCRIPTED_MIME);
    assert!(artifact.data()[..10].iter().all(|b| *b == 2));
    assert!(artifact.data()[10..30].iter().all(|b| *b == 3));
    assert!(artifact.data()[30..].iter().all(|b| *b == 5));
    assert_eq!(session.state(), RecorderState::Stopped);

    Ok(())
}

#[tokio::test]
async fn test_double_start_transitions_once() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    session.start();

    assert_eq!(session.process_events(), RecorderState::Recording);
    assert_eq!(engine.call_count("start"), 1, "engine should be started once");
    assert!(logs.contains(LogLevel::Info, "start() called while engine is not inactive"));

    let started = logs
        .records()
        .iter()
        .filter(|r| r.message == "recording engine started")
        .count();
    assert_eq!(started, 1);

    Ok(())
}

#[tokio::test]
async fn test_pause_and_resume_out_of_state_are_noops() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), true);

    // Idle: neither request reaches the engine
    session.pause();
    session.resume();
    assert!(engine.calls().is_empty());
    assert_eq!(session.process_events(), RecorderState::Idle);

    // Recording: resume is ignored
    session.start();
    session.resume();
    assert_eq!(session.process_events(), RecorderState::Recording);
    assert_eq!(engine.calls(), vec!["start"]);

    assert_eq!(logs.count(LogLevel::Error), 0);
    Ok(())
}

#[tokio::test]
async fn test_pause_resume_cycle() -> Result<()> {
    let (mut session, engine, _logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    session.pause();
    assert_eq!(session.process_events(), RecorderState::Paused);

    // Paused: pause again is ignored
    session.pause();
    session.resume();
    assert_eq!(session.process_events(), RecorderState::Recording);
    assert_eq!(engine.calls(), vec!["start", "pause", "resume"]);

    session.pause();
    let artifact = session.stop().await?;
    assert!(artifact.is_empty());
    assert_eq!(session.state(), RecorderState::Stopped);

    Ok(())
}

#[tokio::test]
async fn test_state_follows_acknowledgements_only() -> Result<()> {
    let (mut session, engine, _logs) = scripted_session(RecorderOptions::default(), false);

    session.start();
    assert_eq!(engine.calls(), vec!["start"]);
    assert_eq!(session.process_events(), RecorderState::Idle);

    engine.ack_started();
    assert_eq!(session.process_events(), RecorderState::Recording);

    Ok(())
}

#[tokio::test]
async fn test_unexpected_acknowledgement_is_ignored() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), false);

    engine.ack_paused();
    engine.ack_resumed();

    assert_eq!(session.process_events(), RecorderState::Idle);
    assert_eq!(logs.count(LogLevel::Warn), 2);

    Ok(())
}

#[tokio::test]
async fn test_stop_from_idle_is_rejected() -> Result<()> {
    let (mut session, engine, _logs) = scripted_session(RecorderOptions::default(), true);

    let result = session.stop().await;

    assert_eq!(result.unwrap_err(), SessionError::NotRecording(RecorderState::Idle));
    assert!(engine.calls().is_empty());
    assert!(session.artifact().is_none());

    Ok(())
}

#[tokio::test]
async fn test_second_stop_returns_same_artifact() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    engine.emit_data(9, 12);

    let first = session.stop().await?;
    let second = session.stop().await?;

    assert_eq!(first.data(), second.data());
    assert_eq!(first.created_at(), second.created_at());
    assert_eq!(engine.call_count("stop"), 1);
    assert!(logs.contains(LogLevel::Info, "stop() after completion"));

    Ok(())
}

#[tokio::test]
async fn test_start_after_stop_is_ignored() -> Result<()> {
    let (mut session, engine, _logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    session.stop().await?;
    session.start();

    assert_eq!(engine.call_count("start"), 1);
    assert_eq!(session.process_events(), RecorderState::Stopped);

    Ok(())
}

#[tokio::test]
async fn test_stop_waits_for_acknowledgement() -> Result<()> {
    let (mut session, engine, _logs) = scripted_session(RecorderOptions::default(), false);

    session.start();
    engine.ack_started();

    let late = engine.clone();
    let acker = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        late.emit_data(7, 3);
        late.ack_stopped();
    });

    let artifact = session.stop().await?;
    acker.await?;

    assert_eq!(artifact.data(), &[7, 7, 7]);
    assert_eq!(session.state(), RecorderState::Stopped);

    Ok(())
}

#[tokio::test]
async fn test_engine_closing_channel_fails_stop() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), false);

    session.start();
    engine.ack_started();
    session.process_events();
    engine.close();

    let result = session.stop().await;

    assert_eq!(result.unwrap_err(), SessionError::EngineClosed);
    assert!(logs.contains(LogLevel::Error, "event channel closed"));

    Ok(())
}

#[tokio::test]
async fn test_engine_stopping_itself_finalizes() -> Result<()> {
    let (mut session, engine, _logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    engine.emit_data(1, 4);
    engine.set_state(EngineState::Inactive);
    engine.ack_stopped();

    assert_eq!(session.process_events(), RecorderState::Stopped);
    assert_eq!(session.artifact().map(|a| a.len()), Some(4));

    let artifact = session.stop().await?;
    assert_eq!(artifact.len(), 4);
    assert_eq!(engine.call_count("stop"), 0);

    Ok(())
}

#[tokio::test]
async fn test_stop_after_engine_went_inactive_returns_artifact() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    session.process_events();
    engine.emit_data(3, 6);
    // Track ends between the session's event pass and its state check
    engine.stop_itself_during("state");

    let artifact = session.stop().await?;

    assert_eq!(artifact.data(), &[3; 6]);
    assert_eq!(session.state(), RecorderState::Stopped);
    assert_eq!(engine.call_count("stop"), 0);
    assert!(logs.contains(LogLevel::Info, "engine stopped on its own"));
    assert!(!logs.contains(LogLevel::Warn, "not recording"));

    Ok(())
}

#[tokio::test]
async fn test_stop_rejected_by_self_stopped_engine_returns_artifact() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    engine.emit_data(5, 2);
    // Engine still reports recording, then stops itself and rejects the request
    engine.stop_itself_during("stop");

    let artifact = session.stop().await?;

    assert_eq!(artifact.data(), &[5, 5]);
    assert_eq!(session.state(), RecorderState::Stopped);
    assert_eq!(engine.call_count("stop"), 1);
    assert_eq!(logs.count(LogLevel::Error), 0);

    // The artifact is final; a later stop hands back the same bytes
    assert_eq!(session.stop().await?.data(), artifact.data());

    Ok(())
}

#[tokio::test]
async fn test_inactive_engine_without_acknowledgement_fails_stop() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), false);

    session.start();
    engine.ack_started();
    session.process_events();
    // Engine went inactive but never sent its stop acknowledgement
    engine.set_state(EngineState::Inactive);

    let result = session.stop().await;

    assert_eq!(
        result.unwrap_err(),
        SessionError::NotRecording(RecorderState::Recording)
    );
    assert!(session.artifact().is_none());
    assert!(logs.contains(LogLevel::Warn, "not recording"));

    Ok(())
}

#[tokio::test]
async fn test_engine_error_is_logged_only_by_default() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    engine.emit_data(1, 4);
    engine.fail(EngineError::Encoder("frame dropped".to_string()));

    assert_eq!(session.process_events(), RecorderState::Recording);
    assert!(logs.contains(LogLevel::Error, "recording engine error"));

    engine.emit_data(2, 6);
    let artifact = session.stop().await?;
    assert_eq!(artifact.len(), 10);

    Ok(())
}

#[tokio::test]
async fn test_engine_error_force_stop_finalizes() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(force_stop(), true);

    session.start();
    engine.emit_data(1, 4);
    engine.fail(EngineError::Device("microphone unplugged".to_string()));

    assert_eq!(session.process_events(), RecorderState::Stopped);
    assert_eq!(session.artifact().map(|a| a.len()), Some(4));
    assert_eq!(engine.call_count("stop"), 1, "active engine should be stopped");
    assert!(logs.contains(LogLevel::Error, "recording engine error"));

    let artifact = session.stop().await?;
    assert_eq!(artifact.len(), 4);
    assert_eq!(session.process_events(), RecorderState::Stopped);

    Ok(())
}

#[tokio::test]
async fn test_segments_after_finalize_are_dropped() -> Result<()> {
    let (mut session, engine, logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    engine.emit_data(1, 2);
    let artifact = session.stop().await?;

    engine.emit_data(2, 8);
    session.process_events();

    assert_eq!(artifact.len(), 2);
    assert_eq!(session.artifact().map(|a| a.len()), Some(2));
    assert!(logs.contains(LogLevel::Warn, "after the recording was finalized"));

    Ok(())
}

#[tokio::test]
async fn test_stats_track_segments() -> Result<()> {
    let (mut session, engine, _logs) = scripted_session(RecorderOptions::default(), true);

    assert_eq!(session.stats().state, RecorderState::Idle);
    assert!(session.stats().started_at.is_none());

    session.start();
    engine.emit_data(1, 3);
    engine.emit_data(2, 0);
    engine.emit_data(3, 5);
    session.process_events();

    let stats = session.stats();
    assert_eq!(stats.state, RecorderState::Recording);
    assert_eq!(stats.segment_count, 2);
    assert_eq!(stats.buffered_bytes, 8);
    assert!(stats.started_at.is_some());
    assert!(stats.session_id.starts_with("capture-"));

    Ok(())
}

#[tokio::test]
async fn test_session_never_stops_stream_tracks() -> Result<()> {
    let (mut session, _engine, _logs) = scripted_session(RecorderOptions::default(), true);

    session.start();
    session.stop().await?;

    assert!(session.stream().tracks().iter().all(|t| !t.is_ended()));
    Ok(())
}
