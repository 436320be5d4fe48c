use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use super::config::{EngineErrorPolicy, RecorderOptions};
use super::state::RecorderState;
use super::stats::SessionStats;
use crate::artifact::{Artifact, BinarySegment};
use crate::engine::{
    engine_channel, EngineAck, EngineEvent, EngineEvents, EngineState, EventSink, RecordingEngine,
};
use crate::error::{EngineError, SessionError};
use crate::logging::CaptureLogger;
use crate::media::StreamHandle;

/// A recording session that drives one engine over one stream
///
/// Requests are checked against the state the engine reports; illegal ones are
/// logged and ignored. The session's own state only moves when the engine
/// acknowledges a transition. Acknowledgements and segments are queued by the
/// engine and applied here, in order, whenever the session is used.
pub struct RecordingSession<E: RecordingEngine> {
    /// Session configuration
    options: RecorderOptions,

    /// Stream being recorded (shared, never stopped by the session)
    stream: StreamHandle,

    engine: E,

    /// Acknowledgements, segments and errors from the engine
    events: EngineEvents,

    state: RecorderState,

    /// Non-empty segments in emission order
    segments: Vec<BinarySegment>,

    /// Set exactly once, when the recording is finalized
    artifact: Option<Artifact>,

    /// Whether `stop()` already asked the engine to stop
    stop_requested: bool,

    started_at: Option<DateTime<Utc>>,

    stopped_at: Option<DateTime<Utc>>,

    logger: CaptureLogger,
}

impl<E: RecordingEngine> RecordingSession<E> {
    /// Create a session, building the engine with a fresh event channel
    pub fn new<F>(
        stream: StreamHandle,
        options: RecorderOptions,
        logger: CaptureLogger,
        open: F,
    ) -> Result<Self, SessionError>
    where
        F: FnOnce(&StreamHandle, &RecorderOptions, EventSink) -> Result<E, EngineError>,
    {
        let (sink, events) = engine_channel();
        let engine = match open(&stream, &options, sink) {
            Ok(engine) => engine,
            Err(e) => {
                logger.error_with(
                    "failed to create recording engine",
                    json!({ "session": options.session_id, "error": e.to_string() }),
                );
                return Err(e.into());
            }
        };

        Ok(Self::with_engine(stream, engine, events, options, logger))
    }

    /// Create a session around an engine already wired to `events`
    pub fn with_engine(
        stream: StreamHandle,
        engine: E,
        events: EngineEvents,
        options: RecorderOptions,
        logger: CaptureLogger,
    ) -> Self {
        logger.info_with(
            "creating recording session",
            json!({
                "session": options.session_id,
                "engine": engine.name(),
                "videoTracks": stream.video_tracks().len(),
                "audioTracks": stream.audio_tracks().len(),
            }),
        );

        Self {
            options,
            stream,
            engine,
            events,
            state: RecorderState::Idle,
            segments: Vec::new(),
            artifact: None,
            stop_requested: false,
            started_at: None,
            stopped_at: None,
            logger,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.options.session_id
    }

    /// State as of the last applied acknowledgement
    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    pub fn stream(&self) -> &StreamHandle {
        &self.stream
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The finished recording, once the session has stopped
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Apply every queued engine event and return the resulting state
    pub fn process_events(&mut self) -> RecorderState {
        while let Some(event) = self.events.try_next() {
            self.apply(event);
        }
        self.state
    }

    /// Ask the engine to start. Ignored unless the engine is inactive.
    pub fn start(&mut self) {
        self.process_events();
        self.logger.info("recorder.start()");

        if self.state.is_terminal() {
            self.logger.info_with(
                "start() ignored: session already stopped",
                json!({ "session": self.options.session_id }),
            );
            return;
        }

        let engine_state = self.engine.state();
        if engine_state != EngineState::Inactive {
            self.logger.info_with(
                "start() called while engine is not inactive",
                json!({ "state": engine_state.to_string() }),
            );
            return;
        }

        if let Err(e) = self.engine.start() {
            self.logger.error_with(
                "recording engine rejected start",
                json!({ "error": e.to_string() }),
            );
        }
    }

    /// Ask the engine to pause. Ignored unless it is recording.
    pub fn pause(&mut self) {
        self.process_events();

        let engine_state = self.engine.state();
        if engine_state != EngineState::Recording {
            self.logger.info_with(
                "pause() ignored: engine is not recording",
                json!({ "state": engine_state.to_string() }),
            );
            return;
        }

        self.logger.info("recorder.pause()");
        if let Err(e) = self.engine.pause() {
            self.logger.error_with(
                "recording engine rejected pause",
                json!({ "error": e.to_string() }),
            );
        }
    }

    /// Ask the engine to resume. Ignored unless it is paused.
    pub fn resume(&mut self) {
        self.process_events();

        let engine_state = self.engine.state();
        if engine_state != EngineState::Paused {
            self.logger.info_with(
                "resume() ignored: engine is not paused",
                json!({ "state": engine_state.to_string() }),
            );
            return;
        }

        self.logger.info("recorder.resume()");
        if let Err(e) = self.engine.resume() {
            self.logger.error_with(
                "recording engine rejected resume",
                json!({ "error": e.to_string() }),
            );
        }
    }

    /// Stop recording and wait for the engine to flush
    ///
    /// Resolves with the concatenation of every non-empty segment, in emission
    /// order. Once finished, further calls return the same artifact. The tracks
    /// of the recorded stream are not stopped.
    pub async fn stop(&mut self) -> Result<Artifact, SessionError> {
        self.process_events();
        self.logger.info("recorder.stop()");

        if let Some(artifact) = &self.artifact {
            self.logger.info_with(
                "stop() after completion; returning finished artifact",
                json!({ "bytes": artifact.len() }),
            );
            return Ok(artifact.clone());
        }

        if !self.stop_requested {
            let engine_state = self.engine.state();
            if engine_state == EngineState::Inactive {
                if let Some(artifact) = self.stopped_on_its_own() {
                    return Ok(artifact);
                }
                self.logger.warn_with(
                    "stop() ignored: engine is not recording",
                    json!({ "state": self.state.to_string() }),
                );
                return Err(SessionError::NotRecording(self.state));
            }

            if let Err(e) = self.engine.stop() {
                if let Some(artifact) = self.stopped_on_its_own() {
                    return Ok(artifact);
                }
                self.logger.error_with(
                    "recording engine rejected stop",
                    json!({ "error": e.to_string() }),
                );
                return Err(e.into());
            }
            self.stop_requested = true;
        }

        loop {
            if let Some(artifact) = &self.artifact {
                return Ok(artifact.clone());
            }

            match self.events.next().await {
                Some(event) => self.apply(event),
                None => {
                    self.logger.error("engine event channel closed before stop was acknowledged");
                    return Err(SessionError::EngineClosed);
                }
            }
        }
    }

    /// The engine may have stopped between the last event pass and the stop
    /// request; its `Stopped` acknowledgement is queued before it reports
    /// inactive, so one more pass picks up the artifact.
    fn stopped_on_its_own(&mut self) -> Option<Artifact> {
        self.process_events();
        let artifact = self.artifact.as_ref()?;
        self.logger.info_with(
            "engine stopped on its own; returning finished artifact",
            json!({ "bytes": artifact.len() }),
        );
        Some(artifact.clone())
    }

    /// Current statistics
    pub fn stats(&self) -> SessionStats {
        let (segment_count, buffered_bytes) = match &self.artifact {
            Some(artifact) => (artifact.segment_count(), artifact.len()),
            None => (
                self.segments.len(),
                self.segments.iter().map(|s| s.len()).sum(),
            ),
        };

        let duration_secs = match self.started_at {
            Some(started) => {
                let end = self.stopped_at.unwrap_or_else(Utc::now);
                end.signed_duration_since(started).num_milliseconds() as f64 / 1000.0
            }
            None => 0.0,
        };

        SessionStats {
            session_id: self.options.session_id.clone(),
            state: self.state,
            started_at: self.started_at,
            duration_secs,
            segment_count,
            buffered_bytes,
        }
    }

    fn apply(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Data(segment) => self.push_segment(segment),
            EngineEvent::Ack(ack) => self.acknowledge(ack),
            EngineEvent::Error(error) => self.engine_error(error),
        }
    }

    fn push_segment(&mut self, segment: BinarySegment) {
        if segment.is_empty() {
            debug!("Discarding empty segment");
            return;
        }

        if self.artifact.is_some() {
            self.logger.warn_with(
                "segment arrived after the recording was finalized; dropping it",
                json!({ "bytes": segment.len() }),
            );
            return;
        }

        self.segments.push(segment);
    }

    fn acknowledge(&mut self, ack: EngineAck) {
        let Some(next) = self.state.on_ack(ack) else {
            if self.state.is_terminal() {
                self.logger.info_with(
                    "engine acknowledgement after session stopped",
                    json!({ "ack": ack.to_string() }),
                );
            } else {
                self.logger.warn_with(
                    "ignoring engine acknowledgement with no transition",
                    json!({ "ack": ack.to_string(), "state": self.state.to_string() }),
                );
            }
            return;
        };

        self.logger.info_with(
            format!("recording engine {}", ack),
            json!({ "from": self.state.to_string(), "to": next.to_string() }),
        );
        self.state = next;

        match ack {
            EngineAck::Started => self.started_at = Some(Utc::now()),
            EngineAck::Stopped => self.finalize(),
            EngineAck::Paused | EngineAck::Resumed => {}
        }
    }

    fn engine_error(&mut self, error: EngineError) {
        self.logger.error_with(
            "recording engine error",
            json!({ "error": error.to_string(), "state": self.state.to_string() }),
        );

        if self.options.engine_error_policy != EngineErrorPolicy::ForceStop
            || self.state.is_terminal()
        {
            return;
        }

        self.state = RecorderState::Stopped;
        self.finalize();

        if self.engine.state() != EngineState::Inactive {
            if let Err(e) = self.engine.stop() {
                self.logger.warn_with(
                    "engine did not accept stop after error",
                    json!({ "error": e.to_string() }),
                );
            }
        }
    }

    fn finalize(&mut self) {
        if self.artifact.is_some() {
            return;
        }

        let segments = std::mem::take(&mut self.segments);
        let artifact = Artifact::from_segments(&segments, self.engine.mime_type());
        self.stopped_at = Some(Utc::now());

        self.logger.info_with(
            "recording finalized",
            json!({
                "session": self.options.session_id,
                "bytes": artifact.len(),
                "segments": artifact.segment_count(),
                "mimeType": artifact.mime_type(),
            }),
        );

        self.artifact = Some(artifact);
    }
}
