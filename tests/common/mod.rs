// Shared helpers for integration tests
//
// `ScriptedEngine` is a recording engine whose acknowledgements and segments
// are driven by the test through a `ScriptHandle`. With `auto_ack` enabled it
// confirms every request immediately, the way a well-behaved engine would.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use stream_captor::{
    CaptureLogger, EngineError, EngineState, EventSink, MemorySink, RecorderOptions,
    RecordingEngine, RecordingSession, StreamHandle, Track,
};

pub const SCRIPTED_MIME: &str = "video/webm;codecs=vp8,opus";

struct Script {
    state: EngineState,
    auto_ack: bool,
    calls: Vec<&'static str>,
    sink: Option<EventSink>,
    /// Engine call during which the engine stops by itself first
    stops_itself_during: Option<&'static str>,
}

impl Script {
    /// Acknowledge a stop nobody asked for, the way an engine whose track ended does
    fn stop_itself_if_due(&mut self, call: &'static str) {
        if self.stops_itself_during != Some(call) {
            return;
        }
        self.stops_itself_during = None;
        self.state = EngineState::Inactive;
        if let Some(sink) = self.sink.as_ref() {
            sink.stopped();
        }
    }
}

/// Test side of a scripted engine
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptHandle {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn with_sink(&self, f: impl FnOnce(&EventSink)) {
        if let Some(sink) = self.lock().sink.as_ref() {
            f(sink);
        }
    }

    /// Emit a segment of `len` bytes, all set to `fill`
    pub fn emit_data(&self, fill: u8, len: usize) {
        self.with_sink(|sink| {
            sink.data(vec![fill; len]);
        });
    }

    pub fn ack_started(&self) {
        self.with_sink(|sink| {
            sink.started();
        });
    }

    pub fn ack_paused(&self) {
        self.with_sink(|sink| {
            sink.paused();
        });
    }

    pub fn ack_resumed(&self) {
        self.with_sink(|sink| {
            sink.resumed();
        });
    }

    pub fn ack_stopped(&self) {
        self.with_sink(|sink| {
            sink.stopped();
        });
    }

    pub fn fail(&self, error: EngineError) {
        self.with_sink(|sink| {
            sink.error(error);
        });
    }

    /// Change the engine-reported state without acknowledging anything
    pub fn set_state(&self, state: EngineState) {
        self.lock().state = state;
    }

    /// Make the engine stop by itself just before it handles `call`
    /// (`"state"` or `"stop"`)
    pub fn stop_itself_during(&self, call: &'static str) {
        self.lock().stops_itself_during = Some(call);
    }

    /// Drop the engine's event sink, closing the session's event channel
    pub fn close(&self) {
        self.lock().sink = None;
    }

    /// Requests the session issued, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == name).count()
    }
}

/// Engine half; owned by the session
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    fn request(
        &mut self,
        name: &'static str,
        allowed: &[EngineState],
        next: EngineState,
        ack: fn(&EventSink) -> bool,
    ) -> Result<(), EngineError> {
        let mut script = self.script.lock().unwrap();
        script.stop_itself_if_due(name);
        script.calls.push(name);
        if !allowed.contains(&script.state) {
            return Err(EngineError::InvalidState(format!(
                "{} while {}",
                name, script.state
            )));
        }
        script.state = next;
        if script.auto_ack {
            if let Some(sink) = script.sink.as_ref() {
                ack(sink);
            }
        }
        Ok(())
    }
}

impl RecordingEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn mime_type(&self) -> String {
        SCRIPTED_MIME.to_string()
    }

    fn state(&self) -> EngineState {
        let mut script = self.script.lock().unwrap();
        script.stop_itself_if_due("state");
        script.state
    }

    fn start(&mut self) -> Result<(), EngineError> {
        self.request(
            "start",
            &[EngineState::Inactive],
            EngineState::Recording,
            EventSink::started,
        )
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.request(
            "pause",
            &[EngineState::Recording],
            EngineState::Paused,
            EventSink::paused,
        )
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        self.request(
            "resume",
            &[EngineState::Paused],
            EngineState::Recording,
            EventSink::resumed,
        )
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.request(
            "stop",
            &[EngineState::Recording, EngineState::Paused],
            EngineState::Inactive,
            EventSink::stopped,
        )
    }
}

/// A display-like stream: one video track and one (silent) audio track
pub fn display_stream() -> StreamHandle {
    let (audio, _feed) = Track::audio("system audio", Default::default());
    StreamHandle::from_tracks([Track::video("screen"), audio])
}

/// Build a session over a scripted engine
///
/// Returns the session, the script handle and the sink holding every log record.
pub fn scripted_session(
    options: RecorderOptions,
    auto_ack: bool,
) -> (RecordingSession<ScriptedEngine>, ScriptHandle, MemorySink) {
    let logs = MemorySink::new();
    let logger = CaptureLogger::new(logs.clone());
    let script = Arc::new(Mutex::new(Script {
        state: EngineState::Inactive,
        auto_ack,
        calls: Vec::new(),
        sink: None,
        stops_itself_during: None,
    }));

    let engine_script = Arc::clone(&script);
    let session = RecordingSession::new(display_stream(), options, logger, move |_, _, sink| {
        engine_script.lock().unwrap().sink = Some(sink);
        Ok(ScriptedEngine {
            script: engine_script,
        })
    })
    .unwrap();

    (session, ScriptHandle { script }, logs)
}
