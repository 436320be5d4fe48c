use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a session does when its engine reports an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineErrorPolicy {
    /// Log the error and keep the current state until an explicit stop
    #[default]
    #[serde(rename = "log")]
    LogOnly,
    /// Log the error, finalize what was recorded and move to `Stopped`
    #[serde(rename = "stop")]
    ForceStop,
}

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderOptions {
    /// Unique session identifier (e.g., "capture-6f1c...")
    pub session_id: String,

    /// Media type requested from the engine; `None` lets the engine choose
    pub mime_type: Option<String>,

    /// Segment cadence; `None` emits a single segment when recording stops
    pub timeslice: Option<Duration>,

    pub engine_error_policy: EngineErrorPolicy,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            session_id: format!("capture-{}", uuid::Uuid::new_v4()),
            mime_type: None,
            timeslice: None,
            engine_error_policy: EngineErrorPolicy::LogOnly,
        }
    }
}
