use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::RecorderState;

/// Statistics about a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub state: RecorderState,

    /// When the engine confirmed the start, if it has
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds between start confirmation and stop (or now, while running)
    pub duration_secs: f64,

    /// Non-empty segments retained so far
    pub segment_count: usize,

    /// Bytes retained so far
    pub buffered_bytes: usize,
}
