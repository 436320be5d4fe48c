//! Recording session management
//!
//! This module provides the `RecordingSession` state machine that:
//! - Validates start/pause/resume/stop against the engine's reported state
//! - Applies engine acknowledgements through a single transition table
//! - Buffers emitted segments in order and produces the final artifact

mod config;
mod session;
mod state;
mod stats;

pub use config::{EngineErrorPolicy, RecorderOptions};
pub use session::RecordingSession;
pub use state::RecorderState;
pub use stats::SessionStats;
