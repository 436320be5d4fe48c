//! Recorder state machine
//!
//! `on_ack` is the only place transitions are defined. The session applies
//! engine acknowledgements through it and never assigns states elsewhere,
//! apart from the forced stop of the hardened engine-error policy.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::EngineAck;

/// Current state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// Created, not started yet
    #[default]
    Idle,
    /// Engine confirmed it is recording
    Recording,
    /// Recording is paused
    Paused,
    /// Recording finished; terminal
    Stopped,
}

impl RecorderState {
    /// State after the engine acknowledges `ack`, or `None` if the
    /// acknowledgement has no transition from this state
    pub fn on_ack(self, ack: EngineAck) -> Option<RecorderState> {
        match (self, ack) {
            (RecorderState::Idle, EngineAck::Started) => Some(RecorderState::Recording),
            (RecorderState::Recording, EngineAck::Paused) => Some(RecorderState::Paused),
            (RecorderState::Paused, EngineAck::Resumed) => Some(RecorderState::Recording),
            (RecorderState::Recording | RecorderState::Paused, EngineAck::Stopped) => {
                Some(RecorderState::Stopped)
            }
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == RecorderState::Stopped
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "idle"),
            RecorderState::Recording => write!(f, "recording"),
            RecorderState::Paused => write!(f, "paused"),
            RecorderState::Stopped => write!(f, "stopped"),
        }
    }
}
