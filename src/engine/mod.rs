//! Recording engine abstraction
//!
//! An engine encodes a stream into binary segments. Requests (`start`, `pause`,
//! `resume`, `stop`) are issued synchronously and update the engine-reported
//! state at once; the engine confirms them later, together with every segment
//! it produces, by sending events through its [`EventSink`]. The owning session
//! drains those events in order.

pub mod pcm;

pub use pcm::PcmEngine;

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::artifact::BinarySegment;
use crate::error::EngineError;

/// State as reported by the engine itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Inactive,
    Recording,
    Paused,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Inactive => write!(f, "inactive"),
            EngineState::Recording => write!(f, "recording"),
            EngineState::Paused => write!(f, "paused"),
        }
    }
}

/// Confirmation of a requested transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineAck {
    Started,
    Paused,
    Resumed,
    Stopped,
}

impl fmt::Display for EngineAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineAck::Started => write!(f, "started"),
            EngineAck::Paused => write!(f, "paused"),
            EngineAck::Resumed => write!(f, "resumed"),
            EngineAck::Stopped => write!(f, "stopped"),
        }
    }
}

/// Notification emitted by an engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Ack(EngineAck),
    Data(BinarySegment),
    Error(EngineError),
}

/// Sending half handed to an engine
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub fn started(&self) -> bool {
        self.send(EngineEvent::Ack(EngineAck::Started))
    }

    pub fn paused(&self) -> bool {
        self.send(EngineEvent::Ack(EngineAck::Paused))
    }

    pub fn resumed(&self) -> bool {
        self.send(EngineEvent::Ack(EngineAck::Resumed))
    }

    pub fn stopped(&self) -> bool {
        self.send(EngineEvent::Ack(EngineAck::Stopped))
    }

    pub fn data(&self, bytes: Vec<u8>) -> bool {
        self.send(EngineEvent::Data(BinarySegment::new(bytes)))
    }

    pub fn error(&self, error: EngineError) -> bool {
        self.send(EngineEvent::Error(error))
    }

    /// Returns false when the session side is gone
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Receiving half owned by the session
#[derive(Debug)]
pub struct EngineEvents {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EngineEvents {
    /// Next queued event, without waiting
    pub fn try_next(&mut self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event; `None` once every sink has been dropped
    pub async fn next(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }
}

/// Create a connected sink/receiver pair
pub fn engine_channel() -> (EventSink, EngineEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, EngineEvents { rx })
}

/// Encoder that turns a stream into binary segments
pub trait RecordingEngine: Send {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Media type of the produced segments
    fn mime_type(&self) -> String;

    /// Current engine state; updated synchronously by requests
    fn state(&self) -> EngineState;

    fn start(&mut self) -> Result<(), EngineError>;

    fn pause(&mut self) -> Result<(), EngineError>;

    fn resume(&mut self) -> Result<(), EngineError>;

    /// Request a stop; the engine flushes, then acknowledges with `Stopped`
    fn stop(&mut self) -> Result<(), EngineError>;
}
