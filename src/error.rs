//! Error types
//!
//! Typed errors for the capture core. Application plumbing (config, file output,
//! the demo binary) uses `anyhow` on top of these.

use thiserror::Error;
use uuid::Uuid;

use crate::media::AudioFormat;
use crate::session::RecorderState;

/// Failure to obtain a capture source from the platform
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The user (or a policy) refused the permission prompt
    #[error("permission denied: {0}")]
    Denied(String),

    /// No compatible device, or the device could not be opened
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
}

impl AcquisitionError {
    /// Message suitable for showing to the person operating the capture
    pub fn user_message(&self) -> String {
        match self {
            AcquisitionError::Denied(what) => format!(
                "Permission to capture {} was denied. Allow access and try again.",
                what
            ),
            AcquisitionError::Unavailable(what) => format!(
                "No usable {} was found. Check that a device is connected and not in use.",
                what
            ),
        }
    }
}

/// Errors raised while building a mix graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("track {0} is not an audio track")]
    NotAudio(Uuid),

    #[error("track {0} has already ended")]
    TrackEnded(Uuid),

    #[error("a source node needs exactly one audio track, found {0}")]
    SourceTrackCount(usize),

    #[error("track format {actual} does not match mix context format {expected}")]
    FormatMismatch {
        expected: AudioFormat,
        actual: AudioFormat,
    },

    #[error("gain must be finite and non-negative, got {0}")]
    InvalidGain(f32),

    #[error("no Tokio runtime available to drive the mix graph")]
    NoRuntime,
}

/// Errors reported by a recording engine, either synchronously on a request
/// or asynchronously through its event sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("invalid engine state: {0}")]
    InvalidState(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("encoder error: {0}")]
    Encoder(String),
}

/// Errors returned by `RecordingSession`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("cannot stop a session that is not recording (state: {0})")]
    NotRecording(RecorderState),

    #[error("recording engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("recording engine closed its event channel before acknowledging stop")]
    EngineClosed,
}

/// Crate-wide error for flows that span acquisition, mixing and recording
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Mix(#[from] MixError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
