pub mod artifact;
pub mod audio;
pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod media;
pub mod session;

pub use artifact::{Artifact, BinarySegment};
pub use audio::{AudioMixer, MixerConfig};
pub use capture::{acquire_mixed, CaptureSource, SyntheticCapture};
pub use config::Config;
pub use engine::{
    engine_channel, EngineAck, EngineEvent, EngineEvents, EngineState, EventSink, PcmEngine,
    RecordingEngine,
};
pub use error::{AcquisitionError, EngineError, Error, MixError, Result, SessionError};
pub use logging::{CaptureLogger, LogLevel, LogRecord, LogSink, MemorySink, TracingSink};
pub use media::{
    AggregateStream, AudioFormat, AudioFrame, StreamHandle, Track, TrackFeed, TrackKind,
    TrackOrigin,
};
pub use session::{
    EngineErrorPolicy, RecorderOptions, RecorderState, RecordingSession, SessionStats,
};
