//! Capture sources
//!
//! A [`CaptureSource`] hands out live streams for the display (screen sharing,
//! optionally with system audio) and the microphone. [`acquire_mixed`] combines
//! them into the stream that gets recorded.

mod setup;
mod synthetic;

pub use setup::acquire_mixed;
pub use synthetic::SyntheticCapture;

use crate::error::AcquisitionError;
use crate::media::StreamHandle;

/// Platform capture source
///
/// Implementations:
/// - Synthetic: tone generators paced in real time (demo and tests)
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &str;

    /// Request screen sharing. The stream carries one video track and,
    /// when available, a system audio track.
    async fn acquire_display(&self) -> Result<StreamHandle, AcquisitionError>;

    /// Request the microphone. The stream carries one audio track.
    async fn acquire_microphone(&self) -> Result<StreamHandle, AcquisitionError>;
}
