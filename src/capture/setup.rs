use serde_json::json;

use super::CaptureSource;
use crate::audio::AudioMixer;
use crate::error::Error;
use crate::logging::CaptureLogger;
use crate::media::AggregateStream;

/// Acquire the display and microphone and mix their audio into one stream
///
/// A display failure is returned as is. A microphone failure is logged and the
/// capture continues with the display stream alone. The returned aggregate
/// remembers the acquired streams so they can be stopped together.
pub async fn acquire_mixed(
    source: &dyn CaptureSource,
    mixer: &AudioMixer,
    logger: &CaptureLogger,
) -> Result<AggregateStream, Error> {
    let display = match source.acquire_display().await {
        Ok(stream) => stream,
        Err(e) => {
            logger.error_with(
                "failed to acquire display",
                json!({ "source": source.name(), "error": e.to_string() }),
            );
            return Err(e.into());
        }
    };

    let microphone = match source.acquire_microphone().await {
        Ok(stream) => stream,
        Err(e) => {
            logger.error_with(
                e.user_message(),
                json!({ "source": source.name(), "error": e.to_string() }),
            );
            logger.warn("continuing without microphone");
            return Ok(AggregateStream::passthrough(display));
        }
    };

    let mixed = match mixer.mix(&[display.clone(), microphone.clone()]) {
        Ok(stream) => stream,
        Err(e) => {
            logger.error_with("failed to mix capture streams", json!({ "error": e.to_string() }));
            display.stop_tracks();
            microphone.stop_tracks();
            return Err(e.into());
        }
    };

    logger.info_with(
        "capture stream ready",
        json!({
            "stream": mixed.id().to_string(),
            "videoTracks": mixed.video_tracks().len(),
            "audioTracks": mixed.audio_tracks().len(),
        }),
    );

    Ok(AggregateStream::new(mixed, vec![display, microphone]))
}
