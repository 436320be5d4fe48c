// Audio mixer for combining the audio of several capture streams
//
// Every audio track of every input stream is routed through its own
// source/gain pair into one shared destination. A track that cannot join the
// graph is logged and skipped; the rest are still mixed. Video is taken by
// reference from the first (primary) stream.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::graph::{MixContext, DEFAULT_MAX_BUFFER_DELAY_MS};
use crate::error::MixError;
use crate::logging::CaptureLogger;
use crate::media::{AudioFormat, StreamHandle, Track};

/// Configuration for audio mixer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerConfig {
    /// Format of the mix context; inputs must match it
    pub format: AudioFormat,
    /// Gain applied to every input (1.0 = pass-through)
    pub gain: f32,
    /// Maximum buffering delay in milliseconds (default: 200ms)
    /// An input that falls further behind is mixed as silence instead of
    /// holding back the others
    pub max_buffer_delay_ms: u64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            gain: 1.0,
            max_buffer_delay_ms: DEFAULT_MAX_BUFFER_DELAY_MS,
        }
    }
}

/// Combines the audio tracks of several streams into one track
pub struct AudioMixer {
    config: MixerConfig,
    logger: CaptureLogger,
}

impl AudioMixer {
    pub fn new(config: MixerConfig, logger: CaptureLogger) -> Self {
        info!(
            "Audio mixer initialized: {}, gain {}, max buffer delay {}ms",
            config.format, config.gain, config.max_buffer_delay_ms
        );
        Self { config, logger }
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Mix the audio of `streams` into a new stream
    ///
    /// The result carries the video tracks of `streams[0]` and a single mixed
    /// audio track. Input tracks are never stopped here; their owner stays
    /// responsible for them. Stopping the mixed audio track releases the graph.
    pub fn mix(&self, streams: &[StreamHandle]) -> Result<StreamHandle, MixError> {
        let primary = streams
            .first()
            .ok_or_else(|| MixError::InvalidArgument("no streams to mix".to_string()))?;

        let mut context = MixContext::new(self.config.format, self.logger.clone())
            .with_max_buffer_delay(self.config.max_buffer_delay_ms);

        for (idx, stream) in streams.iter().enumerate() {
            for track in stream.audio_tracks() {
                match self.connect_track(&mut context, &track) {
                    Ok(()) => {
                        self.logger.info_with(
                            "connected track to mix context",
                            json!({ "idx": idx, "track": track.id().to_string(), "label": track.label() }),
                        );
                    }
                    Err(e) => {
                        self.logger.error_with(
                            "failed to connect track to mix context",
                            json!({ "idx": idx, "track": track.id().to_string(), "error": e.to_string() }),
                        );
                    }
                }
            }
        }

        let mut mixed = StreamHandle::new();

        let video = primary.video_tracks();
        if video.is_empty() {
            self.logger.warn_with(
                "primary stream has no video track; mixed stream is audio-only",
                json!({ "stream": primary.id().to_string() }),
            );
        }
        for track in video {
            mixed.add_track(track);
        }

        let connected = context.input_count();
        let audio = context.start()?;
        mixed.add_track(audio);

        self.logger.info_with(
            "mixed streams with audio context",
            json!({
                "inputs": streams.len(),
                "connectedTracks": connected,
                "videoTracks": mixed.video_tracks().len(),
                "audioTracks": mixed.audio_tracks().len(),
            }),
        );

        Ok(mixed)
    }

    fn connect_track(&self, context: &mut MixContext, track: &Track) -> Result<(), MixError> {
        let single = StreamHandle::from_tracks([track.clone()]);
        let source = context.create_source(&single)?;
        let gain = context.create_gain(source, self.config.gain)?;
        context.connect(gain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemorySink};

    fn mixer(sink: &MemorySink) -> AudioMixer {
        AudioMixer::new(MixerConfig::default(), CaptureLogger::new(sink.clone()))
    }

    #[test]
    fn test_mixer_config_default() {
        let config = MixerConfig::default();
        assert_eq!(config.format.sample_rate, 48000);
        assert_eq!(config.format.channels, 2);
        assert_eq!(config.gain, 1.0);
        assert_eq!(config.max_buffer_delay_ms, 200);
    }

    #[test]
    fn test_mix_empty_is_invalid_argument() {
        let sink = MemorySink::new();
        let result = mixer(&sink).mix(&[]);
        assert!(matches!(result, Err(MixError::InvalidArgument(_))));
    }

    #[test]
    fn test_video_only_stream_needs_no_runtime() {
        // Nothing to render, so no task is spawned
        let sink = MemorySink::new();
        let screen = StreamHandle::from_tracks([Track::video("screen")]);

        let mixed = mixer(&sink).mix(&[screen]).unwrap();

        assert_eq!(mixed.video_tracks().len(), 1);
        assert_eq!(mixed.audio_tracks().len(), 1);
        assert!(sink.contains(LogLevel::Warn, "silent"));
    }
}
