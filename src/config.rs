use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::MixerConfig;
use crate::media::AudioFormat;
use crate::session::{EngineErrorPolicy, RecorderOptions};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub audio: AudioSettings,
    pub recorder: RecorderSettings,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u16,
    /// Length of each captured frame
    pub frame_ms: u64,
    pub gain: f32,
    /// How long the mixer waits for a quiet input before mixing it as silence
    pub max_buffer_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderSettings {
    /// Segment cadence; 0 means a single segment at stop
    pub timeslice_ms: Option<u64>,
    pub mime_type: Option<String>,
    pub engine_error_policy: EngineErrorPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Config {
    /// Load configuration from built-in defaults, the file at `path` (if it
    /// exists) and `CAPTOR__<SECTION>__<KEY>` environment variables, in that order
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("audio.sample_rate", 48_000)?
            .set_default("audio.channels", 2)?
            .set_default("audio.frame_ms", 20)?
            .set_default("audio.gain", 1.0)?
            .set_default("audio.max_buffer_delay_ms", 200)?
            .set_default("recorder.timeslice_ms", 1_000)?
            .set_default("recorder.engine_error_policy", "log")?
            .set_default("output.dir", "recordings")?
            .set_default("logging.filter", "info")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CAPTOR").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::new(self.audio.sample_rate, self.audio.channels)
    }

    pub fn mixer_config(&self) -> MixerConfig {
        MixerConfig {
            format: self.audio_format(),
            gain: self.audio.gain,
            max_buffer_delay_ms: self.audio.max_buffer_delay_ms,
        }
    }

    /// Session options with a fresh session id
    pub fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions {
            mime_type: self.recorder.mime_type.clone(),
            timeslice: self
                .recorder
                .timeslice_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
            engine_error_policy: self.recorder.engine_error_policy,
            ..RecorderOptions::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioSettings {
                sample_rate: 48_000,
                channels: 2,
                frame_ms: 20,
                gain: 1.0,
                max_buffer_delay_ms: 200,
            },
            recorder: RecorderSettings {
                timeslice_ms: Some(1_000),
                mime_type: None,
                engine_error_policy: EngineErrorPolicy::LogOnly,
            },
            output: OutputConfig {
                dir: PathBuf::from("recordings"),
            },
            logging: LoggingConfig {
                filter: "info".to_string(),
            },
        }
    }
}
