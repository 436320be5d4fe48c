use serde::{Deserialize, Serialize};
use std::fmt;

/// Sample layout of an audio signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Interleaved samples per millisecond
    pub fn samples_per_ms(&self) -> f64 {
        self.sample_rate as f64 * self.channels as f64 / 1000.0
    }

    /// Number of interleaved samples covering `duration_ms`, rounded down to whole frames
    pub fn samples_for(&self, duration_ms: u64) -> usize {
        let frames = self.sample_rate as u64 * duration_ms / 1000;
        frames as usize * self.channels as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz/{}ch", self.sample_rate, self.channels)
    }
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the producing track started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, format: AudioFormat, timestamp_ms: u64) -> Self {
        Self {
            samples,
            sample_rate: format.sample_rate,
            channels: format.channels,
            timestamp_ms,
        }
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }

    /// Duration covered by this frame, in milliseconds
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.format().samples_per_ms()
    }
}
