use std::f32::consts::PI;
use std::time::Duration;
use tracing::{debug, info};

use super::CaptureSource;
use crate::error::AcquisitionError;
use crate::media::{AudioFormat, AudioFrame, StreamHandle, Track, TrackFeed};

const SYSTEM_TONE_HZ: f32 = 440.0;
const MICROPHONE_TONE_HZ: f32 = 660.0;
const TONE_AMPLITUDE: f32 = 0.25;

/// Capture source that synthesizes its media
///
/// The display stream carries a video track and (optionally) a 440 Hz "system
/// audio" tone; the microphone stream carries a 660 Hz tone. Audio is paced in
/// real time and stops when its track ends. Frames published while nobody is
/// subscribed are lost, like a live device.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    format: AudioFormat,
    frame_ms: u64,
    system_audio: bool,
    deny_display: bool,
    deny_microphone: bool,
}

impl SyntheticCapture {
    pub fn new(format: AudioFormat, frame_ms: u64) -> Self {
        Self {
            format,
            frame_ms: frame_ms.max(1),
            system_audio: true,
            deny_display: false,
            deny_microphone: false,
        }
    }

    /// Include a system audio track in the display stream
    pub fn with_system_audio(mut self, enabled: bool) -> Self {
        self.system_audio = enabled;
        self
    }

    /// Refuse screen sharing requests
    pub fn deny_display(mut self, deny: bool) -> Self {
        self.deny_display = deny;
        self
    }

    /// Refuse microphone requests
    pub fn deny_microphone(mut self, deny: bool) -> Self {
        self.deny_microphone = deny;
        self
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    fn tone_track(&self, label: &str, frequency: f32) -> Result<Track, AcquisitionError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AcquisitionError::Unavailable(format!("{} (no runtime)", label)))?;

        let (track, feed) = Track::audio(label, self.format);
        runtime.spawn(generate_tone(feed, self.format, self.frame_ms, frequency));
        Ok(track)
    }
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new(AudioFormat::default(), 20)
    }
}

#[async_trait::async_trait]
impl CaptureSource for SyntheticCapture {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn acquire_display(&self) -> Result<StreamHandle, AcquisitionError> {
        if self.deny_display {
            return Err(AcquisitionError::Denied("screen sharing".to_string()));
        }

        let mut stream = StreamHandle::new();
        stream.add_track(Track::video("synthetic display"));
        if self.system_audio {
            stream.add_track(self.tone_track("system audio", SYSTEM_TONE_HZ)?);
        }

        info!(
            "Display acquired: {} video, {} audio track(s)",
            stream.video_tracks().len(),
            stream.audio_tracks().len()
        );
        Ok(stream)
    }

    async fn acquire_microphone(&self) -> Result<StreamHandle, AcquisitionError> {
        if self.deny_microphone {
            return Err(AcquisitionError::Denied("microphone".to_string()));
        }

        let track = self.tone_track("microphone", MICROPHONE_TONE_HZ)?;
        info!("Microphone acquired ({})", self.format);
        Ok(StreamHandle::from_tracks([track]))
    }
}

/// Push sine frames into `feed` every `frame_ms` until the track ends
async fn generate_tone(feed: TrackFeed, format: AudioFormat, frame_ms: u64, frequency: f32) {
    let frames_per_tick = format.samples_for(frame_ms) / format.channels.max(1) as usize;
    let channels = format.channels.max(1) as usize;
    let step = 2.0 * PI * frequency / format.sample_rate as f32;

    let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
    let mut phase = 0.0f32;
    let mut timestamp_ms = 0u64;

    loop {
        ticker.tick().await;

        let mut samples = Vec::with_capacity(frames_per_tick * channels);
        for _ in 0..frames_per_tick {
            let value = (phase.sin() * TONE_AMPLITUDE * i16::MAX as f32) as i16;
            samples.extend(std::iter::repeat(value).take(channels));
            phase = (phase + step) % (2.0 * PI);
        }

        if !feed.push(AudioFrame::new(samples, format, timestamp_ms)) {
            break;
        }
        timestamp_ms += frame_ms;
    }

    debug!("Tone generator for {} stopped", feed.track().label());
}
