// Built-in engine that records an audio track as raw L16 PCM
//
// The worker task subscribes to the track feed when the engine is opened so no
// frame published after that point is missed. While recording it appends
// big-endian samples to a pending buffer and cuts a segment every `timeslice`.
// While paused, incoming frames are dropped. On stop (or when the track ends)
// the remainder is flushed as a final segment, then `Stopped` is acknowledged.

use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{EngineState, EventSink, RecordingEngine};
use crate::error::EngineError;
use crate::media::{AudioFormat, AudioFrame, StreamHandle};
use crate::session::RecorderOptions;

enum Control {
    Pause,
    Resume,
    Stop,
}

/// Records the first audio track of a stream as `audio/L16`
///
/// Video tracks are not encoded.
pub struct PcmEngine {
    format: AudioFormat,
    /// Segment size in bytes, if segments are cut periodically
    slice_bytes: Option<usize>,
    receiver: Option<broadcast::Receiver<AudioFrame>>,
    sink: EventSink,
    state: Arc<Mutex<EngineState>>,
    control: Option<mpsc::UnboundedSender<Control>>,
    worker: Option<JoinHandle<()>>,
}

impl PcmEngine {
    /// Open an engine on `stream`
    ///
    /// Fails when the stream has no live audio track or a non-L16 media type
    /// was requested.
    pub fn open(
        stream: &StreamHandle,
        options: &RecorderOptions,
        sink: EventSink,
    ) -> Result<Self, EngineError> {
        if let Some(requested) = &options.mime_type {
            if !requested.trim().to_ascii_lowercase().starts_with("audio/l16") {
                return Err(EngineError::NotSupported(format!(
                    "PCM engine cannot produce {}",
                    requested
                )));
            }
        }

        let track = stream
            .audio_tracks()
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NotSupported("stream has no audio track".to_string()))?;

        let video = stream.video_tracks().len();
        if video > 0 {
            warn!(
                "PCM engine records audio only; {} video track(s) will not be encoded",
                video
            );
        }

        let format = track
            .format()
            .ok_or_else(|| EngineError::NotSupported("track carries no audio format".to_string()))?;
        let receiver = track
            .subscribe()
            .ok_or_else(|| EngineError::Device(format!("track {} has already ended", track.id())))?;

        let slice_bytes = options
            .timeslice
            .map(|t| format.samples_for(t.as_millis() as u64) * 2)
            .filter(|&bytes| bytes > 0);

        info!(
            "PCM engine opened on track {} ({}, segments: {})",
            track.id(),
            format,
            slice_bytes
                .map(|b| format!("{} bytes", b))
                .unwrap_or_else(|| "on stop".to_string())
        );

        Ok(Self {
            format,
            slice_bytes,
            receiver: Some(receiver),
            sink,
            state: Arc::new(Mutex::new(EngineState::Inactive)),
            control: None,
            worker: None,
        })
    }

    fn set_state(&self, state: EngineState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn send(&self, command: Control) -> Result<(), EngineError> {
        let control = self
            .control
            .as_ref()
            .ok_or_else(|| EngineError::InvalidState("engine was never started".to_string()))?;
        control
            .send(command)
            .map_err(|_| EngineError::InvalidState("encoder worker has exited".to_string()))
    }
}

impl RecordingEngine for PcmEngine {
    fn name(&self) -> &str {
        "pcm"
    }

    fn mime_type(&self) -> String {
        format!(
            "audio/L16;rate={};channels={}",
            self.format.sample_rate, self.format.channels
        )
    }

    fn state(&self) -> EngineState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(EngineState::Inactive)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        if self.state() != EngineState::Inactive {
            return Err(EngineError::InvalidState(format!(
                "cannot start while {}",
                self.state()
            )));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            EngineError::NotSupported("no Tokio runtime to run the encoder".to_string())
        })?;

        let frames = self.receiver.take().ok_or_else(|| {
            EngineError::InvalidState("PCM engine can only record once".to_string())
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = EncoderWorker {
            slice_bytes: self.slice_bytes,
            sink: self.sink.clone(),
            state: Arc::clone(&self.state),
        };

        self.set_state(EngineState::Recording);
        self.control = Some(tx);
        self.worker = Some(runtime.spawn(worker.run(frames, rx)));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        if self.state() != EngineState::Recording {
            return Err(EngineError::InvalidState(format!(
                "cannot pause while {}",
                self.state()
            )));
        }
        self.send(Control::Pause)?;
        self.set_state(EngineState::Paused);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        if self.state() != EngineState::Paused {
            return Err(EngineError::InvalidState(format!(
                "cannot resume while {}",
                self.state()
            )));
        }
        self.send(Control::Resume)?;
        self.set_state(EngineState::Recording);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        if self.state() == EngineState::Inactive {
            return Err(EngineError::InvalidState("already inactive".to_string()));
        }
        self.send(Control::Stop)?;
        self.set_state(EngineState::Inactive);
        Ok(())
    }
}

impl Drop for PcmEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

struct EncoderWorker {
    slice_bytes: Option<usize>,
    sink: EventSink,
    state: Arc<Mutex<EngineState>>,
}

impl EncoderWorker {
    async fn run(
        self,
        mut frames: broadcast::Receiver<AudioFrame>,
        mut control: mpsc::UnboundedReceiver<Control>,
    ) {
        self.sink.started();

        let mut pending: Vec<u8> = Vec::new();
        let mut paused = false;

        let track_ended = loop {
            tokio::select! {
                biased;

                command = control.recv() => {
                    // Frames already queued belong to the state before this request
                    if self.drain_queued(&mut frames, &mut pending, !paused) {
                        break true;
                    }
                    match command {
                        Some(Control::Pause) => {
                            paused = true;
                            self.sink.paused();
                        }
                        Some(Control::Resume) => {
                            paused = false;
                            self.sink.resumed();
                        }
                        Some(Control::Stop) | None => break false,
                    }
                }

                frame = frames.recv() => match frame {
                    Ok(frame) => {
                        if !paused {
                            self.append(&frame, &mut pending);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("PCM engine fell behind its track; {} frames dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break true,
                },
            }
        };

        if track_ended {
            info!("Recorded track ended; PCM engine stopping");
            // Flush before the state flips so a caller never sees an inactive
            // engine without a queued stop acknowledgement.
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            self.finish(pending);
            *state = EngineState::Inactive;
        } else {
            self.finish(pending);
        }
    }

    /// Consume frames that are already queued. Returns true if the track ended.
    fn drain_queued(
        &self,
        frames: &mut broadcast::Receiver<AudioFrame>,
        pending: &mut Vec<u8>,
        record: bool,
    ) -> bool {
        loop {
            match frames.try_recv() {
                Ok(frame) => {
                    if record {
                        self.append(&frame, pending);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("PCM engine fell behind its track; {} frames dropped", skipped);
                }
                Err(broadcast::error::TryRecvError::Empty) => return false,
                Err(broadcast::error::TryRecvError::Closed) => return true,
            }
        }
    }

    fn append(&self, frame: &AudioFrame, pending: &mut Vec<u8>) {
        for sample in &frame.samples {
            pending.extend_from_slice(&sample.to_be_bytes());
        }
        self.cut_segments(pending);
    }

    fn cut_segments(&self, pending: &mut Vec<u8>) {
        let Some(limit) = self.slice_bytes else {
            return;
        };
        while pending.len() >= limit {
            let rest = pending.split_off(limit);
            let segment = std::mem::replace(pending, rest);
            debug!("PCM engine emitting {} byte segment", segment.len());
            self.sink.data(segment);
        }
    }

    fn finish(&self, pending: Vec<u8>) {
        debug!("PCM engine flushing {} bytes", pending.len());
        self.sink.data(pending);
        self.sink.stopped();
    }
}
