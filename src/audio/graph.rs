// Audio graph for mixing live tracks
//
// A MixContext owns the nodes built for one mix call:
// - one SourceNode per input track (subscribed to the track's live feed)
// - one GainNode wrapping each source
// - a single DestinationNode whose output is a synthesized audio track
//
// Once started, a render task drains every connected input into a per-input
// sample queue and publishes mixed frames on the destination track. Each input
// sample is consumed exactly once; mixing is gain-scaled addition with clipping.

use futures::stream::{self, StreamExt};
use serde_json::json;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

use crate::error::MixError;
use crate::logging::CaptureLogger;
use crate::media::{AudioFormat, AudioFrame, StreamHandle, Track, TrackFeed, TrackOrigin};

/// Graph entry point for a single-track stream
pub struct SourceNode {
    track_id: Uuid,
    stream: StreamHandle,
    receiver: broadcast::Receiver<AudioFrame>,
}

impl SourceNode {
    pub fn track_id(&self) -> Uuid {
        self.track_id
    }

    /// The intermediate single-track stream this node reads from
    pub fn stream(&self) -> &StreamHandle {
        &self.stream
    }
}

/// Scales a source before it reaches the destination
pub struct GainNode {
    source: SourceNode,
    gain: f32,
}

impl GainNode {
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn source(&self) -> &SourceNode {
        &self.source
    }
}

/// Sink of the graph; its output is a synthesized audio track
pub struct DestinationNode {
    track: Track,
    feed: TrackFeed,
}

impl DestinationNode {
    pub fn track(&self) -> &Track {
        &self.track
    }
}

/// How long an open input may fall behind before it is mixed as silence
pub const DEFAULT_MAX_BUFFER_DELAY_MS: u64 = 200;

/// Audio processing context for one mix call. Never reused.
pub struct MixContext {
    id: Uuid,
    format: AudioFormat,
    max_buffer_delay_ms: u64,
    inputs: Vec<GainNode>,
    destination: DestinationNode,
    logger: CaptureLogger,
}

impl MixContext {
    pub fn new(format: AudioFormat, logger: CaptureLogger) -> Self {
        let (track, feed) = Track::audio_with_origin("mixed audio", format, TrackOrigin::Mixer);
        Self {
            id: Uuid::new_v4(),
            format,
            max_buffer_delay_ms: DEFAULT_MAX_BUFFER_DELAY_MS,
            inputs: Vec::new(),
            destination: DestinationNode { track, feed },
            logger,
        }
    }

    /// Bound the audio held back while waiting for a quiet input
    ///
    /// Once any input has more than `delay_ms` queued beyond what every open
    /// input can cover, the excess is released and the inputs that sent
    /// nothing contribute silence.
    pub fn with_max_buffer_delay(mut self, delay_ms: u64) -> Self {
        self.max_buffer_delay_ms = delay_ms;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Number of gain nodes connected to the destination
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn destination(&self) -> &DestinationNode {
        &self.destination
    }

    /// Create a source node from a stream holding exactly one live audio track
    pub fn create_source(&self, stream: &StreamHandle) -> Result<SourceNode, MixError> {
        let audio = stream.audio_tracks();
        let track = match audio.as_slice() {
            [track] => track,
            _ => return Err(MixError::SourceTrackCount(audio.len())),
        };

        let actual = track.format().ok_or(MixError::NotAudio(track.id()))?;
        if actual != self.format {
            return Err(MixError::FormatMismatch {
                expected: self.format,
                actual,
            });
        }

        let receiver = track.subscribe().ok_or(MixError::TrackEnded(track.id()))?;

        Ok(SourceNode {
            track_id: track.id(),
            stream: stream.clone(),
            receiver,
        })
    }

    pub fn create_gain(&self, source: SourceNode, gain: f32) -> Result<GainNode, MixError> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(MixError::InvalidGain(gain));
        }
        Ok(GainNode { source, gain })
    }

    /// Connect a gain node to the destination
    pub fn connect(&mut self, node: GainNode) {
        debug!(
            "Context {}: connected track {} (gain {})",
            self.id, node.source.track_id, node.gain
        );
        self.inputs.push(node);
    }

    /// Start rendering and hand out the destination track
    ///
    /// The returned track owns the context: stopping it closes the graph. With
    /// no connected inputs the track stays live and silent. Rendering needs a
    /// Tokio runtime when at least one input is connected.
    pub fn start(self) -> Result<Track, MixError> {
        let MixContext {
            id,
            format,
            max_buffer_delay_ms,
            inputs,
            destination,
            logger,
        } = self;
        let track = destination.track.clone();

        if inputs.is_empty() {
            logger.warn_with(
                "no audio inputs connected; mixed track is silent",
                json!({ "context": id.to_string() }),
            );
            return Ok(track);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MixError::NoRuntime)?;
        let max_pending = format.samples_for(max_buffer_delay_ms);
        let task = runtime.spawn(render(
            id,
            format,
            max_pending,
            inputs,
            destination.feed,
            logger,
        ));

        let abort = task.abort_handle();
        track.on_stop(move || {
            debug!("Closing mix context {}", id);
            abort.abort();
        });

        Ok(track)
    }
}

async fn render(
    context_id: Uuid,
    format: AudioFormat,
    max_pending: usize,
    inputs: Vec<GainNode>,
    feed: TrackFeed,
    logger: CaptureLogger,
) {
    let mut buffer = MixBuffer::new(format, max_pending, inputs.iter().map(|n| n.gain).collect());

    let feeds = inputs.into_iter().enumerate().map(|(idx, node)| {
        BroadcastStream::new(node.source.receiver)
            .map(move |item| (idx, Some(item)))
            .chain(stream::once(async move { (idx, None) }))
            .boxed()
    });
    let mut merged = stream::select_all(feeds);

    while let Some((idx, item)) = merged.next().await {
        match item {
            Some(Ok(frame)) => buffer.push(idx, &frame.samples),
            Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                logger.warn_with(
                    "mix input lagged behind its track; frames were dropped",
                    json!({ "context": context_id.to_string(), "idx": idx, "skipped": skipped }),
                );
            }
            None => {
                debug!("Context {}: input {} ended", context_id, idx);
                buffer.close(idx);
            }
        }

        while let Some(mixed) = buffer.drain_ready() {
            if !feed.push(mixed) {
                return;
            }
        }
    }

    debug!("Context {}: all inputs ended", context_id);
    feed.close();
}

struct InputQueue {
    gain: f32,
    pending: VecDeque<i16>,
    open: bool,
}

/// Per-input sample queues that release mixed audio once every open input
/// has contributed, or once some input is more than `max_pending` samples ahead
pub(crate) struct MixBuffer {
    format: AudioFormat,
    max_pending: usize,
    inputs: Vec<InputQueue>,
    emitted_samples: u64,
}

impl MixBuffer {
    pub(crate) fn new(format: AudioFormat, max_pending: usize, gains: Vec<f32>) -> Self {
        let inputs = gains
            .into_iter()
            .map(|gain| InputQueue {
                gain,
                pending: VecDeque::new(),
                open: true,
            })
            .collect();

        Self {
            format,
            max_pending,
            inputs,
            emitted_samples: 0,
        }
    }

    pub(crate) fn push(&mut self, idx: usize, samples: &[i16]) {
        if let Some(input) = self.inputs.get_mut(idx) {
            input.pending.extend(samples.iter().copied());
        }
    }

    pub(crate) fn close(&mut self, idx: usize) {
        if let Some(input) = self.inputs.get_mut(idx) {
            input.open = false;
        }
    }

    /// Mix as many samples as every open input can cover
    ///
    /// An input that falls more than `max_pending` samples behind the longest
    /// queue is mixed as silence for the overdue part. When all inputs have
    /// closed, whatever is left is flushed; shorter inputs contribute silence.
    pub(crate) fn drain_ready(&mut self) -> Option<AudioFrame> {
        let longest = self.inputs.iter().map(|q| q.pending.len()).max()?;
        let any_open = self.inputs.iter().any(|q| q.open);
        let available = if any_open {
            let covered = self
                .inputs
                .iter()
                .filter(|q| q.open)
                .map(|q| q.pending.len())
                .min()
                .unwrap_or(0);
            covered.max(longest.saturating_sub(self.max_pending))
        } else {
            longest
        };

        let channels = self.format.channels.max(1) as usize;
        let count = available - available % channels;
        if count == 0 {
            return None;
        }

        let mut mixed = vec![0f32; count];
        for input in &mut self.inputs {
            let take = count.min(input.pending.len());
            for (slot, sample) in mixed.iter_mut().zip(input.pending.drain(..take)) {
                *slot += sample as f32 * input.gain;
            }
        }

        let samples = mixed
            .into_iter()
            .map(|s| s.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect();

        let per_second = self.format.sample_rate as u64 * channels as u64;
        let timestamp_ms = if per_second == 0 {
            0
        } else {
            self.emitted_samples * 1000 / per_second
        };
        self.emitted_samples += count as u64;

        Some(AudioFrame::new(samples, self.format, timestamp_ms))
    }
}
