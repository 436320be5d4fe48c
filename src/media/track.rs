use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::frame::{AudioFormat, AudioFrame};

/// Frames buffered per subscriber before a slow consumer starts lagging
const FEED_CAPACITY: usize = 256;

/// Kind of media signal carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// Where a track's signal comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOrigin {
    /// Captured from a device; stopping it releases the device
    Device,
    /// Synthesized by a mix graph
    Mixer,
}

type StopHook = Box<dyn FnOnce() + Send>;

struct TrackInner {
    id: Uuid,
    kind: TrackKind,
    origin: TrackOrigin,
    label: String,
    format: Option<AudioFormat>,
    ended: AtomicBool,
    feed: Mutex<Option<broadcast::Sender<AudioFrame>>>,
    on_stop: Mutex<Vec<StopHook>>,
}

/// Handle to a single media signal
///
/// Clones share the same underlying signal. Any holder can observe the track,
/// but only the party that acquired it should call [`Track::stop`].
#[derive(Clone)]
pub struct Track {
    inner: Arc<TrackInner>,
}

impl Track {
    /// Create a video track. Video is carried by reference only.
    pub fn video(label: impl Into<String>) -> Self {
        Self::build(TrackKind::Video, TrackOrigin::Device, label.into(), None, None)
    }

    /// Create a live audio track and the feed used to produce its frames
    pub fn audio(label: impl Into<String>, format: AudioFormat) -> (Self, TrackFeed) {
        Self::audio_with_origin(label, format, TrackOrigin::Device)
    }

    pub(crate) fn audio_with_origin(
        label: impl Into<String>,
        format: AudioFormat,
        origin: TrackOrigin,
    ) -> (Self, TrackFeed) {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        let track = Self::build(TrackKind::Audio, origin, label.into(), Some(format), Some(tx));
        let feed = TrackFeed {
            track: track.clone(),
        };
        (track, feed)
    }

    fn build(
        kind: TrackKind,
        origin: TrackOrigin,
        label: String,
        format: Option<AudioFormat>,
        feed: Option<broadcast::Sender<AudioFrame>>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4(),
                kind,
                origin,
                label,
                format,
                ended: AtomicBool::new(false),
                feed: Mutex::new(feed),
                on_stop: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn origin(&self) -> TrackOrigin {
        self.inner.origin
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Sample layout for audio tracks, `None` for video
    pub fn format(&self) -> Option<AudioFormat> {
        self.inner.format
    }

    pub fn is_audio(&self) -> bool {
        self.inner.kind == TrackKind::Audio
    }

    pub fn is_video(&self) -> bool {
        self.inner.kind == TrackKind::Video
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    /// Subscribe to the live audio feed
    ///
    /// Returns `None` for video tracks and for tracks that already ended.
    /// Frames pushed before subscribing are not replayed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<AudioFrame>> {
        if self.is_ended() {
            return None;
        }
        let feed = self.inner.feed.lock().ok()?;
        feed.as_ref().map(|tx| tx.subscribe())
    }

    /// Register a hook that runs once when the track is stopped
    pub fn on_stop(&self, hook: impl FnOnce() + Send + 'static) {
        let Ok(mut hooks) = self.inner.on_stop.lock() else {
            return;
        };
        if self.is_ended() {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(Box::new(hook));
    }

    /// Stop the track. Safe to call more than once.
    pub fn stop(&self) {
        if !self.end() {
            return;
        }
        debug!("Stopped {} track {} ({})", self.kind(), self.id(), self.label());

        let hooks = match self.inner.on_stop.lock() {
            Ok(mut hooks) => std::mem::take(&mut *hooks),
            Err(_) => Vec::new(),
        };
        for hook in hooks {
            hook();
        }
    }

    /// Mark the track ended and close its feed. Returns false if it had already ended.
    fn end(&self) -> bool {
        if self.inner.ended.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Ok(mut feed) = self.inner.feed.lock() {
            feed.take();
        }
        true
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Track {}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("origin", &self.inner.origin)
            .field("label", &self.inner.label)
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// Producer side of an audio track
pub struct TrackFeed {
    track: Track,
}

impl TrackFeed {
    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Publish a frame to every current subscriber
    ///
    /// Returns false once the track has ended; producers should stop then.
    /// A frame published while nobody is subscribed is dropped, like a live device.
    pub fn push(&self, frame: AudioFrame) -> bool {
        let feed = match self.track.inner.feed.lock() {
            Ok(feed) => feed,
            Err(_) => return false,
        };
        match feed.as_ref() {
            Some(tx) => {
                let _ = tx.send(frame);
                true
            }
            None => false,
        }
    }

    /// The producer ran dry: end the track without running stop hooks
    pub fn close(&self) {
        self.track.end();
    }
}
