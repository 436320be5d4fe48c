use tracing::debug;
use uuid::Uuid;

use super::track::{Track, TrackOrigin};

/// An ordered, mutable set of track references
///
/// Cloning a handle shares the tracks; it does not duplicate the signals.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: Uuid,
    tracks: Vec<Track>,
}

impl StreamHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks: Vec::new(),
        }
    }

    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let mut stream = Self::new();
        for track in tracks {
            stream.add_track(track);
        }
        stream
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Add a track; a track already in the set is ignored
    pub fn add_track(&mut self, track: Track) {
        if !self.tracks.contains(&track) {
            self.tracks.push(track);
        }
    }

    /// Remove a track by id. Returns true if it was present.
    pub fn remove_track(&mut self, id: Uuid) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.id() != id);
        self.tracks.len() != before
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> Vec<Track> {
        self.tracks.iter().filter(|t| t.is_video()).cloned().collect()
    }

    pub fn audio_tracks(&self) -> Vec<Track> {
        self.tracks.iter().filter(|t| t.is_audio()).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Stop every track in this stream
    ///
    /// Only the owner of the underlying sources should call this.
    pub fn stop_tracks(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl Default for StreamHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A derived stream together with the acquired streams it was built from
///
/// Tracks of a derived stream do not stop the devices behind it. The aggregate
/// remembers which originals have to be stopped when the capture ends.
#[derive(Debug, Clone)]
pub struct AggregateStream {
    stream: StreamHandle,
    originals: Vec<StreamHandle>,
}

impl AggregateStream {
    pub fn new(stream: StreamHandle, originals: Vec<StreamHandle>) -> Self {
        Self { stream, originals }
    }

    /// Aggregate whose derived stream is the acquired stream itself
    pub fn passthrough(stream: StreamHandle) -> Self {
        Self {
            originals: vec![stream.clone()],
            stream,
        }
    }

    /// The stream to preview and record
    pub fn stream(&self) -> &StreamHandle {
        &self.stream
    }

    /// The acquired streams this aggregate owns
    pub fn originals(&self) -> &[StreamHandle] {
        &self.originals
    }

    /// Stop synthesized tracks of the derived stream and every original track
    ///
    /// Returns the number of distinct tracks stopped.
    pub fn stop(&self) -> usize {
        let mut stopped: Vec<Uuid> = Vec::new();

        let synthesized = self
            .stream
            .tracks()
            .iter()
            .filter(|t| t.origin() == TrackOrigin::Mixer);
        let originals = self.originals.iter().flat_map(|s| s.tracks().iter());

        for track in synthesized.chain(originals) {
            if stopped.contains(&track.id()) {
                continue;
            }
            track.stop();
            stopped.push(track.id());
        }

        debug!("Aggregate stream {} stopped {} tracks", self.stream.id(), stopped.len());
        stopped.len()
    }
}
