//! Media primitives: frames, tracks and stream handles

pub mod frame;
pub mod stream;
pub mod track;

pub use frame::{AudioFormat, AudioFrame};
pub use stream::{AggregateStream, StreamHandle};
pub use track::{Track, TrackFeed, TrackKind, TrackOrigin};
