pub mod graph;
pub mod mixer;

pub use graph::{DestinationNode, GainNode, MixContext, SourceNode, DEFAULT_MAX_BUFFER_DELAY_MS};
pub use mixer::{AudioMixer, MixerConfig};
