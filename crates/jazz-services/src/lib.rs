//! jazz-services: sample buffers, WAV I/O and the signal graph

mod error;
pub mod graph;
pub mod sample;

pub use error::SampleError;
pub use graph::{ChorusParams, NodeId, ReverbParams, SignalNode, Synth, WahFilter, WahParams, WavSynthParams};
pub use sample::{FloatSample, SampleBuffer, SampleSet};
