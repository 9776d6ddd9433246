//! Sample storage: 16-bit buffers, float working copies, WAV I/O and
//! parameter curves

mod buffer;
pub mod curves;
mod float;
pub mod wav;

pub use buffer::{FSEMI, RESCALE_MAX, SampleBuffer, semitone_ratio};
pub use float::{FloatSample, SHORT_PEAK};

use serde::{Deserialize, Serialize};

use crate::SampleError;

/// Format shared by all samples of a set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleSet {
    pub channels: usize,
    pub sampling_rate: u32,
    pub bits: u16,
}

impl Default for SampleSet {
    fn default() -> Self {
        Self {
            channels: 2,
            sampling_rate: 44100,
            bits: 16,
        }
    }
}

impl SampleSet {
    /// Empty buffer in this set's format
    pub fn new_buffer(&self) -> SampleBuffer {
        SampleBuffer::for_set(self)
    }

    /// Reject formats the buffers cannot hold. Buffers are always 16-bit
    /// mono or stereo; `bits` is kept so a set file states that explicitly.
    pub fn validate(&self) -> Result<(), SampleError> {
        if self.bits != 16 {
            return Err(SampleError::Unsupported(format!("{} bit sample set", self.bits)));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(SampleError::Unsupported(format!("{} channel sample set", self.channels)));
        }
        if !wav::RATE_RANGE.contains(&self.sampling_rate) {
            return Err(SampleError::Unsupported(format!("sampling rate {}", self.sampling_rate)));
        }
        Ok(())
    }
}
