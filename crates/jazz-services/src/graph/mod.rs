//! Pull-based signal graph.
//!
//! Nodes live in a [`Synth`] arena and refer to their inputs by
//! [`NodeId`]. Pulling a node evaluates it at most once per clock tick;
//! further pulls within the same tick return the cached frame, so a node
//! feeding several consumers is computed once. Control pulls are refreshed
//! only every [`CONTROL_PERIOD`] ticks and hold their value in between.

mod effects;
mod filter;
mod modifiers;
mod render;
mod sources;

pub use effects::{Allpass, COMB_DELAYS, ChorusParams, Comb, ReverbParams, chorus, room};
pub use filter::{Bandpass, Bandstop, FilterNode, Highpass, Lowpass, OpFilter};
pub use modifiers::{Delay, Mixer2, NMixer, Panpot};
pub use render::{WahFilter, WahParams, WavSynthParams, WavSynthVoice, sig_chorus, sig_reverb, sig_wah, sig_wavsynth};
pub use sources::{ArrayCurve, Constant, Noise, SampleInput, SineLfo, WavetableOscillator};

use tracing::trace;

use crate::sample::FloatSample;

/// Frames carry at most this many channels
pub const MAX_CHANNELS: usize = 2;

/// Ticks between control-rate refreshes
pub const CONTROL_PERIOD: i64 = 100;

/// One value per channel
pub type Frame = [f32; MAX_CHANNELS];

/// Handle of a node inside its [`Synth`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Format shared by every node of a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthContext {
    pub channels: usize,
    pub sampling_rate: u32,
}

impl SynthContext {
    pub fn rate(&self) -> f64 {
        self.sampling_rate as f64
    }

    /// Seconds to whole frames
    pub fn frames(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.rate()).round() as usize
    }
}

/// A processing node
pub trait SignalNode: Send {
    fn name(&self) -> &str;

    /// Reset internal state before a run
    fn init(&mut self, _ctx: SynthContext) {}

    /// Compute the frame for `synth.clock()`, pulling inputs through
    /// `synth`
    fn next_value(&mut self, synth: &mut Synth) -> Frame;
}

struct Slot {
    /// First tick at which `value` is stale
    horizon: i64,
    value: Frame,
    control: f32,
    /// Taken out while the node is being evaluated
    node: Option<Box<dyn SignalNode>>,
}

/// Arena owning all nodes of one graph
pub struct Synth {
    clock: i64,
    ctx: SynthContext,
    slots: Vec<Slot>,
}

fn channel_average(frame: &Frame, channels: usize) -> f32 {
    frame[..channels].iter().sum::<f32>() / channels as f32
}

impl Synth {
    pub fn new(channels: usize, sampling_rate: u32) -> Self {
        Self {
            clock: 0,
            ctx: SynthContext {
                channels: channels.clamp(1, MAX_CHANNELS),
                sampling_rate,
            },
            slots: Vec::new(),
        }
    }

    pub fn context(&self) -> SynthContext {
        self.ctx
    }

    pub fn clock(&self) -> i64 {
        self.clock
    }

    pub fn channels(&self) -> usize {
        self.ctx.channels
    }

    pub fn sampling_rate(&self) -> u32 {
        self.ctx.sampling_rate
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Take ownership of a node
    pub fn add(&mut self, node: impl SignalNode + 'static) -> NodeId {
        self.slots.push(Slot {
            horizon: i64::MIN,
            value: [0.0; MAX_CHANNELS],
            control: 0.0,
            node: Some(Box::new(node)),
        });
        NodeId(self.slots.len() - 1)
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.slots.clear();
        self.clock = 0;
    }

    fn evaluate(&mut self, id: NodeId, period: i64) -> Option<Frame> {
        let clock = self.clock;
        let slot = &mut self.slots[id.0];
        if clock < slot.horizon {
            return None;
        }
        // a node reached again through a feedback loop sees its last value
        let mut node = slot.node.take()?;
        slot.horizon = clock + period;
        let value = node.next_value(self);
        let channels = self.ctx.channels;
        let slot = &mut self.slots[id.0];
        slot.value = value;
        slot.control = channel_average(&value, channels);
        slot.node = Some(node);
        Some(value)
    }

    /// Audio-rate pull
    pub fn sample(&mut self, id: NodeId) -> Frame {
        self.evaluate(id, 1).unwrap_or(self.slots[id.0].value)
    }

    /// Control-rate pull: the channel average, refreshed every
    /// [`CONTROL_PERIOD`] ticks
    pub fn control(&mut self, id: NodeId) -> f32 {
        self.evaluate(id, CONTROL_PERIOD);
        self.slots[id.0].control
    }

    /// Reset all nodes, then pull `input` for `input_frames` frames plus
    /// `extra_seconds` of tail, writing each frame into `output`
    pub fn run(&mut self, output: &mut FloatSample, input: NodeId, input_frames: usize, extra_seconds: f64) {
        let ctx = self.ctx;
        for slot in &mut self.slots {
            slot.horizon = i64::MIN;
            slot.value = [0.0; MAX_CHANNELS];
            slot.control = 0.0;
            if let Some(node) = slot.node.as_mut() {
                node.init(ctx);
            }
        }
        self.clock = 0;

        let frames = input_frames + ctx.frames(extra_seconds);
        output.reset(frames);
        let ch = output.channels().min(ctx.channels);
        trace!(nodes = self.slots.len(), frames, "Running signal graph");

        for _ in 0..frames {
            let value = self.sample(input);
            output.add_out(&value[..ch]);
            self.clock += 1;
        }
    }
}
