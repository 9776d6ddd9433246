//! Comb/allpass reverberators and the composite room and chorus topologies

use serde::{Deserialize, Serialize};

use super::filter::{FilterNode, Lowpass};
use super::modifiers::{Delay, Mixer2, NMixer, Panpot};
use super::sources::{Constant, SineLfo};
use super::{Frame, MAX_CHANNELS, NodeId, SignalNode, Synth, SynthContext};

/// Comb loop times of the room, seconds
pub const COMB_DELAYS: [f64; 4] = [0.0297, 0.0371, 0.0411, 0.0437];

/// (loop time, reverb time) of the two diffusing allpasses, seconds
const ALLPASS_STAGES: [(f64, f64); 2] = [(0.005, 0.09683), (0.0017, 0.03292)];

/// Gain per loop so that a signal decays by 60 dB over `reverb_time`
fn loop_gain(loop_time: f64, reverb_time: f64) -> f32 {
    debug_assert!(reverb_time > 0.0, "reverb time must be positive");
    (0.001f64.ln() * loop_time / reverb_time).exp() as f32
}

fn loop_buffer(ctx: SynthContext, loop_time: f64) -> Vec<Frame> {
    vec![[0.0; MAX_CHANNELS]; ctx.frames(loop_time).max(1)]
}

/// Recirculating delay: `out = g * buf`, `buf = x + out`
pub struct Comb {
    input: NodeId,
    gain: f32,
    buffer: Vec<Frame>,
    pos: usize,
}

impl Comb {
    pub fn new(ctx: SynthContext, input: NodeId, loop_time: f64, reverb_time: f64) -> Self {
        Self {
            input,
            gain: loop_gain(loop_time, reverb_time),
            buffer: loop_buffer(ctx, loop_time),
            pos: 0,
        }
    }
}

impl SignalNode for Comb {
    fn name(&self) -> &str { "Comb" }

    fn init(&mut self, _ctx: SynthContext) {
        self.buffer.fill([0.0; MAX_CHANNELS]);
        self.pos = 0;
    }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let x = synth.sample(self.input);
        let slot = &mut self.buffer[self.pos];
        let mut out = [0.0; MAX_CHANNELS];
        for c in 0..MAX_CHANNELS {
            out[c] = self.gain * slot[c];
            slot[c] = x[c] + out[c];
        }
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }
}

/// Flat-magnitude diffuser with the comb's decay law
pub struct Allpass {
    input: NodeId,
    gain: f32,
    buffer: Vec<Frame>,
    pos: usize,
}

impl Allpass {
    pub fn new(ctx: SynthContext, input: NodeId, loop_time: f64, reverb_time: f64) -> Self {
        Self {
            input,
            gain: loop_gain(loop_time, reverb_time),
            buffer: loop_buffer(ctx, loop_time),
            pos: 0,
        }
    }
}

impl SignalNode for Allpass {
    fn name(&self) -> &str { "Allpass" }

    fn init(&mut self, _ctx: SynthContext) {
        self.buffer.fill([0.0; MAX_CHANNELS]);
        self.pos = 0;
    }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let x = synth.sample(self.input);
        let slot = &mut self.buffer[self.pos];
        let mut out = [0.0; MAX_CHANNELS];
        for c in 0..MAX_CHANNELS {
            let z = slot[c];
            slot[c] = x[c] + self.gain * z;
            out[c] = z - self.gain * slot[c];
        }
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbParams {
    /// Seconds to decay by 60 dB; also the tail appended after the input
    pub reverb_time: f64,
    /// Lowpass corner after the combs, Hz
    pub brightness: f64,
    /// Dry/wet balance, -1 (dry only) ..= 1 (wet only)
    pub balance: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            reverb_time: 1.5,
            brightness: 5000.0,
            balance: 0.0,
        }
    }
}

/// Four parallel combs, a lowpass and two allpasses, blended with the dry
/// input
pub fn room(synth: &mut Synth, input: NodeId, params: &ReverbParams) -> NodeId {
    let ctx = synth.context();
    // control² = 1/4 per comb
    let quarter = synth.add(Constant::new(0.5));
    let mut combs = NMixer::new();
    for delay in COMB_DELAYS {
        let comb = synth.add(Comb::new(ctx, input, delay, params.reverb_time));
        combs = combs.with_input(comb, Some(quarter));
    }
    let combs = synth.add(combs);
    let mut wet = synth.add(FilterNode::<Lowpass>::new(ctx, combs, params.brightness, 0.0));
    for (loop_time, reverb_time) in ALLPASS_STAGES {
        wet = synth.add(Allpass::new(ctx, wet, loop_time, reverb_time));
    }
    let balance = synth.add(Constant::new(params.balance));
    synth.add(Mixer2::new(input, wet, balance))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusParams {
    /// Delay modulation rate, Hz
    pub pitch_freq: f64,
    /// Centre delay, seconds
    pub delay: f64,
    /// Delay swing around the centre, seconds
    pub depth: f64,
    /// Pan modulation rate, Hz
    pub pan_freq: f64,
    /// Pan swing, 0..=1
    pub pan_amount: f64,
    /// Dry/wet balance, -1 (dry only) ..= 1 (wet only)
    pub balance: f32,
}

impl Default for ChorusParams {
    fn default() -> Self {
        Self {
            pitch_freq: 0.8,
            delay: 0.02,
            depth: 0.003,
            pan_freq: 0.3,
            pan_amount: 0.7,
            balance: 0.0,
        }
    }
}

/// LFO-modulated delay, panned by a second LFO and mixed with the dry input
pub fn chorus(synth: &mut Synth, input: NodeId, params: &ChorusParams) -> NodeId {
    let ctx = synth.context();
    let pitch_lfo = synth.add(SineLfo::new(params.pitch_freq, 1.0));
    let delayed = synth.add(Delay::new(ctx, input, params.delay, params.depth, Some(pitch_lfo)));
    let pan_lfo = synth.add(SineLfo::new(params.pan_freq, params.pan_amount));
    let panned = synth.add(Panpot::new(delayed, pan_lfo));
    let balance = synth.add(Constant::new(params.balance));
    synth.add(Mixer2::new(input, panned, balance))
}

#[cfg(test)]
mod tests {
    use super::super::SampleInput;
    use super::*;
    use crate::sample::FloatSample;

    const RATE: u32 = 44100;

    fn impulse(synth: &mut Synth, frames: usize) -> NodeId {
        let mut src = FloatSample::new(1, RATE);
        src.reset(frames);
        src.data_mut()[0] = 1.0;
        synth.add(SampleInput::new(src))
    }

    fn render(synth: &mut Synth, id: NodeId, frames: usize) -> Vec<f32> {
        let mut out = FloatSample::new(1, RATE);
        synth.run(&mut out, id, frames, 0.0);
        out.data().to_vec()
    }

    #[test]
    fn test_comb_tap_after_reverb_time() {
        let mut synth = Synth::new(1, RATE);
        let src = impulse(&mut synth, 1);
        let ctx = synth.context();
        let comb = synth.add(Comb::new(ctx, src, 0.03, 0.03));
        let out = render(&mut synth, comb, 1400);
        assert_eq!(out[0], 0.0);
        assert!((out[1323] - 0.001).abs() < 1e-6);
        assert!(out[1..1323].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_comb_decay_law() {
        let mut synth = Synth::new(1, RATE);
        let src = impulse(&mut synth, 1);
        let ctx = synth.context();
        let comb = synth.add(Comb::new(ctx, src, 0.01, 0.05));
        let out = render(&mut synth, comb, 2300);
        // 441 frames per loop, five loops to reach the reverb time
        assert!((out[441 * 5] - 0.001).abs() < 1e-5);
        assert!(out[441] > out[441 * 2]);
    }

    #[test]
    fn test_allpass_impulse_response() {
        let mut synth = Synth::new(1, RATE);
        let src = impulse(&mut synth, 1);
        let ctx = synth.context();
        let ap = synth.add(Allpass::new(ctx, src, 0.01, 0.05));
        let out = render(&mut synth, ap, 1000);
        let g = loop_gain(0.01, 0.05);
        assert!((out[0] + g).abs() < 1e-6);
        assert!((out[441] - (1.0 - g * g)).abs() < 1e-5);
    }

    #[test]
    fn test_room_is_deterministic() {
        let mut synth = Synth::new(2, RATE);
        let src = impulse(&mut synth, 100);
        let out = room(&mut synth, src, &ReverbParams::default());
        let mut a = FloatSample::new(2, RATE);
        let mut b = FloatSample::new(2, RATE);
        synth.run(&mut a, out, 100, 0.2);
        synth.run(&mut b, out, 100, 0.2);
        assert_eq!(a, b);
        assert_eq!(a.frames(), 100 + 8820);
        // dry impulse passes straight through at balance 0
        assert_eq!(a.data()[0], 1.0);
        assert!(a.data()[2 * 2000..].iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_chorus_dry_only() {
        let mut synth = Synth::new(2, RATE);
        let src = impulse(&mut synth, 10);
        let params = ChorusParams {
            balance: -1.0,
            ..ChorusParams::default()
        };
        let out = chorus(&mut synth, src, &params);
        let mut rendered = FloatSample::new(2, RATE);
        synth.run(&mut rendered, out, 2000, 0.0);
        assert_eq!(&rendered.data()[..2], &[1.0, 1.0]);
        assert!(rendered.data()[2..].iter().all(|v| *v == 0.0));
    }
}
