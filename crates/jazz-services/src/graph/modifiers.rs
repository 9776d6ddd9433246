//! Delay, panning and mixing nodes

use super::{Frame, MAX_CHANNELS, NodeId, SignalNode, Synth, SynthContext};

/// Circular delay line. The read offset is `delay + depth * c` seconds for
/// control value `c`, read with linear interpolation.
pub struct Delay {
    input: NodeId,
    control: Option<NodeId>,
    delay: f64,
    depth: f64,
    buffer: Vec<Frame>,
    write: usize,
    rate: f64,
}

impl Delay {
    pub fn new(ctx: SynthContext, input: NodeId, delay: f64, depth: f64, control: Option<NodeId>) -> Self {
        let len = ctx.frames(delay + depth.abs()) + 2;
        Self {
            input,
            control,
            delay,
            depth,
            buffer: vec![[0.0; MAX_CHANNELS]; len],
            write: 0,
            rate: ctx.rate(),
        }
    }
}

impl SignalNode for Delay {
    fn name(&self) -> &str { "Delay" }

    fn init(&mut self, _ctx: SynthContext) {
        self.buffer.fill([0.0; MAX_CHANNELS]);
        self.write = 0;
    }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let x = synth.sample(self.input);
        let c = self.control.map_or(0.0, |id| synth.control(id).clamp(-1.0, 1.0)) as f64;

        let len = self.buffer.len();
        self.buffer[self.write] = x;
        let offset = ((self.delay + self.depth * c) * self.rate).clamp(0.0, (len - 2) as f64);
        let whole = offset.floor() as usize;
        let frac = (offset - whole as f64) as f32;
        let a = self.buffer[(self.write + len - whole) % len];
        let b = self.buffer[(self.write + len - whole - 1) % len];
        self.write = (self.write + 1) % len;

        let mut out = [0.0; MAX_CHANNELS];
        for c in 0..MAX_CHANNELS {
            out[c] = a[c] + (b[c] - a[c]) * frac;
        }
        out
    }
}

/// Stereo balance from a control in `[-1, 1]`: positive values attenuate
/// channel 1, negative values channel 2
pub struct Panpot {
    input: NodeId,
    control: NodeId,
}

impl Panpot {
    pub fn new(input: NodeId, control: NodeId) -> Self {
        Self { input, control }
    }
}

impl SignalNode for Panpot {
    fn name(&self) -> &str { "Panpot" }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let mut frame = synth.sample(self.input);
        let p = synth.control(self.control).clamp(-1.0, 1.0);
        if synth.channels() < 2 {
            return frame;
        }
        if p > 0.0 {
            frame[0] *= 1.0 - p;
        } else if p < 0.0 {
            frame[1] *= 1.0 + p;
        }
        frame
    }
}

/// Crossfade of two inputs. Control 0 passes both at full level, +1 mutes
/// `a`, -1 mutes `b`.
pub struct Mixer2 {
    a: NodeId,
    b: NodeId,
    control: NodeId,
}

impl Mixer2 {
    pub fn new(a: NodeId, b: NodeId, control: NodeId) -> Self {
        Self { a, b, control }
    }
}

impl SignalNode for Mixer2 {
    fn name(&self) -> &str { "Mixer2" }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let a = synth.sample(self.a);
        let b = synth.sample(self.b);
        let p = synth.control(self.control).clamp(-1.0, 1.0);
        let ga = if p > 0.0 { 1.0 - p } else { 1.0 };
        let gb = if p < 0.0 { 1.0 + p } else { 1.0 };
        [a[0] * ga + b[0] * gb, a[1] * ga + b[1] * gb]
    }
}

/// Sum of any number of inputs, each optionally weighted by the square of
/// a control (clamped to `[0, 1]`)
#[derive(Default)]
pub struct NMixer {
    inputs: Vec<(NodeId, Option<NodeId>)>,
}

impl NMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: NodeId, weight: Option<NodeId>) -> Self {
        self.inputs.push((input, weight));
        self
    }
}

impl SignalNode for NMixer {
    fn name(&self) -> &str { "NMixer" }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let mut out = [0.0; MAX_CHANNELS];
        for &(input, weight) in &self.inputs {
            let v = synth.sample(input);
            let w = weight.map_or(1.0, |id| {
                let c = synth.control(id);
                (c * c).clamp(0.0, 1.0)
            });
            out[0] += v[0] * w;
            out[1] += v[1] * w;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Constant, SampleInput};
    use super::*;
    use crate::sample::FloatSample;

    fn impulse(synth: &mut Synth, frames: usize) -> NodeId {
        let mut data = vec![0i16; frames];
        data[0] = 1000;
        synth.add(SampleInput::new(FloatSample::from_short(&data, 1, synth.sampling_rate())))
    }

    fn render(synth: &mut Synth, id: NodeId, frames: usize) -> Vec<f32> {
        let mut out = FloatSample::new(synth.channels(), synth.sampling_rate());
        synth.run(&mut out, id, frames, 0.0);
        out.data().to_vec()
    }

    #[test]
    fn test_delay_shifts_impulse() {
        let mut synth = Synth::new(1, 100);
        let src = impulse(&mut synth, 8);
        let ctx = synth.context();
        let id = synth.add(Delay::new(ctx, src, 0.03, 0.0, None));
        let out = render(&mut synth, id, 8);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1000.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_delay_fractional_read() {
        let mut synth = Synth::new(1, 100);
        let src = impulse(&mut synth, 6);
        let ctx = synth.context();
        let half = synth.add(Constant::new(0.5));
        let id = synth.add(Delay::new(ctx, src, 0.01, 0.01, Some(half)));
        let out = render(&mut synth, id, 6);
        assert_eq!(out, vec![0.0, 500.0, 500.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_panpot_and_mixer2() {
        let mut synth = Synth::new(2, 100);
        let one = synth.add(Constant::new(1.0));
        let right = synth.add(Constant::new(0.5));
        let pan = synth.add(Panpot::new(one, right));
        assert_eq!(render(&mut synth, pan, 1), vec![0.5, 1.0]);

        let mut synth = Synth::new(2, 100);
        let a = synth.add(Constant::new(2.0));
        let b = synth.add(Constant::new(4.0));
        let bal = synth.add(Constant::new(-0.5));
        let mix = synth.add(Mixer2::new(a, b, bal));
        assert_eq!(render(&mut synth, mix, 1), vec![4.0, 4.0]);
    }

    #[test]
    fn test_nmixer_weights_are_squared() {
        let mut synth = Synth::new(1, 100);
        let a = synth.add(Constant::new(8.0));
        let b = synth.add(Constant::new(1.0));
        let half = synth.add(Constant::new(0.5));
        let loud = synth.add(Constant::new(3.0));
        let mix = synth.add(NMixer::new().with_input(a, Some(half)).with_input(b, Some(loud)));
        assert_eq!(render(&mut synth, mix, 1), vec![3.0]);
    }
}
