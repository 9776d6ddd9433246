//! Signal sources

use std::f64::consts::TAU;

use jazz_core::{RandomSource, WeightedArray};

use super::{Frame, MAX_CHANNELS, NodeId, SignalNode, Synth, SynthContext};
use crate::sample::FloatSample;
use crate::sample::curves::curve_level;

/// Noise peak amplitude
const NOISE_PEAK: f64 = 32000.0;

/// Plays a float sample frame by frame, silence after its end
pub struct SampleInput {
    sample: FloatSample,
}

impl SampleInput {
    pub fn new(sample: FloatSample) -> Self {
        Self { sample }
    }
}

impl SignalNode for SampleInput {
    fn name(&self) -> &str { "SampleInput" }

    fn init(&mut self, _ctx: SynthContext) {
        self.sample.set_current(0);
    }

    fn next_value(&mut self, _synth: &mut Synth) -> Frame {
        let mut frame = [0.0; MAX_CHANNELS];
        let ch = self.sample.channels();
        self.sample.get_in(&mut frame[..ch]);
        if ch == 1 {
            frame[1] = frame[0];
        }
        frame
    }
}

/// Cyclic table lookup with linear interpolation
pub struct WavetableOscillator {
    table: Vec<f32>,
    frequency: f64,
    amplitude: f32,
    /// Control input and the ratio reached at full deflection
    pitch: Option<(NodeId, f64)>,
    phase: f64,
    increment: f64,
}

impl WavetableOscillator {
    pub fn new(table: Vec<f32>, frequency: f64, amplitude: f32) -> Self {
        let table = if table.is_empty() { vec![0.0] } else { table };
        Self {
            table,
            frequency,
            amplitude,
            pitch: None,
            phase: 0.0,
            increment: 0.0,
        }
    }

    /// Scale the phase increment by `factor^c` for control value `c`
    pub fn with_pitch_control(mut self, control: NodeId, factor: f64) -> Self {
        self.pitch = Some((control, factor));
        self
    }

    /// One cycle of a sine wave
    pub fn sine_table(size: usize) -> Vec<f32> {
        (0..size).map(|i| (TAU * i as f64 / size as f64).sin() as f32).collect()
    }

    /// Waveform from a weighted array, `min..max` mapped to `-1..1`
    pub fn table_from_array(array: &WeightedArray) -> Vec<f32> {
        let n = array.len();
        (0..n)
            .map(|i| {
                let pos = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
                curve_level(array, pos) as f32
            })
            .collect()
    }
}

impl SignalNode for WavetableOscillator {
    fn name(&self) -> &str { "WavetableOscillator" }

    fn init(&mut self, ctx: SynthContext) {
        self.phase = 0.0;
        self.increment = self.frequency * self.table.len() as f64 / ctx.rate();
    }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let len = self.table.len();
        let i = self.phase as usize % len;
        let j = (i + 1) % len;
        let frac = (self.phase - self.phase.floor()) as f32;
        let v = (self.table[i] + (self.table[j] - self.table[i]) * frac) * self.amplitude;

        let increment = match self.pitch {
            Some((id, factor)) => {
                let c = synth.control(id).clamp(-1.0, 1.0) as f64;
                self.increment * factor.powf(c)
            }
            None => self.increment,
        };
        self.phase = (self.phase + increment) % len as f64;
        [v; MAX_CHANNELS]
    }
}

/// Uniform white noise in `[-32000, 32000]`, independent per channel
pub struct Noise {
    seed: u64,
    rng: fastrand::Rng,
}

impl Noise {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl SignalNode for Noise {
    fn name(&self) -> &str { "Noise" }

    fn init(&mut self, _ctx: SynthContext) {
        self.rng = fastrand::Rng::with_seed(self.seed);
    }

    fn next_value(&mut self, _synth: &mut Synth) -> Frame {
        let mut frame = [0.0; MAX_CHANNELS];
        for v in &mut frame {
            *v = ((self.rng.uniform() * 2.0 - 1.0) * NOISE_PEAK) as f32;
        }
        frame
    }
}

/// Sine computed from the clock; meant to be pulled at control rate
pub struct SineLfo {
    frequency: f64,
    amplitude: f64,
    phase: f64,
    rate: f64,
}

impl SineLfo {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
            phase: 0.0,
            rate: 1.0,
        }
    }

    /// Start phase in radians
    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }
}

impl SignalNode for SineLfo {
    fn name(&self) -> &str { "SineLfo" }

    fn init(&mut self, ctx: SynthContext) {
        self.rate = ctx.rate();
    }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let t = synth.clock() as f64 / self.rate;
        let v = self.amplitude * (TAU * self.frequency * t + self.phase).sin();
        [v as f32; MAX_CHANNELS]
    }
}

pub struct Constant {
    value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl SignalNode for Constant {
    fn name(&self) -> &str { "Constant" }

    fn next_value(&mut self, _synth: &mut Synth) -> Frame {
        [self.value; MAX_CHANNELS]
    }
}

/// A weighted array stretched over `frames` ticks, mapped to `-1..1`.
/// Holds the last value after the end.
pub struct ArrayCurve {
    array: WeightedArray,
    frames: usize,
}

impl ArrayCurve {
    pub fn new(array: WeightedArray, frames: usize) -> Self {
        Self { array, frames }
    }
}

impl SignalNode for ArrayCurve {
    fn name(&self) -> &str { "ArrayCurve" }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let pos = if self.frames > 1 {
            synth.clock() as f64 / (self.frames - 1) as f64
        } else {
            0.0
        };
        [curve_level(&self.array, pos) as f32; MAX_CHANNELS]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(synth: &mut Synth, id: NodeId, frames: usize) -> Vec<f32> {
        let mut out = FloatSample::new(1, synth.sampling_rate());
        synth.run(&mut out, id, frames, 0.0);
        out.data().to_vec()
    }

    #[test]
    fn test_sample_input_then_silence() {
        let mut synth = Synth::new(1, 1000);
        let src = FloatSample::from_short(&[5, 6], 1, 1000);
        let id = synth.add(SampleInput::new(src));
        assert_eq!(render(&mut synth, id, 4), vec![5.0, 6.0, 0.0, 0.0]);
        assert_eq!(render(&mut synth, id, 2), vec![5.0, 6.0]);
    }

    #[test]
    fn test_oscillator_steps_through_table() {
        let mut synth = Synth::new(1, 8);
        let id = synth.add(WavetableOscillator::new(vec![0.0, 1.0, 0.0, -1.0], 1.0, 2.0));
        // increment = 1 * 4 / 8 = 0.5
        assert_eq!(render(&mut synth, id, 4), vec![0.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_oscillator_pitch_control_doubles_rate() {
        let mut synth = Synth::new(1, 8);
        let up = synth.add(Constant::new(1.0));
        let osc = WavetableOscillator::new(vec![0.0, 1.0, 0.0, -1.0], 1.0, 1.0).with_pitch_control(up, 2.0);
        let id = synth.add(osc);
        assert_eq!(render(&mut synth, id, 4), vec![0.0, 1.0, 0.0, -1.0]);
    }

    #[test]
    fn test_noise_bounded_and_repeatable() {
        let mut synth = Synth::new(2, 1000);
        let id = synth.add(Noise::new(7));
        let mut a = FloatSample::new(2, 1000);
        let mut b = FloatSample::new(2, 1000);
        synth.run(&mut a, id, 500, 0.0);
        synth.run(&mut b, id, 500, 0.0);
        assert_eq!(a, b);
        assert!(a.data().iter().all(|v| v.abs() <= 32000.0));
        assert!(a.data().chunks(2).any(|f| f[0] != f[1]));
    }

    #[test]
    fn test_array_curve_maps_range() {
        let mut synth = Synth::new(1, 1000);
        let array = WeightedArray::from_values(vec![0, 100], 0, 100);
        let id = synth.add(ArrayCurve::new(array, 3));
        assert_eq!(render(&mut synth, id, 4), vec![-1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_sine_lfo_quarter_period() {
        let mut synth = Synth::new(1, 4);
        let id = synth.add(SineLfo::new(1.0, 0.5));
        let out = render(&mut synth, id, 2);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_table_from_array() {
        let array = WeightedArray::from_values(vec![-100, 0, 100], -100, 100);
        assert_eq!(WavetableOscillator::table_from_array(&array), vec![-1.0, 0.0, 1.0]);
    }
}
