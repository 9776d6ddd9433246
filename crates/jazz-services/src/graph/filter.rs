//! One-pole and resonant filters with an optional swept corner frequency

use std::f64::consts::TAU;

use super::{Frame, MAX_CHANNELS, NodeId, SignalNode, Synth, SynthContext};

/// A single-channel filter section
pub trait OpFilter: Default + Send {
    const NAME: &'static str;

    /// Derive coefficients. `bandwidth` is ignored by the one-pole types.
    fn setup(&mut self, sampling_rate: f64, freq: f64, bandwidth: f64);

    /// Clear the state, keeping the coefficients
    fn reset(&mut self);

    fn process(&mut self, x: f32) -> f32;
}

/// Shared one-pole feedback coefficient for a corner at `freq`
fn one_pole(sampling_rate: f64, freq: f64) -> f64 {
    let b = 2.0 - (TAU * freq / sampling_rate).cos();
    b - (b * b - 1.0).sqrt()
}

#[derive(Debug, Default, Clone)]
pub struct Lowpass {
    c1: f64,
    c2: f64,
    y1: f64,
}

impl OpFilter for Lowpass {
    const NAME: &'static str = "Lowpass";

    fn setup(&mut self, sampling_rate: f64, freq: f64, _bandwidth: f64) {
        self.c2 = one_pole(sampling_rate, freq);
        self.c1 = 1.0 - self.c2;
    }

    fn reset(&mut self) {
        self.y1 = 0.0;
    }

    fn process(&mut self, x: f32) -> f32 {
        self.y1 = self.c1 * x as f64 + self.c2 * self.y1;
        self.y1 as f32
    }
}

#[derive(Debug, Default, Clone)]
pub struct Highpass {
    c2: f64,
    /// Previous output minus previous input
    q: f64,
}

impl OpFilter for Highpass {
    const NAME: &'static str = "Highpass";

    fn setup(&mut self, sampling_rate: f64, freq: f64, _bandwidth: f64) {
        self.c2 = one_pole(sampling_rate, freq);
    }

    fn reset(&mut self) {
        self.q = 0.0;
    }

    fn process(&mut self, x: f32) -> f32 {
        let x = x as f64;
        let y = self.c2 * (self.q + x);
        self.q = y - x;
        y as f32
    }
}

/// Two-pole resonator, unity gain at the centre frequency
#[derive(Debug, Default, Clone)]
pub struct Bandpass {
    c1: f64,
    c2: f64,
    c3: f64,
    y1: f64,
    y2: f64,
}

impl OpFilter for Bandpass {
    const NAME: &'static str = "Bandpass";

    fn setup(&mut self, sampling_rate: f64, freq: f64, bandwidth: f64) {
        self.c3 = (-TAU * bandwidth / sampling_rate).exp();
        self.c2 = 4.0 * self.c3 * (TAU * freq / sampling_rate).cos() / (1.0 + self.c3);
        self.c1 = (1.0 - self.c3) * (1.0 - self.c2 * self.c2 / (4.0 * self.c3)).max(0.0).sqrt();
    }

    fn reset(&mut self) {
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    fn process(&mut self, x: f32) -> f32 {
        let y = self.c1 * x as f64 + self.c2 * self.y1 - self.c3 * self.y2;
        self.y2 = self.y1;
        self.y1 = y;
        y as f32
    }
}

/// Notch: the resonator's poles with a zero pair on the unit circle at
/// the centre frequency, unity gain at DC
#[derive(Debug, Default, Clone)]
pub struct Bandstop {
    gain: f64,
    cos2: f64,
    c2: f64,
    c3: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl OpFilter for Bandstop {
    const NAME: &'static str = "Bandstop";

    fn setup(&mut self, sampling_rate: f64, freq: f64, bandwidth: f64) {
        let mut poles = Bandpass::default();
        poles.setup(sampling_rate, freq, bandwidth);
        self.c2 = poles.c2;
        self.c3 = poles.c3;
        self.cos2 = 2.0 * (TAU * freq / sampling_rate).cos();
        let zeros_at_dc = 2.0 - self.cos2;
        self.gain = if zeros_at_dc.abs() < f64::EPSILON {
            1.0
        } else {
            (1.0 - self.c2 + self.c3) / zeros_at_dc
        };
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    fn process(&mut self, x: f32) -> f32 {
        let x = x as f64;
        let y = self.gain * (x - self.cos2 * self.x1 + self.x2) + self.c2 * self.y1 - self.c3 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y as f32
    }
}

/// Applies one filter section per channel. With a sweep control `c` the
/// corner moves to `freq * factor^c`, recomputed every tick.
pub struct FilterNode<F: OpFilter> {
    input: NodeId,
    filters: [F; MAX_CHANNELS],
    freq: f64,
    bandwidth: f64,
    sweep: Option<(NodeId, f64)>,
    rate: f64,
}

impl<F: OpFilter> FilterNode<F> {
    pub fn new(ctx: SynthContext, input: NodeId, freq: f64, bandwidth: f64) -> Self {
        Self {
            input,
            filters: [F::default(), F::default()],
            freq,
            bandwidth,
            sweep: None,
            rate: ctx.rate(),
        }
    }

    pub fn with_sweep(mut self, control: NodeId, factor: f64) -> Self {
        self.sweep = Some((control, factor));
        self
    }

    fn setup(&mut self, freq: f64) {
        for f in &mut self.filters {
            f.setup(self.rate, freq, self.bandwidth);
        }
    }
}

impl<F: OpFilter> SignalNode for FilterNode<F> {
    fn name(&self) -> &str { F::NAME }

    fn init(&mut self, ctx: SynthContext) {
        self.rate = ctx.rate();
        self.setup(self.freq);
        self.filters.iter_mut().for_each(F::reset);
    }

    fn next_value(&mut self, synth: &mut Synth) -> Frame {
        let x = synth.sample(self.input);
        if let Some((id, factor)) = self.sweep {
            let c = synth.control(id).clamp(-1.0, 1.0) as f64;
            self.setup(self.freq * factor.powf(c));
        }
        let mut out = [0.0; MAX_CHANNELS];
        for (c, f) in self.filters.iter_mut().enumerate() {
            out[c] = f.process(x[c]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<F: OpFilter>(freq: f64, bandwidth: f64, input: impl Fn(usize) -> f32, n: usize) -> Vec<f32> {
        let mut f = F::default();
        f.setup(44100.0, freq, bandwidth);
        (0..n).map(|i| f.process(input(i))).collect()
    }

    fn sine(freq: f64) -> impl Fn(usize) -> f32 {
        move |i| (TAU * freq * i as f64 / 44100.0).sin() as f32
    }

    fn tail_peak(v: &[f32]) -> f32 {
        v[v.len() / 2..].iter().fold(0.0f32, |m, x| m.max(x.abs()))
    }

    #[test]
    fn test_lowpass_dc_and_highs() {
        let dc = run::<Lowpass>(1000.0, 0.0, |_| 1.0, 4000);
        assert!((dc[3999] - 1.0).abs() < 1e-4);
        let high = run::<Lowpass>(200.0, 0.0, sine(10000.0), 8000);
        assert!(tail_peak(&high) < 0.05);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let dc = run::<Highpass>(1000.0, 0.0, |_| 1.0, 4000);
        assert!(dc[3999].abs() < 1e-4);
        let high = run::<Highpass>(200.0, 0.0, sine(10000.0), 8000);
        assert!(tail_peak(&high) > 0.9);
    }

    #[test]
    fn test_bandpass_and_bandstop_at_centre() {
        let centre = run::<Bandpass>(1000.0, 100.0, sine(1000.0), 20000);
        assert!((tail_peak(&centre) - 1.0).abs() < 0.1);
        let off = run::<Bandpass>(1000.0, 100.0, sine(8000.0), 20000);
        assert!(tail_peak(&off) < 0.1);
        let notch = run::<Bandstop>(1000.0, 100.0, sine(1000.0), 20000);
        assert!(tail_peak(&notch) < 0.01);
        let pass = run::<Bandstop>(1000.0, 100.0, sine(8000.0), 20000);
        assert!(tail_peak(&pass) > 0.9);
        let dc = run::<Bandstop>(1000.0, 100.0, |_| 1.0, 20000);
        assert!((dc[19999] - 1.0).abs() < 1e-3);
    }
}
