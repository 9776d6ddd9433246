//! Effect entry points operating on sample buffers

use jazz_core::WeightedArray;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::effects::{ChorusParams, ReverbParams, chorus, room};
use super::filter::{Bandpass, Bandstop, FilterNode, Highpass, Lowpass, OpFilter};
use super::modifiers::NMixer;
use super::sources::{ArrayCurve, Constant, SampleInput, SineLfo, WavetableOscillator};
use super::{NodeId, Synth};
use crate::sample::{FloatSample, SampleBuffer};

/// Run `build` over `[from, to)` of `buf` and replace the range with the
/// rendered output (including `extra_seconds` of tail), scaled down if it
/// would clip
fn process_range(
    buf: &mut SampleBuffer,
    from: usize,
    to: usize,
    extra_seconds: f64,
    build: impl FnOnce(&mut Synth, NodeId) -> NodeId,
) -> bool {
    let dry = buf.to_float(from, to);
    if dry.is_empty() {
        return false;
    }
    let frames = dry.frames();
    let mut synth = Synth::new(buf.channels(), buf.sampling_rate());
    let input = synth.add(SampleInput::new(dry));
    let output = build(&mut synth, input);

    let mut wet = FloatSample::new(buf.channels(), buf.sampling_rate());
    synth.run(&mut wet, output, frames, extra_seconds);
    let len = wet.len();
    wet.rescale_to_short(0, len);

    let mut patch = SampleBuffer::new(buf.channels(), buf.sampling_rate());
    patch.set_from_float(&wet);
    buf.paste_ovr(&patch, from, to);
    true
}

/// Room reverb over `[from, to)`; the tail extends the range by the
/// reverb time
pub fn sig_reverb(buf: &mut SampleBuffer, from: usize, to: usize, params: &ReverbParams) {
    if process_range(buf, from, to, params.reverb_time, |synth, input| room(synth, input, params)) {
        info!(from, to, reverb_time = params.reverb_time, "Reverb applied");
    }
}

pub fn sig_chorus(buf: &mut SampleBuffer, from: usize, to: usize, params: &ChorusParams) {
    let tail = params.delay + params.depth.abs();
    if process_range(buf, from, to, tail, |synth, input| chorus(synth, input, params)) {
        info!(from, to, "Chorus applied");
    }
}

/// One oscillator of the wavetable synth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WavSynthVoice {
    /// One waveform cycle
    pub waveform: WeightedArray,
    pub frequency: f64,
    /// Mix level, 0..=1
    pub volume: f64,
    /// Vibrato rate in Hz, 0 for none
    pub vibrato_freq: f64,
    /// Pitch ratio at full vibrato deflection
    pub vibrato_factor: f64,
}

impl Default for WavSynthVoice {
    fn default() -> Self {
        let waveform = WavetableOscillator::sine_table(64)
            .into_iter()
            .map(|v| (v * 100.0).round() as i32)
            .collect();
        Self {
            waveform: WeightedArray::from_values(waveform, -100, 100),
            frequency: 440.0,
            volume: 1.0,
            vibrato_freq: 0.0,
            vibrato_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WavSynthParams {
    pub voices: Vec<WavSynthVoice>,
    /// Seconds
    pub duration: f64,
    /// Peak of the rendered result
    pub peak: f32,
}

impl Default for WavSynthParams {
    fn default() -> Self {
        Self {
            voices: vec![WavSynthVoice::default()],
            duration: 1.0,
            peak: 20000.0,
        }
    }
}

/// Replace the buffer with the mix of the configured oscillators
pub fn sig_wavsynth(buf: &mut SampleBuffer, params: &WavSynthParams) {
    let mut synth = Synth::new(buf.channels(), buf.sampling_rate());
    let mut mix = NMixer::new();
    for voice in &params.voices {
        let table = WavetableOscillator::table_from_array(&voice.waveform);
        let mut osc = WavetableOscillator::new(table, voice.frequency, 1.0);
        if voice.vibrato_freq > 0.0 {
            let lfo = synth.add(SineLfo::new(voice.vibrato_freq, 1.0));
            osc = osc.with_pitch_control(lfo, voice.vibrato_factor);
        }
        let osc = synth.add(osc);
        let level = synth.add(Constant::new(voice.volume.clamp(0.0, 1.0).sqrt() as f32));
        mix = mix.with_input(osc, Some(level));
    }
    let mix = synth.add(mix);

    let mut out = FloatSample::new(buf.channels(), buf.sampling_rate());
    let frames = synth.context().frames(params.duration);
    synth.run(&mut out, mix, frames, 0.0);
    let len = out.len();
    out.rescale(0, len, params.peak);
    buf.set_from_float(&out);
    info!(voices = params.voices.len(), frames, "Wavetable synth rendered");
}

/// Filter type swept by [`sig_wah`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WahFilter {
    Lowpass,
    Highpass,
    #[default]
    Bandpass,
    Bandstop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WahParams {
    pub filter: WahFilter,
    /// Sweep over the range; `min..max` maps to `freq/factor..freq*factor`
    pub curve: WeightedArray,
    /// Centre frequency, Hz
    pub frequency: f64,
    pub factor: f64,
    /// Bandwidth of the band filters, Hz
    pub bandwidth: f64,
}

impl Default for WahParams {
    fn default() -> Self {
        Self {
            filter: WahFilter::default(),
            curve: WeightedArray::from_values(vec![-100, 100, -100], -100, 100),
            frequency: 1000.0,
            factor: 4.0,
            bandwidth: 200.0,
        }
    }
}

fn wah_node<F: OpFilter + 'static>(synth: &mut Synth, input: NodeId, sweep: NodeId, params: &WahParams) -> NodeId {
    let ctx = synth.context();
    let filter = FilterNode::<F>::new(ctx, input, params.frequency, params.bandwidth).with_sweep(sweep, params.factor);
    synth.add(filter)
}

/// Filter `[from, to)` with a corner frequency swept along `params.curve`
pub fn sig_wah(buf: &mut SampleBuffer, from: usize, to: usize, params: &WahParams) {
    let frames = buf.to_float(from, to).frames();
    let applied = process_range(buf, from, to, 0.0, |synth, input| {
        let sweep = synth.add(ArrayCurve::new(params.curve.clone(), frames));
        match params.filter {
            WahFilter::Lowpass => wah_node::<Lowpass>(synth, input, sweep, params),
            WahFilter::Highpass => wah_node::<Highpass>(synth, input, sweep, params),
            WahFilter::Bandpass => wah_node::<Bandpass>(synth, input, sweep, params),
            WahFilter::Bandstop => wah_node::<Bandstop>(synth, input, sweep, params),
        }
    });
    if applied {
        info!(from, to, filter = ?params.filter, "Wah applied");
    }
}
