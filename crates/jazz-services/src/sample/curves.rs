//! Painting weighted-array curves onto a sample range

use jazz_core::WeightedArray;

use super::buffer::{SampleBuffer, semitone_ratio};

/// Curve value at `pos ∈ [0, 1]` mapped so that `min..max` spans `-1..1`
pub fn curve_level(curve: &WeightedArray, pos: f64) -> f64 {
    let v = curve_value(curve, pos);
    let center = (curve.min() + curve.max()) as f64 * 0.5;
    let half = (curve.max() - curve.min()) as f64 * 0.5;
    if half <= 0.0 { 0.0 } else { ((v - center) / half).clamp(-1.0, 1.0) }
}

/// Raw interpolated curve value at `pos ∈ [0, 1]`
pub fn curve_value(curve: &WeightedArray, pos: f64) -> f64 {
    curve.fractional_get(pos.clamp(0.0, 1.0) * (curve.len() - 1) as f64)
}

fn frame_pos(k: usize, frames: usize) -> f64 {
    if frames <= 1 { 0.0 } else { k as f64 / (frames - 1) as f64 }
}

fn clamp_short(v: f64) -> i16 {
    v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Gain each frame of `[from, to)` by `curve / 100`
pub fn apply_volume_curve(buf: &mut SampleBuffer, from: usize, to: usize, curve: &WeightedArray) {
    let mut f = buf.to_float(from, to);
    let ch = f.channels();
    let frames = f.frames();
    for (k, frame) in f.data_mut().chunks_exact_mut(ch).enumerate() {
        let gain = curve_value(curve, frame_pos(k, frames)) / 100.0;
        frame.iter_mut().for_each(|v| *v = clamp_short(*v as f64 * gain) as f32);
    }
    write_back(buf, from, to, &f.to_short());
}

/// Pan `[from, to)` with a `-100..100` curve; positive values attenuate
/// channel 1, negative values channel 2. Mono buffers are left alone.
pub fn apply_pan_curve(buf: &mut SampleBuffer, from: usize, to: usize, curve: &WeightedArray) {
    if buf.channels() != 2 {
        return;
    }
    let mut f = buf.to_float(from, to);
    let frames = f.frames();
    for (k, frame) in f.data_mut().chunks_exact_mut(2).enumerate() {
        let p = (curve_value(curve, frame_pos(k, frames)) / 100.0).clamp(-1.0, 1.0) as f32;
        if p > 0.0 {
            frame[0] *= 1.0 - p;
        } else if p < 0.0 {
            frame[1] *= 1.0 + p;
        }
    }
    write_back(buf, from, to, &f.to_short());
}

/// Variable-rate resampling of `[from, to)`: the curve gives the pitch
/// shift in semitones along the range. The range may change length.
pub fn apply_pitch_curve(buf: &mut SampleBuffer, from: usize, to: usize, curve: &WeightedArray) {
    let src = buf.to_float(from, to);
    let frames = src.frames();
    if frames == 0 {
        return;
    }
    let ch = src.channels();
    let mut out = Vec::with_capacity(src.len());
    let mut frame = [0.0f32; 2];
    let mut x = 0.0;
    while src.get_sample(x, &mut frame) {
        out.extend(frame[..ch].iter().map(|&v| clamp_short(v as f64)));
        let semis = curve_value(curve, x / frames as f64);
        x += semitone_ratio(semis);
    }
    write_back(buf, from, to, &out);
}

/// Waveshaping: the curve is a transfer function from input amplitude
/// (`-32768..32767` across the array) to output level (`min..max` mapped
/// to full scale).
pub fn apply_distortion(buf: &mut SampleBuffer, from: usize, to: usize, curve: &WeightedArray) {
    let f = buf.to_float(from, to);
    let shaped: Vec<i16> = f
        .data()
        .iter()
        .map(|&v| {
            let pos = (v as f64 + 32768.0) / 65535.0;
            clamp_short(curve_level(curve, pos) * 32767.0)
        })
        .collect();
    write_back(buf, from, to, &shaped);
}

fn write_back(buf: &mut SampleBuffer, from: usize, to: usize, data: &[i16]) {
    let patch = SampleBuffer::with_data(buf.channels(), buf.sampling_rate(), data.to_vec());
    buf.paste_ovr(&patch, from, to);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: i32, min: i32, max: i32) -> WeightedArray {
        WeightedArray::from_values(vec![value; 4], min, max)
    }

    #[test]
    fn test_volume_curve_ramps() {
        let mut buf = SampleBuffer::with_data(1, 44100, vec![1000; 5]);
        let ramp = WeightedArray::from_values(vec![0, 100], 0, 100);
        apply_volume_curve(&mut buf, 0, 5, &ramp);
        assert_eq!(buf.data(), &[0, 250, 500, 750, 1000]);
    }

    #[test]
    fn test_volume_curve_only_touches_range() {
        let mut buf = SampleBuffer::with_data(2, 44100, vec![100; 8]);
        apply_volume_curve(&mut buf, 2, 6, &flat(50, 0, 100));
        assert_eq!(buf.data(), &[100, 100, 50, 50, 50, 50, 100, 100]);
    }

    #[test]
    fn test_pan_curve() {
        let mut buf = SampleBuffer::with_data(2, 44100, vec![100; 4]);
        apply_pan_curve(&mut buf, 0, 4, &flat(100, -100, 100));
        assert_eq!(buf.data(), &[0, 100, 0, 100]);

        let mut buf = SampleBuffer::with_data(2, 44100, vec![100; 4]);
        apply_pan_curve(&mut buf, 0, 4, &flat(-50, -100, 100));
        assert_eq!(buf.data(), &[100, 50, 100, 50]);
    }

    #[test]
    fn test_pitch_curve_octave_halves_length() {
        let data: Vec<i16> = (0..100).collect();
        let mut buf = SampleBuffer::with_data(1, 44100, data);
        apply_pitch_curve(&mut buf, 0, 100, &flat(12, -24, 24));
        assert_eq!(buf.len(), 50);
        assert_eq!(buf.data()[3], 6);

        let mut same = SampleBuffer::with_data(1, 44100, vec![3, 4, 5]);
        apply_pitch_curve(&mut same, 0, 3, &flat(0, -24, 24));
        assert_eq!(same.data(), &[3, 4, 5]);
    }

    #[test]
    fn test_distortion_identity_and_clip() {
        let linear = WeightedArray::from_values(vec![-100, 100], -100, 100);
        let mut buf = SampleBuffer::with_data(1, 44100, vec![-32768, 0, 16384, 32767]);
        apply_distortion(&mut buf, 0, 4, &linear);
        let d = buf.data();
        assert_eq!(d[0], -32767);
        assert!(d[1].abs() <= 1);
        assert!((d[2] - 16384).abs() <= 2);
        assert_eq!(d[3], 32767);

        let mut muted = SampleBuffer::with_data(1, 44100, vec![1000, -1000]);
        apply_distortion(&mut muted, 0, 2, &flat(0, -100, 100));
        assert_eq!(muted.data(), &[0, 0]);
    }
}
