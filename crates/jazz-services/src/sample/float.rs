//! Floating point sample used for effect processing and graph I/O

use jazz_core::RandomSource;

/// Largest magnitude written back into 16-bit storage
pub const SHORT_PEAK: f32 = 32766.0;

/// Interleaved float samples with a read/write cursor.
///
/// The cursor (`current`) is used by the graph adaptor and by the
/// note-framing helpers: [`FloatSample::set_note`] positions it,
/// [`FloatSample::add_out`] and [`FloatSample::get_in`] advance it by one
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatSample {
    data: Vec<f32>,
    channels: usize,
    sampling_rate: u32,
    current: usize,
    note_end: usize,
}

impl FloatSample {
    pub fn new(channels: usize, sampling_rate: u32) -> Self {
        Self {
            data: Vec::new(),
            channels: channels.max(1),
            sampling_rate,
            current: 0,
            note_end: 0,
        }
    }

    pub fn from_short(samples: &[i16], channels: usize, sampling_rate: u32) -> Self {
        let mut f = Self::new(channels, sampling_rate);
        f.data = samples.iter().map(|&s| s as f32).collect();
        let aligned = f.align(f.data.len());
        f.data.truncate(aligned);
        f
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn set_current(&mut self, pos: usize) {
        self.current = self.align(pos);
    }

    /// Round an offset down to a frame boundary
    pub fn align(&self, offs: usize) -> usize {
        offs - offs % self.channels
    }

    /// Resize to `frames` frames, zeroing everything
    pub fn reset(&mut self, frames: usize) {
        self.data.clear();
        self.data.resize(frames * self.channels, 0.0);
        self.current = 0;
        self.note_end = 0;
    }

    /// Grow (never shrink) to at least `len` samples
    pub fn assure_length(&mut self, len: usize) {
        let len = len.div_ceil(self.channels) * self.channels;
        if self.data.len() < len {
            self.data.resize(len, 0.0);
        }
    }

    fn range(&self, from: usize, to: usize) -> (usize, usize) {
        let to = self.align(to.min(self.data.len()));
        let from = self.align(from.min(to));
        (from, to)
    }

    /// Largest magnitude in `[from, to)`
    pub fn peak(&self, from: usize, to: usize) -> f32 {
        let (from, to) = self.range(from, to);
        self.data[from..to].iter().fold(0.0f32, |m, v| m.max(v.abs()))
    }

    /// Scale `[from, to)` so its peak becomes `max_value`
    pub fn rescale(&mut self, from: usize, to: usize, max_value: f32) {
        let peak = self.peak(from, to);
        if peak <= 0.0 {
            return;
        }
        let factor = max_value / peak;
        let (from, to) = self.range(from, to);
        self.data[from..to].iter_mut().for_each(|v| *v *= factor);
    }

    /// Scale down only when the range would clip in 16-bit storage
    pub fn rescale_to_short(&mut self, from: usize, to: usize) {
        if self.peak(from, to) > SHORT_PEAK {
            self.rescale(from, to, SHORT_PEAK);
        }
    }

    /// Scale the whole sample to a peak of 1.0
    pub fn normalize(&mut self) {
        let len = self.data.len();
        self.rescale(0, len, 1.0);
    }

    /// Replace the contents with a normalized Hanning window of `size`
    /// samples per channel
    pub fn hanning_window(&mut self, size: usize) {
        self.reset(size);
        let ch = self.channels;
        for i in 0..size {
            let w = -(std::f64::consts::TAU * i as f64 / size as f64).cos() * 0.5 + 0.5;
            self.data[i * ch..(i + 1) * ch].fill(w as f32);
        }
        self.normalize();
    }

    /// Add delayed copies at `k * delay` frames with amplitude `ampl^k`.
    ///
    /// Runs from the end towards the start, so every tap reads the
    /// unprocessed signal.
    pub fn echo(&mut self, num: usize, delay: usize, ampl: f32) {
        let taps: Vec<(usize, f32)> = (1..=num)
            .map(|k| (k * delay * self.channels, ampl.powi(k as i32)))
            .collect();
        self.apply_taps(&taps, None);
    }

    /// Echo with a random spacing between `delay/2` and `3*delay/2` frames
    pub fn rnd_echo<R: RandomSource + ?Sized>(&mut self, num: usize, delay: usize, ampl: f32, rng: &mut R) {
        let taps = self.random_taps(num, delay, ampl, rng);
        self.apply_taps(&taps, None);
    }

    /// Random echo with independent taps for each stereo channel
    pub fn rnd_echo_stereo<R: RandomSource + ?Sized>(&mut self, num: usize, delay: usize, ampl: f32, rng: &mut R) {
        if self.channels != 2 {
            self.rnd_echo(num, delay, ampl, rng);
            return;
        }
        let left = self.random_taps(num, delay, ampl, rng);
        let right = self.random_taps(num, delay, ampl, rng);
        self.apply_taps(&left, Some(0));
        self.apply_taps(&right, Some(1));
    }

    fn random_taps<R: RandomSource + ?Sized>(&self, num: usize, delay: usize, ampl: f32, rng: &mut R) -> Vec<(usize, f32)> {
        let mut offset = 0;
        let mut gain = 1.0;
        (0..num)
            .map(|_| {
                offset += delay / 2 + rng.below(delay.max(1));
                gain *= ampl;
                (offset.max(1) * self.channels, gain)
            })
            .collect()
    }

    fn apply_taps(&mut self, taps: &[(usize, f32)], channel: Option<usize>) {
        let ch = self.channels;
        for i in (0..self.data.len()).rev() {
            if channel.is_some_and(|c| i % ch != c) {
                continue;
            }
            let mut acc = 0.0;
            for &(offset, gain) in taps {
                if offset > i {
                    break;
                }
                acc += self.data[i - offset] * gain;
            }
            self.data[i] += acc;
        }
    }

    /// Cut off the tail after the last sample louder than `peak`
    pub fn remove_trailing_silence(&mut self, peak: f32) {
        let len = match self.data.iter().rposition(|v| v.abs() > peak) {
            Some(last) => (last / self.channels + 1) * self.channels,
            None => 0,
        };
        self.data.truncate(len);
        self.current = self.current.min(len);
    }

    /// Average stereo frames into a mono sample
    pub fn convert_to_mono(&mut self) {
        if self.channels != 2 {
            return;
        }
        let frames = self.frames();
        for f in 0..frames {
            self.data[f] = (self.data[2 * f] + self.data[2 * f + 1]) * 0.5;
        }
        self.data.truncate(frames);
        self.channels = 1;
        self.current /= 2;
    }

    /// Interpolated frame at fractional frame position `x`.
    /// Returns `false` (leaving `out` untouched) past the end.
    pub fn get_sample(&self, x: f64, out: &mut [f32]) -> bool {
        let frames = self.frames();
        if x < 0.0 || frames == 0 {
            return false;
        }
        let i = x.floor() as usize;
        if i >= frames {
            return false;
        }
        let j = (i + 1).min(frames - 1);
        let frac = (x - i as f64) as f32;
        let ch = self.channels;
        for (c, o) in out.iter_mut().take(ch).enumerate() {
            let a = self.data[i * ch + c];
            let b = self.data[j * ch + c];
            *o = a + (b - a) * frac;
        }
        true
    }

    /// Position the cursor at `start` seconds and reserve `duration`
    /// seconds of output. Returns the note length in frames.
    pub fn set_note(&mut self, start: f64, duration: f64) -> usize {
        let rate = self.sampling_rate as f64;
        let start = (start.max(0.0) * rate) as usize;
        let frames = (duration.max(0.0) * rate) as usize;
        self.assure_length((start + frames) * self.channels);
        self.current = start * self.channels;
        self.note_end = (start + frames) * self.channels;
        frames
    }

    /// Close the current note; returns the cursor position in frames
    pub fn end_note(&mut self) -> usize {
        let pos = self.current.max(self.note_end);
        self.current = pos;
        self.note_end = pos;
        pos / self.channels
    }

    /// Add one frame at the cursor and advance it
    pub fn add_out(&mut self, frame: &[f32]) {
        let ch = self.channels;
        self.assure_length(self.current + ch);
        for (dst, src) in self.data[self.current..self.current + ch].iter_mut().zip(frame) {
            *dst += *src;
        }
        self.current += ch;
    }

    /// Read one frame at the cursor and advance it. Past the end the
    /// frame is silent and `false` is returned.
    pub fn get_in(&mut self, frame: &mut [f32]) -> bool {
        let ch = self.channels;
        if self.current + ch > self.data.len() {
            frame.iter_mut().for_each(|v| *v = 0.0);
            return false;
        }
        frame[..ch].copy_from_slice(&self.data[self.current..self.current + ch]);
        self.current += ch;
        true
    }

    /// Round and clamp to 16-bit
    pub fn to_short(&self) -> Vec<i16> {
        self.data
            .iter()
            .map(|v| v.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect()
    }
}
