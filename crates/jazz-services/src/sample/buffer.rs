//! 16-bit interleaved sample buffer with splice edits and WAV I/O

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use super::float::FloatSample;
use super::wav::{read_wav, write_wav};
use super::SampleSet;
use crate::error::SampleError;

/// Semitone frequency ratio, `2^(1/12)`
pub const FSEMI: f64 = 1.059_463_094_359_295_3;

/// `FSEMI^semis`, exact at whole octaves
pub fn semitone_ratio(semis: f64) -> f64 {
    2f64.powf(semis / 12.0)
}

/// Default `rescale` target
pub const RESCALE_MAX: i16 = 32766;

/// Interleaved 16-bit sample data.
///
/// `len()` is always a multiple of `channels`; positional arguments are
/// rounded down to a frame boundary and clamped to the current length.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    data: Vec<i16>,
    channels: usize,
    sampling_rate: u32,
    /// Load gain, 0..=127
    pub volume: i32,
    /// Load pan, -64..=63
    pub pan: i32,
    /// Semitone offset applied while loading
    pub pitch: i32,
    file_name: Option<PathBuf>,
    dirty: bool,
    /// Reload from disk when the file changes underneath us
    pub external_flag: bool,
    external_mtime: Option<SystemTime>,
}

impl SampleBuffer {
    pub fn new(channels: usize, sampling_rate: u32) -> Self {
        Self {
            data: Vec::new(),
            channels: channels.clamp(1, 2),
            sampling_rate,
            volume: 127,
            pan: 0,
            pitch: 0,
            file_name: None,
            dirty: false,
            external_flag: false,
            external_mtime: None,
        }
    }

    pub fn for_set(set: &SampleSet) -> Self {
        Self::new(set.channels, set.sampling_rate)
    }

    /// Buffer holding `data`, truncated to whole frames
    pub fn with_data(channels: usize, sampling_rate: u32, data: Vec<i16>) -> Self {
        let mut buf = Self::new(channels, sampling_rate);
        buf.data = data;
        let aligned = buf.align(buf.data.len());
        buf.data.truncate(aligned);
        buf
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

    pub fn data(&self) -> &[i16] {
        &self.data
    }

    pub fn file_name(&self) -> Option<&Path> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, path: impl Into<PathBuf>) {
        self.file_name = Some(path.into());
        self.external_mtime = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Round an offset down to a frame boundary
    pub fn align(&self, offs: usize) -> usize {
        offs - offs % self.channels
    }

    fn range(&self, from: usize, to: usize) -> (usize, usize) {
        let to = self.align(to.min(self.data.len()));
        let from = self.align(from.min(to));
        (from, to)
    }

    /// Gains for (channel 1, channel 2) derived from `volume` and `pan`.
    /// Positive pan attenuates channel 1, negative pan channel 2.
    pub fn channel_gains(&self) -> (f64, f64) {
        let vol = self.volume.clamp(0, 127) as f64 / 127.0;
        let pan = self.pan.clamp(-64, 63);
        if pan > 0 {
            (vol * (64 - pan) as f64 / 64.0, vol)
        } else if pan < 0 {
            (vol, vol * (64 + pan) as f64 / 64.0)
        } else {
            (vol, vol)
        }
    }

    fn file_mtime(path: &Path) -> Result<SystemTime, SampleError> {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|source| SampleError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Load the file if it changed since the last load, or always when
    /// `force` is set. Returns whether the data was reloaded.
    pub fn load(&mut self, force: bool) -> Result<bool, SampleError> {
        let path = self.file_name.clone().ok_or(SampleError::NoFileName)?;
        let mtime = Self::file_mtime(&path)?;
        if !force && self.external_mtime == Some(mtime) {
            debug!(path = %path.display(), "Sample unchanged, skipping load");
            return Ok(false);
        }
        self.load_wav()?;
        self.external_mtime = Some(mtime);
        Ok(true)
    }

    /// Reload when `external_flag` is set and the file was modified
    pub fn check_external(&mut self) -> Result<bool, SampleError> {
        if !self.external_flag || self.file_name.is_none() {
            return Ok(false);
        }
        self.load(false)
    }

    /// Read `file_name` and convert it to this buffer's format. On
    /// failure the buffer is left unchanged.
    pub fn load_wav(&mut self) -> Result<(), SampleError> {
        let path = self.file_name.clone().ok_or(SampleError::NoFileName)?;
        let wav = read_wav(&path).inspect_err(|e| {
            warn!(path = %path.display(), code = e.code(), "Failed to load sample: {e}");
        })?;
        self.convert(&wav.bytes, wav.channels as usize, wav.bits_per_sample, wav.sample_rate);
        self.dirty = false;
        info!(
            path = %path.display(),
            channels = wav.channels,
            bits = wav.bits_per_sample,
            rate = wav.sample_rate,
            samples = self.data.len(),
            "Sample loaded"
        );
        Ok(())
    }

    /// Decode raw PCM (8 or 16 bit, 1 or 2 channels) into this buffer:
    /// widen to 16 bit, match the channel count, resample for rate and
    /// `pitch`, then apply `volume`/`pan`.
    pub fn convert(&mut self, raw: &[u8], channels: usize, bits: u16, rate: u32) {
        let mut samples: Vec<i16> = if bits == 8 {
            raw.iter().map(|&b| ((b ^ 0x80) as i8 as i16) << 8).collect()
        } else {
            raw.chunks_exact(2).map(|p| i16::from_le_bytes([p[0], p[1]])).collect()
        };

        match (channels, self.channels) {
            (1, 2) => samples = samples.iter().flat_map(|&s| [s, s]).collect(),
            (2, 1) => {
                samples = samples
                    .chunks_exact(2)
                    .map(|p| ((p[0] as i32 + p[1] as i32) / 2) as i16)
                    .collect()
            }
            _ => {}
        }
        self.data = samples;
        let aligned = self.align(self.data.len());
        self.data.truncate(aligned);

        let src_rate = rate as f64 * semitone_ratio(self.pitch as f64);
        if (src_rate - self.sampling_rate as f64).abs() > 0.5 {
            self.transpose(src_rate / self.sampling_rate as f64);
        }

        if self.volume != 127 || self.pan != 0 {
            let (g1, g2) = self.channel_gains();
            let ch = self.channels;
            // pan is meaningless for mono
            let mono = g1.max(g2);
            for (i, s) in self.data.iter_mut().enumerate() {
                let g = match (ch, i % 2) {
                    (1, _) => mono,
                    (_, 0) => g1,
                    _ => g2,
                };
                *s = (*s as f64 * g).round() as i16;
            }
        }
    }

    /// Copy `[from, to)` into `dst`, replacing its contents
    pub fn copy(&self, dst: &mut SampleBuffer, from: usize, to: usize) {
        let (from, to) = self.range(from, to);
        dst.data = self.data[from..to].to_vec();
        dst.channels = self.channels;
        dst.sampling_rate = self.sampling_rate;
        dst.dirty = true;
    }

    /// Copy `[from, to)` into `dst`, then delete it here
    pub fn cut(&mut self, dst: &mut SampleBuffer, from: usize, to: usize) {
        self.copy(dst, from, to);
        self.delete(from, to);
    }

    pub fn delete(&mut self, from: usize, to: usize) {
        let (from, to) = self.range(from, to);
        if from == to {
            return;
        }
        self.data.drain(from..to);
        self.dirty = true;
    }

    /// Insert `len` zero samples at `pos`
    pub fn insert_silence(&mut self, pos: usize, len: usize) {
        let pos = self.align(pos.min(self.data.len()));
        let len = self.align(len);
        if len == 0 {
            return;
        }
        self.data.splice(pos..pos, std::iter::repeat_n(0, len));
        self.dirty = true;
    }

    /// Insert `src` at `pos`
    pub fn paste_ins(&mut self, src: &SampleBuffer, pos: usize) {
        let pos = self.align(pos.min(self.data.len()));
        if src.is_empty() {
            return;
        }
        self.data.splice(pos..pos, src.data.iter().copied());
        self.dirty = true;
    }

    /// Mix `src` into the buffer starting at `pos`, growing as needed and
    /// scaling down if the sum would clip
    pub fn paste_mix(&mut self, src: &SampleBuffer, pos: usize) {
        if src.is_empty() {
            return;
        }
        let pos = self.align(pos.min(self.data.len()));
        let mut mix = self.to_float(0, self.data.len());
        mix.assure_length(pos + src.len());
        for (dst, &s) in mix.data_mut()[pos..pos + src.len()].iter_mut().zip(&src.data) {
            *dst += s as f32;
        }
        let len = mix.len();
        mix.rescale_to_short(0, len);
        self.set_from_float(&mix);
    }

    /// Replace `[from, to)` with the contents of `src`
    pub fn paste_ovr(&mut self, src: &SampleBuffer, from: usize, to: usize) {
        let (from, to) = self.range(from, to);
        self.data.splice(from..to, src.data.iter().copied());
        self.dirty = true;
    }

    /// Zero `len` samples at `offs`, extending the buffer if needed
    pub fn replace_silence(&mut self, offs: usize, len: usize) {
        let offs = self.align(offs);
        let end = offs + self.align(len);
        self.assure_length(end);
        self.data[offs..end].fill(0);
        self.dirty = true;
    }

    /// Reverse `[from, to)` sample by sample. For stereo this also swaps
    /// the channels within the range.
    pub fn reverse(&mut self, from: usize, to: usize) {
        let (from, to) = self.range(from, to);
        self.data[from..to].reverse();
        self.dirty = true;
    }

    /// Negate one channel
    pub fn flip(&mut self, channel: usize) {
        if channel >= self.channels {
            return;
        }
        for s in self.data.iter_mut().skip(channel).step_by(self.channels) {
            *s = s.saturating_neg();
        }
        self.dirty = true;
    }

    /// Resample by `factor` with linear interpolation; the new length is
    /// `floor(len / factor)` rounded down to a frame. Non-positive or
    /// non-finite factors leave the buffer untouched.
    pub fn transpose(&mut self, factor: f64) {
        if !(factor.is_finite() && factor > 0.0) || self.data.is_empty() {
            return;
        }
        let ch = self.channels;
        let frames = self.frames();
        let new_frames = self.align((self.data.len() as f64 / factor) as usize) / ch;
        let mut out = Vec::with_capacity(new_frames * ch);
        for f in 0..new_frames {
            let x = f as f64 * factor;
            let i = (x.floor() as usize).min(frames - 1);
            let j = (i + 1).min(frames - 1);
            let frac = x - i as f64;
            for c in 0..ch {
                let a = self.data[i * ch + c] as f64;
                let b = self.data[j * ch + c] as f64;
                out.push((a + (b - a) * frac).round() as i16);
            }
        }
        self.data = out;
        self.dirty = true;
    }

    /// Shift pitch by `semis` semitones
    pub fn transpose_semis(&mut self, semis: f64) {
        self.transpose(semitone_ratio(semis));
    }

    /// Grow with silence to at least `len` samples; never shrinks
    pub fn assure_length(&mut self, len: usize) {
        let len = len.div_ceil(self.channels) * self.channels;
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
    }

    pub fn peak(&self) -> i32 {
        self.data.iter().map(|&s| (s as i32).abs()).max().unwrap_or(0)
    }

    /// Scale the whole buffer so its peak becomes `max_value`
    pub fn rescale(&mut self, max_value: i16) {
        let peak = self.peak();
        if peak == 0 {
            return;
        }
        let factor = max_value as f64 / peak as f64;
        for s in &mut self.data {
            *s = (*s as f64 * factor).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        }
        self.dirty = true;
    }

    /// Write to `file_name`
    pub fn save(&mut self) -> Result<(), SampleError> {
        let path = self.file_name.clone().ok_or(SampleError::NoFileName)?;
        self.save_wav(&path)
    }

    /// Write a 16-bit PCM WAV and adopt `path` as the file name. Volume and
    /// pan are baked into the data, so they reset to neutral.
    pub fn save_wav(&mut self, path: &Path) -> Result<(), SampleError> {
        write_wav(path, &self.data, self.channels as u16, self.sampling_rate).inspect_err(|e| {
            warn!(path = %path.display(), "Failed to save sample: {e}");
        })?;
        self.file_name = Some(path.to_path_buf());
        self.external_mtime = Self::file_mtime(path).ok();
        self.dirty = false;
        self.volume = 127;
        self.pan = 0;
        info!(path = %path.display(), samples = self.data.len(), "Sample saved");
        Ok(())
    }

    /// Float copy of `[from, to)`
    pub fn to_float(&self, from: usize, to: usize) -> FloatSample {
        let (from, to) = self.range(from, to);
        FloatSample::from_short(&self.data[from..to], self.channels, self.sampling_rate)
    }

    /// Replace the contents with a float sample, clamped to 16 bit
    pub fn set_from_float(&mut self, src: &FloatSample) {
        self.channels = src.channels();
        self.sampling_rate = src.sampling_rate();
        self.data = src.to_short();
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(data: &[i16]) -> SampleBuffer {
        SampleBuffer::with_data(2, 44100, data.to_vec())
    }

    #[test]
    fn test_insert_silence_then_delete_restores() {
        let mut buf = stereo(&[1, 2, 3, 4, 5, 6]);
        let before = buf.data().to_vec();
        buf.insert_silence(2, 4);
        assert_eq!(buf.data(), &[1, 2, 0, 0, 0, 0, 3, 4, 5, 6]);
        buf.delete(2, 6);
        assert_eq!(buf.data(), before.as_slice());
    }

    #[test]
    fn test_positions_are_aligned() {
        let mut buf = stereo(&[1, 2, 3, 4, 5, 6]);
        buf.delete(1, 3);
        assert_eq!(buf.data(), &[3, 4, 5, 6]);
        buf.delete(10, 20);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_cut_and_paste_ins() {
        let mut buf = stereo(&[1, 2, 3, 4, 5, 6]);
        let mut clip = SampleBuffer::new(2, 44100);
        buf.cut(&mut clip, 0, 2);
        assert_eq!(clip.data(), &[1, 2]);
        assert_eq!(buf.data(), &[3, 4, 5, 6]);
        buf.paste_ins(&clip, 4);
        assert_eq!(buf.data(), &[3, 4, 5, 6, 1, 2]);
    }

    #[test]
    fn test_paste_mix_grows_and_rescales() {
        let mut buf = stereo(&[30000, 0]);
        let src = stereo(&[30000, 10, 5, 5]);
        buf.paste_mix(&src, 0);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.data()[0], 32766);
        assert!(buf.data()[1] > 0 && buf.data()[1] < 10);

        let mut quiet = stereo(&[1, 1]);
        quiet.paste_mix(&stereo(&[2, 2]), 2);
        assert_eq!(quiet.data(), &[1, 1, 2, 2]);
    }

    #[test]
    fn test_paste_ovr_and_replace_silence() {
        let mut buf = stereo(&[1, 2, 3, 4, 5, 6]);
        buf.paste_ovr(&stereo(&[9, 9, 8, 8]), 2, 4);
        assert_eq!(buf.data(), &[1, 2, 9, 9, 8, 8, 5, 6]);
        buf.replace_silence(6, 4);
        assert_eq!(buf.data(), &[1, 2, 9, 9, 8, 8, 0, 0, 0, 0]);
    }

    #[test]
    fn test_reverse_swaps_stereo_channels() {
        let mut buf = stereo(&[1, 2, 3, 4]);
        buf.reverse(0, 4);
        assert_eq!(buf.data(), &[4, 3, 2, 1]);
    }

    #[test]
    fn test_flip_one_channel() {
        let mut buf = stereo(&[1, 2, -32768, 4]);
        buf.flip(0);
        assert_eq!(buf.data(), &[-1, 2, 32767, 4]);
        buf.flip(5);
        assert_eq!(buf.data(), &[-1, 2, 32767, 4]);
    }

    #[test]
    fn test_transpose_halves_length() {
        let data: Vec<i16> = (0..100).collect();
        let mut buf = SampleBuffer::with_data(1, 44100, data.clone());
        buf.transpose(2.0);
        assert_eq!(buf.len(), 50);
        assert_eq!(buf.data()[10], 20);

        let mut same = SampleBuffer::with_data(1, 44100, data.clone());
        same.transpose(1.0);
        assert_eq!(same.data(), data.as_slice());

        let mut octave = SampleBuffer::with_data(1, 44100, data);
        octave.transpose_semis(12.0);
        assert_eq!(octave.len(), 50);
    }

    #[test]
    fn test_assure_length_idempotent() {
        let mut buf = stereo(&[1, 2]);
        buf.assure_length(6);
        let once = buf.data().to_vec();
        buf.assure_length(6);
        assert_eq!(buf.data(), once.as_slice());
        buf.assure_length(2);
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn test_rescale_and_peak() {
        let mut buf = stereo(&[100, -200]);
        assert_eq!(buf.peak(), 200);
        buf.rescale(RESCALE_MAX);
        assert_eq!(buf.data(), &[16383, -32766]);
    }

    #[test]
    fn test_channel_gains() {
        let mut buf = stereo(&[]);
        assert_eq!(buf.channel_gains(), (1.0, 1.0));
        buf.pan = 32;
        assert_eq!(buf.channel_gains(), (0.5, 1.0));
        buf.pan = -32;
        assert_eq!(buf.channel_gains(), (1.0, 0.5));
    }

    #[test]
    fn test_convert_8bit_mono_to_stereo() {
        let mut buf = SampleBuffer::new(2, 22050);
        buf.convert(&[0x80, 0xff, 0x00], 1, 8, 22050);
        assert_eq!(buf.data(), &[0, 0, 127 << 8, 127 << 8, -32768, -32768]);
    }

    #[test]
    fn test_convert_resamples_and_applies_gain() {
        let raw: Vec<u8> = [1000i16, 1000, 1000, 1000].iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut buf = SampleBuffer::new(1, 22050);
        buf.volume = 0;
        buf.convert(&raw, 1, 16, 44100);
        assert_eq!(buf.data(), &[0, 0]);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.wav");
        let data = vec![1i16, -1, 1000, -1000, 32767, -32768];

        let mut buf = SampleBuffer::with_data(2, 44100, data.clone());
        buf.volume = 90;
        buf.pan = 10;
        buf.set_dirty(true);
        buf.save_wav(&path).unwrap();
        assert!(!buf.is_dirty());
        assert_eq!((buf.volume, buf.pan), (127, 0));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 44 + 2 * data.len());

        let mut loaded = SampleBuffer::new(2, 44100);
        loaded.set_file_name(&path);
        assert!(loaded.load(false).unwrap());
        assert_eq!(loaded.data(), data.as_slice());
        assert!(!loaded.load(false).unwrap());
        assert!(loaded.load(true).unwrap());
    }

    #[test]
    fn test_failed_load_leaves_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"not a wave file").unwrap();

        let mut buf = stereo(&[7, 7]);
        buf.set_file_name(&path);
        let err = buf.load(true).unwrap_err();
        assert_eq!(err.code(), 2);
        assert_eq!(buf.data(), &[7, 7]);

        buf.set_file_name(dir.path().join("missing.wav"));
        assert_eq!(buf.load(true).unwrap_err().code(), 1);
    }

    fn pcm16_image(channels: u16, rate: u32, samples: &[i16]) -> Vec<u8> {
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut b = Vec::new();
        b.extend_from_slice(b"RIFF");
        b.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        b.extend_from_slice(b"WAVEfmt ");
        b.extend_from_slice(&16u32.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&channels.to_le_bytes());
        b.extend_from_slice(&rate.to_le_bytes());
        b.extend_from_slice(&(rate * 2 * channels as u32).to_le_bytes());
        b.extend_from_slice(&(2 * channels).to_le_bytes());
        b.extend_from_slice(&16u16.to_le_bytes());
        b.extend_from_slice(b"data");
        b.extend_from_slice(&(data.len() as u32).to_le_bytes());
        b.extend_from_slice(&data);
        b
    }

    #[test]
    fn test_zero_rate_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.wav");
        std::fs::write(&path, pcm16_image(1, 0, &[100, 200])).unwrap();

        let mut buf = SampleBuffer::with_data(1, 44100, vec![9, 9]);
        buf.set_file_name(&path);
        let err = buf.load(true).unwrap_err();
        assert_eq!(err.code(), 2);
        assert_eq!(buf.data(), &[9, 9]);

        std::fs::write(&path, pcm16_image(1, 44100, &[100, 200])).unwrap();
        assert!(buf.load(true).unwrap());
        assert_eq!(buf.data(), &[100, 200]);
    }

    #[test]
    fn test_transpose_ignores_bad_factor() {
        let mut buf = stereo(&[1, 2, 3, 4]);
        buf.transpose(0.0);
        buf.transpose(-1.0);
        buf.transpose(f64::NAN);
        assert_eq!(buf.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_convert_stereo_to_mono_averages() {
        let raw: Vec<u8> = [100i16, 300, -50, -150].iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut buf = SampleBuffer::new(1, 44100);
        buf.convert(&raw, 2, 16, 44100);
        assert_eq!(buf.data(), &[200, -100]);
    }

    #[test]
    fn test_convert_pan_attenuates_one_channel() {
        let raw: Vec<u8> = [1000i16, 1000, -1000, -1000].iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut buf = SampleBuffer::new(2, 44100);
        buf.pan = 32;
        buf.convert(&raw, 2, 16, 44100);
        assert_eq!(buf.data(), &[500, 1000, -500, -1000]);

        let mut buf = SampleBuffer::new(2, 44100);
        buf.pan = -32;
        buf.convert(&raw, 2, 16, 44100);
        assert_eq!(buf.data(), &[1000, 500, -1000, -500]);
    }

    #[test]
    fn test_check_external_only_when_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ext.wav");
        SampleBuffer::with_data(1, 44100, vec![5, 6]).save_wav(&path).unwrap();

        let mut buf = SampleBuffer::new(1, 44100);
        buf.set_file_name(&path);
        assert!(!buf.check_external().unwrap());
        buf.external_flag = true;
        assert!(buf.check_external().unwrap());
        assert_eq!(buf.data(), &[5, 6]);
        assert!(!buf.check_external().unwrap());
    }
}
