//! RIFF/WAVE codec for 8/16-bit PCM

use std::path::Path;

use crate::error::SampleError;

const WAVE_FORMAT_PCM: u16 = 1;

/// Sample rates accepted from a `fmt ` chunk
pub(crate) const RATE_RANGE: std::ops::RangeInclusive<u32> = 1000..=384_000;

/// Raw PCM payload of a WAV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavData {
    pub bytes: Vec<u8>,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
}

struct Fmt {
    format: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// Read and parse a WAV file
pub fn read_wav(path: &Path) -> Result<WavData, SampleError> {
    let bytes = std::fs::read(path).map_err(|source| SampleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_wav(&bytes)
}

/// Parse a RIFF/WAVE image. Requires a PCM `fmt ` chunk and a `data`
/// chunk; every other chunk is skipped by its length.
pub fn parse_wav(b: &[u8]) -> Result<WavData, SampleError> {
    if b.len() < 12 || &b[0..4] != b"RIFF" || &b[8..12] != b"WAVE" {
        return Err(SampleError::Format("missing RIFF/WAVE header".into()));
    }

    let mut fmt: Option<Fmt> = None;
    let mut data: Option<&[u8]> = None;
    let mut pos = 12;

    while pos + 8 <= b.len() {
        let id = &b[pos..pos + 4];
        let size = u32_at(b, pos + 4) as usize;
        let body_start = pos + 8;
        let body_end = body_start.saturating_add(size).min(b.len());
        let body = &b[body_start..body_end];

        match id {
            b"fmt " => {
                if body.len() < 16 {
                    return Err(SampleError::Format("truncated fmt chunk".into()));
                }
                fmt = Some(Fmt {
                    format: u16_at(body, 0),
                    channels: u16_at(body, 2),
                    sample_rate: u32_at(body, 4),
                    bits_per_sample: u16_at(body, 14),
                });
            }
            b"data" => data = Some(body),
            _ => {}
        }

        // chunks are word aligned
        pos = body_start.saturating_add(size).saturating_add(size & 1);
    }

    let fmt = fmt.ok_or_else(|| SampleError::Format("no fmt chunk".into()))?;
    let data = data.ok_or_else(|| SampleError::Format("no data chunk".into()))?;

    if fmt.format != WAVE_FORMAT_PCM {
        return Err(SampleError::Format(format!("format code {} is not PCM", fmt.format)));
    }
    if !RATE_RANGE.contains(&fmt.sample_rate) {
        return Err(SampleError::Format(format!("sample rate {} out of range", fmt.sample_rate)));
    }
    if fmt.bits_per_sample != 8 && fmt.bits_per_sample != 16 {
        return Err(SampleError::Unsupported(format!("{} bits per sample", fmt.bits_per_sample)));
    }
    if fmt.channels != 1 && fmt.channels != 2 {
        return Err(SampleError::Unsupported(format!("{} channels", fmt.channels)));
    }

    Ok(WavData {
        bytes: data.to_vec(),
        channels: fmt.channels,
        bits_per_sample: fmt.bits_per_sample,
        sample_rate: fmt.sample_rate,
    })
}

/// Write 16-bit PCM with the canonical 44-byte header
pub fn write_wav(path: &Path, samples: &[i16], channels: u16, sample_rate: u32) -> Result<(), SampleError> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_image(format: u16, channels: u16, bits: u16, extra_chunk: bool, data: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(b"RIFF");
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(b"WAVE");
        if extra_chunk {
            b.extend_from_slice(b"LIST");
            b.extend_from_slice(&3u32.to_le_bytes());
            b.extend_from_slice(&[1, 2, 3, 0]);
        }
        b.extend_from_slice(b"fmt ");
        b.extend_from_slice(&16u32.to_le_bytes());
        b.extend_from_slice(&format.to_le_bytes());
        b.extend_from_slice(&channels.to_le_bytes());
        b.extend_from_slice(&22050u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&0u16.to_le_bytes());
        b.extend_from_slice(&bits.to_le_bytes());
        b.extend_from_slice(b"data");
        b.extend_from_slice(&(data.len() as u32).to_le_bytes());
        b.extend_from_slice(data);
        b
    }

    #[test]
    fn test_parse_skips_unknown_chunks() {
        let img = wav_image(1, 1, 8, true, &[0x80, 0xff, 0x00]);
        let wav = parse_wav(&img).unwrap();
        assert_eq!(wav.bytes, vec![0x80, 0xff, 0x00]);
        assert_eq!(wav.channels, 1);
        assert_eq!(wav.bits_per_sample, 8);
        assert_eq!(wav.sample_rate, 22050);
    }

    #[test]
    fn test_parse_error_codes() {
        let err = parse_wav(b"RIFX0000WAVE").unwrap_err();
        assert_eq!(err.code(), 2);

        let err = parse_wav(&wav_image(3, 1, 16, false, &[0, 0])).unwrap_err();
        assert_eq!(err.code(), 2);

        let err = parse_wav(&wav_image(1, 1, 24, false, &[0, 0, 0])).unwrap_err();
        assert_eq!(err.code(), 3);

        let mut no_data = wav_image(1, 1, 16, false, &[]);
        no_data.truncate(no_data.len() - 8);
        assert_eq!(parse_wav(&no_data).unwrap_err().code(), 2);
    }

    #[test]
    fn test_implausible_rate_is_format_error() {
        for rate in [0u32, 999, 1_000_000] {
            let mut img = wav_image(1, 1, 16, false, &[1, 0, 2, 0]);
            // rate field of the first fmt chunk
            img[24..28].copy_from_slice(&rate.to_le_bytes());
            let err = parse_wav(&img).unwrap_err();
            assert_eq!(err.code(), 2, "rate {rate}");
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_wav(Path::new("/nonexistent/definitely/missing.wav")).unwrap_err();
        assert_eq!(err.code(), 1);
    }
}
