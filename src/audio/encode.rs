use anyhow::{Context, Result};
use ndarray::{ArrayView2, Axis};
use std::path::Path;

/// Sample encoding of the written WAV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavFormat {
    Float32,
    Pcm16,
}

/// Writes `(channels, frames)` samples as an interleaved WAV file.
pub fn write_wav(path: &Path, samples: ArrayView2<f32>, sample_rate: u32, format: WavFormat) -> Result<()> {
    let channels = u16::try_from(samples.nrows())
        .with_context(|| format!("Too many channels for WAV: {}", samples.nrows()))?;
    let spec = match format {
        WavFormat::Float32 => hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
        WavFormat::Pcm16 => hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        },
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    for frame in samples.axis_iter(Axis(1)) {
        for &sample in frame.iter() {
            match format {
                WavFormat::Float32 => writer.write_sample(sample)?,
                WavFormat::Pcm16 => writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?,
            }
        }
    }
    writer.finalize().context("Failed to finalize WAV output")?;

    log::info!(
        "Wrote {} channel(s) x {} frames to {}",
        channels,
        samples.ncols(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::decode_audio;
    use ndarray::Array2;

    #[test]
    fn float_wav_round_trips_through_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let samples = Array2::from_shape_fn((2, 480), |(c, i)| {
            (i as f32 * 0.05).sin() * if c == 0 { 0.5 } else { -0.25 }
        });
        write_wav(&path, samples.view(), 48_000, WavFormat::Float32).unwrap();

        let audio = decode_audio(&path).unwrap();
        assert_eq!(audio.sample_rate, 48_000);
        assert_eq!(audio.samples.dim(), (2, 480));
        for (a, b) in audio.samples.iter().zip(samples.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn pcm16_clamps_out_of_range_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let samples = Array2::from_shape_vec((1, 3), vec![2.0f32, -2.0, 0.5]).unwrap();
        write_wav(&path, samples.view(), 16_000, WavFormat::Pcm16).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let written: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(written, vec![32767, -32767, 16383]);
    }
}
