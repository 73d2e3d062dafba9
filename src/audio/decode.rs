use anyhow::{Context, Result};
use ndarray::Array2;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio, one row per channel.
pub struct AudioData {
    pub samples: Array2<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn n_channels(&self) -> usize {
        self.samples.nrows()
    }

    pub fn duration(&self) -> f32 {
        self.samples.ncols() as f32 / self.sample_rate as f32
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if spec.channels.count() != channels {
            anyhow::bail!(
                "Channel count changed mid-stream: {} -> {}",
                channels,
                spec.channels.count()
            );
        }

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sample_buf.samples());
    }

    // Keep every channel: interleaved frames become columns of (channels, frames).
    let frames = interleaved.len() / channels;
    let samples = Array2::from_shape_vec((frames, channels), interleaved)
        .context("Decoded samples do not fill whole frames")?
        .reversed_axes()
        .as_standard_layout()
        .into_owned();

    let audio = AudioData {
        samples,
        sample_rate,
    };

    log::info!(
        "Decoded audio: {} channel(s) x {} frames, {}Hz, {:.1}s",
        audio.n_channels(),
        frames,
        sample_rate,
        audio.duration()
    );

    Ok(audio)
}
