use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Fixed per-frequency threshold from a noise reference (or the input itself)
    Stationary,
    /// Per-frame threshold tracking a smoothed noise floor
    #[serde(alias = "non-stationary")]
    Nonstationary,
}

#[derive(Parser, Debug)]
#[command(name = "specgate", about = "Chunked spectral-gating noise reduction")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output WAV file
    #[arg(short, long, default_value = "denoised.wav")]
    pub output: PathBuf,

    /// Noise-only recording used to estimate the stationary threshold
    #[arg(long)]
    pub noise: Option<PathBuf>,

    /// Noise model
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Attenuation strength (0.0 = untouched, 1.0 = full mask)
    #[arg(long)]
    pub prop_decrease: Option<f64>,

    /// Standard deviations above the noise mean a bin must reach to pass
    #[arg(long)]
    pub n_std_thresh: Option<f64>,

    /// Truncate the noise reference to one chunk
    #[arg(long)]
    pub clip_noise: bool,

    /// Excess over the noise floor at which the soft gate is half open
    #[arg(long)]
    pub thresh_n_mult: Option<f64>,

    /// Steepness of the soft gate
    #[arg(long)]
    pub sigmoid_slope: Option<f64>,

    /// Noise-floor time constant in seconds
    #[arg(long)]
    pub time_constant: Option<f64>,

    /// Frames per chunk
    #[arg(long, conflicts_with = "no_chunking")]
    pub chunk_size: Option<usize>,

    /// Process the whole file as one window
    #[arg(long)]
    pub no_chunking: bool,

    /// Context frames read on each side of a chunk
    #[arg(long)]
    pub padding: Option<usize>,

    /// FFT size
    #[arg(long)]
    pub n_fft: Option<usize>,

    /// Hop between STFT frames (default: win_length / 4)
    #[arg(long)]
    pub hop_length: Option<usize>,

    /// STFT window length (default: n_fft)
    #[arg(long)]
    pub win_length: Option<usize>,

    /// Mask smoothing width across frequency in Hz (0 disables)
    #[arg(long)]
    pub freq_smooth_hz: Option<f64>,

    /// Mask smoothing width across time in ms (0 disables)
    #[arg(long)]
    pub time_smooth_ms: Option<f64>,

    /// Worker threads (default: all cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Directory for file-backed output buffers
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Show a progress bar while chunks are processed
    #[arg(long)]
    pub progress: bool,

    /// Write 16-bit PCM instead of 32-bit float
    #[arg(long)]
    pub pcm16: bool,

    /// Config file (default: specgate.toml, then the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "specgate",
            "in.flac",
            "--mode",
            "nonstationary",
            "--chunk-size",
            "4096",
            "--freq-smooth-hz",
            "0",
            "-j",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.mode, Some(Mode::Nonstationary));
        assert_eq!(cli.chunk_size, Some(4096));
        assert_eq!(cli.freq_smooth_hz, Some(0.0));
        assert_eq!(cli.jobs, Some(4));
        assert_eq!(cli.output, PathBuf::from("denoised.wav"));
    }

    #[test]
    fn chunk_size_conflicts_with_no_chunking() {
        assert!(Cli::try_parse_from(["specgate", "in.wav", "--chunk-size", "10", "--no-chunking"]).is_err());
    }
}
