mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use ndarray::Ix2;
use std::path::PathBuf;
use std::time::Instant;

use cli::{Cli, Mode};
use config::Config;
use specgate::audio::decode::decode_audio;
use specgate::audio::encode::{write_wav, WavFormat};
use specgate::{GateParams, PolicyParams, SpectralGate};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Explicit --config path, or auto-detect specgate.toml / user config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("specgate.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("specgate").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("specgate").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let cfg = match config_path {
        Some(ref path) => match config::load_config(path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("specgate - spectral gating noise reduction");
    log::info!("Input: {}", cli.input.display());
    log::info!("Output: {}", cli.output.display());

    let (params, policy) = merge(&cli, cfg);

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio = decode_audio(&cli.input)?;

    let noise = match cli.noise {
        Some(ref path) => {
            log::info!("Decoding noise reference {}...", path.display());
            let noise = decode_audio(path)?;
            if noise.sample_rate != audio.sample_rate {
                anyhow::bail!(
                    "Noise reference is {}Hz but input is {}Hz",
                    noise.sample_rate,
                    audio.sample_rate
                );
            }
            Some(noise)
        }
        None => None,
    };

    // 2. Build the session
    let mut builder = SpectralGate::builder(audio.samples.view(), audio.sample_rate)
        .params(params)
        .policy(policy);
    if let Some(ref noise) = noise {
        builder = builder.noise_reference(noise.samples.view());
    }
    let gate = builder.build().context("Invalid gating configuration")?;

    // 3. Gate
    let started = Instant::now();
    let denoised = gate
        .get_traces(None, None)
        .context("Spectral gating failed")?
        .into_dimensionality::<Ix2>()
        .context("Unexpected output shape")?;
    let elapsed = started.elapsed().as_secs_f32();
    log::info!(
        "Gated {:.1}s of audio in {:.2}s ({:.1}x realtime)",
        audio.duration(),
        elapsed,
        audio.duration() / elapsed.max(f32::EPSILON)
    );

    // 4. Write output
    let format = if cli.pcm16 {
        WavFormat::Pcm16
    } else {
        WavFormat::Float32
    };
    write_wav(&cli.output, denoised.view(), audio.sample_rate, format)?;

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

/// Config-file values first, command-line flags on top.
fn merge(cli: &Cli, cfg: Config) -> (GateParams, PolicyParams) {
    let mut params = cfg.gate;
    if let Some(v) = cli.prop_decrease { params.prop_decrease = v; }
    if let Some(v) = cli.chunk_size { params.chunk_size = Some(v); }
    if cli.no_chunking { params.chunk_size = None; }
    if let Some(v) = cli.padding { params.padding = v; }
    if let Some(v) = cli.n_fft { params.n_fft = v; }
    if cli.hop_length.is_some() { params.hop_length = cli.hop_length; }
    if cli.win_length.is_some() { params.win_length = cli.win_length; }
    if let Some(v) = cli.time_constant { params.time_constant_s = v; }
    if let Some(v) = cli.freq_smooth_hz {
        params.freq_mask_smooth_hz = (v > 0.0).then_some(v);
    }
    if let Some(v) = cli.time_smooth_ms {
        params.time_mask_smooth_ms = (v > 0.0).then_some(v);
    }
    if cli.jobs.is_some() { params.n_jobs = cli.jobs; }
    if cli.scratch_dir.is_some() { params.scratch_dir = cli.scratch_dir.clone(); }
    if cli.progress { params.progress = true; }

    let mode = cli.mode.or(cfg.mode).unwrap_or(Mode::Stationary);
    let policy = match mode {
        Mode::Stationary => {
            let mut stationary = cfg.stationary;
            if let Some(v) = cli.n_std_thresh { stationary.n_std_thresh = v; }
            if cli.clip_noise { stationary.clip_noise = true; }
            PolicyParams::Stationary(stationary)
        }
        Mode::Nonstationary => {
            if cli.noise.is_some() {
                log::warn!("--noise has no effect in non-stationary mode");
            }
            let mut nonstationary = cfg.nonstationary;
            if let Some(v) = cli.thresh_n_mult { nonstationary.thresh_n_mult = v; }
            if let Some(v) = cli.sigmoid_slope { nonstationary.sigmoid_slope = v; }
            PolicyParams::NonStationary(nonstationary)
        }
    };

    (params, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "specgate",
            "in.wav",
            "--prop-decrease",
            "0.5",
            "--no-chunking",
            "--time-smooth-ms",
            "0",
            "--n-std-thresh",
            "2.5",
        ])
        .unwrap();
        let cfg: Config = toml::from_str(
            r#"
            [gate]
            prop_decrease = 0.9
            padding = 100
            [stationary]
            clip_noise = true
            "#,
        )
        .unwrap();

        let (params, policy) = merge(&cli, cfg);
        assert_eq!(params.prop_decrease, 0.5);
        assert_eq!(params.padding, 100);
        assert_eq!(params.chunk_size, None);
        assert_eq!(params.time_mask_smooth_ms, None);
        assert_eq!(params.freq_mask_smooth_hz, Some(500.0));
        match policy {
            PolicyParams::Stationary(p) => {
                assert_eq!(p.n_std_thresh, 2.5);
                assert!(p.clip_noise);
            }
            other => panic!("unexpected policy {:?}", other),
        }
    }

    #[test]
    fn mode_falls_back_to_config() {
        let cli = Cli::try_parse_from(["specgate", "in.wav"]).unwrap();
        let cfg: Config = toml::from_str("mode = \"nonstationary\"").unwrap();
        let (_, policy) = merge(&cli, cfg);
        assert!(matches!(policy, PolicyParams::NonStationary(_)));
    }
}
