use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{GateError, Result};

/// Session-wide gating parameters.
///
/// Deserialisable so it can sit directly under `[gate]` in a config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateParams {
    /// Blend between no attenuation (0.0) and the full computed mask (1.0).
    pub prop_decrease: f64,
    /// Frames per chunk; `None` processes the requested span in one piece.
    pub chunk_size: Option<usize>,
    /// Frames read on each side of a chunk and discarded after gating.
    pub padding: usize,
    pub n_fft: usize,
    /// Defaults to `n_fft`.
    pub win_length: Option<usize>,
    /// Defaults to `win_length / 4`.
    pub hop_length: Option<usize>,
    /// Floor-tracking time constant of the non-stationary gate, in seconds.
    pub time_constant_s: f64,
    pub freq_mask_smooth_hz: Option<f64>,
    pub time_mask_smooth_ms: Option<f64>,
    /// Dedicated worker-pool size; `None` shares rayon's global pool.
    pub n_jobs: Option<usize>,
    pub progress: bool,
    /// Directory for file-backed output buffers of multi-chunk calls.
    pub scratch_dir: Option<PathBuf>,
    /// Maximum cached padded reads; `None` keeps every read for the session.
    pub read_cache_limit: Option<usize>,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            prop_decrease: 1.0,
            chunk_size: Some(600_000),
            padding: 30_000,
            n_fft: 1024,
            win_length: None,
            hop_length: None,
            time_constant_s: 2.0,
            freq_mask_smooth_hz: Some(500.0),
            time_mask_smooth_ms: Some(50.0),
            n_jobs: None,
            progress: false,
            scratch_dir: None,
            read_cache_limit: None,
        }
    }
}

impl GateParams {
    pub fn win_length(&self) -> usize {
        self.win_length.unwrap_or(self.n_fft)
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length.unwrap_or(self.win_length() / 4)
    }

    /// Checks scalar ranges. Transform geometry and smoothing widths are
    /// checked where they are resolved.
    pub fn validate(&self, sample_rate: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(GateError::Configuration(
                "sample rate must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.prop_decrease) {
            return Err(GateError::Configuration(format!(
                "prop_decrease must be within [0, 1], got {}",
                self.prop_decrease
            )));
        }
        if self.chunk_size == Some(0) {
            return Err(GateError::Configuration(
                "chunk_size must be at least 1 frame".into(),
            ));
        }
        if !self.time_constant_s.is_finite() || self.time_constant_s < 0.0 {
            return Err(GateError::Configuration(format!(
                "time_constant_s must be finite and non-negative, got {}",
                self.time_constant_s
            )));
        }
        Ok(())
    }
}
