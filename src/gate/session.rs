use std::sync::Arc;

use ndarray::{s, Array2, ArrayBase, ArrayD, Data, Dimension};
use parking_lot::Mutex;

use super::cache::ReadCache;
use super::engine::{GateEngine, GatePolicy};
use super::kernel::SmoothingKernel;
use super::nonstationary::{NonStationaryGate, NonStationaryParams};
use super::params::GateParams;
use super::scheduler::ChunkWindow;
use super::stationary::{StationaryGate, StationaryParams};
use super::waveform::{Sample, Waveform};
use crate::error::{GateError, Result};
use crate::spectral::Stft;

/// Which noise model a session gates with.
#[derive(Debug, Clone)]
pub enum PolicyParams {
    Stationary(StationaryParams),
    NonStationary(NonStationaryParams),
}

/// Immutable gating session over one waveform.
///
/// Thresholds, smoothing kernel, FFT plans and the optional worker pool are
/// all built by [`SpectralGateBuilder::build`] and read-only afterwards; the
/// only interior state is the padded-read cache.
pub struct SpectralGate<T: Sample> {
    pub(super) waveform: Waveform<T>,
    pub(super) sample_rate: u32,
    pub(super) params: GateParams,
    /// Frames read on each side of a window: `params.padding`, widened to
    /// the policy's own context when that is longer.
    pub(super) read_padding: usize,
    pub(super) engine: GateEngine,
    pub(super) pool: Option<rayon::ThreadPool>,
    pub(super) cache: Mutex<ReadCache>,
}

pub struct SpectralGateBuilder<T> {
    waveform: ArrayD<T>,
    sample_rate: u32,
    params: GateParams,
    policy: Option<PolicyParams>,
    noise: Option<ArrayD<f64>>,
}

impl<T: Sample> SpectralGate<T> {
    /// Starts a session over `waveform`, shaped `(frames,)` or
    /// `(channels, frames)`.
    pub fn builder<S, D>(waveform: ArrayBase<S, D>, sample_rate: u32) -> SpectralGateBuilder<T>
    where
        S: Data<Elem = T>,
        D: Dimension,
    {
        SpectralGateBuilder {
            waveform: waveform.into_owned().into_dyn(),
            sample_rate,
            params: GateParams::default(),
            policy: None,
            noise: None,
        }
    }

    pub fn n_channels(&self) -> usize {
        self.waveform.n_channels()
    }

    pub fn n_frames(&self) -> usize {
        self.waveform.n_frames()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn params(&self) -> &GateParams {
        &self.params
    }

    pub fn policy(&self) -> &GatePolicy {
        self.engine.policy()
    }

    pub fn engine(&self) -> &GateEngine {
        &self.engine
    }

    pub fn read_padding(&self) -> usize {
        self.read_padding
    }

    pub fn read_cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_read_cache(&self) {
        self.cache.lock().clear();
    }

    /// Gates `[start, end)` as a single padded window, returning `f64`
    /// samples shaped `(channels, end - start)`.
    pub fn filter_chunk(&self, start: usize, end: usize) -> Result<Array2<f64>> {
        if start > end || end > self.n_frames() {
            return Err(GateError::FrameRange {
                start,
                end,
                n_frames: self.n_frames(),
            });
        }
        self.filter_window(&ChunkWindow {
            index: 0,
            start,
            end,
            padding: self.read_padding,
        })
    }

    pub(super) fn filter_window(&self, window: &ChunkWindow) -> Result<Array2<f64>> {
        let padded = self.padded_read(window);
        let filtered = self.engine.gate(padded.view())?;
        let pad = window.padding;
        Ok(filtered.slice(s![.., pad..pad + window.len()]).to_owned())
    }

    pub(super) fn padded_read(&self, window: &ChunkWindow) -> Arc<Array2<f64>> {
        let (start, end) = window.padded_bounds();
        if let Some(hit) = self.cache.lock().get(&(start, end)) {
            return hit;
        }
        log::debug!(
            "Chunk {}: reading [{}, {}) padded to [{}, {})",
            window.index,
            window.start,
            window.end,
            start,
            end
        );
        let read = Arc::new(self.waveform.read_padded(start, end));
        self.cache.lock().insert((start, end), Arc::clone(&read));
        read
    }

    pub(super) fn worker_count(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, |pool| pool.current_num_threads())
    }
}

impl<T: Sample> SpectralGateBuilder<T> {
    pub fn params(mut self, params: GateParams) -> Self {
        self.params = params;
        self
    }

    pub fn stationary(mut self, params: StationaryParams) -> Self {
        self.policy = Some(PolicyParams::Stationary(params));
        self
    }

    pub fn nonstationary(mut self, params: NonStationaryParams) -> Self {
        self.policy = Some(PolicyParams::NonStationary(params));
        self
    }

    pub fn policy(mut self, policy: PolicyParams) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Noise sample for stationary gating, shaped `(frames,)` or
    /// `(channels, frames)`. Ignored by the non-stationary policy.
    pub fn noise_reference<U, S, D>(mut self, noise: ArrayBase<S, D>) -> Self
    where
        U: Sample,
        S: Data<Elem = U>,
        D: Dimension,
    {
        self.noise = Some(noise.mapv(U::to_f64).into_dyn());
        self
    }

    /// Validates every input and derives the session's immutable state.
    pub fn build(self) -> Result<SpectralGate<T>> {
        let waveform = Waveform::from_array(self.waveform)?;
        if let Some(noise) = &self.noise {
            if !(1..=2).contains(&noise.ndim()) {
                return Err(GateError::InvalidShape {
                    what: "noise reference",
                    ndim: noise.ndim(),
                });
            }
        }

        let params = self.params;
        params.validate(self.sample_rate)?;
        let policy = self.policy.ok_or(GateError::UnimplementedGate)?;

        let stft = Stft::new(params.n_fft, params.hop_length(), params.win_length())?;
        let kernel = SmoothingKernel::from_widths(
            params.freq_mask_smooth_hz,
            params.time_mask_smooth_ms,
            self.sample_rate,
            params.n_fft,
            stft.hop_length(),
        )?;

        let pool = match params.n_jobs {
            Some(n_jobs) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n_jobs)
                    .thread_name(|i| format!("specgate-{}", i))
                    .build()?,
            ),
            None => None,
        };

        let policy = match policy {
            PolicyParams::Stationary(stationary) => {
                let clip_to = if stationary.clip_noise {
                    params.chunk_size
                } else {
                    None
                };
                GatePolicy::Stationary(StationaryGate::estimate(
                    self.noise.as_ref(),
                    &waveform,
                    clip_to,
                    stationary.n_std_thresh,
                    &stft,
                )?)
            }
            PolicyParams::NonStationary(nonstationary) => {
                if self.noise.is_some() {
                    log::warn!("Noise reference is ignored by non-stationary gating");
                }
                GatePolicy::NonStationary(NonStationaryGate::new(
                    nonstationary,
                    params.time_constant_s,
                    self.sample_rate,
                    stft.hop_length(),
                ))
            }
        };

        log::info!(
            "Spectral gate ready: {} policy, {} channel(s) x {} frames @ {}Hz, n_fft={} hop={} win={}, smoothing {}",
            policy.name(),
            waveform.n_channels(),
            waveform.n_frames(),
            self.sample_rate,
            stft.n_fft(),
            stft.hop_length(),
            stft.win_length(),
            if kernel.is_some() { "on" } else { "off" }
        );

        let read_padding = widen_padding(
            params.padding,
            policy.context_frames(),
            stft.hop_length(),
            waveform.n_frames(),
        );
        if read_padding > params.padding {
            log::info!(
                "Read padding widened from {} to {} frames to cover the {} noise floor",
                params.padding,
                read_padding,
                policy.name()
            );
        }

        let engine = GateEngine::new(stft, policy, kernel, params.prop_decrease);
        let cache = Mutex::new(ReadCache::new(params.read_cache_limit));

        Ok(SpectralGate {
            waveform,
            sample_rate: self.sample_rate,
            params,
            read_padding,
            engine,
            pool,
            cache,
        })
    }
}

/// `padding`, or the policy's context in samples when that is longer. The
/// context never exceeds the waveform length rounded up to a whole hop.
fn widen_padding(padding: usize, context_frames: usize, hop_length: usize, n_frames: usize) -> usize {
    let context = context_frames.saturating_mul(hop_length);
    let limit = n_frames.div_ceil(hop_length) * hop_length;
    padding.max(context.min(limit))
}
