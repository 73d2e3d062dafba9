use ndarray::{Array2, ArrayView2, Axis, Zip};

use super::kernel::SmoothingKernel;
use super::nonstationary::NonStationaryGate;
use super::stationary::StationaryGate;
use crate::error::{GateError, Result};
use crate::spectral::{amp_to_db, Stft};

/// How a chunk's dB spectrum becomes an inclusion mask.
#[derive(Debug, Clone)]
pub enum GatePolicy {
    /// Hard compare against a per-bin threshold frozen at session start.
    Stationary(StationaryGate),
    /// Sigmoid weight above a per-chunk smoothed floor.
    NonStationary(NonStationaryGate),
}

impl GatePolicy {
    pub fn inclusion(&self, spectrum_db: ArrayView2<f64>) -> Array2<f64> {
        match self {
            GatePolicy::Stationary(gate) => gate.inclusion(spectrum_db),
            GatePolicy::NonStationary(gate) => gate.inclusion(spectrum_db),
        }
    }

    /// Extra STFT frames of context a chunk needs beyond the mask smoothing.
    pub fn context_frames(&self) -> usize {
        match self {
            GatePolicy::Stationary(_) => 0,
            GatePolicy::NonStationary(gate) => gate.context_frames(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GatePolicy::Stationary(_) => "stationary",
            GatePolicy::NonStationary(_) => "non-stationary",
        }
    }
}

/// Read-only state shared by every worker: transform, policy, kernel and
/// blend factor.
#[derive(Debug, Clone)]
pub struct GateEngine {
    stft: Stft,
    policy: GatePolicy,
    kernel: Option<SmoothingKernel>,
    prop_decrease: f64,
}

impl GateEngine {
    pub fn new(
        stft: Stft,
        policy: GatePolicy,
        kernel: Option<SmoothingKernel>,
        prop_decrease: f64,
    ) -> Self {
        Self {
            stft,
            policy,
            kernel,
            prop_decrease,
        }
    }

    pub fn stft(&self) -> &Stft {
        &self.stft
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub fn kernel(&self) -> Option<&SmoothingKernel> {
        self.kernel.as_ref()
    }

    /// Mask in `[1 - prop_decrease, 1]` for one channel's dB spectrum.
    pub fn mask(&self, spectrum_db: ArrayView2<f64>) -> Array2<f64> {
        let inclusion = self.policy.inclusion(spectrum_db);
        let mut mask = match &self.kernel {
            Some(kernel) => kernel.apply(inclusion.view()),
            None => inclusion,
        };
        let keep = 1.0 - self.prop_decrease;
        mask.mapv_inplace(|m| m * self.prop_decrease + keep);
        mask
    }

    /// Denoises every channel of a `(channels, frames)` chunk.
    pub fn gate(&self, chunk: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut denoised = Array2::<f64>::zeros(chunk.raw_dim());
        for (channel, (signal, mut out)) in chunk
            .axis_iter(Axis(0))
            .zip(denoised.axis_iter_mut(Axis(0)))
            .enumerate()
        {
            if let Some(frame) = signal.iter().position(|s| !s.is_finite()) {
                return Err(GateError::NonFiniteSample { channel, frame });
            }

            let mut spectrum = self.stft.forward(signal);
            let spectrum_db = amp_to_db(&spectrum.mapv(|c| c.norm()));
            let mask = self.mask(spectrum_db.view());
            Zip::from(&mut spectrum)
                .and(&mask)
                .for_each(|c, &m| *c *= m);

            out.assign(&self.stft.inverse(spectrum.view(), signal.len()));
        }
        Ok(denoised)
    }
}
