use ndarray::{s, Array1, Array2, ArrayD, ArrayView1, ArrayView2, Axis, Zip};
use serde::Deserialize;

use super::waveform::{to_channels_frames, Sample, Waveform};
use crate::error::Result;
use crate::spectral::{amp_to_db, Stft};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StationaryParams {
    /// Standard deviations above the mean noise level a bin must exceed to pass.
    pub n_std_thresh: f64,
    /// Truncate an explicit noise reference to one chunk.
    pub clip_noise: bool,
}

impl Default for StationaryParams {
    fn default() -> Self {
        Self {
            n_std_thresh: 1.5,
            clip_noise: false,
        }
    }
}

/// Fixed per-bin threshold in dB, estimated once from a noise reference.
#[derive(Debug, Clone)]
pub struct StationaryGate {
    threshold: Array1<f64>,
}

impl StationaryGate {
    /// Estimates the threshold from `reference`, or from the session waveform
    /// itself when no reference is given. References are averaged to mono.
    pub fn estimate<T: Sample>(
        reference: Option<&ArrayD<f64>>,
        session: &Waveform<T>,
        clip_to: Option<usize>,
        n_std_thresh: f64,
        stft: &Stft,
    ) -> Result<Self> {
        let mono = match reference {
            None => session.mono_f64(),
            Some(noise) => {
                let (noise, _) = to_channels_frames(noise.clone(), "noise reference")?;
                let frames = clip_to.map_or(noise.ncols(), |c| c.min(noise.ncols()));
                let clipped = noise.slice(s![.., ..frames]);
                clipped
                    .mean_axis(Axis(0))
                    .unwrap_or_else(|| Array1::zeros(frames))
            }
        };

        if mono.is_empty() {
            log::warn!("Noise reference is empty; threshold falls back to the dB floor");
        }

        Ok(Self::from_signal(mono.view(), n_std_thresh, stft))
    }

    /// `mean + std * n_std_thresh` of the reference's dB spectrum, per bin.
    pub fn from_signal(signal: ArrayView1<f64>, n_std_thresh: f64, stft: &Stft) -> Self {
        let magnitude = stft.forward(signal).mapv(|c| c.norm());
        let noise_db = amp_to_db(&magnitude);
        let mean = noise_db
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(stft.n_bins()));
        let std = noise_db.std_axis(Axis(1), 0.0);

        log::info!(
            "Stationary threshold estimated from {} frames (n_std_thresh={:.2})",
            noise_db.ncols(),
            n_std_thresh
        );

        Self {
            threshold: mean + std * n_std_thresh,
        }
    }

    pub fn threshold(&self) -> ArrayView1<'_, f64> {
        self.threshold.view()
    }

    /// Hard inclusion mask: 1 where the bin exceeds its threshold, else 0.
    pub fn inclusion(&self, spectrum_db: ArrayView2<f64>) -> Array2<f64> {
        let mut mask = Array2::<f64>::zeros(spectrum_db.raw_dim());
        Zip::from(mask.rows_mut())
            .and(spectrum_db.rows())
            .and(&self.threshold)
            .for_each(|mut out, row, &thresh| {
                out.zip_mut_with(&row, |m, &db| *m = if db > thresh { 1.0 } else { 0.0 });
            });
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise(len: usize, seed: u64) -> Array1<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array1::from_iter((0..len).map(|_| rng.gen_range(-0.1..0.1)))
    }

    fn stft() -> Stft {
        Stft::new(512, 128, 512).unwrap()
    }

    #[test]
    fn threshold_has_one_value_per_bin() {
        let gate = StationaryGate::from_signal(noise(8000, 1).view(), 1.5, &stft());
        assert_eq!(gate.threshold().len(), 257);
        assert!(gate.threshold().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn threshold_is_monotonic_in_n_std() {
        let reference = noise(8000, 2);
        let stft = stft();
        let mut previous: Option<Array1<f64>> = None;
        for n_std in [-1.0, 0.0, 0.5, 1.5, 3.0] {
            let current = StationaryGate::from_signal(reference.view(), n_std, &stft)
                .threshold()
                .to_owned();
            if let Some(prev) = previous {
                assert!(prev.iter().zip(current.iter()).all(|(p, c)| c >= p));
            }
            previous = Some(current);
        }
    }

    #[test]
    fn multichannel_reference_is_averaged() {
        let a = noise(4000, 3);
        let b = noise(4000, 4);
        let mut stereo = Array2::<f64>::zeros((2, 4000));
        stereo.row_mut(0).assign(&a);
        stereo.row_mut(1).assign(&b);
        let session = Waveform::from_array(Array1::<f32>::zeros(10)).unwrap();
        let stft = stft();

        let from_stereo =
            StationaryGate::estimate(Some(&stereo.into_dyn()), &session, None, 1.5, &stft).unwrap();
        let mono = (&a + &b) / 2.0;
        let from_mono = StationaryGate::from_signal(mono.view(), 1.5, &stft);
        for (x, y) in from_stereo.threshold().iter().zip(from_mono.threshold().iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn clip_truncates_reference() {
        let long = noise(20000, 5);
        let session = Waveform::from_array(Array1::<f32>::zeros(10)).unwrap();
        let stft = stft();
        let clipped =
            StationaryGate::estimate(Some(&long.clone().into_dyn()), &session, Some(3000), 1.5, &stft)
                .unwrap();
        let head = StationaryGate::from_signal(long.slice(s![..3000]), 1.5, &stft);
        assert_eq!(clipped.threshold(), head.threshold());
    }

    #[test]
    fn missing_reference_uses_session() {
        let signal = noise(6000, 6);
        let session = Waveform::from_array(signal.clone()).unwrap();
        let stft = stft();
        let gate = StationaryGate::estimate(None, &session, Some(100), 1.0, &stft).unwrap();
        let direct = StationaryGate::from_signal(signal.view(), 1.0, &stft);
        assert_eq!(gate.threshold(), direct.threshold());
    }

    #[test]
    fn three_dimensional_reference_is_rejected() {
        let session = Waveform::from_array(Array1::<f32>::zeros(10)).unwrap();
        let reference = Array3::<f64>::zeros((2, 3, 100)).into_dyn();
        let err = StationaryGate::estimate(Some(&reference), &session, None, 1.5, &stft()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::GateError::InvalidShape { ndim: 3, .. }
        ));
    }

    #[test]
    fn inclusion_broadcasts_threshold_over_frames() {
        let gate = StationaryGate {
            threshold: ndarray::array![0.0, 10.0],
        };
        let db = ndarray::array![[-1.0, 1.0, 0.0], [11.0, 9.0, 10.5]];
        let mask = gate.inclusion(db.view());
        assert_eq!(mask, ndarray::array![[0.0, 1.0, 0.0], [1.0, 0.0, 1.0]]);
    }
}
