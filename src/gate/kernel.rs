use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{GateError, Result};

/// Normalised triangular kernel that blurs a gate mask over frequency and time.
///
/// Stored as the two normalised 1-D ramps whose outer product is the kernel,
/// so application is two separable passes.
#[derive(Debug, Clone)]
pub struct SmoothingKernel {
    freq: Array1<f64>,
    time: Array1<f64>,
}

impl SmoothingKernel {
    pub fn new(n_grad_freq: usize, n_grad_time: usize) -> Result<Self> {
        if n_grad_freq < 1 || n_grad_time < 1 {
            return Err(GateError::Configuration(format!(
                "smoothing grades must be at least 1, got freq={} time={}",
                n_grad_freq, n_grad_time
            )));
        }
        Ok(Self {
            freq: normalised_ramp(n_grad_freq),
            time: normalised_ramp(n_grad_time),
        })
    }

    /// Derives grades from Hz / ms widths and the transform geometry.
    ///
    /// Returns `Ok(None)` when both grades resolve to 1 (no smoothing).
    pub fn from_widths(
        freq_mask_smooth_hz: Option<f64>,
        time_mask_smooth_ms: Option<f64>,
        sample_rate: u32,
        n_fft: usize,
        hop_length: usize,
    ) -> Result<Option<Self>> {
        let sr = sample_rate as f64;

        let n_grad_freq = match freq_mask_smooth_hz {
            None => 1,
            Some(hz) => {
                let bin_hz = sr / (n_fft as f64 / 2.0);
                let n = (hz / bin_hz).floor();
                if !(n >= 1.0) {
                    return Err(GateError::Configuration(format!(
                        "freq_mask_smooth_hz needs to be at least {}Hz",
                        bin_hz.floor() as u64
                    )));
                }
                // wider than the spectrum itself
                if !n.is_finite() || n > (n_fft / 2) as f64 {
                    return Err(GateError::Configuration(format!(
                        "freq_mask_smooth_hz must be at most {}Hz",
                        sample_rate
                    )));
                }
                n as usize
            }
        };

        let n_grad_time = match time_mask_smooth_ms {
            None => 1,
            Some(ms) => {
                let hop_ms = hop_length as f64 / sr * 1000.0;
                let n = (ms / hop_ms).floor();
                if !(n >= 1.0) {
                    return Err(GateError::Configuration(format!(
                        "time_mask_smooth_ms needs to be at least {}ms",
                        hop_ms.floor() as u64
                    )));
                }
                if !n.is_finite() {
                    return Err(GateError::Configuration(
                        "time_mask_smooth_ms must be finite".into(),
                    ));
                }
                n as usize
            }
        };

        log::debug!(
            "Mask smoothing grades: freq={} time={}",
            n_grad_freq,
            n_grad_time
        );

        if n_grad_freq == 1 && n_grad_time == 1 {
            return Ok(None);
        }
        Self::new(n_grad_freq, n_grad_time).map(Some)
    }

    /// Full 2-D kernel, shaped `(2 * n_grad_freq + 1, 2 * n_grad_time + 1)`.
    pub fn weights(&self) -> Array2<f64> {
        let rows = self.freq.view().insert_axis(Axis(1));
        let cols = self.time.view().insert_axis(Axis(0));
        &rows * &cols
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.freq.len(), self.time.len())
    }

    /// Same-size convolution with zero boundary, mask shaped `[bins, frames]`.
    pub fn apply(&self, mask: ArrayView2<f64>) -> Array2<f64> {
        let along_freq = convolve_axis(mask, &self.freq, Axis(0));
        convolve_axis(along_freq.view(), &self.time, Axis(1))
    }
}

/// Rising then falling ramp of length `2n + 1`, zero endpoints excluded,
/// scaled to sum to 1.
fn normalised_ramp(n: usize) -> Array1<f64> {
    let ramp = Array1::from_iter(
        (0..=2 * n).map(|k| 1.0 - (k as f64 - n as f64).abs() / (n as f64 + 1.0)),
    );
    let total = ramp.sum();
    ramp / total
}

fn convolve_axis(input: ArrayView2<f64>, taps: &Array1<f64>, axis: Axis) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros(input.raw_dim());
    let centre = (taps.len() / 2) as isize;
    for (src, mut dst) in input
        .lanes(axis)
        .into_iter()
        .zip(out.lanes_mut(axis).into_iter())
    {
        let len = src.len() as isize;
        for i in 0..len {
            let mut acc = 0.0;
            for (k, &w) in taps.iter().enumerate() {
                let j = i + k as isize - centre;
                if j >= 0 && j < len {
                    acc += src[j as usize] * w;
                }
            }
            dst[i as usize] = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_sums_to_one() {
        for (f, t) in [(1, 2), (2, 1), (3, 7), (16, 3), (40, 40)] {
            let kernel = SmoothingKernel::new(f, t).unwrap();
            let sum = kernel.weights().sum();
            assert!((sum - 1.0).abs() < 1e-9, "grades ({}, {}) sum {}", f, t, sum);
            assert_eq!(kernel.dim(), (2 * f + 1, 2 * t + 1));
        }
    }

    #[test]
    fn triangular_shape() {
        let kernel = SmoothingKernel::new(1, 2).unwrap();
        let w = kernel.weights();
        // freq ramp [.5, 1, .5], time ramp [1/3, 2/3, 1, 2/3, 1/3]
        assert!((w[[1, 2]] / w[[0, 2]] - 2.0).abs() < 1e-12);
        assert!((w[[1, 2]] / w[[1, 0]] - 3.0).abs() < 1e-12);
        assert!((w[[0, 0]] - w[[2, 4]]).abs() < 1e-15);
    }

    #[test]
    fn zero_grade_is_rejected() {
        assert!(matches!(
            SmoothingKernel::new(0, 3),
            Err(GateError::Configuration(_))
        ));
    }

    #[test]
    fn widths_resolve_to_grades() {
        // 16 kHz, n_fft 1024: 31.25 Hz per grade; hop 256: 16 ms per grade
        let kernel = SmoothingKernel::from_widths(Some(500.0), Some(50.0), 16000, 1024, 256)
            .unwrap()
            .unwrap();
        assert_eq!(kernel.dim(), (33, 7));
    }

    #[test]
    fn unit_grades_disable_smoothing() {
        let kernel = SmoothingKernel::from_widths(Some(40.0), None, 16000, 1024, 256).unwrap();
        assert!(kernel.is_none());
        let kernel = SmoothingKernel::from_widths(None, None, 16000, 1024, 256).unwrap();
        assert!(kernel.is_none());
    }

    #[test]
    fn narrow_frequency_width_names_minimum() {
        let err = SmoothingKernel::from_widths(Some(10.0), None, 16000, 1024, 256).unwrap_err();
        match err {
            GateError::Configuration(msg) => {
                assert_eq!(msg, "freq_mask_smooth_hz needs to be at least 31Hz")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn oversized_frequency_width_is_rejected() {
        for hz in [1e12, f64::INFINITY] {
            match SmoothingKernel::from_widths(Some(hz), None, 16000, 1024, 256) {
                Err(GateError::Configuration(msg)) => {
                    assert_eq!(msg, "freq_mask_smooth_hz must be at most 16000Hz")
                }
                other => panic!("unexpected result: {:?}", other.map(|k| k.map(|k| k.dim()))),
            }
        }
        let widest = SmoothingKernel::from_widths(Some(16000.0), None, 16000, 1024, 256)
            .unwrap()
            .unwrap();
        assert_eq!(widest.dim(), (1025, 3));
        assert!(SmoothingKernel::from_widths(None, Some(f64::INFINITY), 16000, 1024, 256).is_err());
    }

    #[test]
    fn narrow_time_width_names_minimum() {
        let err = SmoothingKernel::from_widths(None, Some(5.0), 16000, 1024, 256).unwrap_err();
        assert!(err.to_string().contains("at least 16ms"));
    }

    #[test]
    fn matches_direct_2d_convolution() {
        let kernel = SmoothingKernel::new(2, 1).unwrap();
        let weights = kernel.weights();
        let mask = Array2::from_shape_fn((7, 5), |(i, j)| ((i * 3 + j * 5) % 4) as f64 / 3.0);
        let fast = kernel.apply(mask.view());

        let (kf, kt) = kernel.dim();
        let (cf, ct) = (kf as isize / 2, kt as isize / 2);
        for i in 0..7isize {
            for j in 0..5isize {
                let mut acc = 0.0;
                for a in 0..kf as isize {
                    for b in 0..kt as isize {
                        let (x, y) = (i + a - cf, j + b - ct);
                        if (0..7).contains(&x) && (0..5).contains(&y) {
                            acc += mask[[x as usize, y as usize]] * weights[[a as usize, b as usize]];
                        }
                    }
                }
                assert!((acc - fast[[i as usize, j as usize]]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn constant_mask_stays_constant_in_interior() {
        let kernel = SmoothingKernel::new(2, 2).unwrap();
        let mask = Array2::<f64>::ones((12, 12));
        let smoothed = kernel.apply(mask.view());
        assert!((smoothed[[6, 6]] - 1.0).abs() < 1e-12);
        assert!(smoothed[[0, 0]] < 1.0);
    }
}
