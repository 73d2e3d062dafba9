use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{GateError, Result};

/// Centered short-time Fourier transform with a periodic Hann window.
///
/// The signal is zero-padded by `n_fft / 2` on both sides so frame `t` is
/// centred on sample `t * hop_length`. The last frame is always placed far
/// enough right to cover the final sample, whatever the hop. The inverse is a weighted overlap-add
/// normalised by the summed squared window, which makes
/// `inverse(forward(x), x.len())` reproduce `x`.
///
/// FFT plans are built once; the struct is `Sync` and shared by every worker.
#[derive(Clone)]
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    win_length: usize,
    window: Vec<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for Stft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop_length", &self.hop_length)
            .field("win_length", &self.win_length)
            .finish()
    }
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize, win_length: usize) -> Result<Self> {
        if n_fft < 2 {
            return Err(GateError::Configuration(format!(
                "n_fft must be at least 2, got {}",
                n_fft
            )));
        }
        if hop_length == 0 {
            return Err(GateError::Configuration(
                "hop_length must be at least 1".into(),
            ));
        }
        if win_length == 0 || win_length > n_fft {
            return Err(GateError::Configuration(format!(
                "win_length must be in 1..={}, got {}",
                n_fft, win_length
            )));
        }
        if hop_length >= win_length {
            // periodic Hann is zero at its first sample, so frames would leave gaps
            return Err(GateError::Configuration(format!(
                "hop_length must be smaller than win_length ({}), got {}",
                win_length, hop_length
            )));
        }

        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(n_fft);
        let inverse = planner.plan_fft_inverse(n_fft);

        Ok(Self {
            n_fft,
            hop_length,
            win_length,
            window: padded_hann(win_length, n_fft),
            forward,
            inverse,
        })
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn win_length(&self) -> usize {
        self.win_length
    }

    /// Number of non-negative frequency bins.
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames `forward` produces for a signal of `len` samples.
    pub fn n_frames(&self, len: usize) -> usize {
        let padded = len + 2 * (self.n_fft / 2);
        1 + padded.saturating_sub(self.n_fft).div_ceil(self.hop_length)
    }

    /// Complex spectrum shaped `[n_bins, n_frames]`.
    pub fn forward(&self, signal: ArrayView1<f64>) -> Array2<Complex<f64>> {
        let half = self.n_fft / 2;
        let n_bins = self.n_bins();
        let n_frames = self.n_frames(signal.len());

        let padded_len = ((n_frames - 1) * self.hop_length + self.n_fft).max(half + signal.len());
        let mut padded = vec![0.0f64; padded_len];
        for (dst, &s) in padded[half..].iter_mut().zip(signal.iter()) {
            *dst = s;
        }

        let mut spectrum = Array2::<Complex<f64>>::zeros((n_bins, n_frames));
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.forward.get_inplace_scratch_len()];

        for (frame, mut column) in spectrum.axis_iter_mut(Axis(1)).enumerate() {
            let start = frame * self.hop_length;
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + k] * self.window[k], 0.0);
            }
            self.forward.process_with_scratch(&mut buffer, &mut scratch);
            column.assign(&ArrayView1::from(&buffer[..n_bins]));
        }

        spectrum
    }

    /// Inverse of [`forward`](Self::forward), trimmed or zero-padded to `length`.
    pub fn inverse(&self, spectrum: ArrayView2<Complex<f64>>, length: usize) -> Array1<f64> {
        let n_frames = spectrum.ncols();
        if n_frames == 0 {
            return Array1::zeros(length);
        }

        let half = self.n_fft / 2;
        let n_bins = self.n_bins();
        let expected = self.n_fft + self.hop_length * (n_frames - 1);
        let scale = 1.0 / self.n_fft as f64;

        let mut signal = vec![0.0f64; expected];
        let mut window_sum = vec![0.0f64; expected];
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.inverse.get_inplace_scratch_len()];

        for (frame, column) in spectrum.axis_iter(Axis(1)).enumerate() {
            // Rebuild the Hermitian-symmetric full spectrum.
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k < n_bins {
                    column[k]
                } else {
                    column[self.n_fft - k].conj()
                };
            }
            self.inverse.process_with_scratch(&mut buffer, &mut scratch);

            let start = frame * self.hop_length;
            for (k, value) in buffer.iter().enumerate() {
                let w = self.window[k];
                signal[start + k] += value.re * scale * w;
                window_sum[start + k] += w * w;
            }
        }

        for (s, &norm) in signal.iter_mut().zip(window_sum.iter()) {
            if norm > f64::MIN_POSITIVE {
                *s /= norm;
            }
        }

        let mut out = Array1::<f64>::zeros(length);
        for (dst, &s) in out.iter_mut().zip(signal.iter().skip(half)) {
            *dst = s;
        }
        out
    }
}

/// Periodic Hann window of `win_length`, centred in a frame of `n_fft`.
fn padded_hann(win_length: usize, n_fft: usize) -> Vec<f64> {
    let offset = (n_fft - win_length) / 2;
    let mut window = vec![0.0f64; n_fft];
    for i in 0..win_length {
        window[offset + i] =
            0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / win_length as f64).cos();
    }
    window
}
