use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis, Zip};
use serde::Deserialize;

use crate::spectral::{amp_to_db, db_to_amp, sigmoid};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NonStationaryParams {
    /// How far above the smoothed floor (as a multiple of it) a bin sits at
    /// the sigmoid midpoint.
    pub thresh_n_mult: f64,
    /// Steepness of the soft gate.
    pub sigmoid_slope: f64,
}

impl Default for NonStationaryParams {
    fn default() -> Self {
        Self {
            thresh_n_mult: 2.0,
            sigmoid_slope: 10.0,
        }
    }
}

/// Adaptive gate that tracks each chunk's own slowly varying spectral floor.
///
/// Holds no threshold array; everything is recomputed per chunk.
#[derive(Debug, Clone)]
pub struct NonStationaryGate {
    params: NonStationaryParams,
    coefficient: f64,
}

impl NonStationaryGate {
    /// `time_constant_s` is converted to frames using the hop rate.
    pub fn new(params: NonStationaryParams, time_constant_s: f64, sample_rate: u32, hop_length: usize) -> Self {
        let t_frames = time_constant_s * sample_rate as f64 / hop_length as f64;
        Self {
            params,
            coefficient: smoothing_coefficient(t_frames),
        }
    }

    pub fn params(&self) -> &NonStationaryParams {
        &self.params
    }

    /// One-pole smoothing weight given to the incoming frame.
    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    /// STFT frames after which a sample's weight in the floor has decayed
    /// below `FLOOR_SETTLE`. Chunks need this much context on each side to
    /// see the same floor as an unchunked pass.
    pub fn context_frames(&self) -> usize {
        if self.coefficient >= 1.0 {
            return 0;
        }
        (FLOOR_SETTLE.ln() / (1.0 - self.coefficient).ln()).ceil() as usize
    }

    /// Per-frame, per-bin amplitude floor of a `[bins, frames]` dB spectrum.
    pub fn estimate(&self, spectrum_db: ArrayView2<f64>) -> AdaptiveThreshold {
        let mut floor = db_to_amp(&spectrum_db);
        for lane in floor.axis_iter_mut(Axis(0)) {
            filtfilt_one_pole(lane, self.coefficient);
        }
        AdaptiveThreshold {
            floor,
            thresh_n_mult: self.params.thresh_n_mult,
            sigmoid_slope: self.params.sigmoid_slope,
        }
    }

    pub fn inclusion(&self, spectrum_db: ArrayView2<f64>) -> Array2<f64> {
        self.estimate(spectrum_db).inclusion(spectrum_db)
    }
}

/// Smoothed spectral floor of one chunk plus the sigmoid that turns the
/// distance above it into an inclusion weight.
#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    floor: Array2<f64>,
    thresh_n_mult: f64,
    sigmoid_slope: f64,
}

impl AdaptiveThreshold {
    pub fn floor(&self) -> ArrayView2<'_, f64> {
        self.floor.view()
    }

    /// dB level at which the inclusion weight crosses 0.5.
    pub fn threshold_db(&self) -> Array2<f64> {
        let offset = 20.0 * (1.0 + self.thresh_n_mult).max(f64::MIN_POSITIVE).log10();
        amp_to_db(&self.floor) + offset
    }

    /// Soft weights in (0, 1): near 0 for noise, near 1 for signal.
    pub fn inclusion(&self, spectrum_db: ArrayView2<f64>) -> Array2<f64> {
        let amplitude = db_to_amp(&spectrum_db);
        let mut weights = Array2::<f64>::zeros(amplitude.raw_dim());
        Zip::from(&mut weights)
            .and(&amplitude)
            .and(&self.floor)
            .for_each(|w, &amp, &floor| {
                let above = (amp - floor) / floor;
                *w = sigmoid(above, -self.thresh_n_mult, self.sigmoid_slope);
            });
        weights
    }
}

const FLOOR_SETTLE: f64 = 1e-6;

/// Solves `b² + (1 - b) / t - 2 = 0` for the pole weight `b`, which puts the
/// full-width half-max of the zero-phase filter's response at `t` frames.
fn smoothing_coefficient(t_frames: f64) -> f64 {
    if !(t_frames > 0.0) || !t_frames.is_finite() {
        return 1.0;
    }
    let t2 = t_frames * t_frames;
    ((1.0 + 4.0 * t2).sqrt() - 1.0) / (2.0 * t2)
}

/// Forward then backward `y[n] = b x[n] + (1 - b) y[n - 1]`, each pass
/// starting in steady state on its first sample.
fn filtfilt_one_pole(mut lane: ArrayViewMut1<f64>, b: f64) {
    let n = lane.len();
    if n == 0 {
        return;
    }
    let mut state = lane[0];
    for i in 0..n {
        state = b * lane[i] + (1.0 - b) * state;
        lane[i] = state;
    }
    let mut state = lane[n - 1];
    for i in (0..n).rev() {
        state = b * lane[i] + (1.0 - b) * state;
        lane[i] = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn coefficient_limits() {
        assert_eq!(smoothing_coefficient(0.0), 1.0);
        assert_eq!(smoothing_coefficient(f64::NAN), 1.0);
        let b = smoothing_coefficient(1.0);
        assert!((b - (5f64.sqrt() - 1.0) / 2.0).abs() < 1e-12);
        let slow = smoothing_coefficient(125.0);
        assert!(slow > 0.0 && slow < 0.01);
    }

    #[test]
    fn coefficient_from_time_constant() {
        // 2 s at 16 kHz with hop 256 is 125 frames
        let gate = NonStationaryGate::new(NonStationaryParams::default(), 2.0, 16000, 256);
        assert!((gate.coefficient() - smoothing_coefficient(125.0)).abs() < 1e-15);
    }

    #[test]
    fn context_covers_floor_memory() {
        let instant = NonStationaryGate::new(NonStationaryParams::default(), 0.0, 16000, 256);
        assert_eq!(instant.context_frames(), 0);

        let gate = NonStationaryGate::new(NonStationaryParams::default(), 2.0, 16000, 256);
        let frames = gate.context_frames();
        let b = gate.coefficient();
        assert!((1.0 - b).powi(frames as i32) <= FLOOR_SETTLE);
        assert!((1.0 - b).powi(frames as i32 - 1) > FLOOR_SETTLE);
        assert!(frames > 125);
    }

    #[test]
    fn filtfilt_keeps_constant_signal() {
        let mut lane = Array1::from_elem(50, 3.5);
        filtfilt_one_pole(lane.view_mut(), 0.1);
        assert!(lane.iter().all(|&v| (v - 3.5).abs() < 1e-12));
    }

    #[test]
    fn filtfilt_spreads_impulse_symmetrically() {
        let mut lane = Array1::<f64>::zeros(41);
        lane[20] = 1.0;
        filtfilt_one_pole(lane.view_mut(), 0.3);
        assert!(lane[20] < 1.0);
        assert!(lane[19] > 0.0 && lane[21] > 0.0);
        // zero-phase: the peak stays put
        let peak = (0..41).max_by(|&a, &b| lane[a].partial_cmp(&lane[b]).unwrap()).unwrap();
        assert_eq!(peak, 20);
    }

    #[test]
    fn floor_tracks_flat_spectrum() {
        let gate = NonStationaryGate::new(NonStationaryParams::default(), 0.5, 16000, 256);
        let db = Array2::from_elem((4, 30), -20.0);
        let threshold = gate.estimate(db.view());
        assert!(threshold.floor().iter().all(|&v| (v - 0.1).abs() < 1e-9));
        let expected = -20.0 + 20.0 * 3f64.log10();
        assert!(threshold
            .threshold_db()
            .iter()
            .all(|&v| (v - expected).abs() < 1e-9));
    }

    #[test]
    fn weights_are_continuous_and_shape_preserving() {
        let gate = NonStationaryGate::new(
            NonStationaryParams {
                thresh_n_mult: 2.0,
                sigmoid_slope: 0.5,
            },
            0.1,
            16000,
            128,
        );
        let db = Array2::from_shape_fn((6, 40), |(b, t)| if t == 20 { 20.0 } else { -10.0 - b as f64 });
        let weights = gate.inclusion(db.view());
        assert_eq!(weights.dim(), (6, 40));
        assert!(weights.iter().all(|&w| w > 0.0 && w < 1.0));
        // the transient frame is weighted towards signal
        for b in 0..6 {
            assert!(weights[[b, 20]] > weights[[b, 5]]);
        }
    }

    #[test]
    fn weight_is_half_at_threshold() {
        let threshold = AdaptiveThreshold {
            floor: array![[1.0]],
            thresh_n_mult: 2.0,
            sigmoid_slope: 10.0,
        };
        let at = threshold.inclusion(array![[20.0 * 3f64.log10()]].view());
        assert!((at[[0, 0]] - 0.5).abs() < 1e-9);
    }
}
