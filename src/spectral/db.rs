use ndarray::{Array, ArrayBase, Data, Dimension};

/// Reference amplitude for 0 dB.
pub const REF: f64 = 1.0;
/// Amplitude floor applied before taking the logarithm.
pub const AMIN: f64 = 1e-20;
/// Dynamic range kept below the array maximum.
pub const TOP_DB: f64 = 80.0;

/// Amplitude to decibels, clamped to `TOP_DB` below the loudest element.
pub fn amp_to_db<S, D>(magnitude: &ArrayBase<S, D>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let offset = 20.0 * AMIN.max(REF).log10();
    let mut db = magnitude.mapv(|m| 20.0 * AMIN.max(m.abs()).log10() - offset);
    let peak = db.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if peak.is_finite() {
        let floor = peak - TOP_DB;
        db.mapv_inplace(|v| v.max(floor));
    }
    db
}

pub fn db_to_amp<S, D>(db: &ArrayBase<S, D>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    db.mapv(|v| REF * 10f64.powf(v / 20.0))
}

/// Logistic curve shifted along x by `shift`, steepness `mult`.
#[inline]
pub fn sigmoid(x: f64, shift: f64, mult: f64) -> f64 {
    1.0 / (1.0 + (-(x + shift) * mult).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn unit_amplitude_is_zero_db() {
        let db = amp_to_db(&array![1.0, 10.0]);
        assert!((db[0] - 0.0).abs() < 1e-12);
        assert!((db[1] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn clamps_to_top_db_below_peak() {
        let db = amp_to_db(&array![1.0, 1e-3, 1e-9, 0.0]);
        assert!((db[1] + 60.0).abs() < 1e-9);
        assert!((db[2] + 80.0).abs() < 1e-9);
        assert!((db[3] + 80.0).abs() < 1e-9);
    }

    #[test]
    fn silence_sits_at_floor() {
        let db = amp_to_db(&Array1::<f64>::zeros(4));
        assert!(db.iter().all(|&v| (v + 400.0).abs() < 1e-9));
    }

    #[test]
    fn db_round_trip() {
        let amp = array![[0.5, 2.0], [1.0, 0.1]];
        let back = db_to_amp(&amp_to_db(&amp));
        for (a, b) in amp.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn sigmoid_midpoint_at_negated_shift() {
        assert!((sigmoid(2.0, -2.0, 10.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(10.0, -2.0, 10.0) > 0.99);
        assert!(sigmoid(-10.0, -2.0, 10.0) < 0.01);
    }
}
