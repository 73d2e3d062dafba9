use ndarray::{s, Array1, Array2, ArrayBase, ArrayD, ArrayView2, Axis, Data, Dimension, Ix2};

use crate::error::{GateError, Result};

/// Sample types the engine accepts and returns unchanged.
///
/// Processing happens in `f64`; `from_f64` narrows back, rounding and
/// saturating for integer formats.
pub trait Sample: bytemuck::Pod + Default + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Sample for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Sample for f64 {
    fn to_f64(self) -> f64 {
        self
    }
    fn from_f64(value: f64) -> Self {
        value
    }
}

impl Sample for i16 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        // float -> int `as` casts saturate
        value.round() as i16
    }
}

impl Sample for i32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        value.round() as i32
    }
}

/// Audio shaped `(channels, frames)`. Remembers whether the caller passed a
/// 1-D signal so the output can be flattened again.
#[derive(Debug, Clone)]
pub struct Waveform<T> {
    samples: Array2<T>,
    flat: bool,
}

impl<T: Sample> Waveform<T> {
    pub fn from_array<S, D>(array: ArrayBase<S, D>) -> Result<Self>
    where
        S: Data<Elem = T>,
        D: Dimension,
    {
        let (samples, flat) = to_channels_frames(array.into_owned().into_dyn(), "waveform")?;
        Ok(Self { samples, flat })
    }

    pub fn n_channels(&self) -> usize {
        self.samples.nrows()
    }

    pub fn n_frames(&self) -> usize {
        self.samples.ncols()
    }

    pub fn is_flat(&self) -> bool {
        self.flat
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.samples.view()
    }

    /// Zero-filled read of `[start, end)`; indices outside the waveform read 0.
    pub fn read_padded(&self, start: isize, end: isize) -> Array2<f64> {
        let width = (end - start).max(0) as usize;
        let mut out = Array2::<f64>::zeros((self.n_channels(), width));
        let lo = start.clamp(0, self.n_frames() as isize);
        let hi = end.clamp(lo, self.n_frames() as isize);
        if hi > lo {
            let dst_lo = (lo - start) as usize;
            let dst_hi = (hi - start) as usize;
            let src = self.samples.slice(s![.., lo as usize..hi as usize]);
            out.slice_mut(s![.., dst_lo..dst_hi])
                .zip_mut_with(&src, |o, &s| *o = s.to_f64());
        }
        out
    }

    /// Channel average, used when a mono noise reference is needed.
    pub fn mono_f64(&self) -> Array1<f64> {
        let channels = self.n_channels() as f64;
        self.samples
            .mapv(T::to_f64)
            .sum_axis(Axis(0))
            .mapv(|v| v / channels)
    }
}

/// Restores the caller's layout: 1-D when the input was 1-D.
pub fn finalize<T>(samples: Array2<T>, flat: bool) -> ArrayD<T> {
    if flat {
        samples.index_axis_move(Axis(0), 0).into_dyn()
    } else {
        samples.into_dyn()
    }
}

/// Validates and reshapes an arbitrary-rank array to `(channels, frames)`.
pub(crate) fn to_channels_frames<T: Clone>(
    array: ArrayD<T>,
    what: &'static str,
) -> Result<(Array2<T>, bool)> {
    let ndim = array.ndim();
    let (samples, flat) = match ndim {
        1 => (array.insert_axis(Axis(0)), true),
        2 => (array, false),
        _ => return Err(GateError::InvalidShape { what, ndim }),
    };
    let samples = samples
        .into_dimensionality::<Ix2>()
        .map_err(|_| GateError::InvalidShape { what, ndim })?;
    if samples.nrows() == 0 {
        return Err(GateError::EmptyWaveform { what });
    }
    Ok((samples, flat))
}
