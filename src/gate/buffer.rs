use std::marker::PhantomData;
use std::path::Path;

use memmap2::MmapMut;
use ndarray::{Array2, ArrayViewMut2, Axis};
use tempfile::NamedTempFile;

use super::waveform::Sample;
use crate::error::{GateError, Result};

/// Output of a multi-chunk call, either in memory or in a mapped scratch file.
pub enum OutputBuffer<T> {
    Memory(Array2<T>),
    Mapped {
        map: MmapMut,
        shape: (usize, usize),
        // removed from disk when dropped
        _file: NamedTempFile,
        _marker: PhantomData<T>,
    },
}

impl<T: Sample> OutputBuffer<T> {
    pub fn allocate(shape: (usize, usize), scratch_dir: Option<&Path>) -> Result<Self> {
        let Some(dir) = scratch_dir else {
            return Ok(Self::Memory(Array2::from_elem(shape, T::default())));
        };

        let bytes = shape.0 * shape.1 * std::mem::size_of::<T>();
        let file = tempfile::Builder::new()
            .prefix("specgate-")
            .suffix(".buf")
            .tempfile_in(dir)?;
        file.as_file().set_len(bytes as u64)?;
        // SAFETY: the file is private to this buffer and outlives the map.
        let map = unsafe { MmapMut::map_mut(file.as_file())? };

        log::debug!(
            "Output buffer mapped at {} ({} bytes)",
            file.path().display(),
            bytes
        );

        Ok(Self::Mapped {
            map,
            shape,
            _file: file,
            _marker: PhantomData,
        })
    }

    pub fn view_mut(&mut self) -> Result<ArrayViewMut2<'_, T>> {
        match self {
            Self::Memory(samples) => Ok(samples.view_mut()),
            Self::Mapped { map, shape, .. } => {
                let samples: &mut [T] = bytemuck::try_cast_slice_mut(&mut map[..])
                    .map_err(|e| GateError::ScratchLayout(e.to_string()))?;
                ArrayViewMut2::from_shape(*shape, samples)
                    .map_err(|e| GateError::ScratchLayout(e.to_string()))
            }
        }
    }

    /// Copies a mapped buffer back into memory.
    pub fn into_array(self) -> Result<Array2<T>> {
        match self {
            Self::Memory(samples) => Ok(samples),
            Self::Mapped { map, shape, .. } => {
                let samples: &[T] = bytemuck::try_cast_slice(&map[..])
                    .map_err(|e| GateError::ScratchLayout(e.to_string()))?;
                Array2::from_shape_vec(shape, samples.to_vec())
                    .map_err(|e| GateError::ScratchLayout(e.to_string()))
            }
        }
    }
}

/// Splits a buffer into consecutive, disjoint column blocks of `widths`.
pub fn split_columns<'a, T>(
    mut view: ArrayViewMut2<'a, T>,
    widths: impl IntoIterator<Item = usize>,
) -> Vec<ArrayViewMut2<'a, T>> {
    let mut regions = Vec::new();
    for width in widths {
        let (head, tail) = view.split_at(Axis(1), width);
        regions.push(head);
        view = tail;
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_columns_are_disjoint_and_ordered() {
        let mut samples = Array2::<i32>::zeros((2, 10));
        let regions = split_columns(samples.view_mut(), [3, 4, 3]);
        assert_eq!(regions.len(), 3);
        for (i, mut region) in regions.into_iter().enumerate() {
            region.fill(i as i32 + 1);
        }
        assert_eq!(samples.row(0).to_vec(), vec![1, 1, 1, 2, 2, 2, 2, 3, 3, 3]);
        assert_eq!(samples.row(1).to_vec(), vec![1, 1, 1, 2, 2, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn mapped_buffer_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = OutputBuffer::<f32>::allocate((2, 5), Some(dir.path())).unwrap();
        {
            let mut view = buffer.view_mut().unwrap();
            view[[1, 4]] = 2.5;
            view[[0, 0]] = -1.0;
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        let samples = buffer.into_array().unwrap();
        assert_eq!(samples[[1, 4]], 2.5);
        assert_eq!(samples[[0, 0]], -1.0);
        assert_eq!(samples[[0, 1]], 0.0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn memory_buffer_starts_zeroed() {
        let buffer = OutputBuffer::<i16>::allocate((3, 4), None).unwrap();
        assert!(buffer.into_array().unwrap().iter().all(|&v| v == 0));
    }
}
