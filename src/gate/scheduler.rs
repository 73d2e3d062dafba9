use std::ops::Range;

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{s, Array2, ArrayD, Zip};
use rayon::prelude::*;

use super::buffer::{split_columns, OutputBuffer};
use super::session::SpectralGate;
use super::waveform::{finalize, Sample};
use crate::error::{GateError, Result};

/// Unpadded frame range of one chunk plus the context read on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkWindow {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub padding: usize,
}

impl ChunkWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// `[start - padding, end + padding)`, possibly reaching outside the waveform.
    pub fn padded_bounds(&self) -> (isize, isize) {
        (
            self.start as isize - self.padding as isize,
            self.end as isize + self.padding as isize,
        )
    }
}

/// One unit of parallel work: which window to gate, which part of it to keep,
/// and where that part lands in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTask {
    pub window: ChunkWindow,
    pub output_offset: usize,
    /// Range kept, relative to `window.start`.
    pub trim: Range<usize>,
}

impl ChunkTask {
    pub fn width(&self) -> usize {
        self.trim.len()
    }
}

/// Covers `[start, end)` with the fixed chunk grid `[i * chunk_size, (i + 1) * chunk_size)`.
///
/// Only the first and last chunks are trimmed; offsets are assigned in order
/// so the tasks tile the output exactly once.
pub fn plan_chunks(start: usize, end: usize, chunk_size: usize, padding: usize) -> Vec<ChunkTask> {
    if end <= start || chunk_size == 0 {
        return Vec::new();
    }
    let first = start / chunk_size;
    let last = (end - 1) / chunk_size;

    let mut offset = 0;
    (first..=last)
        .map(|index| {
            let chunk_start = index * chunk_size;
            let window = ChunkWindow {
                index,
                start: chunk_start,
                end: chunk_start + chunk_size,
                padding,
            };
            let lo = if index == first { start - chunk_start } else { 0 };
            let hi = if index == last { end - chunk_start } else { chunk_size };
            let task = ChunkTask {
                window,
                output_offset: offset,
                trim: lo..hi,
            };
            offset += hi - lo;
            task
        })
        .collect()
}

impl<T: Sample> SpectralGate<T> {
    /// Denoised samples for `[start_frame, end_frame)` (defaults: whole waveform).
    ///
    /// Spans longer than one chunk are gated chunk by chunk on the worker
    /// pool; shorter spans run on the caller as a single padded window. The
    /// result is 1-D when the session input was 1-D.
    pub fn get_traces(&self, start_frame: Option<usize>, end_frame: Option<usize>) -> Result<ArrayD<T>> {
        let n_frames = self.n_frames();
        let start = start_frame.unwrap_or(0);
        let end = end_frame.unwrap_or(n_frames);
        if start > end || end > n_frames {
            return Err(GateError::FrameRange { start, end, n_frames });
        }

        let span = end - start;
        let samples = if span == 0 {
            Array2::from_elem((self.n_channels(), 0), T::default())
        } else {
            match self.params.chunk_size {
                Some(chunk_size) if span > chunk_size => {
                    self.dispatch_parallel(plan_chunks(start, end, chunk_size, self.read_padding))?
                }
                _ => self.dispatch_sequential(start, end)?,
            }
        };

        Ok(finalize(samples, self.waveform.is_flat()))
    }

    fn dispatch_sequential(&self, start: usize, end: usize) -> Result<Array2<T>> {
        log::debug!("Gating frames [{}, {}) on the calling thread", start, end);
        let window = ChunkWindow {
            index: 0,
            start,
            end,
            padding: self.read_padding,
        };
        Ok(self.filter_window(&window)?.mapv(T::from_f64))
    }

    fn dispatch_parallel(&self, tasks: Vec<ChunkTask>) -> Result<Array2<T>> {
        let width: usize = tasks.iter().map(ChunkTask::width).sum();
        let mut buffer = OutputBuffer::<T>::allocate(
            (self.n_channels(), width),
            self.params.scratch_dir.as_deref(),
        )?;

        log::info!(
            "Dispatching {} chunks ({} frames) over {} workers",
            tasks.len(),
            width,
            self.worker_count()
        );

        let progress = self.progress_bar(tasks.len());
        {
            let regions = split_columns(buffer.view_mut()?, tasks.iter().map(ChunkTask::width));
            let run = || -> Result<()> {
                tasks
                    .par_iter()
                    .zip(regions.into_par_iter())
                    .try_for_each(|(task, mut region)| {
                        let filtered = self.filter_window(&task.window).map_err(|source| {
                            GateError::Worker {
                                chunk: task.window.index,
                                source: Box::new(source),
                            }
                        })?;
                        Zip::from(&mut region)
                            .and(&filtered.slice(s![.., task.trim.clone()]))
                            .for_each(|out, &value| *out = T::from_f64(value));
                        progress.inc(1);
                        Ok(())
                    })
            };
            match &self.pool {
                Some(pool) => pool.install(run)?,
                None => run()?,
            }
        }
        progress.finish_and_clear();

        buffer.into_array()
    }

    fn progress_bar(&self, chunks: usize) -> ProgressBar {
        if !self.params.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(chunks as u64);
        match ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks ({eta} remaining)")
        {
            Ok(style) => pb.set_style(style.progress_chars("=>-")),
            Err(err) => log::warn!("Progress bar template rejected: {}", err),
        }
        pb
    }
}
