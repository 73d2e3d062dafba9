use thiserror::Error;

pub type Result<T> = std::result::Result<T, GateError>;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("{what} must be shaped (frames,) or (channels, frames), got {ndim} dimensions")]
    InvalidShape { what: &'static str, ndim: usize },

    #[error("{what} has no channels")]
    EmptyWaveform { what: &'static str },

    #[error("{0}")]
    Configuration(String),

    #[error("no gate policy selected; choose stationary or non-stationary gating")]
    UnimplementedGate,

    #[error("non-finite sample in channel {channel} at frame {frame}")]
    NonFiniteSample { channel: usize, frame: usize },

    #[error("chunk {chunk} failed: {source}")]
    Worker {
        chunk: usize,
        #[source]
        source: Box<GateError>,
    },

    #[error("frame range {start}..{end} is outside 0..{n_frames}")]
    FrameRange {
        start: usize,
        end: usize,
        n_frames: usize,
    },

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("scratch buffer I/O failed: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("scratch buffer layout: {0}")]
    ScratchLayout(String),
}
