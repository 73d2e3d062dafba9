pub mod buffer;
pub mod cache;
pub mod engine;
pub mod kernel;
pub mod nonstationary;
pub mod params;
pub mod scheduler;
pub mod session;
pub mod stationary;
pub mod waveform;

pub use engine::{GateEngine, GatePolicy};
pub use kernel::SmoothingKernel;
pub use nonstationary::{AdaptiveThreshold, NonStationaryGate, NonStationaryParams};
pub use params::GateParams;
pub use scheduler::{plan_chunks, ChunkTask, ChunkWindow};
pub use session::{PolicyParams, SpectralGate, SpectralGateBuilder};
pub use stationary::{StationaryGate, StationaryParams};
pub use waveform::{Sample, Waveform};
