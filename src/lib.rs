pub mod audio;
pub mod error;
pub mod gate;
pub mod spectral;

pub use error::{GateError, Result};
pub use gate::{
    GateParams, NonStationaryParams, PolicyParams, Sample, SpectralGate, SpectralGateBuilder,
    StationaryParams,
};
