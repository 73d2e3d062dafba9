use serde::Deserialize;
use std::path::Path;

use crate::cli::Mode;
use specgate::{GateParams, NonStationaryParams, StationaryParams};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub gate: GateParams,
    #[serde(default)]
    pub stationary: StationaryParams,
    #[serde(default)]
    pub nonstationary: NonStationaryParams,
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Ignoring malformed config {}: {}", path.display(), err);
            None
        }
    }
}
