pub mod db;
pub mod stft;

pub use db::{amp_to_db, db_to_amp, sigmoid};
pub use stft::Stft;
