use thiserror::Error;

use super::config::ConfigError;
use crate::core::lattice::LatticeError;
use crate::core::models::frame::FrameError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Invalid reference lattice: {source}")]
    Lattice {
        #[from]
        source: LatticeError,
    },

    #[error("Invalid input frame: {source}")]
    Frame {
        #[from]
        source: FrameError,
    },

    #[error("Analysis cancelled during phase '{phase}'")]
    Cancelled { phase: &'static str },
}
