//! Error types shared by the video engine

use thiserror::Error;

/// Failures surfaced by the video engine.
///
/// Per-element decode failures are not represented here: a hook that yields
/// no value renders that tile or sprite transparent and the frame completes.
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("{what} index {index:#x} out of range (limit {limit:#x})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("hook registry '{registry}' is sealed; bindings are only accepted during setup")]
    RegistrySealed { registry: &'static str },

    #[error("frame pass step '{step}' entered in phase {phase}")]
    Sequence {
        step: &'static str,
        phase: &'static str,
    },

    #[error("save state error: {message}")]
    SaveState { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

impl VideoError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn out_of_range(what: &'static str, index: usize, limit: usize) -> Self {
        Self::OutOfRange { what, index, limit }
    }

    pub fn save_state(message: impl Into<String>) -> Self {
        Self::SaveState {
            message: message.into(),
        }
    }
}

pub type VideoResult<T> = Result<T, VideoError>;
