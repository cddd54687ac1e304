use crate::config::Device;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by flow estimation and diff-map construction
///
/// None of these are recovered internally: a failed flow estimate would
/// poison the blend with undefined values, so callers abort the frame pair.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Model weights are missing or could not be parsed
    #[error("failed to load flow model from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// The requested compute device cannot be used
    #[error("compute device {device} unavailable: {reason}")]
    Device { device: Device, reason: String },

    /// The forward pass failed or produced an unusable tensor
    #[error("flow inference failed: {0}")]
    Inference(String),

    /// Two inputs that must share a spatial size do not
    #[error("{what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

pub type Result<T> = std::result::Result<T, FlowError>;

impl FlowError {
    pub(crate) fn shape(what: &'static str, expected: (u32, u32), actual: (u32, u32)) -> Self {
        FlowError::ShapeMismatch {
            what,
            expected: (expected.0 as usize, expected.1 as usize),
            actual: (actual.0 as usize, actual.1 as usize),
        }
    }
}
