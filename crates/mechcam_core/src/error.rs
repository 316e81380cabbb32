//! Error types for mechcam.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`CamError`].
pub type Result<T> = std::result::Result<T, CamError>;

/// Errors surfaced by model loading, preprocessing and explanation.
///
/// Every variant is terminal for the current request. Callers that serve an
/// interactive front end report the message and keep running.
#[derive(Error, Debug)]
pub enum CamError {
    /// The classifier weights are missing or do not fit the architecture.
    #[error("Model unavailable at {path:?}: {reason}")]
    ModelUnavailable {
        /// Checkpoint location that was tried.
        path: PathBuf,
        /// Why loading failed.
        reason: String,
    },

    /// A tensor did not have the shape the classifier expects.
    #[error("Invalid input shape: expected {expected}, got {got}")]
    InvalidInputShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// The backward pass never reached the observed layer.
    #[error("No gradient captured for layer '{layer}'")]
    NoGradientCaptured {
        /// Name of the observed layer.
        layer: String,
    },

    /// The requested layer is not one of the classifier's observable stages.
    #[error("Unknown layer '{layer}', available: {available:?}")]
    UnknownLayer {
        /// Requested layer name.
        layer: String,
        /// Layers the classifier exposes.
        available: Vec<String>,
    },

    /// The requested class index is out of range.
    #[error("Invalid target class {index}: model has {n_classes} classes")]
    InvalidTargetClass {
        /// Requested class index.
        index: usize,
        /// Number of classes of the model.
        n_classes: usize,
    },

    /// Every class score is NaN, so no class can be selected.
    #[error("No valid class score: all {n_classes} scores are NaN")]
    NoValidScore {
        /// Number of classes of the model.
        n_classes: usize,
    },

    /// A pixel buffer is malformed.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CamError {
    /// Shorthand for an input shape mismatch.
    pub fn shape(expected: impl ToString, got: impl ToString) -> Self {
        Self::InvalidInputShape {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// Whether this error means no classifier could be loaded.
    #[must_use]
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. })
    }
}

impl From<serde_json::Error> for CamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_message() {
        let err = CamError::shape("[1, 3, 224, 224]", "[2, 3, 224, 224]");
        assert_eq!(
            err.to_string(),
            "Invalid input shape: expected [1, 3, 224, 224], got [2, 3, 224, 224]"
        );
    }

    #[test]
    fn test_model_unavailable() {
        let err = CamError::ModelUnavailable {
            path: PathBuf::from("runs/model"),
            reason: "weights file not found".to_string(),
        };
        assert!(err.is_model_unavailable());
        assert!(err.to_string().contains("weights file not found"));

        let other = CamError::NoGradientCaptured {
            layer: "layer4".to_string(),
        };
        assert!(!other.is_model_unavailable());
    }
}
