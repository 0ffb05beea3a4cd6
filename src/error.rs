use crate::types::Axis;
use std::{fmt::Display, path::PathBuf};
use thiserror::Error;

pub type AnnotationResult<T> = Result<T, AnnotationError>;

/// Errors raised while decoding, editing, loading or saving boxes.
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Malformed or missing fields in a box document.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Corner input whose edges cannot span a local frame.
    #[error("degenerate geometry: edge along local {axis} has zero length")]
    DegenerateGeometry { axis: Axis },

    /// Corner input listed in mirror order, spanning a left-handed frame.
    #[error("mirrored geometry: corners span a left-handed frame")]
    MirroredGeometry,

    /// Fetch or save of a resource failed.
    #[error("failed to access {resource}: {message}")]
    Network { resource: String, message: String },

    /// Rejected save payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A newer load was started before this one finished.
    #[error("load of {object_id} was superseded by a newer request")]
    Superseded { object_id: String },

    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl AnnotationError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn network(resource: impl Display, err: impl Display) -> Self {
        Self::Network {
            resource: resource.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AnnotationError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}
