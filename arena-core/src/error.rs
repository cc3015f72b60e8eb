//! Error types for the simulation core.
//!
//! Only configuration problems surface as errors. Gameplay conditions such as
//! a full zone or a missing entity are ordinary control flow and never reach
//! this type.

use crate::grid::GridError;

/// Errors raised while loading content or constructing entities
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("petal `{petal}` declares behavior `{kind}` but has no behavior params")]
    MissingBehaviorData { petal: String, kind: String },
    #[error("petal `{petal}` has malformed `{kind}` params: {source}")]
    InvalidBehaviorData {
        petal: String,
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("petal `{petal}` uses unknown behavior kind `{kind}`")]
    UnknownBehavior { petal: String, kind: String },
    #[error("unknown petal definition: {0}")]
    UnknownPetal(String),
    #[error("unknown mob definition: {0}")]
    UnknownMob(String),
    #[error("unknown zone: {0}")]
    UnknownZone(String),
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("grid error: {0}")]
    Grid(#[from] GridError),
    #[error("JSON error in {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
