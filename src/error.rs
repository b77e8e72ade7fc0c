//! Error taxonomy for the evaluation engine
//!
//! `NotFound` and `InvalidGraph` are the two failure classes measures and
//! queries can produce. "Not applicable" is deliberately absent: it is a
//! regular measure outcome (`MeasureValue::NotApplicable`), not an error.

use thiserror::Error;

/// Errors raised by the architecture model, the quality model and evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid architecture graph: {0}")]
    InvalidGraph(String),

    #[error("Invalid property '{key}': {reason}")]
    InvalidProperty { key: String, reason: String },

    #[error("Invalid quality model: {0}")]
    InvalidQualityModel(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_graph(message: impl Into<String>) -> Self {
        EngineError::InvalidGraph(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
