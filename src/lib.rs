//! archqual - Graph-powered quality evaluation for cloud-native architectures
//!
//! - [`architecture`]: the architecture graph (`System`) and its queries
//! - [`quality_model`]: product factors, quality aspects, measures and impacts
//! - [`measures`]: the measure library, one registry per evaluation scope
//! - [`evaluation`]: evaluated models, aggregation strategy and orchestrator
//! - [`config`]: engine configuration (archqual.toml)
//! - [`reporters`]: text and JSON output

pub mod architecture;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod measures;
pub mod quality_model;
pub mod reporters;

pub use architecture::System;
pub use error::{EngineError, EngineResult};
pub use evaluation::{EvaluationModelsWrapper, EvaluationResults};
pub use measures::{MeasureLibrary, MeasureValue};
pub use quality_model::QualityModelInstance;
