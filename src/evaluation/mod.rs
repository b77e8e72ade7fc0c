//! Quality evaluation over the architecture graph
//!
//! - [`aggregation`]: measure normalization, factor/aspect scoring and ratings
//! - [`model`]: one evaluated model per scope entity
//! - [`wrapper`]: cached models for every entity of a system

mod aggregation;
mod model;
mod wrapper;

pub use aggregation::{AggregationConfig, AggregationStrategy, Evaluation, Rating, ThresholdAggregation};
pub use model::{
    ComponentScope, Diagnostic, EvaluatedComponentModel, EvaluatedInfrastructureModel,
    EvaluatedModel, EvaluatedRequestTraceModel, EvaluatedSystemModel, EvaluationResults,
    EvaluationScope, InfrastructureScope, RequestTraceScope, SystemScope,
};
pub use wrapper::EvaluationModelsWrapper;
