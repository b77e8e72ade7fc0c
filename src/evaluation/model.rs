//! Evaluated model of a single scope entity
//!
//! An [`EvaluatedModel`] binds one entity (the system, a component, an
//! infrastructure node or a request trace) to shared snapshots of the
//! architecture, the quality model, the measure library and the aggregation
//! strategy. Each `evaluate` call recomputes and replaces its result set.

use super::aggregation::{AggregationStrategy, Evaluation, Propagation};
use crate::architecture::{Component, Infrastructure, RequestTrace, System};
use crate::error::EngineResult;
use crate::measures::{MeasureLibrary, MeasureRegistry, MeasureValue};
use crate::quality_model::QualityModelInstance;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Binds a scope to its entity type and measure registry
pub trait EvaluationScope: Send + Sync + 'static {
    type Entity;

    /// Label used in results and logs
    const NAME: &'static str;

    fn entity<'a>(system: &'a System, id: &str) -> EngineResult<&'a Self::Entity>;

    fn registry(library: &MeasureLibrary) -> &MeasureRegistry<Self::Entity>;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemScope;

#[derive(Debug, Clone, Copy)]
pub struct ComponentScope;

#[derive(Debug, Clone, Copy)]
pub struct InfrastructureScope;

#[derive(Debug, Clone, Copy)]
pub struct RequestTraceScope;

impl EvaluationScope for SystemScope {
    type Entity = System;
    const NAME: &'static str = "system";

    fn entity<'a>(system: &'a System, _id: &str) -> EngineResult<&'a System> {
        Ok(system)
    }

    fn registry(library: &MeasureLibrary) -> &MeasureRegistry<System> {
        &library.system
    }
}

impl EvaluationScope for ComponentScope {
    type Entity = Component;
    const NAME: &'static str = "component";

    fn entity<'a>(system: &'a System, id: &str) -> EngineResult<&'a Component> {
        system.get_component(id)
    }

    fn registry(library: &MeasureLibrary) -> &MeasureRegistry<Component> {
        &library.component
    }
}

impl EvaluationScope for InfrastructureScope {
    type Entity = Infrastructure;
    const NAME: &'static str = "infrastructure";

    fn entity<'a>(system: &'a System, id: &str) -> EngineResult<&'a Infrastructure> {
        system.get_infrastructure(id)
    }

    fn registry(library: &MeasureLibrary) -> &MeasureRegistry<Infrastructure> {
        &library.infrastructure
    }
}

impl EvaluationScope for RequestTraceScope {
    type Entity = RequestTrace;
    const NAME: &'static str = "request_trace";

    fn entity<'a>(system: &'a System, id: &str) -> EngineResult<&'a RequestTrace> {
        system.get_request_trace(id)
    }

    fn registry(library: &MeasureLibrary) -> &MeasureRegistry<RequestTrace> {
        &library.request_trace
    }
}

/// A measure calculation that failed and was recorded as "n/a"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub measure: String,
    pub message: String,
}

/// Full result set of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResults {
    pub scope: &'static str,
    pub entity_id: String,
    pub entity_name: String,
    pub active_aspects: Vec<String>,
    pub active_factors: Vec<String>,
    pub measures: BTreeMap<String, MeasureValue>,
    pub product_factors: BTreeMap<String, Evaluation>,
    pub quality_aspects: BTreeMap<String, Evaluation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Quality evaluation of one scope entity
pub struct EvaluatedModel<S: EvaluationScope> {
    entity_id: String,
    entity_name: String,
    system: Arc<System>,
    quality_model: Arc<QualityModelInstance>,
    library: Arc<MeasureLibrary>,
    strategy: Arc<dyn AggregationStrategy>,
    results: Option<EvaluationResults>,
    _scope: PhantomData<fn() -> S>,
}

pub type EvaluatedSystemModel = EvaluatedModel<SystemScope>;
pub type EvaluatedComponentModel = EvaluatedModel<ComponentScope>;
pub type EvaluatedInfrastructureModel = EvaluatedModel<InfrastructureScope>;
pub type EvaluatedRequestTraceModel = EvaluatedModel<RequestTraceScope>;

impl<S: EvaluationScope> std::fmt::Debug for EvaluatedModel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatedModel")
            .field("scope", &S::NAME)
            .field("entity_id", &self.entity_id)
            .field("strategy", &self.strategy.name())
            .field("evaluated", &self.results.is_some())
            .finish()
    }
}

impl<S: EvaluationScope> EvaluatedModel<S> {
    pub fn new(
        entity_id: &str,
        entity_name: &str,
        system: Arc<System>,
        quality_model: Arc<QualityModelInstance>,
        library: Arc<MeasureLibrary>,
        strategy: Arc<dyn AggregationStrategy>,
    ) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            entity_name: entity_name.to_string(),
            system,
            quality_model,
            library,
            strategy,
            results: None,
            _scope: PhantomData,
        }
    }

    pub fn scope(&self) -> &'static str {
        S::NAME
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn is_evaluated(&self) -> bool {
        self.results.is_some()
    }

    /// Results of the last `evaluate` call
    pub fn results(&self) -> Option<&EvaluationResults> {
        self.results.as_ref()
    }

    pub fn measure_value(&self, measure_id: &str) -> Option<MeasureValue> {
        self.results.as_ref()?.measures.get(measure_id).copied()
    }

    pub fn factor_evaluation(&self, factor_id: &str) -> Option<Evaluation> {
        self.results.as_ref()?.product_factors.get(factor_id).copied()
    }

    pub fn aspect_evaluation(&self, aspect_id: &str) -> Option<Evaluation> {
        self.results.as_ref()?.quality_aspects.get(aspect_id).copied()
    }

    /// Evaluate against the given activation and replace the stored results
    pub fn evaluate(
        &mut self,
        active_aspects: &[String],
        active_factors: &[String],
    ) -> EngineResult<&EvaluationResults> {
        let results = self.compute(active_aspects, active_factors)?;
        Ok(self.results.insert(results))
    }

    fn compute(
        &self,
        active_aspects: &[String],
        active_factors: &[String],
    ) -> EngineResult<EvaluationResults> {
        let model = self.quality_model.as_ref();
        let system = self.system.as_ref();

        model.check_active(active_aspects, active_factors)?;
        let entity = S::entity(system, &self.entity_id)?;
        let registry = S::registry(&self.library);

        let reachable = model.reachable_factors(active_aspects, active_factors);
        debug!(
            "Evaluating {} '{}': {} reachable factors",
            S::NAME,
            self.entity_id,
            reachable.len()
        );

        let mut measures = BTreeMap::new();
        let mut diagnostics = Vec::new();
        for factor_id in &reachable {
            let factor = model.get_product_factor(factor_id)?;
            for measure_id in &factor.measures {
                if measures.contains_key(measure_id) {
                    continue;
                }
                let Some(calculation) = registry.get(measure_id) else {
                    continue;
                };
                let value = match calculation(entity, system) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(
                            "Measure {} failed on {} '{}': {}",
                            measure_id,
                            S::NAME,
                            self.entity_id,
                            e
                        );
                        diagnostics.push(Diagnostic {
                            measure: measure_id.clone(),
                            message: e.to_string(),
                        });
                        MeasureValue::NotApplicable
                    }
                };
                measures.insert(measure_id.clone(), value);
            }
        }
        debug!("Ran {} measures for '{}'", measures.len(), self.entity_id);

        let mut propagation =
            Propagation::new(model, self.strategy.as_ref(), &measures, &reachable);
        let product_factors = propagation.evaluate_factors();

        let aspect_ids: BTreeSet<String> = if active_aspects.is_empty() {
            model.aspects_impacted_by(&reachable)
        } else {
            active_aspects.iter().cloned().collect()
        };
        let quality_aspects = propagation.evaluate_aspects(aspect_ids.iter());

        Ok(EvaluationResults {
            scope: S::NAME,
            entity_id: self.entity_id.clone(),
            entity_name: self.entity_name.clone(),
            active_aspects: active_aspects.to_vec(),
            active_factors: active_factors.to_vec(),
            measures,
            product_factors,
            quality_aspects,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::{Endpoint, EndpointKind};
    use crate::error::EngineError;
    use crate::evaluation::{Rating, ThresholdAggregation};

    fn shared(system: System) -> (Arc<System>, Arc<QualityModelInstance>, Arc<MeasureLibrary>) {
        (
            Arc::new(system),
            Arc::new(QualityModelInstance::builtin().unwrap()),
            Arc::new(MeasureLibrary::builtin()),
        )
    }

    fn secure_service() -> System {
        let mut system = System::new("s", "s");
        system
            .add_component(
                Component::service("api", "api")
                    .with_endpoint(
                        Endpoint::new("e1", "one", EndpointKind::Query)
                            .with_protocol("https")
                            .unwrap(),
                    )
                    .with_endpoint(
                        Endpoint::new("e2", "two", EndpointKind::Query)
                            .with_protocol("https")
                            .unwrap(),
                    ),
            )
            .unwrap();
        system
    }

    fn component_model(system: System) -> EvaluatedComponentModel {
        let (system, model, library) = shared(system);
        EvaluatedModel::new(
            "api",
            "api",
            system,
            model,
            library,
            Arc::new(ThresholdAggregation::default()),
        )
    }

    #[test]
    fn test_active_factor_evaluates_own_measures() {
        let mut model = component_model(secure_service());
        assert!(!model.is_evaluated());

        model
            .evaluate(&[], &["secureCommunication".to_string()])
            .unwrap();
        assert_eq!(
            model.measure_value("ratioOfEndpointsSupportingSsl"),
            Some(MeasureValue::Value(1.0))
        );
        let factor = model.factor_evaluation("secureCommunication").unwrap();
        assert_eq!(factor.rating(), Some(Rating::High));
        assert!(model.aspect_evaluation("confidentiality").is_some());
    }

    #[test]
    fn test_repeated_evaluation_is_identical() {
        let mut model = component_model(secure_service());
        let aspects = vec!["confidentiality".to_string(), "modularity".to_string()];
        let first = model.evaluate(&aspects, &[]).unwrap().clone();
        let second = model.evaluate(&aspects, &[]).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(first.quality_aspects.len(), 2);
    }

    #[test]
    fn test_unknown_activation_fails() {
        let mut model = component_model(secure_service());
        let err = model.evaluate(&["speed".to_string()], &[]).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: "QualityAspect", .. }));
        assert!(!model.is_evaluated());
    }

    #[test]
    fn test_missing_entity_fails() {
        let (system, model, library) = shared(secure_service());
        let mut evaluated: EvaluatedComponentModel = EvaluatedModel::new(
            "ghost",
            "ghost",
            system,
            model,
            library,
            Arc::new(ThresholdAggregation::default()),
        );
        let err = evaluated.evaluate(&["availability".to_string()], &[]).unwrap_err();
        assert_eq!(err, EngineError::not_found("Component", "ghost"));
    }

    #[test]
    fn test_results_serialize_with_na() {
        let mut system = System::new("s", "s");
        system
            .add_component(Component::service("api", "api"))
            .unwrap();
        let mut model = component_model(system);
        let results = model
            .evaluate(&[], &["secureCommunication".to_string()])
            .unwrap();
        assert_eq!(results.product_factors["secureCommunication"], Evaluation::NotApplicable);
        let json = serde_json::to_value(results).unwrap();
        assert_eq!(json["measures"]["ratioOfEndpointsSupportingSsl"], "n/a");
        assert_eq!(json["product_factors"]["secureCommunication"], "n/a");
        assert_eq!(json["scope"], "component");
    }
}
