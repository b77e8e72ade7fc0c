//! Orchestrates evaluated models across every scope entity of a system

use super::aggregation::{AggregationStrategy, ThresholdAggregation};
use super::model::{
    EvaluatedComponentModel, EvaluatedInfrastructureModel, EvaluatedModel,
    EvaluatedRequestTraceModel, EvaluatedSystemModel, EvaluationScope,
};
use crate::architecture::System;
use crate::error::{EngineError, EngineResult};
use crate::measures::MeasureLibrary;
use crate::quality_model::QualityModelInstance;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Cached evaluated models, one per scope entity
#[derive(Debug)]
pub struct EvaluationModelsWrapper {
    system: Arc<System>,
    quality_model: Arc<QualityModelInstance>,
    library: Arc<MeasureLibrary>,
    strategy: Arc<dyn AggregationStrategy>,
    system_model: EvaluatedSystemModel,
    component_models: BTreeMap<String, EvaluatedComponentModel>,
    infrastructure_models: BTreeMap<String, EvaluatedInfrastructureModel>,
    request_trace_models: BTreeMap<String, EvaluatedRequestTraceModel>,
}

impl EvaluationModelsWrapper {
    /// Build models for every entity with the built-in library and default strategy
    pub fn new(system: impl Into<Arc<System>>, quality_model: Arc<QualityModelInstance>) -> Self {
        Self::assemble(
            system.into(),
            quality_model,
            Arc::new(MeasureLibrary::builtin()),
            Arc::new(ThresholdAggregation::default()),
        )
    }

    /// Build models for every entity with an explicit library and strategy
    pub fn from_parts(
        system: impl Into<Arc<System>>,
        quality_model: Arc<QualityModelInstance>,
        library: MeasureLibrary,
        strategy: impl AggregationStrategy + 'static,
    ) -> Self {
        Self::assemble(
            system.into(),
            quality_model,
            Arc::new(library),
            Arc::new(strategy),
        )
    }

    /// Swap the measure library; cached models are rebuilt
    pub fn with_library(self, library: MeasureLibrary) -> Self {
        Self::assemble(self.system, self.quality_model, Arc::new(library), self.strategy)
    }

    /// Swap the aggregation strategy; cached models are rebuilt
    pub fn with_strategy(self, strategy: impl AggregationStrategy + 'static) -> Self {
        Self::assemble(self.system, self.quality_model, self.library, Arc::new(strategy))
    }

    fn assemble(
        system: Arc<System>,
        quality_model: Arc<QualityModelInstance>,
        library: Arc<MeasureLibrary>,
        strategy: Arc<dyn AggregationStrategy>,
    ) -> Self {
        let start = Instant::now();
        let shared = Shared {
            system: &system,
            quality_model: &quality_model,
            library: &library,
            strategy: &strategy,
        };

        let component_models: BTreeMap<String, EvaluatedComponentModel> =
            shared.models(system.components().values().map(|c| (&c.id, &c.name)));
        let infrastructure_models: BTreeMap<String, EvaluatedInfrastructureModel> =
            shared.models(system.infrastructure().values().map(|i| (&i.id, &i.name)));
        let request_trace_models: BTreeMap<String, EvaluatedRequestTraceModel> =
            shared.models(system.request_traces().values().map(|t| (&t.id, &t.name)));
        let system_model: EvaluatedSystemModel = shared.model(&system.id, &system.name);

        info!(
            "Prepared evaluation models for '{}': {} components, {} infrastructure, {} request traces ({} calculations, {} strategy) in {:?}",
            system.name,
            component_models.len(),
            infrastructure_models.len(),
            request_trace_models.len(),
            library.len(),
            strategy.name(),
            start.elapsed()
        );

        Self {
            system,
            quality_model,
            library,
            strategy,
            system_model,
            component_models,
            infrastructure_models,
            request_trace_models,
        }
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn quality_model(&self) -> &QualityModelInstance {
        &self.quality_model
    }

    pub fn library(&self) -> &MeasureLibrary {
        &self.library
    }

    // ==================== Evaluation ====================

    pub fn get_evaluated_system_model(
        &mut self,
        active_aspects: &[String],
        active_factors: &[String],
    ) -> EngineResult<&EvaluatedSystemModel> {
        self.system_model.evaluate(active_aspects, active_factors)?;
        Ok(&self.system_model)
    }

    pub fn get_evaluated_component_model(
        &mut self,
        component_id: &str,
        active_aspects: &[String],
        active_factors: &[String],
    ) -> EngineResult<&EvaluatedComponentModel> {
        evaluate_cached(
            &mut self.component_models,
            "Component",
            component_id,
            active_aspects,
            active_factors,
        )
    }

    pub fn get_evaluated_infrastructure_model(
        &mut self,
        infrastructure_id: &str,
        active_aspects: &[String],
        active_factors: &[String],
    ) -> EngineResult<&EvaluatedInfrastructureModel> {
        evaluate_cached(
            &mut self.infrastructure_models,
            "Infrastructure",
            infrastructure_id,
            active_aspects,
            active_factors,
        )
    }

    pub fn get_evaluated_request_trace_model(
        &mut self,
        trace_id: &str,
        active_aspects: &[String],
        active_factors: &[String],
    ) -> EngineResult<&EvaluatedRequestTraceModel> {
        evaluate_cached(
            &mut self.request_trace_models,
            "RequestTrace",
            trace_id,
            active_aspects,
            active_factors,
        )
    }

    /// Evaluate every component model in parallel, in id order
    pub fn evaluate_all_components(
        &mut self,
        active_aspects: &[String],
        active_factors: &[String],
    ) -> EngineResult<Vec<&EvaluatedComponentModel>> {
        let start = Instant::now();
        self.component_models
            .par_iter_mut()
            .map(|(_, model)| model.evaluate(active_aspects, active_factors).map(|_| ()))
            .collect::<EngineResult<Vec<()>>>()?;
        debug!(
            "Evaluated {} component models in {:?}",
            self.component_models.len(),
            start.elapsed()
        );
        Ok(self.component_models.values().collect())
    }

    /// Evaluate every infrastructure model in parallel, in id order
    pub fn evaluate_all_infrastructure(
        &mut self,
        active_aspects: &[String],
        active_factors: &[String],
    ) -> EngineResult<Vec<&EvaluatedInfrastructureModel>> {
        self.infrastructure_models
            .par_iter_mut()
            .map(|(_, model)| model.evaluate(active_aspects, active_factors).map(|_| ()))
            .collect::<EngineResult<Vec<()>>>()?;
        Ok(self.infrastructure_models.values().collect())
    }

    /// Evaluate every request trace model in parallel, in id order
    pub fn evaluate_all_request_traces(
        &mut self,
        active_aspects: &[String],
        active_factors: &[String],
    ) -> EngineResult<Vec<&EvaluatedRequestTraceModel>> {
        self.request_trace_models
            .par_iter_mut()
            .map(|(_, model)| model.evaluate(active_aspects, active_factors).map(|_| ()))
            .collect::<EngineResult<Vec<()>>>()?;
        Ok(self.request_trace_models.values().collect())
    }

    // ==================== Enumeration ====================

    pub fn get_available_components(&self) -> Vec<(String, String)> {
        available(&self.component_models)
    }

    pub fn get_available_infrastructure(&self) -> Vec<(String, String)> {
        available(&self.infrastructure_models)
    }

    pub fn get_available_request_traces(&self) -> Vec<(String, String)> {
        available(&self.request_trace_models)
    }
}

/// Snapshots handed to every model built in one pass
struct Shared<'a> {
    system: &'a Arc<System>,
    quality_model: &'a Arc<QualityModelInstance>,
    library: &'a Arc<MeasureLibrary>,
    strategy: &'a Arc<dyn AggregationStrategy>,
}

impl Shared<'_> {
    fn model<S: EvaluationScope>(&self, id: &str, name: &str) -> EvaluatedModel<S> {
        EvaluatedModel::new(
            id,
            name,
            Arc::clone(self.system),
            Arc::clone(self.quality_model),
            Arc::clone(self.library),
            Arc::clone(self.strategy),
        )
    }

    fn models<'e, S: EvaluationScope>(
        &self,
        entities: impl Iterator<Item = (&'e String, &'e String)>,
    ) -> BTreeMap<String, EvaluatedModel<S>> {
        entities
            .map(|(id, name)| (id.clone(), self.model(id, name)))
            .collect()
    }
}

fn evaluate_cached<'a, S: EvaluationScope>(
    models: &'a mut BTreeMap<String, EvaluatedModel<S>>,
    kind: &'static str,
    id: &str,
    active_aspects: &[String],
    active_factors: &[String],
) -> EngineResult<&'a EvaluatedModel<S>> {
    let model = models
        .get_mut(id)
        .ok_or_else(|| EngineError::not_found(kind, id))?;
    model.evaluate(active_aspects, active_factors)?;
    Ok(model)
}

fn available<S: EvaluationScope>(
    models: &BTreeMap<String, EvaluatedModel<S>>,
) -> Vec<(String, String)> {
    models
        .values()
        .map(|m| (m.entity_id().to_string(), m.entity_name().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::{
        Component, DeploymentMapping, Endpoint, EndpointKind, Infrastructure, InfrastructureKind,
        Link, RequestTrace,
    };
    use crate::evaluation::Rating;

    fn two_services() -> System {
        let mut system = System::new("shop", "Shop");
        for id in ["orders", "stock"] {
            system
                .add_component(Component::service(id, id).with_endpoint(
                    Endpoint::new(&format!("{}-api", id), "api", EndpointKind::Query)
                        .with_protocol("https")
                        .unwrap(),
                ))
                .unwrap();
        }
        system
            .add_endpoint(
                "orders",
                Endpoint::external("orders-public", "public", EndpointKind::Command)
                    .with_protocol("https")
                    .unwrap(),
            )
            .unwrap();
        system
            .add_link(Link::new("orders-stock", "orders", "stock-api"))
            .unwrap();
        system
            .add_infrastructure(Infrastructure::new("node", "Node", InfrastructureKind::Compute))
            .unwrap();
        system
            .add_deployment_mapping(DeploymentMapping::component("orders-on-node", "orders", "node"))
            .unwrap();
        system
            .add_request_trace(
                RequestTrace::new("lookup", "Lookup", "orders-public").with_chain(&["orders-stock"]),
            )
            .unwrap();
        system
    }

    fn wrapper() -> EvaluationModelsWrapper {
        EvaluationModelsWrapper::new(
            two_services(),
            Arc::new(QualityModelInstance::builtin().unwrap()),
        )
    }

    #[test]
    fn test_models_are_built_per_entity() {
        let wrapper = wrapper();
        assert_eq!(
            wrapper.get_available_components(),
            vec![
                ("orders".to_string(), "orders".to_string()),
                ("stock".to_string(), "stock".to_string())
            ]
        );
        assert_eq!(wrapper.get_available_infrastructure().len(), 1);
        assert_eq!(
            wrapper.get_available_request_traces(),
            vec![("lookup".to_string(), "Lookup".to_string())]
        );
    }

    #[test]
    fn test_unknown_entity_is_not_found() {
        let mut wrapper = wrapper();
        let err = wrapper
            .get_evaluated_component_model("ghost", &["availability".to_string()], &[])
            .unwrap_err();
        assert_eq!(err, EngineError::not_found("Component", "ghost"));
        assert!(wrapper
            .get_evaluated_request_trace_model("ghost", &[], &[])
            .is_err());
    }

    #[test]
    fn test_each_scope_evaluates() {
        let mut wrapper = wrapper();
        let aspects = vec!["confidentiality".to_string(), "faultTolerance".to_string()];

        let system = wrapper.get_evaluated_system_model(&aspects, &[]).unwrap();
        assert!(system.is_evaluated());
        assert_eq!(system.results().unwrap().scope, "system");

        let component = wrapper
            .get_evaluated_component_model("orders", &aspects, &[])
            .unwrap();
        assert!(component.results().unwrap().measures.len() > 1);

        let node = wrapper
            .get_evaluated_infrastructure_model("node", &aspects, &[])
            .unwrap();
        assert_eq!(node.results().unwrap().entity_id, "node");

        let trace = wrapper
            .get_evaluated_request_trace_model("lookup", &aspects, &[])
            .unwrap();
        assert!(trace
            .results()
            .unwrap()
            .measures
            .contains_key("ratioOfSecuredLinks"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let aspects = vec!["modularity".to_string(), "availability".to_string()];
        let mut parallel = wrapper();
        let all: Vec<_> = parallel
            .evaluate_all_components(&aspects, &[])
            .unwrap()
            .into_iter()
            .map(|m| m.results().unwrap().clone())
            .collect();

        let mut sequential = wrapper();
        for results in &all {
            let single = sequential
                .get_evaluated_component_model(&results.entity_id, &aspects, &[])
                .unwrap();
            assert_eq!(single.results().unwrap(), results);
        }
        assert_eq!(all.len(), 2);
    }

    #[derive(Debug)]
    struct Pessimist;

    impl AggregationStrategy for Pessimist {
        fn name(&self) -> &'static str {
            "pessimist"
        }

        fn combine_factor(&self, measure_scores: &[f64], _: &[f64]) -> Option<f64> {
            measure_scores.iter().copied().reduce(f64::min)
        }

        fn combine_aspect(&self, impact_contributions: &[f64]) -> Option<f64> {
            impact_contributions.iter().copied().reduce(f64::min)
        }

        fn include_factor_impacts(&self) -> bool {
            false
        }

        fn rate(&self, _: f64) -> Rating {
            Rating::Low
        }
    }

    #[test]
    fn test_from_parts_matches_builders() {
        let factors = vec!["secureCommunication".to_string()];
        let mut built = wrapper().with_strategy(Pessimist);
        let mut direct = EvaluationModelsWrapper::from_parts(
            two_services(),
            Arc::new(QualityModelInstance::builtin().unwrap()),
            MeasureLibrary::builtin(),
            Pessimist,
        );
        assert_eq!(direct.strategy.name(), "pessimist");
        assert_eq!(direct.get_available_components().len(), 2);

        let expected = built
            .get_evaluated_component_model("stock", &[], &factors)
            .unwrap()
            .results()
            .cloned();
        let actual = direct
            .get_evaluated_component_model("stock", &[], &factors)
            .unwrap()
            .results()
            .cloned();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_with_strategy_swaps_aggregation() {
        let factors = vec!["secureCommunication".to_string()];
        let mut default = wrapper();
        let model = default
            .get_evaluated_component_model("stock", &[], &factors)
            .unwrap();
        assert_eq!(
            model.factor_evaluation("secureCommunication").unwrap().rating(),
            Some(Rating::High)
        );

        let mut custom = wrapper().with_strategy(Pessimist);
        let model = custom
            .get_evaluated_component_model("stock", &[], &factors)
            .unwrap();
        let factor = model.factor_evaluation("secureCommunication").unwrap();
        assert_eq!(factor.score(), Some(1.0));
        assert_eq!(factor.rating(), Some(Rating::Low));
    }
}
