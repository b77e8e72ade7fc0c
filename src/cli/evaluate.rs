//! Evaluate command - run the quality evaluation for one scope

use super::{Scope, Session};
use anyhow::{bail, Context, Result};
use archqual::architecture::{System, SystemDocument};
use archqual::evaluation::{EvaluatedModel, EvaluationModelsWrapper, EvaluationResults, EvaluationScope};
use archqual::measures::MeasureLibrary;
use archqual::quality_model::QualityModelInstance;
use archqual::reporters::{self, OutputFormat};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Load and validate an architecture document
pub(crate) fn load_system(path: &Path) -> Result<System> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read architecture document {}", path.display()))?;
    let document: SystemDocument = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse architecture document {}", path.display()))?;
    System::from_document(document)
        .with_context(|| format!("Invalid architecture in {}", path.display()))
}

/// Command line, then config, then every quality aspect
fn resolve_activation(
    session: &Session,
    aspects: Vec<String>,
    factors: Vec<String>,
) -> (Vec<String>, Vec<String>) {
    if !aspects.is_empty() || !factors.is_empty() {
        return (aspects, factors);
    }
    let defaults = &session.config.evaluation;
    if !defaults.active_aspects.is_empty() || !defaults.active_factors.is_empty() {
        return (defaults.active_aspects.clone(), defaults.active_factors.clone());
    }
    (all_aspects(&session.quality_model), Vec::new())
}

fn all_aspects(model: &QualityModelInstance) -> Vec<String> {
    model.quality_aspects().keys().cloned().collect()
}

fn results_of<S: EvaluationScope>(model: &EvaluatedModel<S>) -> Result<EvaluationResults> {
    model
        .results()
        .cloned()
        .with_context(|| format!("{} '{}' was not evaluated", model.scope(), model.entity_id()))
}

fn require_id(id: Option<&str>, scope: Scope) -> Result<&str> {
    match id {
        Some(id) => Ok(id),
        None => bail!("--id is required for {:?} scope (or pass --all)", scope),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    session: &Session,
    document: &Path,
    scope: Scope,
    id: Option<&str>,
    aspects: Vec<String>,
    factors: Vec<String>,
    all: bool,
    format: OutputFormat,
) -> Result<()> {
    let start = Instant::now();
    let system = load_system(document)?;
    let (aspects, factors) = resolve_activation(session, aspects, factors);
    debug!("Active aspects {:?}, factors {:?}", aspects, factors);

    let mut wrapper = EvaluationModelsWrapper::from_parts(
        system,
        session.quality_model.clone(),
        MeasureLibrary::builtin(),
        session.config.strategy(),
    );

    let results: Vec<EvaluationResults> = match (scope, all) {
        (Scope::System, _) => {
            vec![results_of(wrapper.get_evaluated_system_model(&aspects, &factors)?)?]
        }
        (Scope::Component, true) => wrapper
            .evaluate_all_components(&aspects, &factors)?
            .into_iter()
            .map(results_of)
            .collect::<Result<_>>()?,
        (Scope::Infrastructure, true) => wrapper
            .evaluate_all_infrastructure(&aspects, &factors)?
            .into_iter()
            .map(results_of)
            .collect::<Result<_>>()?,
        (Scope::Trace, true) => wrapper
            .evaluate_all_request_traces(&aspects, &factors)?
            .into_iter()
            .map(results_of)
            .collect::<Result<_>>()?,
        (Scope::Component, false) => results_of(wrapper.get_evaluated_component_model(
            require_id(id, scope)?,
            &aspects,
            &factors,
        )?)
        .map(|r| vec![r])?,
        (Scope::Infrastructure, false) => results_of(wrapper.get_evaluated_infrastructure_model(
            require_id(id, scope)?,
            &aspects,
            &factors,
        )?)
        .map(|r| vec![r])?,
        (Scope::Trace, false) => results_of(wrapper.get_evaluated_request_trace_model(
            require_id(id, scope)?,
            &aspects,
            &factors,
        )?)
        .map(|r| vec![r])?,
    };

    let output = if all {
        reporters::report_all(&results, format)?
    } else {
        match results.first() {
            Some(single) => reporters::report(single, format)?,
            None => String::new(),
        }
    };
    println!("{}", output);

    info!(
        "Evaluated {} {:?} entit{} in {:?}",
        results.len(),
        scope,
        if results.len() == 1 { "y" } else { "ies" },
        start.elapsed()
    );
    Ok(())
}
