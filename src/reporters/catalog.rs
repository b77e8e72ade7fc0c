//! Quality-model catalog listing

use super::text::rating_label;
use super::OutputFormat;
use crate::evaluation::Rating;
use crate::measures::MeasureLibrary;
use crate::quality_model::{ImpactType, QualityModelInstance};
use anyhow::Result;
use console::style;
use serde_json::json;
use std::fmt::Write;

/// Scopes with a calculation for a measure
fn scopes_of(library: &MeasureLibrary, measure_id: &str) -> Vec<&'static str> {
    [
        ("system", library.system.contains(measure_id)),
        ("component", library.component.contains(measure_id)),
        ("infrastructure", library.infrastructure.contains(measure_id)),
        ("request_trace", library.request_trace.contains(measure_id)),
    ]
    .into_iter()
    .filter_map(|(scope, present)| present.then_some(scope))
    .collect()
}

fn impact_symbol(impact: ImpactType) -> String {
    match impact {
        ImpactType::Positive => style("+").green().to_string(),
        ImpactType::Negative => style("-").red().to_string(),
        ImpactType::Neutral => style("~").dim().to_string(),
    }
}

/// Render the quality model with per-measure scope membership
pub fn render_catalog(
    model: &QualityModelInstance,
    library: &MeasureLibrary,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(model, library),
        OutputFormat::Text => Ok(render_text(model, library)),
    }
}

fn render_json(model: &QualityModelInstance, library: &MeasureLibrary) -> Result<String> {
    let measures: Vec<_> = model
        .measures()
        .values()
        .map(|m| {
            json!({
                "id": m.id,
                "name": m.name,
                "calculation": m.calculation,
                "scale": m.scale,
                "scopes": scopes_of(library, &m.id),
            })
        })
        .collect();
    let value = json!({
        "high_level_aspects": model.high_level_aspects().values().collect::<Vec<_>>(),
        "quality_aspects": model.quality_aspects().values().collect::<Vec<_>>(),
        "product_factors": model.product_factors().values().collect::<Vec<_>>(),
        "measures": measures,
        "impacts": model.impacts(),
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

fn render_text(model: &QualityModelInstance, library: &MeasureLibrary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", style("QUALITY ASPECTS").bold());
    for hla in model.high_level_aspects().values() {
        let _ = writeln!(out, "  {}", style(&hla.name).cyan().bold());
        for aspect in model.aspects_of(&hla.id) {
            let _ = writeln!(out, "    {} {}", aspect.id, style(&aspect.name).dim());
            for impact in model.incoming_impacts(&aspect.id) {
                let _ = writeln!(out, "      {} {}", impact_symbol(impact.impact_type), impact.source);
            }
        }
    }

    let _ = writeln!(out, "\n{}", style("PRODUCT FACTORS").bold());
    for factor in model.product_factors().values() {
        let _ = writeln!(out, "  {} {}", style(&factor.id).bold(), style(&factor.name).dim());
        for measure_id in &factor.measures {
            let scopes = scopes_of(library, measure_id);
            let scopes = if scopes.is_empty() {
                style("no calculation".to_string()).dim().to_string()
            } else {
                style(scopes.join(", ")).dim().to_string()
            };
            let _ = writeln!(out, "      {} [{}]", measure_id, scopes);
        }
        for impact in model.outgoing_impacts(&factor.id) {
            let _ = writeln!(
                out,
                "      {} {}",
                impact_symbol(impact.impact_type),
                impact.target.id()
            );
        }
    }

    let _ = writeln!(
        out,
        "\n{} aspects, {} factors, {} measures, {} impacts. Ratings: {} {} {}",
        model.quality_aspects().len(),
        model.product_factors().len(),
        model.measures().len(),
        model.impacts().len(),
        rating_label(Rating::High).trim_end(),
        rating_label(Rating::Moderate).trim_end(),
        rating_label(Rating::Low).trim_end(),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_json_lists_scopes() {
        let model = QualityModelInstance::builtin().unwrap();
        let library = MeasureLibrary::builtin();
        let out = render_catalog(&model, &library, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        let ssl = parsed["measures"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["id"] == "ratioOfEndpointsSupportingSsl")
            .unwrap();
        let scopes = ssl["scopes"].as_array().unwrap();
        assert!(scopes.iter().any(|s| s == "component"));
        assert!(scopes.iter().any(|s| s == "request_trace"));
        assert_eq!(
            parsed["quality_aspects"].as_array().unwrap().len(),
            model.quality_aspects().len()
        );
    }

    #[test]
    fn test_catalog_text_groups_aspects() {
        let model = QualityModelInstance::builtin().unwrap();
        let library = MeasureLibrary::builtin();
        let out = console::strip_ansi_codes(
            &render_catalog(&model, &library, OutputFormat::Text).unwrap(),
        )
        .to_string();
        assert!(out.contains("QUALITY ASPECTS"));
        assert!(out.contains("secureCommunication"));
        assert!(out.contains("+ secureCommunication"));
    }
}
