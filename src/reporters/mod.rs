//! Output reporters for evaluation results
//!
//! Supports two output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON

mod catalog;
mod json;
mod text;

pub use catalog::render_catalog;

use crate::evaluation::EvaluationResults;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render one result set
pub fn report(results: &EvaluationResults, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::render(results)),
        OutputFormat::Json => json::render(results),
    }
}

/// Render several result sets (one per entity of a scope)
pub fn report_all(results: &[EvaluationResults], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(results.iter().map(text::render).collect::<Vec<_>>().join("\n")),
        OutputFormat::Json => json::render_all(results),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::evaluation::{Diagnostic, Evaluation, Rating};
    use crate::measures::MeasureValue;

    /// Minimal result set for reporter tests
    pub(crate) fn test_results() -> EvaluationResults {
        EvaluationResults {
            scope: "component",
            entity_id: "orders".into(),
            entity_name: "Orders".into(),
            active_aspects: vec!["confidentiality".into()],
            active_factors: vec![],
            measures: [
                ("ratioOfEndpointsSupportingSsl".to_string(), MeasureValue::Value(1.0)),
                ("ratioOfSecuredLinks".to_string(), MeasureValue::NotApplicable),
            ]
            .into_iter()
            .collect(),
            product_factors: [(
                "secureCommunication".to_string(),
                Evaluation::Rated {
                    score: 1.0,
                    rating: Rating::High,
                },
            )]
            .into_iter()
            .collect(),
            quality_aspects: [
                (
                    "confidentiality".to_string(),
                    Evaluation::Rated {
                        score: 0.5,
                        rating: Rating::Moderate,
                    },
                ),
                ("integrity".to_string(), Evaluation::NotApplicable),
            ]
            .into_iter()
            .collect(),
            diagnostics: vec![Diagnostic {
                measure: "ratioOfSecuredLinks".into(),
                message: "Endpoint 'gone' not found".into(),
            }],
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("sarif").is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_report_all_json_is_array() {
        let results = vec![test_results(), test_results()];
        let out = report_all(&results, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }
}
