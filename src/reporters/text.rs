//! Text (terminal) reporter with colors and formatting

use crate::evaluation::{Evaluation, EvaluationResults, Rating};
use crate::measures::MeasureValue;
use console::style;
use std::fmt::Write;

const RULE: &str = "──────────────────────────────────────";

pub(super) fn rating_label(rating: Rating) -> String {
    let label = format!("{:<8}", rating);
    match rating {
        Rating::High => style(label).green().bold().to_string(),
        Rating::Moderate => style(label).yellow().bold().to_string(),
        Rating::Low => style(label).red().bold().to_string(),
    }
}

fn format_evaluation(evaluation: &Evaluation) -> String {
    match evaluation {
        Evaluation::Rated { score, rating } => {
            format!("{:>6.3}  {}", score, rating_label(*rating))
        }
        Evaluation::NotApplicable => format!("{:>6}", style("n/a").dim()),
    }
}

fn format_measure(value: &MeasureValue) -> String {
    match value {
        MeasureValue::Value(v) => format!("{:>8.3}", v),
        MeasureValue::NotApplicable => format!("{:>8}", style("n/a").dim()),
    }
}

/// Render one result set as formatted terminal output
pub fn render(results: &EvaluationResults) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "\n{} {} '{}' ({})",
        style("Quality evaluation:").bold(),
        results.scope,
        results.entity_id,
        results.entity_name
    );
    let _ = writeln!(out, "{}", style(RULE).dim());

    let width = results
        .quality_aspects
        .keys()
        .chain(results.product_factors.keys())
        .chain(results.measures.keys())
        .map(String::len)
        .max()
        .unwrap_or(0);

    let _ = writeln!(out, "{}", style("QUALITY ASPECTS").bold());
    if results.quality_aspects.is_empty() {
        let _ = writeln!(out, "  {}", style("none evaluated").dim());
    }
    for (id, evaluation) in &results.quality_aspects {
        let _ = writeln!(out, "  {:<width$}  {}", id, format_evaluation(evaluation));
    }

    let _ = writeln!(out, "\n{}", style("PRODUCT FACTORS").bold());
    for (id, evaluation) in &results.product_factors {
        let _ = writeln!(out, "  {:<width$}  {}", id, format_evaluation(evaluation));
    }

    let _ = writeln!(out, "\n{}", style("MEASURES").bold());
    for (id, value) in &results.measures {
        let _ = writeln!(out, "  {:<width$}  {}", id, format_measure(value));
    }

    if !results.diagnostics.is_empty() {
        let _ = writeln!(out, "\n{}", style("DIAGNOSTICS").yellow().bold());
        for diagnostic in &results.diagnostics {
            let _ = writeln!(
                out,
                "  {} {}: {}",
                style("!").yellow(),
                diagnostic.measure,
                diagnostic.message
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_results;

    #[test]
    fn test_text_render_sections() {
        let out = console::strip_ansi_codes(&render(&test_results())).to_string();
        assert!(out.contains("component 'orders' (Orders)"));
        assert!(out.contains("QUALITY ASPECTS"));
        assert!(out.contains("Moderate"));
        assert!(out.contains("High"));
        assert!(out.contains("DIAGNOSTICS"));
        assert!(out.contains("ratioOfSecuredLinks: Endpoint 'gone' not found"));
    }

    #[test]
    fn test_text_render_na_values() {
        let out = console::strip_ansi_codes(&render(&test_results())).to_string();
        let integrity = out
            .lines()
            .find(|l| l.trim_start().starts_with("integrity"))
            .unwrap();
        assert!(integrity.contains("n/a"));
        let ssl = out
            .lines()
            .find(|l| l.contains("ratioOfEndpointsSupportingSsl"))
            .unwrap();
        assert!(ssl.contains("1.000"));
    }
}
