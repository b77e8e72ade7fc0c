//! JSON reporter
//!
//! Outputs `EvaluationResults` as pretty-printed JSON, `"n/a"` kept literal.

use crate::evaluation::EvaluationResults;
use anyhow::Result;

/// Render one result set as JSON
pub fn render(results: &EvaluationResults) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

/// Render several result sets as a JSON array
pub fn render_all(results: &[EvaluationResults]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_results;

    #[test]
    fn test_json_render_valid() {
        let json_str = render(&test_results()).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["entity_id"], "orders");
        assert_eq!(parsed["measures"]["ratioOfSecuredLinks"], "n/a");
        assert_eq!(parsed["product_factors"]["secureCommunication"]["rating"], "high");
        assert_eq!(parsed["quality_aspects"]["integrity"], "n/a");
        assert_eq!(parsed["diagnostics"][0]["measure"], "ratioOfSecuredLinks");
    }
}
