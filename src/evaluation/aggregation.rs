//! Aggregation of measure results into factor and aspect evaluations
//!
//! Measures are normalized to `[0, 1]` by their catalog scale. A product
//! factor's score is the mean of its own measure scores and the sign-weighted
//! scores of factors impacting it; an aspect's score is the mean of the
//! sign-weighted scores of impacting factors. Neutral impacts contribute
//! nothing. Scores are then bucketed into a [`Rating`].

use crate::error::{EngineError, EngineResult};
use crate::measures::MeasureValue;
use crate::quality_model::{MeasureScale, QualityModelInstance};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::debug;

/// Qualitative bucket of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Low,
    Moderate,
    High,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Rating::Low => "Low",
            Rating::Moderate => "Moderate",
            Rating::High => "High",
        };
        f.pad(label)
    }
}

/// Outcome for one factor or aspect
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    Rated { score: f64, rating: Rating },
    NotApplicable,
}

impl Evaluation {
    pub fn score(&self) -> Option<f64> {
        match self {
            Evaluation::Rated { score, .. } => Some(*score),
            Evaluation::NotApplicable => None,
        }
    }

    pub fn rating(&self) -> Option<Rating> {
        match self {
            Evaluation::Rated { rating, .. } => Some(*rating),
            Evaluation::NotApplicable => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Evaluation::Rated { .. })
    }
}

impl Serialize for Evaluation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Evaluation::Rated { score, rating } => {
                let mut state = serializer.serialize_struct("Evaluation", 2)?;
                state.serialize_field("score", score)?;
                state.serialize_field("rating", rating)?;
                state.end()
            }
            Evaluation::NotApplicable => serializer.serialize_str("n/a"),
        }
    }
}

fn default_high_threshold() -> f64 {
    0.67
}

fn default_low_threshold() -> f64 {
    0.34
}

fn default_true() -> bool {
    true
}

/// Tunables of the default strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Scores at or above this rate High
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    /// Scores below this rate Low
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    /// Propagate factor -> factor impacts
    #[serde(default = "default_true")]
    pub include_factor_impacts: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
            include_factor_impacts: true,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("high_threshold", self.high_threshold),
            ("low_threshold", self.low_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Config(format!(
                    "aggregation.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.low_threshold > self.high_threshold {
            return Err(EngineError::Config(format!(
                "aggregation.low_threshold ({}) exceeds high_threshold ({})",
                self.low_threshold, self.high_threshold
            )));
        }
        Ok(())
    }
}

/// Pluggable way of turning measure results into scores
pub trait AggregationStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Map a raw measure value onto `[0, 1]`
    fn normalize(&self, scale: &MeasureScale, value: f64) -> f64 {
        scale.normalize(value)
    }

    /// Factor score from its measure scores and weighted impact contributions
    fn combine_factor(&self, measure_scores: &[f64], impact_contributions: &[f64]) -> Option<f64>;

    /// Aspect score from weighted impact contributions
    fn combine_aspect(&self, impact_contributions: &[f64]) -> Option<f64>;

    /// Whether factor -> factor impacts feed into factor scores
    fn include_factor_impacts(&self) -> bool;

    fn rate(&self, score: f64) -> Rating;

    fn evaluation(&self, score: Option<f64>) -> Evaluation {
        match score {
            Some(score) => Evaluation::Rated {
                score,
                rating: self.rate(score),
            },
            None => Evaluation::NotApplicable,
        }
    }
}

/// Mean of contributions, bucketed by fixed thresholds
#[derive(Debug, Clone, Default)]
pub struct ThresholdAggregation {
    config: AggregationConfig,
}

impl ThresholdAggregation {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl AggregationStrategy for ThresholdAggregation {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn combine_factor(&self, measure_scores: &[f64], impact_contributions: &[f64]) -> Option<f64> {
        mean(measure_scores.iter().chain(impact_contributions).copied())
    }

    fn combine_aspect(&self, impact_contributions: &[f64]) -> Option<f64> {
        mean(impact_contributions.iter().copied())
    }

    fn include_factor_impacts(&self) -> bool {
        self.config.include_factor_impacts
    }

    fn rate(&self, score: f64) -> Rating {
        if score >= self.config.high_threshold {
            Rating::High
        } else if score < self.config.low_threshold {
            Rating::Low
        } else {
            Rating::Moderate
        }
    }
}

/// One pass of score propagation over the reachable factors
pub(crate) struct Propagation<'a> {
    model: &'a QualityModelInstance,
    strategy: &'a dyn AggregationStrategy,
    measures: &'a BTreeMap<String, MeasureValue>,
    reachable: &'a BTreeSet<String>,
    scores: BTreeMap<String, Option<f64>>,
    visiting: HashSet<String>,
}

impl<'a> Propagation<'a> {
    pub(crate) fn new(
        model: &'a QualityModelInstance,
        strategy: &'a dyn AggregationStrategy,
        measures: &'a BTreeMap<String, MeasureValue>,
        reachable: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            model,
            strategy,
            measures,
            reachable,
            scores: BTreeMap::new(),
            visiting: HashSet::new(),
        }
    }

    /// Score of a reachable factor; a factor already on the stack counts as unevaluated.
    /// The flag is false when a cycle was cut somewhere below, in which case the
    /// score is not memoized.
    fn factor_score(&mut self, factor_id: &str) -> (Option<f64>, bool) {
        if let Some(score) = self.scores.get(factor_id) {
            return (*score, true);
        }
        if !self.visiting.insert(factor_id.to_string()) {
            return (None, false);
        }

        let mut measure_scores = Vec::new();
        if let Some(factor) = self.model.product_factors().get(factor_id) {
            for measure_id in &factor.measures {
                let Some(value) = self.measures.get(measure_id).and_then(MeasureValue::as_f64)
                else {
                    continue;
                };
                if let Ok(measure) = self.model.get_measure(measure_id) {
                    measure_scores.push(self.strategy.normalize(&measure.scale, value));
                }
            }
        }

        let mut complete = true;
        let mut contributions = Vec::new();
        if self.strategy.include_factor_impacts() {
            let model = self.model;
            for impact in model.incoming_impacts(factor_id) {
                if !self.reachable.contains(&impact.source) {
                    continue;
                }
                let (source_score, source_complete) = self.factor_score(&impact.source);
                complete &= source_complete;
                if let Some(weighted) = source_score.and_then(|s| impact.impact_type.weigh(s)) {
                    contributions.push(weighted);
                }
            }
        }

        let score = self.strategy.combine_factor(&measure_scores, &contributions);
        self.visiting.remove(factor_id);
        if complete {
            self.scores.insert(factor_id.to_string(), score);
        }
        (score, complete)
    }

    /// Evaluate every reachable factor, in id order
    pub(crate) fn evaluate_factors(&mut self) -> BTreeMap<String, Evaluation> {
        let reachable = self.reachable;
        reachable
            .iter()
            .map(|id| {
                let (score, _) = self.factor_score(id);
                self.scores.insert(id.clone(), score);
                debug!("Factor {} -> {:?}", id, score);
                (id.clone(), self.strategy.evaluation(score))
            })
            .collect()
    }

    /// Evaluate aspects from the factor scores computed so far
    pub(crate) fn evaluate_aspects<'i>(
        &mut self,
        aspect_ids: impl Iterator<Item = &'i String>,
    ) -> BTreeMap<String, Evaluation> {
        let model = self.model;
        aspect_ids
            .map(|aspect_id| {
                let mut contributions = Vec::new();
                for impact in model.incoming_impacts(aspect_id) {
                    if !self.reachable.contains(&impact.source) {
                        continue;
                    }
                    if let Some(weighted) = self
                        .factor_score(&impact.source)
                        .0
                        .and_then(|s| impact.impact_type.weigh(s))
                    {
                        contributions.push(weighted);
                    }
                }
                let score = self.strategy.combine_aspect(&contributions);
                (aspect_id.clone(), self.strategy.evaluation(score))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let strategy = ThresholdAggregation::default();
        assert_eq!(strategy.rate(0.67), Rating::High);
        assert_eq!(strategy.rate(0.5), Rating::Moderate);
        assert_eq!(strategy.rate(0.34), Rating::Moderate);
        assert_eq!(strategy.rate(0.3399), Rating::Low);
    }

    #[test]
    fn test_combine_is_mean_or_none() {
        let strategy = ThresholdAggregation::default();
        assert_eq!(strategy.combine_factor(&[1.0, 0.0], &[0.5]), Some(0.5));
        assert_eq!(strategy.combine_factor(&[], &[]), None);
        assert_eq!(strategy.combine_aspect(&[]), None);
    }

    #[test]
    fn test_config_validation() {
        assert!(AggregationConfig::default().validate().is_ok());
        let inverted = AggregationConfig {
            high_threshold: 0.3,
            low_threshold: 0.6,
            include_factor_impacts: true,
        };
        assert!(matches!(inverted.validate(), Err(EngineError::Config(_))));
        let out_of_range = AggregationConfig {
            high_threshold: 1.5,
            ..AggregationConfig::default()
        };
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_evaluation_serialization() {
        let rated = Evaluation::Rated {
            score: 0.8,
            rating: Rating::High,
        };
        assert_eq!(
            serde_json::to_string(&rated).unwrap(),
            r#"{"score":0.8,"rating":"high"}"#
        );
        assert_eq!(
            serde_json::to_string(&Evaluation::NotApplicable).unwrap(),
            r#""n/a""#
        );
    }

    const CYCLIC: &str = r#"
        [[high_level_aspects]]
        id = "maintainability"
        name = "Maintainability"

        [[quality_aspects]]
        id = "modularity"
        name = "Modularity"
        high_level_aspect = "maintainability"

        [[product_factors]]
        id = "a"
        name = "A"
        measures = ["m"]

        [[product_factors]]
        id = "b"
        name = "B"

        [[measures]]
        id = "m"
        name = "M"

        [[impacts]]
        source = "a"
        target = "b"
        impact = "negative"

        [[impacts]]
        source = "b"
        target = "a"
        impact = "positive"

        [[impacts]]
        source = "b"
        target = "modularity"
        impact = "positive"
    "#;

    #[test]
    fn test_propagation_terminates_on_factor_cycles() {
        let model = QualityModelInstance::from_toml_str(CYCLIC).unwrap();
        let strategy = ThresholdAggregation::default();
        let measures: BTreeMap<String, MeasureValue> =
            [("m".to_string(), MeasureValue::Value(0.9))].into_iter().collect();
        let reachable = model.reachable_factors(&["modularity".to_string()], &[]);

        let mut propagation = Propagation::new(&model, &strategy, &measures, &reachable);
        let factors = propagation.evaluate_factors();
        // a is scored first; the b -> a contribution is cut by the cycle
        assert!((factors["a"].score().unwrap() - 0.9).abs() < 1e-9);
        // b: negative impact from a
        assert!((factors["b"].score().unwrap() - 0.1).abs() < 1e-9);

        let aspects = propagation.evaluate_aspects(["modularity".to_string()].iter());
        assert_eq!(aspects["modularity"].rating(), Some(Rating::Low));
    }

    #[test]
    fn test_factor_without_values_is_not_applicable() {
        let model = QualityModelInstance::from_toml_str(CYCLIC).unwrap();
        let strategy = ThresholdAggregation::default();
        let measures: BTreeMap<String, MeasureValue> =
            [("m".to_string(), MeasureValue::NotApplicable)].into_iter().collect();
        let reachable = model.reachable_factors(&["modularity".to_string()], &[]);

        let mut propagation = Propagation::new(&model, &strategy, &measures, &reachable);
        let factors = propagation.evaluate_factors();
        assert_eq!(factors["a"], Evaluation::NotApplicable);
        assert_eq!(factors["b"], Evaluation::NotApplicable);
    }
}
