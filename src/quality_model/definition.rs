//! Serde types for the quality-model catalog file

use serde::{Deserialize, Serialize};

/// Whole catalog as read from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityModelDefinition {
    #[serde(default)]
    pub literature: Vec<LiteratureSource>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub high_level_aspects: Vec<HighLevelAspect>,
    #[serde(default)]
    pub quality_aspects: Vec<QualityAspect>,
    #[serde(default)]
    pub product_factors: Vec<ProductFactor>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub impacts: Vec<ImpactDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureSource {
    pub key: String,
    pub title: String,
}

/// Relation of a vocabulary entity to another one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRelationType {
    #[serde(rename = "part-of")]
    PartOf,
    #[serde(rename = "is-a")]
    IsA,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelation {
    #[serde(rename = "type")]
    pub relation_type: EntityRelationType,
    pub entity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub relation: Option<EntityRelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighLevelAspect {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAspect {
    pub id: String,
    pub name: String,
    pub high_level_aspect: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFactor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub relevant_entities: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub measures: Vec<String>,
}

/// How raw measure values map onto `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasureScale {
    /// Value already in `[0, 1]`
    Ratio {
        #[serde(default = "default_higher_is_better")]
        higher_is_better: bool,
    },
    /// Linear between `good` (score 1) and `bad` (score 0), clamped
    Threshold { good: f64, bad: f64 },
}

fn default_higher_is_better() -> bool {
    true
}

impl Default for MeasureScale {
    fn default() -> Self {
        MeasureScale::Ratio {
            higher_is_better: true,
        }
    }
}

impl MeasureScale {
    /// Map a raw value to a score in `[0, 1]`
    pub fn normalize(&self, value: f64) -> f64 {
        let score = match *self {
            MeasureScale::Ratio { higher_is_better } => {
                if higher_is_better {
                    value
                } else {
                    1.0 - value
                }
            }
            MeasureScale::Threshold { good, bad } => {
                if (good - bad).abs() < f64::EPSILON {
                    if value == good { 1.0 } else { 0.0 }
                } else {
                    (value - bad) / (good - bad)
                }
            }
        };
        score.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub calculation: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub scale: MeasureScale,
}

/// Sign of an impact edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactType {
    Positive,
    Negative,
    Neutral,
}

impl ImpactType {
    /// Contribution of a source score along this edge; neutral edges contribute nothing
    pub fn weigh(&self, score: f64) -> Option<f64> {
        match self {
            ImpactType::Positive => Some(score),
            ImpactType::Negative => Some(1.0 - score),
            ImpactType::Neutral => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactDefinition {
    pub source: String,
    pub target: String,
    pub impact: ImpactType,
}
