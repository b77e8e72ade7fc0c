//! Engine configuration (archqual.toml)
//!
//! Example `archqual.toml`:
//! ```toml
//! [aggregation]
//! high_threshold = 0.7
//! low_threshold = 0.3
//! include_factor_impacts = true
//!
//! [measures.serviceReplicationLevel]
//! good = 3.0
//! bad = 1.0
//!
//! [measures.ratioOfCyclicComponents]
//! higher_is_better = false
//!
//! [evaluation]
//! active_aspects = ["availability", "modularity"]
//! active_factors = []
//!
//! [output]
//! format = "json"
//! ```

use crate::error::{EngineError, EngineResult};
use crate::evaluation::{AggregationConfig, ThresholdAggregation};
use crate::quality_model::{MeasureScale, QualityModelInstance};
use crate::reporters::OutputFormat;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File names searched in a directory, in order
pub const CONFIG_FILE_NAMES: [&str; 2] = ["archqual.toml", ".archqualrc.json"];

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rating bounds and impact propagation
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Per-measure scale overrides (key = measure id)
    #[serde(default)]
    pub measures: BTreeMap<String, MeasureOverride>,

    /// Default activation
    #[serde(default)]
    pub evaluation: EvaluationDefaults,

    /// Report defaults
    #[serde(default)]
    pub output: OutputConfig,

    /// File the configuration was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Scale override for one measure
///
/// Either `good` and `bad` (threshold scale) or `higher_is_better` (ratio scale).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher_is_better: Option<bool>,
}

impl MeasureOverride {
    pub fn scale(&self, measure_id: &str) -> EngineResult<MeasureScale> {
        match (self.good, self.bad, self.higher_is_better) {
            (Some(good), Some(bad), None) => Ok(MeasureScale::Threshold { good, bad }),
            (None, None, Some(higher_is_better)) => Ok(MeasureScale::Ratio { higher_is_better }),
            _ => Err(EngineError::Config(format!(
                "measures.{}: set either both 'good' and 'bad' or only 'higher_is_better'",
                measure_id
            ))),
        }
    }
}

/// Aspects and factors activated when none are given on the command line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDefaults {
    #[serde(default)]
    pub active_aspects: Vec<String>,
    #[serde(default)]
    pub active_factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Discover configuration in a directory
///
/// Searches `archqual.toml`, then `.archqualrc.json`. Unreadable or
/// malformed files are skipped with a warning; no file yields defaults.
pub fn load_engine_config(dir: &Path) -> EngineConfig {
    for name in CONFIG_FILE_NAMES {
        let path = dir.join(name);
        if !path.exists() {
            continue;
        }
        match EngineConfig::from_file(&path) {
            Ok(config) => {
                debug!("Loaded engine config from {}", path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {:#}", path.display(), e);
            }
        }
    }

    debug!("No engine config found in {}, using defaults", dir.display());
    EngineConfig::default()
}

impl EngineConfig {
    /// Load an explicit file; JSON by `.json` extension, TOML otherwise
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let mut config: EngineConfig = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config {}", path.display()))?
        };
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.aggregation.validate()?;
        for (id, measure) in &self.measures {
            measure.scale(id)?;
        }
        Ok(())
    }

    /// Default strategy configured from `[aggregation]`
    pub fn strategy(&self) -> ThresholdAggregation {
        ThresholdAggregation::new(self.aggregation)
    }

    /// Apply `[measures.*]` scale overrides to a quality model
    pub fn apply_measure_overrides(
        &self,
        mut model: QualityModelInstance,
    ) -> EngineResult<QualityModelInstance> {
        for (id, measure) in &self.measures {
            model = model.with_measure_scale(id, measure.scale(id)?)?;
            debug!("Overrode scale of measure {}", id);
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let config = load_engine_config(dir.path());
        assert_eq!(config, EngineConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_load_toml() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("archqual.toml"),
            r#"
[aggregation]
high_threshold = 0.8

[measures.serviceReplicationLevel]
good = 3.0
bad = 1.0

[evaluation]
active_aspects = ["availability"]

[output]
format = "json"
"#,
        )
        .unwrap();

        let config = load_engine_config(dir.path());
        assert_eq!(config.aggregation.high_threshold, 0.8);
        assert_eq!(config.aggregation.low_threshold, 0.34);
        assert!(config.aggregation.include_factor_impacts);
        assert_eq!(config.evaluation.active_aspects, vec!["availability"]);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(
            config.measures["serviceReplicationLevel"].scale("serviceReplicationLevel"),
            Ok(MeasureScale::Threshold { good: 3.0, bad: 1.0 })
        );
        assert!(config.source.is_some());
    }

    #[test]
    fn test_load_json_rc() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(".archqualrc.json"),
            r#"{"aggregation": {"include_factor_impacts": false}}"#,
        )
        .unwrap();
        let config = load_engine_config(dir.path());
        assert!(!config.aggregation.include_factor_impacts);
    }

    #[test]
    fn test_malformed_discovered_file_falls_back() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("archqual.toml"), "[aggregation\n").unwrap();
        assert_eq!(load_engine_config(dir.path()), EngineConfig::default());
        assert!(EngineConfig::from_file(&dir.path().join("archqual.toml")).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = EngineConfig::default();
        config.aggregation.low_threshold = 0.9;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_incomplete_override_is_rejected() {
        let mut config = EngineConfig::default();
        config.measures.insert(
            "serviceReplicationLevel".into(),
            MeasureOverride {
                good: Some(3.0),
                ..Default::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_apply_to_model() {
        let mut config = EngineConfig::default();
        config.measures.insert(
            "serviceReplicationLevel".into(),
            MeasureOverride {
                good: Some(5.0),
                bad: Some(1.0),
                higher_is_better: None,
            },
        );
        let model = config
            .apply_measure_overrides(QualityModelInstance::builtin().unwrap())
            .unwrap();
        assert_eq!(
            model.get_measure("serviceReplicationLevel").unwrap().scale,
            MeasureScale::Threshold { good: 5.0, bad: 1.0 }
        );

        config
            .measures
            .insert("noSuchMeasure".into(), MeasureOverride {
                higher_is_better: Some(false),
                ..Default::default()
            });
        let err = config
            .apply_measure_overrides(QualityModelInstance::builtin().unwrap())
            .unwrap_err();
        assert_eq!(err, EngineError::not_found("Measure", "noSuchMeasure"));
    }
}
