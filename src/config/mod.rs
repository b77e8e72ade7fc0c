//! Configuration module for archqual
//!
//! This module handles:
//! - Engine configuration (archqual.toml / .archqualrc.json)
//! - Rating bounds and impact propagation
//! - Per-measure scale overrides
//! - CLI defaults (activation, output format)

mod engine_config;

pub use engine_config::{
    load_engine_config, EngineConfig, EvaluationDefaults, MeasureOverride, OutputConfig,
    CONFIG_FILE_NAMES,
};
