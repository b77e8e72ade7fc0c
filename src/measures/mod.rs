//! Measure library
//!
//! A measure is a pure function over one scope entity and the owning
//! [`System`]. The library keeps one [`MeasureRegistry`] per evaluation scope;
//! the same measure id may be registered in several scopes with different
//! implementations (a component's SSL ratio looks at its own endpoints, the
//! system's at all endpoints).
//!
//! Calculations return [`MeasureValue::NotApplicable`] when the population a
//! ratio is taken over is empty. An `Err` means the graph broke an invariant
//! the measure relies on; evaluation records that as "n/a" with a diagnostic.

mod common;
mod component;
mod infrastructure;
mod request_trace;
mod system;

use crate::architecture::{Component, Infrastructure, RequestTrace, System};
use crate::error::EngineResult;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Result of one measure
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasureValue {
    Value(f64),
    NotApplicable,
}

impl MeasureValue {
    /// `numerator / denominator`, "n/a" for an empty population
    pub fn ratio(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            MeasureValue::NotApplicable
        } else {
            MeasureValue::Value(numerator as f64 / denominator as f64)
        }
    }

    pub fn count(n: usize) -> Self {
        MeasureValue::Value(n as f64)
    }

    pub fn from_bool(flag: bool) -> Self {
        MeasureValue::Value(if flag { 1.0 } else { 0.0 })
    }

    /// Arithmetic mean, "n/a" for no values
    pub fn mean(values: impl IntoIterator<Item = f64>) -> Self {
        let (sum, n) = values
            .into_iter()
            .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
        if n == 0 {
            MeasureValue::NotApplicable
        } else {
            MeasureValue::Value(sum / n as f64)
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MeasureValue::Value(v) => Some(*v),
            MeasureValue::NotApplicable => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, MeasureValue::Value(_))
    }
}

impl From<Option<f64>> for MeasureValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(MeasureValue::NotApplicable, MeasureValue::Value)
    }
}

impl fmt::Display for MeasureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureValue::Value(v) => write!(f, "{:.3}", v),
            MeasureValue::NotApplicable => f.write_str("n/a"),
        }
    }
}

impl Serialize for MeasureValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MeasureValue::Value(v) => serializer.serialize_f64(*v),
            MeasureValue::NotApplicable => serializer.serialize_str("n/a"),
        }
    }
}

impl<'de> Deserialize<'de> for MeasureValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(MeasureValue::Value(v)),
            Raw::Text(s) if s == "n/a" => Ok(MeasureValue::NotApplicable),
            Raw::Text(s) => Err(de::Error::custom(format!(
                "expected a number or \"n/a\", got \"{}\"",
                s
            ))),
        }
    }
}

/// Pure calculation over a scope entity
pub type Calculation<E> = fn(&E, &System) -> EngineResult<MeasureValue>;

/// Measure id -> calculation for one scope
pub struct MeasureRegistry<E> {
    calculations: BTreeMap<String, Calculation<E>>,
}

impl<E> Default for MeasureRegistry<E> {
    fn default() -> Self {
        Self {
            calculations: BTreeMap::new(),
        }
    }
}

impl<E> Clone for MeasureRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            calculations: self.calculations.clone(),
        }
    }
}

impl<E> fmt::Debug for MeasureRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.calculations.keys()).finish()
    }
}

impl<E> MeasureRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a calculation
    pub fn insert(&mut self, measure_id: &str, calculation: Calculation<E>) {
        self.calculations.insert(measure_id.to_string(), calculation);
    }

    pub fn get(&self, measure_id: &str) -> Option<Calculation<E>> {
        self.calculations.get(measure_id).copied()
    }

    pub fn contains(&self, measure_id: &str) -> bool {
        self.calculations.contains_key(measure_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.calculations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.calculations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculations.is_empty()
    }
}

/// The four scope registries
#[derive(Debug, Clone, Default)]
pub struct MeasureLibrary {
    pub component: MeasureRegistry<Component>,
    pub system: MeasureRegistry<System>,
    pub infrastructure: MeasureRegistry<Infrastructure>,
    pub request_trace: MeasureRegistry<RequestTrace>,
}

impl MeasureLibrary {
    /// Library with every built-in calculation registered
    pub fn builtin() -> Self {
        let mut library = Self::default();
        component::register(&mut library.component);
        system::register(&mut library.system);
        infrastructure::register(&mut library.infrastructure);
        request_trace::register(&mut library.request_trace);
        library
    }

    /// Total number of calculations across scopes
    pub fn len(&self) -> usize {
        self.component.len()
            + self.system.len()
            + self.infrastructure.len()
            + self.request_trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every measure id with at least one calculation
    pub fn measure_ids(&self) -> BTreeSet<&str> {
        self.component
            .ids()
            .chain(self.system.ids())
            .chain(self.infrastructure.ids())
            .chain(self.request_trace.ids())
            .collect()
    }
}
