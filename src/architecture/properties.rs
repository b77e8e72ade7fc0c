//! Typed property bags for architecture entities
//!
//! Every property an entity can carry is a variant of [`PropertyKey`]. A key
//! knows its value type, which entity kinds may carry it, and the default
//! that measures fall back to when it is absent. Values are checked once when
//! set, so measure code reads properties without shape checks.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of entity properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKey {
    Protocol,
    SupportedAuthenticationMethods,
    RateLimiting,
    UrlPath,
    Port,
    Timeout,
    Retries,
    CircuitBreaker,
    AvailabilityZone,
    Managed,
    Namespace,
    Replicas,
    AutomatedRestart,
}

/// Shape of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Number,
    Text,
    List,
}

/// Kinds of entities that carry property bags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOwner {
    Component,
    Endpoint,
    Link,
    Infrastructure,
    DeploymentMapping,
}

impl PropertyKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKey::Protocol => "protocol",
            PropertyKey::SupportedAuthenticationMethods => "supported_authentication_methods",
            PropertyKey::RateLimiting => "rate_limiting",
            PropertyKey::UrlPath => "url_path",
            PropertyKey::Port => "port",
            PropertyKey::Timeout => "timeout",
            PropertyKey::Retries => "retries",
            PropertyKey::CircuitBreaker => "circuit_breaker",
            PropertyKey::AvailabilityZone => "availability_zone",
            PropertyKey::Managed => "managed",
            PropertyKey::Namespace => "namespace",
            PropertyKey::Replicas => "replicas",
            PropertyKey::AutomatedRestart => "automated_restart",
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            PropertyKey::Protocol
            | PropertyKey::UrlPath
            | PropertyKey::AvailabilityZone
            | PropertyKey::Namespace => ValueType::Text,
            PropertyKey::SupportedAuthenticationMethods => ValueType::List,
            PropertyKey::RateLimiting
            | PropertyKey::CircuitBreaker
            | PropertyKey::Managed
            | PropertyKey::AutomatedRestart => ValueType::Bool,
            PropertyKey::Port
            | PropertyKey::Timeout
            | PropertyKey::Retries
            | PropertyKey::Replicas => ValueType::Number,
        }
    }

    /// Whether entities of `owner` kind may carry this property
    pub fn applies_to(&self, owner: PropertyOwner) -> bool {
        use PropertyOwner::*;
        match self {
            PropertyKey::Protocol
            | PropertyKey::SupportedAuthenticationMethods
            | PropertyKey::RateLimiting
            | PropertyKey::UrlPath
            | PropertyKey::Port => owner == Endpoint,
            PropertyKey::Timeout | PropertyKey::Retries | PropertyKey::CircuitBreaker => {
                owner == Link
            }
            PropertyKey::AvailabilityZone | PropertyKey::Namespace => owner == Infrastructure,
            PropertyKey::Managed => matches!(owner, Component | Infrastructure),
            PropertyKey::Replicas | PropertyKey::AutomatedRestart => owner == DeploymentMapping,
        }
    }

    /// Declared default used when the property is absent
    pub fn default_value(&self) -> PropertyValue {
        match self.value_type() {
            ValueType::Bool => PropertyValue::Bool(false),
            ValueType::Text => PropertyValue::Text(String::new()),
            ValueType::List => PropertyValue::List(Vec::new()),
            ValueType::Number => match self {
                // a deployment without an explicit count runs one instance
                PropertyKey::Replicas => PropertyValue::Number(1.0),
                _ => PropertyValue::Number(0.0),
            },
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            PropertyValue::Bool(_) => ValueType::Bool,
            PropertyValue::Number(_) => ValueType::Number,
            PropertyValue::Text(_) => ValueType::Text,
            PropertyValue::List(_) => ValueType::List,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Number(f64::from(value))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<Vec<&str>> for PropertyValue {
    fn from(value: Vec<&str>) -> Self {
        PropertyValue::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Validated map of properties for one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    values: BTreeMap<PropertyKey, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a key/value pair against the property schema
    pub fn validate(
        owner: PropertyOwner,
        key: PropertyKey,
        value: &PropertyValue,
    ) -> EngineResult<()> {
        if !key.applies_to(owner) {
            return Err(EngineError::InvalidProperty {
                key: key.to_string(),
                reason: format!("not applicable to {:?}", owner),
            });
        }
        if value.value_type() != key.value_type() {
            return Err(EngineError::InvalidProperty {
                key: key.to_string(),
                reason: format!(
                    "expected {:?} value, got {:?}",
                    key.value_type(),
                    value.value_type()
                ),
            });
        }
        Ok(())
    }

    /// Set a property after validating it for `owner`
    pub fn set(
        &mut self,
        owner: PropertyOwner,
        key: PropertyKey,
        value: impl Into<PropertyValue>,
    ) -> EngineResult<()> {
        let value = value.into();
        Self::validate(owner, key, &value)?;
        self.values.insert(key, value);
        Ok(())
    }

    /// Validate every stored entry, used after deserialization
    pub fn validate_all(&self, owner: PropertyOwner) -> EngineResult<()> {
        self.values
            .iter()
            .try_for_each(|(key, value)| Self::validate(owner, *key, value))
    }

    pub fn get(&self, key: PropertyKey) -> Option<&PropertyValue> {
        self.values.get(&key)
    }

    pub fn contains(&self, key: PropertyKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn remove(&mut self, key: PropertyKey) -> Option<PropertyValue> {
        self.values.remove(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyValue)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    // Typed readers falling back to the declared default

    pub fn flag(&self, key: PropertyKey) -> bool {
        self.get(key)
            .and_then(PropertyValue::as_bool)
            .or_else(|| key.default_value().as_bool())
            .unwrap_or(false)
    }

    pub fn number(&self, key: PropertyKey) -> f64 {
        self.get(key)
            .and_then(PropertyValue::as_f64)
            .or_else(|| key.default_value().as_f64())
            .unwrap_or(0.0)
    }

    /// Text value; text defaults are empty
    pub fn text(&self, key: PropertyKey) -> &str {
        self.get(key).and_then(PropertyValue::as_str).unwrap_or("")
    }

    /// List value; list defaults are empty
    pub fn list(&self, key: PropertyKey) -> &[String] {
        self.get(key).and_then(PropertyValue::as_list).unwrap_or(&[])
    }
}
