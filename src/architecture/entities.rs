//! Architecture entities
//!
//! Entities reference each other by id only. Ownership lives in
//! [`System`](super::System), which keeps these structs free of cycles and
//! serializable as plain data.

use super::properties::{PropertyBag, PropertyKey, PropertyOwner, PropertyValue};
use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Component variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Service,
    BackingService,
    StorageBackingService,
    ProxyBackingService,
    BrokerBackingService,
}

impl ComponentKind {
    /// Every backing-service variant counts as a backing service
    pub fn is_backing_service(&self) -> bool {
        !matches!(self, ComponentKind::Service)
    }
}

/// Endpoint interaction styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    #[default]
    Query,
    Command,
    Event,
    Subscription,
}

impl EndpointKind {
    pub fn is_asynchronous(&self) -> bool {
        matches!(self, EndpointKind::Event | EndpointKind::Subscription)
    }
}

/// How a component, endpoint or infrastructure node relates to a data item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UsageRelation {
    #[default]
    Usage,
    CachedUsage,
    Persistence,
}

/// Reference to a data aggregate or backing data item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataUsage {
    pub target: String,
    #[serde(default)]
    pub relation: UsageRelation,
}

impl DataUsage {
    pub fn new(target: impl Into<String>, relation: UsageRelation) -> Self {
        Self {
            target: target.into(),
            relation,
        }
    }
}

/// Endpoint exposed by a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: EndpointKind,
    /// Reachable from outside the system
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub properties: PropertyBag,
    #[serde(default)]
    pub data_aggregates: Vec<DataUsage>,
}

impl Endpoint {
    pub fn new(id: &str, name: &str, kind: EndpointKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            external: false,
            properties: PropertyBag::new(),
            data_aggregates: Vec::new(),
        }
    }

    /// Endpoint reachable from outside the system
    pub fn external(id: &str, name: &str, kind: EndpointKind) -> Self {
        Self {
            external: true,
            ..Self::new(id, name, kind)
        }
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn with_property(
        mut self,
        key: PropertyKey,
        value: impl Into<PropertyValue>,
    ) -> EngineResult<Self> {
        self.properties.set(PropertyOwner::Endpoint, key, value)?;
        Ok(self)
    }

    pub fn with_protocol(self, protocol: &str) -> EngineResult<Self> {
        self.with_property(PropertyKey::Protocol, protocol)
    }

    pub fn with_data_aggregate(mut self, aggregate_id: &str, relation: UsageRelation) -> Self {
        self.data_aggregates
            .push(DataUsage::new(aggregate_id, relation));
        self
    }
}

/// A service or backing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub data_aggregates: Vec<DataUsage>,
    #[serde(default)]
    pub backing_data: Vec<DataUsage>,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl Component {
    pub fn new(id: &str, name: &str, kind: ComponentKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            metadata: BTreeMap::new(),
            endpoints: Vec::new(),
            data_aggregates: Vec::new(),
            backing_data: Vec::new(),
            properties: PropertyBag::new(),
        }
    }

    pub fn service(id: &str, name: &str) -> Self {
        Self::new(id, name, ComponentKind::Service)
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn with_data_aggregate(mut self, aggregate_id: &str, relation: UsageRelation) -> Self {
        self.data_aggregates
            .push(DataUsage::new(aggregate_id, relation));
        self
    }

    pub fn with_backing_data(mut self, backing_data_id: &str, relation: UsageRelation) -> Self {
        self.backing_data
            .push(DataUsage::new(backing_data_id, relation));
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_property(
        mut self,
        key: PropertyKey,
        value: impl Into<PropertyValue>,
    ) -> EngineResult<Self> {
        self.properties.set(PropertyOwner::Component, key, value)?;
        Ok(self)
    }

    pub fn external_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter().filter(|e| e.is_external())
    }

    pub fn endpoint(&self, endpoint_id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == endpoint_id)
    }

    /// Whether this component uses the aggregate under any relation
    pub fn uses_data_aggregate(&self, aggregate_id: &str) -> bool {
        self.data_aggregates.iter().any(|u| u.target == aggregate_id)
    }

    pub fn persists_data_aggregates(&self) -> bool {
        self.data_aggregates
            .iter()
            .any(|u| u.relation == UsageRelation::Persistence)
    }
}

/// Directed call from a component to an endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl Link {
    pub fn new(id: &str, source_component: &str, target_endpoint: &str) -> Self {
        Self {
            id: id.to_string(),
            source: source_component.to_string(),
            target: target_endpoint.to_string(),
            properties: PropertyBag::new(),
        }
    }

    pub fn with_property(
        mut self,
        key: PropertyKey,
        value: impl Into<PropertyValue>,
    ) -> EngineResult<Self> {
        self.properties.set(PropertyOwner::Link, key, value)?;
        Ok(self)
    }

    pub fn has_timeout(&self) -> bool {
        self.properties.number(PropertyKey::Timeout) > 0.0
    }

    pub fn has_retries(&self) -> bool {
        self.properties.number(PropertyKey::Retries) > 0.0
    }

    pub fn has_circuit_breaker(&self) -> bool {
        self.properties.flag(PropertyKey::CircuitBreaker)
    }
}

/// Infrastructure node variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InfrastructureKind {
    #[default]
    Compute,
    ContainerRuntime,
    Platform,
}

/// Compute node, runtime or platform hosting components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Infrastructure {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: InfrastructureKind,
    #[serde(default)]
    pub backing_data: Vec<DataUsage>,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl Infrastructure {
    pub fn new(id: &str, name: &str, kind: InfrastructureKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            backing_data: Vec::new(),
            properties: PropertyBag::new(),
        }
    }

    pub fn with_property(
        mut self,
        key: PropertyKey,
        value: impl Into<PropertyValue>,
    ) -> EngineResult<Self> {
        self.properties
            .set(PropertyOwner::Infrastructure, key, value)?;
        Ok(self)
    }

    pub fn with_backing_data(mut self, backing_data_id: &str, relation: UsageRelation) -> Self {
        self.backing_data
            .push(DataUsage::new(backing_data_id, relation));
        self
    }

    pub fn availability_zone(&self) -> &str {
        self.properties.text(PropertyKey::AvailabilityZone)
    }

    pub fn is_managed(&self) -> bool {
        self.properties.flag(PropertyKey::Managed)
    }
}

/// What a deployment mapping deploys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum DeployedEntity {
    Component(String),
    Infrastructure(String),
}

impl DeployedEntity {
    pub fn id(&self) -> &str {
        match self {
            DeployedEntity::Component(id) | DeployedEntity::Infrastructure(id) => id,
        }
    }
}

/// Placement of a component or infrastructure node on infrastructure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentMapping {
    pub id: String,
    pub deployed: DeployedEntity,
    pub underlying: String,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl DeploymentMapping {
    pub fn new(id: &str, deployed: DeployedEntity, underlying: &str) -> Self {
        Self {
            id: id.to_string(),
            deployed,
            underlying: underlying.to_string(),
            properties: PropertyBag::new(),
        }
    }

    pub fn component(id: &str, component_id: &str, underlying: &str) -> Self {
        Self::new(id, DeployedEntity::Component(component_id.to_string()), underlying)
    }

    pub fn with_property(
        mut self,
        key: PropertyKey,
        value: impl Into<PropertyValue>,
    ) -> EngineResult<Self> {
        self.properties
            .set(PropertyOwner::DeploymentMapping, key, value)?;
        Ok(self)
    }

    pub fn with_replicas(self, replicas: u32) -> EngineResult<Self> {
        self.with_property(PropertyKey::Replicas, replicas)
    }

    pub fn replicas(&self) -> f64 {
        self.properties.number(PropertyKey::Replicas)
    }
}

/// Business data owned by the domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAggregate {
    pub id: String,
    pub name: String,
}

impl DataAggregate {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Operational data categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackingDataKind {
    Config,
    Secret,
    Log,
    Metric,
    #[default]
    Data,
}

/// Configuration, secrets, logs and metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackingData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: BackingDataKind,
}

impl BackingData {
    pub fn new(id: &str, name: &str, kind: BackingDataKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
        }
    }
}

/// Call paths triggered by one external endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTrace {
    pub id: String,
    pub name: String,
    pub external_endpoint: String,
    /// Ordered link-id chains, one per call path
    #[serde(default)]
    pub link_chains: Vec<Vec<String>>,
}

impl RequestTrace {
    pub fn new(id: &str, name: &str, external_endpoint: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            external_endpoint: external_endpoint.to_string(),
            link_chains: Vec::new(),
        }
    }

    pub fn with_chain(mut self, links: &[&str]) -> Self {
        self.link_chains
            .push(links.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Distinct link ids over all chains, in first-seen order
    pub fn link_ids(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.link_chains
            .iter()
            .flatten()
            .filter(|id| seen.insert(id.as_str()))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_builder() {
        let c = Component::service("orders", "Order Service")
            .with_endpoint(Endpoint::external("orders-api", "GET /orders", EndpointKind::Query))
            .with_endpoint(Endpoint::new("orders-events", "order events", EndpointKind::Event))
            .with_data_aggregate("order", UsageRelation::Persistence);

        assert_eq!(c.endpoints.len(), 2);
        assert_eq!(c.external_endpoints().count(), 1);
        assert!(c.persists_data_aggregates());
        assert!(c.endpoint("orders-events").unwrap().kind.is_asynchronous());
    }

    #[test]
    fn test_link_resilience_flags() {
        let link = Link::new("l1", "a", "b-api")
            .with_property(PropertyKey::Timeout, 500u32)
            .unwrap()
            .with_property(PropertyKey::CircuitBreaker, true)
            .unwrap();
        assert!(link.has_timeout());
        assert!(!link.has_retries());
        assert!(link.has_circuit_breaker());
    }

    #[test]
    fn test_request_trace_link_ids_dedup() {
        let trace = RequestTrace::new("t1", "checkout", "gw-api")
            .with_chain(&["l1", "l2"])
            .with_chain(&["l1", "l3"]);
        assert_eq!(trace.link_ids(), vec!["l1", "l2", "l3"]);
    }

    #[test]
    fn test_deployed_entity_serde() {
        let mapping = DeploymentMapping::component("d1", "orders", "node-1");
        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["deployed"]["type"], "component");
        assert_eq!(json["deployed"]["id"], "orders");
    }
}
