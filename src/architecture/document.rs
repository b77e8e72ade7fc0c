//! Serializable architecture document
//!
//! A flat, JSON-friendly form of a [`System`]. Loading goes through the
//! validating `add_*` operations in dependency order, so a document can never
//! produce a graph the builder API would reject.

use super::entities::{
    BackingData, Component, DataAggregate, DeploymentMapping, Infrastructure, Link, RequestTrace,
};
use super::system::System;
use crate::error::EngineResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data_aggregates: Vec<DataAggregate>,
    #[serde(default)]
    pub backing_data: Vec<BackingData>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub infrastructure: Vec<Infrastructure>,
    #[serde(default)]
    pub deployment_mappings: Vec<DeploymentMapping>,
    #[serde(default)]
    pub request_traces: Vec<RequestTrace>,
}

impl System {
    /// Build a system from a document, validating every entity
    pub fn from_document(document: SystemDocument) -> EngineResult<Self> {
        let id = if document.id.is_empty() {
            document.name.clone()
        } else {
            document.id
        };
        let mut system = System::new(&id, &document.name);

        for aggregate in document.data_aggregates {
            system.add_data_aggregate(aggregate)?;
        }
        for item in document.backing_data {
            system.add_backing_data(item)?;
        }
        for component in document.components {
            system.add_component(component)?;
        }
        for link in document.links {
            system.add_link(link)?;
        }
        for infra in document.infrastructure {
            system.add_infrastructure(infra)?;
        }
        for mapping in document.deployment_mappings {
            system.add_deployment_mapping(mapping)?;
        }
        for trace in document.request_traces {
            system.add_request_trace(trace)?;
        }

        Ok(system)
    }

    pub fn to_document(&self) -> SystemDocument {
        SystemDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            data_aggregates: self.data_aggregates().values().cloned().collect(),
            backing_data: self.backing_data().values().cloned().collect(),
            components: self.components().values().cloned().collect(),
            links: self.links().values().cloned().collect(),
            infrastructure: self.infrastructure().values().cloned().collect(),
            deployment_mappings: self.deployment_mappings().values().cloned().collect(),
            request_traces: self.request_traces().values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    const DOCUMENT: &str = r#"{
        "id": "shop",
        "name": "Shop",
        "data_aggregates": [{ "id": "order", "name": "Order" }],
        "components": [
            {
                "id": "gateway",
                "name": "API Gateway",
                "kind": "proxy_backing_service",
                "endpoints": [
                    { "id": "gw-public", "name": "public", "external": true,
                      "properties": { "protocol": "https" } }
                ]
            },
            {
                "id": "orders",
                "name": "Orders",
                "kind": "service",
                "endpoints": [
                    { "id": "orders-api", "name": "orders", "kind": "command",
                      "data_aggregates": [{ "target": "order", "relation": "persistence" }] }
                ],
                "data_aggregates": [{ "target": "order", "relation": "persistence" }]
            }
        ],
        "links": [
            { "id": "gw-orders", "source": "gateway", "target": "orders-api",
              "properties": { "timeout": 2000, "circuit_breaker": true } }
        ],
        "infrastructure": [
            { "id": "node", "name": "Node", "properties": { "availability_zone": "eu-1a" } }
        ],
        "deployment_mappings": [
            { "id": "orders-on-node", "deployed": { "type": "component", "id": "orders" },
              "underlying": "node", "properties": { "replicas": 3 } }
        ],
        "request_traces": [
            { "id": "place-order", "name": "Place order", "external_endpoint": "gw-public",
              "link_chains": [["gw-orders"]] }
        ]
    }"#;

    #[test]
    fn test_load_document() {
        let document: SystemDocument = serde_json::from_str(DOCUMENT).unwrap();
        let system = System::from_document(document).unwrap();

        assert_eq!(system.components().len(), 2);
        assert_eq!(system.get_incoming_links_of_component("orders").unwrap().len(), 1);
        assert_eq!(
            system.deployment_mappings_of_component("orders")[0].replicas(),
            3.0
        );
        assert_eq!(
            system.get_infrastructure("node").unwrap().availability_zone(),
            "eu-1a"
        );
    }

    #[test]
    fn test_document_round_trip_preserves_entities() {
        let document: SystemDocument = serde_json::from_str(DOCUMENT).unwrap();
        let system = System::from_document(document).unwrap();
        let reloaded = System::from_document(system.to_document()).unwrap();

        assert_eq!(reloaded.components(), system.components());
        assert_eq!(reloaded.links(), system.links());
        assert_eq!(reloaded.request_traces(), system.request_traces());
    }

    #[test]
    fn test_document_with_mistyped_property_is_rejected() {
        let json = r#"{
            "name": "bad",
            "components": [
                { "id": "a", "name": "a", "kind": "service",
                  "endpoints": [{ "id": "a-api", "name": "api", "properties": { "protocol": 443 } }] }
            ]
        }"#;
        let document: SystemDocument = serde_json::from_str(json).unwrap();
        let err = System::from_document(document).unwrap_err();
        assert!(matches!(err, EngineError::InvalidProperty { .. }));
    }
}
