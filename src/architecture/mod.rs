//! Architecture graph model
//!
//! Components, endpoints, links, infrastructure, deployment mappings, data
//! and request traces, all owned by a [`System`] and cross-referenced by id.
//!
//! ```text
//!   Component ──owns──▶ Endpoint ◀──targets── Link ◀──source── Component
//!       │                  │
//!       └──uses──▶ DataAggregate / BackingData ◀──uses── Infrastructure
//!
//!   DeploymentMapping: Component | Infrastructure ──▶ Infrastructure
//!   RequestTrace: external Endpoint + ordered Link chains
//! ```

mod document;
pub mod entities;
pub mod properties;
mod system;

pub use document::SystemDocument;
pub use entities::{
    BackingData, BackingDataKind, Component, ComponentKind, DataAggregate, DataUsage,
    DeployedEntity, DeploymentMapping, Endpoint, EndpointKind, Infrastructure,
    InfrastructureKind, Link, RequestTrace, UsageRelation,
};
pub use properties::{PropertyBag, PropertyKey, PropertyOwner, PropertyValue, ValueType};
pub use system::{CycleCensus, System};
