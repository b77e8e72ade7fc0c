//! The `System` aggregate
//!
//! Owns every architecture entity in id-keyed maps and answers the graph
//! queries measures need. Link lookups go through a [`GraphIndex`] that is
//! built on first use and dropped by every mutation, so per-component link
//! queries stay O(1) without scanning all links.

mod cycles;

use super::entities::{
    BackingData, Component, ComponentKind, DataAggregate, DeployedEntity, DeploymentMapping,
    Endpoint, Infrastructure, Link, RequestTrace,
};
use super::properties::{PropertyKey, PropertyOwner, PropertyValue};
pub use cycles::CycleCensus;
use crate::error::{EngineError, EngineResult};
use petgraph::algo::{dijkstra, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Derived lookup tables over the link and deployment relations
#[derive(Debug, Clone, Default)]
struct GraphIndex {
    /// Component graph: node weight = component id, edge weight = link id
    graph: DiGraph<String, String>,
    nodes: FxHashMap<String, NodeIndex>,
    outgoing: FxHashMap<String, Vec<String>>,
    incoming: FxHashMap<String, Vec<String>>,
    incoming_by_endpoint: FxHashMap<String, Vec<String>>,
    deployments_of: FxHashMap<DeployedEntity, Vec<String>>,
    deployments_onto: FxHashMap<String, Vec<String>>,
}

impl GraphIndex {
    fn build(system: &System) -> Self {
        let mut index = GraphIndex::default();

        for id in system.components.keys() {
            let node = index.graph.add_node(id.clone());
            index.nodes.insert(id.clone(), node);
        }

        for link in system.links.values() {
            let Some(target_component) = system.endpoint_owners.get(&link.target) else {
                // add_link rejects these, so this only trips on a broken invariant
                warn!("Link {} targets unknown endpoint {}", link.id, link.target);
                continue;
            };
            if let (Some(&src), Some(&dst)) = (
                index.nodes.get(&link.source),
                index.nodes.get(target_component),
            ) {
                index.graph.add_edge(src, dst, link.id.clone());
            }
            index
                .outgoing
                .entry(link.source.clone())
                .or_default()
                .push(link.id.clone());
            index
                .incoming
                .entry(target_component.clone())
                .or_default()
                .push(link.id.clone());
            index
                .incoming_by_endpoint
                .entry(link.target.clone())
                .or_default()
                .push(link.id.clone());
        }

        for mapping in system.deployment_mappings.values() {
            index
                .deployments_of
                .entry(mapping.deployed.clone())
                .or_default()
                .push(mapping.id.clone());
            index
                .deployments_onto
                .entry(mapping.underlying.clone())
                .or_default()
                .push(mapping.id.clone());
        }

        debug!(
            "Built graph index: {} components, {} links, {} deployment mappings",
            index.graph.node_count(),
            index.graph.edge_count(),
            system.deployment_mappings.len()
        );
        index
    }
}

/// Root aggregate of an architecture model
#[derive(Debug, Clone)]
pub struct System {
    pub id: String,
    pub name: String,
    components: BTreeMap<String, Component>,
    links: BTreeMap<String, Link>,
    infrastructure: BTreeMap<String, Infrastructure>,
    deployment_mappings: BTreeMap<String, DeploymentMapping>,
    data_aggregates: BTreeMap<String, DataAggregate>,
    backing_data: BTreeMap<String, BackingData>,
    request_traces: BTreeMap<String, RequestTrace>,
    /// endpoint id -> owning component id, kept current by every mutation
    endpoint_owners: FxHashMap<String, String>,
    index: OnceLock<GraphIndex>,
    cycles: OnceLock<CycleCensus>,
}

impl System {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            components: BTreeMap::new(),
            links: BTreeMap::new(),
            infrastructure: BTreeMap::new(),
            deployment_mappings: BTreeMap::new(),
            data_aggregates: BTreeMap::new(),
            backing_data: BTreeMap::new(),
            request_traces: BTreeMap::new(),
            endpoint_owners: FxHashMap::default(),
            index: OnceLock::new(),
            cycles: OnceLock::new(),
        }
    }

    fn index(&self) -> &GraphIndex {
        self.index.get_or_init(|| GraphIndex::build(self))
    }

    fn invalidate_index(&mut self) {
        self.index.take();
        self.cycles.take();
    }

    // ==================== Entity Maps ====================

    pub fn components(&self) -> &BTreeMap<String, Component> {
        &self.components
    }

    pub fn links(&self) -> &BTreeMap<String, Link> {
        &self.links
    }

    pub fn infrastructure(&self) -> &BTreeMap<String, Infrastructure> {
        &self.infrastructure
    }

    pub fn deployment_mappings(&self) -> &BTreeMap<String, DeploymentMapping> {
        &self.deployment_mappings
    }

    pub fn data_aggregates(&self) -> &BTreeMap<String, DataAggregate> {
        &self.data_aggregates
    }

    pub fn backing_data(&self) -> &BTreeMap<String, BackingData> {
        &self.backing_data
    }

    pub fn request_traces(&self) -> &BTreeMap<String, RequestTrace> {
        &self.request_traces
    }

    pub fn get_component(&self, id: &str) -> EngineResult<&Component> {
        self.components
            .get(id)
            .ok_or_else(|| EngineError::not_found("Component", id))
    }

    pub fn get_link(&self, id: &str) -> EngineResult<&Link> {
        self.links
            .get(id)
            .ok_or_else(|| EngineError::not_found("Link", id))
    }

    pub fn get_infrastructure(&self, id: &str) -> EngineResult<&Infrastructure> {
        self.infrastructure
            .get(id)
            .ok_or_else(|| EngineError::not_found("Infrastructure", id))
    }

    pub fn get_request_trace(&self, id: &str) -> EngineResult<&RequestTrace> {
        self.request_traces
            .get(id)
            .ok_or_else(|| EngineError::not_found("RequestTrace", id))
    }

    pub fn get_backing_data(&self, id: &str) -> EngineResult<&BackingData> {
        self.backing_data
            .get(id)
            .ok_or_else(|| EngineError::not_found("BackingData", id))
    }

    /// Components of one variant
    pub fn components_of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> {
        self.components.values().filter(move |c| c.kind == kind)
    }

    pub fn services(&self) -> impl Iterator<Item = &Component> {
        self.components_of_kind(ComponentKind::Service)
    }

    /// Every endpoint paired with its owning component
    pub fn endpoints(&self) -> impl Iterator<Item = (&Component, &Endpoint)> {
        self.components
            .values()
            .flat_map(|c| c.endpoints.iter().map(move |e| (c, e)))
    }

    pub fn get_endpoint(&self, endpoint_id: &str) -> EngineResult<&Endpoint> {
        let owner = self.search_component_of_endpoint(endpoint_id)?;
        owner.endpoint(endpoint_id).ok_or_else(|| {
            EngineError::invalid_graph(format!(
                "endpoint {} indexed under {} but not embedded in it",
                endpoint_id, owner.id
            ))
        })
    }

    // ==================== Graph Queries ====================

    /// Owning component of an endpoint
    pub fn search_component_of_endpoint(&self, endpoint_id: &str) -> EngineResult<&Component> {
        let owner = self
            .endpoint_owners
            .get(endpoint_id)
            .ok_or_else(|| EngineError::not_found("Endpoint", endpoint_id))?;
        self.components.get(owner).ok_or_else(|| {
            EngineError::invalid_graph(format!(
                "endpoint {} owned by missing component {}",
                endpoint_id, owner
            ))
        })
    }

    /// Component that owns the endpoint a link targets
    pub fn target_component_of_link(&self, link: &Link) -> EngineResult<&Component> {
        self.search_component_of_endpoint(&link.target)
            .map_err(|_| {
                EngineError::invalid_graph(format!(
                    "link {} targets endpoint {} which no component owns",
                    link.id, link.target
                ))
            })
    }

    pub fn target_endpoint_of_link(&self, link: &Link) -> EngineResult<&Endpoint> {
        self.get_endpoint(&link.target)
    }

    fn links_by_id<'a>(&'a self, ids: Option<&'a Vec<String>>) -> Vec<&'a Link> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.links.get(id))
            .collect()
    }

    /// Links whose source is the component
    pub fn get_outgoing_links_of_component(&self, component_id: &str) -> EngineResult<Vec<&Link>> {
        self.get_component(component_id)?;
        Ok(self.links_by_id(self.index().outgoing.get(component_id)))
    }

    /// Links whose target endpoint belongs to the component
    pub fn get_incoming_links_of_component(&self, component_id: &str) -> EngineResult<Vec<&Link>> {
        self.get_component(component_id)?;
        Ok(self.links_by_id(self.index().incoming.get(component_id)))
    }

    /// Links targeting one endpoint
    pub fn get_incoming_links_of_endpoint(&self, endpoint_id: &str) -> EngineResult<Vec<&Link>> {
        self.search_component_of_endpoint(endpoint_id)?;
        Ok(self.links_by_id(self.index().incoming_by_endpoint.get(endpoint_id)))
    }

    /// Minimum number of link hops from `from` to `to`
    ///
    /// `Some(0)` for the same component, `None` when `to` is unreachable.
    pub fn get_shortest_path_length(&self, from: &str, to: &str) -> EngineResult<Option<usize>> {
        self.get_component(from)?;
        self.get_component(to)?;
        if from == to {
            return Ok(Some(0));
        }

        let index = self.index();
        let (Some(&start), Some(&goal)) = (index.nodes.get(from), index.nodes.get(to)) else {
            return Ok(None);
        };
        let costs = dijkstra(&index.graph, start, Some(goal), |_| 1usize);
        Ok(costs.get(&goal).copied())
    }

    /// BFS distances to every component reachable from `from`, including itself at 0
    pub fn distances_from(&self, from: &str) -> EngineResult<BTreeMap<String, usize>> {
        self.get_component(from)?;
        let index = self.index();

        let mut distances = BTreeMap::new();
        let mut queue = VecDeque::new();
        distances.insert(from.to_string(), 0usize);
        queue.push_back(from.to_string());

        while let Some(current) = queue.pop_front() {
            let depth = distances[&current];
            for link_id in index.outgoing.get(&current).into_iter().flatten() {
                let Some(link) = self.links.get(link_id) else {
                    continue;
                };
                let Some(next) = self.endpoint_owners.get(&link.target) else {
                    continue;
                };
                if !distances.contains_key(next) {
                    distances.insert(next.clone(), depth + 1);
                    queue.push_back(next.clone());
                }
            }
        }

        Ok(distances)
    }

    /// Groups of components that can all reach each other (size > 1)
    pub fn strongly_connected_components(&self) -> Vec<Vec<String>> {
        let index = self.index();
        tarjan_scc(&index.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut ids: Vec<String> =
                    scc.into_iter().map(|n| index.graph[n].clone()).collect();
                ids.sort();
                ids
            })
            .collect()
    }

    /// Simple cycles over synchronous links, counted once per graph state
    pub fn synchronous_cycles(&self) -> &CycleCensus {
        self.cycles.get_or_init(|| CycleCensus::build(self))
    }

    /// Deployment mappings that deploy the given entity
    pub fn deployment_mappings_of(&self, deployed: &DeployedEntity) -> Vec<&DeploymentMapping> {
        self.index()
            .deployments_of
            .get(deployed)
            .into_iter()
            .flatten()
            .filter_map(|id| self.deployment_mappings.get(id))
            .collect()
    }

    pub fn deployment_mappings_of_component(&self, component_id: &str) -> Vec<&DeploymentMapping> {
        self.deployment_mappings_of(&DeployedEntity::Component(component_id.to_string()))
    }

    /// Deployment mappings placing something onto the infrastructure node
    pub fn deployment_mappings_onto(&self, infrastructure_id: &str) -> Vec<&DeploymentMapping> {
        self.index()
            .deployments_onto
            .get(infrastructure_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.deployment_mappings.get(id))
            .collect()
    }

    /// Infrastructure nodes a component is directly deployed on
    pub fn hosting_infrastructure_of_component(&self, component_id: &str) -> Vec<&Infrastructure> {
        self.deployment_mappings_of_component(component_id)
            .into_iter()
            .filter_map(|m| self.infrastructure.get(&m.underlying))
            .collect()
    }

    /// Infrastructure nodes hosting the component, directly or through stacked infrastructure
    pub fn all_hosting_infrastructure_of_component(
        &self,
        component_id: &str,
    ) -> Vec<&Infrastructure> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = self
            .deployment_mappings_of_component(component_id)
            .into_iter()
            .map(|m| m.underlying.as_str())
            .collect();
        let mut result = Vec::new();

        while let Some(infra_id) = queue.pop_front() {
            if !visited.insert(infra_id) {
                continue;
            }
            let Some(infra) = self.infrastructure.get(infra_id) else {
                continue;
            };
            result.push(infra);
            for mapping in
                self.deployment_mappings_of(&DeployedEntity::Infrastructure(infra_id.to_string()))
            {
                queue.push_back(mapping.underlying.as_str());
            }
        }

        result
    }

    /// Components hosted on the infrastructure node, directly or transitively
    pub fn components_hosted_on(&self, infrastructure_id: &str) -> EngineResult<Vec<&Component>> {
        self.get_infrastructure(infrastructure_id)?;

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([infrastructure_id]);
        let mut hosted: BTreeMap<&str, &Component> = BTreeMap::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            for mapping in self.deployment_mappings_onto(current) {
                match &mapping.deployed {
                    DeployedEntity::Component(id) => {
                        if let Some(component) = self.components.get(id) {
                            hosted.insert(component.id.as_str(), component);
                        }
                    }
                    DeployedEntity::Infrastructure(id) => queue.push_back(id.as_str()),
                }
            }
        }

        Ok(hosted.into_values().collect())
    }

    // ==================== Mutations ====================

    fn check_new_id<T>(map: &BTreeMap<String, T>, kind: &str, id: &str) -> EngineResult<()> {
        if map.contains_key(id) {
            return Err(EngineError::invalid_graph(format!(
                "duplicate {} id '{}'",
                kind, id
            )));
        }
        Ok(())
    }

    fn check_endpoint(&self, endpoint: &Endpoint, seen: &mut HashSet<String>) -> EngineResult<()> {
        if self.endpoint_owners.contains_key(&endpoint.id) || !seen.insert(endpoint.id.clone()) {
            return Err(EngineError::invalid_graph(format!(
                "duplicate endpoint id '{}'",
                endpoint.id
            )));
        }
        endpoint.properties.validate_all(PropertyOwner::Endpoint)?;
        for usage in &endpoint.data_aggregates {
            if !self.data_aggregates.contains_key(&usage.target) {
                return Err(EngineError::not_found("DataAggregate", &usage.target));
            }
        }
        Ok(())
    }

    pub fn add_component(&mut self, component: Component) -> EngineResult<()> {
        Self::check_new_id(&self.components, "component", &component.id)?;
        component.properties.validate_all(PropertyOwner::Component)?;

        let mut seen = HashSet::new();
        for endpoint in &component.endpoints {
            self.check_endpoint(endpoint, &mut seen)?;
        }
        for usage in &component.data_aggregates {
            if !self.data_aggregates.contains_key(&usage.target) {
                return Err(EngineError::not_found("DataAggregate", &usage.target));
            }
        }
        for usage in &component.backing_data {
            self.get_backing_data(&usage.target)?;
        }

        for endpoint in &component.endpoints {
            self.endpoint_owners
                .insert(endpoint.id.clone(), component.id.clone());
        }
        self.components.insert(component.id.clone(), component);
        self.invalidate_index();
        Ok(())
    }

    /// Attach an endpoint to an existing component
    pub fn add_endpoint(&mut self, component_id: &str, endpoint: Endpoint) -> EngineResult<()> {
        self.get_component(component_id)?;
        self.check_endpoint(&endpoint, &mut HashSet::new())?;

        self.endpoint_owners
            .insert(endpoint.id.clone(), component_id.to_string());
        if let Some(component) = self.components.get_mut(component_id) {
            component.endpoints.push(endpoint);
        }
        self.invalidate_index();
        Ok(())
    }

    pub fn set_component_property(
        &mut self,
        component_id: &str,
        key: PropertyKey,
        value: impl Into<PropertyValue>,
    ) -> EngineResult<()> {
        let component = self
            .components
            .get_mut(component_id)
            .ok_or_else(|| EngineError::not_found("Component", component_id))?;
        component
            .properties
            .set(PropertyOwner::Component, key, value)?;
        self.invalidate_index();
        Ok(())
    }

    pub fn add_link(&mut self, link: Link) -> EngineResult<()> {
        Self::check_new_id(&self.links, "link", &link.id)?;
        self.get_component(&link.source)?;
        let owner = self.search_component_of_endpoint(&link.target)?;
        if owner.id == link.source {
            return Err(EngineError::invalid_graph(format!(
                "link {} connects component {} to its own endpoint {}",
                link.id, link.source, link.target
            )));
        }
        link.properties.validate_all(PropertyOwner::Link)?;

        self.links.insert(link.id.clone(), link);
        self.invalidate_index();
        Ok(())
    }

    pub fn add_infrastructure(&mut self, infrastructure: Infrastructure) -> EngineResult<()> {
        Self::check_new_id(&self.infrastructure, "infrastructure", &infrastructure.id)?;
        infrastructure
            .properties
            .validate_all(PropertyOwner::Infrastructure)?;
        for usage in &infrastructure.backing_data {
            self.get_backing_data(&usage.target)?;
        }

        self.infrastructure
            .insert(infrastructure.id.clone(), infrastructure);
        self.invalidate_index();
        Ok(())
    }

    pub fn add_deployment_mapping(&mut self, mapping: DeploymentMapping) -> EngineResult<()> {
        Self::check_new_id(&self.deployment_mappings, "deployment mapping", &mapping.id)?;
        match &mapping.deployed {
            DeployedEntity::Component(id) => {
                self.get_component(id)?;
            }
            DeployedEntity::Infrastructure(id) => {
                self.get_infrastructure(id)?;
                if *id == mapping.underlying {
                    return Err(EngineError::invalid_graph(format!(
                        "deployment mapping {} deploys infrastructure {} onto itself",
                        mapping.id, id
                    )));
                }
            }
        }
        self.get_infrastructure(&mapping.underlying)?;
        mapping
            .properties
            .validate_all(PropertyOwner::DeploymentMapping)?;

        self.deployment_mappings
            .insert(mapping.id.clone(), mapping);
        self.invalidate_index();
        Ok(())
    }

    pub fn add_data_aggregate(&mut self, aggregate: DataAggregate) -> EngineResult<()> {
        Self::check_new_id(&self.data_aggregates, "data aggregate", &aggregate.id)?;
        self.data_aggregates
            .insert(aggregate.id.clone(), aggregate);
        Ok(())
    }

    pub fn add_backing_data(&mut self, backing_data: BackingData) -> EngineResult<()> {
        Self::check_new_id(&self.backing_data, "backing data", &backing_data.id)?;
        self.backing_data
            .insert(backing_data.id.clone(), backing_data);
        Ok(())
    }

    pub fn add_request_trace(&mut self, trace: RequestTrace) -> EngineResult<()> {
        Self::check_new_id(&self.request_traces, "request trace", &trace.id)?;
        let endpoint = self.get_endpoint(&trace.external_endpoint)?;
        if !endpoint.is_external() {
            return Err(EngineError::invalid_graph(format!(
                "request trace {} references endpoint {} which is not external",
                trace.id, trace.external_endpoint
            )));
        }
        for link_id in trace.link_chains.iter().flatten() {
            self.get_link(link_id)?;
        }

        self.request_traces.insert(trace.id.clone(), trace);
        Ok(())
    }

    pub fn remove_link(&mut self, link_id: &str) -> EngineResult<Link> {
        let link = self
            .links
            .remove(link_id)
            .ok_or_else(|| EngineError::not_found("Link", link_id))?;
        for trace in self.request_traces.values_mut() {
            for chain in &mut trace.link_chains {
                chain.retain(|id| id != link_id);
            }
            trace.link_chains.retain(|chain| !chain.is_empty());
        }
        self.invalidate_index();
        Ok(link)
    }

    /// Remove a component along with its links, deployments and dependent traces
    pub fn remove_component(&mut self, component_id: &str) -> EngineResult<Component> {
        let component = self
            .components
            .remove(component_id)
            .ok_or_else(|| EngineError::not_found("Component", component_id))?;
        let endpoint_ids: HashSet<&str> =
            component.endpoints.iter().map(|e| e.id.as_str()).collect();

        for id in &endpoint_ids {
            self.endpoint_owners.remove(*id);
        }

        let dangling: Vec<String> = self
            .links
            .values()
            .filter(|l| l.source == component_id || endpoint_ids.contains(l.target.as_str()))
            .map(|l| l.id.clone())
            .collect();
        self.request_traces
            .retain(|_, t| !endpoint_ids.contains(t.external_endpoint.as_str()));
        for link_id in dangling {
            self.remove_link(&link_id)?;
        }

        let deployed = DeployedEntity::Component(component_id.to_string());
        self.deployment_mappings.retain(|_, m| m.deployed != deployed);

        self.invalidate_index();
        Ok(component)
    }
}
