//! Helpers shared by measures of several scopes

use super::{Calculation, MeasureValue};
use crate::architecture::{
    BackingDataKind, Component, ComponentKind, DataUsage, Endpoint, Infrastructure, Link,
    PropertyKey, System, UsageRelation,
};
use crate::error::EngineResult;
use std::collections::{BTreeMap, BTreeSet};

/// Protocols that encrypt traffic in transit
pub(crate) const SSL_PROTOCOLS: &[&str] = &[
    "https", "wss", "tls", "ssl", "mqtts", "amqps", "ftps", "sftp", "grpcs", "ldaps",
];

pub(crate) fn supports_ssl(endpoint: &Endpoint) -> bool {
    let protocol = endpoint.properties.text(PropertyKey::Protocol);
    SSL_PROTOCOLS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(protocol))
}

pub(crate) fn requires_authentication(endpoint: &Endpoint) -> bool {
    !endpoint
        .properties
        .list(PropertyKey::SupportedAuthenticationMethods)
        .is_empty()
}

pub(crate) fn has_rate_limiting(endpoint: &Endpoint) -> bool {
    endpoint.properties.flag(PropertyKey::RateLimiting)
}

/// Share of `items` matching `predicate`
pub(crate) fn ratio_of<T>(items: &[T], predicate: impl Fn(&T) -> bool) -> MeasureValue {
    let matching = items.iter().filter(|item| predicate(item)).count();
    MeasureValue::ratio(matching, items.len())
}

/// Like [`ratio_of`] for predicates that consult the graph
pub(crate) fn try_ratio_of<T>(
    items: &[T],
    predicate: impl Fn(&T) -> EngineResult<bool>,
) -> EngineResult<MeasureValue> {
    let mut matching = 0;
    for item in items {
        if predicate(item)? {
            matching += 1;
        }
    }
    Ok(MeasureValue::ratio(matching, items.len()))
}

/// Average a component-scope calculation over components, skipping "n/a"
pub(crate) fn average_over<'a>(
    components: impl Iterator<Item = &'a Component>,
    system: &System,
    calculation: Calculation<Component>,
) -> EngineResult<MeasureValue> {
    let mut values = Vec::new();
    for component in components {
        if let Some(v) = calculation(component, system)?.as_f64() {
            values.push(v);
        }
    }
    Ok(MeasureValue::mean(values))
}

// ==================== Links ====================

/// A link is synchronous when it targets a query or command endpoint
pub(crate) fn is_synchronous_link(system: &System, link: &Link) -> EngineResult<bool> {
    Ok(!system.target_endpoint_of_link(link)?.kind.is_asynchronous())
}

pub(crate) fn is_secured_link(system: &System, link: &Link) -> EngineResult<bool> {
    Ok(supports_ssl(system.target_endpoint_of_link(link)?))
}

pub(crate) fn targets_kind(system: &System, link: &Link, kind: ComponentKind) -> EngineResult<bool> {
    Ok(system.target_component_of_link(link)?.kind == kind)
}

/// Distinct components calling an endpoint
pub(crate) fn distinct_callers(system: &System, endpoint_id: &str) -> EngineResult<BTreeSet<String>> {
    Ok(system
        .get_incoming_links_of_endpoint(endpoint_id)?
        .into_iter()
        .map(|l| l.source.clone())
        .collect())
}

/// Endpoint called by at least one proxy backing service
pub(crate) fn is_behind_gateway(system: &System, endpoint_id: &str) -> EngineResult<bool> {
    for link in system.get_incoming_links_of_endpoint(endpoint_id)? {
        if system.get_component(&link.source)?.kind == ComponentKind::ProxyBackingService {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Endpoints that can sit behind a gateway: called by someone or exposed externally
pub(crate) fn gateway_population<'a>(
    system: &System,
    endpoints: impl Iterator<Item = &'a Endpoint>,
) -> EngineResult<Vec<&'a Endpoint>> {
    let mut population = Vec::new();
    for endpoint in endpoints {
        if endpoint.is_external() || !system.get_incoming_links_of_endpoint(&endpoint.id)?.is_empty()
        {
            population.push(endpoint);
        }
    }
    Ok(population)
}

// ==================== Coupling & Reachability ====================

/// Average of `log10(c + 1)` over the component's endpoints, `c` = distinct callers
pub(crate) fn endpoint_entropy_coupling(
    system: &System,
    component: &Component,
) -> EngineResult<MeasureValue> {
    let mut values = Vec::with_capacity(component.endpoints.len());
    for endpoint in &component.endpoints {
        let callers = distinct_callers(system, &endpoint.id)?.len();
        values.push(-(1.0 / (callers as f64 + 1.0)).log10());
    }
    Ok(MeasureValue::mean(values))
}

/// Share of other components reachable only through intermediaries
pub(crate) fn indirect_interaction_density(
    system: &System,
    component_id: &str,
) -> EngineResult<MeasureValue> {
    let others = system.components().len().saturating_sub(1);
    let distances = system.distances_from(component_id)?;
    let indirect = distances.values().filter(|&&d| d >= 2).count();
    Ok(MeasureValue::ratio(indirect, others))
}

/// Whether any path of links leads from the component back to itself
pub(crate) fn is_on_cycle(system: &System, component_id: &str) -> EngineResult<bool> {
    let reachable = system.distances_from(component_id)?;
    Ok(system
        .get_incoming_links_of_component(component_id)?
        .iter()
        .any(|l| reachable.contains_key(&l.source)))
}

/// Distinct components linked to or from the component
pub(crate) fn direct_neighbours(system: &System, component_id: &str) -> EngineResult<BTreeSet<String>> {
    let mut neighbours = BTreeSet::new();
    for link in system.get_outgoing_links_of_component(component_id)? {
        neighbours.insert(system.target_component_of_link(link)?.id.clone());
    }
    for link in system.get_incoming_links_of_component(component_id)? {
        neighbours.insert(link.source.clone());
    }
    neighbours.remove(component_id);
    Ok(neighbours)
}

// ==================== Data Aggregates ====================

/// Aggregate ids a component uses directly or through its endpoints
pub(crate) fn used_aggregates(component: &Component) -> BTreeSet<&str> {
    component
        .data_aggregates
        .iter()
        .chain(component.endpoints.iter().flat_map(|e| &e.data_aggregates))
        .map(|u| u.target.as_str())
        .collect()
}

/// Aggregate id -> components using it
pub(crate) fn aggregate_users(system: &System) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut users: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for component in system.components().values() {
        for aggregate in used_aggregates(component) {
            users.entry(aggregate).or_default().insert(component.id.as_str());
        }
    }
    users
}

/// Aggregate id -> components persisting it
pub(crate) fn aggregate_persisters(system: &System) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut persisters: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for component in system.components().values() {
        for usage in &component.data_aggregates {
            if usage.relation == UsageRelation::Persistence {
                persisters
                    .entry(usage.target.as_str())
                    .or_default()
                    .insert(component.id.as_str());
            }
        }
    }
    persisters
}

/// Per-endpoint aggregate sets, limited to aggregates the component itself uses
fn endpoint_aggregate_sets(component: &Component) -> Vec<BTreeSet<&str>> {
    let own: BTreeSet<&str> = component
        .data_aggregates
        .iter()
        .map(|u| u.target.as_str())
        .collect();
    component
        .endpoints
        .iter()
        .map(|e| {
            e.data_aggregates
                .iter()
                .map(|u| u.target.as_str())
                .filter(|a| own.contains(a))
                .collect()
        })
        .collect()
}

fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Average Jaccard overlap of endpoint pairs; "n/a" below two endpoints
pub(crate) fn endpoint_cohesion(component: &Component) -> MeasureValue {
    let sets = endpoint_aggregate_sets(component);
    let mut overlaps = Vec::new();
    for (i, a) in sets.iter().enumerate() {
        for b in &sets[i + 1..] {
            overlaps.push(jaccard(a, b));
        }
    }
    MeasureValue::mean(overlaps)
}

/// Share of endpoint pairs with at least one common aggregate
pub(crate) fn endpoint_pairs_sharing(component: &Component) -> MeasureValue {
    let sets = endpoint_aggregate_sets(component);
    let mut pairs = 0;
    let mut sharing = 0;
    for (i, a) in sets.iter().enumerate() {
        for b in &sets[i + 1..] {
            pairs += 1;
            if a.intersection(b).next().is_some() {
                sharing += 1;
            }
        }
    }
    MeasureValue::ratio(sharing, pairs)
}

/// Data aggregate usages of a component and its endpoints
pub(crate) fn aggregate_usages(component: &Component) -> impl Iterator<Item = &DataUsage> {
    component
        .data_aggregates
        .iter()
        .chain(component.endpoints.iter().flat_map(|e| &e.data_aggregates))
}

// ==================== Backing Services ====================

/// Backing service id of `kind` -> services linking to it
///
/// Backends nobody uses are present with an empty set.
pub(crate) fn backend_consumers(
    system: &System,
    kind: ComponentKind,
) -> EngineResult<BTreeMap<String, BTreeSet<String>>> {
    let mut consumers = BTreeMap::new();
    for backend in system.components_of_kind(kind) {
        let mut services = BTreeSet::new();
        for link in system.get_incoming_links_of_component(&backend.id)? {
            if system.get_component(&link.source)?.kind == ComponentKind::Service {
                services.insert(link.source.clone());
            }
        }
        consumers.insert(backend.id.clone(), services);
    }
    Ok(consumers)
}

/// Other services sharing a backend of `kind` with `component`, over all other services
pub(crate) fn component_backend_sharing(
    system: &System,
    component: &Component,
    kind: ComponentKind,
) -> EngineResult<MeasureValue> {
    if component.kind != ComponentKind::Service {
        return Ok(MeasureValue::NotApplicable);
    }
    let consumers = backend_consumers(system, kind)?;
    let used: Vec<&BTreeSet<String>> = consumers
        .values()
        .filter(|services| services.contains(&component.id))
        .collect();
    if used.is_empty() {
        return Ok(MeasureValue::NotApplicable);
    }

    let sharing: BTreeSet<&String> = used
        .into_iter()
        .flatten()
        .filter(|id| **id != component.id)
        .collect();
    let other_services = system.services().count().saturating_sub(1);
    Ok(MeasureValue::ratio(sharing.len(), other_services))
}

/// Backends of `kind` used by more than one service, over backends used at all
pub(crate) fn system_backend_sharing(
    system: &System,
    kind: ComponentKind,
) -> EngineResult<MeasureValue> {
    let consumers = backend_consumers(system, kind)?;
    let used = consumers.values().filter(|s| !s.is_empty()).count();
    let shared = consumers.values().filter(|s| s.len() > 1).count();
    Ok(MeasureValue::ratio(shared, used))
}

/// Backing data persisted by a backing service
pub(crate) fn is_externalized(system: &System, backing_data_id: &str) -> bool {
    system
        .components()
        .values()
        .filter(|c| c.kind.is_backing_service())
        .flat_map(|c| &c.backing_data)
        .any(|u| u.target == backing_data_id && u.relation == UsageRelation::Persistence)
}

/// Share of externalized items among the `kind` items referenced by `usages`
pub(crate) fn externalization_ratio<'a>(
    system: &System,
    usages: impl Iterator<Item = &'a DataUsage>,
    kind: BackingDataKind,
) -> EngineResult<MeasureValue> {
    let mut items = BTreeSet::new();
    for usage in usages {
        if system.get_backing_data(&usage.target)?.kind == kind {
            items.insert(usage.target.as_str());
        }
    }
    let externalized = items.iter().filter(|id| is_externalized(system, id)).count();
    Ok(MeasureValue::ratio(externalized, items.len()))
}

// ==================== Deployment ====================

/// Sum of replicas over the component's deployment mappings, `None` when undeployed
pub(crate) fn replication_level(system: &System, component_id: &str) -> Option<f64> {
    let mappings = system.deployment_mappings_of_component(component_id);
    if mappings.is_empty() {
        return None;
    }
    Some(mappings.iter().map(|m| m.replicas()).sum())
}

/// Namespace a component is deployed into: the first one declared along its hosting chain
pub(crate) fn namespace_of(system: &System, component_id: &str) -> Option<String> {
    system
        .all_hosting_infrastructure_of_component(component_id)
        .into_iter()
        .map(|i| i.properties.text(PropertyKey::Namespace))
        .find(|ns| !ns.is_empty())
        .map(str::to_string)
}

/// Distinct declared availability zones
pub(crate) fn zones<'a>(
    infrastructure: impl Iterator<Item = &'a Infrastructure>,
) -> BTreeSet<&'a str> {
    infrastructure
        .map(|i| i.availability_zone())
        .filter(|z| !z.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::{EndpointKind, Link};

    fn service(id: &str) -> Component {
        Component::service(id, id).with_endpoint(Endpoint::new(
            &format!("{}-api", id),
            "api",
            EndpointKind::Query,
        ))
    }

    fn ring(ids: &[&str], link_prefix: &str) -> System {
        let mut system = System::new("ring", "ring");
        for id in ids {
            system.add_component(service(id)).unwrap();
        }
        for (i, id) in ids.iter().enumerate() {
            let next = ids[(i + 1) % ids.len()];
            system
                .add_link(Link::new(
                    &format!("{}{}", link_prefix, i),
                    id,
                    &format!("{}-api", next),
                ))
                .unwrap();
        }
        system
    }

    #[test]
    fn test_ssl_protocol_matching_is_case_insensitive() {
        let endpoint = Endpoint::new("e", "e", EndpointKind::Query)
            .with_protocol("HTTPS")
            .unwrap();
        assert!(supports_ssl(&endpoint));
        let plain = Endpoint::new("p", "p", EndpointKind::Query)
            .with_protocol("http")
            .unwrap();
        assert!(!supports_ssl(&plain));
    }

    #[test]
    fn test_cycle_count_ignores_link_labels() {
        let a = ring(&["a", "b", "c"], "x");
        let b = ring(&["a", "b", "c"], "zz");
        assert_eq!(a.synchronous_cycles().total(), 1);
        assert_eq!(a.synchronous_cycles(), b.synchronous_cycles());
    }

    #[test]
    fn test_two_cycles_through_shared_component() {
        let mut system = ring(&["a", "b"], "l");
        system.add_component(service("c")).unwrap();
        system.add_link(Link::new("ac", "a", "c-api")).unwrap();
        system.add_link(Link::new("ca", "c", "a-api")).unwrap();
        let census = system.synchronous_cycles();
        assert_eq!(census.total(), 2);
        assert_eq!(census.through("a"), 2);
        assert_eq!(census.through("b"), 1);
    }

    #[test]
    fn test_asynchronous_links_break_cycles() {
        let mut system = System::new("s", "s");
        system.add_component(service("a")).unwrap();
        system
            .add_component(Component::service("b", "b").with_endpoint(Endpoint::new(
                "b-events",
                "events",
                EndpointKind::Event,
            )))
            .unwrap();
        system.add_link(Link::new("ab", "a", "b-events")).unwrap();
        system.add_link(Link::new("ba", "b", "a-api")).unwrap();

        assert!(is_on_cycle(&system, "a").unwrap());
        assert_eq!(system.synchronous_cycles().total(), 0);
    }

    #[test]
    fn test_jaccard_of_empty_sets() {
        let empty = BTreeSet::new();
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }
}
