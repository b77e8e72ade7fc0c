//! System-scope measures

use super::common::{
    aggregate_persisters, aggregate_usages, aggregate_users, average_over, backend_consumers,
    endpoint_cohesion, endpoint_entropy_coupling, externalization_ratio, gateway_population,
    has_rate_limiting, indirect_interaction_density, is_behind_gateway, is_secured_link,
    is_synchronous_link, namespace_of, ratio_of, replication_level, requires_authentication,
    supports_ssl, system_backend_sharing, targets_kind, try_ratio_of, zones,
};
use super::{MeasureRegistry, MeasureValue};
use crate::architecture::{
    BackingDataKind, Component, ComponentKind, DeployedEntity, Endpoint, Link, PropertyKey, System,
    UsageRelation,
};
use crate::error::EngineResult;
use std::collections::BTreeSet;

pub(super) fn register(registry: &mut MeasureRegistry<System>) {
    registry.insert("ratioOfEndpointsSupportingSsl", ratio_of_endpoints_supporting_ssl);
    registry.insert(
        "ratioOfExternalEndpointsSupportingTls",
        ratio_of_external_endpoints_supporting_tls,
    );
    registry.insert("ratioOfSecuredEndpoints", ratio_of_secured_endpoints);
    registry.insert("ratioOfSecuredLinks", ratio_of_secured_links);
    registry.insert("ratioOfEndpointsWithRateLimiting", ratio_of_endpoints_with_rate_limiting);
    registry.insert("ratioOfEndpointsBehindGateway", ratio_of_endpoints_behind_gateway);
    registry.insert("ratioOfAsynchronousEndpoints", ratio_of_asynchronous_endpoints);
    registry.insert("ratioOfAsynchronousLinks", ratio_of_asynchronous_links);
    registry.insert(
        "serviceInteractionViaBackingService",
        service_interaction_via_backing_service,
    );
    registry.insert(
        "couplingDegreeBasedOnPotentialCoupling",
        coupling_degree_based_on_potential_coupling,
    );
    registry.insert(
        "serviceCouplingBasedOnEndpointEntropy",
        service_coupling_based_on_endpoint_entropy,
    );
    registry.insert("indirectInteractionDensity", indirect_interaction_density_of_system);
    registry.insert("numberOfSynchronousCycles", number_of_synchronous_cycles);
    registry.insert("ratioOfCyclicComponents", ratio_of_cyclic_components);
    registry.insert("dataAggregateCohesionOfEndpoints", data_aggregate_cohesion_of_endpoints);
    registry.insert("averageNumberOfEndpointsPerService", average_number_of_endpoints_per_service);
    registry.insert("ratioOfSharedDataAggregates", ratio_of_shared_data_aggregates);
    registry.insert("dataAggregateSpan", data_aggregate_span);
    registry.insert(
        "ratioOfSharedOwnershipOfDataAggregates",
        ratio_of_shared_ownership_of_data_aggregates,
    );
    registry.insert("ratioOfStorageBackendSharing", ratio_of_storage_backend_sharing);
    registry.insert("degreeOfStorageBackendSharing", degree_of_storage_backend_sharing);
    registry.insert("ratioOfBrokerBackendSharing", ratio_of_broker_backend_sharing);
    registry.insert("namespaceSeparation", namespace_separation);
    registry.insert("serviceReplicationLevel", service_replication_level);
    registry.insert("ratioOfReplicatedServices", ratio_of_replicated_services);
    registry.insert("numberOfAvailabilityZonesUsed", number_of_availability_zones_used);
    registry.insert(
        "ratioOfDeploymentsWithAutomatedRestart",
        ratio_of_deployments_with_automated_restart,
    );
    registry.insert("ratioOfLinksWithTimeout", ratio_of_links_with_timeout);
    registry.insert("ratioOfLinksWithRetries", ratio_of_links_with_retries);
    registry.insert("ratioOfLinksWithCircuitBreaker", ratio_of_links_with_circuit_breaker);
    registry.insert("configurationExternalization", configuration_externalization);
    registry.insert("secretsExternalization", secrets_externalization);
    registry.insert("logAggregation", log_aggregation);
    registry.insert("metricsCollection", metrics_collection);
    registry.insert("ratioOfManagedBackingServices", ratio_of_managed_backing_services);
    registry.insert("ratioOfManagedInfrastructure", ratio_of_managed_infrastructure);
    registry.insert("ratioOfCachedDataAggregateUsages", ratio_of_cached_data_aggregate_usages);
}

fn all_endpoints(system: &System) -> Vec<&Endpoint> {
    system.endpoints().map(|(_, e)| e).collect()
}

fn all_links(system: &System) -> Vec<&Link> {
    system.links().values().collect()
}

// ==================== Security ====================

fn ratio_of_endpoints_supporting_ssl(system: &System, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&all_endpoints(system), |e| supports_ssl(e)))
}

fn ratio_of_external_endpoints_supporting_tls(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    let external: Vec<&Endpoint> = system
        .endpoints()
        .map(|(_, e)| e)
        .filter(|e| e.is_external())
        .collect();
    Ok(ratio_of(&external, |e| supports_ssl(e)))
}

fn ratio_of_secured_endpoints(system: &System, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&all_endpoints(system), |e| requires_authentication(e)))
}

fn ratio_of_secured_links(system: &System, _: &System) -> EngineResult<MeasureValue> {
    try_ratio_of(&all_links(system), |l| is_secured_link(system, l))
}

fn ratio_of_endpoints_with_rate_limiting(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&all_endpoints(system), |e| has_rate_limiting(e)))
}

fn ratio_of_endpoints_behind_gateway(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let service_endpoints = system.services().flat_map(|s| s.endpoints.iter());
    let population = gateway_population(system, service_endpoints)?;
    try_ratio_of(&population, |e| is_behind_gateway(system, &e.id))
}

// ==================== Communication ====================

fn ratio_of_asynchronous_endpoints(system: &System, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&all_endpoints(system), |e| e.kind.is_asynchronous()))
}

fn ratio_of_asynchronous_links(system: &System, _: &System) -> EngineResult<MeasureValue> {
    try_ratio_of(&all_links(system), |l| Ok(!is_synchronous_link(system, l)?))
}

fn service_interaction_via_backing_service(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    let mut service_links = Vec::new();
    for link in system.links().values() {
        if system.get_component(&link.source)?.kind == ComponentKind::Service {
            service_links.push(link);
        }
    }
    try_ratio_of(&service_links, |l| {
        targets_kind(system, l, ComponentKind::BrokerBackingService)
    })
}

// ==================== Coupling ====================

fn coupling_degree_based_on_potential_coupling(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    let mut pairs = BTreeSet::new();
    for link in system.links().values() {
        let target = system.target_component_of_link(link)?;
        pairs.insert((link.source.as_str(), target.id.as_str()));
    }
    let n = system.components().len();
    Ok(MeasureValue::ratio(pairs.len(), n * n.saturating_sub(1)))
}

fn component_entropy(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    endpoint_entropy_coupling(system, c)
}

fn service_coupling_based_on_endpoint_entropy(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    average_over(system.components().values(), system, component_entropy)
}

fn component_indirect_density(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    indirect_interaction_density(system, &c.id)
}

fn indirect_interaction_density_of_system(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    average_over(system.components().values(), system, component_indirect_density)
}

fn number_of_synchronous_cycles(system: &System, _: &System) -> EngineResult<MeasureValue> {
    Ok(MeasureValue::count(system.synchronous_cycles().total()))
}

fn ratio_of_cyclic_components(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let cyclic: usize = system
        .strongly_connected_components()
        .iter()
        .map(Vec::len)
        .sum();
    Ok(MeasureValue::ratio(cyclic, system.components().len()))
}

// ==================== Cohesion & Data ====================

fn component_cohesion(c: &Component, _: &System) -> EngineResult<MeasureValue> {
    Ok(endpoint_cohesion(c))
}

fn data_aggregate_cohesion_of_endpoints(system: &System, _: &System) -> EngineResult<MeasureValue> {
    average_over(system.services(), system, component_cohesion)
}

fn average_number_of_endpoints_per_service(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    let services: Vec<&Component> = system.services().collect();
    let endpoints: usize = services.iter().map(|s| s.endpoints.len()).sum();
    Ok(MeasureValue::ratio(endpoints, services.len()))
}

fn ratio_of_shared_data_aggregates(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let users = aggregate_users(system);
    let shared = users.values().filter(|u| u.len() > 1).count();
    Ok(MeasureValue::ratio(shared, users.len()))
}

fn data_aggregate_span(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let users = aggregate_users(system);
    Ok(MeasureValue::mean(users.values().map(|u| u.len() as f64)))
}

fn ratio_of_shared_ownership_of_data_aggregates(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    let persisters = aggregate_persisters(system);
    let shared = persisters.values().filter(|p| p.len() > 1).count();
    Ok(MeasureValue::ratio(shared, persisters.len()))
}

fn ratio_of_cached_data_aggregate_usages(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    let usages: Vec<_> = system
        .components()
        .values()
        .flat_map(aggregate_usages)
        .collect();
    Ok(ratio_of(&usages, |u| u.relation == UsageRelation::CachedUsage))
}

// ==================== Backing Services ====================

fn ratio_of_storage_backend_sharing(system: &System, _: &System) -> EngineResult<MeasureValue> {
    system_backend_sharing(system, ComponentKind::StorageBackingService)
}

fn degree_of_storage_backend_sharing(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let consumers = backend_consumers(system, ComponentKind::StorageBackingService)?;
    let pairs: usize = consumers.values().map(BTreeSet::len).sum();
    let services = system.services().count();
    Ok(MeasureValue::ratio(pairs, services * consumers.len()))
}

fn ratio_of_broker_backend_sharing(system: &System, _: &System) -> EngineResult<MeasureValue> {
    system_backend_sharing(system, ComponentKind::BrokerBackingService)
}

fn ratio_of_managed_backing_services(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let backends: Vec<&Component> = system
        .components()
        .values()
        .filter(|c| c.kind.is_backing_service())
        .collect();
    Ok(ratio_of(&backends, |c| c.properties.flag(PropertyKey::Managed)))
}

// ==================== Deployment ====================

fn namespace_separation(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let namespaces: Vec<String> = system
        .services()
        .filter_map(|s| namespace_of(system, &s.id))
        .collect();
    let distinct: BTreeSet<&String> = namespaces.iter().collect();
    Ok(MeasureValue::ratio(distinct.len(), namespaces.len()))
}

fn service_replication_level(system: &System, _: &System) -> EngineResult<MeasureValue> {
    Ok(MeasureValue::mean(
        system
            .services()
            .filter_map(|s| replication_level(system, &s.id)),
    ))
}

fn ratio_of_replicated_services(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let levels: Vec<f64> = system
        .services()
        .filter_map(|s| replication_level(system, &s.id))
        .collect();
    Ok(ratio_of(&levels, |&level| level > 1.0))
}

fn number_of_availability_zones_used(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let used = zones(system.infrastructure().values());
    if used.is_empty() {
        return Ok(MeasureValue::NotApplicable);
    }
    Ok(MeasureValue::count(used.len()))
}

fn ratio_of_deployments_with_automated_restart(
    system: &System,
    _: &System,
) -> EngineResult<MeasureValue> {
    let mappings: Vec<_> = system
        .deployment_mappings()
        .values()
        .filter(|m| matches!(m.deployed, DeployedEntity::Component(_)))
        .collect();
    Ok(ratio_of(&mappings, |m| {
        m.properties.flag(PropertyKey::AutomatedRestart)
    }))
}

fn ratio_of_managed_infrastructure(system: &System, _: &System) -> EngineResult<MeasureValue> {
    let infrastructure: Vec<_> = system.infrastructure().values().collect();
    Ok(ratio_of(&infrastructure, |i| i.is_managed()))
}

// ==================== Resilience ====================

fn ratio_of_links_with_timeout(system: &System, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&all_links(system), |l| l.has_timeout()))
}

fn ratio_of_links_with_retries(system: &System, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&all_links(system), |l| l.has_retries()))
}

fn ratio_of_links_with_circuit_breaker(system: &System, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&all_links(system), |l| l.has_circuit_breaker()))
}

// ==================== Backing Data ====================

/// Backing-data usages of every component and infrastructure node
fn externalization(system: &System, kind: BackingDataKind) -> EngineResult<MeasureValue> {
    let usages = system
        .components()
        .values()
        .flat_map(|c| &c.backing_data)
        .chain(system.infrastructure().values().flat_map(|i| &i.backing_data));
    externalization_ratio(system, usages, kind)
}

fn configuration_externalization(system: &System, _: &System) -> EngineResult<MeasureValue> {
    externalization(system, BackingDataKind::Config)
}

fn secrets_externalization(system: &System, _: &System) -> EngineResult<MeasureValue> {
    externalization(system, BackingDataKind::Secret)
}

fn log_aggregation(system: &System, _: &System) -> EngineResult<MeasureValue> {
    externalization(system, BackingDataKind::Log)
}

fn metrics_collection(system: &System, _: &System) -> EngineResult<MeasureValue> {
    externalization(system, BackingDataKind::Metric)
}
