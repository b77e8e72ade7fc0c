//! Component-scope measures

use super::common::{
    aggregate_persisters, aggregate_usages, aggregate_users, component_backend_sharing,
    direct_neighbours, endpoint_cohesion, endpoint_entropy_coupling, endpoint_pairs_sharing,
    externalization_ratio, gateway_population, has_rate_limiting, indirect_interaction_density,
    is_behind_gateway, is_on_cycle, is_secured_link, is_synchronous_link, ratio_of,
    replication_level, requires_authentication, supports_ssl, targets_kind,
    try_ratio_of, used_aggregates, zones,
};
use super::{MeasureRegistry, MeasureValue};
use crate::architecture::{
    BackingDataKind, Component, ComponentKind, Endpoint, PropertyKey, System, UsageRelation,
};
use crate::error::EngineResult;
use std::collections::BTreeSet;

pub(super) fn register(registry: &mut MeasureRegistry<Component>) {
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
    registry.insert("ratioOfAsynchronousOutgoingLinks", ratio_of_asynchronous_outgoing_links);
    registry.insert("numberOfSynchronousOutgoingLinks", number_of_synchronous_outgoing_links);
    registry.insert(
        "serviceInteractionViaBackingService",
        service_interaction_via_backing_service,
    );
    registry.insert("outgoingCoupling", outgoing_coupling);
    registry.insert("incomingCoupling", incoming_coupling);
    registry.insert(
        "couplingDegreeBasedOnPotentialCoupling",
        coupling_degree_based_on_potential_coupling,
    );
    registry.insert(
        "serviceCouplingBasedOnEndpointEntropy",
        service_coupling_based_on_endpoint_entropy,
    );
    registry.insert("indirectInteractionDensity", indirect_interaction_density_of);
    registry.insert("cyclicCommunication", cyclic_communication);
    registry.insert("numberOfSynchronousCycles", number_of_synchronous_cycles);
    registry.insert("dataAggregateCohesionOfEndpoints", data_aggregate_cohesion_of_endpoints);
    registry.insert(
        "ratioOfEndpointPairsSharingDataAggregates",
        ratio_of_endpoint_pairs_sharing_data_aggregates,
    );
    registry.insert("numberOfProvidedEndpoints", number_of_provided_endpoints);
    registry.insert("numberOfUsedDataAggregates", number_of_used_data_aggregates);
    registry.insert("numberOfSharedDataAggregates", number_of_shared_data_aggregates);
    registry.insert(
        "ratioOfSharedOwnershipOfDataAggregates",
        ratio_of_shared_ownership_of_data_aggregates,
    );
    registry.insert("ratioOfStorageBackendSharing", ratio_of_storage_backend_sharing);
    registry.insert("ratioOfBrokerBackendSharing", ratio_of_broker_backend_sharing);
    registry.insert("serviceReplicationLevel", service_replication_level);
    registry.insert("amountOfRedundancy", amount_of_redundancy);
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

// ==================== Security ====================

fn ratio_of_endpoints_supporting_ssl(c: &Component, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&c.endpoints, supports_ssl))
}

fn ratio_of_external_endpoints_supporting_tls(
    c: &Component,
    _: &System,
) -> EngineResult<MeasureValue> {
    let external: Vec<&Endpoint> = c.external_endpoints().collect();
    Ok(ratio_of(&external, |e| supports_ssl(e)))
}

fn ratio_of_secured_endpoints(c: &Component, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&c.endpoints, requires_authentication))
}

fn ratio_of_secured_links(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let links = system.get_outgoing_links_of_component(&c.id)?;
    try_ratio_of(&links, |l| is_secured_link(system, l))
}

fn ratio_of_endpoints_with_rate_limiting(c: &Component, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&c.endpoints, has_rate_limiting))
}

fn ratio_of_endpoints_behind_gateway(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    if c.kind == ComponentKind::ProxyBackingService {
        return Ok(MeasureValue::NotApplicable);
    }
    let population = gateway_population(system, c.endpoints.iter())?;
    try_ratio_of(&population, |e| is_behind_gateway(system, &e.id))
}

// ==================== Communication ====================

fn ratio_of_asynchronous_endpoints(c: &Component, _: &System) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&c.endpoints, |e| e.kind.is_asynchronous()))
}

fn ratio_of_asynchronous_outgoing_links(
    c: &Component,
    system: &System,
) -> EngineResult<MeasureValue> {
    let links = system.get_outgoing_links_of_component(&c.id)?;
    try_ratio_of(&links, |l| Ok(!is_synchronous_link(system, l)?))
}

fn number_of_synchronous_outgoing_links(
    c: &Component,
    system: &System,
) -> EngineResult<MeasureValue> {
    let mut count = 0;
    for link in system.get_outgoing_links_of_component(&c.id)? {
        if is_synchronous_link(system, link)? {
            count += 1;
        }
    }
    Ok(MeasureValue::count(count))
}

fn service_interaction_via_backing_service(
    c: &Component,
    system: &System,
) -> EngineResult<MeasureValue> {
    if c.kind != ComponentKind::Service {
        return Ok(MeasureValue::NotApplicable);
    }
    let links = system.get_outgoing_links_of_component(&c.id)?;
    try_ratio_of(&links, |l| {
        targets_kind(system, l, ComponentKind::BrokerBackingService)
    })
}

// ==================== Coupling ====================

fn outgoing_coupling(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let mut targets = BTreeSet::new();
    for link in system.get_outgoing_links_of_component(&c.id)? {
        targets.insert(system.target_component_of_link(link)?.id.as_str());
    }
    Ok(MeasureValue::count(targets.len()))
}

fn incoming_coupling(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let sources: BTreeSet<&str> = system
        .get_incoming_links_of_component(&c.id)?
        .into_iter()
        .map(|l| l.source.as_str())
        .collect();
    Ok(MeasureValue::count(sources.len()))
}

fn coupling_degree_based_on_potential_coupling(
    c: &Component,
    system: &System,
) -> EngineResult<MeasureValue> {
    let neighbours = direct_neighbours(system, &c.id)?;
    let others = system.components().len().saturating_sub(1);
    Ok(MeasureValue::ratio(neighbours.len(), others))
}

fn service_coupling_based_on_endpoint_entropy(
    c: &Component,
    system: &System,
) -> EngineResult<MeasureValue> {
    endpoint_entropy_coupling(system, c)
}

fn indirect_interaction_density_of(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    indirect_interaction_density(system, &c.id)
}

fn cyclic_communication(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    Ok(MeasureValue::from_bool(is_on_cycle(system, &c.id)?))
}

fn number_of_synchronous_cycles(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    Ok(MeasureValue::count(system.synchronous_cycles().through(&c.id)))
}

// ==================== Cohesion & Data ====================

fn data_aggregate_cohesion_of_endpoints(c: &Component, _: &System) -> EngineResult<MeasureValue> {
    Ok(endpoint_cohesion(c))
}

fn ratio_of_endpoint_pairs_sharing_data_aggregates(
    c: &Component,
    _: &System,
) -> EngineResult<MeasureValue> {
    Ok(endpoint_pairs_sharing(c))
}

fn number_of_provided_endpoints(c: &Component, _: &System) -> EngineResult<MeasureValue> {
    Ok(MeasureValue::count(c.endpoints.len()))
}

fn number_of_used_data_aggregates(c: &Component, _: &System) -> EngineResult<MeasureValue> {
    Ok(MeasureValue::count(used_aggregates(c).len()))
}

fn number_of_shared_data_aggregates(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let users = aggregate_users(system);
    let shared = used_aggregates(c)
        .into_iter()
        .filter(|a| users.get(a).is_some_and(|u| u.len() > 1))
        .count();
    Ok(MeasureValue::count(shared))
}

fn ratio_of_shared_ownership_of_data_aggregates(
    c: &Component,
    system: &System,
) -> EngineResult<MeasureValue> {
    let persisters = aggregate_persisters(system);
    let owned: BTreeSet<&str> = c
        .data_aggregates
        .iter()
        .filter(|u| u.relation == UsageRelation::Persistence)
        .map(|u| u.target.as_str())
        .collect();
    let shared = owned
        .iter()
        .filter(|a| persisters.get(*a).is_some_and(|p| p.len() > 1))
        .count();
    Ok(MeasureValue::ratio(shared, owned.len()))
}

fn ratio_of_storage_backend_sharing(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    component_backend_sharing(system, c, ComponentKind::StorageBackingService)
}

fn ratio_of_broker_backend_sharing(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    component_backend_sharing(system, c, ComponentKind::BrokerBackingService)
}

fn ratio_of_cached_data_aggregate_usages(c: &Component, _: &System) -> EngineResult<MeasureValue> {
    let usages: Vec<_> = aggregate_usages(c).collect();
    Ok(ratio_of(&usages, |u| u.relation == UsageRelation::CachedUsage))
}

// ==================== Deployment ====================

fn service_replication_level(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    Ok(replication_level(system, &c.id).into())
}

fn amount_of_redundancy(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let mappings = system.deployment_mappings_of_component(&c.id);
    if mappings.is_empty() {
        return Ok(MeasureValue::NotApplicable);
    }
    Ok(MeasureValue::count(mappings.len()))
}

fn number_of_availability_zones_used(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let used = zones(system.all_hosting_infrastructure_of_component(&c.id).into_iter());
    if used.is_empty() {
        return Ok(MeasureValue::NotApplicable);
    }
    Ok(MeasureValue::count(used.len()))
}

fn ratio_of_deployments_with_automated_restart(
    c: &Component,
    system: &System,
) -> EngineResult<MeasureValue> {
    let mappings = system.deployment_mappings_of_component(&c.id);
    Ok(ratio_of(&mappings, |m| {
        m.properties.flag(PropertyKey::AutomatedRestart)
    }))
}

fn ratio_of_managed_backing_services(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let mut backends = BTreeSet::new();
    for link in system.get_outgoing_links_of_component(&c.id)? {
        let target = system.target_component_of_link(link)?;
        if target.kind.is_backing_service() {
            backends.insert(target.id.as_str());
        }
    }
    let mut managed = 0;
    for id in &backends {
        if system.get_component(id)?.properties.flag(PropertyKey::Managed) {
            managed += 1;
        }
    }
    Ok(MeasureValue::ratio(managed, backends.len()))
}

fn ratio_of_managed_infrastructure(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let hosts = system.all_hosting_infrastructure_of_component(&c.id);
    Ok(ratio_of(&hosts, |i| i.is_managed()))
}

// ==================== Resilience ====================

fn ratio_of_links_with_timeout(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let links = system.get_outgoing_links_of_component(&c.id)?;
    Ok(ratio_of(&links, |l| l.has_timeout()))
}

fn ratio_of_links_with_retries(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    let links = system.get_outgoing_links_of_component(&c.id)?;
    Ok(ratio_of(&links, |l| l.has_retries()))
}

fn ratio_of_links_with_circuit_breaker(
    c: &Component,
    system: &System,
) -> EngineResult<MeasureValue> {
    let links = system.get_outgoing_links_of_component(&c.id)?;
    Ok(ratio_of(&links, |l| l.has_circuit_breaker()))
}

// ==================== Backing Data ====================

fn configuration_externalization(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    externalization_ratio(system, c.backing_data.iter(), BackingDataKind::Config)
}

fn secrets_externalization(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    externalization_ratio(system, c.backing_data.iter(), BackingDataKind::Secret)
}

fn log_aggregation(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    externalization_ratio(system, c.backing_data.iter(), BackingDataKind::Log)
}

fn metrics_collection(c: &Component, system: &System) -> EngineResult<MeasureValue> {
    externalization_ratio(system, c.backing_data.iter(), BackingDataKind::Metric)
}
