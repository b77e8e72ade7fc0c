//! Infrastructure-scope measures

use super::common::{
    externalization_ratio, ratio_of, replication_level, requires_authentication, supports_ssl,
};
use super::{MeasureRegistry, MeasureValue};
use crate::architecture::{
    BackingDataKind, ComponentKind, DeployedEntity, Endpoint, Infrastructure, PropertyKey, System,
};
use crate::error::EngineResult;

pub(super) fn register(registry: &mut MeasureRegistry<Infrastructure>) {
    registry.insert("ratioOfEndpointsSupportingSsl", ratio_of_endpoints_supporting_ssl);
    registry.insert(
        "ratioOfExternalEndpointsSupportingTls",
        ratio_of_external_endpoints_supporting_tls,
    );
    registry.insert("ratioOfSecuredEndpoints", ratio_of_secured_endpoints);
    registry.insert(
        "ratioOfDeploymentsWithAutomatedRestart",
        ratio_of_deployments_with_automated_restart,
    );
    registry.insert("configurationExternalization", configuration_externalization);
    registry.insert("secretsExternalization", secrets_externalization);
    registry.insert("logAggregation", log_aggregation);
    registry.insert("metricsCollection", metrics_collection);
    registry.insert("infrastructureIsManaged", infrastructure_is_managed);
    registry.insert("numberOfHostedComponents", number_of_hosted_components);
    registry.insert("ratioOfHostedServicesReplicated", ratio_of_hosted_services_replicated);
}

/// Endpoints of every component hosted on the node
fn hosted_endpoints<'a>(
    infrastructure: &Infrastructure,
    system: &'a System,
) -> EngineResult<Vec<&'a Endpoint>> {
    Ok(system
        .components_hosted_on(&infrastructure.id)?
        .into_iter()
        .flat_map(|c| c.endpoints.iter())
        .collect())
}

fn ratio_of_endpoints_supporting_ssl(
    infrastructure: &Infrastructure,
    system: &System,
) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&hosted_endpoints(infrastructure, system)?, |e| {
        supports_ssl(e)
    }))
}

fn ratio_of_external_endpoints_supporting_tls(
    infrastructure: &Infrastructure,
    system: &System,
) -> EngineResult<MeasureValue> {
    let external: Vec<&Endpoint> = hosted_endpoints(infrastructure, system)?
        .into_iter()
        .filter(|e| e.is_external())
        .collect();
    Ok(ratio_of(&external, |e| supports_ssl(e)))
}

fn ratio_of_secured_endpoints(
    infrastructure: &Infrastructure,
    system: &System,
) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&hosted_endpoints(infrastructure, system)?, |e| {
        requires_authentication(e)
    }))
}

/// Component mappings placed directly on the node
fn ratio_of_deployments_with_automated_restart(
    infrastructure: &Infrastructure,
    system: &System,
) -> EngineResult<MeasureValue> {
    let mappings: Vec<_> = system
        .deployment_mappings_onto(&infrastructure.id)
        .into_iter()
        .filter(|m| matches!(m.deployed, DeployedEntity::Component(_)))
        .collect();
    Ok(ratio_of(&mappings, |m| {
        m.properties.flag(PropertyKey::AutomatedRestart)
    }))
}

fn configuration_externalization(
    infrastructure: &Infrastructure,
    system: &System,
) -> EngineResult<MeasureValue> {
    externalization_ratio(system, infrastructure.backing_data.iter(), BackingDataKind::Config)
}

fn secrets_externalization(
    infrastructure: &Infrastructure,
    system: &System,
) -> EngineResult<MeasureValue> {
    externalization_ratio(system, infrastructure.backing_data.iter(), BackingDataKind::Secret)
}

fn log_aggregation(infrastructure: &Infrastructure, system: &System) -> EngineResult<MeasureValue> {
    externalization_ratio(system, infrastructure.backing_data.iter(), BackingDataKind::Log)
}

fn metrics_collection(
    infrastructure: &Infrastructure,
    system: &System,
) -> EngineResult<MeasureValue> {
    externalization_ratio(system, infrastructure.backing_data.iter(), BackingDataKind::Metric)
}

fn infrastructure_is_managed(
    infrastructure: &Infrastructure,
    _: &System,
) -> EngineResult<MeasureValue> {
    Ok(MeasureValue::from_bool(infrastructure.is_managed()))
}

fn number_of_hosted_components(
    infrastructure: &Infrastructure,
    system: &System,
) -> EngineResult<MeasureValue> {
    Ok(MeasureValue::count(
        system.components_hosted_on(&infrastructure.id)?.len(),
    ))
}

fn ratio_of_hosted_services_replicated(
    infrastructure: &Infrastructure,
    system: &System,
) -> EngineResult<MeasureValue> {
    let levels: Vec<f64> = system
        .components_hosted_on(&infrastructure.id)?
        .into_iter()
        .filter(|c| c.kind == ComponentKind::Service)
        .filter_map(|c| replication_level(system, &c.id))
        .collect();
    Ok(ratio_of(&levels, |&level| level > 1.0))
}
