//! Request-trace-scope measures

use super::common::{
    is_secured_link, is_synchronous_link, ratio_of, replication_level, supports_ssl, try_ratio_of,
};
use super::{MeasureRegistry, MeasureValue};
use crate::architecture::{Endpoint, Link, RequestTrace, System};
use crate::error::EngineResult;
use std::collections::BTreeSet;

pub(super) fn register(registry: &mut MeasureRegistry<RequestTrace>) {
    registry.insert("ratioOfEndpointsSupportingSsl", ratio_of_endpoints_supporting_ssl);
    registry.insert("ratioOfSecuredLinks", ratio_of_secured_links);
    registry.insert("ratioOfAsynchronousLinks", ratio_of_asynchronous_links);
    registry.insert("ratioOfLinksWithTimeout", ratio_of_links_with_timeout);
    registry.insert("ratioOfLinksWithRetries", ratio_of_links_with_retries);
    registry.insert("ratioOfLinksWithCircuitBreaker", ratio_of_links_with_circuit_breaker);
    registry.insert("maxRequestTraceLength", max_request_trace_length);
    registry.insert("numberOfInvolvedComponents", number_of_involved_components);
    registry.insert("longestSynchronousChain", longest_synchronous_chain);
    registry.insert(
        "ratioOfReplicatedComponentsInTrace",
        ratio_of_replicated_components_in_trace,
    );
}

/// Distinct links of the trace, resolved
fn trace_links<'a>(trace: &RequestTrace, system: &'a System) -> EngineResult<Vec<&'a Link>> {
    trace
        .link_ids()
        .into_iter()
        .map(|id| system.get_link(id))
        .collect()
}

/// The external endpoint plus every endpoint a link of the trace targets
fn involved_endpoints<'a>(
    trace: &RequestTrace,
    system: &'a System,
) -> EngineResult<Vec<&'a Endpoint>> {
    let mut seen = BTreeSet::new();
    let mut endpoints = Vec::new();
    let entry = system.get_endpoint(&trace.external_endpoint)?;
    seen.insert(entry.id.as_str());
    endpoints.push(entry);
    for link in trace_links(trace, system)? {
        let endpoint = system.target_endpoint_of_link(link)?;
        if seen.insert(endpoint.id.as_str()) {
            endpoints.push(endpoint);
        }
    }
    Ok(endpoints)
}

/// Owner of the external endpoint plus both ends of every link
fn involved_components<'a>(
    trace: &RequestTrace,
    system: &'a System,
) -> EngineResult<BTreeSet<&'a str>> {
    let mut components = BTreeSet::new();
    components.insert(
        system
            .search_component_of_endpoint(&trace.external_endpoint)?
            .id
            .as_str(),
    );
    for link in trace_links(trace, system)? {
        components.insert(system.get_component(&link.source)?.id.as_str());
        components.insert(system.target_component_of_link(link)?.id.as_str());
    }
    Ok(components)
}

fn ratio_of_endpoints_supporting_ssl(
    trace: &RequestTrace,
    system: &System,
) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&involved_endpoints(trace, system)?, |e| {
        supports_ssl(e)
    }))
}

fn ratio_of_secured_links(trace: &RequestTrace, system: &System) -> EngineResult<MeasureValue> {
    try_ratio_of(&trace_links(trace, system)?, |l| is_secured_link(system, l))
}

fn ratio_of_asynchronous_links(
    trace: &RequestTrace,
    system: &System,
) -> EngineResult<MeasureValue> {
    try_ratio_of(&trace_links(trace, system)?, |l| {
        Ok(!is_synchronous_link(system, l)?)
    })
}

fn ratio_of_links_with_timeout(
    trace: &RequestTrace,
    system: &System,
) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&trace_links(trace, system)?, |l| l.has_timeout()))
}

fn ratio_of_links_with_retries(
    trace: &RequestTrace,
    system: &System,
) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&trace_links(trace, system)?, |l| l.has_retries()))
}

fn ratio_of_links_with_circuit_breaker(
    trace: &RequestTrace,
    system: &System,
) -> EngineResult<MeasureValue> {
    Ok(ratio_of(&trace_links(trace, system)?, |l| {
        l.has_circuit_breaker()
    }))
}

fn max_request_trace_length(trace: &RequestTrace, _: &System) -> EngineResult<MeasureValue> {
    Ok(trace
        .link_chains
        .iter()
        .map(Vec::len)
        .max()
        .map(|len| len as f64)
        .into())
}

fn number_of_involved_components(
    trace: &RequestTrace,
    system: &System,
) -> EngineResult<MeasureValue> {
    Ok(MeasureValue::count(involved_components(trace, system)?.len()))
}

/// Longest run of consecutive synchronous links over all chains
fn longest_synchronous_chain(trace: &RequestTrace, system: &System) -> EngineResult<MeasureValue> {
    if trace.link_chains.is_empty() {
        return Ok(MeasureValue::NotApplicable);
    }
    let mut longest = 0usize;
    for chain in &trace.link_chains {
        let mut run = 0usize;
        for link_id in chain {
            if is_synchronous_link(system, system.get_link(link_id)?)? {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
        }
    }
    Ok(MeasureValue::count(longest))
}

fn ratio_of_replicated_components_in_trace(
    trace: &RequestTrace,
    system: &System,
) -> EngineResult<MeasureValue> {
    let levels: Vec<f64> = involved_components(trace, system)?
        .into_iter()
        .filter_map(|id| replication_level(system, id))
        .collect();
    Ok(ratio_of(&levels, |&level| level > 1.0))
}
