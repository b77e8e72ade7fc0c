//! End-to-end evaluation scenarios over the public API

use archqual::architecture::{
    Component, ComponentKind, DeploymentMapping, Endpoint, EndpointKind, Infrastructure,
    InfrastructureKind, Link, RequestTrace, System,
};
use archqual::evaluation::{Evaluation, EvaluationModelsWrapper};
use archqual::measures::{MeasureLibrary, MeasureValue};
use archqual::quality_model::QualityModelInstance;
use archqual::{EngineError, EngineResult};
use std::sync::Arc;

fn quality_model() -> Arc<QualityModelInstance> {
    Arc::new(QualityModelInstance::builtin().expect("built-in catalog loads"))
}

fn service(id: &str, endpoints: &[(&str, Option<&str>)]) -> Component {
    endpoints
        .iter()
        .fold(Component::service(id, id), |component, (endpoint_id, protocol)| {
            let endpoint = Endpoint::new(endpoint_id, endpoint_id, EndpointKind::Query);
            let endpoint = match protocol {
                Some(p) => endpoint.with_protocol(p).unwrap(),
                None => endpoint,
            };
            component.with_endpoint(endpoint)
        })
}

fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn component_measure(
    wrapper: &mut EvaluationModelsWrapper,
    component: &str,
    factor: &str,
    measure: &str,
) -> MeasureValue {
    wrapper
        .get_evaluated_component_model(component, &[], &strings(&[factor]))
        .unwrap()
        .measure_value(measure)
        .unwrap_or_else(|| panic!("{} not computed for {}", measure, component))
}

#[test]
fn test_single_https_service_is_fully_secured() {
    let mut system = System::new("s", "s");
    system
        .add_component(service("api", &[("e1", Some("https")), ("e2", Some("https"))]))
        .unwrap();

    let mut wrapper = EvaluationModelsWrapper::new(system, quality_model());
    assert_eq!(
        component_measure(
            &mut wrapper,
            "api",
            "secureCommunication",
            "ratioOfEndpointsSupportingSsl"
        ),
        MeasureValue::Value(1.0)
    );
}

#[test]
fn test_service_without_endpoints_is_not_applicable() {
    let mut system = System::new("s", "s");
    system.add_component(Component::service("api", "api")).unwrap();

    let mut wrapper = EvaluationModelsWrapper::new(system, quality_model());
    assert_eq!(
        component_measure(
            &mut wrapper,
            "api",
            "secureCommunication",
            "ratioOfEndpointsSupportingSsl"
        ),
        MeasureValue::NotApplicable
    );
    // only n/a measures and no incoming factor impacts
    let model = wrapper
        .get_evaluated_component_model("api", &[], &strings(&["secureCommunication"]))
        .unwrap();
    assert_eq!(
        model.factor_evaluation("secureCommunication"),
        Some(Evaluation::NotApplicable)
    );
}

#[test]
fn test_mutual_calls_are_cyclic() {
    let mut system = System::new("s", "s");
    system.add_component(service("a", &[("a-api", None)])).unwrap();
    system.add_component(service("b", &[("b-api", None)])).unwrap();
    system.add_link(Link::new("ab", "a", "b-api")).unwrap();
    system.add_link(Link::new("ba", "b", "a-api")).unwrap();

    let mut wrapper = EvaluationModelsWrapper::new(system, quality_model());
    let model = wrapper
        .get_evaluated_component_model("a", &[], &strings(&["acyclicCommunication"]))
        .unwrap();
    assert_eq!(
        model.measure_value("cyclicCommunication"),
        Some(MeasureValue::Value(1.0))
    );
    let cycles = model
        .measure_value("numberOfSynchronousCycles")
        .and_then(|v| v.as_f64())
        .unwrap();
    assert!(cycles >= 1.0);

    let system_model = wrapper
        .get_evaluated_system_model(&[], &strings(&["acyclicCommunication"]))
        .unwrap();
    assert_eq!(
        system_model.measure_value("numberOfSynchronousCycles"),
        Some(MeasureValue::Value(1.0))
    );
}

#[test]
fn test_redundant_deployment() {
    let mut system = System::new("s", "s");
    system.add_component(Component::service("a", "a")).unwrap();
    for infra in ["infra1", "infra2"] {
        system
            .add_infrastructure(Infrastructure::new(infra, infra, InfrastructureKind::Compute))
            .unwrap();
    }
    system
        .add_deployment_mapping(
            DeploymentMapping::component("a1", "a", "infra1")
                .with_replicas(2)
                .unwrap(),
        )
        .unwrap();
    system
        .add_deployment_mapping(
            DeploymentMapping::component("a2", "a", "infra2")
                .with_replicas(3)
                .unwrap(),
        )
        .unwrap();

    let mut wrapper = EvaluationModelsWrapper::new(system, quality_model());
    let model = wrapper
        .get_evaluated_component_model("a", &[], &strings(&["replication", "physicalDistribution"]))
        .unwrap();
    assert_eq!(
        model.measure_value("amountOfRedundancy"),
        Some(MeasureValue::Value(2.0))
    );
    assert_eq!(
        model.measure_value("serviceReplicationLevel"),
        Some(MeasureValue::Value(5.0))
    );
}

#[test]
fn test_shared_storage_backend() {
    let mut system = System::new("s", "s");
    for db in ["shared-db", "db1", "db2"] {
        system
            .add_component(
                Component::new(db, db, ComponentKind::StorageBackingService).with_endpoint(
                    Endpoint::new(&format!("{}-sql", db), "sql", EndpointKind::Command),
                ),
            )
            .unwrap();
    }
    system.add_component(Component::service("s1", "s1")).unwrap();
    system.add_component(Component::service("s2", "s2")).unwrap();
    system.add_link(Link::new("l1", "s1", "shared-db-sql")).unwrap();
    system.add_link(Link::new("l2", "s2", "shared-db-sql")).unwrap();
    system.add_link(Link::new("l3", "s1", "db1-sql")).unwrap();
    system.add_link(Link::new("l4", "s2", "db2-sql")).unwrap();

    let mut wrapper = EvaluationModelsWrapper::new(system, quality_model());
    assert_eq!(
        component_measure(
            &mut wrapper,
            "s1",
            "separatedStorageBackends",
            "ratioOfStorageBackendSharing"
        ),
        MeasureValue::Value(1.0)
    );
}

#[test]
fn test_evaluation_is_idempotent() {
    let mut system = System::new("s", "s");
    system
        .add_component(service("orders", &[("orders-api", Some("https"))]))
        .unwrap();
    system
        .add_component(service("stock", &[("stock-api", Some("http"))]))
        .unwrap();
    system
        .add_link(Link::new("orders-stock", "orders", "stock-api"))
        .unwrap();

    let mut wrapper = EvaluationModelsWrapper::new(system, quality_model());
    let aspects: Vec<String> = wrapper
        .quality_model()
        .quality_aspects()
        .keys()
        .cloned()
        .collect();

    let first = wrapper
        .get_evaluated_system_model(&aspects, &[])
        .unwrap()
        .results()
        .cloned()
        .unwrap();
    let second = wrapper
        .get_evaluated_system_model(&aspects, &[])
        .unwrap()
        .results()
        .cloned()
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.quality_aspects.len(), aspects.len());
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

fn broken_ssl_ratio(_: &Component, _: &System) -> EngineResult<MeasureValue> {
    Err(EngineError::invalid_graph("simulated broken invariant"))
}

#[test]
fn test_failing_measure_degrades_to_not_applicable() {
    let mut system = System::new("s", "s");
    system
        .add_component(service("api", &[("api-http", Some("https"))]))
        .unwrap();

    let mut library = MeasureLibrary::builtin();
    library
        .component
        .insert("ratioOfEndpointsSupportingSsl", broken_ssl_ratio);

    let mut wrapper = EvaluationModelsWrapper::new(system, quality_model()).with_library(library);
    let model = wrapper
        .get_evaluated_component_model("api", &strings(&["confidentiality"]), &[])
        .unwrap();
    let results = model.results().unwrap();

    assert_eq!(
        results.measures["ratioOfEndpointsSupportingSsl"],
        MeasureValue::NotApplicable
    );
    assert_eq!(results.diagnostics.len(), 1);
    assert_eq!(results.diagnostics[0].measure, "ratioOfEndpointsSupportingSsl");
    assert!(results.diagnostics[0].message.contains("simulated"));
    // the rest of the reachable measures still ran
    assert!(results
        .measures
        .iter()
        .any(|(id, v)| id != "ratioOfEndpointsSupportingSsl" && v.is_applicable()));
}

#[test]
fn test_unknown_activation_is_rejected() {
    let mut system = System::new("s", "s");
    system.add_component(Component::service("api", "api")).unwrap();
    let mut wrapper = EvaluationModelsWrapper::new(system, quality_model());

    let err = wrapper
        .get_evaluated_component_model("api", &[], &strings(&["warpDrive"]))
        .unwrap_err();
    assert_eq!(err, EngineError::not_found("ProductFactor", "warpDrive"));
}

#[test]
fn test_request_trace_scope() {
    let mut system = System::new("s", "s");
    system
        .add_component(
            Component::new("gateway", "gateway", ComponentKind::ProxyBackingService).with_endpoint(
                Endpoint::external("public", "public", EndpointKind::Query)
                    .with_protocol("https")
                    .unwrap(),
            ),
        )
        .unwrap();
    system
        .add_component(service("orders", &[("orders-api", Some("https"))]))
        .unwrap();
    system
        .add_link(Link::new("gw-orders", "gateway", "orders-api"))
        .unwrap();
    system
        .add_request_trace(RequestTrace::new("browse", "Browse", "public").with_chain(&["gw-orders"]))
        .unwrap();

    let mut wrapper = EvaluationModelsWrapper::new(system, quality_model());
    let model = wrapper
        .get_evaluated_request_trace_model("browse", &[], &strings(&["secureCommunication"]))
        .unwrap();
    assert_eq!(
        model.measure_value("ratioOfSecuredLinks"),
        Some(MeasureValue::Value(1.0))
    );
    assert_eq!(
        model.measure_value("ratioOfEndpointsSupportingSsl"),
        Some(MeasureValue::Value(1.0))
    );
}
