use crate::context::AllocatorContext;
use crate::orchestrator::OrchestratorClient;
use lb_core::error::ControllerError;
use lb_core::resolver::resolve;
use lb_protocol::{annotations, BindType, EventType, Protocol, RequestedPort, ServiceEvent, ServiceSpec, ServiceType};
use lb_provider::LoadBalancerProvider;
use lb_store::store::lowest_score_then_lexicographic;
use lb_store::{PortRecord, Store};
use std::collections::HashSet;

fn to_transient(e: anyhow::Error) -> ControllerError {
    ControllerError::Transient(e.to_string())
}

/// Port normalization (§4.D): an unnamed port's name becomes its decimal
/// port number, giving later diffs a stable identity.
fn normalize_ports(service: &mut ServiceSpec) {
    for port in &mut service.ports {
        if port.name.is_none() {
            port.name = Some(port.port.to_string());
        }
    }
}

/// True if the event should be silently dropped before any state change.
/// Mirrors the original process's `skipLabel`: a service with no labels at
/// all is always skipped, regardless of whether any label is configured as
/// required.
fn label_gate_skip(
    service_labels: &std::collections::HashMap<String, String>,
    required: &std::collections::HashMap<String, String>,
) -> bool {
    if service_labels.is_empty() {
        return true;
    }
    for (key, value) in required {
        match service_labels.get(key) {
            Some(v) if v == value => continue,
            _ => return true,
        }
    }
    false
}

/// True if the event should be silently dropped before any state change.
fn type_gate_skip(service: &ServiceSpec, provider: &dyn lb_provider::LoadBalancerProvider) -> bool {
    match service.service_type {
        ServiceType::ClusterInternal => false,
        ServiceType::ExternalLoadBalancer => {
            service.has_external_assignment() || provider.has_annotation(&service.annotations)
        }
    }
}

/// Walks `original` (the caller-supplied, stably ordered service port list)
/// and looks up each one's resolved record by name, rather than iterating
/// `resolved` directly: a store-backed `Vec<PortRecord>` carries no ordering
/// guarantee (a Redis SET has none), so building the orchestrator payload in
/// store order made the replayed S4 update non-deterministic across runs.
/// Matches the original process's `translateServicePort`.
fn outgoing_ports(
    resolved: &[PortRecord],
    original: &[RequestedPort],
    enable_target_port: bool,
) -> Vec<RequestedPort> {
    original
        .iter()
        .filter_map(|orig| {
            let name = orig.name_or_port();
            resolved.iter().find(|r| r.name == name).map(|r| RequestedPort {
                name: Some(r.name.clone()),
                port: r.port,
                protocol: r.protocol,
                target_port: if enable_target_port {
                    r.target_port
                } else {
                    orig.target_port
                },
            })
        })
        .collect()
}

async fn apply_to_orchestrator(
    ctx: &AllocatorContext,
    service: &ServiceSpec,
    lb_id: &str,
    ports: Vec<RequestedPort>,
) -> Result<(), ControllerError> {
    let mut mutated = service.clone();
    mutated.ports = ports;
    mutated.service_type = ServiceType::ExternalLoadBalancer;
    mutated.annotations.insert(
        annotations::EXTERNAL_TRAFFIC_POLICY.to_string(),
        annotations::EXTERNAL_TRAFFIC_POLICY_LOCAL.to_string(),
    );
    ctx.provider.annotate(&mut mutated.annotations, lb_id);
    ctx.orchestrator.update(&mutated).await.map_err(to_transient)
}

/// Entry point for the per-tenant allocator (§4.D). Filtering gates run
/// first and short-circuit before any state change; everything past them
/// follows the Added/Modified or Deleted flow exactly.
pub async fn process(ctx: &AllocatorContext, event: ServiceEvent) -> Result<(), ControllerError> {
    if event.bind_type != BindType::Service {
        log::debug!("ignoring non-service event on tenant {}", event.tenant);
        return Ok(());
    }

    let mut service = event.data;
    let tenant = event.tenant;

    if label_gate_skip(&service.labels, &ctx.config.labels) {
        return Err(ControllerError::Skip(format!(
            "service {} has no matching labels",
            service.name
        )));
    }

    normalize_ports(&mut service);

    match event.event_type {
        EventType::Added | EventType::Modified => {
            if type_gate_skip(&service, ctx.provider.as_ref()) {
                return Err(ControllerError::Skip(format!(
                    "service {} already externally bound or ineligible type",
                    service.name
                )));
            }
            process_added_or_modified(ctx, &tenant, service).await
        }
        EventType::Deleted => process_deleted(ctx, &tenant, &service).await,
    }
}

async fn process_added_or_modified(
    ctx: &AllocatorContext,
    tenant: &str,
    service: ServiceSpec,
) -> Result<(), ControllerError> {
    ctx.store.add_tenant(tenant).await.map_err(to_transient)?;

    let enable_target_port = service
        .annotations
        .get(annotations::ENABLE_TARGET_PORT)
        .map(|v| v == "true")
        .unwrap_or(false);

    // Idempotence check (§4.D step 3): a retry or a Modified that only
    // touches unrelated fields is a no-op against the LB pool.
    let existing_ports = ctx
        .store
        .get_backend_ports(tenant, &service.name)
        .await
        .map_err(to_transient)?;
    if !existing_ports.is_empty() {
        let lb_id = ctx
            .store
            .get_backend_lb(tenant, &service.name)
            .await
            .map_err(to_transient)?
            .ok_or_else(|| {
                ControllerError::MalformedRecord(format!(
                    "backend-ports exist for {} but no backend-lb entry",
                    service.name
                ))
            })?;
        let ports = outgoing_ports(
            &existing_ports,
            &service.ports,
            enable_target_port,
        );
        apply_to_orchestrator(ctx, &service, &lb_id, ports).await?;
        return Ok(());
    }

    if service.ports.is_empty() {
        return Err(ControllerError::Skip(format!(
            "service {} requests no ports",
            service.name
        )));
    }

    let need = service.ports.len() as i64;
    let proto: Protocol = service.ports[0].protocol;
    let max = ctx.config.cloud.max;

    let found = ctx
        .store
        .find_available_lb(tenant, need, max, lowest_score_then_lexicographic)
        .await
        .map_err(to_transient)?;

    let mut created_new_lb = None;
    let lb_id = match found {
        Some(id) => id,
        None => {
            let id = ctx.provider.create().await.map_err(to_transient)?;
            ctx.store
                .set_lb_capacity(tenant, &id, max, 0)
                .await
                .map_err(to_transient)?;
            // Self-sentinel: the recycler won't delete this LB until a
            // later pass finds it still has zero ports.
            ctx.store
                .set_backend_lb(tenant, &id, &id)
                .await
                .map_err(to_transient)?;
            created_new_lb = Some(id.clone());
            id
        }
    };

    let result = commit_binding(
        ctx,
        tenant,
        &service,
        &lb_id,
        proto,
        need,
        enable_target_port,
    )
    .await;

    if result.is_err() {
        if let Some(orphan) = created_new_lb {
            let _ = ctx.orphan_lb_tx.try_send(orphan);
        }
    }

    result
}

async fn commit_binding(
    ctx: &AllocatorContext,
    tenant: &str,
    service: &ServiceSpec,
    lb_id: &str,
    proto: Protocol,
    need: i64,
    enable_target_port: bool,
) -> Result<(), ControllerError> {
    let cache_ports: HashSet<u16> = ctx
        .store
        .get_lb_ports(tenant, lb_id, proto)
        .await
        .map_err(to_transient)?
        .into_iter()
        .collect();

    let assigned = resolve(&cache_ports, &service.ports)?;
    let records: Vec<PortRecord> = assigned
        .iter()
        .map(|p| PortRecord {
            name: p.name_or_port(),
            port: p.port,
            protocol: p.protocol,
            target_port: p.target_port,
        })
        .collect();
    let ports: Vec<u16> = records.iter().map(|r| r.port).collect();

    // Persist in the exact order §4.D mandates.
    ctx.store
        .add_lb_ports(tenant, lb_id, proto, &ports)
        .await
        .map_err(to_transient)?;
    ctx.store
        .set_backend_lb(tenant, &service.name, lb_id)
        .await
        .map_err(to_transient)?;
    ctx.store
        .set_backend_ports(tenant, &service.name, &records)
        .await
        .map_err(to_transient)?;
    ctx.store
        .set_lb_capacity(tenant, lb_id, ctx.config.cloud.max, -need)
        .await
        .map_err(to_transient)?;

    apply_to_orchestrator(ctx, service, lb_id, outgoing_ports(&records, &service.ports, enable_target_port))
        .await
}

async fn process_deleted(
    ctx: &AllocatorContext,
    tenant: &str,
    service: &ServiceSpec,
) -> Result<(), ControllerError> {
    let Some(lb_id) = ctx
        .store
        .get_backend_lb(tenant, &service.name)
        .await
        .map_err(to_transient)?
    else {
        return Ok(()); // idempotent delete
    };

    let removals = service.ports.iter().map(|p| {
        let lb_id = lb_id.clone();
        async move {
            ctx.store
                .remove_lb_port(tenant, &lb_id, p.protocol, p.port)
                .await
        }
    });
    for result in futures::future::join_all(removals).await {
        result.map_err(to_transient)?;
    }

    ctx.store
        .delete_backend_ports(tenant, &service.name)
        .await
        .map_err(to_transient)?;
    ctx.store
        .remove_backend_lb(tenant, &service.name)
        .await
        .map_err(to_transient)?;
    ctx.store
        .set_lb_capacity(tenant, &lb_id, ctx.config.cloud.max, service.ports.len() as i64)
        .await
        .map_err(to_transient)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::RecordingOrchestratorClient;
    use lb_core::config::{CloudConfig, Config};
    use lb_provider::fake::FakeProvider;
    use lb_store::MemoryStore;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    fn ctx_with_max(max: u32) -> (AllocatorContext, RecordingOrchestratorClient) {
        let config = Config {
            cloud: CloudConfig {
                max,
                ..CloudConfig::default()
            },
            ..Config::default()
        };
        let orchestrator = RecordingOrchestratorClient::default();
        let (orphan_lb_tx, _orphan_lb_rx) = mpsc::channel(8);
        let ctx = AllocatorContext::new(
            std::sync::Arc::new(MemoryStore::new()),
            std::sync::Arc::new(FakeProvider),
            std::sync::Arc::new(orchestrator.clone()),
            std::sync::Arc::new(config),
            orphan_lb_tx,
        );
        (ctx, orchestrator)
    }

    fn tcp_port(port: u16) -> RequestedPort {
        RequestedPort {
            name: None,
            port,
            protocol: Protocol::Tcp,
            target_port: port,
        }
    }

    fn service(name: &str, tenant: &str, ports: Vec<RequestedPort>) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            tenant: tenant.to_string(),
            service_type: ServiceType::ClusterInternal,
            ports,
            labels: HashMap::from([("team".to_string(), "core".to_string())]),
            annotations: HashMap::new(),
            external_ips: Vec::new(),
            ingress: Vec::new(),
        }
    }

    fn added(tenant: &str, svc: ServiceSpec) -> ServiceEvent {
        ServiceEvent {
            bind_type: BindType::Service,
            event_type: EventType::Added,
            tenant: tenant.to_string(),
            data: svc,
        }
    }

    /// **Objective**: scenario S1.
    /// **Scenario**: fresh tenant, `s1` requests ports 80 and 443 on a 51-slot LB.
    /// **Assertion**: both ports commit unchanged and the LB's remaining
    /// capacity drops by exactly 2.
    #[tokio::test]
    async fn s1_fresh_lb_commits_unmodified_ports() {
        let (ctx, orchestrator) = ctx_with_max(51);
        let s1 = service("s1", "T", vec![tcp_port(80), tcp_port(443)]);
        process(&ctx, added("T", s1)).await.unwrap();

        let lb_id = ctx.store.get_backend_lb("T", "s1").await.unwrap().unwrap();
        let mut ports = ctx
            .store
            .get_lb_ports("T", &lb_id, Protocol::Tcp)
            .await
            .unwrap();
        ports.sort();
        assert_eq!(ports, vec![80, 443]);

        let capacities = ctx.store.list_lb_capacities("T").await.unwrap();
        assert_eq!(capacities, vec![(lb_id, 48)]);
        assert_eq!(orchestrator.updates.lock().unwrap().len(), 1);
    }

    /// **Objective**: scenario S3, overflow-to-new-LB.
    /// **Scenario**: `max=3` so a fresh LB starts with 2 usable slots; `s1`
    /// consumes both, then `s2` (needing 2 ports) cannot fit and must land
    /// on a second LB.
    /// **Assertion**: `s1` and `s2` end up bound to two distinct LB ids.
    #[tokio::test]
    async fn s3_overflow_creates_a_second_lb() {
        let (ctx, _orchestrator) = ctx_with_max(3);
        let s1 = service("s1", "T", vec![tcp_port(10), tcp_port(11)]);
        process(&ctx, added("T", s1)).await.unwrap();
        let lb0 = ctx.store.get_backend_lb("T", "s1").await.unwrap().unwrap();

        let s2 = service("s2", "T", vec![tcp_port(20), tcp_port(21)]);
        process(&ctx, added("T", s2)).await.unwrap();
        let lb1 = ctx.store.get_backend_lb("T", "s2").await.unwrap().unwrap();

        assert_ne!(lb0, lb1);
    }

    /// **Objective**: scenario S4, idempotent Modified.
    /// **Scenario**: replay the same service as `MODIFIED` after its
    /// initial `ADDED` commit.
    /// **Assertion**: the stored port set and LB binding are unchanged, and
    /// a second orchestrator update is recorded (idempotent, not a no-op on
    /// the orchestrator side) without a second resolver/cloud call moving
    /// any port.
    #[tokio::test]
    async fn s4_replaying_as_modified_is_idempotent() {
        let (ctx, orchestrator) = ctx_with_max(51);
        let s1 = service("s1", "T", vec![tcp_port(80), tcp_port(443)]);
        process(&ctx, added("T", s1.clone())).await.unwrap();

        let before_lb = ctx.store.get_backend_lb("T", "s1").await.unwrap();
        let before_ports = ctx
            .store
            .get_backend_ports("T", "s1")
            .await
            .unwrap();

        let modified = ServiceEvent {
            bind_type: BindType::Service,
            event_type: EventType::Modified,
            tenant: "T".to_string(),
            data: s1,
        };
        process(&ctx, modified).await.unwrap();

        let after_lb = ctx.store.get_backend_lb("T", "s1").await.unwrap();
        let after_ports = ctx.store.get_backend_ports("T", "s1").await.unwrap();
        assert_eq!(before_lb, after_lb);
        assert_eq!(before_ports, after_ports);
        assert_eq!(orchestrator.updates.lock().unwrap().len(), 2);
    }

    /// **Objective**: scenario S5, delete restores capacity.
    /// **Scenario**: commit `s1`, then delete it.
    /// **Assertion**: its LB's port set is empty again, its capacity
    /// returns to the pre-add value, and the backend directory no longer
    /// carries it.
    #[tokio::test]
    async fn s5_delete_restores_capacity_and_clears_bindings() {
        let (ctx, _orchestrator) = ctx_with_max(51);
        let s1 = service("s1", "T", vec![tcp_port(80), tcp_port(443)]);
        process(&ctx, added("T", s1.clone())).await.unwrap();
        let lb_id = ctx.store.get_backend_lb("T", "s1").await.unwrap().unwrap();

        let deleted = ServiceEvent {
            bind_type: BindType::Service,
            event_type: EventType::Deleted,
            tenant: "T".to_string(),
            data: s1,
        };
        process(&ctx, deleted).await.unwrap();

        let ports = ctx.store.get_lb_ports("T", &lb_id, Protocol::Tcp).await.unwrap();
        assert!(ports.is_empty());
        assert_eq!(ctx.store.get_backend_lb("T", "s1").await.unwrap(), None);
        let capacities = ctx.store.list_lb_capacities("T").await.unwrap();
        assert_eq!(capacities, vec![(lb_id, 50)]);
    }

    /// Invariant 1: port uniqueness per (lb, proto) survives two services
    /// landing on the same LB (scenario S2's setting).
    #[tokio::test]
    async fn invariant_no_duplicate_ports_on_shared_lb() {
        let (ctx, _orchestrator) = ctx_with_max(51);
        let s1 = service("s1", "T", vec![tcp_port(80), tcp_port(443)]);
        process(&ctx, added("T", s1)).await.unwrap();
        let s2 = service("s2", "T", vec![tcp_port(80), tcp_port(5000)]);
        process(&ctx, added("T", s2)).await.unwrap();

        let lb_id = ctx.store.get_backend_lb("T", "s1").await.unwrap().unwrap();
        let ports = ctx.store.get_lb_ports("T", &lb_id, Protocol::Tcp).await.unwrap();
        let mut seen = std::collections::HashSet::new();
        for p in &ports {
            assert!(seen.insert(*p), "duplicate port {p} on shared lb");
        }
        assert_eq!(seen.len(), 4);
    }

    /// A service with no labels at all is always skipped, regardless of
    /// whether any label is configured as required (mirrors the original
    /// process's nil-labels-map check).
    #[tokio::test]
    async fn label_gate_skips_services_with_no_labels() {
        let (ctx, _orchestrator) = ctx_with_max(51);
        let mut s1 = service("s1", "T", vec![tcp_port(80)]);
        s1.labels.clear();
        let err = process(&ctx, added("T", s1)).await.unwrap_err();
        assert!(matches!(err, ControllerError::Skip(_)));
    }
}
