use crate::allocator;
use crate::context::AllocatorContext;
use lb_core::error::ControllerError;
use lb_protocol::ServiceEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Lazily-populated tenant -> mutex map, itself guarded by a process-wide
/// lock on insertion (§5). At-most-one `Process` call is ever in flight per
/// tenant; distinct tenants run truly in parallel.
#[derive(Default)]
struct TenantLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TenantLocks {
    async fn get(&self, tenant: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Owns the bounded event queue and the per-tenant mutex map (§4.E). Events
/// are consumed by a pool of worker tasks; re-enqueue on exhausted retry
/// goes to the tail of the same queue so other tenants keep moving.
pub struct Dispatcher {
    tx: mpsc::Sender<ServiceEvent>,
    rx: Mutex<mpsc::Receiver<ServiceEvent>>,
    tenant_locks: TenantLocks,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(channel_size: usize, cancel: CancellationToken) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(channel_size);
        Arc::new(Self {
            tx,
            rx: Mutex::new(rx),
            tenant_locks: TenantLocks::default(),
            cancel,
        })
    }

    /// Producer handle. Blocks when the queue is full (no drops, §4.E).
    pub fn sender(&self) -> mpsc::Sender<ServiceEvent> {
        self.tx.clone()
    }

    /// Runs `worker_count` workers pulling from the shared queue until
    /// cancellation. Returns when the queue is closed and drained.
    pub async fn run(self: Arc<Self>, ctx: AllocatorContext, worker_count: usize) {
        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let dispatcher = self.clone();
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move { dispatcher.worker_loop(id, ctx).await }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn worker_loop(self: Arc<Self>, id: usize, ctx: AllocatorContext) {
        loop {
            let event = {
                let mut rx = self.rx.lock().await;
                tokio::select! {
                    _ = self.cancel.cancelled() => None,
                    event = rx.recv() => event,
                }
            };
            let Some(event) = event else {
                log::info!("dispatcher worker {id} stopping");
                return;
            };
            self.handle_one(&ctx, event).await;
        }
    }

    async fn handle_one(&self, ctx: &AllocatorContext, event: ServiceEvent) {
        let tenant = event.tenant.clone();
        let lock = self.tenant_locks.get(&tenant).await;
        let _guard = lock.lock().await;

        match self.process_with_retry(ctx, event.clone()).await {
            Ok(()) => {}
            Err(ControllerError::Skip(reason)) => {
                log::debug!("skipping event for tenant {tenant}: {reason}");
            }
            Err(err) => {
                log::warn!("event for tenant {tenant} exhausted retries, re-enqueuing: {err}");
                if self.tx.send(event).await.is_err() {
                    log::error!("dispatcher queue closed, dropping event for tenant {tenant}");
                }
            }
        }
    }

    /// Event-level retry: up to 3 attempts, quadratic backoff capped at 64s
    /// (§7). `Skip` and `MalformedRecord` are not retried; they are not
    /// transient conditions.
    async fn process_with_retry(
        &self,
        ctx: &AllocatorContext,
        event: ServiceEvent,
    ) -> Result<(), ControllerError> {
        const ATTEMPTS: u32 = 3;
        const CAP_SECS: u64 = 64;
        let mut last_err = None;
        for attempt in 1..=ATTEMPTS {
            match allocator::process(ctx, event.clone()).await {
                Ok(()) => return Ok(()),
                Err(err @ ControllerError::Skip(_)) => return Err(err),
                Err(err) => {
                    log::warn!("allocator attempt {attempt}/{ATTEMPTS} failed: {err}");
                    last_err = Some(err);
                    if attempt < ATTEMPTS {
                        let backoff = ((attempt * attempt) as u64).min(CAP_SECS);
                        tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
                    }
                }
            }
        }
        Err(last_err.expect("ATTEMPTS >= 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::RecordingOrchestratorClient;
    use lb_core::config::{CloudConfig, Config};
    use lb_protocol::{BindType, EventType, Protocol, RequestedPort, ServiceSpec, ServiceType};
    use lb_provider::fake::FakeProvider;
    use lb_store::{MemoryStore, Store};
    use std::collections::HashMap;
    use std::time::Duration;

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

    /// **Objective**: scenario S6, concurrent same-tenant events.
    /// **Scenario**: `s1` and `s2` (the S2 port sets) are enqueued back to
    /// back for the same tenant and drained by a 4-worker dispatcher.
    /// **Assertion**: the tenant mutex serializes the two events regardless
    /// of worker interleaving, so the final port set matches S2 exactly —
    /// one of the two services' request for port 80 is bumped to 81, never
    /// both and never neither.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn s6_concurrent_same_tenant_events_serialize_to_s2_state() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let config = Arc::new(Config {
            cloud: CloudConfig {
                max: 51,
                ..CloudConfig::default()
            },
            ..Config::default()
        });
        let orchestrator = Arc::new(RecordingOrchestratorClient::default());
        let (orphan_tx, _orphan_rx) = mpsc::channel(8);
        let ctx = AllocatorContext::new(
            store.clone(),
            Arc::new(FakeProvider),
            orchestrator,
            config,
            orphan_tx,
        );

        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(16, cancel.clone());
        let sender = dispatcher.sender();
        let run_handle = tokio::spawn({
            let dispatcher = dispatcher.clone();
            let ctx = ctx.clone();
            async move { dispatcher.run(ctx, 4).await }
        });

        let s1 = service("s1", "T", vec![tcp_port(80), tcp_port(443)]);
        let s2 = service("s2", "T", vec![tcp_port(80), tcp_port(5000)]);
        sender.send(added("T", s1)).await.unwrap();
        sender.send(added("T", s2)).await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let s1_bound = store.get_backend_lb("T", "s1").await.unwrap().is_some();
            let s2_bound = store.get_backend_lb("T", "s2").await.unwrap().is_some();
            if s1_bound && s2_bound {
                break;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("events did not finish processing in time");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        let _ = run_handle.await;

        let lb_id = store.get_backend_lb("T", "s1").await.unwrap().unwrap();
        assert_eq!(
            store.get_backend_lb("T", "s2").await.unwrap(),
            Some(lb_id.clone())
        );

        let mut ports = store.get_lb_ports("T", &lb_id, Protocol::Tcp).await.unwrap();
        ports.sort();
        assert_eq!(ports, vec![80, 81, 443, 5000]);
    }
}
