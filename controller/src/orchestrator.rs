use async_trait::async_trait;
use lb_protocol::ServiceSpec;
use std::sync::{Arc, Mutex};

/// Pushes the mutated service spec back to the orchestrator (§4.D step 9).
/// The real implementation of this lives in the cluster this controller
/// runs alongside; everything the core needs from it is captured here so
/// the allocator can be exercised without one.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    async fn update(&self, service: &ServiceSpec) -> anyhow::Result<()>;
}

/// Logs every update at `info` instead of calling out to a real cluster
/// API. Used when no orchestrator integration is wired in (local runs,
/// tests).
pub struct LoggingOrchestratorClient;

#[async_trait]
impl OrchestratorClient for LoggingOrchestratorClient {
    async fn update(&self, service: &ServiceSpec) -> anyhow::Result<()> {
        log::info!(
            "orchestrator update: service={} tenant={} ports={:?}",
            service.name,
            service.tenant,
            service.ports
        );
        Ok(())
    }
}

/// Records every update it receives, for assertions in allocator tests.
#[derive(Default, Clone)]
pub struct RecordingOrchestratorClient {
    pub updates: Arc<Mutex<Vec<ServiceSpec>>>,
}

#[async_trait]
impl OrchestratorClient for RecordingOrchestratorClient {
    async fn update(&self, service: &ServiceSpec) -> anyhow::Result<()> {
        self.updates.lock().unwrap().push(service.clone());
        Ok(())
    }
}
