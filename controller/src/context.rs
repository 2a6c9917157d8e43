use crate::orchestrator::OrchestratorClient;
use lb_core::config::Config;
use lb_provider::LoadBalancerProvider;
use lb_store::Store;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Owns the store adapter, provider, orchestrator client, and
/// configuration. Replaces the source's global singletons (`Cache.DB`,
/// global orchestrator client) per the §9 design note: no process-wide
/// mutable state, everything is threaded through explicitly.
#[derive(Clone)]
pub struct AllocatorContext {
    pub store: Arc<dyn Store>,
    pub provider: Arc<dyn LoadBalancerProvider>,
    pub orchestrator: Arc<dyn OrchestratorClient>,
    pub config: Arc<Config>,
    /// The recycler's "to-delete" channel. An LB created in step 5 of the
    /// Added/Modified flow that never reaches a successful commit is
    /// pushed here (§4.D design note, §9 open question) instead of being
    /// left to leak at the provider.
    pub orphan_lb_tx: mpsc::Sender<String>,
}

impl AllocatorContext {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn LoadBalancerProvider>,
        orchestrator: Arc<dyn OrchestratorClient>,
        config: Arc<Config>,
        orphan_lb_tx: mpsc::Sender<String>,
    ) -> Self {
        Self {
            store,
            provider,
            orchestrator,
            config,
            orphan_lb_tx,
        }
    }
}
