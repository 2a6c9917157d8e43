use lb_provider::LoadBalancerProvider;
use lb_store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Periodic scan that deletes LBs with zero port-index entries across all
/// protocols, prunes their self-sentinel backend-directory row, and then
/// prunes any tenant left owning no LBs (§3, §4.F). Only runs when
/// `auto_clean` is set. Also drains the "to-delete" channel the allocator
/// feeds on an orphaned-LB failure (§9), so there is exactly one
/// LB-deletion path in the process.
pub struct Recycler {
    store: Arc<dyn Store>,
    provider: Arc<dyn LoadBalancerProvider>,
}

impl Recycler {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn LoadBalancerProvider>) -> Self {
        Self { store, provider }
    }

    pub async fn run(
        self,
        interval: Duration,
        mut to_delete_rx: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("recycler stopping");
                    return;
                }
                _ = ticker.tick() => {
                    self.scan().await;
                }
                Some(lb_id) = to_delete_rx.recv() => {
                    log::info!("recycler draining orphaned LB {lb_id} reported by the allocator");
                    self.delete_lb("", &lb_id).await;
                }
            }
        }
    }

    async fn scan(&self) {
        let tenants = match self.store.list_tenants().await {
            Ok(t) => t,
            Err(err) => {
                log::warn!("recycler: list_tenants failed: {err}");
                return;
            }
        };

        for tenant in tenants {
            // Enumerated from the capacity index, not `list_backends`:
            // `list_backends` filters out the self-sentinel row
            // (service-name == lb_id), which is exactly the row an idle LB
            // is left with once its last real service is deleted. Scanning
            // it would mean an LB could never be found empty.
            let capacities = match self.store.list_lb_capacities(&tenant).await {
                Ok(c) => c,
                Err(err) => {
                    log::warn!("recycler: list_lb_capacities({tenant}) failed: {err}");
                    continue;
                }
            };

            for (lb_id, _score) in capacities {
                match self.store.lb_has_no_ports(&tenant, &lb_id).await {
                    Ok(true) => self.delete_lb(&tenant, &lb_id).await,
                    Ok(false) => {}
                    Err(err) => log::warn!(
                        "recycler: lb_has_no_ports({tenant}, {lb_id}) failed: {err}"
                    ),
                }
            }

            self.prune_tenant_if_empty(&tenant).await;
        }
    }

    /// §3 / §4.F: a tenant is deleted once it owns no LBs, mirroring the
    /// original process's `cleanProject`. Re-reads the capacity index after
    /// the sweep above rather than tracking a running count, so an error on
    /// one `lb_has_no_ports` call can't falsely report the tenant as empty.
    async fn prune_tenant_if_empty(&self, tenant: &str) {
        match self.store.list_lb_capacities(tenant).await {
            Ok(remaining) if remaining.is_empty() => {
                if let Err(err) = self.store.remove_tenant(tenant).await {
                    log::warn!("recycler: remove_tenant({tenant}) failed: {err}");
                } else {
                    log::info!("recycler pruned tenant {tenant}, no remaining loadbalancers");
                }
            }
            Ok(_) => {}
            Err(err) => log::warn!("recycler: list_lb_capacities({tenant}) recheck failed: {err}"),
        }
    }

    async fn delete_lb(&self, tenant: &str, lb_id: &str) {
        if !tenant.is_empty() {
            if let Err(err) = self.store.remove_lb_capacity(tenant, lb_id).await {
                log::warn!("recycler: remove_lb_capacity({tenant}, {lb_id}) failed: {err}");
            }
            if let Err(err) = self.store.remove_backend_lb(tenant, lb_id).await {
                log::warn!("recycler: remove_backend_lb({tenant}, {lb_id}) failed: {err}");
            }
        }
        if let Err(err) = self.provider.delete(lb_id).await {
            log::warn!("recycler: provider delete({lb_id}) failed: {err}");
        } else {
            log::info!("recycler deleted idle lb {lb_id}");
        }
    }
}
