use crate::record::PortRecord;
use crate::store::{LbComparator, Store};
use async_trait::async_trait;
use lb_protocol::Protocol;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Default)]
struct TenantState {
    lb_capacity: HashMap<String, i64>,
    lb_ports: HashMap<(String, Protocol), HashSet<u16>>,
    backend_lb: HashMap<String, String>,
    backend_ports: HashMap<String, Vec<PortRecord>>,
}

/// An in-memory stand-in for [`Store`] satisfying the same trait the Redis
/// client implements, used by allocator/dispatcher/recycler unit tests so
/// they don't need a live Redis instance.
#[derive(Default)]
pub struct MemoryStore {
    tenants: Mutex<HashSet<String>>,
    state: Mutex<HashMap<String, TenantState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn add_tenant(&self, tenant: &str) -> anyhow::Result<()> {
        self.tenants.lock().await.insert(tenant.to_string());
        Ok(())
    }

    async fn list_tenants(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.tenants.lock().await.iter().cloned().collect())
    }

    async fn remove_tenant(&self, tenant: &str) -> anyhow::Result<()> {
        self.tenants.lock().await.remove(tenant);
        Ok(())
    }

    async fn set_lb_capacity(
        &self,
        tenant: &str,
        lb_id: &str,
        max_ports_per_lb: u32,
        delta: i64,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let tenant_state = state.entry(tenant.to_string()).or_default();
        if delta == 0 {
            tenant_state
                .lb_capacity
                .insert(lb_id.to_string(), (max_ports_per_lb as i64) - 1);
        } else {
            *tenant_state
                .lb_capacity
                .entry(lb_id.to_string())
                .or_insert(0) += delta;
        }
        Ok(())
    }

    async fn remove_lb_capacity(&self, tenant: &str, lb_id: &str) -> anyhow::Result<()> {
        if let Some(tenant_state) = self.state.lock().await.get_mut(tenant) {
            tenant_state.lb_capacity.remove(lb_id);
        }
        Ok(())
    }

    async fn find_available_lb(
        &self,
        tenant: &str,
        need: i64,
        max_ports_per_lb: u32,
        comparator: LbComparator,
    ) -> anyhow::Result<Option<String>> {
        let state = self.state.lock().await;
        let max_score = (max_ports_per_lb as i64) - 1;
        let candidates: Vec<(String, i64)> = state
            .get(tenant)
            .map(|t| {
                t.lb_capacity
                    .iter()
                    .filter(|(_, &score)| score >= need && score <= max_score)
                    .map(|(id, score)| (id.clone(), *score))
                    .collect()
            })
            .unwrap_or_default();
        Ok(comparator(&candidates))
    }

    async fn get_lb_ports(
        &self,
        tenant: &str,
        lb_id: &str,
        proto: Protocol,
    ) -> anyhow::Result<Vec<u16>> {
        let state = self.state.lock().await;
        Ok(state
            .get(tenant)
            .and_then(|t| t.lb_ports.get(&(lb_id.to_string(), proto)))
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn add_lb_ports(
        &self,
        tenant: &str,
        lb_id: &str,
        proto: Protocol,
        ports: &[u16],
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let tenant_state = state.entry(tenant.to_string()).or_default();
        let set = tenant_state
            .lb_ports
            .entry((lb_id.to_string(), proto))
            .or_default();
        set.extend(ports.iter().copied());
        Ok(())
    }

    async fn remove_lb_port(
        &self,
        tenant: &str,
        lb_id: &str,
        proto: Protocol,
        port: u16,
    ) -> anyhow::Result<()> {
        if let Some(tenant_state) = self.state.lock().await.get_mut(tenant) {
            if let Some(set) = tenant_state.lb_ports.get_mut(&(lb_id.to_string(), proto)) {
                set.remove(&port);
            }
        }
        Ok(())
    }

    async fn lb_has_no_ports(&self, tenant: &str, lb_id: &str) -> anyhow::Result<bool> {
        let state = self.state.lock().await;
        let Some(tenant_state) = state.get(tenant) else {
            return Ok(true);
        };
        let has_any = tenant_state
            .lb_ports
            .iter()
            .any(|((id, _), ports)| id == lb_id && !ports.is_empty());
        Ok(!has_any)
    }

    async fn list_lb_capacities(&self, tenant: &str) -> anyhow::Result<Vec<(String, i64)>> {
        let state = self.state.lock().await;
        Ok(state
            .get(tenant)
            .map(|t| {
                t.lb_capacity
                    .iter()
                    .map(|(id, score)| (id.clone(), *score))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_lb_protocols(&self, tenant: &str, lb_id: &str) -> anyhow::Result<Vec<String>> {
        let state = self.state.lock().await;
        let mut protocols: Vec<String> = state
            .get(tenant)
            .map(|t| {
                t.lb_ports
                    .keys()
                    .filter(|(id, _)| id == lb_id)
                    .map(|(_, proto)| proto.to_string())
                    .collect()
            })
            .unwrap_or_default();
        protocols.sort();
        Ok(protocols)
    }

    async fn get_backend_lb(&self, tenant: &str, service: &str) -> anyhow::Result<Option<String>> {
        let state = self.state.lock().await;
        Ok(state
            .get(tenant)
            .and_then(|t| t.backend_lb.get(service).cloned()))
    }

    async fn set_backend_lb(&self, tenant: &str, service: &str, lb_id: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state
            .entry(tenant.to_string())
            .or_default()
            .backend_lb
            .insert(service.to_string(), lb_id.to_string());
        Ok(())
    }

    async fn remove_backend_lb(&self, tenant: &str, service: &str) -> anyhow::Result<()> {
        if let Some(tenant_state) = self.state.lock().await.get_mut(tenant) {
            tenant_state.backend_lb.remove(service);
        }
        Ok(())
    }

    async fn get_backend_ports(
        &self,
        tenant: &str,
        service: &str,
    ) -> anyhow::Result<Vec<PortRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .get(tenant)
            .and_then(|t| t.backend_ports.get(service).cloned())
            .unwrap_or_default())
    }

    async fn set_backend_ports(
        &self,
        tenant: &str,
        service: &str,
        ports: &[PortRecord],
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state
            .entry(tenant.to_string())
            .or_default()
            .backend_ports
            .insert(service.to_string(), ports.to_vec());
        Ok(())
    }

    async fn delete_backend_ports(&self, tenant: &str, service: &str) -> anyhow::Result<()> {
        if let Some(tenant_state) = self.state.lock().await.get_mut(tenant) {
            tenant_state.backend_ports.remove(service);
        }
        Ok(())
    }

    async fn list_backends(&self, tenant: &str) -> anyhow::Result<Vec<(String, String)>> {
        let state = self.state.lock().await;
        Ok(state
            .get(tenant)
            .map(|t| {
                t.backend_lb
                    .iter()
                    .filter(|(name, lb_id)| *name != *lb_id)
                    .map(|(a, b)| (a.clone(), b.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::lowest_score_then_lexicographic;

    #[tokio::test]
    async fn find_available_lb_respects_score_range_and_tie_break() {
        let store = MemoryStore::new();
        store.set_lb_capacity("t", "lb-b", 51, 0).await.unwrap();
        store.set_lb_capacity("t", "lb-a", 51, 0).await.unwrap();
        store
            .set_lb_capacity("t", "lb-a", 51, -49)
            .await
            .unwrap(); // lb-a now has score 1
        let found = store
            .find_available_lb("t", 1, 51, lowest_score_then_lexicographic)
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("lb-a"));
    }

    #[tokio::test]
    async fn lb_has_no_ports_true_until_a_port_is_added() {
        let store = MemoryStore::new();
        assert!(store.lb_has_no_ports("t", "lb0").await.unwrap());
        store
            .add_lb_ports("t", "lb0", Protocol::Tcp, &[80])
            .await
            .unwrap();
        assert!(!store.lb_has_no_ports("t", "lb0").await.unwrap());
        store
            .remove_lb_port("t", "lb0", Protocol::Tcp, 80)
            .await
            .unwrap();
        assert!(store.lb_has_no_ports("t", "lb0").await.unwrap());
    }
}
