use crate::record::PortRecord;
use async_trait::async_trait;
use lb_protocol::Protocol;

/// Deterministic tie-break used by [`Store::find_available_lb`]: lowest
/// score that still fits the request, then lexicographic lb id. Kept as a
/// named type rather than a bare closure so an alternative packing strategy
/// can be substituted by callers that construct their own store client
/// directly (§9 open question on a pluggable comparator).
pub type LbComparator = fn(&[(String, i64)]) -> Option<String>;

pub fn lowest_score_then_lexicographic(candidates: &[(String, i64)]) -> Option<String> {
    candidates
        .iter()
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(id, _)| id.clone())
}

/// Typed operations over the remote K/V store (§4.A). No transactions: the
/// allocator is responsible for per-tenant mutual exclusion and write
/// ordering (§4.D, §5).
#[async_trait]
pub trait Store: Send + Sync {
    async fn add_tenant(&self, tenant: &str) -> anyhow::Result<()>;
    async fn list_tenants(&self) -> anyhow::Result<Vec<String>>;
    async fn remove_tenant(&self, tenant: &str) -> anyhow::Result<()>;

    /// If `delta == 0`, initializes the score to `max_ports_per_lb - 1`.
    /// Otherwise atomically increments by `delta` (may be negative). The
    /// caller must have initialized the key first; this does not
    /// implicitly create one on a nonzero delta.
    async fn set_lb_capacity(
        &self,
        tenant: &str,
        lb_id: &str,
        max_ports_per_lb: u32,
        delta: i64,
    ) -> anyhow::Result<()>;

    async fn remove_lb_capacity(&self, tenant: &str, lb_id: &str) -> anyhow::Result<()>;

    /// Returns any lb whose score is in `[need, max_ports_per_lb - 1]`,
    /// broken by `comparator`.
    async fn find_available_lb(
        &self,
        tenant: &str,
        need: i64,
        max_ports_per_lb: u32,
        comparator: LbComparator,
    ) -> anyhow::Result<Option<String>>;

    async fn get_lb_ports(
        &self,
        tenant: &str,
        lb_id: &str,
        proto: Protocol,
    ) -> anyhow::Result<Vec<u16>>;

    async fn add_lb_ports(
        &self,
        tenant: &str,
        lb_id: &str,
        proto: Protocol,
        ports: &[u16],
    ) -> anyhow::Result<()>;

    async fn remove_lb_port(
        &self,
        tenant: &str,
        lb_id: &str,
        proto: Protocol,
        port: u16,
    ) -> anyhow::Result<()>;

    /// True if `lb_id` has zero port entries across every protocol,
    /// scanning via the `<prefix>:<tenant>:loadbalancer:<lb_id>:*` prefix
    /// (§4.F).
    async fn lb_has_no_ports(&self, tenant: &str, lb_id: &str) -> anyhow::Result<bool>;

    /// Read-only: every lb id known to the tenant's capacity index with its
    /// remaining-slots score. Backs `GET /api/{t}/loadbalancer`.
    async fn list_lb_capacities(&self, tenant: &str) -> anyhow::Result<Vec<(String, i64)>>;

    /// Read-only: the protocols an lb has a port set for. Backs
    /// `GET /api/{t}/loadbalancer/{id}`.
    async fn list_lb_protocols(&self, tenant: &str, lb_id: &str) -> anyhow::Result<Vec<String>>;

    async fn get_backend_lb(&self, tenant: &str, service: &str) -> anyhow::Result<Option<String>>;
    async fn set_backend_lb(&self, tenant: &str, service: &str, lb_id: &str) -> anyhow::Result<()>;
    async fn remove_backend_lb(&self, tenant: &str, service: &str) -> anyhow::Result<()>;

    async fn get_backend_ports(
        &self,
        tenant: &str,
        service: &str,
    ) -> anyhow::Result<Vec<PortRecord>>;

    async fn set_backend_ports(
        &self,
        tenant: &str,
        service: &str,
        ports: &[PortRecord],
    ) -> anyhow::Result<()>;

    async fn delete_backend_ports(&self, tenant: &str, service: &str) -> anyhow::Result<()>;

    /// service-name -> lb_id, with the self-sentinel rows (service-name ==
    /// lb_id) filtered out, matching the original process's list endpoint.
    async fn list_backends(&self, tenant: &str) -> anyhow::Result<Vec<(String, String)>>;
}
