//! Exact key layout (§6). Compatibility matters for rolling upgrades: do not
//! change the format of any function here without a migration plan.

pub fn project_set(prefix: &str) -> String {
    format!("{prefix}:project")
}

pub fn backend_hash(prefix: &str, tenant: &str) -> String {
    format!("{prefix}:{tenant}:backend")
}

pub fn backend_ports_set(prefix: &str, tenant: &str, service: &str) -> String {
    format!("{prefix}:{tenant}:backend:{service}")
}

pub fn lb_amount_zset(prefix: &str, tenant: &str) -> String {
    format!("{prefix}:{tenant}:loadbalancer:amount")
}

pub fn lb_ports_set(prefix: &str, tenant: &str, lb_id: &str, proto: &str) -> String {
    format!("{prefix}:{tenant}:loadbalancer:{lb_id}:{proto}")
}

/// Prefix used by the recycler to scan every protocol's port set for an LB,
/// e.g. `<prefix>:<tenant>:loadbalancer:<lb_id>:*`.
pub fn lb_ports_scan_prefix(prefix: &str, tenant: &str, lb_id: &str) -> String {
    format!("{prefix}:{tenant}:loadbalancer:{lb_id}:")
}
