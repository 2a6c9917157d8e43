//! Annotation keys recognized by the orchestrator. These must match exactly
//! for rolling-upgrade compatibility with existing bound services.

/// Per-provider annotation key carrying the bound LB's id.
pub fn provider_key(cloud_name: &str) -> &'static str {
    match cloud_name {
        "alibaba" => "service.beta.kubernetes.io/alibaba-cloud-loadbalancer-id",
        "tencent" => "service.kubernetes.io/tke-existed-lbid",
        "huawei" => "kubernetes.io/elb.subnet-id",
        _ => "service.kubernetes.io/fake-cloud-loadbalancer-id",
    }
}

/// Flag annotation: when set to `"true"`, the resolved `target_port` is
/// substituted into the outgoing port record instead of the original.
pub const ENABLE_TARGET_PORT: &str = "service.kubernetes.io/q1-enable-target_port";

pub const EXTERNAL_TRAFFIC_POLICY: &str = "service.kubernetes.io/external-traffic-policy";
pub const EXTERNAL_TRAFFIC_POLICY_LOCAL: &str = "local";
