use async_trait::async_trait;
use std::collections::HashMap;

/// Create/delete/annotate an LB through a cloud backend (§4.C). `Create` is
/// the only blocking call with a retry contract: callers are expected to
/// wrap it with [`lb_core::retry::retry`] (3 attempts, quadratic backoff
/// capped at 8s) rather than have each implementation retry itself.
#[async_trait]
pub trait LoadBalancerProvider: Send + Sync {
    async fn create(&self) -> anyhow::Result<String>;
    async fn delete(&self, lb_id: &str) -> anyhow::Result<()>;

    /// The annotation key this provider writes, whose value is the `lb_id`.
    fn annotation_key(&self) -> &'static str;

    fn annotate(&self, annotations: &mut HashMap<String, String>, lb_id: &str) {
        annotations.insert(self.annotation_key().to_string(), lb_id.to_string());
    }

    /// True when `annotations` already carries a nonempty value under this
    /// provider's key, meaning another controller (or us, earlier) already
    /// bound it.
    fn has_annotation(&self, annotations: &HashMap<String, String>) -> bool {
        annotations
            .get(self.annotation_key())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }
}
