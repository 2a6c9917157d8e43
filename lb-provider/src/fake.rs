use crate::provider::LoadBalancerProvider;
use async_trait::async_trait;
use uuid::Uuid;

/// Trivial provider for `cloud.name = "fake"`: never talks to a real cloud,
/// used for local development and tests.
pub struct FakeProvider;

#[async_trait]
impl LoadBalancerProvider for FakeProvider {
    async fn create(&self) -> anyhow::Result<String> {
        Ok(Uuid::new_v4().to_string())
    }

    async fn delete(&self, lb_id: &str) -> anyhow::Result<()> {
        log::info!("fake provider: deleting lb {lb_id}");
        Ok(())
    }

    fn annotation_key(&self) -> &'static str {
        "service.kubernetes.io/fake-cloud-loadbalancer-id"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_returns_a_fresh_uuid_each_time() {
        let p = FakeProvider;
        let a = p.create().await.unwrap();
        let b = p.create().await.unwrap();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
