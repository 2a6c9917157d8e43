use super::{timestamped_name, CloudClient};
use crate::provider::LoadBalancerProvider;
use async_trait::async_trait;
use lb_core::retry::retry;

pub struct HuaweiProvider {
    client: CloudClient,
}

impl HuaweiProvider {
    pub fn new(endpoint: &str, access_key_id: &str, access_key_secret: &str) -> Self {
        Self {
            client: CloudClient::new(endpoint, access_key_id, access_key_secret),
        }
    }
}

#[async_trait]
impl LoadBalancerProvider for HuaweiProvider {
    async fn create(&self) -> anyhow::Result<String> {
        let name = timestamped_name("enforce-shared-lb");
        retry(3, 8, || self.client.create_loadbalancer(&name)).await
    }

    async fn delete(&self, lb_id: &str) -> anyhow::Result<()> {
        self.client.delete_loadbalancer(lb_id).await
    }

    fn annotation_key(&self) -> &'static str {
        "kubernetes.io/elb.subnet-id"
    }
}
