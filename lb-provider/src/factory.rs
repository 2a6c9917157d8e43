use crate::cloud::{alibaba::AlibabaProvider, huawei::HuaweiProvider, tencent::TencentProvider};
use crate::fake::FakeProvider;
use crate::provider::LoadBalancerProvider;
use lb_core::config::CloudConfig;
use std::sync::Arc;

/// Builds the configured provider. `cloud.name` has already been validated
/// by [`lb_core::config::Config::load`]; an unrecognized name here would be
/// a programming error, not a runtime condition.
pub fn build_provider(cloud: &CloudConfig) -> Arc<dyn LoadBalancerProvider> {
    match cloud.name.as_str() {
        "alibaba" => Arc::new(AlibabaProvider::new(
            &cloud.endpoint,
            &cloud.access_key_id,
            &cloud.access_key_secret,
        )),
        "huawei" => Arc::new(HuaweiProvider::new(
            &cloud.endpoint,
            &cloud.access_key_id,
            &cloud.access_key_secret,
        )),
        "tencent" => Arc::new(TencentProvider::new(
            &cloud.endpoint,
            &cloud.access_key_id,
            &cloud.access_key_secret,
        )),
        _ => Arc::new(FakeProvider),
    }
}
