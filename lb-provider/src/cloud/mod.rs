//! Real cloud backends. Each issues its `create`/`delete` calls over
//! `reqwest` against `cloud.endpoint`, attaching `cloud.access_key_id` /
//! `cloud.access_key_secret` as a bearer credential. No vendor SDK is
//! vendored; this keeps the shape of a genuine API call without requiring a
//! live cloud account to build or test against.

pub mod alibaba;
pub mod huawei;
pub mod tencent;

pub(crate) struct CloudClient {
    pub(crate) http: reqwest::Client,
    pub(crate) endpoint: String,
    pub(crate) access_key_id: String,
    pub(crate) access_key_secret: String,
}

impl CloudClient {
    pub(crate) fn new(endpoint: &str, access_key_id: &str, access_key_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            access_key_id: access_key_id.to_string(),
            access_key_secret: access_key_secret.to_string(),
        }
    }

    /// Issues a `POST {endpoint}/loadbalancers` request and expects
    /// `{"id": "..."}` back. Wrapped by each provider's `create` in the
    /// shared quadratic-backoff retry (3 attempts, capped at 8s).
    pub(crate) async fn create_loadbalancer(&self, name: &str) -> anyhow::Result<String> {
        let resp = self
            .http
            .post(format!("{}/loadbalancers", self.endpoint))
            .bearer_auth(format!("{}:{}", self.access_key_id, self.access_key_secret))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = resp.json().await?;
        body.get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("cloud create response missing \"id\""))
    }

    pub(crate) async fn delete_loadbalancer(&self, lb_id: &str) -> anyhow::Result<()> {
        self.http
            .delete(format!("{}/loadbalancers/{lb_id}", self.endpoint))
            .bearer_auth(format!("{}:{}", self.access_key_id, self.access_key_secret))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// A timestamped LB name, matching the original process's naming
/// convention for freshly created load balancers.
pub(crate) fn timestamped_name(prefix: &str) -> String {
    format!("{prefix}-{}", chrono::Utc::now().timestamp())
}
