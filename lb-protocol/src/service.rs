use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            _ => Err(()),
        }
    }
}

/// Whether the orchestrator currently exposes the service only inside the
/// cluster, or already as an external load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    ClusterInternal,
    ExternalLoadBalancer,
}

/// One requested listener port, as the orchestrator describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedPort {
    pub name: Option<String>,
    pub port: u16,
    pub protocol: Protocol,
    pub target_port: u16,
}

impl RequestedPort {
    /// Port normalization (§4.D): an unnamed port's name becomes its decimal
    /// string so later diffs have a stable identity.
    pub fn name_or_port(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.port.to_string())
    }
}

/// The service description carried by an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub tenant: String,
    pub service_type: ServiceType,
    pub ports: Vec<RequestedPort>,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    /// Non-empty when the orchestrator has already assigned an external IP
    /// or ingress hostname to this service.
    pub external_ips: Vec<String>,
    pub ingress: Vec<String>,
}

impl ServiceSpec {
    /// True once a service carries a non-empty value for `annotation_key`.
    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotations
            .get(key)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    pub fn has_external_assignment(&self) -> bool {
        !self.external_ips.is_empty() || !self.ingress.is_empty()
    }
}
