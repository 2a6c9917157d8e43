use crate::service::ServiceSpec;
use serde::{Deserialize, Serialize};

/// Which watcher produced an event. `Http` is a log-only placeholder, carried
/// over from the system this controller replaces; only `Service` drives the
/// allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindType {
    Service,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

/// A single record pushed onto the dispatcher's bounded queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEvent {
    pub bind_type: BindType,
    pub event_type: EventType,
    pub tenant: String,
    pub data: ServiceSpec,
}

impl ServiceEvent {
    pub fn new(event_type: EventType, tenant: impl Into<String>, data: ServiceSpec) -> Self {
        Self {
            bind_type: BindType::Service,
            event_type,
            tenant: tenant.into(),
            data,
        }
    }
}
