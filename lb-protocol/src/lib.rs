//! Wire and domain types shared between the dispatcher, the allocator, and the
//! stand-in event source / orchestrator client.
//!
//! Modules:
//! - `event`: the `ServiceEvent` envelope the event source pushes onto the dispatcher queue.
//! - `service`: the service/port description carried by an event.
//! - `annotations`: the fixed annotation keys each cloud provider recognizes.

pub mod annotations;
pub mod event;
pub mod service;

pub use event::{BindType, EventType, ServiceEvent};
pub use service::{Protocol, RequestedPort, ServiceSpec, ServiceType};
