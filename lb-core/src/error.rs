use thiserror::Error;

/// The five error kinds the controller distinguishes. Everything that only
/// needs to propagate, not branch on, an error keeps using `anyhow::Result`;
/// the dispatcher and allocator match on this enum where the kind changes
/// behavior (retry vs. drop vs. silent skip).
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Malformed configuration or unreachable K/V store on boot. The process exits.
    #[error("fatal configuration error: {0}")]
    ConfigFatal(String),

    /// K/V read/write failure, cloud-create failure, or orchestrator-update
    /// failure. Retried at the event level up to 3 times with quadratic
    /// backoff capped at 64s, then re-enqueued.
    #[error("transient error: {0}")]
    Transient(String),

    /// Stored data that failed to parse. The record is deleted in-place and
    /// the operation proceeds as if it were absent.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// The resolver could not place a port without exceeding 65535.
    #[error("port budget exhausted: requested port {requested} has no free slot below 65536")]
    PortExhausted { requested: u16 },

    /// Non-matching labels, already-bound external IP, or wrong service
    /// type. Silent success, no state change.
    #[error("skipped: {0}")]
    Skip(String),
}

impl ControllerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControllerError::Transient(_))
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, ControllerError::Skip(_))
    }
}

impl From<serde_json::Error> for ControllerError {
    fn from(e: serde_json::Error) -> Self {
        ControllerError::ConfigFatal(format!("invalid JSON: {e}"))
    }
}

impl From<std::io::Error> for ControllerError {
    fn from(e: std::io::Error) -> Self {
        ControllerError::ConfigFatal(format!("I/O error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
