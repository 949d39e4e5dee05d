use thiserror::Error;

/// Errors surfaced by the configuration layer.
///
/// Runtime attachment flow never returns errors across the crate boundary:
/// missing fragments, unresolved owners and duplicate operations are handled
/// as no-ops or deferred internally. Only loading authored slot tables can
/// fail loudly.
#[derive(Error, Debug)]
pub enum RigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Slot table parse error: {0}")]
    ParseError(String),

    #[error("Invalid slot configuration: {0}")]
    InvalidSlot(String),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RigError>;
