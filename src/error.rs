//! Error types for flashslot
//!
//! Two layers:
//! - [`EngineError`] is what a storage engine reports through its contract.
//! - [`SlotError`] is what the handle manager reports to callers.

use thiserror::Error;

/// Result type alias using SlotError
pub type Result<T> = std::result::Result<T, SlotError>;

/// Errors raised by a storage engine
#[derive(Debug, Error)]
pub enum EngineError {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Engine not initialized")]
    NotInitialized,

    #[error("No free pages left in partition")]
    NoFreePages,

    #[error("Partition holds data in a newer format (version {found})")]
    NewVersionFound { found: u16 },

    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    // -------------------------------------------------------------------------
    // Entry Errors
    // -------------------------------------------------------------------------
    #[error("Entry not found")]
    NotFound,

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Value too long: {len} bytes (max {max})")]
    ValueTooLong { len: usize, max: usize },

    #[error("Output buffer too small: need {required} bytes, have {available}")]
    InvalidLength { required: usize, available: usize },

    #[error("Not enough space for a new entry")]
    NotEnoughSpace,

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Session is read-only")]
    ReadOnly,

    #[error("Session already closed")]
    SessionClosed,

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Data corruption detected: {0}")]
    Corrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Conditions cleared by erasing the partition and initializing again
    pub fn needs_erase(&self) -> bool {
        matches!(self, EngineError::NoFreePages | EngineError::NewVersionFound { .. })
    }
}

/// Errors reported by the handle manager
#[derive(Debug, Error)]
pub enum SlotError {
    // -------------------------------------------------------------------------
    // Construction Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Engine initialization failed: {0}")]
    EngineInitFailed(#[source] EngineError),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Failed to open session on namespace '{namespace}': {source}")]
    SessionOpenFailed {
        namespace: String,
        #[source]
        source: EngineError,
    },

    // -------------------------------------------------------------------------
    // Read Errors
    // -------------------------------------------------------------------------
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Read failed: {0}")]
    ReadFailed(#[source] EngineError),

    #[error("Buffer too small: value needs {required} bytes, capacity is {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },

    // -------------------------------------------------------------------------
    // Write Errors
    // -------------------------------------------------------------------------
    #[error("Write failed: {0}")]
    WriteFailed(#[source] EngineError),

    #[error("Commit failed: {0}")]
    CommitFailed(#[source] EngineError),

    #[error("Erase failed: {0}")]
    EraseFailed(#[source] EngineError),

    // -------------------------------------------------------------------------
    // Enumeration Errors
    // -------------------------------------------------------------------------
    #[error("Entry iteration failed: {0}")]
    IteratorFailed(#[source] EngineError),
}
