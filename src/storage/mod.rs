//! Storage Module
//!
//! The engine contract consumed by the handle manager, plus two engines.
//!
//! ## Responsibilities
//! - Namespaced sessions with get/set/erase of string values
//! - Commit of pending writes (durability is the engine's business)
//! - Metadata iteration over every stored entry
//! - Partition-wide usage stats
//!
//! ## Resource Rules
//! Sessions and entry iterators are scoped resources. A session closes when
//! [`Session::close`] is called or when it is dropped, whichever comes first;
//! an iterator is released when dropped. Engines must tolerate `close` being
//! called more than once.
//!
//! ## Engines
//! ```text
//! ┌──────────────────┐      ┌──────────────────────────────┐
//! │  MemoryEngine    │      │  FileEngine                  │
//! │  (volatile,      │      │  (append-only log per        │
//! │   fault hooks)   │      │   partition, CRC32 records)  │
//! └──────────────────┘      └──────────────────────────────┘
//! ```

mod entry;
mod file;
mod memory;
mod table;

pub use entry::{
    validate_name, EngineStats, EntryInfo, EntryType, OpenMode, MAX_NAME_LEN, MAX_STRING_LEN,
};
pub use file::{FileEngine, Record, FORMAT_VERSION, LOG_EXTENSION, MAGIC};
pub use memory::{FaultPoint, MemoryEngine};
pub use table::EntryTable;

use crate::error::EngineError;

/// Iterator over entry metadata; dropping it releases the engine-side cursor
pub type EntryIter<'a> = Box<dyn Iterator<Item = Result<EntryInfo, EngineError>> + 'a>;

/// An open session on one namespace
pub trait Session {
    /// Namespace this session is bound to
    fn namespace(&self) -> &str;

    /// Size in bytes of the string stored under `key`
    fn get_string_size(&self, key: &str) -> Result<usize, EngineError>;

    /// Copy the string stored under `key` into `out`, returning the bytes written
    ///
    /// Fails with [`EngineError::InvalidLength`] without touching `out` when it
    /// cannot hold the whole value.
    fn get_string(&self, key: &str, out: &mut [u8]) -> Result<usize, EngineError>;

    /// Store `value` under `key`
    fn set_string(&mut self, key: &str, value: &str) -> Result<(), EngineError>;

    /// Remove `key`; [`EngineError::NotFound`] when absent
    fn erase_key(&mut self, key: &str) -> Result<(), EngineError>;

    /// Make pending writes durable
    fn commit(&mut self) -> Result<(), EngineError>;

    /// Close the session; later calls are no-ops
    fn close(&mut self) -> Result<(), EngineError>;
}

/// A namespaced key-value storage engine
pub trait StorageEngine: Send + Sync {
    /// Label of the partition this engine serves
    fn partition(&self) -> &str;

    /// Bring the engine up; calling it on a ready engine is a no-op
    ///
    /// Errors for which [`EngineError::needs_erase`] holds are cleared by
    /// [`StorageEngine::erase`] followed by another `init`.
    fn init(&self) -> Result<(), EngineError>;

    /// Wipe the partition and return to the uninitialized state
    fn erase(&self) -> Result<(), EngineError>;

    /// Open a session on `namespace`
    fn open_session(
        &self,
        namespace: &str,
        mode: OpenMode,
    ) -> Result<Box<dyn Session + '_>, EngineError>;

    /// Iterate entry metadata in `partition`
    ///
    /// `namespace` and `entry_type` filter the entries; `None` matches any.
    fn entries(
        &self,
        partition: &str,
        namespace: Option<&str>,
        entry_type: Option<EntryType>,
    ) -> Result<EntryIter<'_>, EngineError>;

    /// Usage counters for `partition`
    fn stats(&self, partition: &str) -> Result<EngineStats, EngineError>;
}
