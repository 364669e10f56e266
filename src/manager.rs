//! Slot Manager
//!
//! Creates slot handles and routes every read/write/erase through the storage
//! engine using the handle's (namespace, key) pair.
//!
//! ## Responsibilities
//! - Validate handle configs and bring the engine up (erase-and-retry once)
//! - One short-lived session per operation, closed on every exit path
//! - Keep reads inside the handle's fixed buffer capacity
//! - List distinct namespaces, bounded by `Config::max_namespaces`
//!
//! ## Logging
//! All operations run inside the manager's `tracing` span. The span is built
//! from `Config::log_tag`, or supplied by the caller via [`SlotManager::with_span`].

use std::ops::{Deref, DerefMut};

use tracing::Span;

use crate::config::{Config, HandleConfig};
use crate::error::{EngineError, Result, SlotError};
use crate::handle::SlotHandle;
use crate::storage::{EngineStats, OpenMode, Session, StorageEngine};

/// Handle manager over a storage engine
pub struct SlotManager<E: StorageEngine> {
    /// Underlying engine
    engine: E,

    /// Manager configuration (partition, enumeration bound)
    config: Config,

    /// Logging context entered by every operation
    span: Span,
}

impl<E: StorageEngine> SlotManager<E> {
    /// Create a manager logging under a span tagged with `config.log_tag`
    pub fn new(engine: E, config: Config) -> Self {
        let span = tracing::info_span!(
            "slot_manager",
            tag = %config.log_tag,
            partition = %config.partition
        );
        Self::with_span(engine, config, span)
    }

    /// Create a manager logging under a caller-supplied span
    pub fn with_span(engine: E, config: Config, span: Span) -> Self {
        Self {
            engine,
            config,
            span,
        }
    }

    // =========================================================================
    // Handle Lifecycle
    // =========================================================================

    /// Create a slot handle
    ///
    /// Steps:
    /// 1. Validate namespace, key and capacity
    /// 2. Allocate the value buffer
    /// 3. Initialize the engine (erase and retry once if it asks for it)
    pub fn create(&self, config: HandleConfig) -> Result<SlotHandle> {
        let _enter = self.span.enter();

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Invalid handle config");
            return Err(e);
        }

        let handle = SlotHandle::new(config);
        self.init_engine()?;

        tracing::info!(
            namespace = %handle.namespace(),
            key = %handle.key(),
            capacity = handle.capacity(),
            "Slot handle created"
        );
        Ok(handle)
    }

    /// Release a handle and its buffer
    pub fn destroy(&self, handle: SlotHandle) {
        let _enter = self.span.enter();
        tracing::debug!(
            namespace = %handle.namespace(),
            key = %handle.key(),
            "Slot handle destroyed"
        );
        drop(handle);
    }

    /// Point the handle at another key in the same namespace
    ///
    /// Neither the engine nor the buffer is touched. An invalid key is
    /// rejected and the old key stays in place.
    pub fn rekey(&self, handle: &mut SlotHandle, new_key: &str) -> Result<()> {
        let _enter = self.span.enter();

        crate::storage::validate_name("key", new_key).map_err(|e| {
            tracing::error!(key = %new_key, error = %e, "Rejected new key");
            SlotError::InvalidArgument(e.to_string())
        })?;

        tracing::debug!(old = %handle.key(), new = %new_key, "Key changed");
        handle.set_key(new_key.to_string());
        Ok(())
    }

    // =========================================================================
    // Value Operations
    // =========================================================================

    /// Store `value` under the handle's key and commit
    ///
    /// The handle's buffer is not touched. Set and commit fail independently;
    /// a failed commit does not undo the set.
    pub fn write(&self, handle: &SlotHandle, value: &str) -> Result<()> {
        let _enter = self.span.enter();

        let mut session = self.open_session(handle.namespace())?;

        session.set_string(handle.key(), value).map_err(|e| {
            tracing::error!(key = %handle.key(), error = %e, "Failed to write string");
            SlotError::WriteFailed(e)
        })?;
        tracing::info!(key = %handle.key(), len = value.len(), "Wrote string");

        session.commit().map_err(|e| {
            tracing::error!(key = %handle.key(), error = %e, "Failed to commit changes");
            SlotError::CommitFailed(e)
        })?;

        Ok(())
    }

    /// Read the value under the handle's key into its buffer
    ///
    /// Every read probes with the full capacity, regardless of what a previous
    /// read left in `len()`. A value larger than the capacity fails with
    /// `BufferTooSmall` before anything is copied.
    ///
    /// The returned string borrows the handle's buffer.
    pub fn read<'h>(&self, handle: &'h mut SlotHandle) -> Result<&'h str> {
        let _enter = self.span.enter();

        handle.reset_length();
        let capacity = handle.capacity();

        let session = self.open_session(handle.namespace())?;

        let required = session
            .get_string_size(handle.key())
            .map_err(|e| Self::read_error(handle.key(), e))?;

        if required > capacity {
            tracing::error!(
                key = %handle.key(),
                required,
                capacity,
                "Buffer too small for string value"
            );
            return Err(SlotError::BufferTooSmall { required, capacity });
        }

        let written = {
            let (key, buf) = handle.read_target();
            session
                .get_string(key, buf)
                .map_err(|e| Self::read_error(key, e))?
        };
        handle.set_length(written);
        drop(session);

        let handle: &'h SlotHandle = handle;
        let value = std::str::from_utf8(handle.value()).map_err(|e| {
            SlotError::ReadFailed(EngineError::Corrupted(format!(
                "stored value is not UTF-8: {}",
                e
            )))
        })?;

        tracing::info!(key = %handle.key(), len = written, "Read string");
        Ok(value)
    }

    /// Remove the handle's key and commit
    ///
    /// Returns `Ok(false)` when the key did not exist; that case is logged and
    /// not treated as a failure.
    pub fn erase(&self, handle: &SlotHandle) -> Result<bool> {
        let _enter = self.span.enter();

        let mut session = self.open_session(handle.namespace())?;

        let existed = match session.erase_key(handle.key()) {
            Ok(()) => {
                tracing::info!(key = %handle.key(), "Deleted string");
                true
            }
            Err(EngineError::NotFound) => {
                tracing::warn!(key = %handle.key(), "Nothing to delete, key not found");
                false
            }
            Err(e) => {
                tracing::error!(key = %handle.key(), error = %e, "Failed to delete string");
                return Err(SlotError::EraseFailed(e));
            }
        };

        session.commit().map_err(|e| {
            tracing::error!(key = %handle.key(), error = %e, "Failed to commit changes");
            SlotError::CommitFailed(e)
        })?;

        Ok(existed)
    }

    // =========================================================================
    // Partition-wide Queries
    // =========================================================================

    /// Distinct namespaces present in the partition, in first-seen order
    ///
    /// At most `Config::max_namespaces` names are returned; namespaces past
    /// the bound are left out without an error. Engine failures are logged
    /// and yield an empty list.
    pub fn list_namespaces(&self) -> Vec<String> {
        match self.try_list_namespaces() {
            Ok(namespaces) => namespaces,
            Err(e) => {
                let _enter = self.span.enter();
                tracing::warn!(error = %e, "Namespace listing failed");
                Vec::new()
            }
        }
    }

    /// Like [`list_namespaces`](Self::list_namespaces), but iterator failures
    /// surface as `IteratorFailed`
    pub fn try_list_namespaces(&self) -> Result<Vec<String>> {
        let _enter = self.span.enter();

        let limit = self.config.max_namespaces;
        let entries = self
            .engine
            .entries(&self.config.partition, None, None)
            .map_err(SlotError::IteratorFailed)?;

        let mut namespaces: Vec<String> = Vec::new();
        let mut entry_count = 0usize;
        let mut skipped = 0usize;

        for entry in entries {
            let info = entry.map_err(SlotError::IteratorFailed)?;
            entry_count += 1;

            if namespaces.iter().any(|ns| *ns == info.namespace) {
                continue;
            }

            if namespaces.len() < limit {
                tracing::debug!(
                    index = namespaces.len(),
                    namespace = %info.namespace,
                    "Found namespace"
                );
                namespaces.push(info.namespace);
            } else {
                skipped += 1;
            }
        }

        if entry_count == 0 {
            tracing::warn!("No entries found in partition");
        }
        if skipped > 0 {
            tracing::debug!(limit, skipped, "Namespace listing truncated");
        }
        tracing::info!(count = namespaces.len(), "Total unique namespaces");

        Ok(namespaces)
    }

    /// Partition usage counters; `None` (logged) when the engine cannot report them
    pub fn stats(&self) -> Option<EngineStats> {
        let _enter = self.span.enter();

        match self.engine.stats(&self.config.partition) {
            Ok(stats) => {
                tracing::info!(
                    namespace_count = stats.namespace_count,
                    used_entries = stats.used_entries,
                    free_entries = stats.free_entries,
                    "Storage stats"
                );
                Some(stats)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to get storage stats");
                None
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the underlying engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the logging span
    pub fn span(&self) -> &Span {
        &self.span
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Initialize the engine, erasing and retrying once when it asks for it
    fn init_engine(&self) -> Result<()> {
        match self.engine.init() {
            Ok(()) => {}
            Err(e) if e.needs_erase() => {
                tracing::warn!(error = %e, "Storage needs erase, reinitializing");

                self.engine.erase().map_err(|erase_err| {
                    tracing::error!(error = %erase_err, "Failed to erase storage");
                    SlotError::EngineInitFailed(erase_err)
                })?;

                self.engine.init().map_err(|e| {
                    tracing::error!(error = %e, "Storage initialization failed after erase");
                    SlotError::EngineInitFailed(e)
                })?;
            }
            Err(e) => {
                tracing::error!(error = %e, "Storage initialization failed");
                return Err(SlotError::EngineInitFailed(e));
            }
        }

        tracing::info!("Storage initialized successfully");
        Ok(())
    }

    fn open_session(&self, namespace: &str) -> Result<SessionGuard<'_>> {
        self.engine
            .open_session(namespace, OpenMode::ReadWrite)
            .map(|session| SessionGuard { session })
            .map_err(|e| {
                tracing::error!(namespace = %namespace, error = %e, "Failed to open session");
                SlotError::SessionOpenFailed {
                    namespace: namespace.to_string(),
                    source: e,
                }
            })
    }

    fn read_error(key: &str, e: EngineError) -> SlotError {
        match e {
            EngineError::NotFound => {
                tracing::error!(key = %key, "Key not found");
                SlotError::KeyNotFound(key.to_string())
            }
            e => {
                tracing::error!(key = %key, error = %e, "Failed to read string");
                SlotError::ReadFailed(e)
            }
        }
    }
}

// =============================================================================
// Session Guard
// =============================================================================

/// Closes the wrapped session when dropped; a failed close is only logged
struct SessionGuard<'a> {
    session: Box<dyn Session + 'a>,
}

impl<'a> Deref for SessionGuard<'a> {
    type Target = dyn Session + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.session
    }
}

impl<'a> DerefMut for SessionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.session.close() {
            tracing::error!(
                namespace = %self.session.namespace(),
                error = %e,
                "Failed to close session"
            );
        }
    }
}
