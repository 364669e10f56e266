//! Memory Engine
//!
//! Volatile engine backed by an [`EntryTable`]. Besides serving as a scratch
//! store it exposes fault hooks and resource counters, so callers can drive
//! every failure path of the engine contract.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::EngineError;

use super::entry::{validate_name, EngineStats, EntryInfo, EntryType, OpenMode, MAX_STRING_LEN};
use super::table::EntryTable;
use super::{EntryIter, Session, StorageEngine};

/// Contract calls a fault can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Init,
    Erase,
    Open,
    GetSize,
    Get,
    Set,
    EraseKey,
    Commit,
    Close,
    Entries,
    EntryNext,
    Stats,
}

/// Mutable engine state
#[derive(Debug, Default)]
struct MemoryState {
    initialized: bool,
    table: EntryTable,
}

/// In-memory storage engine
///
/// ## Concurrency:
/// - `state`: RwLock (sessions read concurrently, writers exclusive)
/// - `faults`: Mutex, held only while a fault is queued or taken
/// - counters: atomics
pub struct MemoryEngine {
    /// Partition label
    partition: String,

    /// Live entry limit
    max_entries: usize,

    /// Initialization flag and entries
    state: RwLock<MemoryState>,

    /// One-shot faults, consumed in FIFO order per point
    faults: Mutex<VecDeque<(FaultPoint, EngineError)>>,

    open_sessions: AtomicUsize,
    live_iterators: AtomicUsize,
    init_calls: AtomicUsize,
    erase_calls: AtomicUsize,
    commits: AtomicUsize,
}

impl MemoryEngine {
    /// Create an engine with the default partition and entry limit
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Create an engine using the partition and entry limit of `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            partition: config.partition.clone(),
            max_entries: config.max_entries,
            state: RwLock::new(MemoryState::default()),
            faults: Mutex::new(VecDeque::new()),
            open_sessions: AtomicUsize::new(0),
            live_iterators: AtomicUsize::new(0),
            init_calls: AtomicUsize::new(0),
            erase_calls: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
        }
    }

    // =========================================================================
    // Fault Injection
    // =========================================================================

    /// Make the next call at `point` fail with `error`
    ///
    /// Faults queue up: two faults at the same point fail the next two calls.
    pub fn fail_next(&self, point: FaultPoint, error: EngineError) {
        self.faults.lock().push_back((point, error));
    }

    /// Number of faults not yet triggered
    pub fn pending_faults(&self) -> usize {
        self.faults.lock().len()
    }

    fn take_fault(&self, point: FaultPoint) -> Result<(), EngineError> {
        let mut faults = self.faults.lock();
        match faults.iter().position(|(p, _)| *p == point) {
            Some(idx) => match faults.remove(idx) {
                Some((_, error)) => Err(error),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    // =========================================================================
    // Direct Access (seeding and inspection)
    // =========================================================================

    /// Store a value without opening a session; initializes the engine if needed
    pub fn insert(&self, namespace: &str, key: &str, value: &str) -> Result<(), EngineError> {
        validate_name("namespace", namespace)?;
        validate_name("key", key)?;

        let mut state = self.state.write();
        state.initialized = true;
        if !state.table.contains(namespace, key) && state.table.len() >= self.max_entries {
            return Err(EngineError::NotEnoughSpace);
        }
        state.table.set(namespace, key, value);
        Ok(())
    }

    /// Read a value without opening a session
    pub fn value(&self, namespace: &str, key: &str) -> Option<String> {
        self.state.read().table.get(namespace, key).map(str::to_string)
    }

    /// Whether `init` has succeeded since creation or the last erase
    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// Sessions currently open
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Entry iterators not yet released
    pub fn live_iterators(&self) -> usize {
        self.live_iterators.load(Ordering::SeqCst)
    }

    /// Calls made to `init`
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Calls made to `erase`
    pub fn erase_calls(&self) -> usize {
        self.erase_calls.load(Ordering::SeqCst)
    }

    /// Successful commits
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn check_partition(&self, partition: &str) -> Result<(), EngineError> {
        if partition != self.partition {
            return Err(EngineError::PartitionNotFound(partition.to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for MemoryEngine {
    fn partition(&self) -> &str {
        &self.partition
    }

    fn init(&self) -> Result<(), EngineError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.take_fault(FaultPoint::Init)?;
        self.state.write().initialized = true;
        Ok(())
    }

    fn erase(&self) -> Result<(), EngineError> {
        self.erase_calls.fetch_add(1, Ordering::SeqCst);
        self.take_fault(FaultPoint::Erase)?;

        let mut state = self.state.write();
        state.table.clear();
        state.initialized = false;
        Ok(())
    }

    fn open_session(
        &self,
        namespace: &str,
        mode: OpenMode,
    ) -> Result<Box<dyn Session + '_>, EngineError> {
        self.take_fault(FaultPoint::Open)?;
        validate_name("namespace", namespace)?;

        {
            let state = self.state.read();
            if !state.initialized {
                return Err(EngineError::NotInitialized);
            }
            if mode == OpenMode::ReadOnly && !state.table.has_namespace(namespace) {
                return Err(EngineError::NotFound);
            }
        }

        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            engine: self,
            namespace: namespace.to_string(),
            mode,
            closed: false,
        }))
    }

    fn entries(
        &self,
        partition: &str,
        namespace: Option<&str>,
        entry_type: Option<EntryType>,
    ) -> Result<EntryIter<'_>, EngineError> {
        self.take_fault(FaultPoint::Entries)?;
        self.check_partition(partition)?;

        let items: Vec<EntryInfo> = {
            let state = self.state.read();
            if !state.initialized {
                return Err(EngineError::NotInitialized);
            }
            state
                .table
                .infos(namespace)
                .into_iter()
                .filter(|info| entry_type.map_or(true, |t| info.entry_type == t))
                .collect()
        };

        self.live_iterators.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryEntryIter {
            engine: self,
            items: items.into_iter(),
            done: false,
        }))
    }

    fn stats(&self, partition: &str) -> Result<EngineStats, EngineError> {
        self.take_fault(FaultPoint::Stats)?;
        self.check_partition(partition)?;

        let state = self.state.read();
        if !state.initialized {
            return Err(EngineError::NotInitialized);
        }

        let used = state.table.len();
        Ok(EngineStats {
            namespace_count: state.table.namespace_count(),
            used_entries: used,
            total_entries: self.max_entries,
            free_entries: self.max_entries.saturating_sub(used),
        })
    }
}

// =============================================================================
// Session
// =============================================================================

/// Session over a [`MemoryEngine`] namespace; writes are visible immediately
struct MemorySession<'a> {
    engine: &'a MemoryEngine,
    namespace: String,
    mode: OpenMode,
    closed: bool,
}

impl MemorySession<'_> {
    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::SessionClosed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), EngineError> {
        self.ensure_open()?;
        if self.mode == OpenMode::ReadOnly {
            return Err(EngineError::ReadOnly);
        }
        Ok(())
    }
}

impl Session for MemorySession<'_> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get_string_size(&self, key: &str) -> Result<usize, EngineError> {
        self.ensure_open()?;
        self.engine.take_fault(FaultPoint::GetSize)?;
        validate_name("key", key)?;

        self.engine
            .state
            .read()
            .table
            .get(&self.namespace, key)
            .map(str::len)
            .ok_or(EngineError::NotFound)
    }

    fn get_string(&self, key: &str, out: &mut [u8]) -> Result<usize, EngineError> {
        self.ensure_open()?;
        self.engine.take_fault(FaultPoint::Get)?;
        validate_name("key", key)?;

        let state = self.engine.state.read();
        let value = state
            .table
            .get(&self.namespace, key)
            .ok_or(EngineError::NotFound)?;

        if value.len() > out.len() {
            return Err(EngineError::InvalidLength {
                required: value.len(),
                available: out.len(),
            });
        }

        out[..value.len()].copy_from_slice(value.as_bytes());
        Ok(value.len())
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), EngineError> {
        self.ensure_writable()?;
        self.engine.take_fault(FaultPoint::Set)?;
        validate_name("key", key)?;

        if value.len() > MAX_STRING_LEN {
            return Err(EngineError::ValueTooLong {
                len: value.len(),
                max: MAX_STRING_LEN,
            });
        }

        let mut state = self.engine.state.write();
        if !state.table.contains(&self.namespace, key)
            && state.table.len() >= self.engine.max_entries
        {
            return Err(EngineError::NotEnoughSpace);
        }
        state.table.set(&self.namespace, key, value);
        Ok(())
    }

    fn erase_key(&mut self, key: &str) -> Result<(), EngineError> {
        self.ensure_writable()?;
        self.engine.take_fault(FaultPoint::EraseKey)?;
        validate_name("key", key)?;

        if self.engine.state.write().table.remove(&self.namespace, key) {
            Ok(())
        } else {
            Err(EngineError::NotFound)
        }
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.engine.take_fault(FaultPoint::Commit)?;
        self.engine.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.engine.open_sessions.fetch_sub(1, Ordering::SeqCst);
        self.engine.take_fault(FaultPoint::Close)
    }
}

impl Drop for MemorySession<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// =============================================================================
// Entry Iterator
// =============================================================================

/// Snapshot iterator; counts as live until dropped
struct MemoryEntryIter<'a> {
    engine: &'a MemoryEngine,
    items: std::vec::IntoIter<EntryInfo>,
    done: bool,
}

impl Iterator for MemoryEntryIter<'_> {
    type Item = Result<EntryInfo, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Err(e) = self.engine.take_fault(FaultPoint::EntryNext) {
            self.done = true;
            return Some(Err(e));
        }

        let item = self.items.next();
        if item.is_none() {
            self.done = true;
        }
        item.map(Ok)
    }
}

impl Drop for MemoryEntryIter<'_> {
    fn drop(&mut self) {
        self.engine.live_iterators.fetch_sub(1, Ordering::SeqCst);
    }
}
