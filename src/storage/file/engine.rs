//! File Engine
//!
//! Serves one partition from `{data_dir}/{partition}.fsl`.
//!
//! ## Write Path
//! Session writes land in the in-memory table at once and are staged as
//! records; `commit` appends the staged records and syncs the file. A session
//! closed with staged records drops them: the values stay visible until the
//! next restart but are not durable.
//!
//! Bytes past the last committed record (a failed append) are cut off before
//! the next append, so later commits never land behind a torn frame.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::EngineError;
use crate::storage::{
    validate_name, EngineStats, EntryInfo, EntryIter, EntryTable, EntryType, OpenMode, Session,
    StorageEngine, MAX_STRING_LEN,
};

use super::record::Record;
use super::{FORMAT_VERSION, HEADER_SIZE, LOG_EXTENSION, MAGIC};

/// Open log and replayed entries
#[derive(Default)]
struct FileState {
    /// Append handle; `Some` once initialized
    log: Option<File>,

    /// Live entries replayed from the log plus uncommitted session writes
    table: EntryTable,

    /// Log length after the last successful commit
    log_len: u64,
}

/// Persistent storage engine backed by an append-only log
///
/// ## Concurrency:
/// - `state`: RwLock (reads shared, set/erase/commit exclusive)
/// - All methods use `&self`
pub struct FileEngine {
    /// Path of the partition log
    path: PathBuf,

    /// Partition label
    partition: String,

    /// Live entry limit
    max_entries: usize,

    state: RwLock<FileState>,
}

impl FileEngine {
    /// Create an engine for the partition described by `config`
    ///
    /// Creates the data directory; the log itself is opened by `init`.
    pub fn open(config: &Config) -> Result<Self, EngineError> {
        fs::create_dir_all(&config.data_dir)?;

        let path = config
            .data_dir
            .join(format!("{}.{}", config.partition, LOG_EXTENSION));

        Ok(Self {
            path,
            partition: config.partition.clone(),
            max_entries: config.max_entries,
            state: RwLock::new(FileState::default()),
        })
    }

    /// Path of the partition log
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `init` has succeeded since creation or the last erase
    pub fn is_initialized(&self) -> bool {
        self.state.read().log.is_some()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Write a fresh header-only log
    fn create_log(&self) -> Result<File, EngineError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;

        file.write_all(&Self::header())?;
        file.sync_all()?;

        self.open_append()
    }

    fn header() -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(MAGIC);
        header[4..].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        header
    }

    /// A log cut short while its header was being written
    fn is_torn_header(bytes: &[u8]) -> bool {
        bytes.len() < HEADER_SIZE && Self::header().starts_with(bytes)
    }

    fn open_append(&self) -> Result<File, EngineError> {
        Ok(OpenOptions::new().read(true).append(true).open(&self.path)?)
    }

    /// Replay the log into a table
    ///
    /// Returns the table, the number of records replayed and the offset of the
    /// first byte past the last valid record.
    fn replay(bytes: &[u8]) -> Result<(EntryTable, usize, usize), EngineError> {
        if bytes.len() < HEADER_SIZE {
            return Err(EngineError::Corrupted(format!(
                "log header truncated: {} bytes",
                bytes.len()
            )));
        }

        if &bytes[0..4] != MAGIC {
            return Err(EngineError::Corrupted(format!(
                "invalid log magic: expected FSLT, got {:?}",
                &bytes[0..4]
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version > FORMAT_VERSION {
            return Err(EngineError::NewVersionFound { found: version });
        }
        if version != FORMAT_VERSION {
            return Err(EngineError::Corrupted(format!(
                "unsupported log version: {}",
                version
            )));
        }

        let mut table = EntryTable::new();
        let mut records = 0;
        let mut pos = HEADER_SIZE;

        while pos < bytes.len() {
            match Record::decode(&bytes[pos..]) {
                Ok(Some((record, consumed))) => {
                    record.apply(&mut table);
                    records += 1;
                    pos += consumed;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        offset = pos,
                        error = %e,
                        "Stopping log replay at corrupt record"
                    );
                    break;
                }
            }
        }

        Ok((table, records, pos))
    }

    /// Rewrite the log with one record per live entry
    fn compact(&self, table: &EntryTable) -> Result<File, EngineError> {
        let tmp_path = self.path.with_extension(format!("{}.tmp", LOG_EXTENSION));

        {
            let mut tmp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;

            let mut buf = Self::header().to_vec();
            for (namespace, key, value) in table.iter() {
                let record = Record::Set {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                };
                buf.extend_from_slice(&record.encode()?);
            }

            tmp.write_all(&buf)?;
            tmp.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        self.open_append()
    }

    fn check_partition(&self, partition: &str) -> Result<(), EngineError> {
        if partition != self.partition {
            return Err(EngineError::PartitionNotFound(partition.to_string()));
        }
        Ok(())
    }
}

impl StorageEngine for FileEngine {
    fn partition(&self) -> &str {
        &self.partition
    }

    /// Open the log, replaying it when present
    ///
    /// On startup:
    /// 1. Missing or empty log → write a fresh header
    /// 2. Validate magic and version (newer version → `NewVersionFound`)
    /// 3. Replay records, truncating a torn tail
    /// 4. More live entries than the partition holds → `NoFreePages`
    /// 5. Compact if the log carries obsolete records
    fn init(&self) -> Result<(), EngineError> {
        let mut state = self.state.write();
        if state.log.is_some() {
            return Ok(());
        }

        let existing = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() > 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::new();
        if existing {
            File::open(&self.path)?.read_to_end(&mut bytes)?;
        }

        if bytes.is_empty() || Self::is_torn_header(&bytes) {
            if !bytes.is_empty() {
                tracing::warn!(len = bytes.len(), "Rewriting torn log header");
            }
            state.log = Some(self.create_log()?);
            state.table.clear();
            state.log_len = HEADER_SIZE as u64;
            tracing::debug!(path = %self.path.display(), "Created partition log");
            return Ok(());
        }

        let (table, records, valid_len) = Self::replay(&bytes)?;

        if table.len() > self.max_entries {
            return Err(EngineError::NoFreePages);
        }

        let log = if records > table.len() || valid_len < bytes.len() {
            tracing::debug!(
                records,
                live = table.len(),
                torn_bytes = bytes.len() - valid_len,
                "Compacting partition log"
            );
            self.compact(&table)?
        } else {
            self.open_append()?
        };
        let log_len = log.metadata()?.len();

        tracing::debug!(
            path = %self.path.display(),
            entries = table.len(),
            "Replayed partition log"
        );
        state.table = table;
        state.log = Some(log);
        state.log_len = log_len;
        Ok(())
    }

    fn erase(&self) -> Result<(), EngineError> {
        let mut state = self.state.write();
        state.log = None;
        state.table.clear();

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn open_session(
        &self,
        namespace: &str,
        mode: OpenMode,
    ) -> Result<Box<dyn Session + '_>, EngineError> {
        validate_name("namespace", namespace)?;

        {
            let state = self.state.read();
            if state.log.is_none() {
                return Err(EngineError::NotInitialized);
            }
            if mode == OpenMode::ReadOnly && !state.table.has_namespace(namespace) {
                return Err(EngineError::NotFound);
            }
        }

        Ok(Box::new(FileSession {
            engine: self,
            namespace: namespace.to_string(),
            mode,
            pending: Vec::new(),
            closed: false,
        }))
    }

    fn entries(
        &self,
        partition: &str,
        namespace: Option<&str>,
        entry_type: Option<EntryType>,
    ) -> Result<EntryIter<'_>, EngineError> {
        self.check_partition(partition)?;

        let state = self.state.read();
        if state.log.is_none() {
            return Err(EngineError::NotInitialized);
        }

        let items: Vec<EntryInfo> = state
            .table
            .infos(namespace)
            .into_iter()
            .filter(|info| entry_type.map_or(true, |t| info.entry_type == t))
            .collect();

        Ok(Box::new(items.into_iter().map(Ok)))
    }

    fn stats(&self, partition: &str) -> Result<EngineStats, EngineError> {
        self.check_partition(partition)?;

        let state = self.state.read();
        if state.log.is_none() {
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

/// Session over a [`FileEngine`] namespace
struct FileSession<'a> {
    engine: &'a FileEngine,
    namespace: String,
    mode: OpenMode,
    /// Records staged for the next commit
    pending: Vec<Record>,
    closed: bool,
}

impl FileSession<'_> {
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

impl Session for FileSession<'_> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get_string_size(&self, key: &str) -> Result<usize, EngineError> {
        self.ensure_open()?;
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

        self.pending.push(Record::Set {
            namespace: self.namespace.clone(),
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn erase_key(&mut self, key: &str) -> Result<(), EngineError> {
        self.ensure_writable()?;
        validate_name("key", key)?;

        if !self.engine.state.write().table.remove(&self.namespace, key) {
            return Err(EngineError::NotFound);
        }

        self.pending.push(Record::Erase {
            namespace: self.namespace.clone(),
            key: key.to_string(),
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        self.ensure_open()?;
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in &self.pending {
            buf.extend_from_slice(&record.encode()?);
        }

        let mut state = self.engine.state.write();
        let committed = state.log_len;
        let log = state.log.as_mut().ok_or(EngineError::NotInitialized)?;

        let actual = log.metadata()?.len();
        if actual < committed {
            return Err(EngineError::Corrupted(format!(
                "log shrank to {} bytes, last commit ended at {}",
                actual, committed
            )));
        }
        if actual > committed {
            tracing::warn!(
                committed,
                stray_bytes = actual - committed,
                "Cutting off bytes past the last commit"
            );
            log.set_len(committed)?;
        }

        if let Err(e) = log.write_all(&buf).and_then(|()| log.sync_data()) {
            if let Err(undo) = log.set_len(committed) {
                tracing::error!(error = %undo, "Failed to cut off partial append");
            }
            return Err(e.into());
        }

        state.log_len = committed + buf.len() as u64;
        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if !self.pending.is_empty() {
            tracing::warn!(
                namespace = %self.namespace,
                pending = self.pending.len(),
                "Closing session with uncommitted writes"
            );
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for FileSession<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
