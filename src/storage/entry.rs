//! Entry metadata shared by every engine
//!
//! Names, entry types and the stats snapshot exchanged over the engine contract.

use crate::error::EngineError;

/// Max length of a namespace or key name in bytes (16 on flash, including NUL)
pub const MAX_NAME_LEN: usize = 15;

/// Max length of a stored string value in bytes
pub const MAX_STRING_LEN: usize = 4000;

/// Type tag of a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EntryType {
    /// UTF-8 string value
    Str,
}

/// Metadata yielded by the entry iterator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Namespace the entry belongs to
    pub namespace: String,

    /// Key of the entry within its namespace
    pub key: String,

    /// Stored value type
    pub entry_type: EntryType,
}

/// Access mode of a namespace session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Partition-wide usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Distinct namespaces holding at least one entry
    pub namespace_count: usize,

    /// Live entries
    pub used_entries: usize,

    /// Entry capacity of the partition
    pub total_entries: usize,

    /// Entries still available for new keys
    pub free_entries: usize,
}

/// Check a namespace or key name against the engine's naming rules
///
/// Names must be non-empty, at most [`MAX_NAME_LEN`] bytes, and free of NUL bytes.
pub fn validate_name(kind: &str, name: &str) -> Result<(), EngineError> {
    if name.is_empty() {
        return Err(EngineError::InvalidName(format!("{} is empty", kind)));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::InvalidName(format!(
            "{} '{}' is {} bytes (max {})",
            kind,
            name,
            name.len(),
            MAX_NAME_LEN
        )));
    }

    if name.contains('\0') {
        return Err(EngineError::InvalidName(format!("{} contains a NUL byte", kind)));
    }

    Ok(())
}
