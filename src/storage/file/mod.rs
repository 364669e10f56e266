//! File Engine Module
//!
//! Persistent engine keeping one append-only log per partition.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (6 bytes)                                        │
//! │   Magic: "FSLT" (4) | Version: u16 LE (2)               │
//! ├─────────────────────────────────────────────────────────┤
//! │ Record                                                  │
//! │   [Len: u32 LE][CRC32: u32 LE][bincode payload]         │
//! │   ... repeated, one per committed set/erase ...         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Replay stops at the first torn or corrupt record and truncates the file
//! there. Obsolete records are compacted away on init.

mod engine;
mod record;

pub use engine::FileEngine;
pub use record::Record;

/// Magic bytes identifying a flashslot partition log
pub const MAGIC: &[u8; 4] = b"FSLT";

/// Current log format version
pub const FORMAT_VERSION: u16 = 1;

/// File extension of partition logs
pub const LOG_EXTENSION: &str = "fsl";

/// Header size: Magic (4) + Version (2) = 6 bytes
pub(crate) const HEADER_SIZE: usize = 6;

/// Record header size: Len (4) + CRC (4) = 8 bytes
pub(crate) const RECORD_HEADER_SIZE: usize = 8;

/// Upper bound on a record payload; anything larger is treated as corruption
pub(crate) const MAX_RECORD_SIZE: usize = 64 * 1024;
