//! # flashslot
//!
//! Handle-based string slots over a namespaced key-value flash storage engine:
//! - One handle per (namespace, key) slot, with a value buffer sized once
//! - Reads bounded by that capacity (`BufferTooSmall`, never auto-grow)
//! - Keys re-pointable without touching the buffer
//! - De-duplicated, bounded listing of the namespaces in a partition
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Caller                                │
//! │          HandleConfig { namespace, key, capacity }           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    SlotManager                               │
//! │   create / write / read / erase / rekey / destroy            │
//! │   list_namespaces / stats                                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  one session per operation
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │MemoryEngine │          │ FileEngine  │
//!   │ (volatile)  │          │ (log file)  │
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use flashslot::{Config, HandleConfig, MemoryEngine, SlotManager};
//!
//! let manager = SlotManager::new(MemoryEngine::new(), Config::default());
//! let mut handle = manager.create(HandleConfig::new("storage", "key-1", 64)).unwrap();
//!
//! manager.write(&handle, "example_value").unwrap();
//! assert_eq!(manager.read(&mut handle).unwrap(), "example_value");
//!
//! manager.destroy(handle);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod handle;
pub mod manager;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EngineError, Result, SlotError};
pub use config::{Config, HandleConfig};
pub use handle::SlotHandle;
pub use manager::SlotManager;
pub use storage::{FileEngine, MemoryEngine, StorageEngine};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of flashslot
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
