//! Slot Handle
//!
//! A handle binds a (namespace, key) pair to a value buffer allocated once at
//! creation. The buffer never grows: reads that need more than `capacity`
//! bytes are refused by the manager instead.

use std::fmt;

use bytes::BytesMut;

use crate::config::HandleConfig;

/// One slot: namespace, mutable key, fixed-capacity value buffer
///
/// Created by [`SlotManager::create`](crate::SlotManager::create) and released
/// by [`SlotManager::destroy`](crate::SlotManager::destroy), which takes the
/// handle by value.
pub struct SlotHandle {
    /// Namespace the slot lives in (immutable)
    namespace: String,

    /// Current key within the namespace
    key: String,

    /// Value buffer, exactly `capacity` bytes long
    buffer: BytesMut,

    /// Bytes of `buffer` holding the last value read
    length: usize,

    /// Size of `buffer`, fixed at creation
    capacity: usize,
}

impl SlotHandle {
    /// Allocate the buffer and copy the names out of a validated config
    pub(crate) fn new(config: HandleConfig) -> Self {
        Self {
            namespace: config.namespace,
            key: config.key,
            buffer: BytesMut::zeroed(config.capacity),
            length: config.capacity,
            capacity: config.capacity,
        }
    }

    /// Namespace the slot lives in
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Current key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Buffer size fixed at creation
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Logical size of the data in the buffer
    ///
    /// Equals `capacity` until a read completes.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether `len()` is zero
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The whole buffer, `capacity` bytes
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The first `len()` bytes of the buffer
    ///
    /// Holds a value only after a successful read. A failed read leaves
    /// `len()` at `capacity`, so this returns the whole buffer: stale bytes
    /// from earlier reads plus zero padding.
    pub fn value(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    // =========================================================================
    // Manager-only Mutators
    // =========================================================================

    pub(crate) fn set_key(&mut self, key: String) {
        self.key = key;
    }

    /// Let the next read probe with the full capacity
    pub(crate) fn reset_length(&mut self) {
        self.length = self.capacity;
    }

    pub(crate) fn set_length(&mut self, length: usize) {
        debug_assert!(length <= self.capacity);
        self.length = length.min(self.capacity);
    }

    /// Key and the writable part of the buffer, borrowed together for a read
    pub(crate) fn read_target(&mut self) -> (&str, &mut [u8]) {
        (&self.key, &mut self.buffer[..self.length])
    }
}

impl fmt::Debug for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotHandle")
            .field("namespace", &self.namespace)
            .field("key", &self.key)
            .field("length", &self.length)
            .field("capacity", &self.capacity)
            .finish()
    }
}
