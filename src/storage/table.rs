//! Entry table
//!
//! Insertion-ordered list of live string entries, shared by the bundled engines.
//! Order follows first write, the way entries land in flash pages: overwriting a
//! key keeps its position, erasing removes it.

use super::entry::{EntryInfo, EntryType};

/// A live entry held by the table
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredEntry {
    namespace: String,
    key: String,
    value: String,
}

/// Live entries of one partition in write order
#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    entries: Vec<StoredEntry>,
}

impl EntryTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored under (namespace, key)
    pub fn get(&self, namespace: &str, key: &str) -> Option<&str> {
        self.position(namespace, key)
            .map(|idx| self.entries[idx].value.as_str())
    }

    /// Check whether (namespace, key) holds a value
    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        self.position(namespace, key).is_some()
    }

    /// Insert or overwrite a value
    ///
    /// Returns true when the key is new to the table.
    pub fn set(&mut self, namespace: &str, key: &str, value: &str) -> bool {
        match self.position(namespace, key) {
            Some(idx) => {
                self.entries[idx].value = value.to_string();
                false
            }
            None => {
                self.entries.push(StoredEntry {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                });
                true
            }
        }
    }

    /// Remove (namespace, key), returning whether it existed
    pub fn remove(&mut self, namespace: &str, key: &str) -> bool {
        match self.position(namespace, key) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry lives in `namespace`
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.entries.iter().any(|e| e.namespace == namespace)
    }

    /// Number of distinct namespaces with at least one entry
    pub fn namespace_count(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.namespace.as_str()) {
                seen.push(&entry.namespace);
            }
        }
        seen.len()
    }

    /// Snapshot entry metadata in table order, optionally limited to one namespace
    pub fn infos(&self, namespace: Option<&str>) -> Vec<EntryInfo> {
        self.entries
            .iter()
            .filter(|e| namespace.map_or(true, |ns| e.namespace == ns))
            .map(|e| EntryInfo {
                namespace: e.namespace.clone(),
                key: e.key.clone(),
                entry_type: EntryType::Str,
            })
            .collect()
    }

    /// Iterate (namespace, key, value) triples in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> + '_ {
        self.entries
            .iter()
            .map(|e| (e.namespace.as_str(), e.key.as_str(), e.value.as_str()))
    }

    fn position(&self, namespace: &str, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.namespace == namespace && e.key == key)
    }
}
