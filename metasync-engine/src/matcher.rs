//! Cross-store record matching by handle.

use metasync_types::Instance;
use std::collections::HashMap;

/// Records of one type keyed by handle.
#[derive(Debug, Clone, Default)]
pub struct HandleIndex {
    entries: HashMap<String, Instance>,
}

impl HandleIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: String, instance: Instance) {
        self.entries.insert(key, instance);
    }

    fn get(&self, key: &str) -> Option<&Instance> {
        self.entries.get(key)
    }
}

/// Matches source records to target records by handle equality.
///
/// With normalization on, handles are trimmed and lowercased on both sides.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityMatcher {
    normalize: bool,
}

impl EntityMatcher {
    pub fn new(normalize: bool) -> Self {
        Self { normalize }
    }

    fn key(&self, handle: &str) -> Option<String> {
        let key = if self.normalize {
            handle.trim().to_lowercase()
        } else {
            handle.to_string()
        };
        (!key.is_empty()).then_some(key)
    }

    /// Indexes `instances` by handle. Records without a handle are left out;
    /// a repeated handle keeps the last record.
    pub fn build_index(&self, instances: impl IntoIterator<Item = Instance>) -> HandleIndex {
        let mut index = HandleIndex::default();
        for instance in instances {
            self.add(&mut index, instance);
        }
        index
    }

    /// Adds or replaces one record.
    pub fn add(&self, index: &mut HandleIndex, instance: Instance) {
        if let Some(key) = instance.handle().and_then(|h| self.key(h)) {
            index.insert(key, instance);
        }
    }

    /// The target counterpart of `instance`, if any.
    pub fn find<'a>(&self, instance: &Instance, index: &'a HandleIndex) -> Option<&'a Instance> {
        instance.handle().and_then(|h| self.find_handle(h, index))
    }

    pub fn find_handle<'a>(&self, handle: &str, index: &'a HandleIndex) -> Option<&'a Instance> {
        self.key(handle).and_then(|key| index.get(&key))
    }

    /// True when two handles identify the same record under this matcher.
    pub fn same_handle(&self, a: &str, b: &str) -> bool {
        matches!((self.key(a), self.key(b)), (Some(a), Some(b)) if a == b)
    }
}
