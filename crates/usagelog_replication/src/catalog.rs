//! Natural-key catalogs and device-to-server identifier maps.

use crate::error::{EntityKind, ReplicationError, ReplicationResult};
use std::collections::HashMap;
use std::hash::Hash;

/// A case-insensitive name key.
///
/// Names fold with Unicode lower-casing, which merges every pair SQLite's
/// `NOCASE` collation merges (and more), so two distinct keys never collide
/// on the server's unique index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameKey(String);

impl NameKey {
    /// Folds a name into its key.
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    /// Returns the folded form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A feature's natural key: its name within a server context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    /// Server-side context id.
    pub context_id: i64,
    /// Folded feature name.
    pub name: NameKey,
}

impl FeatureKey {
    /// Creates a feature key.
    pub fn new(context_id: i64, name: &str) -> Self {
        Self {
            context_id,
            name: NameKey::new(name),
        }
    }
}

/// Server rows of one reference kind, keyed by natural key.
///
/// Loaded once per run and extended as the run creates rows, so repeated
/// keys within one payload resolve to the row created first.
#[derive(Debug, Clone)]
pub struct Catalog<K> {
    ids: HashMap<K, i64>,
}

impl<K: Eq + Hash> Catalog<K> {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
        }
    }

    /// Builds a catalog from `(key, server id)` pairs. When two rows share a
    /// key, the first one wins.
    pub fn from_rows(rows: impl IntoIterator<Item = (K, i64)>) -> Self {
        let mut catalog = Self::new();
        for (key, id) in rows {
            catalog.insert(key, id);
        }
        catalog
    }

    /// Looks up the server id for a key.
    pub fn get(&self, key: &K) -> Option<i64> {
        self.ids.get(key).copied()
    }

    /// Records a server id for a key unless the key is already known.
    ///
    /// Returns true if the key was new.
    pub fn insert(&mut self, key: K, id: i64) -> bool {
        match self.ids.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        }
    }

    /// Returns the number of known keys.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no key is known.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<K: Eq + Hash> Default for Catalog<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Device-local ids of one kind mapped to server ids.
#[derive(Debug, Clone)]
pub struct IdMap {
    kind: EntityKind,
    ids: HashMap<i64, i64>,
}

impl IdMap {
    /// Creates an empty map for one kind.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            ids: HashMap::new(),
        }
    }

    /// Returns the kind this map translates.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Maps a device id. A device id that is already mapped keeps its
    /// first server id.
    pub fn insert(&mut self, device_id: i64, server_id: i64) {
        self.ids.entry(device_id).or_insert(server_id);
    }

    /// Returns the server id for a device id, if mapped.
    pub fn get(&self, device_id: i64) -> Option<i64> {
        self.ids.get(&device_id).copied()
    }

    /// Translates a device id.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::UnresolvedReference`] if the device id
    /// was never mapped.
    pub fn resolve(&self, device_id: i64) -> ReplicationResult<i64> {
        self.get(device_id)
            .ok_or_else(|| ReplicationError::unresolved(self.kind, device_id))
    }

    /// Returns the number of mapped device ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
