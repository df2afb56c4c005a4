use gtfs_structures::{EntityKey, EntityKind, ResolveKey};
use rustc_hash::FxHashMap;

/// Identifiers given by the writer to the records of the source feed, per kind
///
/// The map only grows during a copy: a record is found only once it has been written.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntityMap {
    ids: FxHashMap<EntityKind, FxHashMap<EntityKey, String>>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the identifier of a freshly written record
    pub fn set(&mut self, kind: EntityKind, key: EntityKey, id: String) {
        let ids = self.ids.entry(kind).or_default();
        debug_assert!(
            !ids.contains_key(&key),
            "{} '{}' was written twice",
            kind,
            key
        );
        ids.insert(key, id);
    }

    pub fn get(&self, kind: EntityKind, key: &str) -> Option<&str> {
        self.ids
            .get(&kind)
            .and_then(|ids| ids.get(key))
            .map(String::as_str)
    }

    pub fn contains(&self, kind: EntityKind, key: &str) -> bool {
        self.get(kind, key).is_some()
    }

    /// Number of records of `kind` written so far
    pub fn len(&self, kind: EntityKind) -> usize {
        self.ids.get(&kind).map_or(0, |ids| ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.ids.values().all(|ids| ids.is_empty())
    }

    /// Source keys and identifiers of one kind, in no particular order
    pub fn iter(&self, kind: EntityKind) -> impl Iterator<Item = (&EntityKey, &str)> {
        self.ids
            .get(&kind)
            .into_iter()
            .flat_map(|ids| ids.iter().map(|(k, v)| (k, v.as_str())))
    }
}

impl ResolveKey for EntityMap {
    fn resolve(&self, kind: EntityKind, key: &str) -> Option<&str> {
        self.get(kind, key)
    }
}
