//! Run-scoped mapping from source-account entity ids to the ids the
//! destination account assigned when the entity was recreated there.
//!
//! The table is built incrementally as each step migrates its entity type
//! and consulted by later steps that reference earlier entities. Nothing
//! is persisted across runs.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// The entity categories whose ids get remapped between accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Tenant,
    Category,
    Permission,
    Role,
    User,
    Group,
    Application,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Tenant => "tenant",
            EntityKind::Category => "category",
            EntityKind::Permission => "permission",
            EntityKind::Role => "role",
            EntityKind::User => "user",
            EntityKind::Group => "group",
            EntityKind::Application => "application",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RemapError {
    #[error("no destination {kind} recorded for source id '{source_id}'")]
    NotFound {
        kind: EntityKind,
        source_id: String,
    },
}

/// Mapping from (entity kind, source id) to destination id.
#[derive(Debug, Default)]
pub struct RemapTable {
    entries: HashMap<(EntityKind, String), String>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a source → destination pair. Recording the same source id
    /// again replaces the previous destination id, so a source id maps to
    /// at most one destination id at any time.
    pub fn record(&mut self, kind: EntityKind, source_id: &str, dest_id: &str) {
        self.entries
            .insert((kind, source_id.to_string()), dest_id.to_string());
    }

    /// Destination id for a source entity. A miss is the caller's signal
    /// to log and skip the dependent entity; it is never a panic.
    pub fn lookup(&self, kind: EntityKind, source_id: &str) -> Result<&str, RemapError> {
        self.entries
            .get(&(kind, source_id.to_string()))
            .map(|s| s.as_str())
            .ok_or_else(|| RemapError::NotFound {
                kind,
                source_id: source_id.to_string(),
            })
    }

    pub fn contains(&self, kind: EntityKind, source_id: &str) -> bool {
        self.entries.contains_key(&(kind, source_id.to_string()))
    }

    /// Number of recorded pairs for one entity kind.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.entries.keys().filter(|(k, _)| *k == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate (source id, destination id) pairs of one kind, for
    /// end-of-step reporting.
    pub fn iter_kind(&self, kind: EntityKind) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(move |((k, _), _)| *k == kind)
            .map(|((_, source), dest)| (source.as_str(), dest.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_lookup() {
        let mut table = RemapTable::new();
        table.record(EntityKind::Permission, "src-1", "dst-1");

        assert_eq!(table.lookup(EntityKind::Permission, "src-1").unwrap(), "dst-1");
        assert!(table.contains(EntityKind::Permission, "src-1"));
        assert_eq!(table.len(EntityKind::Permission), 1);
    }

    #[test]
    fn test_lookup_miss_is_an_error_not_a_panic() {
        let table = RemapTable::new();
        let err = table.lookup(EntityKind::Role, "ghost").unwrap_err();
        match err {
            RemapError::NotFound { kind, source_id } => {
                assert_eq!(kind, EntityKind::Role);
                assert_eq!(source_id, "ghost");
            }
        }
    }

    #[test]
    fn test_kinds_are_disjoint() {
        let mut table = RemapTable::new();
        table.record(EntityKind::Role, "id-1", "dst-role");
        table.record(EntityKind::Permission, "id-1", "dst-perm");

        assert_eq!(table.lookup(EntityKind::Role, "id-1").unwrap(), "dst-role");
        assert_eq!(
            table.lookup(EntityKind::Permission, "id-1").unwrap(),
            "dst-perm"
        );
        assert!(table.lookup(EntityKind::Tenant, "id-1").is_err());
    }

    #[test]
    fn test_source_id_appears_exactly_once_after_re_record() {
        let mut table = RemapTable::new();
        table.record(EntityKind::User, "u-1", "dst-a");
        table.record(EntityKind::User, "u-1", "dst-b");

        let pairs: Vec<_> = table.iter_kind(EntityKind::User).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0], ("u-1", "dst-b"));
        assert_eq!(table.len(EntityKind::User), 1);
    }
}
