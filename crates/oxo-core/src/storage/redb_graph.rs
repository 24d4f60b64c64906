//! # redb-backed Graph Storage
//!
//! A disk-backed graph store using the redb embedded database, providing:
//! - ACID transactions: every merge batch and every delete batch is one
//!   write transaction, committed or not at all
//! - Crash safety (copy-on-write B-trees), so an interrupted load or wipe
//!   can simply be re-run
//! - A single writer per database file
//!
//! Nodes and mapping edges are stored as postcard-encoded records; source
//! links are bare `(curie, prefix)` keys.

use crate::graph::{GraphStore, apply_datasource_merge, apply_term_merge, check_key};
use crate::{
    Datasource, DatasourceMerge, EntityKind, Mapping, MappingKey, MergeStats, OxoError,
    SourceLink, Term, UniqueConstraint,
};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use std::collections::BTreeSet;
use std::path::Path;

/// Table for constraints: constraint name -> creation sequence
const CONSTRAINTS: TableDefinition<&str, u64> = TableDefinition::new("constraints");

/// Table for datasources: prefix -> serialized Datasource
const DATASOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("datasources");

/// Table for terms: curie -> serialized Term
const TERMS: TableDefinition<&str, &[u8]> = TableDefinition::new("terms");

/// Table for source links: (curie, prefix) -> marker
const SOURCE_LINKS: TableDefinition<(&str, &str), u8> = TableDefinition::new("source_links");

/// Table for mappings: serialized MappingKey -> serialized match string
const MAPPINGS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("mappings");

fn storage_err(e: impl std::fmt::Display) -> OxoError {
    OxoError::IoError(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, OxoError> {
    postcard::to_allocvec(value).map_err(|e| OxoError::SerializationError(e.to_string()))
}

fn decode<'a, T: serde::Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, OxoError> {
    postcard::from_bytes(bytes).map_err(|e| OxoError::SerializationError(e.to_string()))
}

/// A disk-backed graph store using redb.
pub struct RedbGraph {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph").finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a graph database at the given path.
    ///
    /// Returns `OxoError::Connectivity` if the file cannot be opened, for
    /// example because another process holds it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OxoError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(|e| {
            OxoError::Connectivity(format!("cannot open store {}: {}", path.display(), e))
        })?;

        // Initialize tables if they don't exist
        let write_txn = db.begin_write().map_err(storage_err)?;
        let _ = write_txn.open_table(CONSTRAINTS).map_err(storage_err)?;
        let _ = write_txn.open_table(DATASOURCES).map_err(storage_err)?;
        let _ = write_txn.open_table(TERMS).map_err(storage_err)?;
        let _ = write_txn.open_table(SOURCE_LINKS).map_err(storage_err)?;
        let _ = write_txn.open_table(MAPPINGS).map_err(storage_err)?;
        write_txn.commit().map_err(storage_err)?;

        Ok(Self { db })
    }

    /// Run `f` inside one write transaction and commit its result.
    fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, OxoError>,
    ) -> Result<T, OxoError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let value = f(&write_txn)?;
        write_txn.commit().map_err(storage_err)?;
        Ok(value)
    }

    /// Collect up to `limit` keys of a string-keyed table.
    fn first_keys(
        write_txn: &WriteTransaction,
        table: TableDefinition<&str, &[u8]>,
        limit: usize,
    ) -> Result<BTreeSet<String>, OxoError> {
        let table = write_txn.open_table(table).map_err(storage_err)?;
        let mut keys = BTreeSet::new();
        for entry in table.iter().map_err(storage_err)?.take(limit) {
            let (key, _) = entry.map_err(storage_err)?;
            keys.insert(key.value().to_string());
        }
        Ok(keys)
    }

    /// Remove every source link matching `dead`.
    fn detach_source_links(
        write_txn: &WriteTransaction,
        dead: impl Fn(&str, &str) -> bool,
    ) -> Result<(), OxoError> {
        let mut links = write_txn.open_table(SOURCE_LINKS).map_err(storage_err)?;
        let mut doomed = Vec::new();
        for entry in links.iter().map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            let (curie, prefix) = key.value();
            if dead(curie, prefix) {
                doomed.push((curie.to_string(), prefix.to_string()));
            }
        }
        for (curie, prefix) in &doomed {
            links
                .remove((curie.as_str(), prefix.as_str()))
                .map_err(storage_err)?;
        }
        Ok(())
    }

    /// Remove every mapping touching one of `curies`.
    fn detach_mappings(
        write_txn: &WriteTransaction,
        curies: &BTreeSet<String>,
    ) -> Result<(), OxoError> {
        let mut mappings = write_txn.open_table(MAPPINGS).map_err(storage_err)?;
        let mut doomed = Vec::new();
        for entry in mappings.iter().map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            let mapping_key: MappingKey = decode(key.value())?;
            if curies.contains(&mapping_key.subject) || curies.contains(&mapping_key.object) {
                doomed.push(key.value().to_vec());
            }
        }
        for key in &doomed {
            mappings.remove(key.as_slice()).map_err(storage_err)?;
        }
        Ok(())
    }
}

// =============================================================================
// GRAPHSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl GraphStore for RedbGraph {
    fn ensure_constraint(&mut self, constraint: UniqueConstraint) -> Result<bool, OxoError> {
        let name = constraint.name();
        self.write(|write_txn| {
            let mut table = write_txn.open_table(CONSTRAINTS).map_err(storage_err)?;
            if table.get(name.as_str()).map_err(storage_err)?.is_some() {
                return Ok(false);
            }
            let sequence = table.len().map_err(storage_err)?;
            table
                .insert(name.as_str(), sequence)
                .map_err(storage_err)?;
            Ok(true)
        })
    }

    fn constraints(&self) -> Result<Vec<UniqueConstraint>, OxoError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(CONSTRAINTS).map_err(storage_err)?;

        let mut constraints = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            let constraint = UniqueConstraint::from_name(key.value()).ok_or_else(|| {
                OxoError::SerializationError(format!("unknown constraint {}", key.value()))
            })?;
            constraints.push(constraint);
        }
        Ok(constraints)
    }

    fn merge_datasources(&mut self, batch: &[DatasourceMerge]) -> Result<MergeStats, OxoError> {
        for merge in batch {
            check_key(UniqueConstraint::DATASOURCE_PREFIX, &merge.datasource.prefix)?;
        }

        self.write(|write_txn| {
            let mut table = write_txn.open_table(DATASOURCES).map_err(storage_err)?;
            let mut stats = MergeStats::default();

            for merge in batch {
                let prefix = merge.datasource.prefix.as_str();
                let existing: Option<Datasource> = match table.get(prefix).map_err(storage_err)? {
                    Some(data) => Some(decode(data.value())?),
                    None => None,
                };

                match existing {
                    Some(mut stored) => {
                        if apply_datasource_merge(&mut stored, merge) {
                            table
                                .insert(prefix, encode(&stored)?.as_slice())
                                .map_err(storage_err)?;
                        }
                        stats.matched += 1;
                    }
                    None => {
                        table
                            .insert(prefix, encode(&merge.datasource)?.as_slice())
                            .map_err(storage_err)?;
                        stats.created += 1;
                    }
                }
            }
            Ok(stats)
        })
    }

    fn merge_terms(&mut self, batch: &[Term]) -> Result<MergeStats, OxoError> {
        for term in batch {
            check_key(UniqueConstraint::TERM_CURIE, &term.curie)?;
        }

        self.write(|write_txn| {
            let mut table = write_txn.open_table(TERMS).map_err(storage_err)?;
            let mut stats = MergeStats::default();

            for term in batch {
                let curie = term.curie.as_str();
                let existing: Option<Term> = match table.get(curie).map_err(storage_err)? {
                    Some(data) => Some(decode(data.value())?),
                    None => None,
                };

                let merged = match &existing {
                    Some(stored) => {
                        stats.matched += 1;
                        apply_term_merge(stored, term)
                    }
                    None => {
                        stats.created += 1;
                        term.clone()
                    }
                };
                table
                    .insert(curie, encode(&merged)?.as_slice())
                    .map_err(storage_err)?;
            }
            Ok(stats)
        })
    }

    fn merge_source_links(&mut self, batch: &[SourceLink]) -> Result<MergeStats, OxoError> {
        self.write(|write_txn| {
            let terms = write_txn.open_table(TERMS).map_err(storage_err)?;
            let datasources = write_txn.open_table(DATASOURCES).map_err(storage_err)?;
            let mut links = write_txn.open_table(SOURCE_LINKS).map_err(storage_err)?;
            let mut stats = MergeStats::default();

            for link in batch {
                let term_exists = terms
                    .get(link.curie.as_str())
                    .map_err(storage_err)?
                    .is_some();
                let datasource_exists = datasources
                    .get(link.prefix.as_str())
                    .map_err(storage_err)?
                    .is_some();
                if !term_exists || !datasource_exists {
                    stats.unmatched += 1;
                    continue;
                }

                let existed = links
                    .insert((link.curie.as_str(), link.prefix.as_str()), 1u8)
                    .map_err(storage_err)?
                    .is_some();
                if existed {
                    stats.matched += 1;
                } else {
                    stats.created += 1;
                }
            }
            Ok(stats)
        })
    }

    fn merge_mappings(&mut self, batch: &[Mapping]) -> Result<MergeStats, OxoError> {
        self.write(|write_txn| {
            let terms = write_txn.open_table(TERMS).map_err(storage_err)?;
            let mut mappings = write_txn.open_table(MAPPINGS).map_err(storage_err)?;
            let mut stats = MergeStats::default();

            for mapping in batch {
                let subject_exists = terms
                    .get(mapping.subject.as_str())
                    .map_err(storage_err)?
                    .is_some();
                let object_exists = terms
                    .get(mapping.object.as_str())
                    .map_err(storage_err)?
                    .is_some();
                if !subject_exists || !object_exists {
                    stats.unmatched += 1;
                    continue;
                }

                let key = encode(&mapping.key())?;
                let value = encode(&mapping.match_string)?;
                let existed = mappings
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(storage_err)?
                    .is_some();
                if existed {
                    stats.matched += 1;
                } else {
                    stats.created += 1;
                }
            }
            Ok(stats)
        })
    }

    fn delete_batch(&mut self, kind: EntityKind, limit: usize) -> Result<usize, OxoError> {
        self.write(|write_txn| match kind {
            EntityKind::Mapping => {
                let mut table = write_txn.open_table(MAPPINGS).map_err(storage_err)?;
                let mut keys = Vec::new();
                for entry in table.iter().map_err(storage_err)?.take(limit) {
                    let (key, _) = entry.map_err(storage_err)?;
                    keys.push(key.value().to_vec());
                }
                for key in &keys {
                    table.remove(key.as_slice()).map_err(storage_err)?;
                }
                Ok(keys.len())
            }
            EntityKind::SourceLink => {
                let mut table = write_txn.open_table(SOURCE_LINKS).map_err(storage_err)?;
                let mut keys = Vec::new();
                for entry in table.iter().map_err(storage_err)?.take(limit) {
                    let (key, _) = entry.map_err(storage_err)?;
                    let (curie, prefix) = key.value();
                    keys.push((curie.to_string(), prefix.to_string()));
                }
                for (curie, prefix) in &keys {
                    table
                        .remove((curie.as_str(), prefix.as_str()))
                        .map_err(storage_err)?;
                }
                Ok(keys.len())
            }
            EntityKind::Term => {
                let removed = Self::first_keys(write_txn, TERMS, limit)?;
                {
                    let mut table = write_txn.open_table(TERMS).map_err(storage_err)?;
                    for curie in &removed {
                        table.remove(curie.as_str()).map_err(storage_err)?;
                    }
                }
                Self::detach_source_links(write_txn, |curie, _| removed.contains(curie))?;
                Self::detach_mappings(write_txn, &removed)?;
                Ok(removed.len())
            }
            EntityKind::Datasource => {
                let removed = Self::first_keys(write_txn, DATASOURCES, limit)?;
                {
                    let mut table = write_txn.open_table(DATASOURCES).map_err(storage_err)?;
                    for prefix in &removed {
                        table.remove(prefix.as_str()).map_err(storage_err)?;
                    }
                }
                Self::detach_source_links(write_txn, |_, prefix| removed.contains(prefix))?;
                Ok(removed.len())
            }
        })
    }

    fn count(&self, kind: EntityKind) -> Result<usize, OxoError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let len = match kind {
            EntityKind::Mapping => read_txn.open_table(MAPPINGS).map_err(storage_err)?.len(),
            EntityKind::SourceLink => read_txn
                .open_table(SOURCE_LINKS)
                .map_err(storage_err)?
                .len(),
            EntityKind::Term => read_txn.open_table(TERMS).map_err(storage_err)?.len(),
            EntityKind::Datasource => read_txn
                .open_table(DATASOURCES)
                .map_err(storage_err)?
                .len(),
        }
        .map_err(storage_err)?;
        Ok(len as usize)
    }

    fn term(&self, curie: &str) -> Result<Option<Term>, OxoError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(TERMS).map_err(storage_err)?;
        match table.get(curie).map_err(storage_err)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn datasource(&self, prefix: &str) -> Result<Option<Datasource>, OxoError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(DATASOURCES).map_err(storage_err)?;
        match table.get(prefix).map_err(storage_err)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn sources_of(&self, curie: &str) -> Result<Vec<String>, OxoError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(SOURCE_LINKS).map_err(storage_err)?;

        let mut prefixes = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            let (linked, prefix) = key.value();
            if linked == curie {
                prefixes.push(prefix.to_string());
            }
        }
        Ok(prefixes)
    }

    fn mappings_of(&self, curie: &str) -> Result<Vec<Mapping>, OxoError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(MAPPINGS).map_err(storage_err)?;

        let mut found = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let key: MappingKey = decode(key.value())?;
            if key.subject == curie || key.object == curie {
                found.push(Mapping {
                    subject: key.subject,
                    object: key.object,
                    attributes: key.attributes,
                    match_string: decode(value.value())?,
                });
            }
        }
        Ok(found)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MappingAttributes;
    use tempfile::tempdir;

    fn mapping(subject: &str, object: &str, predicate: &str, match_string: Option<&str>) -> Mapping {
        Mapping {
            subject: subject.to_string(),
            object: object.to_string(),
            attributes: MappingAttributes {
                predicate: Some(predicate.to_string()),
                ..MappingAttributes::default()
            },
            match_string: match_string.map(str::to_string),
        }
    }

    fn datasource(prefix: &str) -> DatasourceMerge {
        DatasourceMerge {
            datasource: Datasource {
                prefix: prefix.to_string(),
                ..Datasource::default()
            },
            overwrite: false,
        }
    }

    fn populate(graph: &mut RedbGraph) {
        graph
            .merge_datasources(&[datasource("MONDO"), datasource("DOID")])
            .expect("datasources");
        graph
            .merge_terms(&[Term::new("MONDO:1"), Term::new("DOID:1")])
            .expect("terms");
        graph
            .merge_source_links(&[
                SourceLink::new("MONDO:1", "MONDO"),
                SourceLink::new("DOID:1", "DOID"),
            ])
            .expect("links");
        graph
            .merge_mappings(&[mapping("MONDO:1", "DOID:1", "skos:exactMatch", Some("asthma"))])
            .expect("mappings");
    }

    #[test]
    fn basic_operations() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbGraph::open(temp.path().join("test.redb")).expect("open db");

        populate(&mut graph);

        assert_eq!(graph.count(EntityKind::Datasource).expect("count"), 2);
        assert_eq!(graph.count(EntityKind::Term).expect("count"), 2);
        assert_eq!(graph.count(EntityKind::SourceLink).expect("count"), 2);
        assert_eq!(graph.count(EntityKind::Mapping).expect("count"), 1);
    }

    #[test]
    fn merges_are_idempotent() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbGraph::open(temp.path().join("test.redb")).expect("open db");

        populate(&mut graph);
        populate(&mut graph);

        assert_eq!(graph.count(EntityKind::Term).expect("count"), 2);
        assert_eq!(graph.count(EntityKind::SourceLink).expect("count"), 2);
        assert_eq!(graph.count(EntityKind::Mapping).expect("count"), 1);
    }

    #[test]
    fn constraints_persist_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut graph = RedbGraph::open(&db_path).expect("open db");
            assert!(
                graph
                    .ensure_constraint(UniqueConstraint::TERM_CURIE)
                    .expect("create")
            );
        }

        let mut graph = RedbGraph::open(&db_path).expect("reopen db");
        assert!(
            !graph
                .ensure_constraint(UniqueConstraint::TERM_CURIE)
                .expect("again")
        );
        assert_eq!(
            graph.constraints().expect("list"),
            vec![UniqueConstraint::TERM_CURIE]
        );
    }

    #[test]
    fn recovery_persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut graph = RedbGraph::open(&db_path).expect("open db");
            populate(&mut graph);
        }

        let graph = RedbGraph::open(&db_path).expect("reopen db");
        let mappings = graph.mappings_of("DOID:1").expect("mappings");
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].match_string.as_deref(), Some("asthma"));
        assert_eq!(graph.sources_of("MONDO:1").expect("sources"), vec!["MONDO"]);
    }

    #[test]
    fn match_string_is_reset_on_remerge() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbGraph::open(temp.path().join("test.redb")).expect("open db");
        populate(&mut graph);

        let stats = graph
            .merge_mappings(&[mapping("MONDO:1", "DOID:1", "skos:exactMatch", None)])
            .expect("merge");

        assert_eq!(stats.matched, 1);
        let mappings = graph.mappings_of("MONDO:1").expect("mappings");
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].match_string, None);
    }

    #[test]
    fn remerging_a_term_keeps_its_uri() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbGraph::open(temp.path().join("test.redb")).expect("open db");
        let mut normalized = Term::new("MONDO:1");
        normalized.label = Some("disease".to_string());
        normalized.uri = Some("http://purl.obolibrary.org/obo/MONDO_1".to_string());
        graph.merge_terms(&[normalized]).expect("merge");

        let stats = graph.merge_terms(&[Term::new("MONDO:1")]).expect("merge");

        assert_eq!(stats.matched, 1);
        let stored = graph.term("MONDO:1").expect("lookup").expect("exists");
        assert_eq!(stored.label, None);
        assert_eq!(
            stored.uri.as_deref(),
            Some("http://purl.obolibrary.org/obo/MONDO_1")
        );
    }

    #[test]
    fn second_open_of_a_held_file_is_a_connectivity_error() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let _held = RedbGraph::open(&db_path).expect("open db");

        let second = RedbGraph::open(&db_path);

        assert!(matches!(second, Err(OxoError::Connectivity(_))));
    }

    #[test]
    fn unmatched_relationships_are_not_created() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbGraph::open(temp.path().join("test.redb")).expect("open db");
        graph.merge_terms(&[Term::new("MONDO:1")]).expect("terms");

        let links = graph
            .merge_source_links(&[SourceLink::new("MONDO:1", "MONDO")])
            .expect("links");
        let mappings = graph
            .merge_mappings(&[mapping("MONDO:1", "DOID:1", "skos:exactMatch", None)])
            .expect("mappings");

        assert_eq!(links.unmatched, 1);
        assert_eq!(mappings.unmatched, 1);
        assert_eq!(graph.count(EntityKind::SourceLink).expect("count"), 0);
        assert_eq!(graph.count(EntityKind::Mapping).expect("count"), 0);
    }

    #[test]
    fn blank_prefix_is_a_constraint_violation() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbGraph::open(temp.path().join("test.redb")).expect("open db");

        let result = graph.merge_datasources(&[datasource("MONDO"), datasource("")]);

        assert!(matches!(result, Err(OxoError::ConstraintViolation(_))));
        assert_eq!(graph.count(EntityKind::Datasource).expect("count"), 0);
    }

    #[test]
    fn delete_terms_detaches_relationships() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbGraph::open(temp.path().join("test.redb")).expect("open db");
        populate(&mut graph);

        let deleted = graph.delete_batch(EntityKind::Term, 1).expect("delete");

        assert_eq!(deleted, 1);
        assert_eq!(graph.count(EntityKind::Term).expect("count"), 1);
        assert_eq!(graph.count(EntityKind::SourceLink).expect("count"), 1);
        assert_eq!(graph.count(EntityKind::Mapping).expect("count"), 0);
    }

    #[test]
    fn delete_batch_drains_to_zero() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbGraph::open(temp.path().join("test.redb")).expect("open db");
        populate(&mut graph);

        let mut total = 0;
        loop {
            let deleted = graph
                .delete_batch(EntityKind::Datasource, 1)
                .expect("delete");
            if deleted == 0 {
                break;
            }
            total += deleted;
        }

        assert_eq!(total, 2);
        assert_eq!(graph.count(EntityKind::SourceLink).expect("count"), 0);
    }
}
