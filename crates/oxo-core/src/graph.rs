//! # Graph Store
//!
//! The store boundary of the ingestion engine.
//!
//! `GraphStore` exposes exactly the primitives the loader, the wipe
//! controller and mapping search need: idempotent constraint creation,
//! batched merge-upserts, match-only relationship merges, bounded
//! delete-and-count, and keyed lookups. `Graph` is the in-memory
//! implementation; `storage::RedbGraph` is the disk-backed one.
//!
//! All data structures use `BTreeMap`/`BTreeSet` so batch deletion always
//! removes elements in key order.

use crate::{
    Datasource, DatasourceMerge, EntityKind, Mapping, MappingKey, MergeStats, OxoError,
    SourceLink, Term, UniqueConstraint,
};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// The GraphStore trait defines the store operations the engine consumes.
///
/// Every write is a merge: applying the same batch twice leaves the store
/// exactly as applying it once. Each batch call is atomic; a backend either
/// applies the whole batch or returns an error and applies nothing.
pub trait GraphStore {
    /// Create a uniqueness constraint if absent.
    /// Returns `true` if it was created, `false` if it already existed.
    fn ensure_constraint(&mut self, constraint: UniqueConstraint) -> Result<bool, OxoError>;

    /// All constraints currently registered.
    fn constraints(&self) -> Result<Vec<UniqueConstraint>, OxoError>;

    /// Merge datasource nodes keyed by prefix.
    ///
    /// Fails with `ConstraintViolation` if any prefix is blank.
    fn merge_datasources(&mut self, batch: &[DatasourceMerge]) -> Result<MergeStats, OxoError>;

    /// Merge term nodes keyed by curie. On an existing node `label` and
    /// `category` are always replaced (absent resets them to null), while
    /// `identifier` and `uri` keep their stored value unless a new one is given.
    ///
    /// Fails with `ConstraintViolation` if any curie is blank.
    fn merge_terms(&mut self, batch: &[Term]) -> Result<MergeStats, OxoError>;

    /// Merge `HAS_SOURCE` edges between existing terms and datasources.
    /// Links whose term or datasource is absent are counted as unmatched.
    fn merge_source_links(&mut self, batch: &[SourceLink]) -> Result<MergeStats, OxoError>;

    /// Merge `MAPPING` edges keyed by endpoints plus attribute tuple, then
    /// set `match_string`. Mappings whose endpoints are absent are counted
    /// as unmatched and never create an edge.
    fn merge_mappings(&mut self, batch: &[Mapping]) -> Result<MergeStats, OxoError>;

    /// Delete at most `limit` elements of `kind`, detaching any relationship
    /// that references a deleted node. Returns the number deleted.
    fn delete_batch(&mut self, kind: EntityKind, limit: usize) -> Result<usize, OxoError>;

    /// Number of elements of `kind`.
    fn count(&self, kind: EntityKind) -> Result<usize, OxoError>;

    /// Look up a term by curie.
    fn term(&self, curie: &str) -> Result<Option<Term>, OxoError>;

    /// Look up a datasource by prefix.
    fn datasource(&self, prefix: &str) -> Result<Option<Datasource>, OxoError>;

    /// Prefixes of the datasources a term is linked to, in order.
    fn sources_of(&self, curie: &str) -> Result<Vec<String>, OxoError>;

    /// Every mapping that has `curie` as subject or object.
    fn mappings_of(&self, curie: &str) -> Result<Vec<Mapping>, OxoError>;
}

// =============================================================================
// SHARED MERGE RULES
// =============================================================================

/// Reject a blank merge key. A key can never be null.
pub(crate) fn check_key(
    constraint: UniqueConstraint,
    value: &str,
) -> Result<(), OxoError> {
    if value.trim().is_empty() {
        return Err(OxoError::ConstraintViolation(format!(
            "cannot merge {} with a null {}",
            constraint.label, constraint.property
        )));
    }
    Ok(())
}

/// Apply a datasource merge request onto an existing node.
/// Returns `true` if the stored node changed.
pub(crate) fn apply_datasource_merge(existing: &mut Datasource, merge: &DatasourceMerge) -> bool {
    if merge.overwrite && *existing != merge.datasource {
        *existing = merge.datasource.clone();
        return true;
    }
    false
}

/// Merge `incoming` over the stored term with the same curie.
pub(crate) fn apply_term_merge(existing: &Term, incoming: &Term) -> Term {
    Term {
        curie: incoming.curie.clone(),
        label: incoming.label.clone(),
        category: incoming.category.clone(),
        identifier: incoming
            .identifier
            .clone()
            .or_else(|| existing.identifier.clone()),
        uri: incoming.uri.clone().or_else(|| existing.uri.clone()),
    }
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The in-memory graph.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Registered uniqueness constraints.
    constraints: BTreeSet<UniqueConstraint>,

    /// Datasource storage: prefix -> Datasource
    datasources: BTreeMap<String, Datasource>,

    /// Term storage: curie -> Term
    terms: BTreeMap<String, Term>,

    /// `HAS_SOURCE` edges.
    source_links: BTreeSet<SourceLink>,

    /// `MAPPING` edges: merge key -> match string
    mappings: BTreeMap<MappingKey, Option<String>>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All mappings in key order.
    pub fn mappings(&self) -> impl Iterator<Item = Mapping> + '_ {
        self.mappings.iter().map(|(key, match_string)| Mapping {
            subject: key.subject.clone(),
            object: key.object.clone(),
            attributes: key.attributes.clone(),
            match_string: match_string.clone(),
        })
    }

    fn detach_terms(&mut self, removed: &BTreeSet<String>) {
        self.source_links.retain(|link| !removed.contains(&link.curie));
        self.mappings
            .retain(|key, _| !removed.contains(&key.subject) && !removed.contains(&key.object));
    }
}

impl GraphStore for Graph {
    fn ensure_constraint(&mut self, constraint: UniqueConstraint) -> Result<bool, OxoError> {
        Ok(self.constraints.insert(constraint))
    }

    fn constraints(&self) -> Result<Vec<UniqueConstraint>, OxoError> {
        Ok(self.constraints.iter().copied().collect())
    }

    fn merge_datasources(&mut self, batch: &[DatasourceMerge]) -> Result<MergeStats, OxoError> {
        for merge in batch {
            check_key(UniqueConstraint::DATASOURCE_PREFIX, &merge.datasource.prefix)?;
        }

        let mut stats = MergeStats::default();
        for merge in batch {
            match self.datasources.get_mut(&merge.datasource.prefix) {
                Some(existing) => {
                    apply_datasource_merge(existing, merge);
                    stats.matched += 1;
                }
                None => {
                    self.datasources
                        .insert(merge.datasource.prefix.clone(), merge.datasource.clone());
                    stats.created += 1;
                }
            }
        }
        Ok(stats)
    }

    fn merge_terms(&mut self, batch: &[Term]) -> Result<MergeStats, OxoError> {
        for term in batch {
            check_key(UniqueConstraint::TERM_CURIE, &term.curie)?;
        }

        let mut stats = MergeStats::default();
        for term in batch {
            match self.terms.get_mut(&term.curie) {
                Some(existing) => {
                    *existing = apply_term_merge(existing, term);
                    stats.matched += 1;
                }
                None => {
                    self.terms.insert(term.curie.clone(), term.clone());
                    stats.created += 1;
                }
            }
        }
        Ok(stats)
    }

    fn merge_source_links(&mut self, batch: &[SourceLink]) -> Result<MergeStats, OxoError> {
        let mut stats = MergeStats::default();
        for link in batch {
            if !self.terms.contains_key(&link.curie) || !self.datasources.contains_key(&link.prefix)
            {
                stats.unmatched += 1;
            } else if self.source_links.insert(link.clone()) {
                stats.created += 1;
            } else {
                stats.matched += 1;
            }
        }
        Ok(stats)
    }

    fn merge_mappings(&mut self, batch: &[Mapping]) -> Result<MergeStats, OxoError> {
        let mut stats = MergeStats::default();
        for mapping in batch {
            if !self.terms.contains_key(&mapping.subject) || !self.terms.contains_key(&mapping.object)
            {
                stats.unmatched += 1;
                continue;
            }
            if self
                .mappings
                .insert(mapping.key(), mapping.match_string.clone())
                .is_some()
            {
                stats.matched += 1;
            } else {
                stats.created += 1;
            }
        }
        Ok(stats)
    }

    fn delete_batch(&mut self, kind: EntityKind, limit: usize) -> Result<usize, OxoError> {
        let deleted = match kind {
            EntityKind::Mapping => {
                let keys: Vec<MappingKey> = self.mappings.keys().take(limit).cloned().collect();
                for key in &keys {
                    self.mappings.remove(key);
                }
                keys.len()
            }
            EntityKind::SourceLink => {
                let links: Vec<SourceLink> =
                    self.source_links.iter().take(limit).cloned().collect();
                for link in &links {
                    self.source_links.remove(link);
                }
                links.len()
            }
            EntityKind::Term => {
                let removed: BTreeSet<String> = self.terms.keys().take(limit).cloned().collect();
                for curie in &removed {
                    self.terms.remove(curie);
                }
                self.detach_terms(&removed);
                removed.len()
            }
            EntityKind::Datasource => {
                let removed: BTreeSet<String> =
                    self.datasources.keys().take(limit).cloned().collect();
                for prefix in &removed {
                    self.datasources.remove(prefix);
                }
                self.source_links
                    .retain(|link| !removed.contains(&link.prefix));
                removed.len()
            }
        };
        Ok(deleted)
    }

    fn count(&self, kind: EntityKind) -> Result<usize, OxoError> {
        Ok(match kind {
            EntityKind::Mapping => self.mappings.len(),
            EntityKind::SourceLink => self.source_links.len(),
            EntityKind::Term => self.terms.len(),
            EntityKind::Datasource => self.datasources.len(),
        })
    }

    fn term(&self, curie: &str) -> Result<Option<Term>, OxoError> {
        Ok(self.terms.get(curie).cloned())
    }

    fn datasource(&self, prefix: &str) -> Result<Option<Datasource>, OxoError> {
        Ok(self.datasources.get(prefix).cloned())
    }

    fn sources_of(&self, curie: &str) -> Result<Vec<String>, OxoError> {
        Ok(self
            .source_links
            .iter()
            .filter(|link| link.curie == curie)
            .map(|link| link.prefix.clone())
            .collect())
    }

    fn mappings_of(&self, curie: &str) -> Result<Vec<Mapping>, OxoError> {
        Ok(self
            .mappings()
            .filter(|m| m.subject == curie || m.object == curie)
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
