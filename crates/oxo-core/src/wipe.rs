//! # Bulk Deletion Controller
//!
//! Clears the graph in bounded batches, relationships before the nodes they
//! hang off: mappings, source links, terms, datasources.
//!
//! Each batch is one store transaction. A wipe interrupted at any point is
//! resumed by running it again from the top.

use crate::graph::GraphStore;
use crate::primitives::{DATASOURCE_BATCH_LIMIT, RELATIONSHIP_BATCH_LIMIT, TERM_BATCH_LIMIT};
use crate::{EntityKind, OxoError};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-kind batch ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub relationships: usize,
    pub terms: usize,
    pub datasources: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            relationships: RELATIONSHIP_BATCH_LIMIT,
            terms: TERM_BATCH_LIMIT,
            datasources: DATASOURCE_BATCH_LIMIT,
        }
    }
}

impl BatchLimits {
    /// The same ceiling for every kind.
    #[must_use]
    pub const fn uniform(limit: usize) -> Self {
        Self {
            relationships: limit,
            terms: limit,
            datasources: limit,
        }
    }

    /// Ceiling for `kind`. Never zero, so a drain always makes progress.
    #[must_use]
    pub fn for_kind(&self, kind: EntityKind) -> usize {
        let limit = match kind {
            EntityKind::Mapping | EntityKind::SourceLink => self.relationships,
            EntityKind::Term => self.terms,
            EntityKind::Datasource => self.datasources,
        };
        limit.max(1)
    }
}

/// What a wipe removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WipeReport {
    pub deleted: BTreeMap<EntityKind, usize>,
    pub batches: usize,
}

impl WipeReport {
    /// Total elements removed across all kinds.
    #[must_use]
    pub fn total(&self) -> usize {
        self.deleted.values().sum()
    }
}

/// Drives paginated deletion against a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct WipeController {
    limits: BatchLimits,
}

impl WipeController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(limits: BatchLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// Delete one batch of `kind`, returning how many were removed.
    pub fn delete_batch<G: GraphStore + ?Sized>(
        &self,
        store: &mut G,
        kind: EntityKind,
    ) -> Result<usize, OxoError> {
        store.delete_batch(kind, self.limits.for_kind(kind))
    }

    /// Delete batches of `kind` until one comes back empty.
    ///
    /// Returns the total removed and the number of non-empty batches.
    pub fn drain<G: GraphStore + ?Sized>(
        &self,
        store: &mut G,
        kind: EntityKind,
    ) -> Result<(usize, usize), OxoError> {
        let mut total = 0;
        let mut batches = 0;
        loop {
            let deleted = self.delete_batch(store, kind)?;
            if deleted == 0 {
                break;
            }
            total += deleted;
            batches += 1;
            tracing::info!("Still deleting {}: {} removed so far", kind, total);
        }
        Ok((total, batches))
    }

    /// Clear the whole graph in dependency order.
    pub fn wipe<G: GraphStore + ?Sized>(&self, store: &mut G) -> Result<WipeReport, OxoError> {
        let mut report = WipeReport::default();
        for kind in EntityKind::WIPE_ORDER {
            let (deleted, batches) = self.drain(store, kind)?;
            tracing::info!("Deleted {} {}", deleted, kind);
            report.deleted.insert(kind, deleted);
            report.batches += batches;
        }
        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
