//! # Mapping Search
//!
//! Breadth-first walk over mapping edges (in both directions) from one
//! curie, producing one `MappingResponse` per reachable term.

use crate::graph::GraphStore;
use crate::primitives::MAX_SEARCH_DISTANCE;
use crate::{Curie, OxoError, Scope};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A term reachable from the searched curie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResponse {
    pub curie: String,
    pub label: Option<String>,
    /// `sourcePrefix` values of the mappings on the shortest paths.
    pub source_prefixes: BTreeSet<String>,
    /// Datasource of the reached term.
    pub target_prefix: String,
    pub distance: usize,
    /// Scope shared by every hop, if they all agree.
    pub scope: Option<Scope>,
}

/// Scope accumulated along a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathScope {
    Start,
    Uniform(Scope),
    Mixed,
}

impl PathScope {
    fn extend(self, hop: Option<Scope>) -> Self {
        match (self, hop) {
            (Self::Start, Some(scope)) => Self::Uniform(scope),
            (Self::Uniform(current), Some(scope)) if current == scope => self,
            _ => Self::Mixed,
        }
    }

    fn join(self, other: Self) -> Self {
        if self == other { self } else { Self::Mixed }
    }

    fn scope(self) -> Option<Scope> {
        match self {
            Self::Uniform(scope) => Some(scope),
            Self::Start | Self::Mixed => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Reached {
    sources: BTreeSet<String>,
    scope: PathScope,
}

/// Find every term within `distance` mapping hops of `curie`.
///
/// `distance` is clamped to `MAX_SEARCH_DISTANCE`. Results are ordered by
/// distance, then curie. The searched term itself is never returned.
pub fn search_mappings<G: GraphStore + ?Sized>(
    store: &G,
    curie: &str,
    distance: usize,
) -> Result<Vec<MappingResponse>, OxoError> {
    let start = curie.trim();
    let max_distance = distance.min(MAX_SEARCH_DISTANCE);

    let mut visited: BTreeSet<String> = BTreeSet::from([start.to_string()]);
    let mut frontier: BTreeMap<String, Reached> = BTreeMap::from([(
        start.to_string(),
        Reached {
            sources: BTreeSet::new(),
            scope: PathScope::Start,
        },
    )]);
    let mut responses = Vec::new();

    for depth in 1..=max_distance {
        let mut next: BTreeMap<String, Reached> = BTreeMap::new();

        for (current, path) in &frontier {
            for mapping in store.mappings_of(current)? {
                let neighbour = if mapping.subject == *current {
                    &mapping.object
                } else {
                    &mapping.subject
                };
                if visited.contains(neighbour) {
                    continue;
                }

                let mut sources = path.sources.clone();
                sources.extend(mapping.attributes.source_prefix.iter().cloned());
                let scope = path.scope.extend(mapping.scope());

                next.entry(neighbour.clone())
                    .and_modify(|reached| {
                        reached.sources.extend(sources.iter().cloned());
                        reached.scope = reached.scope.join(scope);
                    })
                    .or_insert(Reached { sources, scope });
            }
        }

        if next.is_empty() {
            break;
        }
        for (reached_curie, reached) in &next {
            visited.insert(reached_curie.clone());
            responses.push(response(store, reached_curie, reached, depth)?);
        }
        frontier = next;
    }

    tracing::debug!("Mapping search from {} found {} terms", start, responses.len());
    Ok(responses)
}

fn response<G: GraphStore + ?Sized>(
    store: &G,
    curie: &str,
    reached: &Reached,
    distance: usize,
) -> Result<MappingResponse, OxoError> {
    let label = store.term(curie)?.and_then(|t| t.label);
    let target_prefix = match store.sources_of(curie)?.into_iter().next() {
        Some(prefix) => prefix,
        None => Curie::parse(curie)
            .map(|c| c.prefix().to_string())
            .unwrap_or_default(),
    };
    Ok(MappingResponse {
        curie: curie.to_string(),
        label,
        source_prefixes: reached.sources.clone(),
        target_prefix,
        distance,
        scope: reached.scope.scope(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
