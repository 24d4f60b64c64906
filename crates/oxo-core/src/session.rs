//! # Session Module
//!
//! The explicit store handle of one invocation.
//!
//! A `Session` is acquired once from a `StoreLocator` and passed to every
//! operation that touches the store. Dropping it releases the store; for
//! redb that closes the database file and frees its lock.
//!
//! ## Storage Backends
//!
//! - `InMemory`: uses the in-memory `Graph` (fast, volatile)
//! - `Persistent`: uses `RedbGraph` for disk-backed ACID storage

use crate::graph::{Graph, GraphStore};
use crate::storage::RedbGraph;
use crate::{EntityKind, OxoError};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

// =============================================================================
// LOCATOR
// =============================================================================

/// Where a store lives, parsed from a store URL.
///
/// Accepted forms: `memory:`, `redb://<path>`, or a bare file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocator {
    InMemory,
    Redb(PathBuf),
}

impl StoreLocator {
    /// Parse a store URL.
    pub fn parse(url: &str) -> Result<Self, OxoError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(OxoError::Configuration("store URL is empty".to_string()));
        }
        if url == "memory:" || url == "memory://" {
            return Ok(Self::InMemory);
        }
        if let Some(path) = url.strip_prefix("redb://") {
            if path.is_empty() {
                return Err(OxoError::Configuration(
                    "redb:// store URL has no path".to_string(),
                ));
            }
            return Ok(Self::Redb(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(OxoError::Configuration(format!(
                "unsupported store scheme '{}' (expected memory: or redb://)",
                scheme
            )));
        }
        Ok(Self::Redb(PathBuf::from(url)))
    }
}

impl fmt::Display for StoreLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => f.write_str("memory:"),
            Self::Redb(path) => write!(f, "redb://{}", path.display()),
        }
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory graph (fast, volatile).
    InMemory(Graph),
    /// Disk-backed graph using redb (ACID, persistent).
    Persistent(RedbGraph),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Graph::new())
    }
}

// NOTE: Session does NOT implement Clone. The redb handle owns the file lock.

/// One open store.
#[derive(Debug)]
pub struct Session {
    backend: StorageBackend,
    locator: StoreLocator,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: StorageBackend::default(),
            locator: StoreLocator::InMemory,
        }
    }

    /// Create a session with persistent redb storage at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, OxoError> {
        let path = path.as_ref();
        let redb = RedbGraph::open(path)?;
        Ok(Self {
            backend: StorageBackend::Persistent(redb),
            locator: StoreLocator::Redb(path.to_path_buf()),
        })
    }

    /// Open the store named by `locator`.
    pub fn open(locator: &StoreLocator) -> Result<Self, OxoError> {
        let session = match locator {
            StoreLocator::InMemory => Self::new(),
            StoreLocator::Redb(path) => Self::with_redb(path)?,
        };
        tracing::debug!("Opened store {}", session.locator);
        Ok(session)
    }

    /// Parse `url` and open the store it names.
    pub fn connect(url: &str) -> Result<Self, OxoError> {
        Self::open(&StoreLocator::parse(url)?)
    }

    #[must_use]
    pub fn locator(&self) -> &StoreLocator {
        &self.locator
    }

    /// Check if this session uses persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Read access to the store.
    #[must_use]
    pub fn store(&self) -> &dyn GraphStore {
        match &self.backend {
            StorageBackend::InMemory(graph) => graph,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    /// Write access to the store.
    pub fn store_mut(&mut self) -> &mut dyn GraphStore {
        match &mut self.backend {
            StorageBackend::InMemory(graph) => graph,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    /// Element counts per kind, in wipe order.
    pub fn counts(&self) -> Result<BTreeMap<EntityKind, usize>, OxoError> {
        EntityKind::WIPE_ORDER
            .into_iter()
            .map(|kind| Ok((kind, self.store().count(kind)?)))
            .collect()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!("Released store {}", self.locator);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Term;

    #[test]
    fn locator_forms() {
        assert_eq!(StoreLocator::parse("memory:").ok(), Some(StoreLocator::InMemory));
        assert_eq!(
            StoreLocator::parse("redb://data/oxo.redb").ok(),
            Some(StoreLocator::Redb(PathBuf::from("data/oxo.redb")))
        );
        assert_eq!(
            StoreLocator::parse("oxo.redb").ok(),
            Some(StoreLocator::Redb(PathBuf::from("oxo.redb")))
        );
    }

    #[test]
    fn bad_locators_are_configuration_errors() {
        for url in ["", "   ", "redb://", "bolt://localhost:7687"] {
            assert!(
                matches!(StoreLocator::parse(url), Err(OxoError::Configuration(_))),
                "{url:?} should be rejected"
            );
        }
    }

    #[test]
    fn locator_display_round_trips() {
        let locator = StoreLocator::Redb(PathBuf::from("oxo.redb"));
        assert_eq!(StoreLocator::parse(&locator.to_string()).ok(), Some(locator));
    }

    #[test]
    fn in_memory_session_counts() {
        let mut session = Session::connect("memory:").expect("connect");
        session
            .store_mut()
            .merge_terms(&[Term::new("MONDO:1")])
            .expect("merge");

        let counts = session.counts().expect("counts");

        assert!(!session.is_persistent());
        assert_eq!(counts.get(&EntityKind::Term), Some(&1));
        assert_eq!(counts.get(&EntityKind::Mapping), Some(&0));
    }

    #[test]
    fn redb_session_persists_across_sessions() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("oxo.redb");

        {
            let mut session = Session::with_redb(&path).expect("open");
            assert!(session.is_persistent());
            session
                .store_mut()
                .merge_terms(&[Term::new("MONDO:1")])
                .expect("merge");
        }

        let session = Session::open(&StoreLocator::Redb(path)).expect("reopen");
        assert_eq!(session.counts().expect("counts").get(&EntityKind::Term), Some(&1));
    }
}
