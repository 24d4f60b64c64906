//! # Persistent Storage
//!
//! Disk-backed `GraphStore` implementations.

mod redb_graph;

pub use redb_graph::RedbGraph;
