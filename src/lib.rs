//! Heapscope - heap snapshot query engine
//!
//! Loads heap snapshots into a single flat buffer and answers queries over
//! it without materializing the object graph: node and edge enumeration,
//! retainers, class aggregates, sortable filtered views, and retaining paths.

pub mod config;
pub mod snapshot;

pub use snapshot::{HeapSnapshot, RawSnapshot, SnapshotError, SnapshotResult};
