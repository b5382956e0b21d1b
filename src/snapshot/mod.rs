//! Heap snapshot query engine
//!
//! A snapshot is a single flat `u32` buffer holding every node record followed
//! by its outgoing edge records, a string table, and a schema describing the
//! record layout. Nothing here materializes the graph as linked objects:
//! [`Node`], [`Edge`] and [`RetainerEdge`] are flyweight views addressing the
//! buffer by offset, and every derived structure (node index, retainer index,
//! id index, class aggregates) is a flat array built lazily on first use and
//! cached for the snapshot's lifetime.

pub mod aggregates;
pub mod builder;
pub mod cursor;
pub mod edge;
pub mod error;
mod index;
mod invisible;
pub mod loader;
pub mod meta;
pub mod node;
pub mod path_finder;
pub mod provider;

pub use aggregates::{Aggregate, Aggregates};
pub use builder::{NodeHandle, SnapshotBuilder};
pub use cursor::Cursor;
pub use edge::{Edge, EdgeIterator, EdgeName, EdgeSlice, RetainerEdge, RetainerEdgeIterator};
pub use error::{SnapshotError, SnapshotResult};
pub use meta::{FieldType, Layout, SnapshotMeta, META_NODE_OFFSET, ROOT_NODE_OFFSET};
pub use node::{Node, NodeIterator};
pub use path_finder::{node_to_string, PathFinder, PathFinderOptions, PathSearch, RetainingPath};
pub use provider::{
    Comparator, EdgeSortKey, EdgesProvider, FilteredOrderedIterator, NodeField, NodesProvider,
    OrderedCursor,
};

use std::cell::{Cell, OnceCell};

use index::RetainerIndex;

/// Snapshot contents as delivered by a loader, before any indexing.
///
/// `nodes[0]` is the slot of the schema record; its value is ignored.
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    pub meta: SnapshotMeta,
    pub nodes: Vec<u32>,
    pub strings: Vec<String>,
}

/// A loaded heap snapshot with lazily built indices
pub struct HeapSnapshot {
    nodes: Vec<u32>,
    strings: Vec<String>,
    layout: Layout,

    nodes_count: OnceCell<usize>,
    node_index: OnceCell<Vec<u32>>,
    retainers: OnceCell<RetainerIndex>,
    ids: OnceCell<Vec<u32>>,
    aggregates: OnceCell<Aggregates>,
    aggregates_with_indexes: Cell<bool>,
}

impl HeapSnapshot {
    /// Resolve the layout, check the record chain, and hide duplicated
    /// global-object edges.
    pub fn new(raw: RawSnapshot) -> SnapshotResult<Self> {
        let layout = Layout::resolve(&raw.meta)?;
        check_record_chain(&raw.nodes, &layout)?;

        let mut snapshot = Self {
            nodes: raw.nodes,
            strings: raw.strings,
            layout,
            nodes_count: OnceCell::new(),
            node_index: OnceCell::new(),
            retainers: OnceCell::new(),
            ids: OnceCell::new(),
            aggregates: OnceCell::new(),
            aggregates_with_indexes: Cell::new(false),
        };
        snapshot.mark_invisible_edges();
        Ok(snapshot)
    }

    /// Release the buffer, the string table and every cached index.
    pub fn dispose(&mut self) {
        self.nodes = Vec::new();
        self.strings = Vec::new();
        self.nodes_count.take();
        self.node_index.take();
        self.retainers.take();
        self.ids.take();
        if self.aggregates.take().is_some() {
            self.aggregates_with_indexes.set(false);
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Length of the raw buffer, schema slot included.
    pub fn buffer_len(&self) -> u32 {
        self.nodes.len() as u32
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn root(&self) -> Node<'_> {
        Node::new(self, ROOT_NODE_OFFSET)
    }

    /// View of the node record starting at `offset`.
    pub fn node_at(&self, offset: u32) -> Node<'_> {
        Node::new(self, offset)
    }

    /// Iterator over every node, starting at the root.
    pub fn nodes(&self) -> NodeIterator<'_> {
        NodeIterator::new(self.root())
    }

    pub fn node_count(&self) -> usize {
        *self.nodes_count.get_or_init(|| {
            let mut count = 0;
            let mut iter = self.nodes();
            while iter.has_next() {
                count += 1;
                iter.next();
            }
            count
        })
    }

    /// Total number of edge records across all nodes.
    pub fn edge_count(&self) -> usize {
        let mut count = 0;
        let mut iter = self.nodes();
        while iter.has_next() {
            count += iter.item().edges_count() as usize;
            iter.next();
        }
        count
    }

    /// Retained size of the root, i.e. the whole heap.
    pub fn total_size(&self) -> u32 {
        self.root().retained_size()
    }

    /// Find a node by its id with a linear scan.
    pub fn node_by_id(&self, id: u32) -> Option<Node<'_>> {
        if !self.has_id(id) {
            return None;
        }
        let mut iter = self.nodes();
        while iter.has_next() {
            if iter.item().id() == id {
                return Some(iter.item().clone());
            }
            iter.next();
        }
        None
    }

    /// Edges retaining `node`.
    pub fn retainers(&self, node: &Node<'_>) -> RetainerEdgeIterator<'_> {
        RetainerEdgeIterator::new(RetainerEdge::new(self, self.retainer_slice(node)))
    }

    /// Sortable, filterable view over every node.
    pub fn nodes_provider<'s>(
        &'s self,
        filter: Option<Box<dyn Fn(&Node<'s>) -> bool + 's>>,
    ) -> NodesProvider<'s> {
        FilteredOrderedIterator::new(self.nodes(), filter)
    }

    /// Sortable, filterable view over the outgoing edges of `node`.
    pub fn edges_provider<'s>(
        &'s self,
        node: &Node<'s>,
        filter: Option<Box<dyn Fn(&Edge<'s>) -> bool + 's>>,
    ) -> EdgesProvider<'s> {
        FilteredOrderedIterator::new(node.edges(), filter)
    }

    #[inline]
    pub(crate) fn raw(&self, position: u32) -> u32 {
        self.nodes[position as usize]
    }

    #[inline]
    pub(crate) fn string(&self, index: u32) -> &str {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Walk the node headers once, then make sure every edge targets the start
/// of a node record.
fn check_record_chain(nodes: &[u32], layout: &Layout) -> SnapshotResult<()> {
    let len = nodes.len() as u64;
    let header = layout.first_edge_offset as u64;
    let edge_fields = layout.edge_fields_count as u64;

    let mut offset = ROOT_NODE_OFFSET as u64;
    if offset + header > len {
        return Err(SnapshotError::Malformed(format!(
            "buffer of {} values has no root record",
            len
        )));
    }
    let mut record_starts = Vec::new();
    while offset < len {
        if offset + header > len {
            return Err(SnapshotError::Malformed(format!(
                "node record at {} is truncated",
                offset
            )));
        }
        let edges_count = nodes[(offset + layout.edges_count_offset as u64) as usize] as u64;
        let next = offset + header + edges_count * edge_fields;
        if next > len {
            return Err(SnapshotError::Malformed(format!(
                "edges of node at {} run past the end of the buffer",
                offset
            )));
        }
        record_starts.push(offset);
        offset = next;
    }

    // Record starts are ascending, and each record's edges run up to the next start.
    let record_ends = record_starts.iter().skip(1).copied().chain(std::iter::once(len));
    for (&start, end) in record_starts.iter().zip(record_ends) {
        let mut edge = start + header;
        while edge < end {
            let to_node = nodes[(edge + layout.edge_to_node_offset as u64) as usize] as u64;
            if record_starts.binary_search(&to_node).is_err() {
                return Err(SnapshotError::Malformed(format!(
                    "edge at {} does not point at a node record ({})",
                    edge, to_node
                )));
            }
            edge += edge_fields;
        }
    }
    Ok(())
}
