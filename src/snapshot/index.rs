//! Derived indices: node offsets, the retainer CSR, and sorted ids
//!
//! All three are flat `u32` arrays built in linear passes over the buffer on
//! first use and kept until the snapshot is disposed.

use std::time::Instant;

use tracing::debug;

use super::cursor::Cursor;
use super::node::Node;
use super::HeapSnapshot;

/// Incoming edges of every node in CSR form.
///
/// `index[p]..index[p + 1]` is the bucket of the node at position `p` of the
/// node index; each entry of `retainers` is the absolute offset of an edge
/// record pointing at that node.
#[derive(Debug, Default)]
pub(crate) struct RetainerIndex {
    pub(crate) index: Vec<u32>,
    pub(crate) retainers: Vec<u32>,
}

impl HeapSnapshot {
    /// Start offsets of every node record, followed by the buffer length.
    pub fn node_index(&self) -> &[u32] {
        self.node_index.get_or_init(|| self.build_node_index())
    }

    fn build_node_index(&self) -> Vec<u32> {
        let started = Instant::now();
        let mut index = Vec::with_capacity(self.node_count() + 1);
        let mut iter = self.nodes();
        while iter.has_next() {
            index.push(iter.index());
            iter.next();
        }
        index.push(self.buffer_len());
        debug!(
            "Built node index: {} nodes in {:?}",
            index.len() - 1,
            started.elapsed()
        );
        index
    }

    /// Position of `offset` in the node index, or the insertion point.
    pub(crate) fn find_node_position(&self, offset: u32) -> Result<usize, usize> {
        self.node_index().binary_search(&offset)
    }

    /// Position of a node start offset. Panics when `offset` is not one.
    fn node_position(&self, offset: u32) -> usize {
        match self.find_node_position(offset) {
            Ok(position) => position,
            Err(_) => panic!("offset {} is not the start of a node record", offset),
        }
    }

    /// Start offset of the node whose record contains `offset`.
    ///
    /// Panics for offsets before the root or past the end of the buffer.
    pub fn find_nearest_node_offset(&self, offset: u32) -> u32 {
        let index = self.node_index();
        match self.find_node_position(offset) {
            Ok(position) => index[position],
            Err(position) => {
                assert!(
                    position > 0 && position < index.len(),
                    "offset {} lies outside every node record",
                    offset
                );
                index[position - 1]
            }
        }
    }

    fn retainer_index(&self) -> &RetainerIndex {
        self.retainers.get_or_init(|| self.build_retainers())
    }

    /// Two-pass counting sort over all edges.
    ///
    /// Pass one counts incoming edges per node. The prefix sum turns counts
    /// into bucket starts, and the count is parked in the first slot of each
    /// bucket. Pass two scatters each edge offset into its target's bucket,
    /// decrementing the parked count as a write cursor, so buckets fill from
    /// the back and the final write overwrites the cursor itself.
    fn build_retainers(&self) -> RetainerIndex {
        let started = Instant::now();
        let node_index = self.node_index();
        let first_edge_offset = self.layout.first_edge_offset;

        let mut index = vec![0u32; node_index.len()];
        let mut nodes = self.nodes();
        while nodes.has_next() {
            let mut edges = nodes.item().edges();
            while edges.has_next() {
                let position = self.node_position(edges.item().node_offset());
                index[position] += 1;
                edges.next();
            }
            nodes.next();
        }

        let retainer_count: u32 = index.iter().sum();
        // One spare slot: an empty trailing bucket still parks its zero count.
        let mut retainers = vec![0u32; retainer_count as usize + 1];
        let mut retainer_position = 0u32;
        for slot in index.iter_mut() {
            let count = *slot;
            retainers[retainer_position as usize] = count;
            *slot = retainer_position;
            retainer_position += count;
        }

        nodes.first();
        while nodes.has_next() {
            let node = nodes.item();
            let mut edges = node.edges();
            while edges.has_next() {
                let edge = edges.item();
                let bucket = index[self.node_position(edge.node_offset())] as usize;
                retainers[bucket] -= 1;
                let slot = bucket + retainers[bucket] as usize;
                retainers[slot] = node.offset() + first_edge_offset + edge.edge_index();
                edges.next();
            }
            nodes.next();
        }
        retainers.truncate(retainer_count as usize);

        debug!(
            "Built retainer index: {} retainers for {} nodes in {:?}",
            retainer_count,
            node_index.len() - 1,
            started.elapsed()
        );
        RetainerIndex { index, retainers }
    }

    /// Slice of the flat retainer list holding `node`'s incoming edges.
    pub(crate) fn retainer_slice(&self, node: &Node<'_>) -> &[u32] {
        let retainer_index = self.retainer_index();
        let from = retainer_index.index[self.node_position(node.offset())] as usize;
        let to = retainer_index.index[self.node_position(node.next_node_offset())] as usize;
        &retainer_index.retainers[from..to]
    }

    /// Length of the flat retainer list.
    pub fn retainers_len(&self) -> usize {
        self.retainer_index().retainers.len()
    }

    /// Whether any node carries `id`.
    pub fn has_id(&self, id: u32) -> bool {
        self.ids
            .get_or_init(|| self.build_ids())
            .binary_search(&id)
            .is_ok()
    }

    fn build_ids(&self) -> Vec<u32> {
        let started = Instant::now();
        let mut ids = Vec::with_capacity(self.node_count());
        let mut iter = self.nodes();
        while iter.has_next() {
            ids.push(iter.item().id());
            iter.next();
        }
        ids.sort_unstable();
        debug!("Built id index: {} ids in {:?}", ids.len(), started.elapsed());
        ids
    }
}

#[cfg(test)]
mod tests {
    use crate::snapshot::{Cursor, HeapSnapshot, SnapshotBuilder};
    use rustc_hash::FxHashMap;

    /// root -> A, root -> B, A -> B, B -> A, B -> C, C -> C, A -> C
    fn cyclic() -> HeapSnapshot {
        let mut b = SnapshotBuilder::new();
        let root = b.root();
        let a = b.node("object", "A", 3, 10, 10);
        let bb = b.node("object", "B", 5, 10, 10);
        let c = b.node("object", "C", 7, 10, 10);
        let lonely = b.node("object", "Lonely", 9, 10, 10);
        b.edge(root, "property", "a", a);
        b.edge(root, "property", "b", bb);
        b.edge(a, "property", "b", bb);
        b.edge(bb, "property", "a", a);
        b.edge(bb, "property", "c", c);
        b.edge(c, "property", "self", c);
        b.edge(a, "element", "0", c);
        let _ = lonely;
        b.snapshot().unwrap()
    }

    #[test]
    fn test_node_index_has_sentinel() {
        let snapshot = cyclic();
        let index = snapshot.node_index();
        assert_eq!(index.len(), snapshot.node_count() + 1);
        assert_eq!(*index.last().unwrap(), snapshot.buffer_len());
        assert!(index.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_nearest_node_covers_whole_record() {
        let snapshot = cyclic();
        let mut iter = snapshot.nodes();
        while iter.has_next() {
            let node = iter.item();
            for offset in node.offset()..node.next_node_offset() {
                assert_eq!(snapshot.find_nearest_node_offset(offset), node.offset());
            }
            iter.next();
        }
    }

    #[test]
    #[should_panic]
    fn test_nearest_node_rejects_offsets_past_the_end() {
        let snapshot = cyclic();
        snapshot.find_nearest_node_offset(snapshot.buffer_len() + 5);
    }

    #[test]
    fn test_retainers_cover_every_edge_exactly_once() {
        let snapshot = cyclic();
        assert_eq!(snapshot.retainers_len(), snapshot.edge_count());

        // Every edge offset, keyed to the node it targets.
        let mut expected: FxHashMap<u32, u32> = FxHashMap::default();
        let mut nodes = snapshot.nodes();
        while nodes.has_next() {
            let mut edges = nodes.item().edges();
            while edges.has_next() {
                let edge = edges.item();
                expected.insert(edge.absolute_offset(), edge.node_offset());
                edges.next();
            }
            nodes.next();
        }

        let mut seen: FxHashMap<u32, u32> = FxHashMap::default();
        nodes.first();
        while nodes.has_next() {
            let node = nodes.item();
            let mut retainers = node.retainers();
            while retainers.has_next() {
                let edge = retainers.item().edge();
                assert_eq!(edge.node_offset(), node.offset());
                let previous = seen.insert(edge.absolute_offset(), node.offset());
                assert!(previous.is_none(), "edge listed twice");
                retainers.next();
            }
            nodes.next();
        }

        assert_eq!(seen, expected);
    }

    #[test]
    fn test_retainer_counts() {
        let snapshot = cyclic();
        let counts: Vec<(String, u32)> = {
            let mut out = Vec::new();
            let mut nodes = snapshot.nodes();
            while nodes.has_next() {
                out.push((
                    nodes.item().name().to_string(),
                    nodes.item().retainers().item().len(),
                ));
                nodes.next();
            }
            out
        };
        assert_eq!(
            counts,
            vec![
                ("".to_string(), 0),
                ("A".to_string(), 2),
                ("B".to_string(), 2),
                ("C".to_string(), 3),
                ("Lonely".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_has_id() {
        let snapshot = cyclic();
        assert!(snapshot.has_id(1));
        assert!(snapshot.has_id(7));
        assert!(!snapshot.has_id(2));
        assert!(!snapshot.has_id(100));
    }
}
