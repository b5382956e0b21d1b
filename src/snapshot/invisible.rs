//! One-time pass hiding global-object edges that duplicate root shortcuts

use rustc_hash::FxHashSet;
use tracing::debug;

use super::cursor::Cursor;
use super::HeapSnapshot;

impl HeapSnapshot {
    /// Retype duplicated global-object edges as `invisible`.
    ///
    /// For each shortcut edge out of the root, the target (a global object)
    /// exposes its properties twice: once as shortcut edges and once through
    /// named edges into hidden proxy nodes. Edges of the second kind whose
    /// name matches a shortcut are retyped in place. This is the only write
    /// made to the buffer after load.
    pub(crate) fn mark_invisible_edges(&mut self) {
        let targets = self.invisible_edge_offsets();
        if targets.is_empty() {
            return;
        }
        let type_offset = self.layout.edge_type_offset;
        let invisible = self.layout.edge_invisible_type;
        for edge_offset in &targets {
            self.nodes[(edge_offset + type_offset) as usize] = invisible;
        }
        debug!("Marked {} global-object edges invisible", targets.len());
    }

    fn invisible_edge_offsets(&self) -> Vec<u32> {
        let mut targets = Vec::new();
        let mut root_edges = self.root().edges();
        while root_edges.has_next() {
            let edge = root_edges.item();
            if edge.is_shortcut() {
                let global = edge.node();

                let mut shortcut_names = FxHashSet::default();
                let mut inner = global.edges();
                while inner.has_next() {
                    if inner.item().is_shortcut() {
                        shortcut_names.insert(inner.item().name_or_index());
                    }
                    inner.next();
                }

                inner.first();
                while inner.has_next() {
                    let global_edge = inner.item();
                    if !global_edge.is_shortcut()
                        && global_edge.node().is_hidden()
                        && global_edge.has_raw_string_name()
                        && shortcut_names.contains(&global_edge.name_or_index())
                    {
                        targets.push(global_edge.absolute_offset());
                    }
                    inner.next();
                }
            }
            root_edges.next();
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use crate::snapshot::{Cursor, HeapSnapshot, SnapshotBuilder};

    fn edge_types(snapshot: &HeapSnapshot, node_id: u32) -> Vec<(String, String)> {
        let node = snapshot.node_by_id(node_id).unwrap();
        let mut out = Vec::new();
        let mut iter = node.edges();
        while iter.has_next() {
            let edge = iter.item();
            out.push((edge.name().to_string(), edge.edge_type().to_string()));
            iter.next();
        }
        out
    }

    #[test]
    fn test_matching_edge_into_hidden_node_becomes_invisible() {
        let mut b = SnapshotBuilder::new();
        let root = b.root();
        let global = b.node("object", "Window", 3, 10, 10);
        let x_value = b.node("object", "X", 5, 10, 10);
        let proxy_x = b.node("hidden", "system", 7, 10, 10);
        let proxy_y = b.node("hidden", "system", 9, 10, 10);
        let plain_x = b.node("object", "PlainX", 11, 10, 10);

        b.edge(root, "shortcut", "window", global);
        b.edge(global, "shortcut", "x", x_value);
        b.edge(global, "property", "x", proxy_x);
        b.edge(global, "property", "y", proxy_y);
        b.edge(global, "context", "x", plain_x);
        let snapshot = b.snapshot().unwrap();

        assert_eq!(
            edge_types(&snapshot, 3),
            vec![
                ("x".to_string(), "shortcut".to_string()),
                ("x".to_string(), "invisible".to_string()),
                ("y".to_string(), "property".to_string()),
                ("x".to_string(), "context".to_string()),
            ]
        );

        let mut iter = snapshot.node_by_id(3).unwrap().edges();
        iter.next();
        assert!(iter.item().is_invisible());
        assert_eq!(iter.item().to_string(), "{x}");
    }

    #[test]
    fn test_only_root_shortcut_targets_are_touched() {
        let mut b = SnapshotBuilder::new();
        let root = b.root();
        let global = b.node("object", "Window", 3, 10, 10);
        let x_value = b.node("object", "X", 5, 10, 10);
        let proxy_x = b.node("hidden", "system", 7, 10, 10);

        // Same shape, but reached through a property edge instead of a shortcut.
        b.edge(root, "property", "window", global);
        b.edge(global, "shortcut", "x", x_value);
        b.edge(global, "property", "x", proxy_x);
        let snapshot = b.snapshot().unwrap();

        assert_eq!(
            edge_types(&snapshot, 3),
            vec![
                ("x".to_string(), "shortcut".to_string()),
                ("x".to_string(), "property".to_string()),
            ]
        );
    }

    #[test]
    fn test_numeric_edges_are_never_invisible() {
        let mut b = SnapshotBuilder::new();
        let root = b.root();
        let global = b.node("object", "Window", 3, 10, 10);
        let x_value = b.node("object", "X", 5, 10, 10);
        let proxy = b.node("hidden", "system", 7, 10, 10);

        b.edge(root, "shortcut", "window", global);
        b.edge(global, "shortcut", "x", x_value);
        // Hidden edges are numeric even when the index equals the string id of "x".
        let x_index = b.intern("x");
        b.edge(global, "hidden", &x_index.to_string(), proxy);
        let snapshot = b.snapshot().unwrap();

        let types = edge_types(&snapshot, 3);
        assert_eq!(types[1].1, "hidden");
    }
}
