//! Programmatic construction of snapshots in the standard layout
//!
//! Nodes are collected first and laid out on [`SnapshotBuilder::build`], so
//! edges may point at nodes added later. The root is created up front and
//! always ends up at [`ROOT_NODE_OFFSET`].

use rustc_hash::FxHashMap;

use super::error::{SnapshotError, SnapshotResult};
use super::meta::{SnapshotMeta, EDGE_TYPES, NODE_TYPES, ROOT_NODE_OFFSET};
use super::{HeapSnapshot, RawSnapshot};

const NODE_HEADER_LEN: u32 = 7;
const EDGE_FIELDS_COUNT: u32 = 3;

/// Handle to a node added to a [`SnapshotBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(usize);

#[derive(Debug)]
struct PendingEdge {
    type_code: u32,
    name_or_index: u32,
    to: NodeHandle,
}

#[derive(Debug)]
struct PendingNode {
    type_code: u32,
    name: u32,
    id: u32,
    self_size: u32,
    retained_size: u32,
    dominator: NodeHandle,
    edges: Vec<PendingEdge>,
}

/// Builds a [`RawSnapshot`] node by node
#[derive(Debug)]
pub struct SnapshotBuilder {
    strings: Vec<String>,
    string_ids: FxHashMap<String, u32>,
    nodes: Vec<PendingNode>,
    errors: Vec<String>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// New builder holding only the root (an unnamed `object` with id 1).
    pub fn new() -> Self {
        let mut builder = Self {
            strings: Vec::new(),
            string_ids: FxHashMap::default(),
            nodes: Vec::new(),
            errors: Vec::new(),
        };
        builder.intern("");
        builder.node("object", "", 1, 0, 0);
        builder
    }

    pub fn root(&self) -> NodeHandle {
        NodeHandle(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Intern a string, returning its string-table index.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.string_ids.get(s) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.string_ids.insert(s.to_string(), index);
        index
    }

    /// Add a node. `node_type` must be one of the standard node types.
    pub fn node(
        &mut self,
        node_type: &str,
        name: &str,
        id: u32,
        self_size: u32,
        retained_size: u32,
    ) -> NodeHandle {
        let type_code = match NODE_TYPES.iter().position(|t| *t == node_type) {
            Some(code) => code as u32,
            None => {
                self.errors.push(format!("unknown node type `{}`", node_type));
                0
            }
        };
        let name = self.intern(name);
        let handle = NodeHandle(self.nodes.len());
        self.nodes.push(PendingNode {
            type_code,
            name,
            id,
            self_size,
            retained_size,
            dominator: NodeHandle(0),
            edges: Vec::new(),
        });
        handle
    }

    /// Add an edge. Element and hidden edges take a decimal index as name.
    pub fn edge(&mut self, from: NodeHandle, edge_type: &str, name: &str, to: NodeHandle) {
        let type_code = match EDGE_TYPES.iter().position(|t| *t == edge_type) {
            Some(code) => code as u32,
            None => {
                self.errors.push(format!("unknown edge type `{}`", edge_type));
                return;
            }
        };
        let name_or_index = if matches!(edge_type, "element" | "hidden") {
            match name.parse::<u32>() {
                Ok(index) => index,
                Err(_) => {
                    self.errors
                        .push(format!("{} edge name `{}` is not an index", edge_type, name));
                    return;
                }
            }
        } else {
            self.intern(name)
        };

        if to.0 >= self.nodes.len() {
            self.errors.push(format!("edge target {:?} does not exist", to));
            return;
        }
        match self.nodes.get_mut(from.0) {
            Some(node) => node.edges.push(PendingEdge {
                type_code,
                name_or_index,
                to,
            }),
            None => self
                .errors
                .push(format!("edge source {:?} does not exist", from)),
        }
    }

    pub fn set_retained_size(&mut self, node: NodeHandle, retained_size: u32) {
        if let Some(node) = self.nodes.get_mut(node.0) {
            node.retained_size = retained_size;
        }
    }

    pub fn set_dominator(&mut self, node: NodeHandle, dominator: NodeHandle) {
        if let Some(node) = self.nodes.get_mut(node.0) {
            node.dominator = dominator;
        }
    }

    /// Lay out records and resolve node handles to buffer offsets.
    pub fn build(self) -> SnapshotResult<RawSnapshot> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(SnapshotError::Malformed(error));
        }

        let mut offsets = Vec::with_capacity(self.nodes.len());
        let mut offset = ROOT_NODE_OFFSET;
        for node in &self.nodes {
            offsets.push(offset);
            offset += NODE_HEADER_LEN + node.edges.len() as u32 * EDGE_FIELDS_COUNT;
        }

        let mut buffer = Vec::with_capacity(offset as usize);
        // Slot of the schema record.
        buffer.push(0);
        for node in &self.nodes {
            buffer.extend_from_slice(&[
                node.type_code,
                node.name,
                node.id,
                node.self_size,
                node.retained_size,
                offsets[node.dominator.0],
                node.edges.len() as u32,
            ]);
            for edge in &node.edges {
                buffer.extend_from_slice(&[edge.type_code, edge.name_or_index, offsets[edge.to.0]]);
            }
        }

        Ok(RawSnapshot {
            meta: SnapshotMeta::standard(),
            nodes: buffer,
            strings: self.strings,
        })
    }

    /// Build and load in one step.
    pub fn snapshot(self) -> SnapshotResult<HeapSnapshot> {
        HeapSnapshot::new(self.build()?)
    }
}
