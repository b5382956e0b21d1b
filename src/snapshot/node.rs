//! Node view and node iterator

use std::borrow::Cow;
use std::fmt;

use super::cursor::Cursor;
use super::edge::{Edge, EdgeIterator, EdgeSlice, RetainerEdgeIterator};
use super::meta::ROOT_NODE_OFFSET;
use super::HeapSnapshot;

/// Flyweight view of a node record.
///
/// Holds nothing but the snapshot reference and an offset, so moving it to
/// another node is a plain assignment. Clone it when two cursors must move
/// independently.
#[derive(Clone)]
pub struct Node<'s> {
    snapshot: &'s HeapSnapshot,
    first_node_offset: u32,
    offset: u32,
}

impl<'s> Node<'s> {
    pub fn new(snapshot: &'s HeapSnapshot, offset: u32) -> Self {
        Self {
            snapshot,
            first_node_offset: offset,
            offset,
        }
    }

    pub fn snapshot(&self) -> &'s HeapSnapshot {
        self.snapshot
    }

    /// Absolute offset of the node record.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }

    #[inline]
    fn field(&self, field_offset: u32) -> u32 {
        self.snapshot.raw(self.offset + field_offset)
    }

    pub fn type_code(&self) -> u32 {
        self.field(self.snapshot.layout.node_type_offset)
    }

    /// Symbolic type from the schema vocabulary.
    pub fn node_type(&self) -> &'s str {
        self.snapshot
            .layout
            .node_types
            .get(self.type_code() as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Raw name from the string table.
    pub fn name(&self) -> &'s str {
        self.snapshot
            .string(self.field(self.snapshot.layout.node_name_offset))
    }

    /// Class name used for grouping and display.
    pub fn class_name(&self) -> Cow<'s, str> {
        match self.node_type() {
            "hidden" => Cow::Borrowed("(system)"),
            "object" => Cow::Borrowed(self.name()),
            "native" => {
                let name = self.name();
                match name.find('/') {
                    Some(pos) => Cow::Borrowed(name[..pos].trim_end()),
                    None => Cow::Borrowed(name),
                }
            }
            "code" => Cow::Borrowed("(compiled code)"),
            other => Cow::Owned(format!("({})", other)),
        }
    }

    pub fn id(&self) -> u32 {
        self.field(self.snapshot.layout.node_id_offset)
    }

    /// Reads the same slot as [`Node::id`].
    pub fn instances_count(&self) -> u32 {
        self.field(self.snapshot.layout.node_instances_count_offset)
    }

    pub fn self_size(&self) -> u32 {
        self.field(self.snapshot.layout.node_self_size_offset)
    }

    pub fn retained_size(&self) -> u32 {
        self.field(self.snapshot.layout.node_retained_size_offset)
    }

    /// Offset of the immediate dominator's record.
    pub fn dominator_offset(&self) -> u32 {
        self.field(self.snapshot.layout.dominator_offset)
    }

    pub fn edges_count(&self) -> u32 {
        self.field(self.snapshot.layout.edges_count_offset)
    }

    pub fn is_hidden(&self) -> bool {
        self.snapshot.layout.node_hidden_type == Some(self.type_code())
    }

    pub fn is_root(&self) -> bool {
        self.offset == ROOT_NODE_OFFSET
    }

    #[inline]
    fn first_edge_offset(&self) -> u32 {
        self.offset + self.snapshot.layout.first_edge_offset
    }

    /// Buffer range holding this node's edge records.
    pub fn raw_edges(&self) -> EdgeSlice {
        EdgeSlice::new(
            self.first_edge_offset(),
            self.edges_count() * self.snapshot.layout.edge_fields_count,
        )
    }

    /// Offset of the record that follows this one.
    #[inline]
    pub fn next_node_offset(&self) -> u32 {
        self.first_edge_offset() + self.edges_count() * self.snapshot.layout.edge_fields_count
    }

    pub fn edges(&self) -> EdgeIterator<'s> {
        EdgeIterator::new(Edge::new(self.snapshot, self.raw_edges(), 0))
    }

    pub fn retainers(&self) -> RetainerEdgeIterator<'s> {
        self.snapshot.retainers(self)
    }

    pub fn dominator(&self) -> Node<'s> {
        Node::new(self.snapshot, self.dominator_offset())
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("offset", &self.offset)
            .field("type", &self.node_type())
            .field("name", &self.name())
            .field("id", &self.id())
            .finish()
    }
}

/// Iterates every node record, advancing by each record's real length
#[derive(Clone, Debug)]
pub struct NodeIterator<'s> {
    node: Node<'s>,
}

impl<'s> NodeIterator<'s> {
    pub fn new(node: Node<'s>) -> Self {
        Self { node }
    }
}

impl<'s> Cursor for NodeIterator<'s> {
    type Item = Node<'s>;

    fn first(&mut self) {
        self.node.offset = self.node.first_node_offset;
    }

    fn has_next(&self) -> bool {
        self.node.offset < self.node.snapshot.buffer_len()
    }

    fn next(&mut self) {
        self.node.offset = self.node.next_node_offset();
    }

    fn index(&self) -> u32 {
        self.node.offset
    }

    fn set_index(&mut self, index: u32) {
        self.node.offset = index;
    }

    fn item(&self) -> &Node<'s> {
        &self.node
    }
}
