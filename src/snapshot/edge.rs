//! Edge and retainer-edge views with their iterators

use std::fmt;

use super::cursor::Cursor;
use super::meta::ROOT_NODE_OFFSET;
use super::node::Node;
use super::HeapSnapshot;

/// Range of the buffer holding one node's edge records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeSlice {
    start: u32,
    len: u32,
}

impl EdgeSlice {
    pub fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    /// Absolute offset of the first edge record.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Length in buffer values, not in edges.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Edge name: a string for named references, an index for elements and
/// hidden slots. Shortcut names may parse to negative indexes.
///
/// Variant order matters: string names sort before numeric ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeName<'s> {
    Str(&'s str),
    Index(i64),
}

impl EdgeName<'_> {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EdgeName::Str(s) => Some(*s),
            EdgeName::Index(_) => None,
        }
    }

    pub fn is_proto(&self) -> bool {
        matches!(self, EdgeName::Str("__proto__"))
    }
}

impl fmt::Display for EdgeName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeName::Str(s) => f.write_str(s),
            EdgeName::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Leading-integer parse: optional whitespace and sign, then decimal digits.
fn parse_index(name: &str) -> Option<i64> {
    let trimmed = name.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits = unsigned
        .as_bytes()
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    let value: i64 = unsigned[..digits].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Flyweight view of an edge record inside a node's edge list
#[derive(Clone)]
pub struct Edge<'s> {
    snapshot: &'s HeapSnapshot,
    edges: EdgeSlice,
    edge_index: u32,
}

impl<'s> Edge<'s> {
    pub fn new(snapshot: &'s HeapSnapshot, edges: EdgeSlice, edge_index: u32) -> Self {
        Self {
            snapshot,
            edges,
            edge_index,
        }
    }

    /// Position relative to the start of the owning node's edge list.
    #[inline]
    pub fn edge_index(&self) -> u32 {
        self.edge_index
    }

    #[inline]
    pub fn set_edge_index(&mut self, edge_index: u32) {
        self.edge_index = edge_index;
    }

    /// Absolute offset of this edge record in the buffer.
    #[inline]
    pub fn absolute_offset(&self) -> u32 {
        self.edges.start + self.edge_index
    }

    pub fn raw_edges(&self) -> EdgeSlice {
        self.edges
    }

    #[inline]
    fn field(&self, field_offset: u32) -> u32 {
        self.snapshot.raw(self.absolute_offset() + field_offset)
    }

    pub fn type_code(&self) -> u32 {
        self.field(self.snapshot.layout.edge_type_offset)
    }

    /// Symbolic type, `invisible` included.
    pub fn edge_type(&self) -> &'s str {
        self.snapshot
            .layout
            .edge_types
            .get(self.type_code() as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The raw `name_or_index` value.
    pub fn name_or_index(&self) -> u32 {
        self.field(self.snapshot.layout.edge_name_offset)
    }

    pub fn is_element(&self) -> bool {
        self.snapshot.layout.edge_element_type == Some(self.type_code())
    }

    pub fn is_hidden(&self) -> bool {
        self.snapshot.layout.edge_hidden_type == Some(self.type_code())
    }

    pub fn is_internal(&self) -> bool {
        self.snapshot.layout.edge_internal_type == Some(self.type_code())
    }

    pub fn is_invisible(&self) -> bool {
        self.snapshot.layout.edge_invisible_type == self.type_code()
    }

    pub fn is_shortcut(&self) -> bool {
        self.snapshot.layout.edge_shortcut_type == Some(self.type_code())
    }

    /// Whether `name_or_index` refers to the string table.
    pub(crate) fn has_raw_string_name(&self) -> bool {
        !self.is_element() && !self.is_hidden()
    }

    /// Whether [`Edge::name`] yields a string. Shortcuts with numeric-looking
    /// names count as numeric.
    pub fn has_string_name(&self) -> bool {
        matches!(self.name(), EdgeName::Str(_))
    }

    pub fn name(&self) -> EdgeName<'s> {
        let raw = self.name_or_index();
        if !self.has_raw_string_name() {
            return EdgeName::Index(i64::from(raw));
        }
        let name = self.snapshot.string(raw);
        if self.is_shortcut() {
            if let Some(index) = parse_index(name) {
                return EdgeName::Index(index);
            }
        }
        EdgeName::Str(name)
    }

    /// Offset of the target node's record.
    pub fn node_offset(&self) -> u32 {
        self.field(self.snapshot.layout.edge_to_node_offset)
    }

    pub fn node(&self) -> Node<'s> {
        Node::new(self.snapshot, self.node_offset())
    }
}

impl fmt::Display for Edge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match (self.edge_type(), name) {
            ("context", _) => write!(f, "->{}", name),
            ("element", _) => write!(f, "[{}]", name),
            ("property", _) | ("shortcut", EdgeName::Str(_)) => {
                let text = name.to_string();
                if text.contains(' ') {
                    write!(f, "[\"{}\"]", text)
                } else {
                    write!(f, ".{}", text)
                }
            }
            ("shortcut", EdgeName::Index(i)) => write!(f, "[{}]", i),
            ("internal" | "hidden" | "invisible", _) => write!(f, "{{{}}}", name),
            _ => write!(f, "?{}?", name),
        }
    }
}

impl fmt::Debug for Edge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("offset", &self.absolute_offset())
            .field("type", &self.edge_type())
            .field("name", &self.name())
            .field("to_node", &self.node_offset())
            .finish()
    }
}

/// Iterates the edge records of a single node
#[derive(Clone, Debug)]
pub struct EdgeIterator<'s> {
    edge: Edge<'s>,
}

impl<'s> EdgeIterator<'s> {
    pub fn new(edge: Edge<'s>) -> Self {
        Self { edge }
    }
}

impl<'s> Cursor for EdgeIterator<'s> {
    type Item = Edge<'s>;

    fn first(&mut self) {
        self.edge.edge_index = 0;
    }

    fn has_next(&self) -> bool {
        self.edge.edge_index < self.edge.edges.len
    }

    fn next(&mut self) {
        self.edge.edge_index += self.edge.snapshot.layout.edge_fields_count;
    }

    fn index(&self) -> u32 {
        self.edge.edge_index
    }

    fn set_index(&mut self, index: u32) {
        self.edge.edge_index = index;
    }

    fn item(&self) -> &Edge<'s> {
        &self.edge
    }
}

/// View of one incoming edge, addressed by its position in a node's slice
/// of the flat retainer list.
///
/// Repositioning resolves the retaining node through the node index and
/// rebuilds the forward [`Edge`] view inside that node's edge list.
#[derive(Clone)]
pub struct RetainerEdge<'s> {
    snapshot: &'s HeapSnapshot,
    retainers: &'s [u32],
    retainer_index: u32,
    node: Node<'s>,
    edge: Edge<'s>,
}

impl<'s> RetainerEdge<'s> {
    pub fn new(snapshot: &'s HeapSnapshot, retainers: &'s [u32]) -> Self {
        let mut retainer = Self {
            snapshot,
            retainers,
            retainer_index: 0,
            node: Node::new(snapshot, ROOT_NODE_OFFSET),
            edge: Edge::new(snapshot, EdgeSlice::default(), 0),
        };
        if !retainers.is_empty() {
            retainer.setup_edge();
        }
        retainer
    }

    pub fn retainer_index(&self) -> u32 {
        self.retainer_index
    }

    pub fn set_retainer_index(&mut self, index: u32) {
        if index != self.retainer_index {
            self.retainer_index = index;
            if (index as usize) < self.retainers.len() {
                self.setup_edge();
            }
        }
    }

    pub fn len(&self) -> u32 {
        self.retainers.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.retainers.is_empty()
    }

    fn setup_edge(&mut self) {
        let global_edge_offset = self.retainers[self.retainer_index as usize];
        let node_offset = self.snapshot.find_nearest_node_offset(global_edge_offset);
        self.node.set_offset(node_offset);
        let edge_index = global_edge_offset - node_offset - self.snapshot.layout.first_edge_offset;
        self.edge = Edge::new(self.snapshot, self.node.raw_edges(), edge_index);
    }

    /// The retaining node.
    pub fn node(&self) -> &Node<'s> {
        &self.node
    }

    pub fn node_offset(&self) -> u32 {
        self.node.offset()
    }

    /// Forward edge from the retaining node to the retained one.
    pub fn edge(&self) -> &Edge<'s> {
        &self.edge
    }

    pub fn edge_type(&self) -> &'s str {
        self.edge.edge_type()
    }

    pub fn name(&self) -> EdgeName<'s> {
        self.edge.name()
    }

    pub fn has_string_name(&self) -> bool {
        self.edge.has_string_name()
    }

    pub fn is_element(&self) -> bool {
        self.edge.is_element()
    }

    pub fn is_hidden(&self) -> bool {
        self.edge.is_hidden()
    }

    pub fn is_internal(&self) -> bool {
        self.edge.is_internal()
    }

    pub fn is_invisible(&self) -> bool {
        self.edge.is_invisible()
    }

    pub fn is_shortcut(&self) -> bool {
        self.edge.is_shortcut()
    }
}

impl fmt::Display for RetainerEdge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.edge, f)
    }
}

impl fmt::Debug for RetainerEdge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetainerEdge")
            .field("retainer_index", &self.retainer_index)
            .field("node", &self.node)
            .field("edge", &self.edge)
            .finish()
    }
}

/// Iterates the retainers of a single node
#[derive(Clone, Debug)]
pub struct RetainerEdgeIterator<'s> {
    retainer: RetainerEdge<'s>,
}

impl<'s> RetainerEdgeIterator<'s> {
    pub fn new(retainer: RetainerEdge<'s>) -> Self {
        Self { retainer }
    }
}

impl<'s> Cursor for RetainerEdgeIterator<'s> {
    type Item = RetainerEdge<'s>;

    fn first(&mut self) {
        self.retainer.set_retainer_index(0);
    }

    fn has_next(&self) -> bool {
        (self.retainer.retainer_index as usize) < self.retainer.retainers.len()
    }

    fn next(&mut self) {
        let next = self.retainer.retainer_index + 1;
        self.retainer.set_retainer_index(next);
    }

    fn index(&self) -> u32 {
        self.retainer.retainer_index
    }

    fn set_index(&mut self, index: u32) {
        self.retainer.set_retainer_index(index);
    }

    fn item(&self) -> &RetainerEdge<'s> {
        &self.retainer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;

    fn edge_strings(snapshot: &HeapSnapshot) -> Vec<String> {
        let mut out = Vec::new();
        let mut iter = snapshot.root().edges();
        while iter.has_next() {
            out.push(iter.item().to_string());
            iter.next();
        }
        out
    }

    #[test]
    fn test_edge_rendering() {
        let mut b = SnapshotBuilder::new();
        let root = b.root();
        let a = b.node("object", "A", 3, 10, 10);
        b.edge(root, "context", "ctx", a);
        b.edge(root, "element", "4", a);
        b.edge(root, "property", "plain", a);
        b.edge(root, "property", "with space", a);
        b.edge(root, "shortcut", "global", a);
        b.edge(root, "shortcut", "12", a);
        b.edge(root, "shortcut", "-5", a);
        b.edge(root, "internal", "map", a);
        b.edge(root, "hidden", "2", a);
        let snapshot = b.snapshot().unwrap();

        assert_eq!(
            edge_strings(&snapshot),
            vec![
                "->ctx",
                "[4]",
                ".plain",
                "[\"with space\"]",
                ".global",
                "[12]",
                "[-5]",
                "{map}",
                "{2}"
            ]
        );
    }

    #[test]
    fn test_edge_names() {
        let mut b = SnapshotBuilder::new();
        let root = b.root();
        let a = b.node("object", "A", 3, 10, 10);
        b.edge(root, "element", "7", a);
        b.edge(root, "property", "foo", a);
        b.edge(root, "shortcut", "42", a);
        b.edge(root, "shortcut", "bar", a);
        let snapshot = b.snapshot().unwrap();

        let mut iter = snapshot.root().edges();
        let mut names = Vec::new();
        let mut string_named = Vec::new();
        while iter.has_next() {
            names.push(iter.item().name());
            string_named.push(iter.item().has_string_name());
            iter.next();
        }
        assert_eq!(
            names,
            vec![
                EdgeName::Index(7),
                EdgeName::Str("foo"),
                EdgeName::Index(42),
                EdgeName::Str("bar")
            ]
        );
        assert_eq!(string_named, vec![false, true, false, true]);
    }

    #[test]
    fn test_edge_target() {
        let mut b = SnapshotBuilder::new();
        let root = b.root();
        let a = b.node("object", "A", 3, 10, 10);
        b.edge(root, "property", "a", a);
        let snapshot = b.snapshot().unwrap();

        let iter = snapshot.root().edges();
        assert!(iter.has_next());
        assert_eq!(iter.item().node_offset(), 11);
        assert_eq!(iter.item().node().name(), "A");
        assert_eq!(iter.item().absolute_offset(), 8);
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index(" 3abc"), Some(3));
        assert_eq!(parse_index("-5"), Some(-5));
        assert_eq!(parse_index("+7"), Some(7));
        assert_eq!(parse_index("-"), None);
        assert_eq!(parse_index("abc"), None);
        assert_eq!(parse_index(""), None);
    }

    #[test]
    fn test_retainer_edge_resolves_source() {
        let mut b = SnapshotBuilder::new();
        let root = b.root();
        let a = b.node("object", "A", 3, 10, 10);
        let c = b.node("object", "C", 5, 10, 10);
        b.edge(root, "property", "a", a);
        b.edge(root, "property", "c", c);
        b.edge(a, "property", "child", c);
        let snapshot = b.snapshot().unwrap();

        let target = snapshot.node_by_id(5).unwrap();
        let mut iter = target.retainers();
        let mut seen = Vec::new();
        while iter.has_next() {
            let retainer = iter.item();
            seen.push((retainer.node().name().to_string(), retainer.to_string()));
            assert_eq!(retainer.edge().node_offset(), target.offset());
            iter.next();
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("".to_string(), ".c".to_string()),
                ("A".to_string(), ".child".to_string())
            ]
        );
    }
}
