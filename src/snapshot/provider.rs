//! Filtered, sortable views over node and edge cursors
//!
//! [`FilteredOrderedIterator`] wraps any [`OrderedCursor`]: the first time
//! it is rewound or measured it walks the inner cursor once and keeps the
//! positions accepted by the filter. Sorting then reorders only that cached
//! position list; the inner cursor is repositioned to serve each item.

use std::cmp::Ordering;

use super::cursor::Cursor;
use super::edge::{Edge, EdgeIterator};
use super::node::{Node, NodeIterator};

/// Two-key sort order: primary key and direction, then the tie-break key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator<K> {
    pub field1: K,
    pub ascending1: bool,
    pub field2: K,
    pub ascending2: bool,
}

impl<K> Comparator<K> {
    pub fn new(field1: K, ascending1: bool, field2: K, ascending2: bool) -> Self {
        Self {
            field1,
            ascending1,
            field2,
            ascending2,
        }
    }
}

fn directed(ordering: Ordering, ascending: bool) -> Ordering {
    if ascending {
        ordering
    } else {
        ordering.reverse()
    }
}

/// Node fields available as sort keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeField {
    Name,
    ClassName,
    Type,
    Id,
    SelfSize,
    RetainedSize,
    EdgesCount,
}

impl NodeField {
    pub fn compare(&self, a: &Node<'_>, b: &Node<'_>) -> Ordering {
        match self {
            NodeField::Name => a.name().cmp(b.name()),
            NodeField::ClassName => a.class_name().cmp(&b.class_name()),
            NodeField::Type => a.node_type().cmp(b.node_type()),
            NodeField::Id => a.id().cmp(&b.id()),
            NodeField::SelfSize => a.self_size().cmp(&b.self_size()),
            NodeField::RetainedSize => a.retained_size().cmp(&b.retained_size()),
            NodeField::EdgesCount => a.edges_count().cmp(&b.edges_count()),
        }
    }
}

/// Edge sort keys: the edge's own name, or a field of its target node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeSortKey {
    EdgeName,
    Node(NodeField),
}

impl EdgeSortKey {
    fn compare(&self, a: &Edge<'_>, b: &Edge<'_>) -> Ordering {
        match self {
            // String names before indexes, then by value.
            EdgeSortKey::EdgeName => a.name().cmp(&b.name()),
            EdgeSortKey::Node(field) => field.compare(&a.node(), &b.node()),
        }
    }
}

/// A cursor whose raw positions can be ordered by a [`Comparator`]
pub trait OrderedCursor: Cursor + Clone {
    type SortKey: Clone + PartialEq;

    /// Sort raw positions, as returned by [`Cursor::index`], in place.
    fn sort_positions(&self, positions: &mut [u32], comparator: &Comparator<Self::SortKey>);
}

impl<'s> OrderedCursor for NodeIterator<'s> {
    type SortKey = NodeField;

    fn sort_positions(&self, positions: &mut [u32], comparator: &Comparator<NodeField>) {
        let mut a = self.item().clone();
        let mut b = self.item().clone();
        positions.sort_by(|&x, &y| {
            a.set_offset(x);
            b.set_offset(y);
            directed(comparator.field1.compare(&a, &b), comparator.ascending1).then_with(|| {
                directed(comparator.field2.compare(&a, &b), comparator.ascending2)
            })
        });
    }
}

impl<'s> OrderedCursor for EdgeIterator<'s> {
    type SortKey = EdgeSortKey;

    /// `__proto__` edges are pinned first for an ascending primary key and
    /// last for a descending one, whatever the keys are.
    fn sort_positions(&self, positions: &mut [u32], comparator: &Comparator<EdgeSortKey>) {
        let mut a = self.item().clone();
        let mut b = self.item().clone();
        positions.sort_by(|&x, &y| {
            a.set_edge_index(x);
            b.set_edge_index(y);
            let pinned = match (a.name().is_proto(), b.name().is_proto()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            };
            directed(pinned, comparator.ascending1)
                .then_with(|| directed(comparator.field1.compare(&a, &b), comparator.ascending1))
                .then_with(|| directed(comparator.field2.compare(&a, &b), comparator.ascending2))
        });
    }
}

/// Filtered subsequence of a cursor, optionally sorted
pub struct FilteredOrderedIterator<'f, C: OrderedCursor> {
    iterator: C,
    filter: Option<Box<dyn Fn(&C::Item) -> bool + 'f>>,
    iteration_order: Option<Vec<u32>>,
    position: usize,
    last_comparator: Option<Comparator<C::SortKey>>,
    instances_count: u32,
}

/// Provider over every node of a snapshot
pub type NodesProvider<'s> = FilteredOrderedIterator<'s, NodeIterator<'s>>;

/// Provider over the outgoing edges of one node
pub type EdgesProvider<'s> = FilteredOrderedIterator<'s, EdgeIterator<'s>>;

impl<'f, C: OrderedCursor> FilteredOrderedIterator<'f, C> {
    pub fn new(iterator: C, filter: Option<Box<dyn Fn(&C::Item) -> bool + 'f>>) -> Self {
        Self {
            iterator,
            filter,
            iteration_order: None,
            position: 0,
            last_comparator: None,
            instances_count: 0,
        }
    }

    fn accepts(&self, item: &C::Item) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(item))
    }

    fn create_iteration_order(&mut self) -> Vec<u32> {
        let mut order = Vec::new();
        self.iterator.first();
        while self.iterator.has_next() {
            if self.accepts(self.iterator.item()) {
                order.push(self.iterator.index());
            }
            self.iterator.next();
        }
        order
    }

    fn iteration_order(&mut self) -> &[u32] {
        if self.iteration_order.is_none() {
            let order = self.create_iteration_order();
            self.iteration_order = Some(order);
        }
        self.iteration_order.as_deref().unwrap_or_default()
    }

    /// Point the inner cursor at the current position, if any.
    fn sync(&mut self) {
        if let Some(&index) = self
            .iteration_order
            .as_ref()
            .and_then(|order| order.get(self.position))
        {
            self.iterator.set_index(index);
        }
    }

    /// Number of accepted items. Materializes the position list.
    pub fn len(&mut self) -> usize {
        self.iteration_order().len()
    }

    /// Whether no item passes the filter. Stops at the first accepted item
    /// when the position list is not built yet.
    pub fn is_empty(&self) -> bool {
        if let Some(order) = &self.iteration_order {
            return order.is_empty();
        }
        let mut iterator = self.iterator.clone();
        iterator.first();
        while iterator.has_next() {
            if self.accepts(iterator.item()) {
                return false;
            }
            iterator.next();
        }
        true
    }

    /// Reorder the position list. Returns `false` without doing anything
    /// when `comparator` equals the one applied last.
    pub fn sort(&mut self, comparator: &Comparator<C::SortKey>) -> bool {
        if self.last_comparator.as_ref() == Some(comparator) {
            return false;
        }
        self.last_comparator = Some(comparator.clone());
        self.iteration_order();
        if let Some(order) = self.iteration_order.as_mut() {
            self.iterator.sort_positions(order, comparator);
        }
        self.sync();
        true
    }

    pub fn last_comparator(&self) -> Option<&Comparator<C::SortKey>> {
        self.last_comparator.as_ref()
    }

    pub fn inc_instances_count(&mut self) {
        self.instances_count += 1;
    }

    pub fn reset_instances_count(&mut self) {
        self.instances_count = 0;
    }

    pub fn instances_count(&self) -> u32 {
        self.instances_count
    }
}

impl<'f, C: OrderedCursor> Cursor for FilteredOrderedIterator<'f, C> {
    type Item = C::Item;

    /// Rewind, building the position list on first use.
    fn first(&mut self) {
        self.iteration_order();
        self.position = 0;
        self.sync();
    }

    fn has_next(&self) -> bool {
        self.iteration_order
            .as_ref()
            .is_some_and(|order| self.position < order.len())
    }

    fn next(&mut self) {
        self.position += 1;
        self.sync();
    }

    /// Position in the filtered order, not a raw buffer position.
    fn index(&self) -> u32 {
        self.position as u32
    }

    fn set_index(&mut self, index: u32) {
        self.position = index as usize;
        self.sync();
    }

    fn item(&self) -> &C::Item {
        self.iterator.item()
    }
}
