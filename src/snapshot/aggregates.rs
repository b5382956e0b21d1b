//! Class-name histogram over all nodes

use std::borrow::Cow;
use std::cell::OnceCell;
use std::time::Instant;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use super::cursor::Cursor;
use super::node::Node;
use super::HeapSnapshot;

/// Per-class totals
#[derive(Debug, Clone, Serialize)]
pub struct Aggregate {
    pub count: u32,
    pub self_size: u64,
    pub max_retained: u32,
    pub node_type: String,
    /// Representative name; only set for object and native classes.
    pub name: Option<String>,
    #[serde(skip)]
    node_offsets: OnceCell<Vec<u32>>,
}

impl Aggregate {
    fn new(node: &Node<'_>) -> Self {
        let node_type = node.node_type();
        let name_matters = matches!(node_type, "object" | "native");
        Self {
            count: 0,
            self_size: 0,
            max_retained: 0,
            node_type: node_type.to_string(),
            name: name_matters.then(|| node.name().to_string()),
            node_offsets: OnceCell::new(),
        }
    }

    /// Member node offsets sorted by id, once built with
    /// `aggregates(true)`.
    pub fn node_offsets(&self) -> Option<&[u32]> {
        self.node_offsets.get().map(Vec::as_slice)
    }
}

/// Aggregates keyed by class name
pub type Aggregates = FxHashMap<String, Aggregate>;

/// Nodes reporting no self size are skipped, except native ones whose
/// allocations are accounted elsewhere.
fn is_counted(node: &Node<'_>) -> bool {
    node.self_size() != 0 || node.node_type() == "native"
}

impl HeapSnapshot {
    /// Class aggregates. With `with_node_indexes`, every entry also gets its
    /// member list; that pass runs at most once.
    pub fn aggregates(&self, with_node_indexes: bool) -> &Aggregates {
        let aggregates = self.aggregates.get_or_init(|| self.build_aggregates());
        if with_node_indexes && !self.aggregates_with_indexes.get() {
            self.build_aggregate_indexes(aggregates);
            self.aggregates_with_indexes.set(true);
        }
        aggregates
    }

    fn build_aggregates(&self) -> Aggregates {
        let started = Instant::now();
        let mut aggregates = Aggregates::default();
        let mut iter = self.nodes();
        while iter.has_next() {
            let node = iter.item();
            if is_counted(node) {
                let class_name = node.class_name();
                if !aggregates.contains_key(&*class_name) {
                    aggregates.insert(class_name.to_string(), Aggregate::new(node));
                }
                if let Some(entry) = aggregates.get_mut(&*class_name) {
                    entry.count += 1;
                    entry.self_size += node.self_size() as u64;
                    entry.max_retained = entry.max_retained.max(node.retained_size());
                }
            }
            iter.next();
        }
        debug!(
            "Built {} class aggregates in {:?}",
            aggregates.len(),
            started.elapsed()
        );
        aggregates
    }

    fn build_aggregate_indexes(&self, aggregates: &Aggregates) {
        let started = Instant::now();
        let mut members: FxHashMap<Cow<'_, str>, Vec<u32>> = FxHashMap::default();
        let mut iter = self.nodes();
        while iter.has_next() {
            // Every member of a class that has an entry, counted or not.
            let node = iter.item();
            let class_name = node.class_name();
            if aggregates.contains_key(&*class_name) {
                members.entry(class_name).or_default().push(node.offset());
            }
            iter.next();
        }

        for (class_name, mut offsets) in members {
            // Ids are stable across snapshots, offsets are not.
            offsets.sort_by_key(|&offset| self.node_at(offset).id());
            if let Some(aggregate) = aggregates.get(&*class_name) {
                let _ = aggregate.node_offsets.set(offsets);
            }
        }
        debug!("Built aggregate member lists in {:?}", started.elapsed());
    }
}
