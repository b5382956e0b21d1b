//! Retaining-path search
//!
//! [`PathFinder`] answers "why is this object alive" by walking retainer
//! edges backwards from a target until it reaches a node the root points at
//! directly. The search deepens iteratively, one path length at a time, so
//! shorter paths are always reported first. It is a resumable state machine:
//! every [`PathFinder::find_next`] call does a bounded amount of work and
//! either reports a path, asks to be called again, or reports exhaustion.

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use super::cursor::Cursor;
use super::edge::{RetainerEdge, RetainerEdgeIterator};
use super::node::Node;
use super::HeapSnapshot;

/// Search settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFinderOptions {
    /// Walk through hidden edges and hidden nodes.
    pub show_hidden: bool,
    /// Paths of this many edges or more are never explored.
    pub length_limit: usize,
    /// Work done by one `find_next` call before it suspends.
    pub steps_per_call: usize,
}

impl Default for PathFinderOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            length_limit: 15,
            steps_per_call: 100_000,
        }
    }
}

/// A rendered retaining path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetainingPath {
    /// The root child first, then the edges down to the target.
    pub path: String,
    /// Number of retainer edges.
    pub len: usize,
}

/// Outcome of one [`PathFinder::find_next`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSearch {
    Found(RetainingPath),
    /// The step budget ran out; call again to continue.
    Suspended,
    /// No more paths under the length limit.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Start a fresh walk at the current depth.
    Start,
    /// The top of the stack is a candidate edge, not yet checked.
    Running,
    /// A path was just reported; move past its top edge first.
    Resume,
    Done,
}

/// Iterative-deepening search for retaining paths of one node
pub struct PathFinder<'s> {
    snapshot: &'s HeapSnapshot,
    target: u32,
    options: PathFinderOptions,
    root_children: FxHashSet<u32>,
    max_length: usize,
    /// One retainer cursor per path edge; `stack[0]` walks the target's
    /// retainers and `stack[i + 1]` those of `stack[i]`'s retaining node.
    stack: Vec<RetainerEdgeIterator<'s>>,
    /// Retaining nodes of every edge below the top, plus the target.
    on_path: FxHashSet<u32>,
    phase: Phase,
}

impl<'s> PathFinder<'s> {
    /// A zero step budget is raised to one so every call makes progress.
    pub fn new(snapshot: &'s HeapSnapshot, target: &Node<'s>, mut options: PathFinderOptions) -> Self {
        options.steps_per_call = options.steps_per_call.max(1);
        let mut finder = Self {
            snapshot,
            target: target.offset(),
            options,
            root_children: FxHashSet::default(),
            max_length: 1,
            stack: Vec::new(),
            on_path: FxHashSet::default(),
            phase: Phase::Start,
        };
        finder.root_children = finder.fill_root_children(|_| true);
        finder
    }

    /// Replace the set of accepted path ends with the root children passing
    /// `filter`.
    pub fn update_roots<F>(&mut self, filter: F)
    where
        F: Fn(&Node<'s>) -> bool,
    {
        self.root_children = self.fill_root_children(filter);
    }

    fn fill_root_children<F>(&self, filter: F) -> FxHashSet<u32>
    where
        F: Fn(&Node<'s>) -> bool,
    {
        let mut children = FxHashSet::default();
        let mut iter = self.snapshot.root().edges();
        while iter.has_next() {
            let edge = iter.item();
            if filter(&edge.node()) {
                children.insert(edge.node_offset());
            }
            iter.next();
        }
        children
    }

    /// Current search depth.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Run until the next path, the step budget, or the length limit.
    pub fn find_next(&mut self) -> PathSearch {
        for _ in 0..self.options.steps_per_call {
            match self.phase {
                Phase::Done => return PathSearch::Exhausted,
                Phase::Start => self.start(),
                Phase::Resume => {
                    self.advance_top();
                    self.phase = Phase::Running;
                }
                Phase::Running => {
                    if let Some(path) = self.step() {
                        self.phase = Phase::Resume;
                        return PathSearch::Found(path);
                    }
                }
            }
        }
        match self.phase {
            Phase::Done => PathSearch::Exhausted,
            _ => PathSearch::Suspended,
        }
    }

    fn start(&mut self) {
        self.stack.clear();
        self.on_path.clear();
        self.on_path.insert(self.target);
        self.stack
            .push(self.snapshot.node_at(self.target).retainers());
        self.phase = Phase::Running;
    }

    /// Look at the top candidate once: reject it, report it, or descend.
    fn step(&mut self) -> Option<RetainingPath> {
        let depth = self.stack.len();
        let (usable, retaining_offset) = match self.stack.last() {
            Some(top) if top.has_next() => {
                let edge = top.item();
                (!self.skip_edge(edge), edge.node_offset())
            }
            _ => {
                self.backtrack();
                return None;
            }
        };

        if !usable {
            self.advance_top();
            return None;
        }
        if depth == self.max_length {
            if self.root_children.contains(&retaining_offset) {
                return Some(self.render());
            }
            self.advance_top();
            return None;
        }

        self.on_path.insert(retaining_offset);
        self.stack
            .push(self.snapshot.node_at(retaining_offset).retainers());
        None
    }

    fn skip_edge(&self, edge: &RetainerEdge<'_>) -> bool {
        edge.is_invisible()
            || (!self.options.show_hidden && (edge.is_hidden() || edge.node().is_hidden()))
            || self.on_path.contains(&edge.node_offset())
    }

    fn advance_top(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            top.next();
        }
    }

    /// Drop an exhausted cursor; deepen once the bottom one is exhausted.
    fn backtrack(&mut self) {
        self.stack.pop();
        match self.stack.last_mut() {
            Some(parent) => {
                self.on_path.remove(&parent.item().node_offset());
                parent.next();
            }
            None => {
                self.max_length += 1;
                if self.max_length >= self.options.length_limit {
                    debug!(
                        "Path search for node at {} exhausted at length {}",
                        self.target, self.max_length
                    );
                    self.phase = Phase::Done;
                } else {
                    self.phase = Phase::Start;
                }
            }
        }
    }

    fn render(&self) -> RetainingPath {
        let mut path = String::new();
        if let Some(top) = self.stack.last() {
            path.push_str(&node_to_string(top.item().node()));
        }
        for iter in self.stack.iter().rev() {
            path.push_str(&iter.item().to_string());
        }
        RetainingPath {
            path,
            len: self.stack.len(),
        }
    }
}

/// `name@id`, or the bare name for the root (id 1).
pub fn node_to_string(node: &Node<'_>) -> String {
    if node.id() == 1 {
        node.name().to_string()
    } else {
        format!("{}@{}", node.name(), node.id())
    }
}
