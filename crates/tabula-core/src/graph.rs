//! Foreign-key dependency graph cache.
//!
//! The graph is owned by the connection and built lazily from the catalog.
//! Schema changes never mutate it in place: they call `invalidate()` and the
//! next traversal reloads from scratch.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;

use crate::catalog::Catalog;
use crate::relock;

/// One foreign-key edge from a child table to a parent table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Pairs of (child attribute, parent attribute) in parent key order.
    pub attr_map: Vec<(String, String)>,
    /// Any child attribute renamed relative to its parent attribute.
    pub aliased: bool,
    /// All child attributes of the edge belong to the child's primary key.
    pub primary: bool,
}

impl ForeignKey {
    pub fn child_attributes(&self) -> Vec<&str> {
        self.attr_map.iter().map(|(c, _)| c.as_str()).collect()
    }

    pub fn parent_attributes(&self) -> Vec<&str> {
        self.attr_map.iter().map(|(_, p)| p.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
struct Edge {
    child: String,
    parent: String,
    fk: ForeignKey,
}

#[derive(Debug, Default)]
struct GraphInner {
    loaded: bool,
    nodes: BTreeSet<String>,
    edges: Vec<Edge>,
}

/// Cached dependency graph over fully qualified table names.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    inner: Mutex<GraphInner>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        relock(&self.inner).loaded
    }

    /// Discard the cached graph. The next traversal reloads from the catalog.
    pub fn invalidate(&self) {
        let mut inner = relock(&self.inner);
        inner.loaded = false;
        inner.nodes.clear();
        inner.edges.clear();
    }

    /// Rebuild the graph from the catalog's declared tables.
    pub fn load_from(&self, catalog: &Catalog) {
        let mut inner = relock(&self.inner);
        inner.nodes.clear();
        inner.edges.clear();
        for (child, record) in catalog.records() {
            inner.nodes.insert(child.clone());
            for (parent, fk) in record.foreign_keys {
                inner.nodes.insert(parent.clone());
                inner.edges.push(Edge {
                    child: child.clone(),
                    parent,
                    fk,
                });
            }
        }
        inner.loaded = true;
    }

    pub fn contains(&self, full_name: &str) -> bool {
        relock(&self.inner).nodes.contains(full_name)
    }

    pub fn nodes(&self) -> Vec<String> {
        relock(&self.inner).nodes.iter().cloned().collect()
    }

    /// Parent tables of `full_name` with their foreign-key edges.
    /// `primary` filters edges by their primary flag; `None` returns all.
    pub fn parents(&self, full_name: &str, primary: Option<bool>) -> Vec<(String, ForeignKey)> {
        relock(&self.inner)
            .edges
            .iter()
            .filter(|e| e.child == full_name && primary.is_none_or(|p| e.fk.primary == p))
            .map(|e| (e.parent.clone(), e.fk.clone()))
            .collect()
    }

    /// Child tables of `full_name` with their foreign-key edges.
    pub fn children(&self, full_name: &str, primary: Option<bool>) -> Vec<(String, ForeignKey)> {
        relock(&self.inner)
            .edges
            .iter()
            .filter(|e| e.parent == full_name && primary.is_none_or(|p| e.fk.primary == p))
            .map(|e| (e.child.clone(), e.fk.clone()))
            .collect()
    }

    /// All tables reachable downstream of `full_name` (itself included, first)
    /// in topological order: every parent precedes all of its children.
    pub fn descendants(&self, full_name: &str) -> Vec<String> {
        let inner = relock(&self.inner);
        let reachable = reach(&inner.edges, full_name, Direction::Down);
        topo_sort(&inner.edges, &reachable, Direction::Down, full_name)
    }

    /// All tables upstream of `full_name` (itself included, first) in reverse
    /// topological order: every child precedes all of its parents.
    pub fn ancestors(&self, full_name: &str) -> Vec<String> {
        let inner = relock(&self.inner);
        let reachable = reach(&inner.edges, full_name, Direction::Up);
        topo_sort(&inner.edges, &reachable, Direction::Up, full_name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Down,
    Up,
}

fn step<'a>(edge: &'a Edge, direction: Direction) -> (&'a str, &'a str) {
    match direction {
        Direction::Down => (&edge.parent, &edge.child),
        Direction::Up => (&edge.child, &edge.parent),
    }
}

fn reach(edges: &[Edge], start: &str, direction: Direction) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    seen.insert(start.to_string());
    let mut queue = VecDeque::from([start.to_string()]);
    while let Some(node) = queue.pop_front() {
        for edge in edges {
            let (from, to) = step(edge, direction);
            if from == node && seen.insert(to.to_string()) {
                queue.push_back(to.to_string());
            }
        }
    }
    seen
}

/// Kahn's algorithm restricted to `nodes`, tie-broken by name for
/// deterministic output. `start` is emitted first.
fn topo_sort(
    edges: &[Edge],
    nodes: &BTreeSet<String>,
    direction: Direction,
    start: &str,
) -> Vec<String> {
    let mut in_degree: BTreeMap<&str, usize> = nodes.iter().map(|n| (n.as_str(), 0)).collect();
    for edge in edges {
        let (from, to) = step(edge, direction);
        if nodes.contains(from) {
            if let Some(deg) = in_degree.get_mut(to) {
                *deg += 1;
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while !ready.is_empty() {
        let node = if ready.contains(start) {
            start
        } else {
            match ready.first() {
                Some(n) => *n,
                None => break,
            }
        };
        ready.remove(node);
        order.push(node.to_string());
        for edge in edges {
            let (from, to) = step(edge, direction);
            if from == node {
                if let Some(deg) = in_degree.get_mut(to) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(to);
                    }
                }
            }
        }
    }
    order
}
