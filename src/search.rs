//! A best-first search in the spirit of
//! [pathfinding's astar function](https://docs.rs/pathfinding/latest/pathfinding/directed/astar/index.html),
//! generalized so that a problem decides the priority of every node itself (not only `g + h`) and may
//! attach a successor to the parent of the expanded node, as any-angle planners do.
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::hash::Hash;

use fxhash::FxBuildHasher;
use indexmap::map::Entry::{Occupied, Vacant};
use indexmap::IndexMap;
use log::{debug, warn};
use num_traits::Float;

use crate::coord::Coord;
use crate::grid::OccupancyGrid;

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Grids up to this many cells get flat per-cell arrays, larger ones a hash map holding only the
/// cells the search touches.
pub const DENSE_STORE_LIMIT: usize = 1 << 24;

/// Which node a successor is connected through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Via {
    /// The node being expanded.
    Current,
    /// The parent of the node being expanded. Falls back to [Via::Current] at the root.
    Parent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Edge<N, C> {
    pub node: N,
    /// Cost of the move from the node given by `via`.
    pub cost: C,
    pub via: Via,
}

impl<N, C> Edge<N, C> {
    pub fn new(node: N, cost: C) -> Edge<N, C> {
        Edge {
            node,
            cost,
            via: Via::Current,
        }
    }

    pub fn via_parent(node: N, cost: C) -> Edge<N, C> {
        Edge {
            node,
            cost,
            via: Via::Parent,
        }
    }
}

/// The parts of a search that differ between planners.
pub trait SearchProblem<N, C> {
    /// Pushes the edges leaving `node` onto `out`. Called exactly once per node, when it is finalized,
    /// so problems that adapt while searching can update themselves here.
    fn expand(&mut self, node: &N, parent: Option<&N>, out: &mut Vec<Edge<N, C>>);

    /// Priority of reaching `node` from `parent` with accumulated cost `g`. Lower pops first.
    fn priority(&mut self, node: &N, parent: Option<&N>, g: C) -> C;

    fn is_goal(&self, node: &N) -> bool;
}

/// Best cost, parent and finalized flag per node.
pub trait SearchStore<N, C> {
    fn cost(&self, node: &N) -> Option<C>;
    fn parent(&self, node: &N) -> Option<N>;
    fn record(&mut self, node: &N, parent: Option<&N>, cost: C);
    /// Marks `node` as finalized, returning false if it already was.
    fn finalize(&mut self, node: &N) -> bool;
    fn is_finalized(&self, node: &N) -> bool;
    /// Number of nodes recorded so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Record<C> {
    parent: usize,
    cost: C,
    finalized: bool,
}

/// A store for any hashable node type, allocated lazily as nodes are reached.
pub struct SparseStore<N, C> {
    records: FxIndexMap<N, Record<C>>,
}

impl<N: Eq + Hash + Clone, C: Float> SparseStore<N, C> {
    pub fn new() -> SparseStore<N, C> {
        SparseStore {
            records: FxIndexMap::default(),
        }
    }
}

impl<N: Eq + Hash + Clone, C: Float> Default for SparseStore<N, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Eq + Hash + Clone, C: Float> SearchStore<N, C> for SparseStore<N, C> {
    fn cost(&self, node: &N) -> Option<C> {
        self.records.get(node).map(|r| r.cost)
    }

    fn parent(&self, node: &N) -> Option<N> {
        let parent = self.records.get(node)?.parent;
        self.records.get_index(parent).map(|(n, _)| n.clone())
    }

    fn record(&mut self, node: &N, parent: Option<&N>, cost: C) {
        let parent = parent
            .and_then(|p| self.records.get_index_of(p))
            .unwrap_or(usize::MAX);
        match self.records.entry(node.clone()) {
            Vacant(e) => {
                e.insert(Record {
                    parent,
                    cost,
                    finalized: false,
                });
            }
            Occupied(mut e) => {
                let r = e.get_mut();
                r.parent = parent;
                r.cost = cost;
            }
        }
    }

    fn finalize(&mut self, node: &N) -> bool {
        match self.records.get_mut(node) {
            Some(r) if !r.finalized => {
                r.finalized = true;
                true
            }
            _ => false,
        }
    }

    fn is_finalized(&self, node: &N) -> bool {
        self.records.get(node).map_or(false, |r| r.finalized)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Flat arrays indexed by cell, sized to the whole grid up front.
pub struct DenseStore<'g, C> {
    grid: &'g OccupancyGrid,
    cost: Vec<C>,
    parent: Vec<usize>,
    finalized: Vec<bool>,
    recorded: usize,
}

impl<'g, C: Float> DenseStore<'g, C> {
    pub fn new(grid: &'g OccupancyGrid) -> DenseStore<'g, C> {
        DenseStore {
            grid,
            cost: vec![C::infinity(); grid.len()],
            parent: vec![usize::MAX; grid.len()],
            finalized: vec![false; grid.len()],
            recorded: 0,
        }
    }
}

impl<'g, C: Float> SearchStore<Coord, C> for DenseStore<'g, C> {
    fn cost(&self, node: &Coord) -> Option<C> {
        let ix = self.grid.flat_index(node)?;
        let c = self.cost[ix];
        (c != C::infinity()).then_some(c)
    }

    fn parent(&self, node: &Coord) -> Option<Coord> {
        let ix = self.grid.flat_index(node)?;
        let p = self.parent[ix];
        (p != usize::MAX).then(|| self.grid.unflatten(p))
    }

    fn record(&mut self, node: &Coord, parent: Option<&Coord>, cost: C) {
        if let Some(ix) = self.grid.flat_index(node) {
            if self.cost[ix] == C::infinity() {
                self.recorded += 1;
            }
            self.cost[ix] = cost;
            self.parent[ix] = parent
                .and_then(|p| self.grid.flat_index(p))
                .unwrap_or(usize::MAX);
        }
    }

    fn finalize(&mut self, node: &Coord) -> bool {
        match self.grid.flat_index(node) {
            Some(ix) if !self.finalized[ix] => {
                self.finalized[ix] = true;
                true
            }
            _ => false,
        }
    }

    fn is_finalized(&self, node: &Coord) -> bool {
        self.grid
            .flat_index(node)
            .map_or(false, |ix| self.finalized[ix])
    }

    fn len(&self) -> usize {
        self.recorded
    }
}

/// Dense or sparse storage for grid searches, picked by grid size.
pub enum GridStore<'g, C> {
    Dense(DenseStore<'g, C>),
    Sparse(SparseStore<Coord, C>),
}

impl<'g, C: Float> GridStore<'g, C> {
    pub fn for_grid(grid: &'g OccupancyGrid) -> GridStore<'g, C> {
        if grid.len() <= DENSE_STORE_LIMIT {
            GridStore::Dense(DenseStore::new(grid))
        } else {
            GridStore::Sparse(SparseStore::new())
        }
    }
}

impl<'g, C: Float> SearchStore<Coord, C> for GridStore<'g, C> {
    fn cost(&self, node: &Coord) -> Option<C> {
        match self {
            GridStore::Dense(s) => s.cost(node),
            GridStore::Sparse(s) => s.cost(node),
        }
    }

    fn parent(&self, node: &Coord) -> Option<Coord> {
        match self {
            GridStore::Dense(s) => s.parent(node),
            GridStore::Sparse(s) => s.parent(node),
        }
    }

    fn record(&mut self, node: &Coord, parent: Option<&Coord>, cost: C) {
        match self {
            GridStore::Dense(s) => s.record(node, parent, cost),
            GridStore::Sparse(s) => s.record(node, parent, cost),
        }
    }

    fn finalize(&mut self, node: &Coord) -> bool {
        match self {
            GridStore::Dense(s) => s.finalize(node),
            GridStore::Sparse(s) => s.finalize(node),
        }
    }

    fn is_finalized(&self, node: &Coord) -> bool {
        match self {
            GridStore::Dense(s) => s.is_finalized(node),
            GridStore::Sparse(s) => s.is_finalized(node),
        }
    }

    fn len(&self) -> usize {
        match self {
            GridStore::Dense(s) => s.len(),
            GridStore::Sparse(s) => s.len(),
        }
    }
}

struct SmallestPriorityHolder<N, C> {
    priority: C,
    sequence: u64,
    node: N,
}

impl<N, C: PartialEq> Eq for SmallestPriorityHolder<N, C> {}

impl<N, C: PartialEq> PartialEq for SmallestPriorityHolder<N, C> {
    fn eq(&self, other: &Self) -> bool {
        self.priority.eq(&other.priority) && self.sequence == other.sequence
    }
}

impl<N, C: PartialOrd> PartialOrd for SmallestPriorityHolder<N, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N, C: PartialOrd> Ord for SmallestPriorityHolder<N, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; equal priorities pop in insertion order.
        match other
            .priority
            .partial_cmp(&self.priority)
            .unwrap_or(Ordering::Equal)
        {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            s => s,
        }
    }
}

/// Why a search produced no path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchFailure {
    /// The open set ran empty before the goal was popped.
    Exhausted,
    /// The parent chain from the goal did not lead back to the start.
    BrokenParents,
}

/// Walks the parent links back from `goal`. [None] when the chain does not end at `start`.
pub fn reconstruct_path<N, C, S>(store: &S, start: &N, goal: &N) -> Option<Vec<N>>
where
    N: Eq + Clone,
    S: SearchStore<N, C>,
{
    let mut path: Vec<N> =
        std::iter::successors(Some(goal.clone()), |node| store.parent(node))
            .take(store.len() + 1)
            .collect();
    if path.last() != Some(start) {
        return None;
    }
    path.reverse();
    Some(path)
}

/// Runs the search from `start` until the problem reports a popped node as the goal. Returns the
/// path from start to goal and its cost.
pub fn best_first_search<N, C, P, S>(
    start: &N,
    problem: &mut P,
    store: &mut S,
) -> Result<(Vec<N>, C), SearchFailure>
where
    N: Eq + Hash + Clone,
    C: Float,
    P: SearchProblem<N, C>,
    S: SearchStore<N, C>,
{
    let mut to_see = BinaryHeap::new();
    let mut sequence = 0u64;
    store.record(start, None, C::zero());
    to_see.push(SmallestPriorityHolder {
        priority: problem.priority(start, None, C::zero()),
        sequence,
        node: start.clone(),
    });
    let mut edges: Vec<Edge<N, C>> = Vec::new();
    let mut expanded = 0usize;

    while let Some(SmallestPriorityHolder { node, .. }) = to_see.pop() {
        if problem.is_goal(&node) {
            let cost = store.cost(&node).unwrap_or_else(C::zero);
            debug!("Goal popped after {} expansions", expanded);
            return match reconstruct_path::<N, C, S>(store, start, &node) {
                Some(path) => Ok((path, cost)),
                None => {
                    warn!("Parent chain from the goal does not reach the start");
                    Err(SearchFailure::BrokenParents)
                }
            };
        }
        // A node may sit in the heap several times if a cheaper way to it was found later.
        if !store.finalize(&node) {
            continue;
        }
        expanded += 1;
        let g = match store.cost(&node) {
            Some(g) => g,
            None => continue,
        };
        let parent = store.parent(&node);
        let parent_cost = parent.as_ref().and_then(|p| store.cost(p));

        edges.clear();
        problem.expand(&node, parent.as_ref(), &mut edges);
        for Edge { node: next, cost, via } in edges.drain(..) {
            if store.is_finalized(&next) {
                continue;
            }
            let (from, base) = match (via, &parent, parent_cost) {
                (Via::Parent, Some(p), Some(pc)) => (p, pc),
                _ => (&node, g),
            };
            let new_cost = base + cost;
            if store.cost(&next).map_or(true, |c| new_cost < c) {
                store.record(&next, Some(from), new_cost);
                sequence += 1;
                let priority = problem.priority(&next, Some(from), new_cost);
                to_see.push(SmallestPriorityHolder {
                    priority,
                    sequence,
                    node: next,
                });
            }
        }
    }
    warn!(
        "Search exhausted after {} expansions without reaching the goal",
        expanded
    );
    Err(SearchFailure::Exhausted)
}
