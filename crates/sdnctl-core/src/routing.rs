//! This module defines how forwarding paths are computed over the topology.
//!
//! The default algorithm, [`PriorityRouting`], runs a shortest-path search whose edge cost
//! depends on the flow's priority, then breaks ties among all minimum-cost paths with an
//! explicit total order:
//!
//! 1. lowest maximum utilization ratio over the path's channels,
//! 2. fewest nodes,
//! 3. lexicographically smallest node sequence.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::Add;

use log::debug;
use ordered_float::OrderedFloat;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::constants::DEFAULT_MAX_CANDIDATE_PATHS;
use crate::network::{Channel, LinkKey, NodeId, Path, Priority, Topology};
use crate::units::Mbps;

/// The trait implemented by all routing algorithms.
pub trait RoutingAlgo {
    /// Compute a path for `request` over the current state of `topology`.
    fn compute_path(&self, topology: &Topology, request: &PathRequest) -> Result<Path, PathError>;

    /// Compute a path that shares no link with `primary`. Returns `None` if the topology offers
    /// no such path; a missing backup is not an error.
    fn compute_backup(
        &self,
        topology: &Topology,
        request: &PathRequest,
        primary: &Path,
    ) -> Option<Path> {
        if primary.is_trivial() {
            return None;
        }
        let mut excluded = request.excluded.clone();
        excluded.extend(primary.links());
        let request = PathRequest {
            excluded,
            ..request.clone()
        };
        match self.compute_path(topology, &request) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("no backup for {} -> {}: {e}", request.src, request.dst);
                None
            }
        }
    }
}

impl<R: RoutingAlgo> RoutingAlgo for &R {
    fn compute_path(&self, topology: &Topology, request: &PathRequest) -> Result<Path, PathError> {
        (*self).compute_path(topology, request)
    }
}

/// A request for a path between two nodes.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct PathRequest {
    #[builder(setter(into))]
    pub src: NodeId,
    #[builder(setter(into))]
    pub dst: NodeId,
    #[builder(default, setter(into))]
    pub priority: Priority,
    /// If set, only channels with at least this much residual capacity are used.
    #[builder(default, setter(strip_option))]
    pub bandwidth: Option<Mbps>,
    /// Links the path must avoid.
    #[builder(default)]
    pub excluded: FxHashSet<LinkKey>,
}

/// Priority- and load-aware shortest-path routing.
///
/// High-priority requests minimise total delay, using total link weight as a tie-break. All
/// other requests minimise total link weight. Among the minimum-cost paths, the one with the
/// lowest peak utilization ratio wins, then the shortest, then the lexicographically smallest.
#[derive(Debug, Clone, derive_new::new)]
pub struct PriorityRouting {
    /// At most this many minimum-cost paths are ranked.
    max_candidates: usize,
}

impl Default for PriorityRouting {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CANDIDATE_PATHS)
    }
}

impl RoutingAlgo for PriorityRouting {
    fn compute_path(&self, topology: &Topology, request: &PathRequest) -> Result<Path, PathError> {
        let PathRequest {
            src,
            dst,
            priority,
            bandwidth,
            excluded,
        } = request;
        let s = topology
            .idx_of(src)
            .ok_or_else(|| PathError::NodeNotFound(src.clone()))?;
        let d = topology
            .idx_of(dst)
            .ok_or_else(|| PathError::NodeNotFound(dst.clone()))?;
        if s == d {
            return Ok(Path::trivial(src.clone()));
        }

        let model = CostModel::for_priority(*priority);
        let connected = |chan: &Channel| !excluded.contains(&chan.key());
        let usable = |chan: &Channel| {
            connected(chan) && bandwidth.map_or(true, |bw| chan.residual() >= bw)
        };

        let search = Search::run(topology, s, model, usable);
        if let Some(cost) = search.cost_to(d) {
            let path = self.select(topology, &search, s, d);
            debug!(
                "path {src} -> {dst} (priority {priority}, {model:?}, cost {cost:?}): {path}"
            );
            return Ok(path);
        }

        // Tell a pair that is only short on capacity apart from a disconnected one
        if let Some(&bandwidth) = bandwidth.as_ref() {
            if Search::run(topology, s, model, connected)
                .cost_to(d)
                .is_some()
            {
                return Err(PathError::CapacityExceeded {
                    src: src.clone(),
                    dst: dst.clone(),
                    bandwidth,
                });
            }
        }
        Err(PathError::PathNotFound {
            src: src.clone(),
            dst: dst.clone(),
        })
    }
}

impl PriorityRouting {
    /// Rank the minimum-cost paths from `src` to `dst`. `dst` must be reachable in `search`.
    fn select(&self, topology: &Topology, search: &Search, src: NodeIndex, dst: NodeIndex) -> Path {
        let mut candidates = Candidates {
            topology,
            search,
            src,
            remaining: self.max_candidates.max(1),
            best: None,
        };
        let mut stack = vec![dst];
        candidates.walk(&mut stack);
        if candidates.remaining == 0 {
            debug!("candidate limit of {} reached", self.max_candidates);
        }
        // A reachable destination always yields at least one candidate
        candidates
            .best
            .map(|rank| Path::new(rank.nodes))
            .unwrap_or_else(|| Path::trivial(topology.graph[src].id.clone()))
    }
}

#[derive(Debug, Clone, Copy)]
enum CostModel {
    LowestDelay,
    LowestWeight,
}

impl CostModel {
    fn for_priority(priority: Priority) -> Self {
        if priority.is_high() {
            Self::LowestDelay
        } else {
            Self::LowestWeight
        }
    }

    fn cost_of(self, chan: &Channel) -> PathCost {
        let attrs = chan.attrs();
        match self {
            Self::LowestDelay => PathCost {
                primary: attrs.delay.into_u64(),
                secondary: attrs.weight.into_u64(),
            },
            Self::LowestWeight => PathCost {
                primary: attrs.weight.into_u64(),
                secondary: 0,
            },
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PathCost {
    primary: u64,
    secondary: u64,
}

impl Add for PathCost {
    type Output = PathCost;

    fn add(self, rhs: Self) -> Self::Output {
        PathCost {
            primary: self.primary.saturating_add(rhs.primary),
            secondary: self.secondary.saturating_add(rhs.secondary),
        }
    }
}

/// The result of a Dijkstra search that keeps every minimum-cost predecessor, so that all
/// minimum-cost paths can be recovered.
struct Search {
    costs: FxHashMap<NodeIndex, PathCost>,
    preds: FxHashMap<NodeIndex, Vec<NodeIndex>>,
}

impl Search {
    fn run<F>(topology: &Topology, src: NodeIndex, model: CostModel, usable: F) -> Self
    where
        F: Fn(&Channel) -> bool,
    {
        let g = &topology.graph;
        let mut costs = FxHashMap::default();
        let mut preds: FxHashMap<NodeIndex, Vec<NodeIndex>> = FxHashMap::default();
        let mut heap = BinaryHeap::new();
        costs.insert(src, PathCost::default());
        heap.push(Reverse((PathCost::default(), src)));

        while let Some(Reverse((cost, n))) = heap.pop() {
            if matches!(costs.get(&n), Some(&best) if cost > best) {
                continue;
            }
            for edge in g.edges(n) {
                let chan = edge.weight();
                if !usable(chan) {
                    continue;
                }
                let next = edge.target();
                let candidate = cost + model.cost_of(chan);
                match costs.get(&next) {
                    Some(&best) if candidate > best => {}
                    Some(&best) if candidate == best => {
                        preds.entry(next).or_default().push(n);
                    }
                    _ => {
                        costs.insert(next, candidate);
                        preds.insert(next, vec![n]);
                        heap.push(Reverse((candidate, next)));
                    }
                }
            }
        }

        // Walk predecessors in node-ID order so candidate enumeration is deterministic
        for list in preds.values_mut() {
            list.sort_by(|&x, &y| g[x].id.cmp(&g[y].id));
            list.dedup();
        }
        Self { costs, preds }
    }

    fn cost_to(&self, n: NodeIndex) -> Option<PathCost> {
        self.costs.get(&n).copied()
    }
}

/// The tie-break key of a minimum-cost path. Smaller is better.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    max_ratio: OrderedFloat<f64>,
    nr_nodes: usize,
    nodes: Vec<NodeId>,
}

struct Candidates<'a> {
    topology: &'a Topology,
    search: &'a Search,
    src: NodeIndex,
    remaining: usize,
    best: Option<Rank>,
}

impl Candidates<'_> {
    /// Extends the reversed partial path in `stack` towards the source along minimum-cost
    /// predecessors, ranking each complete simple path.
    fn walk(&mut self, stack: &mut Vec<NodeIndex>) {
        let Some(&n) = stack.last() else {
            return;
        };
        if n == self.src {
            self.remaining -= 1;
            self.consider(stack);
            return;
        }
        let search = self.search;
        let Some(preds) = search.preds.get(&n) else {
            return;
        };
        for &p in preds {
            if self.remaining == 0 {
                return;
            }
            if stack.contains(&p) {
                continue;
            }
            stack.push(p);
            self.walk(stack);
            stack.pop();
        }
    }

    fn consider(&mut self, reversed: &[NodeIndex]) {
        let topology = self.topology;
        let g = &topology.graph;
        let max_ratio = reversed
            .windows(2)
            .filter_map(|w| g.find_edge(w[1], w[0]))
            .map(|e| g[e].utilization_ratio())
            .max()
            .unwrap_or_default();
        let rank = Rank {
            max_ratio,
            nr_nodes: reversed.len(),
            nodes: reversed.iter().rev().map(|&i| g[i].id.clone()).collect(),
        };
        if self.best.as_ref().map_or(true, |best| rank < *best) {
            self.best = Some(rank);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("no path from {src} to {dst}")]
    PathNotFound { src: NodeId, dst: NodeId },

    #[error("no path from {src} to {dst} has {bandwidth} of residual capacity")]
    CapacityExceeded {
        src: NodeId,
        dst: NodeId,
        bandwidth: Mbps,
    },
}
