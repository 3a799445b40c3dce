use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::Direction;
use rustc_hash::FxHashMap;

use crate::network::types::{Channel, Link, LinkAttrs, LinkKey, Node, NodeId, Path};
use crate::units::Mbps;

/// The topology store. Every link is kept as a pair of directed channels so that each direction
/// accounts for its own utilization.
///
/// Correctness properties:
///
/// - Every node has a unique, non-empty ID.
/// - Every link has two distinct endpoints that are both present.
/// - For any two nodes there is at most one link between them, and it always has both channels.
/// - Every link has a positive capacity.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub(crate) graph: StableDiGraph<Node, Channel>,
    id2idx: FxHashMap<NodeId, NodeIndex>,
    // Links taken down by failure simulation, kept so they can be restored.
    failed: BTreeMap<LinkKey, LinkAttrs>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), TopologyError> {
        if node.id.as_str().is_empty() {
            return Err(TopologyError::InvalidParameter(
                "node IDs must not be empty".into(),
            ));
        }
        if self.id2idx.contains_key(&node.id) {
            return Err(TopologyError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.id2idx.insert(id.clone(), idx);
        info!("added node {id}");
        Ok(())
    }

    /// Removes a node together with all of its links. The returned events describe every link
    /// that disappeared with the node, in the order they were removed.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<(Node, Vec<LinkEvent>), TopologyError> {
        let idx = self.try_idx_of(id)?;
        let neighbors = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].id.clone())
            .collect::<BTreeSet<_>>();
        let mut events = Vec::with_capacity(neighbors.len());
        for neighbor in &neighbors {
            events.push(self.take_link(id, neighbor, LinkCause::Administrative)?);
        }
        self.failed.retain(|key, _| !key.touches(id));
        let node = self
            .graph
            .remove_node(idx)
            .ok_or_else(|| TopologyError::NodeNotFound(id.clone()))?;
        self.id2idx.remove(id);
        info!("removed node {id} and {} incident link(s)", events.len());
        Ok((node, events))
    }

    pub fn add_link(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        attrs: LinkAttrs,
    ) -> Result<(), TopologyError> {
        if a == b {
            return Err(TopologyError::NodeAdjacentSelf(a.clone()));
        }
        if attrs.capacity == Mbps::ZERO {
            return Err(TopologyError::InvalidParameter(format!(
                "link {a} <-> {b} must have a positive capacity"
            )));
        }
        let i = self.try_idx_of(a)?;
        let j = self.try_idx_of(b)?;
        if self.graph.find_edge(i, j).is_some() || self.graph.find_edge(j, i).is_some() {
            return Err(TopologyError::DuplicateLink {
                a: a.clone(),
                b: b.clone(),
            });
        }
        // Channels are unidirectional
        self.graph
            .add_edge(i, j, Channel::new(a.clone(), b.clone(), attrs));
        self.graph
            .add_edge(j, i, Channel::new(b.clone(), a.clone(), attrs));
        if self.failed.remove(&LinkKey::new(a, b)).is_some() {
            info!("link {a} <-> {b} repaired");
        } else {
            info!(
                "added link {a} <-> {b} (capacity {}, weight {}, delay {})",
                attrs.capacity, attrs.weight, attrs.delay
            );
        }
        Ok(())
    }

    /// Administratively removes a link.
    pub fn remove_link(&mut self, a: &NodeId, b: &NodeId) -> Result<LinkEvent, TopologyError> {
        let event = self.take_link(a, b, LinkCause::Administrative)?;
        info!("removed link {}", event.link);
        Ok(event)
    }

    /// Takes a link down as a failure. The link is remembered and can be brought back with
    /// [`Topology::restore_link`].
    pub fn fail_link(&mut self, a: &NodeId, b: &NodeId) -> Result<LinkEvent, TopologyError> {
        let event = self.take_link(a, b, LinkCause::Failure)?;
        self.failed.insert(event.link.clone(), event.attrs);
        warn!("link {} failed", event.link);
        Ok(event)
    }

    /// Re-adds a previously failed link with its original attributes and no utilization.
    pub fn restore_link(&mut self, a: &NodeId, b: &NodeId) -> Result<(), TopologyError> {
        let attrs = *self
            .failed
            .get(&LinkKey::new(a, b))
            .ok_or_else(|| TopologyError::LinkNotFailed {
                a: a.clone(),
                b: b.clone(),
            })?;
        self.add_link(a, b, attrs)
    }

    fn take_link(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        cause: LinkCause,
    ) -> Result<LinkEvent, TopologyError> {
        let not_found = || TopologyError::LinkNotFound {
            a: a.clone(),
            b: b.clone(),
        };
        let forward = self.channel_idx(a, b).ok_or_else(not_found)?;
        let reverse = self.channel_idx(b, a).ok_or_else(not_found)?;
        let chan = self.graph.remove_edge(forward).ok_or_else(not_found)?;
        self.graph.remove_edge(reverse);
        Ok(LinkEvent {
            link: chan.key(),
            attrs: chan.attrs,
            cause,
        })
    }

    /// Applies a utilization change to the channel `src -> dst`. Reservations that would exceed
    /// the channel's capacity fail under [`Admission::Strict`] and are accepted with a warning
    /// under [`Admission::Oversubscribe`]. Returns the new utilization.
    pub fn update_utilization(
        &mut self,
        src: &NodeId,
        dst: &NodeId,
        delta: UtilizationDelta,
        admission: Admission,
    ) -> Result<Mbps, TopologyError> {
        let eidx = self
            .channel_idx(src, dst)
            .ok_or_else(|| TopologyError::LinkNotFound {
                a: src.clone(),
                b: dst.clone(),
            })?;
        let chan = &mut self.graph[eidx];
        match delta {
            UtilizationDelta::Reserve(bandwidth) => {
                let residual = chan.residual();
                if bandwidth > residual {
                    match admission {
                        Admission::Strict => {
                            return Err(TopologyError::CapacityExceeded {
                                src: src.clone(),
                                dst: dst.clone(),
                                requested: bandwidth,
                                residual,
                            })
                        }
                        Admission::Oversubscribe => warn!(
                            "oversubscribing {src} -> {dst}: {} + {bandwidth} > {}",
                            chan.utilization, chan.attrs.capacity
                        ),
                    }
                }
                chan.utilization = chan.utilization.saturating_add(bandwidth);
            }
            UtilizationDelta::Release(bandwidth) => {
                let utilization = chan.utilization;
                chan.utilization = utilization.checked_sub(bandwidth).ok_or_else(|| {
                    TopologyError::UtilizationUnderflow {
                        src: src.clone(),
                        dst: dst.clone(),
                        requested: bandwidth,
                        utilization,
                    }
                })?;
            }
        }
        Ok(chan.utilization)
    }

    /// Reserves `bandwidth` on every channel of `path`. Either every channel is updated or none
    /// is.
    pub(crate) fn reserve_path(
        &mut self,
        path: &Path,
        bandwidth: Mbps,
        admission: Admission,
    ) -> Result<(), TopologyError> {
        for (u, v) in path.channels() {
            let chan = self.channel(u, v).ok_or_else(|| TopologyError::LinkNotFound {
                a: u.clone(),
                b: v.clone(),
            })?;
            if matches!(admission, Admission::Strict) && bandwidth > chan.residual() {
                return Err(TopologyError::CapacityExceeded {
                    src: u.clone(),
                    dst: v.clone(),
                    requested: bandwidth,
                    residual: chan.residual(),
                });
            }
        }
        for (u, v) in path.channels() {
            self.update_utilization(u, v, UtilizationDelta::Reserve(bandwidth), admission)?;
        }
        Ok(())
    }

    /// Releases `bandwidth` from every channel of `path` that still exists. Channels of links
    /// that have gone away carry nothing to release.
    pub(crate) fn release_path(&mut self, path: &Path, bandwidth: Mbps) -> Result<(), TopologyError> {
        let present = path
            .channels()
            .filter(|&(u, v)| self.channel(u, v).is_some())
            .collect::<Vec<_>>();
        for &(u, v) in &present {
            let utilization = self.channel(u, v).map_or(Mbps::ZERO, Channel::utilization);
            if utilization < bandwidth {
                return Err(TopologyError::UtilizationUnderflow {
                    src: u.clone(),
                    dst: v.clone(),
                    requested: bandwidth,
                    utilization,
                });
            }
        }
        for (u, v) in present {
            // Cannot fail: checked above
            self.update_utilization(
                u,
                v,
                UtilizationDelta::Release(bandwidth),
                Admission::Oversubscribe,
            )?;
        }
        Ok(())
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.id2idx.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.idx_of(id).map(|idx| &self.graph[idx])
    }

    /// All nodes, sorted by ID.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes = self
            .graph
            .node_indices()
            .map(|idx| &self.graph[idx])
            .collect::<Vec<_>>();
        nodes.sort_by(|x, y| x.id.cmp(&y.id));
        nodes
    }

    /// Neighbors of a node, sorted by ID.
    pub fn neighbors(&self, id: &NodeId) -> Result<Vec<&NodeId>, TopologyError> {
        let idx = self.try_idx_of(id)?;
        let mut neighbors = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| &self.graph[n].id)
            .collect::<Vec<_>>();
        neighbors.sort();
        Ok(neighbors)
    }

    pub fn channel(&self, src: &NodeId, dst: &NodeId) -> Option<&Channel> {
        self.channel_idx(src, dst).map(|e| &self.graph[e])
    }

    pub fn link(&self, a: &NodeId, b: &NodeId) -> Option<Link> {
        let key = LinkKey::new(a, b);
        let forward = self.channel(key.a(), key.b())?;
        let reverse = self.channel(key.b(), key.a())?;
        Some(Link {
            a: key.a().clone(),
            b: key.b().clone(),
            attrs: forward.attrs,
            forward: forward.utilization,
            reverse: reverse.utilization,
        })
    }

    pub fn contains_link(&self, link: &LinkKey) -> bool {
        self.channel_idx(link.a(), link.b()).is_some()
    }

    /// A snapshot of every link, sorted by endpoints.
    pub fn links(&self) -> Vec<Link> {
        let mut links = self
            .graph
            .edge_indices()
            .map(|eidx| &self.graph[eidx])
            .filter(|chan| chan.src < chan.dst)
            .filter_map(|chan| self.link(&chan.src, &chan.dst))
            .collect::<Vec<_>>();
        links.sort_by_key(Link::key);
        links
    }

    /// Links currently down because of a failure, with the attributes they had.
    pub fn failed_links(&self) -> impl Iterator<Item = (&LinkKey, &LinkAttrs)> + '_ {
        self.failed.iter()
    }

    /// Whether every hop of `path` is a link of the current topology.
    pub fn has_path(&self, path: &Path) -> bool {
        path.nodes().iter().all(|n| self.contains_node(n))
            && path.channels().all(|(u, v)| self.channel(u, v).is_some())
    }

    pub fn nr_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn nr_links(&self) -> usize {
        self.graph.edge_count() / 2
    }

    pub(crate) fn idx_of(&self, id: &NodeId) -> Option<NodeIndex> {
        self.id2idx.get(id).copied()
    }

    fn try_idx_of(&self, id: &NodeId) -> Result<NodeIndex, TopologyError> {
        self.idx_of(id)
            .ok_or_else(|| TopologyError::NodeNotFound(id.clone()))
    }

    fn channel_idx(&self, src: &NodeId, dst: &NodeId) -> Option<EdgeIndex> {
        let i = self.idx_of(src)?;
        let j = self.idx_of(dst)?;
        self.graph.find_edge(i, j)
    }
}

/// Why a link left the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkCause {
    #[display(fmt = "administrative removal")]
    Administrative,
    #[display(fmt = "failure")]
    Failure,
}

/// A link that left the topology.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LinkEvent {
    pub link: LinkKey,
    pub attrs: LinkAttrs,
    pub cause: LinkCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilizationDelta {
    Reserve(Mbps),
    Release(Mbps),
}

/// What to do when a reservation would exceed a channel's capacity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Admission {
    /// Reject the reservation.
    #[default]
    Strict,
    /// Accept the reservation and log a warning.
    Oversubscribe,
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("node {0} cannot be linked to itself")]
    NodeAdjacentSelf(NodeId),

    #[error("a link between {a} and {b} already exists")]
    DuplicateLink { a: NodeId, b: NodeId },

    #[error("no link between {a} and {b}")]
    LinkNotFound { a: NodeId, b: NodeId },

    #[error("the link between {a} and {b} has not failed")]
    LinkNotFailed { a: NodeId, b: NodeId },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("reserving {requested} on {src} -> {dst} exceeds its residual capacity ({residual})")]
    CapacityExceeded {
        src: NodeId,
        dst: NodeId,
        requested: Mbps,
        residual: Mbps,
    },

    #[error("releasing {requested} on {src} -> {dst} exceeds its utilization ({utilization})")]
    UtilizationUnderflow {
        src: NodeId,
        dst: NodeId,
        requested: Mbps,
        utilization: Mbps,
    },
}
