use std::fmt;

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::constants::{
    DEFAULT_CAPACITY, DEFAULT_DELAY, DEFAULT_PRIORITY, DEFAULT_WEIGHT, HIGH_PRIORITY_THRESHOLD,
};
use crate::units::{Cost, Mbps, Millisecs};

/// The name of a switch or host.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub kind: NodeKind,
    /// Free-form location, carried for display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Node {
    pub fn new_switch(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Switch,
            location: None,
        }
    }

    pub fn new_host(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Host,
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    #[display(fmt = "switch")]
    Switch,
    #[display(fmt = "host")]
    Host,
}

/// An undirected link name. The endpoints are stored in sorted order, so `(a, b)` and `(b, a)`
/// name the same link.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct LinkKey {
    a: NodeId,
    b: NodeId,
}

impl LinkKey {
    pub fn new(x: &NodeId, y: &NodeId) -> Self {
        if x <= y {
            Self {
                a: x.clone(),
                b: y.clone(),
            }
        } else {
            Self {
                a: y.clone(),
                b: x.clone(),
            }
        }
    }

    pub fn a(&self) -> &NodeId {
        &self.a
    }

    pub fn b(&self) -> &NodeId {
        &self.b
    }

    pub fn touches(&self, node: &NodeId) -> bool {
        &self.a == node || &self.b == node
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

/// Attributes shared by both directions of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LinkAttrs {
    pub capacity: Mbps,
    pub weight: Cost,
    pub delay: Millisecs,
}

impl Default for LinkAttrs {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            weight: DEFAULT_WEIGHT,
            delay: DEFAULT_DELAY,
        }
    }
}

/// One direction of a link. A link between `a` and `b` is stored as the channels `a -> b` and
/// `b -> a`, each with its own utilization.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Channel {
    pub(crate) src: NodeId,
    pub(crate) dst: NodeId,
    pub(crate) attrs: LinkAttrs,
    pub(crate) utilization: Mbps,
}

impl Channel {
    pub(crate) fn new(src: NodeId, dst: NodeId, attrs: LinkAttrs) -> Self {
        Self {
            src,
            dst,
            attrs,
            utilization: Mbps::ZERO,
        }
    }

    pub fn src(&self) -> &NodeId {
        &self.src
    }

    pub fn dst(&self) -> &NodeId {
        &self.dst
    }

    pub fn attrs(&self) -> LinkAttrs {
        self.attrs
    }

    pub fn utilization(&self) -> Mbps {
        self.utilization
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(&self.src, &self.dst)
    }

    /// Bandwidth still available on this channel. Oversubscribed channels have none.
    pub fn residual(&self) -> Mbps {
        self.attrs
            .capacity
            .checked_sub(self.utilization)
            .unwrap_or(Mbps::ZERO)
    }

    pub fn utilization_ratio(&self) -> OrderedFloat<f64> {
        self.utilization.ratio_of(self.attrs.capacity)
    }
}

/// A snapshot of a bidirectional link, as reported to readers of the topology.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    #[serde(flatten)]
    pub attrs: LinkAttrs,
    /// Utilization of the `a -> b` direction.
    pub forward: Mbps,
    /// Utilization of the `b -> a` direction.
    pub reverse: Mbps,
}

impl Link {
    pub fn key(&self) -> LinkKey {
        LinkKey::new(&self.a, &self.b)
    }

    pub fn connects(&self, x: &NodeId, y: &NodeId) -> bool {
        &self.a == x && &self.b == y || &self.a == y && &self.b == x
    }

    /// The utilization ratio of the busier direction.
    pub fn peak_ratio(&self) -> OrderedFloat<f64> {
        std::cmp::max(
            self.forward.ratio_of(self.attrs.capacity),
            self.reverse.ratio_of(self.attrs.capacity),
        )
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
    derive_more::FromStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn inner(self) -> i32 {
        self.0
    }

    /// High-priority traffic is routed over the lowest-delay path.
    pub const fn is_high(self) -> bool {
        self.0 > HIGH_PRIORITY_THRESHOLD
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(DEFAULT_PRIORITY)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// An ordered sequence of nodes. A path with a single node is the zero-hop path from a node to
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct Path(Vec<NodeId>);

impl Path {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self(nodes)
    }

    pub fn trivial(node: NodeId) -> Self {
        Self(vec![node])
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    pub fn src(&self) -> Option<&NodeId> {
        self.0.first()
    }

    pub fn dst(&self) -> Option<&NodeId> {
        self.0.last()
    }

    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn is_trivial(&self) -> bool {
        self.0.len() <= 1
    }

    /// The directed hops `(u, v)` of the path, in order.
    pub fn channels(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> + '_ {
        self.0.iter().tuple_windows()
    }

    /// The undirected links of the path, in order.
    pub fn links(&self) -> impl Iterator<Item = LinkKey> + '_ {
        self.channels().map(|(u, v)| LinkKey::new(u, v))
    }

    pub fn traverses(&self, link: &LinkKey) -> bool {
        self.links().any(|l| &l == link)
    }

    pub fn contains_node(&self, node: &NodeId) -> bool {
        self.0.contains(node)
    }

    /// A path is simple if no node appears twice.
    pub fn is_simple(&self) -> bool {
        self.0.iter().all_unique()
    }

    pub fn shares_link_with(&self, other: &Path) -> bool {
        self.links().any(|l| other.traverses(&l))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(" -> "))
    }
}

identifier!(FlowId, u64);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
    serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    /// The primary path is valid and installed.
    #[display(fmt = "active")]
    Active,
    /// A link event hit the primary path and recovery has not finished.
    #[display(fmt = "rerouting")]
    Rerouting,
    /// No path exists. Terminal until the flow is explicitly retried.
    #[display(fmt = "unreachable")]
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Flow {
    pub id: FlowId,
    pub src: NodeId,
    pub dst: NodeId,
    pub priority: Priority,
    pub bandwidth: Mbps,
    pub path: Path,
    pub backup: Option<Path>,
    pub status: FlowStatus,
    /// Number of times the flow has been moved to a different path by recovery.
    pub reroutes: u32,
}

impl Flow {
    pub fn is_active(&self) -> bool {
        matches!(self.status, FlowStatus::Active)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Flow {}: {} -> {} (priority {}, {}, {})",
            self.id, self.src, self.dst, self.priority, self.bandwidth, self.status
        )
    }
}
