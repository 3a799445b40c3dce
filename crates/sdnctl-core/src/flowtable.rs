//! Flow table derivation. Every installed flow owns one entry on each switch of its path except
//! the last, and reserves its bandwidth on every channel it crosses. Entries are derived state:
//! they change only when a flow is installed, rebound, or uninstalled.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::network::{
    Admission, Flow, FlowId, LinkKey, NodeId, Path, Priority, Topology, TopologyError,
};
use crate::units::Mbps;

/// The packets an entry applies to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FlowMatch {
    pub src: NodeId,
    pub dst: NodeId,
    pub flow: FlowId,
}

/// A forwarding rule on one switch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FlowEntry {
    #[serde(rename = "match")]
    pub matches: FlowMatch,
    /// Forward matching packets to this neighbor.
    pub next_hop: NodeId,
    pub priority: Priority,
}

impl FlowEntry {
    pub fn flow(&self) -> FlowId {
        self.matches.flow
    }
}

#[derive(Debug, Clone)]
struct Installed {
    path: Path,
    bandwidth: Mbps,
}

/// Per-switch flow tables plus a reverse index from links to the flows crossing them.
#[derive(Debug, Default, Clone)]
pub struct FlowTable {
    tables: BTreeMap<NodeId, Vec<FlowEntry>>,
    by_link: FxHashMap<LinkKey, BTreeSet<FlowId>>,
    installed: FxHashMap<FlowId, Installed>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the flow's bandwidth along its primary path and installs one entry per hop.
    /// Nothing is changed if the reservation fails.
    pub fn install(
        &mut self,
        topology: &mut Topology,
        flow: &Flow,
        admission: Admission,
    ) -> Result<(), FlowTableError> {
        if self.installed.contains_key(&flow.id) {
            return Err(FlowTableError::AlreadyInstalled(flow.id));
        }
        topology.reserve_path(&flow.path, flow.bandwidth, admission)?;
        self.add_entries(flow, &flow.path);
        self.installed.insert(
            flow.id,
            Installed {
                path: flow.path.clone(),
                bandwidth: flow.bandwidth,
            },
        );
        Ok(())
    }

    /// Removes every entry of a flow and releases its bandwidth on the channels that still
    /// exist. Returns the path the flow was installed on.
    pub fn uninstall(
        &mut self,
        topology: &mut Topology,
        id: FlowId,
    ) -> Result<Path, FlowTableError> {
        let installed = self
            .installed
            .get(&id)
            .ok_or(FlowTableError::NotInstalled(id))?;
        topology.release_path(&installed.path, installed.bandwidth)?;
        let installed = self
            .installed
            .remove(&id)
            .ok_or(FlowTableError::NotInstalled(id))?;
        self.remove_entries(id, &installed.path);
        Ok(installed.path)
    }

    /// Moves an installed flow onto `path`: its old entries and reservations are replaced by new
    /// ones in a single step. The new reservation may oversubscribe links; a rebind happens when
    /// the alternative is losing the flow. Returns the previous path.
    pub fn rebind(
        &mut self,
        topology: &mut Topology,
        flow: &Flow,
        path: &Path,
    ) -> Result<Path, FlowTableError> {
        let old = self
            .installed
            .get(&flow.id)
            .ok_or(FlowTableError::NotInstalled(flow.id))?
            .clone();
        if let Some((u, v)) = path
            .channels()
            .find(|&(u, v)| topology.channel(u, v).is_none())
        {
            return Err(TopologyError::LinkNotFound {
                a: u.clone(),
                b: v.clone(),
            }
            .into());
        }
        topology.release_path(&old.path, old.bandwidth)?;
        // Cannot fail: every channel exists and oversubscription is allowed
        topology.reserve_path(path, flow.bandwidth, Admission::Oversubscribe)?;
        self.remove_entries(flow.id, &old.path);
        self.add_entries(flow, path);
        self.installed.insert(
            flow.id,
            Installed {
                path: path.clone(),
                bandwidth: flow.bandwidth,
            },
        );
        Ok(old.path)
    }

    /// The entries of one switch, highest priority first.
    pub fn entries_for_switch(&self, switch: &NodeId) -> &[FlowEntry] {
        self.tables.get(switch).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every non-empty switch table, ordered by switch.
    pub fn tables(&self) -> impl Iterator<Item = (&NodeId, &[FlowEntry])> + '_ {
        self.tables.iter().map(|(id, entries)| (id, entries.as_slice()))
    }

    /// The flows whose installed path crosses `link`, in ID order.
    pub fn flows_on(&self, link: &LinkKey) -> Vec<FlowId> {
        self.by_link
            .get(link)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn installed_path(&self, id: FlowId) -> Option<&Path> {
        self.installed.get(&id).map(|i| &i.path)
    }

    pub fn is_installed(&self, id: FlowId) -> bool {
        self.installed.contains_key(&id)
    }

    pub fn nr_entries(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    fn add_entries(&mut self, flow: &Flow, path: &Path) {
        for (u, v) in path.channels() {
            let table = self.tables.entry(u.clone()).or_default();
            table.push(FlowEntry {
                matches: FlowMatch {
                    src: flow.src.clone(),
                    dst: flow.dst.clone(),
                    flow: flow.id,
                },
                next_hop: v.clone(),
                priority: flow.priority,
            });
            table.sort_by_key(|e| (Reverse(e.priority), e.flow()));
        }
        for link in path.links() {
            self.by_link.entry(link).or_default().insert(flow.id);
        }
    }

    fn remove_entries(&mut self, id: FlowId, path: &Path) {
        for (u, _) in path.channels() {
            if let Some(table) = self.tables.get_mut(u) {
                table.retain(|e| e.flow() != id);
                if table.is_empty() {
                    self.tables.remove(u);
                }
            }
        }
        for link in path.links() {
            if let Some(ids) = self.by_link.get_mut(&link) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_link.remove(&link);
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowTableError {
    #[error("flow {0} is already installed")]
    AlreadyInstalled(FlowId),

    #[error("flow {0} is not installed")]
    NotInstalled(FlowId),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}
