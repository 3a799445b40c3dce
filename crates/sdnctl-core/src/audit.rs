//! A consistency audit over the whole controller state.
//!
//! The audit checks that:
//!
//! - every flow table entry belongs to an active flow and forwards over a present link,
//! - every active flow's path is simple, connects its endpoints, exists in the topology, and is
//!   installed with one entry per hop,
//! - every channel's utilization is exactly the bandwidth of the active flows crossing it,
//! - backups share no link with their primary path,
//! - no flow is left mid-recovery, and unreachable flows hold no entries.

use rustc_hash::FxHashMap;

use crate::controller::Controller;
use crate::network::{FlowId, FlowStatus, LinkKey, NodeId};
use crate::routing::RoutingAlgo;
use crate::units::Mbps;

impl<R: RoutingAlgo> Controller<R> {
    /// Checks the controller's invariants, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConsistencyError> {
        let topology = self.topology();
        let table = self.flow_table();

        for (switch, entries) in table.tables() {
            for entry in entries {
                let flow = entry.flow();
                if !self.flow(flow).map_or(false, |f| f.is_active()) {
                    return Err(ConsistencyError::OrphanEntry {
                        switch: switch.clone(),
                        flow,
                    });
                }
                if topology.channel(switch, &entry.next_hop).is_none() {
                    return Err(ConsistencyError::DanglingEntry {
                        switch: switch.clone(),
                        next_hop: entry.next_hop.clone(),
                        flow,
                    });
                }
            }
        }

        let mut expected: FxHashMap<(&NodeId, &NodeId), Mbps> = FxHashMap::default();
        for flow in self.flows() {
            let id = flow.id;
            match flow.status {
                FlowStatus::Rerouting => return Err(ConsistencyError::StuckRerouting(id)),
                FlowStatus::Unreachable => {
                    if table.is_installed(id) {
                        return Err(ConsistencyError::UnreachableInstalled(id));
                    }
                    continue;
                }
                FlowStatus::Active => {}
            }
            let path = &flow.path;
            if path.src() != Some(&flow.src) || path.dst() != Some(&flow.dst) || !path.is_simple()
            {
                return Err(ConsistencyError::InvalidPath(id));
            }
            if let Some(link) = path.links().find(|l| !topology.contains_link(l)) {
                return Err(ConsistencyError::MissingLink { flow: id, link });
            }
            if table.installed_path(id) != Some(path) {
                return Err(ConsistencyError::NotInstalled(id));
            }
            for (u, v) in path.channels() {
                let installed = table
                    .entries_for_switch(u)
                    .iter()
                    .any(|e| e.flow() == id && e.next_hop == *v);
                if !installed {
                    return Err(ConsistencyError::NotInstalled(id));
                }
                *expected.entry((u, v)).or_insert(Mbps::ZERO) += flow.bandwidth;
            }
            if flow
                .backup
                .as_ref()
                .map_or(false, |b| b.shares_link_with(path))
            {
                return Err(ConsistencyError::BackupOverlap(id));
            }
        }

        for link in topology.links() {
            let directions = [
                (&link.a, &link.b, link.forward),
                (&link.b, &link.a, link.reverse),
            ];
            for (src, dst, recorded) in directions {
                let reserved = expected.get(&(src, dst)).copied().unwrap_or(Mbps::ZERO);
                if recorded != reserved {
                    return Err(ConsistencyError::UtilizationMismatch {
                        src: src.clone(),
                        dst: dst.clone(),
                        recorded,
                        reserved,
                    });
                }
            }
        }
        Ok(())
    }
}

/// A violated controller invariant.
#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    #[error("switch {switch} holds an entry for flow {flow}, which is not active")]
    OrphanEntry { switch: NodeId, flow: FlowId },

    #[error("switch {switch} forwards flow {flow} to {next_hop} over a missing link")]
    DanglingEntry {
        switch: NodeId,
        next_hop: NodeId,
        flow: FlowId,
    },

    #[error("flow {0} is stuck rerouting")]
    StuckRerouting(FlowId),

    #[error("flow {0} is unreachable but still installed")]
    UnreachableInstalled(FlowId),

    #[error("flow {0} has a path that is not simple or does not connect its endpoints")]
    InvalidPath(FlowId),

    #[error("flow {flow} crosses missing link {link}")]
    MissingLink { flow: FlowId, link: LinkKey },

    #[error("flow {0} is not installed along its path")]
    NotInstalled(FlowId),

    #[error("flow {0} has a backup sharing a link with its primary path")]
    BackupOverlap(FlowId),

    #[error("{src} -> {dst} records {recorded} but flows reserve {reserved}")]
    UtilizationMismatch {
        src: NodeId,
        dst: NodeId,
        recorded: Mbps,
        reserved: Mbps,
    },
}
