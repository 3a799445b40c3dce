//! Failure recovery. When links leave the topology, only the flows whose installed path crosses
//! one of them are touched. Each is moved to its backup path if the backup survived, otherwise to
//! a freshly computed path, otherwise it becomes unreachable and its entries are withdrawn.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::flowtable::{FlowTable, FlowTableError};
use crate::network::{Flow, FlowId, FlowStatus, LinkEvent, LinkKey, Path, Topology};
use crate::routing::{PathRequest, RoutingAlgo};

/// What happened to one flow during recovery.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The precomputed backup became the primary path.
    BackupPromoted { path: Path },
    /// A new path was computed.
    Recomputed { path: Path },
    /// No path exists. The flow's entries were withdrawn.
    Unreachable,
}

impl RecoveryOutcome {
    pub fn is_recovered(&self) -> bool {
        !matches!(self, RecoveryOutcome::Unreachable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FlowRecovery {
    pub flow: FlowId,
    #[serde(flatten)]
    pub outcome: RecoveryOutcome,
}

/// The summary of one recovery run, in the order flows were handled.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RecoveryReport {
    pub events: Vec<LinkEvent>,
    pub flows: Vec<FlowRecovery>,
}

impl RecoveryReport {
    pub fn affected(&self) -> usize {
        self.flows.len()
    }

    pub fn recovered(&self) -> usize {
        self.flows.iter().filter(|f| f.outcome.is_recovered()).count()
    }

    pub fn unreachable(&self) -> usize {
        self.affected() - self.recovered()
    }

    pub fn outcome(&self, id: FlowId) -> Option<&RecoveryOutcome> {
        self.flows.iter().find(|f| f.flow == id).map(|f| &f.outcome)
    }
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} affected, {} recovered, {} unreachable",
            self.affected(),
            self.recovered(),
            self.unreachable()
        )
    }
}

/// Drives affected flows through recovery. Borrows the parts of a controller it mutates.
pub(crate) struct RecoveryCoordinator<'a, R> {
    pub(crate) topology: &'a mut Topology,
    pub(crate) table: &'a mut FlowTable,
    pub(crate) flows: &'a mut BTreeMap<FlowId, Flow>,
    pub(crate) routing: &'a R,
    pub(crate) backup_paths: bool,
}

impl<R: RoutingAlgo> RecoveryCoordinator<'_, R> {
    /// Recovers the flows hit by `events`, which must already be applied to the topology.
    /// `stranded` names flows that lost an endpoint without crossing any link; they become
    /// unreachable.
    pub(crate) fn run(
        mut self,
        events: Vec<LinkEvent>,
        stranded: Vec<FlowId>,
    ) -> Result<RecoveryReport, FlowTableError> {
        let down = events
            .iter()
            .map(|e| e.link.clone())
            .collect::<FxHashSet<_>>();
        for e in &events {
            info!("link {} down ({})", e.link, e.cause);
        }

        let mut affected = down
            .iter()
            .flat_map(|link| self.table.flows_on(link))
            .chain(stranded)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| self.flows.get(&id).map(|f| (Reverse(f.priority), id)))
            .collect::<Vec<_>>();
        // Highest priority first gets first pick of residual capacity
        affected.sort();
        for &(_, id) in &affected {
            if let Some(flow) = self.flows.get_mut(&id) {
                flow.status = FlowStatus::Rerouting;
            }
        }

        let mut report = RecoveryReport {
            events,
            flows: Vec::with_capacity(affected.len()),
        };
        for (_, id) in affected {
            let Some(mut flow) = self.flows.remove(&id) else {
                continue;
            };
            let outcome = self.recover_flow(&mut flow, &down);
            self.flows.insert(id, flow);
            report.flows.push(FlowRecovery {
                flow: id,
                outcome: outcome?,
            });
        }
        if !report.flows.is_empty() {
            info!("recovery: {report}");
        }
        Ok(report)
    }

    fn recover_flow(
        &mut self,
        flow: &mut Flow,
        down: &FxHashSet<LinkKey>,
    ) -> Result<RecoveryOutcome, FlowTableError> {
        let relaxed = PathRequest::builder()
            .src(flow.src.clone())
            .dst(flow.dst.clone())
            .priority(flow.priority)
            .build();
        let constrained = PathRequest {
            bandwidth: Some(flow.bandwidth),
            ..relaxed.clone()
        };

        let usable_backup = flow.backup.take().filter(|backup| {
            !down.iter().any(|link| backup.traverses(link))
                && backup.src() == Some(&flow.src)
                && backup.dst() == Some(&flow.dst)
                && self.topology.has_path(backup)
        });
        let (path, outcome) = if let Some(backup) = usable_backup {
            (
                backup.clone(),
                RecoveryOutcome::BackupPromoted { path: backup },
            )
        } else {
            // Prefer a path with room for the flow, but accept an overcommitted one over none
            let computed = self
                .routing
                .compute_path(self.topology, &constrained)
                .or_else(|_| self.routing.compute_path(self.topology, &relaxed));
            match computed {
                Ok(path) => (path.clone(), RecoveryOutcome::Recomputed { path }),
                Err(e) => {
                    if self.table.is_installed(flow.id) {
                        self.table.uninstall(self.topology, flow.id)?;
                    }
                    flow.status = FlowStatus::Unreachable;
                    warn!("flow {} is unreachable: {e}", flow.id);
                    return Ok(RecoveryOutcome::Unreachable);
                }
            }
        };

        self.table.rebind(self.topology, flow, &path)?;
        flow.path = path;
        flow.status = FlowStatus::Active;
        flow.reroutes += 1;
        flow.backup = if self.backup_paths {
            self.routing
                .compute_backup(self.topology, &constrained, &flow.path)
        } else {
            None
        };
        info!("flow {} rerouted onto {}", flow.id, flow.path);
        Ok(outcome)
    }
}
