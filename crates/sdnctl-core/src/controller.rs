//! The controller context. A [`Controller`] owns the topology, the flow tables, and the flow
//! registry, and is the only way to mutate them. Every operation runs to completion before it
//! returns, including the recovery of flows hit by a topology change.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::constants::DEFAULT_BANDWIDTH;
use crate::error::Error;
use crate::flowtable::{FlowEntry, FlowTable};
use crate::network::{
    Admission, Flow, FlowId, FlowStatus, LinkAttrs, LinkEvent, Node, NodeId, Path, Priority,
    Topology, TopologyError,
};
use crate::opts::ControllerOpts;
use crate::recovery::{FlowRecovery, RecoveryCoordinator, RecoveryOutcome, RecoveryReport};
use crate::routing::{PathError, PathRequest, PriorityRouting, RoutingAlgo};
use crate::units::Mbps;

/// A request to admit a flow.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    typed_builder::TypedBuilder,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct FlowRequest {
    #[builder(setter(into))]
    pub src: NodeId,
    #[builder(setter(into))]
    pub dst: NodeId,
    #[builder(default)]
    #[serde(default)]
    pub priority: Priority,
    #[builder(default = DEFAULT_BANDWIDTH)]
    #[serde(default = "default_bandwidth")]
    pub bandwidth: Mbps,
}

fn default_bandwidth() -> Mbps {
    DEFAULT_BANDWIDTH
}

/// A network controller.
#[derive(Debug)]
pub struct Controller<R: RoutingAlgo = PriorityRouting> {
    opts: ControllerOpts,
    topology: Topology,
    routing: R,
    table: FlowTable,
    flows: BTreeMap<FlowId, Flow>,
    next_flow: FlowId,
    total_created: usize,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControllerOpts::default())
    }
}

impl Controller {
    /// Creates an empty controller that routes with [`PriorityRouting`].
    pub fn new(opts: ControllerOpts) -> Self {
        let routing = PriorityRouting::new(opts.max_candidate_paths);
        Self::with_routing(opts, routing)
    }
}

impl<R: RoutingAlgo> Controller<R> {
    /// Creates an empty controller with a custom routing algorithm.
    pub fn with_routing(opts: ControllerOpts, routing: R) -> Self {
        Self {
            opts,
            topology: Topology::new(),
            routing,
            table: FlowTable::new(),
            flows: BTreeMap::new(),
            next_flow: FlowId::FIRST,
            total_created: 0,
        }
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), Error> {
        self.topology.add_node(node)?;
        Ok(())
    }

    pub fn add_switch(&mut self, id: impl Into<NodeId>) -> Result<(), Error> {
        self.add_node(Node::new_switch(id))
    }

    /// Removes a node and its links. Flows that crossed the node are recovered; flows that
    /// started or ended there become unreachable.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<RecoveryReport, Error> {
        // Zero-hop flows cross no link, so no link event will find them
        let stranded = self
            .flows
            .values()
            .filter(|f| f.is_active() && f.path.is_trivial() && f.path.contains_node(id))
            .map(|f| f.id)
            .collect();
        let (_, events) = self.topology.remove_node(id)?;
        self.recover(events, stranded)
    }

    pub fn add_link(&mut self, a: &NodeId, b: &NodeId, attrs: LinkAttrs) -> Result<(), Error> {
        self.topology.add_link(a, b, attrs)?;
        Ok(())
    }

    /// Administratively removes a link and recovers the flows that crossed it.
    pub fn remove_link(&mut self, a: &NodeId, b: &NodeId) -> Result<RecoveryReport, Error> {
        let event = self.topology.remove_link(a, b)?;
        self.recover(vec![event], Vec::new())
    }

    /// Takes a link down as a failure and recovers the flows that crossed it. Flows whose path
    /// does not cross the link are left alone.
    pub fn simulate_failure(&mut self, a: &NodeId, b: &NodeId) -> Result<RecoveryReport, Error> {
        let event = self.topology.fail_link(a, b)?;
        self.recover(vec![event], Vec::new())
    }

    /// Brings back a failed link. Unreachable flows stay unreachable until
    /// [`Controller::recover_unreachable`] is called.
    pub fn restore_link(&mut self, a: &NodeId, b: &NodeId) -> Result<(), Error> {
        self.topology.restore_link(a, b)?;
        Ok(())
    }

    /// Admits a flow: computes its path and a best-effort backup, then installs its entries
    /// and reserves its bandwidth. Nothing changes if admission fails.
    pub fn add_flow(&mut self, request: FlowRequest) -> Result<FlowId, Error> {
        let FlowRequest {
            src,
            dst,
            priority,
            bandwidth,
        } = request;
        if bandwidth == Mbps::ZERO {
            return Err(Error::InvalidParameter(
                "flow bandwidth must be positive".into(),
            ));
        }
        for id in [&src, &dst] {
            if !self.topology.contains_node(id) {
                return Err(TopologyError::NodeNotFound(id.clone()).into());
            }
        }
        let (path, backup) = self.plan(&src, &dst, priority, bandwidth)?;

        let id = self.next_flow;
        let flow = Flow {
            id,
            src,
            dst,
            priority,
            bandwidth,
            path,
            backup,
            status: FlowStatus::Active,
            reroutes: 0,
        };
        self.table.install(&mut self.topology, &flow, self.opts.admission)?;
        self.next_flow = id.next();
        self.total_created += 1;
        info!("added {flow} on {}", flow.path);
        if let Some(backup) = &flow.backup {
            debug!("flow {id} backup: {backup}");
        }
        self.flows.insert(id, flow);
        Ok(id)
    }

    /// Withdraws a flow's entries and releases its bandwidth.
    pub fn remove_flow(&mut self, id: FlowId) -> Result<Flow, Error> {
        if !self.flows.contains_key(&id) {
            return Err(Error::FlowNotFound(id));
        }
        if self.table.is_installed(id) {
            self.table.uninstall(&mut self.topology, id)?;
        }
        let flow = self.flows.remove(&id).ok_or(Error::FlowNotFound(id))?;
        info!("removed flow {id}");
        Ok(flow)
    }

    /// Retries every unreachable flow under the admission rules of a new flow. Flows that fit
    /// are installed again; the rest stay unreachable.
    pub fn recover_unreachable(&mut self) -> Result<RecoveryReport, Error> {
        let mut ids = self
            .flows
            .values()
            .filter(|f| f.status == FlowStatus::Unreachable)
            .map(|f| (std::cmp::Reverse(f.priority), f.id))
            .collect::<Vec<_>>();
        ids.sort();

        let mut report = RecoveryReport::default();
        for (_, id) in ids {
            let Some(mut flow) = self.flows.get(&id).cloned() else {
                continue;
            };
            let outcome = match self.plan(&flow.src, &flow.dst, flow.priority, flow.bandwidth) {
                Ok((path, backup)) => {
                    flow.path = path.clone();
                    flow.backup = backup;
                    flow.status = FlowStatus::Active;
                    self.table
                        .install(&mut self.topology, &flow, self.opts.admission)?;
                    info!("flow {id} is reachable again on {path}");
                    self.flows.insert(id, flow);
                    RecoveryOutcome::Recomputed { path }
                }
                Err(e) => {
                    debug!("flow {id} still unreachable: {e}");
                    RecoveryOutcome::Unreachable
                }
            };
            report.flows.push(FlowRecovery { flow: id, outcome });
        }
        if !report.flows.is_empty() {
            info!("retried unreachable flows: {report}");
        }
        Ok(report)
    }

    /// Computes a path over the current topology without admitting anything.
    pub fn compute_path(&self, request: &PathRequest) -> Result<Path, Error> {
        Ok(self.routing.compute_path(&self.topology, request)?)
    }

    pub fn flow(&self, id: FlowId) -> Option<&Flow> {
        self.flows.get(&id)
    }

    /// All flows, in ID order.
    pub fn flows(&self) -> impl Iterator<Item = &Flow> + '_ {
        self.flows.values()
    }

    pub fn opts(&self) -> &ControllerOpts {
        &self.opts
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn flow_table(&self) -> &FlowTable {
        &self.table
    }

    pub(crate) fn total_created(&self) -> usize {
        self.total_created
    }

    #[cfg(test)]
    pub(crate) fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    delegate::delegate! {
        to self.table {
            /// The entries of one switch, highest priority first.
            pub fn entries_for_switch(&self, switch: &NodeId) -> &[FlowEntry];
        }

        to self.topology {
            pub fn nodes(&self) -> Vec<&Node>;
            pub fn neighbors(&self, id: &NodeId) -> Result<Vec<&NodeId>, TopologyError>;
        }
    }

    /// Picks the primary and backup paths of a flow. Under strict admission the primary must
    /// have residual capacity for the flow on every hop.
    fn plan(
        &self,
        src: &NodeId,
        dst: &NodeId,
        priority: Priority,
        bandwidth: Mbps,
    ) -> Result<(Path, Option<Path>), Error> {
        let relaxed = PathRequest::builder()
            .src(src.clone())
            .dst(dst.clone())
            .priority(priority)
            .build();
        let constrained = PathRequest {
            bandwidth: Some(bandwidth),
            ..relaxed.clone()
        };
        let path = match self.routing.compute_path(&self.topology, &constrained) {
            Ok(path) => path,
            Err(PathError::CapacityExceeded { .. })
                if self.opts.admission == Admission::Oversubscribe =>
            {
                warn!("admitting {src} -> {dst} ({bandwidth}) beyond capacity");
                self.routing.compute_path(&self.topology, &relaxed)?
            }
            Err(e) => return Err(e.into()),
        };
        let backup = if self.opts.backup_paths {
            self.routing
                .compute_backup(&self.topology, &constrained, &path)
        } else {
            None
        };
        Ok((path, backup))
    }

    fn recover(
        &mut self,
        events: Vec<LinkEvent>,
        stranded: Vec<FlowId>,
    ) -> Result<RecoveryReport, Error> {
        let coordinator = RecoveryCoordinator {
            topology: &mut self.topology,
            table: &mut self.table,
            flows: &mut self.flows,
            routing: &self.routing,
            backup_paths: self.opts.backup_paths,
        };
        Ok(coordinator.run(events, stranded)?)
    }
}
