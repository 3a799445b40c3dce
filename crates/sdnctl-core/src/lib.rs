#![warn(unreachable_pub, missing_debug_implementations)]

//! The core of the sdnctl network controller. This crate defines the [`Controller`], which keeps
//! a live model of a switched topology, routes flows over it by priority and load, derives
//! per-switch flow tables from the routes, and reroutes traffic around failed links.

#[macro_use]
mod ident;

pub mod constants;
pub mod units;

mod audit;
mod controller;
mod error;
mod flowtable;
mod network;
mod opts;
mod recovery;
mod routing;
mod spec;
mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::ConsistencyError;
pub use controller::{Controller, FlowRequest};
pub use error::{Error, ErrorKind};
pub use flowtable::{FlowEntry, FlowMatch, FlowTable, FlowTableError};
pub use network::{
    topology::{Admission, LinkCause, LinkEvent, Topology, TopologyError, UtilizationDelta},
    types::{
        Channel, Flow, FlowId, FlowStatus, Link, LinkAttrs, LinkKey, Node, NodeId, NodeKind,
        Path, Priority,
    },
};
pub use opts::ControllerOpts;
pub use recovery::{FlowRecovery, RecoveryOutcome, RecoveryReport};
pub use routing::{PathError, PathRequest, PriorityRouting, RoutingAlgo};
pub use spec::{LinkSpec, NetworkSpec};
pub use stats::{LinkUtilization, Stats, UtilizationSummary};
