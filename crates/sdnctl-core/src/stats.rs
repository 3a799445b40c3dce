//! Aggregate statistics over a controller.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::controller::Controller;
use crate::network::{FlowStatus, LinkKey};
use crate::routing::RoutingAlgo;
use crate::units::Mbps;

/// A snapshot of controller statistics.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Stats {
    pub nr_nodes: usize,
    pub nr_links: usize,
    pub nr_failed_links: usize,
    /// Flows ever admitted, including removed ones.
    pub total_flows_created: usize,
    pub flows_by_status: BTreeMap<FlowStatus, usize>,
    /// Mean number of hops over active flows, or zero if there are none.
    pub avg_hops: f64,
    /// Active flows with a backup path.
    pub nr_backed_up: usize,
    pub utilization: UtilizationSummary,
}

/// Per-link utilization. A link's ratio is the higher of its two directions.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct UtilizationSummary {
    pub links: Vec<LinkUtilization>,
    pub mean_ratio: OrderedFloat<f64>,
    pub max_ratio: OrderedFloat<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LinkUtilization {
    pub link: LinkKey,
    pub capacity: Mbps,
    pub forward: Mbps,
    pub reverse: Mbps,
    pub ratio: OrderedFloat<f64>,
}

impl<R: RoutingAlgo> Controller<R> {
    pub fn stats(&self) -> Stats {
        let topology = self.topology();
        let mut flows_by_status = BTreeMap::new();
        for flow in self.flows() {
            *flows_by_status.entry(flow.status).or_insert(0) += 1;
        }
        let active = self.flows().filter(|f| f.is_active()).collect::<Vec<_>>();
        let avg_hops = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|f| f.path.hops()).sum::<usize>() as f64 / active.len() as f64
        };

        let links = topology
            .links()
            .into_iter()
            .map(|l| LinkUtilization {
                link: l.key(),
                capacity: l.attrs.capacity,
                forward: l.forward,
                reverse: l.reverse,
                ratio: l.peak_ratio(),
            })
            .collect::<Vec<_>>();
        let max_ratio = links.iter().map(|l| l.ratio).max().unwrap_or_default();
        let mean_ratio = if links.is_empty() {
            OrderedFloat(0.0)
        } else {
            OrderedFloat(links.iter().map(|l| l.ratio.into_inner()).sum::<f64>() / links.len() as f64)
        };

        Stats {
            nr_nodes: topology.nr_nodes(),
            nr_links: topology.nr_links(),
            nr_failed_links: topology.failed_links().count(),
            total_flows_created: self.total_created(),
            flows_by_status,
            avg_hops,
            nr_backed_up: active.iter().filter(|f| f.backup.is_some()).count(),
            utilization: UtilizationSummary {
                links,
                mean_ratio,
                max_ratio,
            },
        }
    }
}
