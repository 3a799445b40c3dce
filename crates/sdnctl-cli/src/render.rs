//! Plain-text rendering of controller state.

use sdnctl::core::{
    Controller, Error, NodeId, RecoveryOutcome, RecoveryReport, Stats, Topology, TopologyError,
};

/// Joins lines, terminating each with a newline.
fn lines(rows: impl IntoIterator<Item = String>) -> String {
    rows.into_iter().map(|l| l + "\n").collect()
}

pub(crate) fn report(report: &RecoveryReport) -> String {
    let events = report
        .events
        .iter()
        .map(|e| format!("link {} down ({})", e.link, e.cause));
    let flows = report.flows.iter().map(|f| match &f.outcome {
        RecoveryOutcome::BackupPromoted { path } => {
            format!("  flow {}: backup promoted, now {path}", f.flow)
        }
        RecoveryOutcome::Recomputed { path } => format!("  flow {}: rerouted onto {path}", f.flow),
        RecoveryOutcome::Unreachable => format!("  flow {}: unreachable", f.flow),
    });
    lines(events.chain([report.to_string()]).chain(flows))
}

pub(crate) fn flows(ctl: &Controller) -> String {
    let header = format!(
        "{:>4}  {:<8} {:<8} {:>4} {:>8}  {:<11} {:>3}  PATH / BACKUP",
        "ID", "SRC", "DST", "PRIO", "BW", "STATUS", "RR"
    );
    let rows = ctl.flows().map(|flow| {
        let backup = flow
            .backup
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        format!(
            "{:>4}  {:<8} {:<8} {:>4} {:>8}  {:<11} {:>3}  {} / {}",
            flow.id,
            flow.src.as_str(),
            flow.dst.as_str(),
            flow.priority.inner(),
            flow.bandwidth.to_string(),
            flow.status.to_string(),
            flow.reroutes,
            flow.path,
            backup
        )
    });
    lines([header].into_iter().chain(rows))
}

pub(crate) fn topology(topology: &Topology) -> String {
    let nodes = topology.nodes().into_iter().map(|node| match &node.location {
        Some(location) => format!("  {} ({}, {location})", node.id, node.kind),
        None => format!("  {} ({})", node.id, node.kind),
    });
    let links = topology.links().into_iter().map(|link| {
        format!(
            "  {}  capacity {}, weight {}, delay {}, load {} / {}",
            link.key(),
            link.attrs.capacity,
            link.attrs.weight,
            link.attrs.delay,
            link.forward,
            link.reverse
        )
    });
    let failed = topology
        .failed_links()
        .map(|(link, _)| format!("  {link}"))
        .collect::<Vec<_>>();
    let mut out = vec![format!("nodes ({}):", topology.nr_nodes())];
    out.extend(nodes);
    out.push(format!("links ({}):", topology.nr_links()));
    out.extend(links);
    if !failed.is_empty() {
        out.push(format!("failed links ({}):", failed.len()));
        out.extend(failed);
    }
    lines(out)
}

/// Renders every non-empty flow table, or the table of one switch. Naming a switch that is not
/// in the topology is an error.
pub(crate) fn flow_tables(ctl: &Controller, switch: Option<&NodeId>) -> Result<String, Error> {
    let tables = match switch {
        Some(id) if !ctl.topology().contains_node(id) => {
            return Err(TopologyError::NodeNotFound(id.clone()).into())
        }
        Some(id) => vec![(id, ctl.entries_for_switch(id))],
        None => ctl.flow_table().tables().collect(),
    };
    if tables.is_empty() {
        return Ok(lines(["no flow table entries".to_string()]));
    }
    let mut out = Vec::new();
    for (id, entries) in tables {
        out.push(format!("{id}:"));
        if entries.is_empty() {
            out.push("  (empty)".to_string());
        }
        out.extend(entries.iter().map(|e| {
            format!(
                "  flow {} ({} -> {}) priority {} => {}",
                e.flow(),
                e.matches.src,
                e.matches.dst,
                e.priority,
                e.next_hop
            )
        }));
    }
    Ok(lines(out))
}

pub(crate) fn stats(stats: &Stats) -> String {
    let by_status = if stats.flows_by_status.is_empty() {
        "none current".to_string()
    } else {
        stats
            .flows_by_status
            .iter()
            .map(|(status, n)| format!("{n} {status}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let summary = [
        format!(
            "nodes: {}, links: {} ({} failed)",
            stats.nr_nodes, stats.nr_links, stats.nr_failed_links
        ),
        format!("flows: {} created, {by_status}", stats.total_flows_created),
        format!(
            "average hops: {:.2}, backed up: {}",
            stats.avg_hops, stats.nr_backed_up
        ),
        format!(
            "link utilization: mean {:.1}%, max {:.1}%",
            stats.utilization.mean_ratio.into_inner() * 100.0,
            stats.utilization.max_ratio.into_inner() * 100.0
        ),
    ];
    let links = stats.utilization.links.iter().map(|l| {
        format!(
            "  {}  {} / {} of {} ({:.1}%)",
            l.link,
            l.forward,
            l.reverse,
            l.capacity,
            l.ratio.into_inner() * 100.0
        )
    });
    lines(summary.into_iter().chain(links))
}
