use anyhow::Context;

use crate::controller::Controller;
use crate::network::types::{LinkAttrs, Node, NodeId};
use crate::network::Topology;
use crate::opts::ControllerOpts;
use crate::units::{Cost, Mbps, Millisecs};

pub(crate) fn attrs(capacity: u64, weight: u64, delay: u64) -> LinkAttrs {
    LinkAttrs {
        capacity: Mbps::new(capacity),
        weight: Cost::new(weight),
        delay: Millisecs::new(delay),
    }
}

pub(crate) fn build(nodes: &[&str], links: &[(&str, &str, LinkAttrs)]) -> anyhow::Result<Topology> {
    let mut topo = Topology::new();
    for &n in nodes {
        topo.add_node(Node::new_switch(n))
            .with_context(|| format!("failed to add node {n}"))?;
    }
    for &(a, b, attrs) in links {
        topo.add_link(&NodeId::from(a), &NodeId::from(b), attrs)
            .with_context(|| format!("failed to add link {a} <-> {b}"))?;
    }
    Ok(topo)
}

/// Six switches in a ring (s1 - s2 - ... - s6 - s1) with a slow cross-link s1 - s4. Every link
/// has capacity 10 and weight 1. Ring links have delay 1, the cross-link has delay 10.
pub(crate) fn ring_with_cross() -> anyhow::Result<Topology> {
    let ring = attrs(10, 1, 1);
    build(
        &["s1", "s2", "s3", "s4", "s5", "s6"],
        &[
            ("s1", "s2", ring),
            ("s2", "s3", ring),
            ("s3", "s4", ring),
            ("s4", "s5", ring),
            ("s5", "s6", ring),
            ("s6", "s1", ring),
            ("s1", "s4", attrs(10, 1, 10)),
        ],
    )
}

/// The six-switch sample network the shell seeds with `--sample`.
pub(crate) fn sample() -> anyhow::Result<Topology> {
    build(
        &["s1", "s2", "s3", "s4", "s5", "s6"],
        &[
            ("s1", "s2", attrs(10, 1, 1)),
            ("s1", "s3", attrs(5, 2, 2)),
            ("s2", "s4", attrs(10, 1, 1)),
            ("s2", "s5", attrs(5, 2, 2)),
            ("s3", "s5", attrs(10, 1, 1)),
            ("s4", "s6", attrs(10, 1, 1)),
            ("s5", "s6", attrs(5, 2, 2)),
        ],
    )
}

/// A controller over [`ring_with_cross`] with default options.
pub(crate) fn ring_controller() -> anyhow::Result<Controller> {
    ring_controller_with(ControllerOpts::default())
}

pub(crate) fn ring_controller_with(opts: ControllerOpts) -> anyhow::Result<Controller> {
    let ring = attrs(10, 1, 1);
    controller(
        opts,
        &["s1", "s2", "s3", "s4", "s5", "s6"],
        &[
            ("s1", "s2", ring),
            ("s2", "s3", ring),
            ("s3", "s4", ring),
            ("s4", "s5", ring),
            ("s5", "s6", ring),
            ("s6", "s1", ring),
            ("s1", "s4", attrs(10, 1, 10)),
        ],
    )
}

/// A controller over the chain s1 - s2 - s3.
pub(crate) fn chain_controller() -> anyhow::Result<Controller> {
    let link = attrs(10, 1, 1);
    controller(
        ControllerOpts::default(),
        &["s1", "s2", "s3"],
        &[("s1", "s2", link), ("s2", "s3", link)],
    )
}

fn controller(
    opts: ControllerOpts,
    nodes: &[&str],
    links: &[(&str, &str, LinkAttrs)],
) -> anyhow::Result<Controller> {
    let mut ctl = Controller::new(opts);
    for &n in nodes {
        ctl.add_switch(n)
            .with_context(|| format!("failed to add node {n}"))?;
    }
    for &(a, b, attrs) in links {
        ctl.add_link(&NodeId::from(a), &NodeId::from(b), attrs)
            .with_context(|| format!("failed to add link {a} <-> {b}"))?;
    }
    Ok(ctl)
}
