use sdnctl_core::{
    units::{Mbps, Millisecs},
    Controller, ControllerOpts, ErrorKind, Flow, FlowId, FlowRequest, FlowStatus, LinkKey,
    LinkSpec, NetworkSpec, Node, NodeId, Path, Priority, RecoveryOutcome,
};

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn path(nodes: &[&str]) -> Path {
    Path::new(nodes.iter().map(|&n| id(n)).collect())
}

fn request(src: &str, dst: &str, priority: i32, bandwidth: u64) -> FlowRequest {
    FlowRequest::builder()
        .src(src)
        .dst(dst)
        .priority(Priority::new(priority))
        .bandwidth(Mbps::new(bandwidth))
        .build()
}

/// s1..s6 in a ring with delay 1 per link, plus a cross-link s1 - s4 with delay 10.
fn ring() -> anyhow::Result<Controller> {
    let mut links = ["s1", "s2", "s3", "s4", "s5", "s6"]
        .windows(2)
        .map(|w| LinkSpec::new(w[0], w[1]))
        .collect::<Vec<_>>();
    links.push(LinkSpec::new("s6", "s1"));
    let mut cross = LinkSpec::new("s1", "s4");
    cross.delay = Some(Millisecs::new(10));
    links.push(cross);
    let spec = NetworkSpec::builder()
        .nodes(
            ["s1", "s2", "s3", "s4", "s5", "s6"]
                .into_iter()
                .map(Node::new_switch)
                .collect(),
        )
        .links(links)
        .build();
    Ok(Controller::from_spec(spec, ControllerOpts::default())?)
}

fn snapshot(ctl: &Controller) -> Vec<Flow> {
    ctl.flows().cloned().collect()
}

fn assert_invariants(ctl: &Controller) -> anyhow::Result<()> {
    for (switch, entries) in ctl.flow_table().tables() {
        for entry in entries {
            assert!(
                ctl.topology().channel(switch, &entry.next_hop).is_some(),
                "dangling entry {switch} -> {}",
                entry.next_hop
            );
        }
    }
    for flow in ctl.flows() {
        assert_ne!(flow.status, FlowStatus::Rerouting);
        if let Some(backup) = &flow.backup {
            assert!(!backup.shares_link_with(&flow.path));
        }
    }
    ctl.validate()?;
    Ok(())
}

#[test]
fn high_priority_prefers_lower_delay_over_fewer_hops() -> anyhow::Result<()> {
    let mut ctl = ring()?;
    let f = ctl.add_flow(request("s1", "s4", 8, 2))?;
    assert_eq!(ctl.flow(f).unwrap().path, path(&["s1", "s2", "s3", "s4"]));
    Ok(())
}

#[test]
fn high_priority_picks_lower_delay_among_equal_lengths() -> anyhow::Result<()> {
    let mut slow = LinkSpec::new("a", "b");
    slow.delay = Some(Millisecs::new(5));
    let mut slower = LinkSpec::new("b", "d");
    slower.delay = Some(Millisecs::new(5));
    let spec = NetworkSpec::builder()
        .nodes(["a", "b", "c", "d"].into_iter().map(Node::new_switch).collect())
        .links(vec![slow, slower, LinkSpec::new("a", "c"), LinkSpec::new("c", "d")])
        .build();
    let mut ctl = Controller::from_spec(spec, ControllerOpts::default())?;
    let high = ctl.add_flow(request("a", "d", 6, 1))?;
    let low = ctl.add_flow(request("a", "d", 5, 1))?;
    assert_eq!(ctl.flow(high).unwrap().path, path(&["a", "c", "d"]));
    // Equal weight, so the load tie-break steers the low-priority flow off the busy route
    assert_eq!(ctl.flow(low).unwrap().path, path(&["a", "b", "d"]));
    Ok(())
}

#[test]
fn failure_reroutes_only_affected_flows() -> anyhow::Result<()> {
    let mut ctl = ring()?;
    let f = ctl.add_flow(request("s1", "s4", 2, 2))?;
    let unrelated = ctl.add_flow(request("s2", "s5", 2, 1))?;
    let flow = ctl.flow(f).unwrap().clone();
    assert_eq!(flow.path, path(&["s1", "s4"]));
    let backup = flow.backup.clone().unwrap();
    let before = ctl.flow(unrelated).unwrap().clone();

    let first = &flow.path.nodes()[..2];
    let report = ctl.simulate_failure(&first[0], &first[1])?;
    assert_eq!(report.affected(), 1);
    assert_eq!(
        report.outcome(f),
        Some(&RecoveryOutcome::BackupPromoted {
            path: backup.clone()
        })
    );
    let after = ctl.flow(f).unwrap();
    assert_ne!(after.path, flow.path);
    assert_eq!(after.path, backup);
    assert_eq!(after.status, FlowStatus::Active);
    assert_eq!(ctl.flow(unrelated), Some(&before));
    assert_invariants(&ctl)?;
    Ok(())
}

#[test]
fn successive_failures_keep_invariants() -> anyhow::Result<()> {
    let mut ctl = ring()?;
    let pairs = [
        ("s1", "s4", 8),
        ("s2", "s5", 2),
        ("s3", "s6", 0),
        ("s6", "s2", 7),
        ("s5", "s1", 3),
        ("s4", "s4", 1),
    ];
    for (src, dst, priority) in pairs {
        ctl.add_flow(request(src, dst, priority, 1))?;
    }
    assert_invariants(&ctl)?;

    let failures = [("s1", "s2"), ("s4", "s5"), ("s3", "s4")];
    for (a, b) in failures {
        let before = snapshot(&ctl);
        let report = ctl.simulate_failure(&id(a), &id(b))?;
        for flow in before {
            let crossed = flow.is_active() && flow.path.traverses(&LinkKey::new(&id(a), &id(b)));
            let now = ctl.flow(flow.id).unwrap();
            if crossed {
                assert!(report.outcome(flow.id).is_some());
                assert!(matches!(
                    now.status,
                    FlowStatus::Active | FlowStatus::Unreachable
                ));
            } else {
                assert!(report.outcome(flow.id).is_none());
                assert_eq!(now.path, flow.path);
                assert_eq!(now.status, flow.status);
            }
        }
        assert_invariants(&ctl)?;
    }

    // What is left is two islands, {s2, s3} and {s1, s4, s5, s6}
    let stranded = ctl
        .flows()
        .filter(|f| f.status == FlowStatus::Unreachable)
        .map(|f| f.id)
        .collect::<Vec<_>>();
    assert_eq!(stranded, vec![FlowId::new(2), FlowId::new(3), FlowId::new(4)]);
    ctl.restore_link(&id("s3"), &id("s4"))?;
    let report = ctl.recover_unreachable()?;
    assert_eq!(report.recovered(), 3);
    assert_invariants(&ctl)?;
    Ok(())
}

#[test]
fn add_then_remove_restores_utilization() -> anyhow::Result<()> {
    let mut ctl = ring()?;
    ctl.add_flow(request("s2", "s4", 0, 3))?;
    let before = ctl.topology().links();
    let f = ctl.add_flow(request("s1", "s3", 7, 4))?;
    assert_ne!(ctl.topology().links(), before);
    ctl.remove_flow(f)?;
    assert_eq!(ctl.topology().links(), before);
    Ok(())
}

#[test]
fn removing_idle_node_drops_its_links() -> anyhow::Result<()> {
    let mut ctl = ring()?;
    let report = ctl.remove_node(&id("s5"))?;
    assert_eq!(report.events.len(), 2);
    assert_eq!(report.affected(), 0);
    assert_eq!(ctl.topology().nr_links(), 5);
    assert!(ctl.topology().link(&id("s4"), &id("s5")).is_none());
    assert!(ctl.topology().link(&id("s5"), &id("s6")).is_none());
    Ok(())
}

#[test]
fn oversized_flow_leaves_no_entries() -> anyhow::Result<()> {
    let mut ctl = ring()?;
    ctl.add_flow(request("s1", "s2", 0, 1))?;
    let entries = ctl.flow_table().nr_entries();
    let err = ctl.add_flow(request("s1", "s4", 9, 20)).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::CapacityExceeded | ErrorKind::PathNotFound
    ));
    assert_eq!(ctl.flow_table().nr_entries(), entries);
    assert_eq!(ctl.flows().count(), 1);
    assert_invariants(&ctl)?;
    Ok(())
}

#[test]
fn entries_follow_the_path() -> anyhow::Result<()> {
    let mut ctl = ring()?;
    let f = ctl.add_flow(request("s1", "s3", 6, 1))?;
    let hops = ["s1", "s2"]
        .into_iter()
        .map(|s| {
            let entries = ctl.entries_for_switch(&id(s));
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].flow(), f);
            entries[0].next_hop.to_string()
        })
        .collect::<Vec<_>>();
    assert_eq!(hops, vec!["s2", "s3"]);
    assert!(ctl.entries_for_switch(&id("s3")).is_empty());
    Ok(())
}
