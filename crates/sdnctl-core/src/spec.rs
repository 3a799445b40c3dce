//! This module defines network specifications ([`NetworkSpec`]), which consist of nodes, links,
//! and flows. A specification seeds a fresh [`Controller`].

use crate::controller::{Controller, FlowRequest};
use crate::error::Error;
use crate::network::{Node, NodeId, Priority};
use crate::opts::ControllerOpts;
use crate::units::{Cost, Mbps, Millisecs};

/// A network specification.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    typed_builder::TypedBuilder,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct NetworkSpec {
    /// Topology nodes.
    #[builder(default)]
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Topology links.
    #[builder(default)]
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    /// Flows admitted after the topology is built, in order.
    #[builder(default)]
    #[serde(default)]
    pub flows: Vec<FlowRequest>,
}

/// A link whose unspecified attributes take the controller's link defaults.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LinkSpec {
    pub a: NodeId,
    pub b: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Mbps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Cost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Millisecs>,
}

impl LinkSpec {
    pub fn new(a: impl Into<NodeId>, b: impl Into<NodeId>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            capacity: None,
            weight: None,
            delay: None,
        }
    }

    pub fn with_attrs(mut self, capacity: Mbps, weight: Cost, delay: Millisecs) -> Self {
        self.capacity = Some(capacity);
        self.weight = Some(weight);
        self.delay = Some(delay);
        self
    }
}

impl NetworkSpec {
    /// Six switches and seven links, with two flows.
    pub fn sample() -> Self {
        let fast = |a: &str, b: &str| {
            LinkSpec::new(a, b).with_attrs(Mbps::new(10), Cost::new(1), Millisecs::new(1))
        };
        let slow = |a: &str, b: &str| {
            LinkSpec::new(a, b).with_attrs(Mbps::new(5), Cost::new(2), Millisecs::new(2))
        };
        Self {
            nodes: ["s1", "s2", "s3", "s4", "s5", "s6"]
                .into_iter()
                .map(Node::new_switch)
                .collect(),
            links: vec![
                fast("s1", "s2"),
                slow("s1", "s3"),
                fast("s2", "s4"),
                slow("s2", "s5"),
                fast("s3", "s5"),
                fast("s4", "s6"),
                slow("s5", "s6"),
            ],
            flows: vec![
                FlowRequest::builder()
                    .src("s1")
                    .dst("s6")
                    .priority(Priority::new(5))
                    .bandwidth(Mbps::new(2))
                    .build(),
                FlowRequest::builder()
                    .src("s3")
                    .dst("s4")
                    .priority(Priority::new(2))
                    .bandwidth(Mbps::new(1))
                    .build(),
            ],
        }
    }
}

impl Controller {
    /// Builds a controller from a specification: nodes first, then links, then flows. Fails on
    /// the first element that cannot be added.
    pub fn from_spec(spec: NetworkSpec, opts: ControllerOpts) -> Result<Self, Error> {
        let mut ctl = Controller::new(opts);
        for node in spec.nodes {
            ctl.add_node(node)?;
        }
        for link in spec.links {
            let attrs = ctl
                .opts()
                .link_attrs(link.capacity, link.weight, link.delay);
            ctl.add_link(&link.a, &link.b, attrs)?;
        }
        for flow in spec.flows {
            ctl.add_flow(flow)?;
        }
        Ok(ctl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::network::Path;

    #[test]
    fn sample_builds() -> anyhow::Result<()> {
        let ctl = Controller::from_spec(NetworkSpec::sample(), ControllerOpts::default())?;
        let stats = ctl.stats();
        assert_eq!(stats.nr_nodes, 6);
        assert_eq!(stats.nr_links, 7);
        let paths = ctl
            .flows()
            .map(|f| f.path.to_string())
            .collect::<Vec<_>>();
        insta::assert_yaml_snapshot!(paths, @r###"
        ---
        - s1 -> s2 -> s4 -> s6
        - s3 -> s5 -> s6 -> s4
        "###);
        ctl.validate()?;
        Ok(())
    }

    #[test]
    fn deserialize_with_defaults() -> anyhow::Result<()> {
        let json = r#"{
            "nodes": [{ "id": "a" }, { "id": "b", "kind": "host", "location": "rack 1" }],
            "links": [{ "a": "a", "b": "b", "delay": 4 }],
            "flows": [{ "src": "a", "dst": "b" }]
        }"#;
        let spec: NetworkSpec = serde_json::from_str(json)?;
        assert_eq!(spec.flows[0].bandwidth, Mbps::new(1));
        let ctl = Controller::from_spec(spec, ControllerOpts::default())?;
        let link = ctl.topology().link(&"a".into(), &"b".into()).unwrap();
        assert_eq!(link.attrs.capacity, Mbps::new(10));
        assert_eq!(link.attrs.delay, Millisecs::new(4));
        assert_eq!(link.forward, Mbps::new(1));
        let flow = ctl.flows().next().unwrap();
        assert_eq!(flow.path, Path::new(vec!["a".into(), "b".into()]));
        Ok(())
    }

    #[test]
    fn invalid_spec_fails() {
        let spec = NetworkSpec::builder()
            .nodes(vec![Node::new_switch("a")])
            .links(vec![LinkSpec::new("a", "b")])
            .build();
        let err = Controller::from_spec(spec, ControllerOpts::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
