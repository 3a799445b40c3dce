use std::io::Write;

use sdnctl::core::{units::Mbps, ControllerOpts, ErrorKind, FlowStatus, NetworkSpec, NodeId};
use sdnctl::driver::{self, Error};

const SPEC: &str = r#"{
    "nodes": [{ "id": "s1" }, { "id": "s2" }, { "id": "s3" }],
    "links": [
        { "a": "s1", "b": "s2", "capacity": 4 },
        { "a": "s2", "b": "s3" },
        { "a": "s1", "b": "s3", "weight": 5 }
    ],
    "flows": [{ "src": "s1", "dst": "s3", "priority": 1, "bandwidth": 3 }]
}"#;

fn write_spec(suffix: &str, contents: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn loads_json_spec() -> anyhow::Result<()> {
    let file = write_spec(".json", SPEC)?;
    let ctl = driver::controller_from_file(file.path(), ControllerOpts::default())?;
    assert_eq!(ctl.topology().nr_links(), 3);
    let flow = ctl.flows().next().unwrap();
    assert_eq!(flow.status, FlowStatus::Active);
    assert_eq!(
        flow.path.nodes(),
        &[NodeId::from("s1"), NodeId::from("s2"), NodeId::from("s3")]
    );
    let link = ctl
        .topology()
        .link(&"s1".into(), &"s2".into())
        .unwrap();
    assert_eq!(link.attrs.capacity, Mbps::new(4));
    assert_eq!(link.forward, Mbps::new(3));
    ctl.validate()?;
    Ok(())
}

#[test]
fn sample_round_trips_through_json() -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&NetworkSpec::sample())?;
    let file = write_spec(".json", &json)?;
    let spec = driver::spec_from_file(file.path())?;
    assert_eq!(spec, NetworkSpec::sample());
    Ok(())
}

#[test]
fn rejects_unknown_extension() -> anyhow::Result<()> {
    let file = write_spec(".yaml", SPEC)?;
    let res = driver::spec_from_file(file.path());
    assert!(matches!(res, Err(Error::UnknownFileType(..))));
    Ok(())
}

#[test]
fn reports_invalid_network() -> anyhow::Result<()> {
    let file = write_spec(
        ".json",
        r#"{ "nodes": [{ "id": "s1" }], "links": [{ "a": "s1", "b": "s1" }] }"#,
    )?;
    let res = driver::controller_from_file(file.path(), ControllerOpts::default());
    match res {
        Err(Error::Controller(e)) => assert_eq!(e.kind(), ErrorKind::InvalidParameter),
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}
