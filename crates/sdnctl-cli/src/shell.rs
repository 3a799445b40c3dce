//! The line-oriented command shell. Each input line is parsed as one subcommand; errors are
//! reported and the shell keeps going.

use std::io::{BufRead, Write};

use clap::{Parser, Subcommand};
use sdnctl::core::{
    units::{Cost, Mbps, Millisecs},
    Controller, Error, FlowId, FlowRequest, Node, NodeId, Priority,
};

use crate::render;

const PROMPT: &str = "sdnctl> ";

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Add a switch or host
    #[command(alias = "add_node")]
    AddNode {
        id: String,
        /// Add a host instead of a switch
        #[arg(long)]
        host: bool,
        /// Where the node lives, for display
        #[arg(long)]
        location: Option<String>,
    },
    /// Remove a node, its links, and reroute the flows crossing it
    #[command(alias = "remove_node")]
    RemoveNode { id: String },
    /// Add a bidirectional link
    #[command(alias = "add_link")]
    AddLink {
        a: String,
        b: String,
        capacity: Option<Mbps>,
        weight: Option<Cost>,
        delay: Option<Millisecs>,
    },
    /// Administratively remove a link
    #[command(alias = "remove_link")]
    RemoveLink { a: String, b: String },
    /// Bring back a failed link
    #[command(alias = "restore_link")]
    RestoreLink { a: String, b: String },
    /// Admit a flow
    #[command(alias = "add_flow")]
    AddFlow {
        src: String,
        dst: String,
        #[arg(allow_negative_numbers = true)]
        priority: Option<Priority>,
        bandwidth: Option<Mbps>,
    },
    /// Withdraw a flow
    #[command(alias = "remove_flow")]
    RemoveFlow { id: FlowId },
    /// Fail a link and recover the flows crossing it
    #[command(alias = "simulate_failure")]
    SimulateFailure { a: String, b: String },
    /// Retry every unreachable flow
    Recover,
    /// List flows
    #[command(alias = "show_flows")]
    ShowFlows,
    /// Show nodes and links
    #[command(alias = "show_topology")]
    ShowTopology,
    /// Show the flow tables of every switch, or of one
    #[command(alias = "show_flow_tables")]
    ShowFlowTables { switch: Option<String> },
    /// Show aggregate statistics
    #[command(alias = "show_stats")]
    ShowStats,
    /// Check controller invariants
    Validate,
    /// Leave the shell
    #[command(alias = "quit")]
    Exit,
}

/// Reads commands from `input` until it ends or an `exit` command is seen.
pub(crate) fn run(
    ctl: &mut Controller,
    input: impl BufRead,
    mut out: impl Write,
) -> anyhow::Result<()> {
    write!(out, "{PROMPT}")?;
    out.flush()?;
    for line in input.lines() {
        let line = line?;
        let words = line.split_whitespace().collect::<Vec<_>>();
        if !words.is_empty() {
            match Line::try_parse_from(words) {
                Ok(Line {
                    command: Command::Exit,
                }) => return Ok(()),
                Ok(Line { command }) => match execute(ctl, command) {
                    Ok(text) => write!(out, "{text}")?,
                    Err(e) => writeln!(out, "error ({}): {e}", e.kind())?,
                },
                Err(e) => write!(out, "{}", e.render())?,
            }
        }
        write!(out, "{PROMPT}")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

fn execute(ctl: &mut Controller, command: Command) -> Result<String, Error> {
    let text = match command {
        Command::AddNode { id, host, location } => {
            let mut node = if host {
                Node::new_host(id)
            } else {
                Node::new_switch(id)
            };
            node.location = location;
            let text = format!("added {} {}\n", node.kind, node.id);
            ctl.add_node(node)?;
            text
        }
        Command::RemoveNode { id } => {
            let report = ctl.remove_node(&NodeId::from(id.as_str()))?;
            format!("removed node {id}\n{}", render::report(&report))
        }
        Command::AddLink {
            a,
            b,
            capacity,
            weight,
            delay,
        } => {
            let attrs = ctl.opts().link_attrs(capacity, weight, delay);
            ctl.add_link(&NodeId::from(a.as_str()), &NodeId::from(b.as_str()), attrs)?;
            format!(
                "added link {a} <-> {b} (capacity {}, weight {}, delay {})\n",
                attrs.capacity, attrs.weight, attrs.delay
            )
        }
        Command::RemoveLink { a, b } => {
            let report = ctl.remove_link(&NodeId::from(a), &NodeId::from(b))?;
            render::report(&report)
        }
        Command::RestoreLink { a, b } => {
            ctl.restore_link(&NodeId::from(a.as_str()), &NodeId::from(b.as_str()))?;
            format!("restored link {a} <-> {b}\n")
        }
        Command::AddFlow {
            src,
            dst,
            priority,
            bandwidth,
        } => {
            let request = FlowRequest::builder()
                .src(src)
                .dst(dst)
                .priority(priority.unwrap_or_default())
                .bandwidth(bandwidth.unwrap_or(sdnctl::core::constants::DEFAULT_BANDWIDTH))
                .build();
            let id = ctl.add_flow(request)?;
            let flow = ctl.flow(id).ok_or(Error::FlowNotFound(id))?;
            format!("added flow {id} on {}\n", flow.path)
        }
        Command::RemoveFlow { id } => {
            ctl.remove_flow(id)?;
            format!("removed flow {id}\n")
        }
        Command::SimulateFailure { a, b } => {
            let report = ctl.simulate_failure(&NodeId::from(a), &NodeId::from(b))?;
            render::report(&report)
        }
        Command::Recover => render::report(&ctl.recover_unreachable()?),
        Command::ShowFlows => render::flows(ctl),
        Command::ShowTopology => render::topology(ctl.topology()),
        Command::ShowFlowTables { switch } => {
            render::flow_tables(ctl, switch.map(NodeId::from).as_ref())?
        }
        Command::ShowStats => render::stats(&ctl.stats()),
        Command::Validate => match ctl.validate() {
            Ok(()) => "consistent\n".to_string(),
            Err(e) => format!("inconsistent: {e}\n"),
        },
        // Handled by the read loop
        Command::Exit => String::new(),
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdnctl::core::{ControllerOpts, NetworkSpec};

    fn parse(line: &str) -> anyhow::Result<Command> {
        let words = line.split_whitespace().collect::<Vec<_>>();
        Ok(Line::try_parse_from(words)?.command)
    }

    fn session(ctl: &mut Controller, script: &str) -> anyhow::Result<String> {
        let mut out = Vec::new();
        run(ctl, script.as_bytes(), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn parses_legacy_spellings() -> anyhow::Result<()> {
        assert_eq!(
            parse("add_link s1 s2 5 2 3")?,
            Command::AddLink {
                a: "s1".into(),
                b: "s2".into(),
                capacity: Some(Mbps::new(5)),
                weight: Some(Cost::new(2)),
                delay: Some(Millisecs::new(3)),
            }
        );
        assert_eq!(
            parse("add-flow s1 s6 7")?,
            Command::AddFlow {
                src: "s1".into(),
                dst: "s6".into(),
                priority: Some(Priority::new(7)),
                bandwidth: None,
            }
        );
        assert_eq!(
            parse("add_flow h1 h2 -3 4")?,
            Command::AddFlow {
                src: "h1".into(),
                dst: "h2".into(),
                priority: Some(Priority::new(-3)),
                bandwidth: Some(Mbps::new(4)),
            }
        );
        assert_eq!(parse("quit")?, Command::Exit);
        assert_eq!(
            parse("remove_flow 3")?,
            Command::RemoveFlow { id: FlowId::new(3) }
        );
        Ok(())
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert!(parse("add-link s1 s2 lots").is_err());
        assert!(parse("remove-flow x").is_err());
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn errors_do_not_end_the_session() -> anyhow::Result<()> {
        let mut ctl = Controller::new(ControllerOpts::default());
        let out = session(
            &mut ctl,
            "add-node s1\nadd-node s1\nadd-node s2\nadd-link s1 s2\nadd-flow s1 s2 1 20\nadd-flow s1 s2\nexit\nadd-node s3\n",
        )?;
        assert!(out.contains("error (Duplicate): node s1 already exists"));
        assert!(out.contains("error (CapacityExceeded)"));
        assert!(out.contains("added flow 1 on s1 -> s2"));
        // Nothing after `exit` runs
        assert!(!ctl.topology().contains_node(&"s3".into()));
        Ok(())
    }

    #[test]
    fn failure_session_on_sample() -> anyhow::Result<()> {
        let mut ctl = Controller::from_spec(NetworkSpec::sample(), ControllerOpts::default())?;
        let out = session(&mut ctl, "simulate-failure s2 s4\nvalidate\n")?;
        assert_eq!(
            out,
            "sdnctl> link s2 <-> s4 down (failure)\n\
             1 affected, 1 recovered, 0 unreachable\n  \
             flow 1: backup promoted, now s1 -> s3 -> s5 -> s6\n\
             sdnctl> consistent\n\
             sdnctl> \n"
        );
        Ok(())
    }
}
