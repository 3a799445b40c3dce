use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sdnctl::core::{Admission, Controller, ControllerOpts, NetworkSpec};

mod render;
mod shell;

/// An interactive shell over an in-memory network controller.
#[derive(Parser, Debug)]
#[command(name = "sdnctl", version)]
struct Args {
    /// Seed the controller from a JSON network specification
    #[arg(short, long, conflicts_with = "sample")]
    topology: Option<PathBuf>,
    /// Seed the controller with the six-switch sample network
    #[arg(long)]
    sample: bool,
    /// Admit new flows even when they overcommit a link
    #[arg(long)]
    oversubscribe: bool,
    /// Do not precompute backup paths
    #[arg(long)]
    no_backups: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let admission = if args.oversubscribe {
        Admission::Oversubscribe
    } else {
        Admission::Strict
    };
    let opts = ControllerOpts::builder()
        .admission(admission)
        .backup_paths(!args.no_backups)
        .build();
    let mut ctl = match (&args.topology, args.sample) {
        (Some(path), _) => sdnctl::driver::controller_from_file(path, opts)
            .with_context(|| format!("failed to load {}", path.display()))?,
        (None, true) => Controller::from_spec(NetworkSpec::sample(), opts)
            .context("failed to seed the sample network")?,
        (None, false) => Controller::new(opts),
    };
    shell::run(&mut ctl, io::stdin().lock(), io::stdout().lock())
}
