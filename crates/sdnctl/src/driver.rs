//! Loading network specifications from disk.

use std::path::{Path, PathBuf};

use log::info;
use sdnctl_core::{Controller, ControllerOpts, NetworkSpec};

/// Reads a network specification. Only JSON files are understood.
pub fn spec_from_file(path: impl AsRef<Path>) -> Result<NetworkSpec, Error> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let spec = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)?,
        _ => return Err(Error::UnknownFileType(path.into())),
    };
    Ok(spec)
}

/// Builds a controller seeded from the network specification at `path`.
pub fn controller_from_file(
    path: impl AsRef<Path>,
    opts: ControllerOpts,
) -> Result<Controller, Error> {
    let path = path.as_ref();
    let spec = spec_from_file(path)?;
    let (nodes, links, flows) = (spec.nodes.len(), spec.links.len(), spec.flows.len());
    let controller = Controller::from_spec(spec, opts)?;
    info!(
        "loaded {}: {nodes} nodes, {links} links, {flows} flows",
        path.display()
    );
    Ok(controller)
}

/// Errors raised while loading a specification.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file has an extension the driver does not understand.
    #[error("unknown file type: {0}")]
    UnknownFileType(PathBuf),

    /// The file is not a valid specification.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// The file could not be read.
    #[error("IO error")]
    Io(#[from] std::io::Error),

    /// The file describes an invalid network.
    #[error("invalid network specification")]
    Controller(#[from] sdnctl_core::Error),
}
