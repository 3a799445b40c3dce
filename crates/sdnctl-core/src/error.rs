//! Controller errors and their classification.

use crate::flowtable::FlowTableError;
use crate::network::{FlowId, TopologyError};
use crate::routing::PathError;

/// The coarse class of a failure, for callers that only need to know what went wrong, not
/// where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, serde::Serialize)]
pub enum ErrorKind {
    /// A referenced node, link, or flow does not exist.
    NotFound,
    /// A node or link already exists.
    Duplicate,
    /// An argument is out of range or malformed.
    InvalidParameter,
    /// No path connects the endpoints.
    PathNotFound,
    /// Admitting a flow would overcommit a link.
    CapacityExceeded,
}

/// The error type returned by [`Controller`](crate::Controller) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    FlowTable(#[from] FlowTableError),

    #[error("flow {0} not found")]
    FlowNotFound(FlowId),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Topology(e) => e.kind(),
            Error::Path(e) => e.kind(),
            Error::FlowTable(e) => e.kind(),
            Error::FlowNotFound(..) => ErrorKind::NotFound,
            Error::InvalidParameter(..) => ErrorKind::InvalidParameter,
        }
    }
}

impl TopologyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TopologyError::DuplicateNode(..) | TopologyError::DuplicateLink { .. } => {
                ErrorKind::Duplicate
            }
            TopologyError::NodeNotFound(..)
            | TopologyError::LinkNotFound { .. }
            | TopologyError::LinkNotFailed { .. } => ErrorKind::NotFound,
            TopologyError::NodeAdjacentSelf(..)
            | TopologyError::InvalidParameter(..)
            // Releasing more than was reserved is a bookkeeping error, not an admission one
            | TopologyError::UtilizationUnderflow { .. } => ErrorKind::InvalidParameter,
            TopologyError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
        }
    }
}

impl PathError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PathError::NodeNotFound(..) => ErrorKind::NotFound,
            PathError::PathNotFound { .. } => ErrorKind::PathNotFound,
            PathError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
        }
    }
}

impl FlowTableError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowTableError::AlreadyInstalled(..) => ErrorKind::Duplicate,
            FlowTableError::NotInstalled(..) => ErrorKind::NotFound,
            FlowTableError::Topology(e) => e.kind(),
        }
    }
}
