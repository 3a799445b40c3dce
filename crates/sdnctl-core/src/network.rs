//! The topology store and the data types shared by every other component.

pub(crate) mod topology;
pub(crate) mod types;

pub(crate) use topology::{Admission, LinkEvent, Topology, TopologyError};
pub(crate) use types::*;
