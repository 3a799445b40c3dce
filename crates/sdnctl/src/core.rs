//! The controller core: topology store, path engine, flow tables, and failure recovery.

pub use sdnctl_core::*;
