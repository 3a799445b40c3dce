//! `sdnctl` is a centralized network controller. It keeps a live model of a switched topology,
//! routes flows over it by priority and load, derives per-switch flow tables from the routes,
//! and reroutes affected traffic when links fail while leaving every other flow in place.

#![warn(unreachable_pub, missing_docs)]

pub mod core;
pub mod driver;
