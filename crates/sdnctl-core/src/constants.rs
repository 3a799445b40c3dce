//! Controller policy constants.

use crate::units::{Cost, Mbps, Millisecs};

/// Flows with a priority strictly greater than this are routed to minimise delay.
pub const HIGH_PRIORITY_THRESHOLD: i32 = 5;

/// The priority of a flow that does not specify one.
pub const DEFAULT_PRIORITY: i32 = 0;

/// The bandwidth of a flow that does not specify one.
pub const DEFAULT_BANDWIDTH: Mbps = Mbps::new(1);

/// The capacity of a link that does not specify one.
pub const DEFAULT_CAPACITY: Mbps = Mbps::new(10);

/// The weight of a link that does not specify one.
pub const DEFAULT_WEIGHT: Cost = Cost::new(1);

/// The delay of a link that does not specify one.
pub const DEFAULT_DELAY: Millisecs = Millisecs::new(1);

/// The number of equal-cost candidate paths examined when breaking ties.
pub const DEFAULT_MAX_CANDIDATE_PATHS: usize = 1024;
