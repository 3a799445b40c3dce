//! This module defines the [`ControllerOpts`] configuration which describes how a controller
//! admits flows and routes them.

use crate::constants::DEFAULT_MAX_CANDIDATE_PATHS;
use crate::network::{Admission, LinkAttrs};
use crate::units::{Cost, Mbps, Millisecs};

/// Controller options.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct ControllerOpts {
    /// What happens when a new flow does not fit on any path.
    #[builder(default)]
    pub admission: Admission,
    /// Compute a best-effort link-disjoint backup path for every flow.
    #[builder(default = true)]
    pub backup_paths: bool,
    /// Cap on the number of equal-cost paths ranked per computation.
    #[builder(default = DEFAULT_MAX_CANDIDATE_PATHS)]
    pub max_candidate_paths: usize,
    /// Attributes used for links that leave some unspecified.
    #[builder(default)]
    pub link_defaults: LinkAttrs,
}

impl Default for ControllerOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ControllerOpts {
    /// Fills in unspecified link attributes from `link_defaults`.
    pub fn link_attrs(
        &self,
        capacity: Option<Mbps>,
        weight: Option<Cost>,
        delay: Option<Millisecs>,
    ) -> LinkAttrs {
        LinkAttrs {
            capacity: capacity.unwrap_or(self.link_defaults.capacity),
            weight: weight.unwrap_or(self.link_defaults.weight),
            delay: delay.unwrap_or(self.link_defaults.delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ControllerOpts::default();
        assert_eq!(opts.admission, Admission::Strict);
        assert!(opts.backup_paths);
        assert_eq!(opts.max_candidate_paths, 1024);
        assert_eq!(opts.link_defaults, LinkAttrs::default());
    }

    #[test]
    fn link_attrs_fill_from_defaults() {
        let opts = ControllerOpts::builder()
            .link_defaults(LinkAttrs {
                capacity: Mbps::new(100),
                weight: Cost::new(3),
                delay: Millisecs::new(7),
            })
            .build();
        let attrs = opts.link_attrs(Some(Mbps::new(40)), None, None);
        assert_eq!(attrs.capacity, Mbps::new(40));
        assert_eq!(attrs.weight, Cost::new(3));
        assert_eq!(attrs.delay, Millisecs::new(7));
    }
}
