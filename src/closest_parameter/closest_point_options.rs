use crate::misc::{scalar, FloatingPoint};

/// Options for [`NurbsSurface::find_closest_point`](crate::prelude::NurbsSurface::find_closest_point)
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClosestPointOptions<T: FloatingPoint> {
    /// Pairs of (relative diagonal deviation, grid multiplier).
    /// A patch samples `order * multiplier` points per direction, using the last tier its deviation reaches.
    pub density_tiers: Vec<(T, usize)>,
    /// How far outside a coarse triangle, in barycentric units, a candidate may lie and still be refined
    pub acceptance_window: T,
    /// Newton iteration cap
    pub max_iters: u64,
    /// Relative slack allowed when comparing the refined distance with the coarse one
    pub relative_slack: T,
}

impl<T: FloatingPoint> ClosestPointOptions<T> {
    pub const ACCEPTANCE_WINDOW: f64 = 0.5;
    pub const MAX_ITERS: u64 = 32;
    pub const RELATIVE_SLACK: f64 = 1e-10;

    pub fn with_density_tiers(mut self, tiers: Vec<(T, usize)>) -> Self {
        self.density_tiers = tiers;
        self
    }

    pub fn with_acceptance_window(mut self, window: T) -> Self {
        self.acceptance_window = window;
        self
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_relative_slack(mut self, slack: T) -> Self {
        self.relative_slack = slack;
        self
    }

    /// Grid point count per direction for a patch direction of `order` with the given deviation
    pub fn density(&self, order: usize, deviation: T) -> usize {
        let multiplier = self
            .density_tiers
            .iter()
            .filter(|(threshold, _)| deviation >= *threshold)
            .map(|(_, m)| *m)
            .last()
            .unwrap_or(1);
        (order * multiplier).max(2)
    }
}

impl<T: FloatingPoint> Default for ClosestPointOptions<T> {
    fn default() -> Self {
        Self {
            density_tiers: vec![
                (T::zero(), 2),
                (scalar(0.01), 3),
                (scalar(0.05), 4),
                (scalar(0.2), 6),
            ],
            acceptance_window: scalar(Self::ACCEPTANCE_WINDOW),
            max_iters: Self::MAX_ITERS,
            relative_slack: scalar(Self::RELATIVE_SLACK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_grows_with_deviation() {
        let options = ClosestPointOptions::<f64>::default();
        assert_eq!(options.density(2, 0.), 4);
        assert_eq!(options.density(4, 0.03), 12);
        assert_eq!(options.density(4, 0.5), 24);
        assert_eq!(options.clone().with_density_tiers(vec![]).density(1, 0.), 2);
    }
}
