use crate::misc::{scalar, FloatingPoint};

/// Options for ray and curve intersection queries
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntersectionOptions<T: FloatingPoint> {
    /// Coarse grid samples per direction as a multiple of the patch order
    pub grid_multiplier: usize,
    /// Newton iteration cap
    pub max_iters: u64,
    /// Residual distance, relative to the magnitude of the hit point, below which an iteration counts as converged
    pub tolerance: T,
    /// Consecutive converged iterations required to accept a hit
    pub required_converged: usize,
    /// Hits closer than this in space and curve parameter are merged
    pub merge_tolerance: T,
    /// How far past a patch or a coarse cell a hit may land in local parameters
    pub parameter_margin: T,
}

impl<T: FloatingPoint> IntersectionOptions<T> {
    pub const GRID_MULTIPLIER: usize = 2;
    pub const MAX_ITERS: u64 = 24;
    pub const TOLERANCE: f64 = 1e-11;
    pub const REQUIRED_CONVERGED: usize = 3;
    pub const MERGE_TOLERANCE: f64 = 1e-7;
    pub const PARAMETER_MARGIN: f64 = 1e-8;

    pub fn with_grid_multiplier(mut self, multiplier: usize) -> Self {
        self.grid_multiplier = multiplier;
        self
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_tolerance(mut self, tolerance: T) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_required_converged(mut self, count: usize) -> Self {
        self.required_converged = count;
        self
    }

    pub fn with_merge_tolerance(mut self, tolerance: T) -> Self {
        self.merge_tolerance = tolerance;
        self
    }

    /// Coarse grid size for a patch direction of `order`
    pub fn grid_size(&self, order: usize) -> usize {
        (order * self.grid_multiplier).max(2)
    }
}

impl<T: FloatingPoint> Default for IntersectionOptions<T> {
    fn default() -> Self {
        Self {
            grid_multiplier: Self::GRID_MULTIPLIER,
            max_iters: Self::MAX_ITERS,
            tolerance: scalar(Self::TOLERANCE),
            required_converged: Self::REQUIRED_CONVERGED,
            merge_tolerance: scalar(Self::MERGE_TOLERANCE),
            parameter_margin: scalar(Self::PARAMETER_MARGIN),
        }
    }
}
