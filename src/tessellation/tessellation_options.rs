use crate::{
    misc::{scalar, FloatingPoint},
    tolerance::{PerspectiveCamera, ToleranceOptions},
};
use nalgebra::Matrix4;

/// How trimmed regions are meshed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TessellationStrategy {
    /// Tile each monotone piece per patch, falling back to the half-edge graph on failure
    #[default]
    PatchMonotone,
    /// Mesh every piece through the half-edge graph
    SurfaceGraph,
}

/// Options for faceting a surface
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TessellationOptions<T: FloatingPoint> {
    /// Step count tolerances per Bezier patch
    pub tolerance: ToleranceOptions<T>,
    /// Scale emitted params by `control polygon length / scale` per direction, fractions when `None`
    pub param_scale: Option<(T, T)>,
    /// Emit unit normals
    pub normals_required: bool,
    /// Emit surface params
    pub params_required: bool,
    /// Flip the orientation of the output
    pub reverse: bool,
    pub strategy: TessellationStrategy,
    /// Parameter coordinates closer than this are snapped together
    pub compression_epsilon: T,
    /// Maximum sweeps of diagonal flips in the half-edge graph
    pub max_flip_passes: usize,
    /// Trim loops with a point outside this band are ignored
    pub boundary_band: (T, T),
}

impl<T: FloatingPoint> TessellationOptions<T> {
    pub const COMPRESSION_EPSILON: f64 = 1e-10;
    pub const MAX_FLIP_PASSES: usize = 4;
    pub const BOUNDARY_BAND: (f64, f64) = (-1.0, 2.0);
    /// Param scales below this leave the params unscaled
    pub const MIN_PARAM_SCALE: f64 = 1e-8;

    pub fn with_tolerance(mut self, tolerance: ToleranceOptions<T>) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_chord_tolerance(mut self, chord_tolerance: T) -> Self {
        self.tolerance.chord_tolerance = chord_tolerance;
        self
    }

    pub fn with_angle_tolerance(mut self, angle_tolerance: T) -> Self {
        self.tolerance.angle_tolerance = angle_tolerance;
        self
    }

    pub fn with_max_edge_length(mut self, max_edge_length: T) -> Self {
        self.tolerance.max_edge_length = max_edge_length;
        self
    }

    pub fn with_min_per_bezier(mut self, min_per_bezier: usize) -> Self {
        self.tolerance.min_per_bezier = min_per_bezier;
        self
    }

    pub fn with_max_per_bezier(mut self, max_per_bezier: usize) -> Self {
        self.tolerance.max_per_bezier = max_per_bezier;
        self
    }

    pub fn with_transform(mut self, transform: Matrix4<T>) -> Self {
        self.tolerance.transform = Some(transform);
        self
    }

    pub fn with_camera(mut self, camera: PerspectiveCamera<T>) -> Self {
        self.tolerance.camera = Some(camera);
        self
    }

    pub fn with_param_scale(mut self, param_scale: Option<(T, T)>) -> Self {
        self.param_scale = param_scale;
        self
    }

    pub fn with_normals_required(mut self, normals_required: bool) -> Self {
        self.normals_required = normals_required;
        self
    }

    pub fn with_params_required(mut self, params_required: bool) -> Self {
        self.params_required = params_required;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn with_strategy(mut self, strategy: TessellationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_compression_epsilon(mut self, compression_epsilon: T) -> Self {
        self.compression_epsilon = compression_epsilon;
        self
    }

    pub fn with_max_flip_passes(mut self, max_flip_passes: usize) -> Self {
        self.max_flip_passes = max_flip_passes;
        self
    }

    pub fn with_boundary_band(mut self, boundary_band: (T, T)) -> Self {
        self.boundary_band = boundary_band;
        self
    }

    /// Reject settings no tessellation can honor
    pub fn validate(&self) -> anyhow::Result<()> {
        let tol = &self.tolerance;
        anyhow::ensure!(
            tol.chord_tolerance >= T::zero(),
            "chord tolerance must not be negative"
        );
        anyhow::ensure!(
            tol.angle_tolerance >= T::zero(),
            "angle tolerance must not be negative"
        );
        anyhow::ensure!(
            tol.max_edge_length >= T::zero(),
            "max edge length must not be negative"
        );
        anyhow::ensure!(
            tol.max_per_bezier == 0 || tol.min_per_bezier <= tol.max_per_bezier,
            "min facets per bezier ({}) exceeds the max ({})",
            tol.min_per_bezier,
            tol.max_per_bezier
        );
        anyhow::ensure!(
            tol.max_steps_per_patch >= 1,
            "max steps per patch must be at least 1"
        );
        anyhow::ensure!(
            self.compression_epsilon >= T::zero(),
            "compression epsilon must not be negative"
        );
        anyhow::ensure!(
            self.boundary_band.0 < self.boundary_band.1,
            "boundary band is empty"
        );
        Ok(())
    }
}

impl<T: FloatingPoint> Default for TessellationOptions<T> {
    fn default() -> Self {
        Self {
            tolerance: ToleranceOptions::default(),
            param_scale: None,
            normals_required: false,
            params_required: false,
            reverse: false,
            strategy: TessellationStrategy::default(),
            compression_epsilon: scalar(Self::COMPRESSION_EPSILON),
            max_flip_passes: Self::MAX_FLIP_PASSES,
            boundary_band: (
                scalar(Self::BOUNDARY_BAND.0),
                scalar(Self::BOUNDARY_BAND.1),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = TessellationOptions::<f64>::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.strategy, TessellationStrategy::PatchMonotone);
        assert_eq!(options.boundary_band, (-1., 2.));
    }

    #[test]
    fn inconsistent_facet_clamps_are_rejected() {
        let options = TessellationOptions::<f64>::default()
            .with_min_per_bezier(8)
            .with_max_per_bezier(4);
        assert!(options.validate().is_err());
        let options = TessellationOptions::<f64>::default().with_chord_tolerance(-1.);
        assert!(options.validate().is_err());
    }
}
