use nalgebra::{Matrix4, Point3, Vector3};

use crate::misc::{scalar, FloatingPoint};

/// Perspective camera used to measure chord error in image space.
/// Control points are projected onto the plane at `focal_length` in front of `eye`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerspectiveCamera<T: FloatingPoint> {
    pub eye: Point3<T>,
    /// unit view direction
    pub direction: Vector3<T>,
    pub focal_length: T,
}

impl<T: FloatingPoint> PerspectiveCamera<T> {
    pub fn new(eye: Point3<T>, direction: Vector3<T>, focal_length: T) -> Self {
        Self {
            eye,
            direction: direction.normalize(),
            focal_length,
        }
    }

    /// Depth of a point along the view direction
    pub fn depth(&self, point: &Point3<T>) -> T {
        (point - self.eye).dot(&self.direction)
    }

    /// Project a point in front of the camera onto the image plane
    pub fn project(&self, point: &Point3<T>) -> Option<Point3<T>> {
        let d = self.depth(point);
        if d <= T::zero() {
            return None;
        }
        let lateral = (point - self.eye) - self.direction * d;
        Some(Point3::from(lateral * (self.focal_length / d)))
    }
}

/// Tolerances deciding how finely each Bezier patch is subdivided.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ToleranceOptions<T: FloatingPoint> {
    /// Maximum distance between a facet edge and the surface, 0 disables chord refinement
    pub chord_tolerance: T,
    /// Maximum turning angle in radians between facets, 0 disables angle refinement
    pub angle_tolerance: T,
    /// Maximum facet edge length, 0 disables the length limit
    pub max_edge_length: T,
    /// Minimum number of facets per Bezier span, 0 disables the clamp
    pub min_per_bezier: usize,
    /// Maximum number of facets per Bezier span, 0 disables the clamp
    pub max_per_bezier: usize,
    /// Transform applied to the control net before measuring
    pub transform: Option<Matrix4<T>>,
    /// Perspective used to measure in image space
    pub camera: Option<PerspectiveCamera<T>>,
    /// Hard ceiling on the steps along one direction of a patch
    pub max_steps_per_patch: usize,
    /// Ceiling on the step count derived from the diagonal deviation
    pub max_diagonal_count: usize,
    /// Relative diagonal deviation above which the baseline count grows
    pub diagonal_relative_tolerance: T,
    /// Band the non-zero angle tolerance is clamped into
    pub angle_tolerance_range: (T, T),
}

impl<T: FloatingPoint> ToleranceOptions<T> {
    pub const MAX_STEPS_PER_PATCH: usize = 500;
    pub const MAX_DIAGONAL_COUNT: usize = 30;
    pub const DIAGONAL_RELATIVE_TOLERANCE: f64 = 0.06;
    pub const MIN_ANGLE_TOLERANCE: f64 = 0.1;
    pub const MAX_ANGLE_TOLERANCE: f64 = 1.57;

    pub fn with_chord_tolerance(mut self, chord_tolerance: T) -> Self {
        self.chord_tolerance = chord_tolerance;
        self
    }

    pub fn with_angle_tolerance(mut self, angle_tolerance: T) -> Self {
        self.angle_tolerance = angle_tolerance;
        self
    }

    pub fn with_max_edge_length(mut self, max_edge_length: T) -> Self {
        self.max_edge_length = max_edge_length;
        self
    }

    pub fn with_min_per_bezier(mut self, min_per_bezier: usize) -> Self {
        self.min_per_bezier = min_per_bezier;
        self
    }

    pub fn with_max_per_bezier(mut self, max_per_bezier: usize) -> Self {
        self.max_per_bezier = max_per_bezier;
        self
    }

    pub fn with_transform(mut self, transform: Matrix4<T>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_camera(mut self, camera: PerspectiveCamera<T>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_max_steps_per_patch(mut self, max_steps_per_patch: usize) -> Self {
        self.max_steps_per_patch = max_steps_per_patch;
        self
    }

    /// Angle tolerance clamped into its band, `None` when disabled
    pub fn effective_angle_tolerance(&self) -> Option<T> {
        if self.angle_tolerance <= T::zero() {
            return None;
        }
        let (lo, hi) = self.angle_tolerance_range;
        Some(self.angle_tolerance.clamp(lo, hi))
    }

    /// Apply the configured transform and perspective to a control net.
    /// The perspective is skipped unless every point lies in front of the camera.
    pub fn display_points(&self, points: &[Point3<T>]) -> Vec<Point3<T>> {
        let mut points: Vec<_> = match self.transform.as_ref() {
            Some(m) => points.iter().map(|p| m.transform_point(p)).collect(),
            None => points.to_vec(),
        };
        if let Some(camera) = self.camera.as_ref() {
            let projected: Option<Vec<_>> = points.iter().map(|p| camera.project(p)).collect();
            if let Some(projected) = projected {
                points = projected;
            }
        }
        points
    }
}

impl<T: FloatingPoint> Default for ToleranceOptions<T> {
    fn default() -> Self {
        Self {
            chord_tolerance: scalar(1e-2),
            angle_tolerance: scalar(0.4),
            max_edge_length: T::zero(),
            min_per_bezier: 0,
            max_per_bezier: 0,
            transform: None,
            camera: None,
            max_steps_per_patch: Self::MAX_STEPS_PER_PATCH,
            max_diagonal_count: Self::MAX_DIAGONAL_COUNT,
            diagonal_relative_tolerance: scalar(Self::DIAGONAL_RELATIVE_TOLERANCE),
            angle_tolerance_range: (
                scalar(Self::MIN_ANGLE_TOLERANCE),
                scalar(Self::MAX_ANGLE_TOLERANCE),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn angle_tolerance_is_clamped() {
        let options = ToleranceOptions::<f64>::default().with_angle_tolerance(0.01);
        assert_relative_eq!(options.effective_angle_tolerance().unwrap(), 0.1);
        let options = options.with_angle_tolerance(3.);
        assert_relative_eq!(options.effective_angle_tolerance().unwrap(), 1.57);
        assert!(options.with_angle_tolerance(0.).effective_angle_tolerance().is_none());
    }

    #[test]
    fn camera_projection_requires_points_in_front() {
        let camera = PerspectiveCamera::new(Point3::new(0., 0., 10.), Vector3::new(0., 0., -1.), 1.);
        let options = ToleranceOptions::<f64>::default().with_camera(camera);
        let front = options.display_points(&[Point3::new(1., 0., 0.), Point3::new(0., 2., 5.)]);
        assert_relative_eq!(front[0], Point3::new(0.1, 0., 0.), epsilon = 1e-12);
        assert_relative_eq!(front[1], Point3::new(0., 0.4, 0.), epsilon = 1e-12);
        let behind = options.display_points(&[Point3::new(1., 0., 0.), Point3::new(0., 0., 20.)]);
        assert_eq!(behind[1], Point3::new(0., 0., 20.));
    }
}
