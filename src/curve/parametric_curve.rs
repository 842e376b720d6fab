use nalgebra::{Point3, Vector3};

use crate::misc::{EllipseArc, FloatingPoint, Ray};

/// A curve that can be evaluated and differentiated over a parameter domain.
/// Intersection queries stroke it into `stroke_count` chords before refining with Newton iteration.
pub trait ParametricCurve<T: FloatingPoint> {
    fn domain(&self) -> (T, T);
    fn point_at(&self, t: T) -> Point3<T>;
    fn tangent_at(&self, t: T) -> Vector3<T>;

    /// Number of chords used to approximate the curve in a coarse search
    fn stroke_count(&self) -> usize {
        1
    }

    /// Parameters splitting the domain into `stroke_count` equal steps
    fn stroke_parameters(&self) -> Vec<T> {
        let (a, b) = self.domain();
        let n = self.stroke_count().max(1);
        let div: T = nalgebra::convert(n as f64);
        (0..=n)
            .map(|i| a + (b - a) * nalgebra::convert::<f64, T>(i as f64) / div)
            .collect()
    }
}

/// Rays are unbounded in both directions and are never stroked.
impl<T: FloatingPoint> ParametricCurve<T> for Ray<T> {
    fn domain(&self) -> (T, T) {
        let big = T::max_value().unwrap_or_else(|| nalgebra::convert(1e300));
        (-big, big)
    }

    fn point_at(&self, t: T) -> Point3<T> {
        Ray::point_at(self, t)
    }

    fn tangent_at(&self, _t: T) -> Vector3<T> {
        *self.direction()
    }
}

impl<T: FloatingPoint> ParametricCurve<T> for EllipseArc<T> {
    fn domain(&self) -> (T, T) {
        (T::zero(), T::one())
    }

    fn point_at(&self, t: T) -> Point3<T> {
        self.point_at_fraction(t)
    }

    fn tangent_at(&self, t: T) -> Vector3<T> {
        self.tangent_at_fraction(t)
    }

    fn stroke_count(&self) -> usize {
        let step = T::frac_pi_4() / nalgebra::convert(2.0);
        (self.sweep().abs() / step)
            .ceil()
            .to_usize()
            .unwrap_or(1)
            .max(1)
    }
}
