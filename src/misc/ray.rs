use nalgebra::{Point3, Vector3};

use crate::misc::FloatingPoint;

/// Represents a ray in 3D space.
/// The direction is not required to be normalized; parameters are measured in multiples of it.
#[derive(Clone, Debug, PartialEq)]
pub struct Ray<T: FloatingPoint> {
    pub(crate) origin: Point3<T>,
    pub(crate) direction: Vector3<T>,
}

impl<T: FloatingPoint> Ray<T> {
    pub fn new(origin: Point3<T>, direction: Vector3<T>) -> Self {
        Self { origin, direction }
    }

    pub fn origin(&self) -> &Point3<T> {
        &self.origin
    }

    pub fn direction(&self) -> &Vector3<T> {
        &self.direction
    }

    pub fn point_at(&self, t: T) -> Point3<T> {
        self.origin + self.direction * t
    }

    /// Parameter of the projection of `point` onto the ray line.
    pub fn parameter_of(&self, point: &Point3<T>) -> Option<T> {
        let dd = self.direction.norm_squared();
        if dd <= T::default_epsilon() {
            return None;
        }
        Some(self.direction.dot(&(point - self.origin)) / dd)
    }

    /// Two unit vectors perpendicular to the direction and to each other.
    pub fn perpendicular_frame(&self) -> Option<(Vector3<T>, Vector3<T>)> {
        let d = self.direction.try_normalize(T::default_epsilon())?;
        let seed = if d.x.abs() < nalgebra::convert(0.6) {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let e0 = d.cross(&seed).try_normalize(T::default_epsilon())?;
        let e1 = d.cross(&e0);
        Some((e0, e1))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn frame_is_orthonormal() {
        let ray = Ray::new(Point3::new(1., 2., 3.), Vector3::new(0.3, -2., 0.5));
        let (e0, e1) = ray.perpendicular_frame().unwrap();
        assert_relative_eq!(e0.dot(ray.direction()), 0., epsilon = 1e-12);
        assert_relative_eq!(e1.dot(ray.direction()), 0., epsilon = 1e-12);
        assert_relative_eq!(e0.dot(&e1), 0., epsilon = 1e-12);
        assert_relative_eq!(e1.norm(), 1., epsilon = 1e-12);
    }

    #[test]
    fn parameter_round_trip() {
        let ray = Ray::new(Point3::origin(), Vector3::new(0., 0., 2.));
        let p = ray.point_at(1.5);
        assert_relative_eq!(ray.parameter_of(&p).unwrap(), 1.5);
    }
}
