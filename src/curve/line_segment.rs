use nalgebra::{Point3, Vector3};

use crate::misc::FloatingPoint;

use super::ParametricCurve;

/// Straight segment parameterized over `[0, 1]`
#[derive(Clone, Debug, PartialEq)]
pub struct LineSegment<T: FloatingPoint> {
    start: Point3<T>,
    end: Point3<T>,
}

impl<T: FloatingPoint> LineSegment<T> {
    pub fn new(start: Point3<T>, end: Point3<T>) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> &Point3<T> {
        &self.start
    }

    pub fn end(&self) -> &Point3<T> {
        &self.end
    }

    pub fn direction(&self) -> Vector3<T> {
        self.end - self.start
    }

    pub fn length(&self) -> T {
        self.direction().norm()
    }
}

impl<T: FloatingPoint> ParametricCurve<T> for LineSegment<T> {
    fn domain(&self) -> (T, T) {
        (T::zero(), T::one())
    }

    fn point_at(&self, t: T) -> Point3<T> {
        self.start + self.direction() * t
    }

    fn tangent_at(&self, _t: T) -> Vector3<T> {
        self.direction()
    }
}
