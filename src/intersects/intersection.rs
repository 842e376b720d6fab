use nalgebra::Point3;

use crate::misc::FloatingPoint;

/// A trait for types that have intersection parameters.
pub trait HasIntersectionParameter<A, B> {
    fn a_parameter(&self) -> A;
    fn b_parameter(&self) -> B;
}

/// A trait for types that have an intersection.
pub trait HasIntersection<VA, VB, A, B>: HasIntersectionParameter<A, B> {
    fn a(&self) -> &VA;
    fn b(&self) -> &VB;
}

/// A struct representing the intersection of two objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection<P, T0, T1> {
    /// The point & parameter of the first object at the intersection.
    a: (P, T0),
    /// The point & parameter of the second object at the intersection.
    b: (P, T1),
}

impl<P, T0, T1> Intersection<P, T0, T1> {
    pub fn new(a: (P, T0), b: (P, T1)) -> Self {
        Self { a, b }
    }

    pub fn as_tuple(self) -> ((P, T0), (P, T1)) {
        (self.a, self.b)
    }
}

impl<P, T0: Copy, T1: Copy> HasIntersectionParameter<T0, T1> for Intersection<P, T0, T1> {
    fn a_parameter(&self) -> T0 {
        self.a.1
    }

    fn b_parameter(&self) -> T1 {
        self.b.1
    }
}

impl<P, T0: Copy, T1: Copy> HasIntersection<(P, T0), (P, T1), T0, T1> for Intersection<P, T0, T1> {
    fn a(&self) -> &(P, T0) {
        &self.a
    }

    fn b(&self) -> &(P, T1) {
        &self.b
    }
}

/// Intersection of a surface and a curve.
/// The surface side carries the `(u, v)` parameter fraction, the curve side its own parameter.
pub type SurfaceCurveIntersection<P, T> = Intersection<P, (T, T), T>;

impl<T: FloatingPoint> SurfaceCurveIntersection<Point3<T>, T> {
    pub fn surface_point(&self) -> &Point3<T> {
        &self.a.0
    }

    pub fn uv(&self) -> (T, T) {
        self.a.1
    }

    pub fn curve_point(&self) -> &Point3<T> {
        &self.b.0
    }

    pub fn curve_parameter(&self) -> T {
        self.b.1
    }
}
