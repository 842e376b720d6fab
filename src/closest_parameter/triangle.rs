use nalgebra::{Point3, Vector3};

use crate::misc::FloatingPoint;

/// Closest point of a triangle to a query point together with its barycentric coordinates.
/// `unclamped` are the barycentrics of the projection onto the triangle's plane.
#[derive(Clone, Debug, PartialEq)]
pub struct TriangleProjection<T: FloatingPoint> {
    pub point: Point3<T>,
    pub barycentric: Vector3<T>,
    pub unclamped: Vector3<T>,
}

impl<T: FloatingPoint> TriangleProjection<T> {
    /// Smallest unclamped barycentric coordinate; negative outside the triangle
    pub fn min_unclamped(&self) -> T {
        self.unclamped.x.min(self.unclamped.y).min(self.unclamped.z)
    }
}

/// Region-based closest point on a triangle (Ericson, Real-Time Collision Detection 5.1.5)
pub fn project_to_triangle<T: FloatingPoint>(
    point: &Point3<T>,
    a: &Point3<T>,
    b: &Point3<T>,
    c: &Point3<T>,
) -> TriangleProjection<T> {
    let ab = b - a;
    let ac = c - a;
    let unclamped = plane_barycentric(point, a, &ab, &ac);
    let done = |barycentric: Vector3<T>| TriangleProjection {
        point: Point3::from(a.coords * barycentric.x + b.coords * barycentric.y + c.coords * barycentric.z),
        barycentric,
        unclamped,
    };
    let zero = T::zero();
    let one = T::one();

    let ap = point - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= zero && d2 <= zero {
        return done(Vector3::new(one, zero, zero));
    }

    let bp = point - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= zero && d4 <= d3 {
        return done(Vector3::new(zero, one, zero));
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= zero && d1 >= zero && d3 <= zero {
        let v = d1 / (d1 - d3);
        return done(Vector3::new(one - v, v, zero));
    }

    let cp = point - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= zero && d5 <= d6 {
        return done(Vector3::new(zero, zero, one));
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= zero && d2 >= zero && d6 <= zero {
        let w = d2 / (d2 - d6);
        return done(Vector3::new(one - w, zero, w));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= zero && (d4 - d3) >= zero && (d5 - d6) >= zero {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return done(Vector3::new(zero, one - w, w));
    }

    let denom = va + vb + vc;
    if denom == zero {
        return done(Vector3::new(one, zero, zero));
    }
    let v = vb / denom;
    let w = vc / denom;
    done(Vector3::new(one - v - w, v, w))
}

/// Barycentrics of the orthogonal projection onto the plane of the triangle
fn plane_barycentric<T: FloatingPoint>(
    point: &Point3<T>,
    a: &Point3<T>,
    ab: &Vector3<T>,
    ac: &Vector3<T>,
) -> Vector3<T> {
    let ap = point - a;
    let d00 = ab.dot(ab);
    let d01 = ab.dot(ac);
    let d11 = ac.dot(ac);
    let d20 = ap.dot(ab);
    let d21 = ap.dot(ac);
    let denom = d00 * d11 - d01 * d01;
    if denom <= T::default_epsilon() * d00 * d11 {
        return Vector3::new(T::one(), T::zero(), T::zero());
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Vector3::new(T::one() - v - w, v, w)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn triangle() -> [Point3<f64>; 3] {
        [
            Point3::new(0., 0., 0.),
            Point3::new(1., 0., 0.),
            Point3::new(0., 1., 0.),
        ]
    }

    #[test]
    fn inside_face() {
        let [a, b, c] = triangle();
        let projection = project_to_triangle(&Point3::new(0.25, 0.25, 2.), &a, &b, &c);
        assert_relative_eq!(projection.point, Point3::new(0.25, 0.25, 0.));
        assert_relative_eq!(projection.barycentric, Vector3::new(0.5, 0.25, 0.25));
        assert_relative_eq!(projection.barycentric, projection.unclamped);
    }

    #[test]
    fn outside_vertex_keeps_unclamped_coordinates() {
        let [a, b, c] = triangle();
        let projection = project_to_triangle(&Point3::new(2., -1., 0.), &a, &b, &c);
        assert_relative_eq!(projection.point, b);
        assert_relative_eq!(projection.unclamped, Vector3::new(0., 2., -1.));
        assert_relative_eq!(projection.min_unclamped(), -1.);
    }

    #[test]
    fn edge_region() {
        let [a, b, c] = triangle();
        let projection = project_to_triangle(&Point3::new(1., 1., 0.), &a, &b, &c);
        assert_relative_eq!(projection.point, Point3::new(0.5, 0.5, 0.));
        assert_relative_eq!(projection.barycentric, Vector3::new(0., 0.5, 0.5));
    }
}
