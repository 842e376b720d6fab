use nalgebra::{Point3, Vector3};

use crate::misc::{scalar, FloatingPoint, Ray};

/// Hyperbolic paraboloid `a + s b + t c + s t d` spanned by four grid points
#[derive(Clone, Debug, PartialEq)]
pub struct BilinearQuad<T: FloatingPoint> {
    a: Vector3<T>,
    b: Vector3<T>,
    c: Vector3<T>,
    d: Vector3<T>,
}

/// Approximate line hit on a bilinear quad: line parameter and quad parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BilinearHit<T> {
    pub line_parameter: T,
    pub s: T,
    pub t: T,
}

impl<T: FloatingPoint> BilinearQuad<T> {
    pub fn new(p00: &Point3<T>, p10: &Point3<T>, p01: &Point3<T>, p11: &Point3<T>) -> Self {
        Self {
            a: p00.coords,
            b: p10 - p00,
            c: p01 - p00,
            d: (p11 - p10) - (p01 - p00),
        }
    }

    pub fn point_at(&self, s: T, t: T) -> Point3<T> {
        Point3::from(self.a + self.b * s + self.c * t + self.d * (s * t))
    }

    /// Intersections of the line `origin + lambda * direction` with the quad.
    /// Hits whose quad parameters fall outside `[-margin, 1 + margin]` are dropped.
    pub fn line_intersections(&self, ray: &Ray<T>, margin: T) -> Vec<BilinearHit<T>> {
        let Some((e0, e1)) = ray.perpendicular_frame() else {
            return vec![];
        };
        let o = ray.origin().coords;
        let coefficients = |e: &Vector3<T>| (e.dot(&(self.a - o)), e.dot(&self.b), e.dot(&self.c), e.dot(&self.d));
        let (a1, b1, c1, d1) = coefficients(&e0);
        let (a2, b2, c2, d2) = coefficients(&e1);

        // eliminating t from both plane equations leaves a quadratic in s
        let roots = solve_quadratic(
            b2 * d1 - d2 * b1,
            a2 * d1 + b2 * c1 - c2 * b1 - d2 * a1,
            a2 * c1 - c2 * a1,
        );

        let (lo, hi) = (-margin, T::one() + margin);
        roots
            .into_iter()
            .filter_map(|s| {
                let den1 = c1 + d1 * s;
                let den2 = c2 + d2 * s;
                let t = if den1.abs() >= den2.abs() {
                    if den1 == T::zero() {
                        return None;
                    }
                    -(a1 + b1 * s) / den1
                } else {
                    -(a2 + b2 * s) / den2
                };
                if s < lo || s > hi || t < lo || t > hi {
                    return None;
                }
                let line_parameter = ray.parameter_of(&self.point_at(s, t))?;
                Some(BilinearHit { line_parameter, s, t })
            })
            .collect()
    }
}

/// Real roots of `a x^2 + b x + c`, falling back to the linear case when `a` vanishes
fn solve_quadratic<T: FloatingPoint>(a: T, b: T, c: T) -> Vec<T> {
    let scale = a.abs().max(b.abs()).max(c.abs());
    if scale == T::zero() {
        return vec![];
    }
    let eps = scalar::<T>(1e-12) * scale;
    if a.abs() <= eps {
        return if b.abs() > eps { vec![-c / b] } else { vec![] };
    }
    let disc = b * b - scalar::<T>(4.) * a * c;
    if disc < -eps * scale {
        return vec![];
    }
    let root = disc.max(T::zero()).sqrt();
    let q = if b >= T::zero() {
        -(b + root) / scalar(2.)
    } else {
        -(b - root) / scalar(2.)
    };
    let mut roots = vec![q / a];
    if q != T::zero() {
        let other = c / q;
        if (other - roots[0]).abs() > T::default_epsilon() {
            roots.push(other);
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn planar_quad() {
        let quad = BilinearQuad::new(
            &Point3::new(0., 0., 0.),
            &Point3::new(2., 0., 0.),
            &Point3::new(0., 2., 0.),
            &Point3::new(2., 2., 0.),
        );
        let ray = Ray::new(Point3::new(0.5, 1.5, 4.), Vector3::new(0., 0., -2.));
        let hits = quad.line_intersections(&ray, 0.);
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].s, 0.25, epsilon = 1e-12);
        assert_relative_eq!(hits[0].t, 0.75, epsilon = 1e-12);
        assert_relative_eq!(hits[0].line_parameter, 2., epsilon = 1e-12);
    }

    #[test]
    fn saddle_two_hits() {
        // z = s t - 0.25 on the unit square, cut below the saddle point along the anti-diagonal
        let quad = BilinearQuad::new(
            &Point3::new(0., 0., -0.25),
            &Point3::new(1., 0., -0.25),
            &Point3::new(0., 1., -0.25),
            &Point3::new(1., 1., 0.75),
        );
        let ray = Ray::new(Point3::new(0., 1., -0.1), Vector3::new(1., -1., 0.));
        let hits = quad.line_intersections(&ray, 1e-9);
        assert_eq!(hits.len(), 2);
        for hit in hits {
            let p = quad.point_at(hit.s, hit.t);
            assert_relative_eq!(p, ray.point_at(hit.line_parameter), epsilon = 1e-9);
        }
    }

    #[test]
    fn miss() {
        let quad = BilinearQuad::new(
            &Point3::new(0., 0., 0.),
            &Point3::new(1., 0., 0.),
            &Point3::new(0., 1., 0.),
            &Point3::new(1., 1., 0.),
        );
        let ray = Ray::new(Point3::new(3., 3., 1.), Vector3::new(0., 0., 1.));
        assert!(quad.line_intersections(&ray, 0.).is_empty());
    }
}
