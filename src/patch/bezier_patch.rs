use nalgebra::{Point3, Point4, Vector4};

use crate::{
    knot::KnotVector,
    misc::{scalar, FloatingPoint},
    surface::{NurbsSurface, SurfaceDirection},
};

/// Bezier sub-patch of a NURBS surface for one pair of knot spans.
/// Control points are homogeneous and stored row-major: row index runs along V.
#[derive(Clone, Debug)]
pub struct BezierPatch<T: FloatingPoint> {
    u_order: usize,
    v_order: usize,
    control_points: Vec<Point4<T>>,
    rational: bool,
    u_index: usize,
    v_index: usize,
    /// knot window of the span in the owning surface
    u_knots: (T, T),
    v_knots: (T, T),
    /// parameter fraction window of the span in the owning surface
    u_fractions: (T, T),
    v_fractions: (T, T),
    is_null_u: bool,
    is_null_v: bool,
}

impl<T: FloatingPoint> BezierPatch<T> {
    /// Extract the patch of span `u_index` and `v_index` by saturating the knots on both span ends.
    /// A direction collapses into a null patch when its span is empty or its order is at most one.
    pub fn extract(surface: &NurbsSurface<T>, u_index: usize, v_index: usize) -> Self {
        let (u, v) = (surface.u(), surface.v());
        let (u_order, v_order) = (u.order(), v.order());

        let mut net = Vec::with_capacity(u_order * v_order);
        for j in 0..v_order {
            for i in 0..u_order {
                net.push(surface.homogeneous_control_point(u_index + i, v_index + j).coords);
            }
        }

        let is_null_u = saturate(&mut net, u, u_index, u_order, v_order, |i, j| j * u_order + i);
        let is_null_v = saturate(&mut net, v, v_index, v_order, u_order, |j, i| j * u_order + i);

        if is_null_u || is_null_v {
            log::trace!("null patch at span ({}, {})", u_index, v_index);
        }

        Self {
            u_order,
            v_order,
            control_points: net.into_iter().map(Point4::from).collect(),
            rational: surface.is_rational(),
            u_index,
            v_index,
            u_knots: u.span(u_index),
            v_knots: v.span(v_index),
            u_fractions: u.span_fractions(u_index),
            v_fractions: v.span_fractions(v_index),
            is_null_u,
            is_null_v,
        }
    }

    /// Extract every patch of the surface, row-major with V spans as rows
    pub fn extract_all(surface: &NurbsSurface<T>) -> Vec<Self> {
        let (nu, nv) = surface.span_counts();
        (0..nv)
            .flat_map(|j| (0..nu).map(move |i| (i, j)))
            .map(|(i, j)| Self::extract(surface, i, j))
            .collect()
    }

    /// Non-rational patch straight from Bezier control points, mostly useful for tests
    pub fn from_points(u_order: usize, v_order: usize, points: Vec<Point3<T>>) -> Self {
        Self {
            u_order,
            v_order,
            control_points: points.iter().map(|p| p.to_homogeneous().into()).collect(),
            rational: false,
            u_index: 0,
            v_index: 0,
            u_knots: (T::zero(), T::one()),
            v_knots: (T::zero(), T::one()),
            u_fractions: (T::zero(), T::one()),
            v_fractions: (T::zero(), T::one()),
            is_null_u: u_order <= 1,
            is_null_v: v_order <= 1,
        }
    }

    /// Replace the homogeneous control net
    pub fn with_control_points(mut self, control_points: Vec<Point4<T>>, rational: bool) -> Self {
        self.control_points = control_points;
        self.rational = rational;
        self
    }

    pub fn u_order(&self) -> usize {
        self.u_order
    }

    pub fn v_order(&self) -> usize {
        self.v_order
    }

    pub fn indices(&self) -> (usize, usize) {
        (self.u_index, self.v_index)
    }

    pub fn u_knots(&self) -> (T, T) {
        self.u_knots
    }

    pub fn v_knots(&self) -> (T, T) {
        self.v_knots
    }

    pub fn u_fractions(&self) -> (T, T) {
        self.u_fractions
    }

    pub fn v_fractions(&self) -> (T, T) {
        self.v_fractions
    }

    pub fn is_null_u(&self) -> bool {
        self.is_null_u
    }

    pub fn is_null_v(&self) -> bool {
        self.is_null_v
    }

    pub fn is_null(&self) -> bool {
        self.is_null_u || self.is_null_v
    }

    pub fn is_rational(&self) -> bool {
        self.rational
    }

    pub fn control_points(&self) -> &[Point4<T>] {
        &self.control_points
    }

    pub fn control_point(&self, i: usize, j: usize) -> &Point4<T> {
        &self.control_points[j * self.u_order + i]
    }

    /// Control point divided by its weight, `None` when the weight vanishes
    pub fn euclidean_control_point(&self, i: usize, j: usize) -> Option<Point3<T>> {
        let p = self.control_point(i, j);
        if p.w.abs() <= scalar(1e-14) {
            None
        } else {
            Some(Point3::new(p.x / p.w, p.y / p.w, p.z / p.w))
        }
    }

    /// Euclidean control net with zero-weight poles left at the origin
    pub fn euclidean_control_points(&self) -> Vec<Point3<T>> {
        (0..self.v_order)
            .flat_map(|j| (0..self.u_order).map(move |i| (i, j)))
            .map(|(i, j)| self.euclidean_control_point(i, j).unwrap_or_else(Point3::origin))
            .collect()
    }

    /// Map a local patch parameter to the surface parameter fraction
    pub fn local_to_fraction(&self, s: T, t: T) -> (T, T) {
        (
            self.u_fractions.0 + (self.u_fractions.1 - self.u_fractions.0) * s,
            self.v_fractions.0 + (self.v_fractions.1 - self.v_fractions.0) * t,
        )
    }

    /// Map a surface parameter fraction to the local patch parameter
    pub fn fraction_to_local(&self, u: T, v: T) -> (T, T) {
        let du = self.u_fractions.1 - self.u_fractions.0;
        let dv = self.v_fractions.1 - self.v_fractions.0;
        (
            if du > T::zero() { (u - self.u_fractions.0) / du } else { T::zero() },
            if dv > T::zero() { (v - self.v_fractions.0) / dv } else { T::zero() },
        )
    }
}

/// Turn the de Boor poles of one span into Bezier poles along one direction, in place.
/// `at(k, line)` addresses pole `k` along the direction on the `line`-th parallel line.
/// Returns true when the direction is degenerate.
fn saturate<T: FloatingPoint>(
    net: &mut [Vector4<T>],
    direction: &SurfaceDirection<T>,
    span: usize,
    order: usize,
    lines: usize,
    at: impl Fn(usize, usize) -> usize,
) -> bool {
    if order <= 1 {
        return true;
    }
    let degree = order - 1;
    let (a, b) = direction.span(span);
    if b <= a {
        return true;
    }
    let knots = direction.knots();
    let k = degree + span;

    for line in 0..lines {
        let poles: Vec<_> = (0..order).map(|r| net[at(r, line)]).collect();
        for m in 0..order {
            let args: Vec<T> = (0..degree).map(|r| if r < degree - m { a } else { b }).collect();
            match blossom(&poles, knots, k, degree, &args) {
                Some(p) => net[at(m, line)] = p,
                None => return true,
            }
        }
    }
    false
}

/// Evaluate the blossom of the span `[t(k), t(k+1)]` at `args` with the de Boor recurrence
fn blossom<T: FloatingPoint>(
    poles: &[Vector4<T>],
    knots: &KnotVector<T>,
    k: usize,
    degree: usize,
    args: &[T],
) -> Option<Vector4<T>> {
    let mut d = poles.to_vec();
    for r in 1..=degree {
        let x = args[r - 1];
        for i in (r..=degree).rev() {
            let g = k - degree + i;
            let denom = knots[g + degree + 1 - r] - knots[g];
            if denom <= T::zero() {
                return None;
            }
            let alpha = (x - knots[g]) / denom;
            d[i] = d[i - 1] * (T::one() - alpha) + d[i] * alpha;
        }
    }
    Some(d[degree])
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    use super::*;
    use crate::patch::evaluate;

    fn wavy_surface() -> NurbsSurface<f64> {
        let u = SurfaceDirection::try_new(3, vec![0., 0., 0., 0.3, 1., 1., 1.], 4, false).unwrap();
        let v = SurfaceDirection::try_new(4, vec![0., 0., 0., 0., 0.5, 1., 1., 1., 1.], 5, false).unwrap();
        let points = (0..5)
            .flat_map(|j| {
                (0..4).map(move |i| {
                    Point3::new(i as f64, j as f64, ((i * 3 + j * 5) % 4) as f64 * 0.5)
                })
            })
            .collect();
        let weights = (0..20).map(|k| 1. + (k % 3) as f64 * 0.25).collect();
        NurbsSurface::try_new(u, v, points, Some(weights)).unwrap()
    }

    #[test]
    fn patches_reproduce_the_surface() {
        let surface = wavy_surface();
        let patches = BezierPatch::extract_all(&surface);
        assert_eq!(patches.len(), 4);
        for patch in patches.iter() {
            assert!(!patch.is_null());
            for (s, t) in [(0., 0.), (0.25, 0.5), (1., 0.7), (0.5, 1.)] {
                let sample = evaluate(patch, s, t, false);
                let (u, v) = patch.local_to_fraction(s, t);
                let expected = surface.point_at_fraction(&Point2::new(u, v));
                assert!(sample.valid);
                assert_relative_eq!(sample.point, expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn repeated_knot_gives_null_patch() {
        let u = SurfaceDirection::try_new(2, vec![0., 0., 0.5, 0.5, 1., 1.], 4, false).unwrap();
        let v = SurfaceDirection::clamped(2, 2).unwrap();
        let points = (0..2)
            .flat_map(|j| (0..4).map(move |i| Point3::new(i as f64, j as f64, 0.)))
            .collect();
        let surface = NurbsSurface::try_new(u, v, points, None).unwrap();
        let patches = BezierPatch::extract_all(&surface);
        assert_eq!(patches.len(), 3);
        assert!(!patches[0].is_null());
        assert!(patches[1].is_null_u());
        assert!(!patches[1].is_null_v());
        assert!(!patches[2].is_null());
    }

    #[test]
    fn closed_surface_patches_meet_at_seam() {
        let u = SurfaceDirection::try_new(3, vec![0., 1., 2., 3., 4.], 4, true).unwrap();
        let v = SurfaceDirection::clamped(2, 2).unwrap();
        let points = (0..2)
            .flat_map(|j| {
                (0..4).map(move |i| {
                    let a = std::f64::consts::FRAC_PI_2 * i as f64;
                    Point3::new(a.cos(), a.sin(), j as f64)
                })
            })
            .collect();
        let surface = NurbsSurface::try_new(u, v, points, None).unwrap();
        let patches = BezierPatch::extract_all(&surface);
        assert_eq!(patches.len(), 4);
        let first = evaluate(&patches[0], 0., 0.5, false).point;
        let last = evaluate(&patches[3], 1., 0.5, false).point;
        assert_relative_eq!(first, last, epsilon = 1e-12);
    }
}
