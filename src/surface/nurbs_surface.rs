use nalgebra::{Matrix4, Point2, Point3, Point4, Vector3, Vector4};

use crate::misc::{binomial::Binomial, FloatingPoint, PolygonBoundary, Transformable};

use super::SurfaceDirection;

/// Closed polyline in parameter-fraction space bounding the visible part of a surface
pub type TrimLoop<T> = PolygonBoundary<T>;

/// Tensor-product NURBS surface representation.
/// Control points are stored row-major: row index runs along V, column index along U.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NurbsSurface<T: FloatingPoint> {
    u: SurfaceDirection<T>,
    v: SurfaceDirection<T>,
    control_points: Vec<Point3<T>>,
    /// per control point weights, `None` for non-rational surfaces
    weights: Option<Vec<T>>,
    /// trim loops in parameter fractions
    trim_loops: Vec<TrimLoop<T>>,
    /// when set, trim loops cut holes into the full parameter rectangle
    hole_origin: bool,
}

impl<T: FloatingPoint> NurbsSurface<T> {
    pub fn try_new(
        u: SurfaceDirection<T>,
        v: SurfaceDirection<T>,
        control_points: Vec<Point3<T>>,
        weights: Option<Vec<T>>,
    ) -> anyhow::Result<Self> {
        let count = u.num_poles() * v.num_poles();
        anyhow::ensure!(
            control_points.len() == count,
            "expected {} control points, got {}",
            count,
            control_points.len()
        );
        if let Some(w) = weights.as_ref() {
            anyhow::ensure!(
                w.len() == count,
                "expected {} weights, got {}",
                count,
                w.len()
            );
        }
        Ok(Self {
            u,
            v,
            control_points,
            weights,
            trim_loops: vec![],
            hole_origin: false,
        })
    }

    /// Create a bilinear surface through four corners ordered `(u0, v0), (u1, v0), (u0, v1), (u1, v1)`
    pub fn bilinear(corners: [Point3<T>; 4]) -> anyhow::Result<Self> {
        Self::try_new(
            SurfaceDirection::clamped(2, 2)?,
            SurfaceDirection::clamped(2, 2)?,
            corners.to_vec(),
            None,
        )
    }

    pub fn with_trim_loops(mut self, trim_loops: Vec<TrimLoop<T>>) -> Self {
        self.trim_loops = trim_loops;
        self
    }

    pub fn with_hole_origin(mut self, hole_origin: bool) -> Self {
        self.hole_origin = hole_origin;
        self
    }

    pub fn u(&self) -> &SurfaceDirection<T> {
        &self.u
    }

    pub fn v(&self) -> &SurfaceDirection<T> {
        &self.v
    }

    pub fn control_points(&self) -> &[Point3<T>] {
        &self.control_points
    }

    pub fn weights(&self) -> Option<&[T]> {
        self.weights.as_deref()
    }

    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    pub fn trim_loops(&self) -> &[TrimLoop<T>] {
        &self.trim_loops
    }

    pub fn hole_origin(&self) -> bool {
        self.hole_origin
    }

    pub fn is_trimmed(&self) -> bool {
        !self.trim_loops.is_empty()
    }

    /// The whole surface is a single Bezier patch
    pub fn is_single_bezier(&self) -> bool {
        !self.u.is_closed()
            && !self.v.is_closed()
            && self.u.num_poles() == self.u.order()
            && self.v.num_poles() == self.v.order()
    }

    /// Number of Bezier spans in each direction
    pub fn span_counts(&self) -> (usize, usize) {
        (self.u.span_count(), self.v.span_count())
    }

    fn storage_index(&self, i: usize, j: usize) -> usize {
        self.v.wrap(j) * self.u.num_poles() + self.u.wrap(i)
    }

    /// Control point at unwrapped indices, closed directions wrap around
    pub fn control_point(&self, i: usize, j: usize) -> Point3<T> {
        self.control_points[self.storage_index(i, j)]
    }

    pub fn weight(&self, i: usize, j: usize) -> T {
        match self.weights.as_ref() {
            Some(w) => w[self.storage_index(i, j)],
            None => T::one(),
        }
    }

    /// Weighted control point `(x w, y w, z w, w)` at unwrapped indices
    pub fn homogeneous_control_point(&self, i: usize, j: usize) -> Point4<T> {
        let p = self.control_point(i, j);
        let w = self.weight(i, j);
        Point4::new(p.x * w, p.y * w, p.z * w, w)
    }

    pub fn fraction_to_knot(&self, fraction: &Point2<T>) -> Point2<T> {
        Point2::new(
            self.u.fraction_to_knot(fraction.x),
            self.v.fraction_to_knot(fraction.y),
        )
    }

    pub fn knot_to_fraction(&self, knot: &Point2<T>) -> Point2<T> {
        Point2::new(
            self.u.knot_to_fraction(knot.x),
            self.v.knot_to_fraction(knot.y),
        )
    }

    /// Evaluate the surface at knot parameters `u`, `v`
    pub fn point_at(&self, u: T, v: T) -> Point3<T> {
        let p = self.point(u, v);
        let w = p.w;
        if w == T::zero() {
            return Point3::origin();
        }
        Point3::new(p.x / w, p.y / w, p.z / w)
    }

    /// Evaluate the surface at parameter fractions in `[0, 1]`
    pub fn point_at_fraction(&self, fraction: &Point2<T>) -> Point3<T> {
        let p = self.fraction_to_knot(fraction);
        self.point_at(p.x, p.y)
    }

    /// Evaluate the homogeneous point at knot parameters `u`, `v`
    pub fn point(&self, u: T, v: T) -> Point4<T> {
        let (u_degree, v_degree) = (self.u.degree(), self.v.degree());
        let n = self.u.num_unwrapped_poles() - 1;
        let m = self.v.num_unwrapped_poles() - 1;
        let u = self.u.knots().clamp(u_degree, u);
        let v = self.v.knots().clamp(v_degree, v);

        let knot_span_index_u = self.u.knots().find_knot_span_index(n, u_degree, u);
        let knot_span_index_v = self.v.knots().find_knot_span_index(m, v_degree, v);
        let u_basis_vals = self
            .u
            .knots()
            .basis_functions(knot_span_index_u, u, u_degree);
        let v_basis_vals = self
            .v
            .knots()
            .basis_functions(knot_span_index_v, v, v_degree);
        let uind = knot_span_index_u - u_degree;

        let mut position = Vector4::<T>::zeros();
        for l in 0..=v_degree {
            let mut temp = Vector4::<T>::zeros();
            let vind = knot_span_index_v - v_degree + l;

            // sample u isoline
            for k in 0..=u_degree {
                temp += self.homogeneous_control_point(uind + k, vind).coords * u_basis_vals[k];
            }

            // add point from u isoline
            position += temp * v_basis_vals[l];
        }

        position.into()
    }

    /// Evaluate the normal at knot parameters `u`, `v`
    pub fn normal_at(&self, u: T, v: T) -> Vector3<T> {
        let deriv = self.rational_derivatives(u, v, 1);
        deriv[1][0].cross(&deriv[0][1])
    }

    /// Evaluate the rational derivatives at knot parameters `u`, `v`.
    /// `result[k][l]` is the derivative taken `k` times in U and `l` times in V.
    pub fn rational_derivatives(&self, u: T, v: T, derivs: usize) -> Vec<Vec<Vector3<T>>> {
        let ders = self.derivatives(u, v, derivs);
        rational_derivatives(&ders, derivs)
    }

    fn derivatives(&self, u: T, v: T, derivs: usize) -> Vec<Vec<Vector4<T>>> {
        let (u_degree, v_degree) = (self.u.degree(), self.v.degree());
        let n = self.u.num_unwrapped_poles() - 1;
        let m = self.v.num_unwrapped_poles() - 1;
        let u = self.u.knots().clamp(u_degree, u);
        let v = self.v.knots().clamp(v_degree, v);

        let du = derivs.min(u_degree);
        let dv = derivs.min(v_degree);
        let mut skl = vec![vec![Vector4::<T>::zeros(); derivs + 1]; derivs + 1];
        let knot_span_index_u = self.u.knots().find_knot_span_index(n, u_degree, u);
        let knot_span_index_v = self.v.knots().find_knot_span_index(m, v_degree, v);
        let uders = self
            .u
            .knots()
            .derivative_basis_functions(knot_span_index_u, u, u_degree, du);
        let vders = self
            .v
            .knots()
            .derivative_basis_functions(knot_span_index_v, v, v_degree, dv);
        let mut temp = vec![Vector4::<T>::zeros(); v_degree + 1];

        for k in 0..=du {
            for (s, column) in temp.iter_mut().enumerate() {
                *column = Vector4::zeros();
                for r in 0..=u_degree {
                    let w = self.homogeneous_control_point(
                        knot_span_index_u - u_degree + r,
                        knot_span_index_v - v_degree + s,
                    );
                    *column += w.coords * uders[k][r];
                }
            }

            let dd = (derivs - k).min(dv);
            for l in 0..=dd {
                for (s, item) in temp.iter().enumerate() {
                    skl[k][l] += item * vders[l][s];
                }
            }
        }

        skl
    }

    /// Longest control polygon along U and along V
    pub fn control_polygon_lengths(&self) -> (T, T) {
        let (nu, nv) = (self.u.num_poles(), self.v.num_poles());
        let mut lu = T::zero();
        for j in 0..nv {
            let mut length = T::zero();
            for i in 1..nu {
                length += (self.control_point(i, j) - self.control_point(i - 1, j)).norm();
            }
            lu = lu.max(length);
        }
        let mut lv = T::zero();
        for i in 0..nu {
            let mut length = T::zero();
            for j in 1..nv {
                length += (self.control_point(i, j) - self.control_point(i, j - 1)).norm();
            }
            lv = lv.max(length);
        }
        (lu, lv)
    }
}

/// Compute the rational derivatives from the homogeneous derivatives
fn rational_derivatives<T: FloatingPoint>(
    ders: &[Vec<Vector4<T>>],
    derivs: usize,
) -> Vec<Vec<Vector3<T>>> {
    let a_ders: Vec<Vec<Vector3<T>>> = ders
        .iter()
        .map(|row| row.iter().map(|d| d.xyz()).collect())
        .collect();
    let w_ders: Vec<Vec<T>> = ders
        .iter()
        .map(|row| row.iter().map(|d| d.w).collect())
        .collect();

    let mut skl: Vec<Vec<Vector3<T>>> = vec![];
    let mut binom = Binomial::<T>::new();

    for k in 0..=derivs {
        let mut row: Vec<Vector3<T>> = vec![];

        for l in 0..=(derivs - k) {
            let mut v = a_ders[k][l];
            for j in 1..=l {
                let coef = binom.get(l, j) * w_ders[0][j];
                v -= row[l - j] * coef;
            }

            for i in 1..=k {
                let coef = binom.get(k, i) * w_ders[i][0];
                v -= skl[k - i][l] * coef;
                let mut v2 = Vector3::<T>::zeros();
                for j in 1..=l {
                    v2 += skl[k - i][l - j] * binom.get(l, j) * w_ders[i][j];
                }
                v -= v2 * binom.get(k, i);
            }

            row.push(v / w_ders[0][0]);
        }

        skl.push(row);
    }

    skl
}

/// Enable to transform a NURBS surface by a homogeneous 4x4 matrix
impl<'a, T: FloatingPoint> Transformable<&'a Matrix4<T>> for NurbsSurface<T> {
    fn transform(&mut self, transform: &'a Matrix4<T>) {
        self.control_points.iter_mut().for_each(|p| {
            let transformed = transform * p.to_homogeneous();
            let w = transformed.w;
            if w != T::zero() {
                *p = Point3::new(transformed.x / w, transformed.y / w, transformed.z / w);
            }
        });
    }
}
