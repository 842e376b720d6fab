use nalgebra::{Point2, Point3, Vector3, Vector4};

use crate::misc::{bernstein, bernstein_with_derivatives, safe_divide, scalar, scalar_from_usize, FloatingPoint};

use super::BezierPatch;

/// Absolute floor of the tolerance used to detect vanishing derivatives and weights
pub const POLE_ABSOLUTE_TOLERANCE: f64 = 1e-14;
/// Tolerance relative to the extent of the patch control net
pub const POLE_LOCAL_RELATIVE_TOLERANCE: f64 = 1e-8;
/// Tolerance relative to the magnitude of the control point coordinates
pub const POLE_GLOBAL_RELATIVE_TOLERANCE: f64 = 1e-12;

/// Step sizes toward the patch center tried when a normal cannot be formed at a sample
const NORMAL_PERTURBATIONS: [f64; 3] = [1e-6, 1e-4, 1e-2];

/// One dehomogenized evaluation of a patch.
/// Derivatives are taken with respect to the local patch parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchSample<T: FloatingPoint> {
    pub point: Point3<T>,
    pub weight: T,
    pub u_derivative: Vector3<T>,
    pub v_derivative: Vector3<T>,
    pub valid: bool,
}

impl<T: FloatingPoint> PatchSample<T> {
    fn invalid() -> Self {
        Self {
            point: Point3::origin(),
            weight: T::zero(),
            u_derivative: Vector3::zeros(),
            v_derivative: Vector3::zeros(),
            valid: false,
        }
    }
}

/// Evaluated samples of a patch.
/// Every array is either empty or holds `num_u * num_v` entries indexed `j * num_u + i`.
#[derive(Clone, Debug, Default)]
pub struct Grid<T: FloatingPoint> {
    num_u: usize,
    num_v: usize,
    /// surface parameter fractions
    params: Vec<Point2<T>>,
    points: Vec<Point3<T>>,
    weights: Vec<T>,
    u_derivatives: Vec<Vector3<T>>,
    v_derivatives: Vec<Vector3<T>>,
    normals: Vec<Vector3<T>>,
    valid: Vec<bool>,
}

impl<T: FloatingPoint> Grid<T> {
    pub fn num_u(&self) -> usize {
        self.num_u
    }

    pub fn num_v(&self) -> usize {
        self.num_v
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.num_u + i
    }

    pub fn params(&self) -> &[Point2<T>] {
        &self.params
    }

    pub fn points(&self) -> &[Point3<T>] {
        &self.points
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn u_derivatives(&self) -> &[Vector3<T>] {
        &self.u_derivatives
    }

    pub fn v_derivatives(&self) -> &[Vector3<T>] {
        &self.v_derivatives
    }

    /// Unit normals, zero where no normal could be formed
    pub fn normals(&self) -> &[Vector3<T>] {
        &self.normals
    }

    pub fn valid(&self) -> &[bool] {
        &self.valid
    }

    pub fn point(&self, i: usize, j: usize) -> &Point3<T> {
        &self.points[self.index(i, j)]
    }

    pub fn is_valid(&self, i: usize, j: usize) -> bool {
        self.valid[self.index(i, j)]
    }

    /// All samples evaluated to a finite, non-degenerate weight
    pub fn all_valid(&self) -> bool {
        self.valid.iter().all(|v| *v)
    }

    /// Reuse the allocation for another evaluation
    pub fn clear(&mut self) {
        self.num_u = 0;
        self.num_v = 0;
        self.params.clear();
        self.points.clear();
        self.weights.clear();
        self.u_derivatives.clear();
        self.v_derivatives.clear();
        self.normals.clear();
        self.valid.clear();
    }

    fn push(&mut self, param: Point2<T>, sample: PatchSample<T>, normal: Option<Vector3<T>>) {
        self.params.push(param);
        self.points.push(sample.point);
        self.weights.push(sample.weight);
        self.valid.push(sample.valid);
        if let Some(n) = normal {
            self.u_derivatives.push(sample.u_derivative);
            self.v_derivatives.push(sample.v_derivative);
            self.normals.push(n);
        }
    }
}

/// Evaluate a single point of the patch at local parameters `s`, `t` in `[0, 1]`.
pub fn evaluate<T: FloatingPoint>(patch: &BezierPatch<T>, s: T, t: T, need_derivatives: bool) -> PatchSample<T> {
    if patch.is_null() {
        return PatchSample::invalid();
    }
    let (nu, nv) = (patch.u_order(), patch.v_order());
    let (bu, dbu) = if need_derivatives {
        bernstein_with_derivatives(nu, s)
    } else {
        (bernstein(nu, s), vec![])
    };
    let (bv, dbv) = if need_derivatives {
        bernstein_with_derivatives(nv, t)
    } else {
        (bernstein(nv, t), vec![])
    };

    let mut x = Vector4::<T>::zeros();
    let mut xu = Vector4::<T>::zeros();
    let mut xv = Vector4::<T>::zeros();
    for j in 0..nv {
        let mut row = Vector4::<T>::zeros();
        let mut row_u = Vector4::<T>::zeros();
        for i in 0..nu {
            let p = &patch.control_point(i, j).coords;
            row += p * bu[i];
            if need_derivatives {
                row_u += p * dbu[i];
            }
        }
        x += row * bv[j];
        if need_derivatives {
            xu += row_u * bv[j];
            xv += row * dbv[j];
        }
    }

    if !patch.is_rational() {
        return PatchSample {
            point: Point3::from(x.xyz()),
            weight: T::one(),
            u_derivative: xu.xyz(),
            v_derivative: xv.xyz(),
            valid: true,
        };
    }

    match safe_divide(T::one(), x.w, scalar(POLE_ABSOLUTE_TOLERANCE)) {
        Some(inv) => {
            let point = x.xyz() * inv;
            PatchSample {
                point: Point3::from(point),
                weight: x.w,
                u_derivative: (xu.xyz() - point * xu.w) * inv,
                v_derivative: (xv.xyz() - point * xv.w) * inv,
                valid: true,
            }
        }
        None => PatchSample::invalid(),
    }
}

/// Tolerance for vanishing derivatives on this patch
pub fn pole_tolerance<T: FloatingPoint>(patch: &BezierPatch<T>) -> T {
    let points = patch.euclidean_control_points();
    let mut extent = T::zero();
    let mut magnitude = T::zero();
    if let Some(first) = points.first() {
        for p in points.iter() {
            extent = extent.max((p - first).norm());
            magnitude = p.coords.iter().fold(magnitude, |m, c| m.max(c.abs()));
        }
    }
    scalar::<T>(POLE_ABSOLUTE_TOLERANCE)
        + extent * scalar(POLE_LOCAL_RELATIVE_TOLERANCE)
        + magnitude * scalar(POLE_GLOBAL_RELATIVE_TOLERANCE)
}

/// Unit normal at a sample, nudging the parameter toward the patch center where a derivative vanishes.
pub fn sample_normal<T: FloatingPoint>(
    patch: &BezierPatch<T>,
    s: T,
    t: T,
    sample: &PatchSample<T>,
    tolerance: T,
) -> Vector3<T> {
    let usable = |sample: &PatchSample<T>| {
        sample.valid
            && sample.u_derivative.norm() > tolerance
            && sample.v_derivative.norm() > tolerance
    };
    let normal_of = |sample: &PatchSample<T>| {
        sample
            .u_derivative
            .cross(&sample.v_derivative)
            .try_normalize(tolerance * tolerance)
    };

    if usable(sample) {
        if let Some(n) = normal_of(sample) {
            return n;
        }
    }

    let half = scalar::<T>(0.5);
    for delta in NORMAL_PERTURBATIONS {
        let delta = scalar::<T>(delta);
        let ps = s + (half - s) * delta;
        let pt = t + (half - t) * delta;
        let nudged = evaluate(patch, ps, pt, true);
        if usable(&nudged) {
            if let Some(n) = normal_of(&nudged) {
                return n;
            }
        }
    }
    Vector3::zeros()
}

/// Evaluate a rectangular grid of `num_u * num_v` samples over local ranges of the patch.
/// With `reverse_u` the columns run from the end of `u_range` to its start.
pub fn evaluate_grid<T: FloatingPoint>(
    patch: &BezierPatch<T>,
    u_range: (T, T),
    v_range: (T, T),
    num_u: usize,
    num_v: usize,
    reverse_u: bool,
    need_derivatives: bool,
) -> Grid<T> {
    let mut grid = Grid::default();
    evaluate_grid_into(
        &mut grid,
        patch,
        u_range,
        v_range,
        num_u,
        num_v,
        reverse_u,
        need_derivatives,
    );
    grid
}

/// Same as [`evaluate_grid`], writing into a reusable grid
#[allow(clippy::too_many_arguments)]
pub fn evaluate_grid_into<T: FloatingPoint>(
    grid: &mut Grid<T>,
    patch: &BezierPatch<T>,
    u_range: (T, T),
    v_range: (T, T),
    num_u: usize,
    num_v: usize,
    reverse_u: bool,
    need_derivatives: bool,
) {
    let steps = |range: (T, T), n: usize| -> Vec<T> {
        if n <= 1 {
            return vec![range.0];
        }
        let div = scalar_from_usize::<T>(n - 1);
        (0..n)
            .map(|k| range.0 + (range.1 - range.0) * scalar_from_usize::<T>(k) / div)
            .collect()
    };
    let mut us = steps(u_range, num_u);
    if reverse_u {
        us.reverse();
    }
    let vs = steps(v_range, num_v);
    let samples: Vec<_> = vs
        .iter()
        .flat_map(|t| us.iter().map(move |s| Point2::new(*s, *t)))
        .collect();
    evaluate_samples_into(grid, patch, &samples, need_derivatives);
    grid.num_u = us.len();
    grid.num_v = vs.len();
}

/// Evaluate an arbitrary list of local parameters as a single-row grid
pub fn evaluate_samples<T: FloatingPoint>(
    patch: &BezierPatch<T>,
    samples: &[Point2<T>],
    need_derivatives: bool,
) -> Grid<T> {
    let mut grid = Grid::default();
    evaluate_samples_into(&mut grid, patch, samples, need_derivatives);
    grid
}

fn evaluate_samples_into<T: FloatingPoint>(
    grid: &mut Grid<T>,
    patch: &BezierPatch<T>,
    samples: &[Point2<T>],
    need_derivatives: bool,
) {
    grid.clear();
    let tolerance = if need_derivatives {
        pole_tolerance(patch)
    } else {
        T::zero()
    };
    for st in samples {
        let sample = evaluate(patch, st.x, st.y, need_derivatives);
        let normal = need_derivatives.then(|| sample_normal(patch, st.x, st.y, &sample, tolerance));
        let (u, v) = patch.local_to_fraction(st.x, st.y);
        grid.push(Point2::new(u, v), sample, normal);
    }
    grid.num_u = samples.len();
    grid.num_v = if samples.is_empty() { 0 } else { 1 };
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point4;

    use super::*;

    fn saddle() -> BezierPatch<f64> {
        BezierPatch::from_points(
            3,
            3,
            (0..3)
                .flat_map(|j| {
                    (0..3).map(move |i| {
                        Point3::new(i as f64, j as f64, if (i + j) % 2 == 0 { 0.5 } else { -0.5 })
                    })
                })
                .collect(),
        )
    }

    #[test]
    fn grid_arrays_are_consistent() {
        let grid = evaluate_grid(&saddle(), (0., 1.), (0., 1.), 5, 4, false, true);
        assert_eq!(grid.num_u(), 5);
        assert_eq!(grid.num_v(), 4);
        assert_eq!(grid.points().len(), 20);
        assert_eq!(grid.normals().len(), 20);
        assert_eq!(grid.params().len(), 20);
        let without = evaluate_grid(&saddle(), (0., 1.), (0., 1.), 5, 4, false, false);
        assert!(without.normals().is_empty());
        assert_eq!(without.points().len(), 20);
    }

    #[test]
    fn reverse_u_flips_columns() {
        let forward = evaluate_grid(&saddle(), (0., 1.), (0., 1.), 4, 2, false, false);
        let reverse = evaluate_grid(&saddle(), (0., 1.), (0., 1.), 4, 2, true, false);
        for j in 0..2 {
            for i in 0..4 {
                assert_eq!(forward.point(i, j), reverse.point(3 - i, j));
            }
        }
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let patch = saddle();
        let h = 1e-6;
        let s = evaluate(&patch, 0.3, 0.6, true);
        let su = (evaluate(&patch, 0.3 + h, 0.6, false).point - evaluate(&patch, 0.3 - h, 0.6, false).point) / (2. * h);
        let sv = (evaluate(&patch, 0.3, 0.6 + h, false).point - evaluate(&patch, 0.3, 0.6 - h, false).point) / (2. * h);
        assert_relative_eq!(s.u_derivative, su, epsilon = 1e-6);
        assert_relative_eq!(s.v_derivative, sv, epsilon = 1e-6);
    }

    #[test]
    fn zero_weights_are_invalid() {
        let mut patch = BezierPatch::from_points(2, 2, vec![Point3::new(1., 1., 1.); 4]);
        patch = patch.with_control_points(vec![Point4::new(1., 1., 1., 0.); 4], true);
        let grid = evaluate_grid(&patch, (0., 1.), (0., 1.), 3, 3, false, true);
        assert!(grid.valid().iter().all(|v| !v));
        assert!(grid.points().iter().all(|p| *p == Point3::origin()));
    }

    #[test]
    fn pole_row_gets_a_normal() {
        // all poles of the first row collapse into the apex of a cone
        let patch = BezierPatch::from_points(
            2,
            2,
            vec![
                Point3::new(0., 0., 1.),
                Point3::new(0., 0., 1.),
                Point3::new(1., 0., 0.),
                Point3::new(0., 1., 0.),
            ],
        );
        let grid = evaluate_grid(&patch, (0., 1.), (0., 1.), 3, 2, false, true);
        for n in grid.normals() {
            assert_relative_eq!(n.norm(), 1., epsilon = 1e-9);
        }
    }
}
