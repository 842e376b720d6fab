use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::{
    bounding_box::BoundingBox,
    curve::ParametricCurve,
    misc::{scalar, EllipseArc, FloatingPoint, Transformable},
};

/// How a polygon lying entirely on the plane is treated by [`ClipPlane::convex_polygon_clip_in_place`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OnPlaneHandling {
    /// Plain signed-distance clipping
    #[default]
    Clip,
    /// Keep an on-plane polygon as if it were inside
    Inside,
    /// Drop an on-plane polygon as if it were outside
    Outside,
}

/// Position of a geometry relative to the half-space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipStatus {
    Inside,
    Outside,
    Straddle,
}

/// Oriented plane `normal . p = distance` bounding the half-space `normal . p >= distance`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClipPlane<T: FloatingPoint> {
    normal: Vector3<T>,
    distance: T,
    /// the plane is an interior cut of a larger clip volume
    interior: bool,
    /// edges produced on this plane should not be drawn
    invisible: bool,
}

impl<T: FloatingPoint> ClipPlane<T> {
    /// Create a plane from a normal and signed distance, normalizing both
    pub fn try_new(normal: Vector3<T>, distance: T, interior: bool, invisible: bool) -> anyhow::Result<Self> {
        let length = normal.norm();
        anyhow::ensure!(
            length > T::default_epsilon(),
            "clip plane normal must not vanish"
        );
        Ok(Self {
            normal: normal / length,
            distance: distance / length,
            interior,
            invisible,
        })
    }

    /// Plane through `point` keeping the side `normal` points to
    pub fn from_point_and_normal(point: &Point3<T>, normal: &Vector3<T>) -> anyhow::Result<Self> {
        let n = normal
            .try_normalize(T::default_epsilon())
            .ok_or_else(|| anyhow::anyhow!("clip plane normal must not vanish"))?;
        Ok(Self {
            normal: n,
            distance: n.dot(&point.coords),
            interior: false,
            invisible: false,
        })
    }

    pub fn normal(&self) -> &Vector3<T> {
        &self.normal
    }

    pub fn distance(&self) -> T {
        self.distance
    }

    pub fn is_interior(&self) -> bool {
        self.interior
    }

    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    pub fn set_flags(&mut self, interior: bool, invisible: bool) {
        self.interior = interior;
        self.invisible = invisible;
    }

    /// The plane with its inside and outside swapped
    pub fn negated(&self) -> Self {
        Self {
            normal: -self.normal,
            distance: -self.distance,
            ..self.clone()
        }
    }

    /// Signed distance of a point, positive inside
    pub fn evaluate_point(&self, point: &Point3<T>) -> T {
        self.normal.dot(&point.coords) - self.distance
    }

    pub fn dot_product_vector(&self, vector: &Vector3<T>) -> T {
        self.normal.dot(vector)
    }

    pub fn is_point_on(&self, point: &Point3<T>, tolerance: T) -> bool {
        self.evaluate_point(point).abs() <= tolerance
    }

    pub fn is_point_on_or_inside(&self, point: &Point3<T>, tolerance: T) -> bool {
        self.evaluate_point(point) >= -tolerance
    }

    /// Clip a convex polygon to the inside of the plane.
    /// An explicitly closed polygon (last point equal to the first) stays closed.
    /// `work` is scratch space reused across calls.
    pub fn convex_polygon_clip_in_place(
        &self,
        polygon: &mut Vec<Point3<T>>,
        work: &mut Vec<Point3<T>>,
        on_plane: OnPlaneHandling,
        tolerance: T,
    ) {
        let closed = polygon.len() > 1 && polygon.first() == polygon.last();
        if closed {
            polygon.pop();
        }
        if polygon.is_empty() {
            return;
        }

        let altitudes: Vec<T> = polygon.iter().map(|p| self.evaluate_point(p)).collect();
        let all_on = altitudes.iter().all(|h| h.abs() <= tolerance);
        match on_plane {
            OnPlaneHandling::Inside if all_on => {
                if closed {
                    close(polygon);
                }
                return;
            }
            OnPlaneHandling::Outside if all_on => {
                polygon.clear();
                return;
            }
            _ => {}
        }

        if altitudes.iter().all(|h| *h >= T::zero()) {
            if closed {
                close(polygon);
            }
            return;
        }
        if altitudes.iter().all(|h| *h < T::zero()) {
            polygon.clear();
            return;
        }

        work.clear();
        let n = polygon.len();
        for i in 0..n {
            let k = (i + 1) % n;
            let (h0, h1) = (altitudes[i], altitudes[k]);
            let (p0, p1) = (&polygon[i], &polygon[k]);
            if h0 >= T::zero() {
                push_distinct(work, *p0, tolerance);
            }
            if (h0 < T::zero()) != (h1 < T::zero()) {
                let f = h0 / (h0 - h1);
                let x = p0 + (p1 - p0) * f;
                let near_next = h1 >= T::zero() && (x - p1).norm() <= tolerance;
                if !near_next {
                    push_distinct(work, x, tolerance);
                }
            }
        }
        if work.len() > 1 && (work[0] - work[work.len() - 1]).norm() <= tolerance {
            work.pop();
        }

        std::mem::swap(polygon, work);
        if polygon.len() < 3 {
            polygon.clear();
        } else if closed {
            close(polygon);
        }
    }

    /// Split a convex polygon into its inside and outside parts in a single sweep.
    /// Also returns the smallest and largest altitude seen.
    pub fn convex_polygon_split_inside_outside(
        &self,
        polygon: &[Point3<T>],
        tolerance: T,
    ) -> (Vec<Point3<T>>, Vec<Point3<T>>, (T, T)) {
        let mut inside = vec![];
        let mut outside = vec![];
        let mut points = polygon.to_vec();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        let big = T::max_value().unwrap_or_else(|| scalar(1e300));
        let mut range = (big, -big);
        let n = points.len();
        let altitudes: Vec<T> = points.iter().map(|p| self.evaluate_point(p)).collect();
        for h in altitudes.iter() {
            range = (range.0.min(*h), range.1.max(*h));
        }
        for i in 0..n {
            let k = (i + 1) % n;
            let (h0, h1) = (altitudes[i], altitudes[k]);
            if h0 >= T::zero() {
                push_distinct(&mut inside, points[i], tolerance);
            }
            if h0 <= T::zero() {
                push_distinct(&mut outside, points[i], tolerance);
            }
            if (h0 > T::zero() && h1 < T::zero()) || (h0 < T::zero() && h1 > T::zero()) {
                let f = h0 / (h0 - h1);
                let x = points[i] + (points[k] - points[i]) * f;
                push_distinct(&mut inside, x, tolerance);
                push_distinct(&mut outside, x, tolerance);
            }
        }
        if inside.len() < 3 {
            inside.clear();
        }
        if outside.len() < 3 {
            outside.clear();
        }
        (inside, outside, range)
    }

    /// Points where the edges of a closed polygon cross the plane, in edge order.
    /// Vertices on the plane count as crossings.
    pub fn polygon_crossings(&self, polygon: &[Point3<T>], tolerance: T, crossings: &mut Vec<Point3<T>>) {
        let mut points = polygon.to_vec();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        let n = points.len();
        for i in 0..n {
            let k = (i + 1) % n;
            let h0 = self.evaluate_point(&points[i]);
            let h1 = self.evaluate_point(&points[k]);
            if h0.abs() <= tolerance {
                crossings.push(points[i]);
            } else if h1.abs() > tolerance && (h0 < T::zero()) != (h1 < T::zero()) {
                let f = h0 / (h0 - h1);
                crossings.push(points[i] + (points[k] - points[i]) * f);
            }
        }
    }

    /// Fraction along `p0-p1` where the segment strictly crosses the plane
    pub fn bounded_segment_has_simple_intersection(&self, p0: &Point3<T>, p1: &Point3<T>) -> Option<T> {
        let h0 = self.evaluate_point(p0);
        let h1 = self.evaluate_point(p1);
        if h0 * h1 < T::zero() {
            Some(h0 / (h0 - h1))
        } else {
            None
        }
    }

    /// Sweep fractions where the arc crosses the plane; tangencies are not reported
    pub fn simple_intersection_fractions(&self, arc: &EllipseArc<T>, tolerance: T) -> Vec<T> {
        // a + b cos + c sin = 0
        let a = self.evaluate_point(arc.center());
        let b = self.dot_product_vector(arc.vector0());
        let c = self.dot_product_vector(arc.vector90());
        let r = (b * b + c * c).sqrt();
        if r <= T::default_epsilon() {
            return vec![];
        }
        let cosine = -a / r;
        if cosine.abs() >= T::one() - T::default_epsilon() {
            return vec![];
        }
        let phi = c.atan2(b);
        let delta = cosine.acos();
        let mut fractions: Vec<T> = [phi + delta, phi - delta]
            .into_iter()
            .map(|theta| arc.angle_to_fraction(theta))
            .filter(|f| arc.is_fraction_in_sweep(*f, tolerance))
            .map(|f| f.clamp(T::zero(), T::one()))
            .collect();
        fractions.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
        fractions.dedup_by(|x, y| (*x - *y).abs() <= tolerance);
        fractions
    }

    /// Append the curve parameters where the curve crosses the plane.
    /// The curve is sampled on its stroke parameters and each sign change is refined by regula falsi.
    pub fn append_crossings<C: ParametricCurve<T>>(&self, curve: &C, tolerance: T, params: &mut Vec<T>) {
        let samples = curve.stroke_parameters();
        let altitude = |t: T| self.evaluate_point(&curve.point_at(t));
        let mut previous: Option<(T, T)> = None;
        for t in samples {
            let h = altitude(t);
            if h.abs() <= tolerance {
                if params.last().is_none_or(|last| (*last - t).abs() > tolerance) {
                    params.push(t);
                }
            } else if let Some((t0, h0)) = previous {
                if h0.abs() > tolerance && (h0 < T::zero()) != (h < T::zero()) {
                    params.push(regula_falsi(&altitude, (t0, h0), (t, h), tolerance));
                }
            }
            previous = Some((t, h));
        }
    }

    /// Inside fraction interval of the segment `p0-p1`
    pub fn clip_segment(&self, p0: &Point3<T>, p1: &Point3<T>) -> Option<(T, T)> {
        let h0 = self.evaluate_point(p0);
        let h1 = self.evaluate_point(p1);
        match (h0 >= T::zero(), h1 >= T::zero()) {
            (true, true) => Some((T::zero(), T::one())),
            (false, false) => None,
            (true, false) => Some((T::zero(), h0 / (h0 - h1))),
            (false, true) => Some((h0 / (h0 - h1), T::one())),
        }
    }

    /// Pieces of an open polyline inside the plane
    pub fn clip_polyline(&self, points: &[Point3<T>]) -> Vec<Vec<Point3<T>>> {
        let mut pieces = vec![];
        let mut current: Vec<Point3<T>> = vec![];
        for pair in points.windows(2) {
            let (p0, p1) = (&pair[0], &pair[1]);
            match self.clip_segment(p0, p1) {
                Some((f0, f1)) => {
                    let a = p0 + (p1 - p0) * f0;
                    let b = p0 + (p1 - p0) * f1;
                    if current.last() != Some(&a) {
                        if current.len() > 1 {
                            pieces.push(std::mem::take(&mut current));
                        }
                        current.clear();
                        current.push(a);
                    }
                    current.push(b);
                    if f1 < T::one() {
                        pieces.push(std::mem::take(&mut current));
                    }
                }
                None => {
                    if current.len() > 1 {
                        pieces.push(std::mem::take(&mut current));
                    }
                    current.clear();
                }
            }
        }
        if current.len() > 1 {
            pieces.push(current);
        }
        pieces
    }

    /// Classify a box against the half-space
    pub fn classify_range(&self, range: &BoundingBox<T>) -> ClipStatus {
        let altitudes = range.corners().map(|p| self.evaluate_point(&p));
        if altitudes.iter().all(|h| *h >= T::zero()) {
            ClipStatus::Inside
        } else if altitudes.iter().all(|h| *h < T::zero()) {
            ClipStatus::Outside
        } else {
            ClipStatus::Straddle
        }
    }

    fn coefficients(&self) -> Vector4<T> {
        Vector4::new(self.normal.x, self.normal.y, self.normal.z, -self.distance)
    }

    fn set_coefficients(&mut self, c: Vector4<T>) -> bool {
        let n = Vector3::new(c.x, c.y, c.z);
        let length = n.norm();
        if length <= T::default_epsilon() {
            return false;
        }
        self.normal = n / length;
        self.distance = -c.w / length;
        true
    }

    /// Move the plane along with geometry transformed by `transform`.
    /// Returns false when the matrix is singular, leaving the plane untouched.
    pub fn transform_in_place(&mut self, transform: &Matrix4<T>) -> bool {
        match transform.try_inverse() {
            Some(inverse) => {
                let c = inverse.transpose() * self.coefficients();
                self.set_coefficients(c)
            }
            None => false,
        }
    }

    /// Replace the plane row vector by `plane * matrix` and renormalize.
    /// Returns false when the resulting normal vanishes.
    pub fn multiply_plane_times_matrix(&mut self, matrix: &Matrix4<T>) -> bool {
        let c = matrix.transpose() * self.coefficients();
        self.set_coefficients(c)
    }
}

impl<'a, T: FloatingPoint> Transformable<&'a Matrix4<T>> for ClipPlane<T> {
    fn transform(&mut self, transform: &'a Matrix4<T>) {
        if !self.transform_in_place(transform) {
            log::warn!("clip plane left untouched by a singular transform");
        }
    }
}

fn close<T: FloatingPoint>(polygon: &mut Vec<Point3<T>>) {
    if let Some(first) = polygon.first().copied() {
        polygon.push(first);
    }
}

fn push_distinct<T: FloatingPoint>(points: &mut Vec<Point3<T>>, p: Point3<T>, tolerance: T) {
    match points.last() {
        Some(last) if (last - p).norm() <= tolerance => {}
        _ => points.push(p),
    }
}

/// Illinois variant of regula falsi on a bracketed sign change
fn regula_falsi<T: FloatingPoint>(f: &impl Fn(T) -> T, a: (T, T), b: (T, T), tolerance: T) -> T {
    let (mut t0, mut h0) = a;
    let (mut t1, mut h1) = b;
    let mut side = 0;
    for _ in 0..64 {
        let t = (t0 * h1 - t1 * h0) / (h1 - h0);
        let h = f(t);
        if h.abs() <= tolerance || (t1 - t0).abs() <= tolerance {
            return t;
        }
        if (h < T::zero()) == (h1 < T::zero()) {
            t1 = t;
            h1 = h;
            if side == -1 {
                h0 /= scalar(2.0);
            }
            side = -1;
        } else {
            t0 = t;
            h0 = h;
            if side == 1 {
                h1 /= scalar(2.0);
            }
            side = 1;
        }
    }
    (t0 * h1 - t1 * h0) / (h1 - h0)
}
