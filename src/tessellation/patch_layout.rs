use nalgebra::{Point2, Vector2};

use crate::{
    misc::FloatingPoint,
    patch::BezierPatch,
    surface::{NurbsSurface, SurfaceDirection},
};

/// Columns and rows of non-empty Bezier spans in parameter-fraction space
#[derive(Clone, Debug)]
pub struct PatchLayout<T: FloatingPoint> {
    u_breaks: Vec<T>,
    v_breaks: Vec<T>,
    /// span index of each column and row
    u_spans: Vec<usize>,
    v_spans: Vec<usize>,
    /// number of spans per patch row, empty ones included
    num_u_spans: usize,
}

fn non_empty_spans<T: FloatingPoint>(direction: &SurfaceDirection<T>) -> (Vec<usize>, Vec<T>) {
    let mut spans = vec![];
    let mut breaks = vec![T::zero()];
    for i in 0..direction.span_count() {
        let (a, b) = direction.span_fractions(i);
        if b > a {
            spans.push(i);
            breaks.push(b);
        }
    }
    if let Some(last) = breaks.last_mut() {
        *last = T::one();
    }
    (spans, breaks)
}

impl<T: FloatingPoint> PatchLayout<T> {
    pub fn new(surface: &NurbsSurface<T>) -> Self {
        let (u_spans, u_breaks) = non_empty_spans(surface.u());
        let (v_spans, v_breaks) = non_empty_spans(surface.v());
        Self {
            u_breaks,
            v_breaks,
            u_spans,
            v_spans,
            num_u_spans: surface.u().span_count(),
        }
    }

    /// Distinct knot fractions along U, `0` and `1` included
    pub fn u_breaks(&self) -> &[T] {
        &self.u_breaks
    }

    pub fn v_breaks(&self) -> &[T] {
        &self.v_breaks
    }

    pub fn columns(&self) -> usize {
        self.u_spans.len()
    }

    pub fn rows(&self) -> usize {
        self.v_spans.len()
    }

    /// Index into the row-major patch list of the surface
    pub fn patch_index(&self, column: usize, row: usize) -> usize {
        self.v_spans[row] * self.num_u_spans + self.u_spans[column]
    }

    /// Column holding `u`; a value on a knot line belongs to the column above it when
    /// `toward_high` is set, to the one below otherwise
    pub fn column_of(&self, u: T, tolerance: T, toward_high: bool) -> usize {
        locate(&self.u_breaks, u, tolerance, toward_high)
    }

    pub fn row_of(&self, v: T, tolerance: T) -> usize {
        locate(&self.v_breaks, v, tolerance, true)
    }

    /// Knot line at `u` within tolerance
    pub fn u_knot_near(&self, u: T, tolerance: T) -> Option<T> {
        self.u_breaks
            .iter()
            .find(|c| (u - **c).abs() <= tolerance)
            .cloned()
    }

    pub fn is_v_knot(&self, v: T) -> bool {
        self.v_breaks.iter().any(|c| *c == v)
    }
}

fn locate<T: FloatingPoint>(breaks: &[T], x: T, tolerance: T, toward_high: bool) -> usize {
    let n = breaks.len().saturating_sub(1);
    for k in 0..n {
        let (a, b) = (breaks[k], breaks[k + 1]);
        let hit = if toward_high {
            x >= a - tolerance && x < b - tolerance
        } else {
            x > a + tolerance && x <= b + tolerance
        };
        if hit {
            return k;
        }
    }
    if toward_high {
        n.saturating_sub(1)
    } else {
        0
    }
}

/// Relative space length per unit parameter fraction along U and V, the larger one scaled to 1
pub fn parameter_scale<T: FloatingPoint>(patch: &BezierPatch<T>) -> Vector2<T> {
    let points = patch.euclidean_control_points();
    let (nu, nv) = (patch.u_order(), patch.v_order());
    let mut lu = T::zero();
    for j in 0..nv {
        let mut length = T::zero();
        for i in 1..nu {
            length += (points[j * nu + i] - points[j * nu + i - 1]).norm();
        }
        lu = lu.max(length);
    }
    let mut lv = T::zero();
    for i in 0..nu {
        let mut length = T::zero();
        for j in 1..nv {
            length += (points[j * nu + i] - points[(j - 1) * nu + i]).norm();
        }
        lv = lv.max(length);
    }

    let (u0, u1) = patch.u_fractions();
    let (v0, v1) = patch.v_fractions();
    let su = if u1 > u0 { lu / (u1 - u0) } else { T::zero() };
    let sv = if v1 > v0 { lv / (v1 - v0) } else { T::zero() };
    let max = su.max(sv);
    if max <= T::zero() {
        Vector2::new(T::one(), T::one())
    } else {
        Vector2::new(su / max, sv / max)
    }
}

/// Scale a parameter point into the anisotropic space used for shape measures
pub fn scaled<T: FloatingPoint>(p: &Point2<T>, scale: &Vector2<T>) -> Point2<T> {
    Point2::new(p.x * scale.x, p.y * scale.y)
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::*;

    fn surface_with_repeated_knot() -> NurbsSurface<f64> {
        let u = SurfaceDirection::try_new(2, vec![0., 0., 1., 1., 2., 2.], 4, false).unwrap();
        let v = SurfaceDirection::clamped(2, 2).unwrap();
        let points = (0..2)
            .flat_map(|j| (0..4).map(move |i| Point3::new(i as f64, j as f64, 0.)))
            .collect();
        NurbsSurface::try_new(u, v, points, None).unwrap()
    }

    #[test]
    fn empty_spans_are_skipped() {
        let layout = PatchLayout::new(&surface_with_repeated_knot());
        assert_eq!(layout.u_breaks(), &[0., 0.5, 1.]);
        assert_eq!(layout.columns(), 2);
        assert_eq!(layout.rows(), 1);
        // the middle span is empty
        assert_eq!(layout.patch_index(0, 0), 0);
        assert_eq!(layout.patch_index(1, 0), 2);
    }

    #[test]
    fn knot_lines_resolve_by_side() {
        let layout = PatchLayout::new(&surface_with_repeated_knot());
        assert_eq!(layout.column_of(0.5, 1e-10, true), 1);
        assert_eq!(layout.column_of(0.5, 1e-10, false), 0);
        assert_eq!(layout.column_of(0.25, 1e-10, false), 0);
        assert_eq!(layout.column_of(1.0, 1e-10, true), 1);
        assert_eq!(layout.u_knot_near(0.5 + 1e-12, 1e-10), Some(0.5));
    }
}
