use nalgebra::Point3;

use crate::{
    misc::{scalar_from_usize, FloatingPoint},
    patch::BezierPatch,
};

use super::{DirectionCounts, GridCounts, ToleranceOptions};

/// Worst measurements of a control polygon
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PolygonError<T> {
    pub chord: T,
    pub angle: T,
    pub length: T,
}

impl<T: FloatingPoint> PolygonError<T> {
    fn zero() -> Self {
        Self {
            chord: T::zero(),
            angle: T::zero(),
            length: T::zero(),
        }
    }

    fn merge(&self, other: &Self) -> Self {
        Self {
            chord: self.chord.max(other.chord),
            angle: self.angle.max(other.angle),
            length: self.length.max(other.length),
        }
    }
}

/// Errors along one direction: over the whole net and on the two boundary lines
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionError<T> {
    pub interior: PolygonError<T>,
    pub low: PolygonError<T>,
    pub high: PolygonError<T>,
}

/// Worst diagonal deviation of the control net
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiagonalError<T> {
    /// distance between the midpoints of the two diagonals of a net cell
    pub absolute: T,
    /// the same distance over the longer diagonal
    pub relative: T,
}

/// Measure the twist of every 2x2 block of a row-major net
pub fn diagonal_error<T: FloatingPoint>(points: &[Point3<T>], num_u: usize, num_v: usize) -> DiagonalError<T> {
    let half: T = nalgebra::convert(0.5);
    let mut absolute = T::zero();
    let mut relative = T::zero();
    for j in 1..num_v {
        for i in 1..num_u {
            let p00 = &points[(j - 1) * num_u + i - 1];
            let p10 = &points[(j - 1) * num_u + i];
            let p01 = &points[j * num_u + i - 1];
            let p11 = &points[j * num_u + i];
            let m0 = (p00.coords + p11.coords) * half;
            let m1 = (p10.coords + p01.coords) * half;
            let e = (m0 - m1).norm();
            let diagonal = (p11 - p00).norm().max((p10 - p01).norm());
            absolute = absolute.max(e);
            if diagonal > T::zero() {
                relative = relative.max(e / diagonal);
            }
        }
    }
    DiagonalError { absolute, relative }
}

/// Measure chord height, turning angle and length along each line of the net.
/// `at(k, line)` addresses point `k` along the direction on the `line`-th parallel line.
fn direction_error<T: FloatingPoint>(
    points: &[Point3<T>],
    count: usize,
    lines: usize,
    curved: bool,
    at: impl Fn(usize, usize) -> usize,
) -> DirectionError<T> {
    let mut per_line = Vec::with_capacity(lines);
    for line in 0..lines {
        let mut error: PolygonError<T> = PolygonError::zero();
        for k in 1..count {
            error.length += (points[at(k, line)] - points[at(k - 1, line)]).norm();
        }
        if curved {
            for k in 2..count {
                let p0 = &points[at(k - 2, line)];
                let p1 = &points[at(k - 1, line)];
                let p2 = &points[at(k, line)];
                let v01 = p1 - p0;
                let v02 = p2 - p0;
                let v12 = p2 - p1;
                let base = v02.norm();
                let chord = if base > T::zero() {
                    v01.cross(&v02).norm() / base
                } else {
                    v01.norm()
                };
                let angle = if v01.norm() > T::zero() && v12.norm() > T::zero() {
                    v01.angle(&v12)
                } else {
                    T::zero()
                };
                error.chord = error.chord.max(chord);
                error.angle = error.angle.max(angle);
            }
        }
        per_line.push(error);
    }

    let interior = per_line
        .iter()
        .fold(PolygonError::zero(), |acc, e| acc.merge(e));
    DirectionError {
        interior,
        low: per_line.first().copied().unwrap_or_else(PolygonError::zero),
        high: per_line.last().copied().unwrap_or_else(PolygonError::zero),
    }
}

fn ceil_count<T: FloatingPoint>(value: T) -> usize {
    value.ceil().to_usize().unwrap_or(usize::MAX)
}

/// Steps needed for one polygon error. The baseline seeds the count.
fn count_for_error<T: FloatingPoint>(
    error: &PolygonError<T>,
    degree: usize,
    curved: bool,
    baseline: usize,
    options: &ToleranceOptions<T>,
) -> usize {
    let mut count = baseline.max(1);
    if curved {
        if options.chord_tolerance > T::zero() && error.chord > T::zero() {
            let chord = ceil_count(T::one() + (error.chord / options.chord_tolerance).sqrt());
            count = count.max(chord.max(degree));
        }
        if let Some(angle_tolerance) = options.effective_angle_tolerance() {
            if error.angle > angle_tolerance {
                count = count.max(ceil_count(
                    T::one() + scalar_from_usize::<T>(degree) * error.angle / angle_tolerance,
                ));
            }
        }
    }
    if options.max_edge_length > T::zero() {
        count = count.max(ceil_count(T::one() + error.length / options.max_edge_length));
    }
    clamp_count(count, options)
}

fn clamp_count<T: FloatingPoint>(mut count: usize, options: &ToleranceOptions<T>) -> usize {
    if options.min_per_bezier > 0 {
        count = count.max(options.min_per_bezier);
    }
    if options.max_per_bezier > 0 {
        count = count.min(options.max_per_bezier);
    }
    count.clamp(1, options.max_steps_per_patch.max(1))
}

/// Baseline count from the diagonal deviation of the net
fn diagonal_count<T: FloatingPoint>(error: &DiagonalError<T>, options: &ToleranceOptions<T>) -> usize {
    let mut count = 1;
    if options.chord_tolerance > T::zero() {
        let c = (nalgebra::convert::<f64, T>(0.999) + (error.absolute / options.chord_tolerance).sqrt())
            .floor()
            .to_usize()
            .unwrap_or(usize::MAX);
        count = count.max(c.min(options.max_diagonal_count));
    }
    if error.relative > options.diagonal_relative_tolerance {
        let c = ceil_count((error.relative / options.diagonal_relative_tolerance).sqrt());
        count = count.max(c.min(options.max_diagonal_count));
    }
    count
}

/// Compute how many steps each direction of the patch needs to meet the tolerances.
/// Counts are measured on the control net after the optional display transform.
pub fn compute_step_counts<T: FloatingPoint>(patch: &BezierPatch<T>, options: &ToleranceOptions<T>) -> GridCounts<T> {
    let u_range = patch.u_fractions();
    let v_range = patch.v_fractions();
    if patch.is_null() {
        return GridCounts {
            u: DirectionCounts::uniform(1, u_range),
            v: DirectionCounts::uniform(1, v_range),
            null: true,
        };
    }

    let (nu, nv) = (patch.u_order(), patch.v_order());
    let points = options.display_points(&patch.euclidean_control_points());

    let baseline = diagonal_count(&diagonal_error(&points, nu, nv), options);

    let u_curved = nu > 2;
    let v_curved = nv > 2;
    let u_error = direction_error(&points, nu, nv, u_curved, |k, line| line * nu + k);
    let v_error = direction_error(&points, nv, nu, v_curved, |k, line| k * nu + line);

    let direction = |error: &DirectionError<T>, order: usize, curved: bool, range: (T, T)| {
        let degree = order.saturating_sub(1);
        DirectionCounts {
            interior: count_for_error(&error.interior, degree, curved, baseline, options),
            low: count_for_error(&error.low, degree, curved, 1, options),
            high: count_for_error(&error.high, degree, curved, 1, options),
            range,
        }
    };

    GridCounts {
        u: direction(&u_error, nu, u_curved, u_range),
        v: direction(&v_error, nv, v_curved, v_range),
        null: false,
    }
}

/// Step counts for every patch of the surface, row-major, before reconciliation
pub fn compute_all_step_counts<T: FloatingPoint>(
    patches: &[BezierPatch<T>],
    options: &ToleranceOptions<T>,
) -> Vec<GridCounts<T>> {
    patches
        .iter()
        .map(|patch| compute_step_counts(patch, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump(height: f64) -> BezierPatch<f64> {
        BezierPatch::from_points(
            3,
            3,
            (0..3)
                .flat_map(|j| {
                    (0..3).map(move |i| {
                        let z = if i == 1 && j == 1 { height } else { 0. };
                        Point3::new(i as f64, j as f64, z)
                    })
                })
                .collect(),
        )
    }

    #[test]
    fn flat_patch_needs_one_step() {
        let counts = compute_step_counts(&bump(0.), &ToleranceOptions::default());
        assert_eq!(counts.u.interior, 1);
        assert_eq!(counts.v.interior, 1);
    }

    #[test]
    fn boundary_rows_of_bump_are_straight() {
        let counts = compute_step_counts(&bump(2.), &ToleranceOptions::default());
        assert!(counts.u.interior > 1);
        assert_eq!(counts.u.low, 1);
        assert_eq!(counts.u.high, 1);
    }

    #[test]
    fn max_edge_length_splits_lines() {
        let options = ToleranceOptions::default().with_max_edge_length(0.5);
        let counts = compute_step_counts(&bump(0.), &options);
        assert_eq!(counts.u.low, 5);
        assert_eq!(counts.v.high, 5);
    }

    #[test]
    fn tighter_chord_never_decreases_counts() {
        let patch = bump(1.3);
        let mut previous = compute_step_counts(&patch, &ToleranceOptions::default().with_chord_tolerance(1.));
        for tol in [0.5, 0.1, 0.05, 0.01, 0.001] {
            let counts = compute_step_counts(&patch, &ToleranceOptions::default().with_chord_tolerance(tol));
            assert!(counts.u.interior >= previous.u.interior);
            assert!(counts.v.interior >= previous.v.interior);
            assert!(counts.u.low >= previous.u.low);
            assert!(counts.v.high >= previous.v.high);
            previous = counts;
        }
    }

    #[test]
    fn facet_clamps_apply() {
        let options = ToleranceOptions::default()
            .with_chord_tolerance(1e-6)
            .with_max_per_bezier(6)
            .with_min_per_bezier(2);
        let counts = compute_step_counts(&bump(3.), &options);
        assert_eq!(counts.u.interior, 6);
        assert_eq!(counts.u.low, 2);
    }
}
