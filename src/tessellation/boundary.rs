use std::cmp::Ordering;

use nalgebra::{ComplexField, Point2, Point3};

use crate::{
    clip::ConvexClipPlaneSet,
    misc::{signed_area, FloatingPoint},
    surface::NurbsSurface,
};

use super::TessellationOptions;

/// Closed polyline in parameter fractions, no repeated closure point
pub type BoundaryLoop<T> = Vec<Point2<T>>;

/// Counter-clockwise unit parameter rectangle
pub fn unit_rectangle<T: FloatingPoint>() -> BoundaryLoop<T> {
    vec![
        Point2::new(T::zero(), T::zero()),
        Point2::new(T::one(), T::zero()),
        Point2::new(T::one(), T::one()),
        Point2::new(T::zero(), T::one()),
    ]
}

/// Drop consecutive duplicates, the wrap-around pair included
pub fn dedup_loop<T: FloatingPoint>(points: &mut BoundaryLoop<T>) {
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
}

/// Loops bounding the region to facet, in parameter fractions.
/// Loops with non-finite points are dropped. Trims are ignored when any of their points leaves
/// the validity band; loops reaching out of the unit square are clipped to it and degenerate
/// loops are dropped.
pub fn assemble_boundary<T: FloatingPoint>(
    surface: &NurbsSurface<T>,
    options: &TessellationOptions<T>,
) -> Vec<BoundaryLoop<T>> {
    if !surface.is_trimmed() {
        return vec![unit_rectangle()];
    }

    let trims: Vec<_> = surface
        .trim_loops()
        .iter()
        .enumerate()
        .filter(|(index, trim)| {
            let finite = trim
                .vertices()
                .iter()
                .all(|p| ComplexField::is_finite(&p.x) && ComplexField::is_finite(&p.y));
            if !finite {
                log::warn!("dropping trim loop {} with non-finite points", index);
            }
            finite
        })
        .collect();
    if trims.is_empty() {
        log::warn!("no usable trim loop, ignoring trims");
        return vec![unit_rectangle()];
    }

    let (lo, hi) = options.boundary_band;
    let out_of_band = trims
        .iter()
        .flat_map(|(_, l)| l.vertices().iter())
        .any(|p| p.x < lo || p.x > hi || p.y < lo || p.y > hi);
    if out_of_band {
        log::warn!("trim loops leave the parameter band [{}, {}], ignoring trims", lo, hi);
        return vec![unit_rectangle()];
    }

    let tolerance = options.compression_epsilon;
    let square = ConvexClipPlaneSet::<T>::unit_square();
    let mut loops = vec![];
    for (index, trim) in trims {
        let mut points = trim.vertices().clone();
        dedup_loop(&mut points);
        if points.len() < 3 {
            log::debug!("dropping trim loop {} with {} distinct points", index, points.len());
            continue;
        }

        let outside = points
            .iter()
            .any(|p| p.x < T::zero() || p.x > T::one() || p.y < T::zero() || p.y > T::one());
        if outside {
            let lifted: Vec<_> = points.iter().map(|p| Point3::new(p.x, p.y, T::zero())).collect();
            points = square
                .clip_polygon(&lifted, tolerance)
                .into_iter()
                .map(|p| Point2::new(p.x, p.y))
                .collect();
            dedup_loop(&mut points);
        }

        if points.len() < 3 || signed_area(&points).abs() <= tolerance * tolerance {
            log::debug!("dropping degenerate trim loop {}", index);
            continue;
        }
        loops.push(points);
    }

    if surface.hole_origin() {
        loops.push(unit_rectangle());
    }
    loops
}

/// Snap the coordinates of one axis: values closer than `tolerance` collapse onto one value,
/// an anchor when the cluster reaches one
fn compress_axis<T: FloatingPoint>(
    loops: &mut [BoundaryLoop<T>],
    anchors: &[T],
    tolerance: T,
    get: impl Fn(&Point2<T>) -> T,
    set: impl Fn(&mut Point2<T>, T),
) {
    let get = &get;
    let mut entries: Vec<(T, usize, usize)> = loops
        .iter()
        .enumerate()
        .flat_map(|(l, points)| points.iter().enumerate().map(move |(i, p)| (get(p), l, i)))
        .collect();
    entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut start = 0;
    while start < entries.len() {
        let mut end = start + 1;
        while end < entries.len() && entries[end].0 - entries[end - 1].0 <= tolerance {
            end += 1;
        }
        let (min, max) = (entries[start].0, entries[end - 1].0);
        let value = anchors
            .iter()
            .find(|a| **a >= min - tolerance && **a <= max + tolerance)
            .cloned()
            .unwrap_or(min);
        for (_, l, i) in entries[start..end].iter() {
            set(&mut loops[*l][*i], value);
        }
        start = end;
    }
}

/// Snap nearly equal parameter coordinates across all loops, preferring knot lines,
/// then drop the loops collapsing under the snap
pub fn compress_coordinates<T: FloatingPoint>(
    loops: &mut Vec<BoundaryLoop<T>>,
    u_anchors: &[T],
    v_anchors: &[T],
    tolerance: T,
) {
    compress_axis(loops, u_anchors, tolerance, |p| p.x, |p, x| p.x = x);
    compress_axis(loops, v_anchors, tolerance, |p| p.y, |p, y| p.y = y);
    loops.iter_mut().for_each(dedup_loop);
    loops.retain(|l| l.len() >= 3 && signed_area(l) != T::zero());
}

#[cfg(test)]
mod tests {
    use crate::misc::PolygonBoundary;

    use super::*;

    fn flat() -> NurbsSurface<f64> {
        NurbsSurface::bilinear([
            Point3::new(0., 0., 0.),
            Point3::new(1., 0., 0.),
            Point3::new(0., 1., 0.),
            Point3::new(1., 1., 0.),
        ])
        .unwrap()
    }

    #[test]
    fn untrimmed_surface_uses_the_unit_rectangle() {
        let loops = assemble_boundary(&flat(), &TessellationOptions::default());
        assert_eq!(loops, vec![unit_rectangle()]);
    }

    #[test]
    fn loops_are_clipped_and_filtered() {
        let surface = flat().with_trim_loops(vec![
            PolygonBoundary::new(vec![
                Point2::new(-0.5, 0.25),
                Point2::new(0.5, 0.25),
                Point2::new(0.5, 0.75),
                Point2::new(-0.5, 0.75),
            ]),
            // two distinct points only
            PolygonBoundary::new(vec![
                Point2::new(0.1, 0.1),
                Point2::new(0.2, 0.2),
                Point2::new(0.2, 0.2),
            ]),
        ]);
        let loops = assemble_boundary(&surface, &TessellationOptions::default());
        assert_eq!(loops.len(), 1);
        approx::assert_relative_eq!(signed_area(&loops[0]), 0.25, epsilon = 1e-12);
        assert!(loops[0].iter().all(|p| p.x >= 0.));
    }

    #[test]
    fn far_trims_are_ignored() {
        let surface = flat().with_trim_loops(vec![PolygonBoundary::new(vec![
            Point2::new(0.2, 0.2),
            Point2::new(3.0, 0.2),
            Point2::new(0.2, 0.8),
        ])]);
        let loops = assemble_boundary(&surface, &TessellationOptions::default());
        assert_eq!(loops, vec![unit_rectangle()]);
    }

    #[test]
    fn non_finite_loops_are_dropped() {
        let triangle = PolygonBoundary::new(vec![
            Point2::new(0.2, 0.2),
            Point2::new(0.8, 0.2),
            Point2::new(0.5, 0.8),
        ]);
        let surface = flat().with_trim_loops(vec![
            triangle.clone(),
            PolygonBoundary::new(vec![
                Point2::new(0.1, 0.1),
                Point2::new(f64::NAN, 0.5),
                Point2::new(0.1, 0.9),
            ]),
        ]);
        let loops = assemble_boundary(&surface, &TessellationOptions::default());
        assert_eq!(loops, vec![triangle.vertices().clone()]);

        let surface = flat().with_trim_loops(vec![PolygonBoundary::new(vec![
            Point2::new(0.1, 0.1),
            Point2::new(f64::INFINITY, 0.5),
            Point2::new(0.1, 0.9),
        ])]);
        let loops = assemble_boundary(&surface, &TessellationOptions::default());
        assert_eq!(loops, vec![unit_rectangle()]);
    }

    #[test]
    fn hole_origin_adds_the_rectangle() {
        let surface = flat()
            .with_trim_loops(vec![PolygonBoundary::new(vec![
                Point2::new(0.25, 0.25),
                Point2::new(0.75, 0.25),
                Point2::new(0.5, 0.75),
            ])])
            .with_hole_origin(true);
        let loops = assemble_boundary(&surface, &TessellationOptions::default());
        assert_eq!(loops.len(), 2);
        assert_eq!(loops[1], unit_rectangle());
    }

    #[test]
    fn compression_snaps_to_anchors() {
        let mut loops = vec![vec![
            Point2::new(0.5 + 1e-12, 0.),
            Point2::new(1., 1e-13),
            Point2::new(1., 1.),
            Point2::new(0.5 - 1e-12, 1.),
        ]];
        compress_coordinates(&mut loops, &[0., 0.5, 1.], &[0., 1.], 1e-10);
        assert_eq!(loops[0][0], Point2::new(0.5, 0.));
        assert_eq!(loops[0][1], Point2::new(1., 0.));
        assert_eq!(loops[0][3], Point2::new(0.5, 1.));
    }
}
