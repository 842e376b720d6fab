use std::cmp::Ordering;

use itertools::Itertools;
use nalgebra::Point2;

use crate::misc::{scalar, FloatingPoint};

use super::{BoundaryLoop, PatchLayout};

/// Part of the region between two consecutive sweep levels, bounded on the left and the right by
/// boundary chains running upward from the lower level to the upper one
#[derive(Clone, Debug, PartialEq)]
pub struct MonotoneRegion<T: FloatingPoint> {
    /// index of the lower level; the region spans `levels[band]..levels[band + 1]`
    pub band: usize,
    pub left: Vec<Point2<T>>,
    pub right: Vec<Point2<T>>,
}

impl<T: FloatingPoint> MonotoneRegion<T> {
    /// Counter-clockwise outline starting at the lower right corner
    pub fn polygon(&self) -> Vec<Point2<T>> {
        let mut outline: Vec<_> = self
            .right
            .iter()
            .chain(self.left.iter().rev())
            .cloned()
            .collect();
        outline.dedup();
        while outline.len() > 1 && outline.first() == outline.last() {
            outline.pop();
        }
        outline
    }
}

/// Monotone regions of a set of boundary loops under the even-odd rule
#[derive(Clone, Debug, Default)]
pub struct MonotoneDecomposition<T: FloatingPoint> {
    /// sweep levels in increasing V
    pub levels: Vec<T>,
    pub regions: Vec<MonotoneRegion<T>>,
    /// U of every boundary chain end per level
    pub crossings: Vec<Vec<T>>,
    /// bands whose chains could not be paired
    pub failed_bands: usize,
}

/// The boundary turns around in V at vertex `i`
fn is_extremum<T: FloatingPoint>(points: &[Point2<T>], i: usize) -> bool {
    let n = points.len();
    let prev = points[(i + n - 1) % n].y;
    let next = points[(i + 1) % n].y;
    let y = points[i].y;
    !((prev < y && y < next) || (next < y && y < prev))
}

/// Sweep levels: knot rows, boundary extrema, and boundary crossings of knot columns
fn sweep_levels<T: FloatingPoint>(loops: &[BoundaryLoop<T>], layout: &PatchLayout<T>, tolerance: T) -> Vec<T> {
    let mut levels = layout.v_breaks().to_vec();
    let interior_knots = &layout.u_breaks()[1..layout.u_breaks().len().saturating_sub(1)];
    for points in loops.iter() {
        let n = points.len();
        for i in 0..n {
            let p = &points[i];
            if is_extremum(points, i) || layout.u_knot_near(p.x, tolerance).is_some() {
                levels.push(p.y);
            }
            let q = &points[(i + 1) % n];
            let (lo, hi) = if p.x < q.x { (p.x, q.x) } else { (q.x, p.x) };
            for c in interior_knots.iter() {
                if *c > lo + tolerance && *c < hi - tolerance {
                    let t = (*c - p.x) / (q.x - p.x);
                    levels.push(p.y + (q.y - p.y) * t);
                }
            }
        }
    }

    levels
        .into_iter()
        .filter(|y| *y >= T::zero() && *y <= T::one())
        .sorted_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .coalesce(|a, b| {
            if b - a <= tolerance {
                Ok(if layout.is_v_knot(b) { b } else { a })
            } else {
                Err((a, b))
            }
        })
        .collect()
}

/// Point of the edge `p-q` on the level `y`, snapped onto a knot column within tolerance
fn point_at_level<T: FloatingPoint>(
    p: &Point2<T>,
    q: &Point2<T>,
    y: T,
    layout: &PatchLayout<T>,
    tolerance: T,
) -> Point2<T> {
    if (p.y - y).abs() <= tolerance {
        return Point2::new(p.x, y);
    }
    if (q.y - y).abs() <= tolerance {
        return Point2::new(q.x, y);
    }
    let t = (y - p.y) / (q.y - p.y);
    let x = p.x + (q.x - p.x) * t;
    Point2::new(layout.u_knot_near(x, tolerance).unwrap_or(x), y)
}

/// Boundary chains crossing the band `y0..y1`, each running upward
fn band_chains<T: FloatingPoint>(
    loops: &[BoundaryLoop<T>],
    y0: T,
    y1: T,
    layout: &PatchLayout<T>,
    tolerance: T,
) -> Vec<Vec<Point2<T>>> {
    let inside = |y: T| y > y0 + tolerance && y < y1 - tolerance;
    let mut chains = vec![];
    for points in loops.iter() {
        let n = points.len();
        // extrema never lie strictly inside a band, so some vertex does not either
        let Some(start) = (0..n).find(|i| !inside(points[*i].y)) else {
            continue;
        };
        let mut current: Vec<Point2<T>> = vec![];
        for k in 0..n {
            let i = (start + k) % n;
            let (p, q) = (&points[i], &points[(i + 1) % n]);
            let (lo, hi) = if p.y < q.y { (p.y, q.y) } else { (q.y, p.y) };
            let overlaps = lo < y1 - tolerance && hi > y0 + tolerance;
            if !overlaps {
                if current.len() >= 2 {
                    chains.push(std::mem::take(&mut current));
                }
                current.clear();
                continue;
            }
            let (entry_y, exit_y) = if p.y < q.y {
                (lo.max(y0), hi.min(y1))
            } else {
                (hi.min(y1), lo.max(y0))
            };
            let entry = point_at_level(p, q, entry_y, layout, tolerance);
            let exit = point_at_level(p, q, exit_y, layout, tolerance);
            if current.is_empty() || !inside(p.y) {
                if current.len() >= 2 {
                    chains.push(std::mem::take(&mut current));
                }
                current = vec![entry];
            }
            current.push(exit);
        }
        if current.len() >= 2 {
            chains.push(current);
        }
    }

    chains
        .into_iter()
        .map(|mut chain| {
            if chain.first().map(|p| p.y) > chain.last().map(|p| p.y) {
                chain.reverse();
            }
            chain.dedup();
            chain
        })
        .filter(|chain| chain.len() >= 2)
        .collect()
}

/// U of an upward chain at level `y`
pub fn chain_u_at<T: FloatingPoint>(chain: &[Point2<T>], y: T) -> T {
    for w in chain.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        if y >= a.y && y <= b.y {
            if b.y - a.y <= T::zero() {
                return a.x;
            }
            return a.x + (b.x - a.x) * (y - a.y) / (b.y - a.y);
        }
    }
    chain.last().map(|p| p.x).unwrap_or_else(T::zero)
}

/// Split the area enclosed by `loops` under the even-odd rule into regions monotone in V.
/// Regions never straddle a knot row, and their chains never cross a knot column inside a band.
pub fn decompose<T: FloatingPoint>(
    loops: &[BoundaryLoop<T>],
    layout: &PatchLayout<T>,
    tolerance: T,
) -> MonotoneDecomposition<T> {
    let levels = sweep_levels(loops, layout, tolerance);
    let mut crossings = vec![vec![]; levels.len()];
    let mut regions = vec![];
    let mut failed_bands = 0;
    let half = scalar::<T>(0.5);

    for (band, (y0, y1)) in levels.iter().tuple_windows().enumerate() {
        let (y0, y1) = (*y0, *y1);
        let mid = (y0 + y1) * half;
        let chains = band_chains(loops, y0, y1, layout, tolerance)
            .into_iter()
            .map(|c| (chain_u_at(&c, mid), c))
            .sorted_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
            .map(|(_, c)| c)
            .collect_vec();

        for chain in chains.iter() {
            if let (Some(first), Some(last)) = (chain.first(), chain.last()) {
                crossings[band].push(first.x);
                crossings[band + 1].push(last.x);
            }
        }

        if chains.len() % 2 == 1 {
            log::warn!(
                "band [{:?}, {:?}] crosses the boundary {} times, skipping it",
                y0,
                y1,
                chains.len()
            );
            failed_bands += 1;
            continue;
        }

        for (left, right) in chains.into_iter().tuples() {
            regions.push(MonotoneRegion { band, left, right });
        }
    }

    for c in crossings.iter_mut() {
        c.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        c.dedup();
    }

    MonotoneDecomposition {
        levels,
        regions,
        crossings,
        failed_bands,
    }
}
