use std::cmp::Ordering;

use nalgebra::Point2;

use crate::{
    misc::{scalar, scalar_from_usize, FloatingPoint},
    tolerance::{curve_steps, GridCounts},
};

use super::{chain_u_at, MonotoneDecomposition, MonotoneRegion, PatchLayout};

/// Left or right side of a piece, densified and running upward.
/// `locked[k]` marks segment `k` as carrying a fixed lattice that must not be split.
#[derive(Clone, Debug, PartialEq)]
pub struct PieceSide<T: FloatingPoint> {
    pub points: Vec<Point2<T>>,
    pub locked: Vec<bool>,
}

impl<T: FloatingPoint> PieceSide<T> {
    pub fn first(&self) -> Point2<T> {
        self.points[0]
    }

    pub fn last(&self) -> Point2<T> {
        self.points[self.points.len() - 1]
    }

    /// Every point shares one U
    pub fn is_vertical(&self) -> bool {
        let x = self.first().x;
        self.points.iter().all(|p| p.x == x)
    }
}

/// Part of a monotone region inside a single Bezier patch, with densified edges
#[derive(Clone, Debug, PartialEq)]
pub struct Piece<T: FloatingPoint> {
    /// index of the patch in the row-major patch list
    pub patch: usize,
    /// bottom edge from the left side to the right side
    pub bottom: Vec<Point2<T>>,
    /// top edge from the left side to the right side
    pub top: Vec<Point2<T>>,
    pub left: PieceSide<T>,
    pub right: PieceSide<T>,
}

impl<T: FloatingPoint> Piece<T> {
    pub fn y0(&self) -> T {
        self.left.first().y
    }

    pub fn y1(&self) -> T {
        self.left.last().y
    }

    /// Both sides are straight vertical lines
    pub fn is_rectangle(&self) -> bool {
        self.left.is_vertical() && self.right.is_vertical()
    }

    /// Counter-clockwise outline without repeated points
    pub fn polygon(&self) -> Vec<Point2<T>> {
        let mut outline = self.bottom.clone();
        outline.extend(self.right.points.iter().skip(1));
        outline.extend(self.top.iter().rev().skip(1));
        outline.extend(self.left.points.iter().rev().skip(1));
        outline.dedup();
        while outline.len() > 1 && outline.first() == outline.last() {
            outline.pop();
        }
        outline
    }
}

/// Boundary of a piece before densification
enum RawSide<'a, T: FloatingPoint> {
    Chain(&'a [Point2<T>]),
    KnotLine(T),
}

/// Sorted values merged, dropping any closer than `tolerance` to a value already kept or to the ends
fn merge_between<T: FloatingPoint>(a: T, b: T, values: impl Iterator<Item = T>, tolerance: T) -> Vec<T> {
    let mut inner: Vec<T> = values
        .filter(|x| *x > a + tolerance && *x < b - tolerance)
        .collect();
    inner.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
    inner.dedup_by(|x, y| *x - *y <= tolerance);
    let mut all = Vec::with_capacity(inner.len() + 2);
    all.push(a);
    all.extend(inner);
    all.push(b);
    all
}

/// Points along the level `y` from `a` to `b`: the patch lattice of that line plus every
/// boundary crossing of the level
fn densify_level<T: FloatingPoint>(
    a: &Point2<T>,
    b: &Point2<T>,
    y: T,
    counts: &GridCounts<T>,
    crossings: &[T],
    tolerance: T,
) -> Vec<Point2<T>> {
    if a == b {
        return vec![*a];
    }
    let lattice = counts.u_lattice_at(y, tolerance);
    let xs = merge_between(a.x, b.x, lattice.into_iter().chain(crossings.iter().cloned()), tolerance);
    let n = xs.len();
    xs.into_iter()
        .enumerate()
        .map(|(i, x)| {
            if i == 0 {
                *a
            } else if i + 1 == n {
                *b
            } else {
                Point2::new(x, y)
            }
        })
        .collect()
}

/// Vertical knot line at `u` between two levels, on the lattice of that patch edge
fn densify_knot_line<T: FloatingPoint>(u: T, y0: T, y1: T, counts: &GridCounts<T>, tolerance: T) -> PieceSide<T> {
    let ys = merge_between(y0, y1, counts.v_lattice_at(u, tolerance).into_iter(), tolerance);
    let points: Vec<_> = ys.into_iter().map(|y| Point2::new(u, y)).collect();
    let locked = vec![true; points.len().saturating_sub(1)];
    PieceSide { points, locked }
}

/// Densify a boundary chain: segments on a patch edge follow the edge lattice,
/// any other segment is split evenly by its curve step count
fn densify_chain<T: FloatingPoint>(chain: &[Point2<T>], counts: &GridCounts<T>, tolerance: T) -> PieceSide<T> {
    let mut points = vec![chain[0]];
    let mut locked = vec![];
    for w in chain.windows(2) {
        let (p, q) = (&w[0], &w[1]);
        let on_edge = p.x == q.x
            && ((p.x - counts.u.range.0).abs() <= tolerance || (p.x - counts.u.range.1).abs() <= tolerance);
        if on_edge {
            let ys = merge_between(p.y, q.y, counts.v_lattice_at(p.x, tolerance).into_iter(), tolerance);
            let n = ys.len();
            for y in ys.into_iter().skip(1).take(n - 2) {
                points.push(Point2::new(p.x, y));
                locked.push(true);
            }
            points.push(*q);
            locked.push(true);
        } else {
            let steps = curve_steps(counts, p, q, tolerance);
            let div = scalar_from_usize::<T>(steps);
            for k in 1..steps {
                let t = scalar_from_usize::<T>(k) / div;
                points.push(p + (q - p) * t);
                locked.push(false);
            }
            points.push(*q);
            locked.push(false);
        }
    }
    PieceSide { points, locked }
}

fn densify_side<T: FloatingPoint>(
    side: &RawSide<'_, T>,
    y0: T,
    y1: T,
    counts: &GridCounts<T>,
    tolerance: T,
) -> PieceSide<T> {
    match side {
        RawSide::Chain(chain) => densify_chain(chain, counts, tolerance),
        RawSide::KnotLine(u) => densify_knot_line(*u, y0, y1, counts, tolerance),
    }
}

/// Cut a monotone region along the knot columns it spans and densify every piece.
/// Null patches are skipped.
pub fn split_region<T: FloatingPoint>(
    region: &MonotoneRegion<T>,
    decomposition: &MonotoneDecomposition<T>,
    layout: &PatchLayout<T>,
    counts: &[GridCounts<T>],
    tolerance: T,
) -> anyhow::Result<Vec<Piece<T>>> {
    let band = region.band;
    anyhow::ensure!(band + 1 < decomposition.levels.len(), "band {} is out of range", band);
    let (y0, y1) = (decomposition.levels[band], decomposition.levels[band + 1]);
    let mid = (y0 + y1) * scalar(0.5);
    let row = layout.row_of(mid, tolerance);

    let first = layout.column_of(chain_u_at(&region.left, mid), tolerance, true);
    let last = layout.column_of(chain_u_at(&region.right, mid), tolerance, false);
    if first > last {
        log::debug!("region in band {} has no width", band);
        return Ok(vec![]);
    }

    let breaks = layout.u_breaks();
    let mut pieces = vec![];
    for column in first..=last {
        let patch = layout.patch_index(column, row);
        let counts = counts
            .get(patch)
            .ok_or_else(|| anyhow::anyhow!("no step counts for patch {}", patch))?;
        if counts.null {
            log::debug!("skipping null patch {}", patch);
            continue;
        }

        let left = if column == first {
            RawSide::Chain(&region.left)
        } else {
            RawSide::KnotLine(breaks[column])
        };
        let right = if column == last {
            RawSide::Chain(&region.right)
        } else {
            RawSide::KnotLine(breaks[column + 1])
        };
        let left = densify_side(&left, y0, y1, counts, tolerance);
        let right = densify_side(&right, y0, y1, counts, tolerance);
        anyhow::ensure!(
            left.first().x <= right.first().x + tolerance && left.last().x <= right.last().x + tolerance,
            "sides of the piece in patch {} cross",
            patch
        );

        let bottom = densify_level(
            &left.first(),
            &right.first(),
            y0,
            counts,
            &decomposition.crossings[band],
            tolerance,
        );
        let top = densify_level(
            &left.last(),
            &right.last(),
            y1,
            counts,
            &decomposition.crossings[band + 1],
            tolerance,
        );
        pieces.push(Piece {
            patch,
            bottom,
            top,
            left,
            right,
        });
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use crate::{
        surface::{NurbsSurface, SurfaceDirection},
        tessellation::{decompose, unit_rectangle},
        tolerance::DirectionCounts,
    };

    use super::*;

    fn layout() -> PatchLayout<f64> {
        let u = SurfaceDirection::clamped(2, 3).unwrap();
        let v = SurfaceDirection::clamped(2, 2).unwrap();
        let points = (0..2)
            .flat_map(|j| (0..3).map(move |i| Point3::new(i as f64, j as f64, 0.)))
            .collect();
        PatchLayout::new(&NurbsSurface::try_new(u, v, points, None).unwrap())
    }

    fn counts(u_range: (f64, f64), interior: usize, edge: usize) -> GridCounts<f64> {
        GridCounts {
            u: DirectionCounts {
                interior,
                low: edge,
                high: edge,
                range: u_range,
            },
            v: DirectionCounts {
                interior,
                low: edge,
                high: edge,
                range: (0., 1.),
            },
            null: false,
        }
    }

    #[test]
    fn shared_knot_line_matches_on_both_sides() {
        let layout = layout();
        let all = vec![counts((0., 0.5), 3, 4), counts((0.5, 1.), 2, 4)];
        let decomposition = decompose(&[unit_rectangle()], &layout, 1e-10);
        assert_eq!(decomposition.regions.len(), 1);
        let pieces = split_region(&decomposition.regions[0], &decomposition, &layout, &all, 1e-10).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].right.points, pieces[1].left.points);
        assert_eq!(pieces[0].right.points.len(), 5);
        assert!(pieces[0].is_rectangle());
        // bottom edge follows the low edge lattice
        assert_eq!(pieces[0].bottom.len(), 5);
        assert_eq!(pieces[1].bottom.first(), pieces[0].bottom.last());
    }

    #[test]
    fn sloped_chain_is_split_by_curve_steps() {
        let c = counts((0., 1.), 4, 4);
        let side = densify_chain(&[Point2::new(0.1, 0.), Point2::new(0.6, 1.)], &c, 1e-10);
        // max of 4 * 0.5 and 4 * 1
        assert_eq!(side.points.len(), 5);
        assert!(side.locked.iter().all(|l| !l));
        approx::assert_relative_eq!(side.points[2].x, 0.35, epsilon = 1e-12);
    }

    #[test]
    fn level_points_include_crossings() {
        let c = counts((0., 1.), 4, 2);
        let points = densify_level(&Point2::new(0.1, 0.5), &Point2::new(0.9, 0.5), 0.5, &c, &[0.3, 0.5], 1e-10);
        let xs: Vec<_> = points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.1, 0.25, 0.3, 0.5, 0.75, 0.9]);
    }
}
