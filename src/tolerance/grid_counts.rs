use nalgebra::Point2;

use crate::misc::{integerize_step_count, scalar_from_usize, FloatingPoint};

/// Subdivision steps along one parametric direction of a patch.
/// `low` applies on the patch edge at the start of the other direction, `high` on the edge at its end.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DirectionCounts<T: FloatingPoint> {
    pub interior: usize,
    pub low: usize,
    pub high: usize,
    /// parameter fraction range of the patch along this direction
    pub range: (T, T),
}

impl<T: FloatingPoint> DirectionCounts<T> {
    pub fn uniform(steps: usize, range: (T, T)) -> Self {
        Self {
            interior: steps,
            low: steps,
            high: steps,
            range,
        }
    }

    pub fn max(&self) -> usize {
        self.interior.max(self.low).max(self.high)
    }

    pub fn width(&self) -> T {
        self.range.1 - self.range.0
    }

    /// Fractions of `steps` equal subdivisions of the range, both ends included
    pub fn lattice(&self, steps: usize) -> Vec<T> {
        let steps = steps.max(1);
        let div = scalar_from_usize::<T>(steps);
        (0..=steps)
            .map(|k| {
                if k == steps {
                    self.range.1
                } else {
                    self.range.0 + self.width() * scalar_from_usize::<T>(k) / div
                }
            })
            .collect()
    }
}

/// Step counts of one patch in both directions
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridCounts<T: FloatingPoint> {
    pub u: DirectionCounts<T>,
    pub v: DirectionCounts<T>,
    /// the patch is degenerate and produces no facets
    pub null: bool,
}

impl<T: FloatingPoint> GridCounts<T> {
    /// Steps along U on the horizontal line at fraction `v`
    pub fn u_steps_at(&self, v: T, tolerance: T) -> usize {
        if (v - self.v.range.0).abs() <= tolerance {
            self.u.low
        } else if (v - self.v.range.1).abs() <= tolerance {
            self.u.high
        } else {
            self.u.interior
        }
    }

    /// Steps along V on the vertical line at fraction `u`
    pub fn v_steps_at(&self, u: T, tolerance: T) -> usize {
        if (u - self.u.range.0).abs() <= tolerance {
            self.v.low
        } else if (u - self.u.range.1).abs() <= tolerance {
            self.v.high
        } else {
            self.v.interior
        }
    }

    /// U lattice used on the horizontal line at fraction `v`
    pub fn u_lattice_at(&self, v: T, tolerance: T) -> Vec<T> {
        self.u.lattice(self.u_steps_at(v, tolerance))
    }

    /// V lattice used on the vertical line at fraction `u`
    pub fn v_lattice_at(&self, u: T, tolerance: T) -> Vec<T> {
        self.v.lattice(self.v_steps_at(u, tolerance))
    }
}

/// Number of steps for a boundary segment from `a` to `b` (parameter fractions) inside the patch.
/// A segment on a patch edge follows that edge's count, an axis-parallel interior segment the
/// interior count, and a sloped one the larger of both interior counts, each scaled by the
/// fraction of the patch the segment covers.
pub fn curve_steps<T: FloatingPoint>(counts: &GridCounts<T>, a: &Point2<T>, b: &Point2<T>, tolerance: T) -> usize {
    let du = (b.x - a.x).abs();
    let dv = (b.y - a.y).abs();
    let ru = if counts.u.width() > T::zero() {
        du / counts.u.width()
    } else {
        T::zero()
    };
    let rv = if counts.v.width() > T::zero() {
        dv / counts.v.width()
    } else {
        T::zero()
    };

    let steps = if dv <= tolerance {
        scalar_from_usize::<T>(counts.u_steps_at((a.y + b.y) / (T::one() + T::one()), tolerance)) * ru
    } else if du <= tolerance {
        scalar_from_usize::<T>(counts.v_steps_at((a.x + b.x) / (T::one() + T::one()), tolerance)) * rv
    } else {
        let along_u = scalar_from_usize::<T>(counts.u.interior) * ru;
        let along_v = scalar_from_usize::<T>(counts.v.interior) * rv;
        along_u.max(along_v)
    };
    integerize_step_count(steps)
}

/// Make every shared patch edge use the same step count on both sides.
/// `counts` is row-major with `num_u` patches per row. A boundary in an open direction uses the
/// patch itself as its neighbor; null patches are skipped when looking for a neighbor.
pub fn reconcile_neighbor_counts<T: FloatingPoint>(
    counts: &mut [GridCounts<T>],
    num_u: usize,
    num_v: usize,
    closed_u: bool,
    closed_v: bool,
) {
    if counts.len() != num_u * num_v {
        log::warn!(
            "count grid holds {} patches, expected {}",
            counts.len(),
            num_u * num_v
        );
        return;
    }
    let snapshot = counts.to_vec();

    let neighbor = |i: usize, j: usize, di: isize, dj: isize| -> (usize, usize) {
        let (mut ni, mut nj) = (i as isize, j as isize);
        for _ in 0..num_u.max(num_v) {
            ni += di;
            nj += dj;
            if ni < 0 || ni >= num_u as isize {
                if !closed_u {
                    return (i, j);
                }
                ni = ni.rem_euclid(num_u as isize);
            }
            if nj < 0 || nj >= num_v as isize {
                if !closed_v {
                    return (i, j);
                }
                nj = nj.rem_euclid(num_v as isize);
            }
            let (ui, uj) = (ni as usize, nj as usize);
            if (ui, uj) == (i, j) || !snapshot[uj * num_u + ui].null {
                return (ui, uj);
            }
        }
        (i, j)
    };

    for j in 0..num_v {
        for i in 0..num_u {
            let me = &snapshot[j * num_u + i];
            if me.null {
                continue;
            }
            let (bi, bj) = neighbor(i, j, 0, -1);
            let (ti, tj) = neighbor(i, j, 0, 1);
            let (li, lj) = neighbor(i, j, -1, 0);
            let (ri, rj) = neighbor(i, j, 1, 0);
            let below = &snapshot[bj * num_u + bi];
            let above = &snapshot[tj * num_u + ti];
            let left = &snapshot[lj * num_u + li];
            let right = &snapshot[rj * num_u + ri];

            let target = &mut counts[j * num_u + i];
            target.u.low = me.u.interior.max(me.u.low).max(below.u.interior).max(below.u.high);
            target.u.high = me.u.interior.max(me.u.high).max(above.u.interior).max(above.u.low);
            target.v.low = me.v.interior.max(me.v.low).max(left.v.interior).max(left.v.high);
            target.v.high = me.v.interior.max(me.v.high).max(right.v.interior).max(right.v.low);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(u: (usize, usize, usize), v: (usize, usize, usize)) -> GridCounts<f64> {
        GridCounts {
            u: DirectionCounts {
                interior: u.0,
                low: u.1,
                high: u.2,
                range: (0., 1.),
            },
            v: DirectionCounts {
                interior: v.0,
                low: v.1,
                high: v.2,
                range: (0., 1.),
            },
            null: false,
        }
    }

    #[test]
    fn shared_edges_agree() {
        let mut grid = vec![
            counts((3, 5, 2), (4, 1, 1)),
            counts((7, 1, 1), (2, 6, 3)),
            counts((2, 2, 9), (1, 1, 1)),
            counts((4, 4, 4), (5, 2, 8)),
        ];
        reconcile_neighbor_counts(&mut grid, 2, 2, false, false);
        // horizontal neighbors share the v counts on their common edge
        assert_eq!(grid[0].v.high, grid[1].v.low);
        assert_eq!(grid[2].v.high, grid[3].v.low);
        // vertical neighbors share the u counts
        assert_eq!(grid[0].u.high, grid[2].u.low);
        assert_eq!(grid[1].u.high, grid[3].u.low);
        // open fringes fall back on the patch itself
        assert_eq!(grid[0].u.low, 5);
        assert_eq!(grid[0].v.low, 4);
    }

    #[test]
    fn closed_direction_wraps() {
        let mut grid = vec![counts((1, 1, 1), (2, 2, 2)), counts((1, 1, 1), (6, 3, 3))];
        reconcile_neighbor_counts(&mut grid, 2, 1, true, false);
        assert_eq!(grid[0].v.low, grid[1].v.high);
        assert_eq!(grid[0].v.low, 6);
    }

    #[test]
    fn null_patches_are_skipped() {
        let mut grid = vec![
            counts((1, 1, 1), (2, 2, 2)),
            counts((1, 1, 1), (1, 1, 1)),
            counts((1, 1, 1), (9, 9, 9)),
        ];
        grid[1].null = true;
        reconcile_neighbor_counts(&mut grid, 3, 1, false, false);
        assert_eq!(grid[0].v.high, 9);
        assert_eq!(grid[2].v.low, 9);
    }

    #[test]
    fn segment_steps() {
        let c = GridCounts {
            u: DirectionCounts {
                interior: 8,
                low: 10,
                high: 4,
                range: (0., 0.5),
            },
            v: DirectionCounts::uniform(6, (0., 1.)),
            null: false,
        };
        let tol = 1e-10;
        // along the low edge, half the patch width
        assert_eq!(curve_steps(&c, &Point2::new(0., 0.), &Point2::new(0.25, 0.), tol), 5);
        // interior horizontal
        assert_eq!(curve_steps(&c, &Point2::new(0., 0.5), &Point2::new(0.25, 0.5), tol), 4);
        // sloped
        assert_eq!(curve_steps(&c, &Point2::new(0., 0.), &Point2::new(0.5, 0.25), tol), 8);
        // tiny pieces still get a step
        assert_eq!(curve_steps(&c, &Point2::new(0., 0.5), &Point2::new(0.001, 0.5), tol), 1);
    }
}
