use std::collections::HashMap;

use nalgebra::{Point2, Vector2};

use crate::{
    misc::{scalar, FloatingPoint},
    tolerance::GridCounts,
};

use super::{triangulate_monotone, zip_chains, Piece, PieceSide};

/// Fraction of a lattice step kept clear between a piece boundary and the interior lattice
const LATTICE_MARGIN: f64 = 0.25;

/// Tensor-product grid in parameter fractions
#[derive(Clone, Debug, PartialEq)]
pub struct ParamGrid<T: FloatingPoint> {
    pub us: Vec<T>,
    pub vs: Vec<T>,
}

/// Parameter-space mesh of one piece: quad grids plus loose triangles over `points`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PieceMesh<T: FloatingPoint> {
    pub grids: Vec<ParamGrid<T>>,
    pub points: Vec<Point2<T>>,
    /// counter-clockwise index triples into `points`
    pub triangles: Vec<[usize; 3]>,
}

impl<T: FloatingPoint> PieceMesh<T> {
    /// Sum of the parameter-space areas of every facet
    pub fn area(&self) -> T {
        let half = scalar::<T>(0.5);
        let grids = self.grids.iter().fold(T::zero(), |acc, g| {
            match (g.us.first(), g.us.last(), g.vs.first(), g.vs.last()) {
                (Some(u0), Some(u1), Some(v0), Some(v1)) => acc + (*u1 - *u0) * (*v1 - *v0),
                _ => acc,
            }
        });
        self.triangles.iter().fold(grids, |acc, [a, b, c]| {
            let (a, b, c) = (&self.points[*a], &self.points[*b], &self.points[*c]);
            acc + ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)) * half
        })
    }
}

/// Deduplicating vertex store keyed by the exact coordinates
#[derive(Debug, Default)]
pub struct PointPool<T: FloatingPoint> {
    points: Vec<Point2<T>>,
    index: HashMap<(u64, u64), usize>,
}

impl<T: FloatingPoint> PointPool<T> {
    pub fn new() -> Self {
        Self {
            points: vec![],
            index: HashMap::new(),
        }
    }

    pub fn insert(&mut self, p: &Point2<T>) -> usize {
        let key = (
            p.x.to_f64().unwrap_or(f64::NAN).to_bits(),
            p.y.to_f64().unwrap_or(f64::NAN).to_bits(),
        );
        if let Some(i) = self.index.get(&key) {
            return *i;
        }
        let i = self.points.len();
        self.points.push(*p);
        self.index.insert(key, i);
        i
    }

    pub fn insert_all(&mut self, points: &[Point2<T>]) -> Vec<usize> {
        points.iter().map(|p| self.insert(p)).collect()
    }

    pub fn points(&self) -> &[Point2<T>] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point2<T>> {
        self.points
    }
}

/// Interior lattice values strictly inside `a..b`, keeping a margin from both ends
pub fn interior_lattice<T: FloatingPoint>(lattice: &[T], a: T, b: T) -> Vec<T> {
    if lattice.len() < 2 {
        return vec![];
    }
    let step = lattice[1] - lattice[0];
    let margin = step * scalar(LATTICE_MARGIN);
    lattice
        .iter()
        .filter(|x| **x > a + margin && **x < b - margin)
        .cloned()
        .collect()
}

fn same_values<T: FloatingPoint>(values: impl ExactSizeIterator<Item = T>, expected: &[T], tolerance: T) -> bool {
    values.len() == expected.len() && values.zip(expected.iter()).all(|(x, e)| (x - *e).abs() <= tolerance)
}

/// Signature shared by the polygon triangulators
pub type Triangulator<T> = fn(&[Point2<T>]) -> anyhow::Result<Vec<[usize; 3]>>;

/// Triangulate a counter-clockwise outline into the pool, skipping outlines that collapsed
pub fn triangulate_outline<T: FloatingPoint>(
    pool: &mut PointPool<T>,
    outline: &[Point2<T>],
    triangulate: Triangulator<T>,
    triangles: &mut Vec<[usize; 3]>,
) -> anyhow::Result<()> {
    let mut outline = outline.to_vec();
    outline.dedup();
    while outline.len() > 1 && outline.first() == outline.last() {
        outline.pop();
    }
    if outline.len() < 3 || crate::misc::signed_area(&outline) <= T::zero() {
        return Ok(());
    }
    let local = triangulate(&outline)?;
    let ids = pool.insert_all(&outline);
    triangles.extend(local.into_iter().map(|[a, b, c]| [ids[a], ids[b], ids[c]]));
    Ok(())
}

/// Mesh a rectangular piece: a single grid when every edge runs on the interior lattice,
/// otherwise an inner grid ringed by four strips zipped onto the densified edges
pub fn mesh_rectangle<T: FloatingPoint>(
    piece: &Piece<T>,
    counts: &GridCounts<T>,
    scale: &Vector2<T>,
    tolerance: T,
) -> anyhow::Result<PieceMesh<T>> {
    let (u0, u1) = (piece.left.first().x, piece.right.first().x);
    let (v0, v1) = (piece.y0(), piece.y1());
    let u_lattice = counts.u.lattice(counts.u.interior);
    let v_lattice = counts.v.lattice(counts.v.interior);

    let us: Vec<T> = u_lattice
        .iter()
        .filter(|x| **x >= u0 - tolerance && **x <= u1 + tolerance)
        .cloned()
        .collect();
    let vs: Vec<T> = v_lattice
        .iter()
        .filter(|y| **y >= v0 - tolerance && **y <= v1 + tolerance)
        .cloned()
        .collect();
    let aligned = us.len() >= 2
        && vs.len() >= 2
        && same_values(piece.bottom.iter().map(|p| p.x), &us, tolerance)
        && same_values(piece.top.iter().map(|p| p.x), &us, tolerance)
        && same_values(piece.left.points.iter().map(|p| p.y), &vs, tolerance)
        && same_values(piece.right.points.iter().map(|p| p.y), &vs, tolerance);
    if aligned {
        return Ok(PieceMesh {
            grids: vec![ParamGrid {
                us: piece.bottom.iter().map(|p| p.x).collect(),
                vs: piece.left.points.iter().map(|p| p.y).collect(),
            }],
            points: vec![],
            triangles: vec![],
        });
    }

    let inner_us = interior_lattice(&u_lattice, u0, u1);
    let inner_vs = interior_lattice(&v_lattice, v0, v1);
    let mut pool = PointPool::new();
    let mut mesh = PieceMesh::default();

    if inner_us.is_empty() || inner_vs.is_empty() {
        triangulate_outline(&mut pool, &piece.polygon(), triangulate_monotone, &mut mesh.triangles)?;
        mesh.points = pool.into_points();
        return Ok(mesh);
    }

    let bottom = pool.insert_all(&piece.bottom);
    let right = pool.insert_all(&piece.right.points);
    let top: Vec<_> = pool.insert_all(&piece.top).into_iter().rev().collect();
    let left: Vec<_> = pool.insert_all(&piece.left.points).into_iter().rev().collect();

    let (nu, nv) = (inner_us.len(), inner_vs.len());
    let mut inner = Vec::with_capacity(nu * nv);
    for v in inner_vs.iter() {
        for u in inner_us.iter() {
            inner.push(pool.insert(&Point2::new(*u, *v)));
        }
    }
    let at = |i: usize, j: usize| inner[j * nu + i];
    let inner_bottom: Vec<_> = (0..nu).map(|i| at(i, 0)).collect();
    let inner_right: Vec<_> = (0..nv).map(|j| at(nu - 1, j)).collect();
    let inner_top: Vec<_> = (0..nu).rev().map(|i| at(i, nv - 1)).collect();
    let inner_left: Vec<_> = (0..nv).rev().map(|j| at(0, j)).collect();

    if nu >= 2 && nv >= 2 {
        mesh.grids.push(ParamGrid {
            us: inner_us,
            vs: inner_vs,
        });
    }
    let points = pool.points();
    for (outer, inner) in [
        (&bottom, &inner_bottom),
        (&right, &inner_right),
        (&top, &inner_top),
        (&left, &inner_left),
    ] {
        mesh.triangles.extend(zip_chains(points, outer, inner, scale));
    }
    mesh.points = pool.into_points();
    Ok(mesh)
}

/// Node of a side at level `y`: an existing node within tolerance, or a new point on an
/// unlocked segment. `None` when the level only meets a locked segment between nodes.
fn side_node<T: FloatingPoint>(side: &PieceSide<T>, y: T, tolerance: T) -> Option<(usize, Point2<T>, bool)> {
    for (k, w) in side.points.windows(2).enumerate() {
        let (a, b) = (&w[0], &w[1]);
        if (a.y - y).abs() <= tolerance {
            return Some((k, *a, false));
        }
        if (b.y - y).abs() <= tolerance {
            return Some((k + 1, *b, false));
        }
        if y > a.y && y < b.y {
            if side.locked[k] {
                return None;
            }
            let t = (y - a.y) / (b.y - a.y);
            return Some((k, a + (b - a) * t, true));
        }
    }
    None
}

/// Side with the accepted row nodes inserted, and the node index of every row
fn insert_row_nodes<T: FloatingPoint>(side: &PieceSide<T>, nodes: &[(usize, Point2<T>, bool)]) -> (Vec<Point2<T>>, Vec<usize>) {
    let mut points = vec![];
    let mut indices = vec![];
    let mut next = 0;
    for (k, p) in side.points.iter().enumerate() {
        points.push(*p);
        while next < nodes.len() && nodes[next].0 == k {
            let (_, q, inserted) = nodes[next];
            if inserted {
                points.push(q);
            }
            indices.push(points.len() - 1);
            next += 1;
        }
    }
    (points, indices)
}

/// Longest run of consecutive interior lattice columns sitting at consecutive interior positions
/// of both rows, as `(lower start, upper start, column count)`.
/// Columns must lie within `clear`, the span left free by the side chains between the rows.
fn aligned_run<T: FloatingPoint>(
    lower: &[Point2<T>],
    upper: &[Point2<T>],
    lattice: &[T],
    clear: (T, T),
    tolerance: T,
) -> Option<(usize, usize, usize)> {
    let column = |x: T| lattice.iter().position(|l| (x - *l).abs() <= tolerance);
    let inside = |x: T| x >= clear.0 && x <= clear.1;
    let mut best: Option<(usize, usize, usize)> = None;
    for p in 1..lower.len().saturating_sub(1) {
        if !inside(lower[p].x) {
            continue;
        }
        let Some(k) = column(lower[p].x) else {
            continue;
        };
        let Some(q) = (1..upper.len().saturating_sub(1)).find(|q| upper[*q].x == lower[p].x) else {
            continue;
        };
        let mut len = 1;
        while p + len + 1 < lower.len()
            && q + len + 1 < upper.len()
            && lower[p + len].x == upper[q + len].x
            && inside(lower[p + len].x)
            && column(lower[p + len].x) == Some(k + len)
        {
            len += 1;
        }
        if len >= 2 && best.map_or(true, |(_, _, l)| len > l) {
            best = Some((p, q, len));
        }
    }
    best
}

fn chain_interior<T: FloatingPoint>(chain: &[Point2<T>]) -> impl Iterator<Item = &Point2<T>> {
    chain.iter().skip(1).take(chain.len().saturating_sub(2))
}

/// A piece cut along interior lattice rows.
/// Every level holds its points from left to right and the index of its end node on each side.
pub struct Slices<T: FloatingPoint> {
    pub left: Vec<Point2<T>>,
    pub right: Vec<Point2<T>>,
    pub levels: Vec<(Vec<Point2<T>>, usize, usize)>,
}

impl<T: FloatingPoint> Slices<T> {
    /// Counter-clockwise outline of the band between levels `k` and `k + 1`
    pub fn band_outline(&self, k: usize) -> Vec<Point2<T>> {
        let ((lower, l0, r0), (upper, l1, r1)) = (&self.levels[k], &self.levels[k + 1]);
        let mut outline = lower.clone();
        outline.extend(self.right[*r0..=*r1].iter().skip(1));
        outline.extend(upper.iter().rev().skip(1));
        outline.extend(self.left[*l0..=*l1].iter().rev().skip(1));
        outline
    }
}

/// Cut a piece along the interior lattice rows meeting both sides at a node or an unlocked segment
pub fn slice_piece<T: FloatingPoint>(piece: &Piece<T>, counts: &GridCounts<T>, tolerance: T) -> Slices<T> {
    let (y0, y1) = (piece.y0(), piece.y1());
    let u_lattice = counts.u.lattice(counts.u.interior);
    let v_lattice = counts.v.lattice(counts.v.interior);

    let mut left_nodes = vec![];
    let mut right_nodes = vec![];
    let mut rows = vec![];
    for y in interior_lattice(&v_lattice, y0, y1) {
        let (Some(l), Some(r)) = (
            side_node(&piece.left, y, tolerance),
            side_node(&piece.right, y, tolerance),
        ) else {
            continue;
        };
        if l.1.x >= r.1.x - tolerance {
            continue;
        }
        left_nodes.push(l);
        right_nodes.push(r);
        rows.push(y);
    }
    let (left, left_at) = insert_row_nodes(&piece.left, &left_nodes);
    let (right, right_at) = insert_row_nodes(&piece.right, &right_nodes);

    let mut levels = vec![(piece.bottom.clone(), 0, 0)];
    for (r, y) in rows.iter().enumerate() {
        let (a, b) = (left[left_at[r]], right[right_at[r]]);
        let mut row = vec![a];
        row.extend(interior_lattice(&u_lattice, a.x, b.x).into_iter().map(|u| Point2::new(u, *y)));
        row.push(b);
        levels.push((row, left_at[r], right_at[r]));
    }
    levels.push((piece.top.clone(), left.len() - 1, right.len() - 1));
    Slices { left, right, levels }
}

/// Mesh a non-rectangular piece by slicing it along interior lattice rows.
/// Each slice contributes a grid over its longest lattice-aligned column run, the rest of the
/// slice is triangulated as monotone polygons.
pub fn mesh_sliced<T: FloatingPoint>(
    piece: &Piece<T>,
    counts: &GridCounts<T>,
    tolerance: T,
) -> anyhow::Result<PieceMesh<T>> {
    let u_lattice = counts.u.lattice(counts.u.interior);
    let slices = slice_piece(piece, counts, tolerance);

    let mut pool = PointPool::new();
    let mut mesh = PieceMesh::default();
    for k in 0..slices.levels.len() - 1 {
        let ((lower, l0, r0), (upper, l1, r1)) = (&slices.levels[k], &slices.levels[k + 1]);
        let left_up = &slices.left[*l0..=*l1];
        let right_up = &slices.right[*r0..=*r1];

        // the chains may bend inwards between the rows
        let clear = (
            chain_interior(left_up).fold(lower[0].x, |a, p| a.max(p.x)),
            chain_interior(right_up).fold(lower[lower.len() - 1].x, |a, p| a.min(p.x)),
        );
        let run = aligned_run(lower, upper, &u_lattice, clear, tolerance);
        match run {
            Some((p, q, len)) => {
                let us: Vec<T> = lower[p..p + len].iter().map(|pt| pt.x).collect();
                let (v_lo, v_hi) = (lower[p].y, upper[q].y);
                let merged = match mesh.grids.last_mut() {
                    Some(g) if g.us == us && g.vs.last() == Some(&v_lo) => {
                        g.vs.push(v_hi);
                        true
                    }
                    _ => false,
                };
                if !merged {
                    mesh.grids.push(ParamGrid {
                        us,
                        vs: vec![v_lo, v_hi],
                    });
                }

                // left of the run
                let mut outline: Vec<_> = lower[..=p].to_vec();
                outline.extend(upper[..=q].iter().rev());
                outline.extend(left_up.iter().rev().skip(1));
                triangulate_outline(&mut pool, &outline, triangulate_monotone, &mut mesh.triangles)?;

                // right of the run
                let mut outline: Vec<_> = lower[p + len - 1..].to_vec();
                outline.extend(right_up.iter().skip(1));
                outline.extend(upper[q + len - 1..].iter().rev().skip(1));
                triangulate_outline(&mut pool, &outline, triangulate_monotone, &mut mesh.triangles)?;
            }
            None => {
                let outline = slices.band_outline(k);
                triangulate_outline(&mut pool, &outline, triangulate_monotone, &mut mesh.triangles)?;
            }
        }
    }
    mesh.points = pool.into_points();
    Ok(mesh)
}

/// Mesh a piece the patch-monotone way
pub fn mesh_piece<T: FloatingPoint>(
    piece: &Piece<T>,
    counts: &GridCounts<T>,
    scale: &Vector2<T>,
    tolerance: T,
) -> anyhow::Result<PieceMesh<T>> {
    if piece.is_rectangle() {
        mesh_rectangle(piece, counts, scale, tolerance)
    } else {
        mesh_sliced(piece, counts, tolerance)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::tolerance::DirectionCounts;

    use super::*;

    fn counts(interior: usize, edge: usize) -> GridCounts<f64> {
        GridCounts {
            u: DirectionCounts {
                interior,
                low: edge,
                high: edge,
                range: (0., 1.),
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

    fn side(points: Vec<Point2<f64>>, locked: bool) -> PieceSide<f64> {
        let n = points.len() - 1;
        PieceSide {
            points,
            locked: vec![locked; n],
        }
    }

    fn line(a: Point2<f64>, b: Point2<f64>, n: usize) -> Vec<Point2<f64>> {
        (0..=n).map(|k| a + (b - a) * (k as f64 / n as f64)).collect()
    }

    fn unit_piece(edge: usize) -> Piece<f64> {
        Piece {
            patch: 0,
            bottom: line(Point2::new(0., 0.), Point2::new(1., 0.), edge),
            top: line(Point2::new(0., 1.), Point2::new(1., 1.), edge),
            left: side(line(Point2::new(0., 0.), Point2::new(0., 1.), edge), true),
            right: side(line(Point2::new(1., 0.), Point2::new(1., 1.), edge), true),
        }
    }

    #[test]
    fn aligned_rectangle_is_a_single_grid() {
        let mesh = mesh_piece(&unit_piece(4), &counts(4, 4), &Vector2::new(1., 1.), 1e-10).unwrap();
        assert_eq!(mesh.grids.len(), 1);
        assert_eq!(mesh.grids[0].us.len(), 5);
        assert!(mesh.triangles.is_empty());
    }

    #[test]
    fn finer_edges_get_fringe_strips() {
        let mesh = mesh_piece(&unit_piece(6), &counts(4, 6), &Vector2::new(1., 1.), 1e-10).unwrap();
        assert_eq!(mesh.grids.len(), 1);
        assert_eq!(mesh.grids[0].us, vec![0.25, 0.5, 0.75]);
        assert!(!mesh.triangles.is_empty());
        assert_relative_eq!(mesh.area(), 1., epsilon = 1e-12);
    }

    #[test]
    fn slanted_piece_is_sliced() {
        let piece = Piece {
            patch: 0,
            bottom: vec![Point2::new(0.1, 0.), Point2::new(0.25, 0.), Point2::new(0.5, 0.), Point2::new(0.75, 0.), Point2::new(0.9, 0.)],
            top: vec![Point2::new(0.3, 1.), Point2::new(0.5, 1.), Point2::new(0.6, 1.)],
            left: side(line(Point2::new(0.1, 0.), Point2::new(0.3, 1.), 4), false),
            right: side(line(Point2::new(0.9, 0.), Point2::new(0.6, 1.), 4), false),
        };
        let mesh = mesh_piece(&piece, &counts(4, 4), &Vector2::new(1., 1.), 1e-10).unwrap();
        // trapezoid with parallel sides 0.8 and 0.3
        assert_relative_eq!(mesh.area(), 0.55, epsilon = 1e-12);
        assert!(!mesh.grids.is_empty());
        for [a, b, c] in mesh.triangles.iter() {
            let (a, b, c) = (&mesh.points[*a], &mesh.points[*b], &mesh.points[*c]);
            assert!((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) > 0.);
        }
    }

    #[test]
    fn notched_side_stays_outside_the_grid() {
        let xs = [0.1, 0.25, 0.5, 0.75, 0.9];
        let piece = Piece {
            patch: 0,
            bottom: xs.iter().map(|x| Point2::new(*x, 0.3)).collect(),
            top: xs.iter().map(|x| Point2::new(*x, 0.45)).collect(),
            left: side(vec![Point2::new(0.1, 0.3), Point2::new(0.1, 0.45)], false),
            right: side(
                vec![Point2::new(0.9, 0.3), Point2::new(0.6, 0.375), Point2::new(0.9, 0.45)],
                false,
            ),
        };
        let mesh = mesh_piece(&piece, &counts(4, 4), &Vector2::new(1., 1.), 1e-10).unwrap();
        assert_eq!(mesh.grids.len(), 1);
        assert_eq!(mesh.grids[0].us, vec![0.25, 0.5]);
        // the notch cuts a triangle of width 0.3 and height 0.15 off the 0.8 x 0.15 band
        assert_relative_eq!(mesh.area(), 0.0975, epsilon = 1e-12);
        assert_relative_eq!(crate::misc::signed_area(&piece.polygon()), 0.0975, epsilon = 1e-12);
        for [a, b, c] in mesh.triangles.iter() {
            let (a, b, c) = (&mesh.points[*a], &mesh.points[*b], &mesh.points[*c]);
            assert!((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) > 0.);
        }
    }
}
