use std::cmp::Ordering;

use anyhow::Context;
use nalgebra::{Point2, Vector2};

use crate::{
    misc::{orientation, signed_area, FloatingPoint, Orientation, PolygonBoundary},
    tolerance::GridCounts,
};

use super::{
    is_v_monotone, slice_piece, sweep_order, triangulate_monotone, triangulate_outline, HalfEdgeGraph, Piece,
    PieceMesh, PointPool,
};

/// Diagonal `i-j` runs inside the polygon without touching its boundary
fn is_visible<T: FloatingPoint>(outline: &[Point2<T>], boundary: &PolygonBoundary<T>, i: usize, j: usize) -> bool {
    let n = outline.len();
    if i == j || (i + 1) % n == j || (j + 1) % n == i {
        return false;
    }
    let (a, b) = (&outline[i], &outline[j]);
    if a == b || boundary.segment_crosses_boundary(a, b) {
        return false;
    }
    let grazes = outline.iter().enumerate().any(|(k, p)| {
        k != i
            && k != j
            && orientation(a, b, p) == Orientation::Collinear
            && (p - a).dot(&(b - a)) > T::zero()
            && (p - b).dot(&(a - b)) > T::zero()
    });
    !grazes && boundary.winding_number(&nalgebra::center(a, b)) != 0
}

/// Diagonal from a reflex vertex whose neighbors lie on the same side of it in the sweep
/// to the nearest vertex it can see on the other side
fn turning_diagonal<T: FloatingPoint>(outline: &[Point2<T>]) -> Option<(usize, usize)> {
    let n = outline.len();
    let boundary = PolygonBoundary::new(outline.to_vec());
    for k in 0..n {
        let (p, c, q) = (&outline[(k + n - 1) % n], &outline[k], &outline[(k + 1) % n]);
        if orientation(p, c, q) != Orientation::Clockwise {
            continue;
        }
        let wanted = match (sweep_order(p, c), sweep_order(q, c)) {
            (Ordering::Greater, Ordering::Greater) => Ordering::Less,
            (Ordering::Less, Ordering::Less) => Ordering::Greater,
            _ => continue,
        };
        let nearest = (0..n)
            .filter(|m| sweep_order(&outline[*m], c) == wanted && is_visible(outline, &boundary, k, *m))
            .min_by(|a, b| {
                let da = (outline[*a] - c).norm_squared();
                let db = (outline[*b] - c).norm_squared();
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            });
        if let Some(m) = nearest {
            return Some((k, m));
        }
    }
    None
}

/// Split a counter-clockwise polygon into faces monotone in V by connecting every turning
/// reflex vertex to a visible vertex. Faces are index rings into `points`.
pub fn regularize<T: FloatingPoint>(points: &[Point2<T>]) -> anyhow::Result<Vec<Vec<usize>>> {
    let mut pending = vec![(0..points.len()).collect::<Vec<_>>()];
    let mut faces = vec![];
    let mut budget = points.len();
    while let Some(ring) = pending.pop() {
        let outline: Vec<_> = ring.iter().map(|i| points[*i]).collect();
        if is_v_monotone(&outline) {
            faces.push(ring);
            continue;
        }
        anyhow::ensure!(budget > 0, "regularization did not converge");
        budget -= 1;
        let (k, m) = turning_diagonal(&outline).context("no visible diagonal from a turning vertex")?;
        let (k, m) = (k.min(m), k.max(m));
        pending.push(ring[k..=m].to_vec());
        pending.push(ring[m..].iter().chain(ring[..=k].iter()).cloned().collect());
    }
    Ok(faces)
}

/// Triangulate a simple counter-clockwise polygon through its monotone faces
pub fn triangulate_regularized<T: FloatingPoint>(points: &[Point2<T>]) -> anyhow::Result<Vec<[usize; 3]>> {
    anyhow::ensure!(
        signed_area(points) > T::zero(),
        "polygon is not counter-clockwise"
    );
    let mut triangles = vec![];
    for face in regularize(points)? {
        let outline: Vec<_> = face.iter().map(|i| points[*i]).collect();
        triangles.extend(
            triangulate_monotone(&outline)?
                .into_iter()
                .map(|[a, b, c]| [face[a], face[b], face[c]]),
        );
    }
    Ok(triangles)
}

/// Mesh a piece through the half-edge graph.
/// The piece is cut along its interior lattice rows, every band is regularized and triangulated
/// on its own, then the diagonals are flipped toward well-shaped triangles in the `scale`d space.
pub fn mesh_graph<T: FloatingPoint>(
    piece: &Piece<T>,
    counts: &GridCounts<T>,
    scale: &Vector2<T>,
    tolerance: T,
    max_flip_passes: usize,
) -> anyhow::Result<PieceMesh<T>> {
    let slices = slice_piece(piece, counts, tolerance);
    let mut pool = PointPool::new();
    let mut triangles = vec![];
    for k in 0..slices.levels.len() - 1 {
        triangulate_outline(&mut pool, &slices.band_outline(k), triangulate_regularized, &mut triangles)?;
    }

    let mut graph = HalfEdgeGraph::from_triangles(pool.into_points(), &triangles)?;
    let flips = graph.improve(scale, max_flip_passes);
    log::trace!("piece in patch {}: {} diagonal flips", piece.patch, flips);

    let triangles = graph.triangles();
    Ok(PieceMesh {
        grids: vec![],
        points: graph.points().to_vec(),
        triangles,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{
        tessellation::PieceSide,
        tolerance::DirectionCounts,
    };

    use super::*;

    fn counts(interior: usize) -> GridCounts<f64> {
        GridCounts {
            u: DirectionCounts::uniform(interior, (0., 1.)),
            v: DirectionCounts::uniform(interior, (0., 1.)),
            null: false,
        }
    }

    fn line(a: Point2<f64>, b: Point2<f64>, n: usize) -> Vec<Point2<f64>> {
        (0..=n).map(|k| a + (b - a) * (k as f64 / n as f64)).collect()
    }

    fn side(points: Vec<Point2<f64>>, locked: bool) -> PieceSide<f64> {
        let n = points.len() - 1;
        PieceSide {
            points,
            locked: vec![locked; n],
        }
    }

    fn area_of(points: &[Point2<f64>], triangles: &[[usize; 3]]) -> f64 {
        triangles
            .iter()
            .map(|[a, b, c]| signed_area(&[points[*a], points[*b], points[*c]]))
            .sum()
    }

    #[test]
    fn u_shape_is_regularized() {
        let points = vec![
            Point2::new(0., 0.),
            Point2::new(3., 0.),
            Point2::new(3., 2.),
            Point2::new(2., 2.),
            Point2::new(2., 1.),
            Point2::new(1., 1.),
            Point2::new(1., 2.),
            Point2::new(0., 2.),
        ];
        let faces = regularize(&points).unwrap();
        assert!(faces.len() >= 2);
        for face in faces.iter() {
            let outline: Vec<_> = face.iter().map(|i| points[*i]).collect();
            assert!(is_v_monotone(&outline));
        }
        let triangles = triangulate_regularized(&points).unwrap();
        assert_eq!(triangles.len(), points.len() - 2);
        assert_relative_eq!(area_of(&points, &triangles), 5., epsilon = 1e-12);
    }

    #[test]
    fn graph_mesh_covers_the_piece() {
        let piece = Piece {
            patch: 0,
            bottom: line(Point2::new(0., 0.), Point2::new(1., 0.), 4),
            top: line(Point2::new(0.2, 1.), Point2::new(0.8, 1.), 2),
            left: side(line(Point2::new(0., 0.), Point2::new(0.2, 1.), 4), false),
            right: side(line(Point2::new(1., 0.), Point2::new(0.8, 1.), 4), false),
        };
        let mesh = mesh_graph(&piece, &counts(4), &Vector2::new(1., 1.), 1e-10, 4).unwrap();
        assert!(mesh.grids.is_empty());
        assert_relative_eq!(mesh.area(), 0.8, epsilon = 1e-12);
        for [a, b, c] in mesh.triangles.iter() {
            let (a, b, c) = (&mesh.points[*a], &mesh.points[*b], &mesh.points[*c]);
            assert_eq!(orientation(a, b, c), Orientation::CounterClockwise);
        }
        // lattice nodes on the accepted rows are used
        assert!(mesh.points.contains(&Point2::new(0.5, 0.5)));
    }
}
