use nalgebra::{Point2, Point3, Vector3};

use crate::misc::FloatingPoint;

/// One piece of tessellation output handed to the caller's sink
#[derive(Clone, Debug, PartialEq)]
pub enum MeshEvent<T: FloatingPoint> {
    /// Regular grid of `rows * cols` samples, row-major with rows running along V
    QuadGrid {
        points: Vec<Point3<T>>,
        normals: Option<Vec<Vector3<T>>>,
        params: Option<Vec<Point2<T>>>,
        rows: usize,
        cols: usize,
    },
    /// Triangle strip: triangle `k` is `(k, k + 1, k + 2)`, every odd triangle with flipped winding
    TriStrip {
        points: Vec<Point3<T>>,
        normals: Option<Vec<Vector3<T>>>,
        params: Option<Vec<Point2<T>>>,
    },
}

impl<T: FloatingPoint> MeshEvent<T> {
    pub fn points(&self) -> &[Point3<T>] {
        match self {
            MeshEvent::QuadGrid { points, .. } => points,
            MeshEvent::TriStrip { points, .. } => points,
        }
    }

    pub fn normals(&self) -> Option<&[Vector3<T>]> {
        match self {
            MeshEvent::QuadGrid { normals, .. } => normals.as_deref(),
            MeshEvent::TriStrip { normals, .. } => normals.as_deref(),
        }
    }

    pub fn params(&self) -> Option<&[Point2<T>]> {
        match self {
            MeshEvent::QuadGrid { params, .. } => params.as_deref(),
            MeshEvent::TriStrip { params, .. } => params.as_deref(),
        }
    }

    /// Triangles as index triples into `points()`, counter-clockwise seen from the normal side
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        match self {
            MeshEvent::QuadGrid { rows, cols, .. } => {
                let mut triangles = Vec::with_capacity(rows.saturating_sub(1) * cols.saturating_sub(1) * 2);
                for r in 1..*rows {
                    for c in 1..*cols {
                        let a = (r - 1) * cols + c - 1;
                        let b = a + 1;
                        let d = r * cols + c - 1;
                        let e = d + 1;
                        triangles.push([a, b, e]);
                        triangles.push([a, e, d]);
                    }
                }
                triangles
            }
            MeshEvent::TriStrip { points, .. } => (2..points.len())
                .map(|k| {
                    if k % 2 == 0 {
                        [k - 2, k - 1, k]
                    } else {
                        [k - 1, k - 2, k]
                    }
                })
                .collect(),
        }
    }
}

/// Counts reported by one tessellation call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TessellationSummary {
    pub quad_grids: usize,
    pub tri_strips: usize,
    /// monotone pieces meshed, patch tiles included
    pub regions: usize,
    /// pieces whose meshing failed and produced no output
    pub failed_regions: usize,
}

impl TessellationSummary {
    /// Every region produced output
    pub fn is_complete(&self) -> bool {
        self.failed_regions == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_grid_triangles() {
        let event = MeshEvent::<f64>::QuadGrid {
            points: vec![Point3::origin(); 6],
            normals: None,
            params: None,
            rows: 2,
            cols: 3,
        };
        let triangles = event.triangles();
        assert_eq!(triangles.len(), 4);
        assert_eq!(triangles[0], [0, 1, 4]);
        assert_eq!(triangles[1], [0, 4, 3]);
    }

    #[test]
    fn strip_triangles_alternate() {
        let event = MeshEvent::<f64>::TriStrip {
            points: vec![Point3::origin(); 5],
            normals: None,
            params: None,
        };
        assert_eq!(event.triangles(), vec![[0, 1, 2], [2, 1, 3], [2, 3, 4]]);
    }
}
