use std::collections::HashMap;

use nalgebra::{Point2, Vector2};
use robust::{incircle, Coord};

use crate::misc::{orientation, FloatingPoint, Orientation};

use super::scaled;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalfEdge {
    pub origin: usize,
    /// `None` on the outline of the mesh
    pub twin: Option<usize>,
    pub next: usize,
}

/// Half-edge connectivity of a triangle mesh in parameter space
#[derive(Clone, Debug)]
pub struct HalfEdgeGraph<T: FloatingPoint> {
    points: Vec<Point2<T>>,
    edges: Vec<HalfEdge>,
}

fn coord<T: FloatingPoint>(p: &Point2<T>) -> Coord<f64> {
    Coord {
        x: p.x.to_f64().unwrap_or(f64::NAN),
        y: p.y.to_f64().unwrap_or(f64::NAN),
    }
}

impl<T: FloatingPoint> HalfEdgeGraph<T> {
    /// Connect counter-clockwise triangles sharing edges.
    /// Fails when a directed edge is used twice, which a consistently oriented manifold never does.
    pub fn from_triangles(points: Vec<Point2<T>>, triangles: &[[usize; 3]]) -> anyhow::Result<Self> {
        let mut edges = Vec::with_capacity(triangles.len() * 3);
        let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
        for (f, tri) in triangles.iter().enumerate() {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                let e = f * 3 + k;
                anyhow::ensure!(
                    directed.insert((a, b), e).is_none(),
                    "edge {} -> {} is used by two triangles",
                    a,
                    b
                );
                edges.push(HalfEdge {
                    origin: a,
                    twin: None,
                    next: f * 3 + (k + 1) % 3,
                });
            }
        }
        for ((a, b), e) in directed.iter() {
            if let Some(t) = directed.get(&(*b, *a)) {
                edges[*e].twin = Some(*t);
            }
        }
        Ok(Self { points, edges })
    }

    pub fn points(&self) -> &[Point2<T>] {
        &self.points
    }

    pub fn edges(&self) -> &[HalfEdge] {
        &self.edges
    }

    pub fn dest(&self, e: usize) -> usize {
        self.edges[self.edges[e].next].origin
    }

    /// Replace the diagonal `e` of the quad formed by its two triangles with the other diagonal.
    /// Triangles `(a, b, c)` on `e` and `(b, a, d)` on its twin become `(d, c, a)` and `(c, d, b)`.
    fn flip(&mut self, e: usize, t: usize) {
        let e1 = self.edges[e].next;
        let e2 = self.edges[e1].next;
        let t1 = self.edges[t].next;
        let t2 = self.edges[t1].next;
        let c = self.edges[e2].origin;
        let d = self.edges[t2].origin;

        self.edges[e].origin = d;
        self.edges[t].origin = c;
        self.edges[e].next = e2;
        self.edges[e2].next = t1;
        self.edges[t1].next = e;
        self.edges[t].next = t2;
        self.edges[t2].next = e1;
        self.edges[e1].next = t;
    }

    /// Whether the diagonal `e` should give way to the other one: the opposite vertex lies inside
    /// the circumcircle in the `scale`d space and both new triangles stay counter-clockwise
    fn should_flip(&self, e: usize, t: usize, scale: &Vector2<T>) -> bool {
        let a = self.edges[e].origin;
        let b = self.edges[t].origin;
        let c = self.edges[self.edges[self.edges[e].next].next].origin;
        let d = self.edges[self.edges[self.edges[t].next].next].origin;
        let p = |i: usize| scaled(&self.points[i], scale);
        let (pa, pb, pc, pd) = (p(a), p(b), p(c), p(d));
        incircle(coord(&pa), coord(&pb), coord(&pc), coord(&pd)) > 0.
            && orientation(&pd, &pc, &pa) == Orientation::CounterClockwise
            && orientation(&pc, &pd, &pb) == Orientation::CounterClockwise
    }

    /// Flip interior diagonals toward the Delaunay triangulation of the `scale`d space.
    /// Stops after `max_passes` sweeps or the first sweep without a flip, returning the flip count.
    pub fn improve(&mut self, scale: &Vector2<T>, max_passes: usize) -> usize {
        let mut total = 0;
        for _ in 0..max_passes {
            let mut flips = 0;
            for e in 0..self.edges.len() {
                let Some(t) = self.edges[e].twin else {
                    continue;
                };
                if e < t && self.should_flip(e, t, scale) {
                    self.flip(e, t);
                    flips += 1;
                }
            }
            total += flips;
            if flips == 0 {
                break;
            }
        }
        total
    }

    /// Every face as a counter-clockwise vertex triple
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        let mut visited = vec![false; self.edges.len()];
        let mut triangles = Vec::with_capacity(self.edges.len() / 3);
        for e in 0..self.edges.len() {
            if visited[e] {
                continue;
            }
            let e1 = self.edges[e].next;
            let e2 = self.edges[e1].next;
            visited[e] = true;
            visited[e1] = true;
            visited[e2] = true;
            triangles.push([self.edges[e].origin, self.edges[e1].origin, self.edges[e2].origin]);
        }
        triangles
    }

    /// Half-edges without a twin, on the outline of the mesh
    pub fn boundary_edges(&self) -> Vec<(usize, usize)> {
        (0..self.edges.len())
            .filter(|e| self.edges[*e].twin.is_none())
            .map(|e| (self.edges[e].origin, self.dest(e)))
            .collect()
    }
}
