use std::cmp::Ordering;

use anyhow::Context;
use itertools::Itertools;
use nalgebra::{Point2, Vector2};

use crate::misc::{orientation, signed_area, FloatingPoint, Orientation};

/// Sweep order used by every monotone routine: by V, then by U
pub fn sweep_order<T: FloatingPoint>(a: &Point2<T>, b: &Point2<T>) -> Ordering {
    a.y.partial_cmp(&b.y)
        .unwrap_or(Ordering::Equal)
        .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Chain {
    Left,
    Right,
    Ends,
}

/// Push the triangle counter-clockwise, dropping it when collinear
fn push_ccw<T: FloatingPoint>(points: &[Point2<T>], a: usize, b: usize, c: usize, out: &mut Vec<[usize; 3]>) {
    match orientation(&points[a], &points[b], &points[c]) {
        Orientation::CounterClockwise => out.push([a, b, c]),
        Orientation::Clockwise => out.push([a, c, b]),
        Orientation::Collinear => {}
    }
}

/// Check whether a counter-clockwise polygon is monotone in V under the sweep order
pub fn is_v_monotone<T: FloatingPoint>(points: &[Point2<T>]) -> bool {
    chains(points).is_ok()
}

/// Assign every vertex of a counter-clockwise polygon to its chain and return the sweep order
fn chains<T: FloatingPoint>(points: &[Point2<T>]) -> anyhow::Result<(Vec<usize>, Vec<Chain>)> {
    let n = points.len();
    anyhow::ensure!(n >= 3, "polygon needs at least 3 vertices, got {}", n);
    let order = (0..n)
        .sorted_by(|a, b| sweep_order(&points[*a], &points[*b]))
        .collect_vec();
    let mut rank = vec![0; n];
    for (r, i) in order.iter().enumerate() {
        rank[*i] = r;
    }
    let (lo, hi) = (order[0], order[n - 1]);
    let mut chain = vec![Chain::Ends; n];

    // counter-clockwise from the lowest vertex climbs the right chain
    let (mut prev, mut i) = (lo, (lo + 1) % n);
    while i != hi {
        anyhow::ensure!(rank[i] > rank[prev], "polygon is not monotone in V");
        chain[i] = Chain::Right;
        prev = i;
        i = (i + 1) % n;
    }
    // and descends along the left chain
    let (mut prev, mut i) = (hi, (hi + 1) % n);
    while i != lo {
        anyhow::ensure!(rank[i] < rank[prev], "polygon is not monotone in V");
        chain[i] = Chain::Left;
        prev = i;
        i = (i + 1) % n;
    }
    Ok((order, chain))
}

/// Stack-based triangulation of a counter-clockwise polygon monotone in V.
/// Returns counter-clockwise index triples; collinear runs produce no slivers.
pub fn triangulate_monotone<T: FloatingPoint>(points: &[Point2<T>]) -> anyhow::Result<Vec<[usize; 3]>> {
    let n = points.len();
    anyhow::ensure!(n >= 3, "polygon needs at least 3 vertices, got {}", n);
    anyhow::ensure!(
        signed_area(points) > T::zero(),
        "polygon is not counter-clockwise"
    );
    let (order, chain) = chains(points)?;

    let mut triangles = Vec::with_capacity(n - 2);
    let mut stack = vec![order[0], order[1]];
    for k in 2..n - 1 {
        let u = order[k];
        let top = *stack.last().context("empty sweep stack")?;
        if chain[u] != chain[top] {
            for w in stack.windows(2) {
                push_ccw(points, u, w[0], w[1], &mut triangles);
            }
            stack = vec![order[k - 1], u];
        } else {
            let mut last = stack.pop().context("empty sweep stack")?;
            while let Some(&next) = stack.last() {
                let turn = orientation(&points[next], &points[last], &points[u]);
                let inside = match chain[u] {
                    Chain::Right => turn == Orientation::CounterClockwise,
                    _ => turn == Orientation::Clockwise,
                };
                if !inside {
                    break;
                }
                push_ccw(points, u, last, next, &mut triangles);
                last = next;
                stack.pop();
            }
            stack.push(last);
            stack.push(u);
        }
    }

    let u = order[n - 1];
    for w in stack.windows(2) {
        push_ccw(points, u, w[0], w[1], &mut triangles);
    }
    Ok(triangles)
}

/// Greedy triangulation of the band between two chains travelling in the same direction,
/// `outer` on the right of the travel direction and `inner` on the left.
/// Each step closes the shorter diagonal measured in the `scale`d parameter space.
pub fn zip_chains<T: FloatingPoint>(
    points: &[Point2<T>],
    outer: &[usize],
    inner: &[usize],
    scale: &Vector2<T>,
) -> Vec<[usize; 3]> {
    let mut triangles = vec![];
    if outer.is_empty() || inner.is_empty() {
        return triangles;
    }
    let length = |a: usize, b: usize| {
        let d = points[b] - points[a];
        Vector2::new(d.x * scale.x, d.y * scale.y).norm_squared()
    };
    let ccw = |a: usize, b: usize, c: usize| {
        orientation(&points[a], &points[b], &points[c]) == Orientation::CounterClockwise
    };

    let (mut i, mut j) = (0, 0);
    while i + 1 < outer.len() || j + 1 < inner.len() {
        let advance_outer = if i + 1 >= outer.len() {
            false
        } else if j + 1 >= inner.len() {
            true
        } else {
            let by_outer = ccw(outer[i], outer[i + 1], inner[j]);
            let by_inner = ccw(outer[i], inner[j + 1], inner[j]);
            match (by_outer, by_inner) {
                (true, false) => true,
                (false, true) => false,
                _ => length(outer[i + 1], inner[j]) <= length(outer[i], inner[j + 1]),
            }
        };
        if advance_outer {
            push_ccw(points, outer[i], outer[i + 1], inner[j], &mut triangles);
            i += 1;
        } else {
            push_ccw(points, outer[i], inner[j + 1], inner[j], &mut triangles);
            j += 1;
        }
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_of(points: &[Point2<f64>], triangles: &[[usize; 3]]) -> f64 {
        triangles
            .iter()
            .map(|[a, b, c]| signed_area(&[points[*a], points[*b], points[*c]]))
            .sum()
    }

    #[test]
    fn rectangle_with_collinear_points() {
        let points = vec![
            Point2::new(0., 0.),
            Point2::new(0.5, 0.),
            Point2::new(1., 0.),
            Point2::new(1., 1.),
            Point2::new(0.25, 1.),
            Point2::new(0., 1.),
            Point2::new(0., 0.5),
        ];
        let triangles = triangulate_monotone(&points).unwrap();
        assert_eq!(triangles.len(), points.len() - 2);
        approx::assert_relative_eq!(area_of(&points, &triangles), 1., epsilon = 1e-12);
        for [a, b, c] in triangles {
            assert_eq!(
                orientation(&points[a], &points[b], &points[c]),
                Orientation::CounterClockwise
            );
        }
    }

    #[test]
    fn zigzag_monotone_polygon() {
        let points = vec![
            Point2::new(0., 0.),
            Point2::new(1., 0.5),
            Point2::new(0.6, 1.),
            Point2::new(1.2, 2.),
            Point2::new(0.2, 3.),
            Point2::new(-0.5, 2.),
            Point2::new(0.1, 1.4),
            Point2::new(-0.4, 0.8),
        ];
        let expected = signed_area(&points);
        let triangles = triangulate_monotone(&points).unwrap();
        assert_eq!(triangles.len(), points.len() - 2);
        approx::assert_relative_eq!(area_of(&points, &triangles), expected, epsilon = 1e-12);
    }

    #[test]
    fn non_monotone_polygon_is_rejected() {
        // a U shape opens upward: two local maxima
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
        assert!(!is_v_monotone(&points));
        assert!(triangulate_monotone(&points).is_err());
        let clockwise: Vec<_> = points[..4].iter().rev().cloned().collect();
        assert!(triangulate_monotone(&clockwise).is_err());
    }

    #[test]
    fn zip_fills_the_band_between_chains() {
        let points = vec![
            Point2::new(0., 0.),
            Point2::new(1., 0.),
            Point2::new(2., 0.),
            Point2::new(3., 0.),
            Point2::new(0.5, 1.),
            Point2::new(2.5, 1.),
        ];
        let triangles = zip_chains(&points, &[0, 1, 2, 3], &[4, 5], &Vector2::new(1., 1.));
        assert_eq!(triangles.len(), 4);
        // trapezoid between the chains
        approx::assert_relative_eq!(area_of(&points, &triangles), 2.5, epsilon = 1e-12);
    }
}
