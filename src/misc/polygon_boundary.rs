use itertools::Itertools;
use nalgebra::Point2;

use super::{orientation, signed_area, FloatingPoint, Orientation};

/// Trait for determining if a point is inside a closed shape.
pub trait Contains<T: FloatingPoint> {
    type Option;
    fn contains(&self, point: &Point2<T>, option: Self::Option) -> anyhow::Result<bool>;
}

/// A closed polygon in the plane, stored without a repeated closure point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolygonBoundary<T: FloatingPoint> {
    vertices: Vec<Point2<T>>,
}

impl<T: FloatingPoint> PolygonBoundary<T> {
    /// Create a boundary. A trailing point equal to the first one is dropped.
    pub fn new(mut vertices: Vec<Point2<T>>) -> Self {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        Self { vertices }
    }

    pub fn vertices(&self) -> &Vec<Point2<T>> {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Signed area, positive for counter-clockwise boundaries.
    pub fn signed_area(&self) -> T {
        signed_area(&self.vertices)
    }

    /// Winding number of the boundary around `c`.
    pub fn winding_number(&self, c: &Point2<T>) -> i32 {
        self.vertices
            .iter()
            .circular_tuple_windows()
            .fold(0_i32, |winding_number, (p0, p1)| {
                if p0.y <= c.y {
                    if p1.y > c.y && orientation(p0, p1, c) == Orientation::CounterClockwise {
                        return winding_number + 1;
                    }
                } else if p1.y <= c.y && orientation(p0, p1, c) == Orientation::Clockwise {
                    return winding_number - 1;
                }
                winding_number
            })
    }

    /// Check whether the open segment `a-b` crosses any boundary edge properly.
    /// Shared endpoints are not counted as crossings.
    pub fn segment_crosses_boundary(&self, a: &Point2<T>, b: &Point2<T>) -> bool {
        self.vertices
            .iter()
            .circular_tuple_windows()
            .any(|(p, q)| {
                if p == a || p == b || q == a || q == b {
                    return false;
                }
                segments_cross(a, b, p, q)
            })
    }
}

/// Proper crossing test between segments `a-b` and `p-q`.
pub fn segments_cross<T: FloatingPoint>(
    a: &Point2<T>,
    b: &Point2<T>,
    p: &Point2<T>,
    q: &Point2<T>,
) -> bool {
    let o1 = orientation(a, b, p);
    let o2 = orientation(a, b, q);
    let o3 = orientation(p, q, a);
    let o4 = orientation(p, q, b);
    o1 != o2
        && o3 != o4
        && o1 != Orientation::Collinear
        && o2 != Orientation::Collinear
        && o3 != Orientation::Collinear
        && o4 != Orientation::Collinear
}

impl<T: FloatingPoint> FromIterator<Point2<T>> for PolygonBoundary<T> {
    fn from_iter<I: IntoIterator<Item = Point2<T>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Check if a point is contained in a polygon boundary.
/// ```
/// use nalgebra::Point2;
/// use bsurf::prelude::{Contains, PolygonBoundary};
/// let boundary = PolygonBoundary::new(vec![
///   Point2::new(0., 0.),
///   Point2::new(1., 0.),
///   Point2::new(1., 1.),
///   Point2::new(0., 1.),
/// ]);
/// assert!(boundary.contains(&Point2::new(0.5, 0.5), ()).unwrap());
/// assert!(!boundary.contains(&Point2::new(0.5, 1.5), ()).unwrap());
/// ```
impl<T: FloatingPoint> Contains<T> for PolygonBoundary<T> {
    type Option = ();

    fn contains(&self, c: &Point2<T>, _option: Self::Option) -> anyhow::Result<bool> {
        anyhow::ensure!(self.vertices.len() >= 3, "Polygon has fewer than 3 vertices");
        Ok(self.winding_number(c) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_point_is_dropped() {
        let b = PolygonBoundary::new(vec![
            Point2::new(0., 0.),
            Point2::new(2., 0.),
            Point2::new(0., 2.),
            Point2::new(0., 0.),
        ]);
        assert_eq!(b.len(), 3);
        assert_eq!(b.signed_area(), 2.);
    }

    #[test]
    fn crossing_detection() {
        let b = PolygonBoundary::new(vec![
            Point2::new(0., 0.),
            Point2::new(4., 0.),
            Point2::new(4., 4.),
            Point2::new(2., 1.),
            Point2::new(0., 4.),
        ]);
        // the notch blocks the straight path between the two top corners
        assert!(b.segment_crosses_boundary(&Point2::new(0.5, 3.), &Point2::new(3.5, 3.)));
        assert!(!b.segment_crosses_boundary(&Point2::new(0.5, 0.5), &Point2::new(3.5, 0.5)));
    }
}
