use nalgebra::Point2;
use robust::{orient2d, Coord};

use super::FloatingPoint;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Orientation {
    CounterClockwise,
    Clockwise,
    Collinear,
}

fn coord<T: FloatingPoint>(p: &Point2<T>) -> Coord<f64> {
    Coord {
        x: p.x.to_f64().unwrap_or(f64::NAN),
        y: p.y.to_f64().unwrap_or(f64::NAN),
    }
}

/// Robust orientation test for three points.
/// implementation from geo crate. (https://github.com/georust/geo)
pub fn orientation<T: FloatingPoint>(p: &Point2<T>, q: &Point2<T>, r: &Point2<T>) -> Orientation {
    let orientation = orient2d(coord(p), coord(q), coord(r));

    if orientation < 0. {
        Orientation::Clockwise
    } else if orientation > 0. {
        Orientation::CounterClockwise
    } else {
        Orientation::Collinear
    }
}

/// Twice the signed area of the triangle `p, q, r`; positive when counter-clockwise.
pub fn cross_2d<T: FloatingPoint>(p: &Point2<T>, q: &Point2<T>, r: &Point2<T>) -> T {
    let a = q - p;
    let b = r - p;
    a.x * b.y - a.y * b.x
}

/// Signed area of a closed polygon given without a repeated closure point.
pub fn signed_area<T: FloatingPoint>(points: &[Point2<T>]) -> T {
    let n = points.len();
    if n < 3 {
        return T::zero();
    }
    let mut sum = T::zero();
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        sum += a.x * b.y - a.y * b.x;
    }
    sum * nalgebra::convert(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_of_triangle() {
        let a = Point2::new(0., 0.);
        let b = Point2::new(1., 0.);
        let c = Point2::new(0., 1.);
        assert_eq!(orientation(&a, &b, &c), Orientation::CounterClockwise);
        assert_eq!(orientation(&a, &c, &b), Orientation::Clockwise);
        assert_eq!(
            orientation(&a, &b, &Point2::new(2., 0.)),
            Orientation::Collinear
        );
    }

    #[test]
    fn unit_square_area() {
        let square = vec![
            Point2::new(0., 0.),
            Point2::new(1., 0.),
            Point2::new(1., 1.),
            Point2::new(0., 1.),
        ];
        assert_eq!(signed_area(&square), 1.);
        let reversed: Vec<_> = square.into_iter().rev().collect();
        assert_eq!(signed_area(&reversed), -1.);
    }
}
