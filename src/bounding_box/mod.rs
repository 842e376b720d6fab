use nalgebra::{Point3, Vector3};

use crate::misc::{scalar, FloatingPoint};

/// Axis-aligned bounding box in 3D space.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox<T: FloatingPoint> {
    min: Vector3<T>,
    max: Vector3<T>,
}

impl<T: FloatingPoint> BoundingBox<T> {
    /// Create a new bounding box from two opposite corners.
    pub fn new(min: Vector3<T>, max: Vector3<T>) -> Self {
        BoundingBox {
            min: min.zip_map(&max, |a, b| a.min(b)),
            max: min.zip_map(&max, |a, b| a.max(b)),
        }
    }

    /// Create a new bounding box from point iterator.
    /// An empty iterator yields an inverted box that contains nothing.
    pub fn new_with_points<I: IntoIterator<Item = Point3<T>>>(iter: I) -> Self {
        let big = T::max_value().unwrap_or_else(|| scalar(1e300));
        let mut min = Vector3::from_element(big);
        let mut max = -min;

        for point in iter {
            for i in 0..3 {
                min[i] = min[i].min(point[i]);
                max[i] = max[i].max(point[i]);
            }
        }

        Self { min, max }
    }

    pub fn min(&self) -> &Vector3<T> {
        &self.min
    }

    pub fn max(&self) -> &Vector3<T> {
        &self.max
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    pub fn center(&self) -> Vector3<T> {
        (self.min + self.max) * scalar::<T>(0.5)
    }

    pub fn size(&self) -> Vector3<T> {
        self.max - self.min
    }

    /// Length of the box diagonal, zero for an empty box
    pub fn diagonal_length(&self) -> T {
        if self.is_empty() {
            T::zero()
        } else {
            self.size().norm()
        }
    }

    /// Grow the box on every side by `margin`
    pub fn expanded(&self, margin: T) -> Self {
        let m = Vector3::from_element(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Check if the bounding box intersects with another bounding box.
    ///
    /// # Examples
    /// ```
    /// use nalgebra::Vector3;
    /// use bsurf::prelude::BoundingBox;
    ///
    /// let b0 = BoundingBox::new(Vector3::from_element(0.), Vector3::from_element(1.));
    /// assert!(b0.intersects(&b0, None));
    ///
    /// let eps = 1e-6;
    /// let b1 = BoundingBox::new(Vector3::from_element(0.5), Vector3::from_element(1.5));
    /// assert!(b0.intersects(&b1, None));
    ///
    /// let b2 = BoundingBox::new(Vector3::from_element(1. + eps), Vector3::from_element(2. + eps));
    /// assert!(!b0.intersects(&b2, None));
    /// ```
    pub fn intersects(&self, other: &Self, tolerance: Option<T>) -> bool {
        let tolerance = tolerance.unwrap_or(T::default_epsilon());
        (0..3).all(|i| {
            self.min[i] - tolerance <= other.max[i] + tolerance
                && other.min[i] - tolerance <= self.max[i] + tolerance
        })
    }

    /// Check if the bounding box contains a point.
    /// # Examples
    /// ```
    /// use nalgebra::{Point3, Vector3};
    /// use bsurf::prelude::BoundingBox;
    /// let bb = BoundingBox::new(Vector3::from_element(0.), Vector3::from_element(1.));
    /// assert!(bb.contains(&Point3::new(0.5, 0.5, 0.5)));
    /// assert!(bb.contains(&Point3::new(0., 0.5, 1.0)));
    /// assert!(!bb.contains(&Point3::new(-1e-8, 0.5, 0.5)));
    /// ```
    pub fn contains(&self, point: &Point3<T>) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Point3<T>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Parameter interval over which the infinite line `origin + t * direction` stays inside the box.
    /// Returns `None` when the line misses the box.
    pub fn line_interval(&self, origin: &Point3<T>, direction: &Vector3<T>, tolerance: T) -> Option<(T, T)> {
        let big = T::max_value().unwrap_or_else(|| scalar(1e300));
        let mut t0 = -big;
        let mut t1 = big;
        for i in 0..3 {
            let lo = self.min[i] - tolerance;
            let hi = self.max[i] + tolerance;
            if direction[i].abs() <= T::default_epsilon() {
                if origin[i] < lo || origin[i] > hi {
                    return None;
                }
            } else {
                let a = (lo - origin[i]) / direction[i];
                let b = (hi - origin[i]) / direction[i];
                t0 = t0.max(a.min(b));
                t1 = t1.min(a.max(b));
                if t0 > t1 {
                    return None;
                }
            }
        }
        Some((t0, t1))
    }
}

impl<T: FloatingPoint> FromIterator<Point3<T>> for BoundingBox<T> {
    fn from_iter<I: IntoIterator<Item = Point3<T>>>(iter: I) -> Self {
        Self::new_with_points(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_through_box() {
        let bb = BoundingBox::new(Vector3::new(0., 0., 0.), Vector3::new(1., 1., 1.));
        let hit = bb.line_interval(&Point3::new(0.5, 0.5, -2.), &Vector3::new(0., 0., 1.), 0.);
        assert_eq!(hit, Some((2., 3.)));
        let miss = bb.line_interval(&Point3::new(2., 0.5, -2.), &Vector3::new(0., 0., 1.), 0.);
        assert!(miss.is_none());
    }

    #[test]
    fn empty_iterator_gives_empty_box() {
        let bb: BoundingBox<f64> = std::iter::empty().collect();
        assert!(bb.is_empty());
        assert_eq!(bb.diagonal_length(), 0.);
    }
}
