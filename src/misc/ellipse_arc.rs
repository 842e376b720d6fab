use nalgebra::{Matrix4, Point3, Vector3};

use super::{FloatingPoint, Transformable};

/// Elliptic arc `center + vector0 cos(a) + vector90 sin(a)` for `a` in `start + [0, sweep]`.
/// The arc is parameterized by the sweep fraction in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EllipseArc<T: FloatingPoint> {
    center: Point3<T>,
    vector0: Vector3<T>,
    vector90: Vector3<T>,
    start: T,
    sweep: T,
}

impl<T: FloatingPoint> EllipseArc<T> {
    pub fn new(center: Point3<T>, vector0: Vector3<T>, vector90: Vector3<T>, start: T, sweep: T) -> Self {
        Self {
            center,
            vector0,
            vector90,
            start,
            sweep,
        }
    }

    /// Full circle of `radius` in the plane spanned by `x` and `y`
    pub fn circle(center: Point3<T>, x: Vector3<T>, y: Vector3<T>, radius: T) -> Self {
        Self::new(center, x * radius, y * radius, T::zero(), T::two_pi())
    }

    pub fn center(&self) -> &Point3<T> {
        &self.center
    }

    pub fn vector0(&self) -> &Vector3<T> {
        &self.vector0
    }

    pub fn vector90(&self) -> &Vector3<T> {
        &self.vector90
    }

    pub fn start(&self) -> T {
        self.start
    }

    pub fn sweep(&self) -> T {
        self.sweep
    }

    pub fn fraction_to_angle(&self, fraction: T) -> T {
        self.start + self.sweep * fraction
    }

    /// Fraction of the sweep reaching `angle`, wrapping by whole turns toward the sweep
    pub fn angle_to_fraction(&self, angle: T) -> T {
        if self.sweep == T::zero() {
            return T::zero();
        }
        let two_pi = T::two_pi();
        let mut delta = angle - self.start;
        if self.sweep > T::zero() {
            while delta < T::zero() {
                delta += two_pi;
            }
            while delta > two_pi {
                delta -= two_pi;
            }
        } else {
            while delta > T::zero() {
                delta -= two_pi;
            }
            while delta < -two_pi {
                delta += two_pi;
            }
        }
        delta / self.sweep
    }

    /// Whether `fraction` is inside the arc, with a tolerance on both ends
    pub fn is_fraction_in_sweep(&self, fraction: T, tolerance: T) -> bool {
        fraction >= -tolerance && fraction <= T::one() + tolerance
    }

    pub fn point_at_angle(&self, angle: T) -> Point3<T> {
        self.center + self.vector0 * angle.cos() + self.vector90 * angle.sin()
    }

    pub fn point_at_fraction(&self, fraction: T) -> Point3<T> {
        self.point_at_angle(self.fraction_to_angle(fraction))
    }

    /// Derivative with respect to the sweep fraction
    pub fn tangent_at_fraction(&self, fraction: T) -> Vector3<T> {
        let a = self.fraction_to_angle(fraction);
        (self.vector90 * a.cos() - self.vector0 * a.sin()) * self.sweep
    }
}

impl<'a, T: FloatingPoint> Transformable<&'a Matrix4<T>> for EllipseArc<T> {
    fn transform(&mut self, transform: &'a Matrix4<T>) {
        self.center = transform.transform_point(&self.center);
        self.vector0 = transform.transform_vector(&self.vector0);
        self.vector90 = transform.transform_vector(&self.vector90);
    }
}
