use nalgebra::{Matrix4, Point3, Point4, Vector3, Vector4};

use crate::{
    knot::KnotVector,
    misc::{binomial::Binomial, FloatingPoint, Transformable},
};

use super::ParametricCurve;

/// NURBS curve in 3D space.
/// Control points carry homogeneous coordinates; the last element is the weight.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NurbsCurve<T: FloatingPoint> {
    control_points: Vec<Point4<T>>,
    degree: usize,
    knots: KnotVector<T>,
}

impl<T: FloatingPoint> NurbsCurve<T> {
    pub fn try_new(
        degree: usize,
        control_points: Vec<Point4<T>>,
        knots: Vec<T>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            control_points.len() > degree,
            "Too few control points for curve"
        );
        anyhow::ensure!(
            knots.len() == control_points.len() + degree + 1,
            "Invalid number of knots, got {}, expected {}",
            knots.len(),
            control_points.len() + degree + 1
        );
        let knots = KnotVector::new(knots);
        anyhow::ensure!(knots.is_non_decreasing(), "Knots must be non-decreasing");

        Ok(Self {
            degree,
            control_points,
            knots,
        })
    }

    /// Non-rational curve through a clamped uniform knot vector
    pub fn try_from_points(degree: usize, points: &[Point3<T>]) -> anyhow::Result<Self> {
        let knots = KnotVector::<T>::clamped_uniform(points.len(), degree);
        Self::try_new(
            degree,
            points.iter().map(|p| p.to_homogeneous().into()).collect(),
            knots.to_vec(),
        )
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &KnotVector<T> {
        &self.knots
    }

    pub fn control_points(&self) -> &Vec<Point4<T>> {
        &self.control_points
    }

    pub fn knots_domain(&self) -> (T, T) {
        self.knots.domain(self.degree)
    }

    /// Evaluate the homogeneous point at a parameter
    pub fn point(&self, t: T) -> Point4<T> {
        let n = self.control_points.len() - 1;
        let t = self.knots.clamp(self.degree, t);
        let knot_span_index = self.knots.find_knot_span_index(n, self.degree, t);
        let basis = self.knots.basis_functions(knot_span_index, t, self.degree);
        let mut position = Vector4::<T>::zeros();
        for (i, b) in basis.iter().enumerate() {
            position += self.control_points[knot_span_index - self.degree + i].coords * *b;
        }
        position.into()
    }

    /// Evaluate the rational derivatives at a parameter
    pub fn rational_derivatives(&self, t: T, derivs: usize) -> Vec<Vector3<T>> {
        let ders = self.derivatives(t, derivs);
        let w_ders: Vec<_> = ders.iter().map(|d| d.w).collect();

        let mut ck: Vec<Vector3<T>> = vec![];
        let mut binom = Binomial::<T>::new();
        for k in 0..=derivs {
            let mut v = ders[k].xyz();

            for i in 1..=k {
                let coef = binom.get(k, i) * w_ders[i];
                v -= ck[k - i] * coef;
            }

            ck.push(v / w_ders[0]);
        }
        ck
    }

    fn derivatives(&self, t: T, derivs: usize) -> Vec<Vector4<T>> {
        let n = self.control_points.len() - 1;
        let t = self.knots.clamp(self.degree, t);
        let du = derivs.min(self.degree);
        let mut derivatives = vec![Vector4::<T>::zeros(); derivs + 1];

        let knot_span_index = self.knots.find_knot_span_index(n, self.degree, t);
        let nders = self
            .knots
            .derivative_basis_functions(knot_span_index, t, self.degree, du);
        for k in 0..=du {
            for j in 0..=self.degree {
                derivatives[k] +=
                    self.control_points[knot_span_index - self.degree + j].coords * nders[k][j];
            }
        }

        derivatives
    }
}

impl<T: FloatingPoint> ParametricCurve<T> for NurbsCurve<T> {
    fn domain(&self) -> (T, T) {
        self.knots_domain()
    }

    fn point_at(&self, t: T) -> Point3<T> {
        let p = self.point(t);
        if p.w == T::zero() {
            return Point3::origin();
        }
        Point3::new(p.x / p.w, p.y / p.w, p.z / p.w)
    }

    fn tangent_at(&self, t: T) -> Vector3<T> {
        self.rational_derivatives(t, 1)[1]
    }

    fn stroke_count(&self) -> usize {
        let spans = self.control_points.len() - self.degree;
        spans * (self.degree + 1) * 2
    }
}

/// Enable to transform a NURBS curve by a homogeneous 4x4 matrix
impl<'a, T: FloatingPoint> Transformable<&'a Matrix4<T>> for NurbsCurve<T> {
    fn transform(&mut self, transform: &'a Matrix4<T>) {
        self.control_points.iter_mut().for_each(|p| {
            let w = p.w;
            if w == T::zero() {
                return;
            }
            let euclid = Vector4::new(p.x / w, p.y / w, p.z / w, T::one());
            let transformed = transform * euclid;
            let tw = transformed.w;
            *p = Point4::new(
                transformed.x / tw * w,
                transformed.y / tw * w,
                transformed.z / tw * w,
                w,
            );
        });
    }
}
