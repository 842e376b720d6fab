use argmin::core::{Jacobian, Operator};
use nalgebra::{Matrix3, Vector3};

use crate::{
    curve::ParametricCurve,
    misc::FloatingPoint,
    patch::{evaluate, BezierPatch},
};

/// Parameter of the surface-curve system: (curve parameter, local u, local v)
pub type SurfaceCurveParam<T> = Vector3<T>;

/// Residual & Jacobian provider for the intersection between a Bezier patch and a curve.
/// The residual is `C(t) - S(u, v)`.
pub struct SurfaceCurveIntersectionProblem<'a, T: FloatingPoint, C> {
    /// The patch to intersect, evaluated in local parameters.
    patch: &'a BezierPatch<T>,
    /// The curve to intersect.
    curve: &'a C,
}

impl<'a, T: FloatingPoint, C: ParametricCurve<T>> SurfaceCurveIntersectionProblem<'a, T, C> {
    pub fn new(patch: &'a BezierPatch<T>, curve: &'a C) -> Self {
        SurfaceCurveIntersectionProblem { patch, curve }
    }
}

impl<T: FloatingPoint, C: ParametricCurve<T>> Operator for SurfaceCurveIntersectionProblem<'_, T, C> {
    type Param = SurfaceCurveParam<T>;
    type Output = Vector3<T>;

    fn apply(&self, param: &Self::Param) -> Result<Self::Output, anyhow::Error> {
        let sample = evaluate(self.patch, param.y, param.z, false);
        anyhow::ensure!(sample.valid, "patch weight vanishes");
        Ok(self.curve.point_at(param.x) - sample.point)
    }
}

impl<T: FloatingPoint, C: ParametricCurve<T>> Jacobian for SurfaceCurveIntersectionProblem<'_, T, C> {
    type Param = SurfaceCurveParam<T>;
    type Jacobian = Matrix3<T>;

    fn jacobian(&self, param: &Self::Param) -> Result<Self::Jacobian, anyhow::Error> {
        let sample = evaluate(self.patch, param.y, param.z, true);
        anyhow::ensure!(sample.valid, "patch weight vanishes");
        let dt = self.curve.tangent_at(param.x);
        Ok(Matrix3::from_columns(&[
            dt,
            -sample.u_derivative,
            -sample.v_derivative,
        ]))
    }
}
