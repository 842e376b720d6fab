use argmin::core::{CostFunction, Gradient, Hessian};
use nalgebra::{Point3, Vector2, Vector3};

use crate::{
    misc::{scalar, FloatingPoint},
    patch::{evaluate, BezierPatch},
};

/// Step of the forward differences standing in for second derivatives
const SECOND_DERIVATIVE_STEP: f64 = 1e-6;

/// Gradient & Hessian provider for finding the closest local parameter on a Bezier patch to a given point.
pub struct PatchClosestParameterProblem<'a, T: FloatingPoint> {
    /// The point to find the closest parameter to.
    point: &'a Point3<T>,
    /// The patch to find the closest parameter on.
    patch: &'a BezierPatch<T>,
}

impl<'a, T: FloatingPoint> PatchClosestParameterProblem<'a, T> {
    pub fn new(point: &'a Point3<T>, patch: &'a BezierPatch<T>) -> Self {
        PatchClosestParameterProblem { point, patch }
    }

    fn first_derivatives(&self, s: T, t: T) -> anyhow::Result<(Point3<T>, Vector3<T>, Vector3<T>)> {
        let sample = evaluate(self.patch, s, t, true);
        anyhow::ensure!(sample.valid, "patch weight vanishes at ({}, {})", s, t);
        Ok((sample.point, sample.u_derivative, sample.v_derivative))
    }
}

impl<T: FloatingPoint> CostFunction for PatchClosestParameterProblem<'_, T> {
    type Param = Vector2<T>;
    type Output = T;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, anyhow::Error> {
        let sample = evaluate(self.patch, param.x, param.y, false);
        anyhow::ensure!(sample.valid, "patch weight vanishes");
        Ok((sample.point - self.point).norm())
    }
}

impl<T: FloatingPoint> Gradient for PatchClosestParameterProblem<'_, T> {
    type Param = Vector2<T>;
    type Gradient = Vector3<T>;

    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, anyhow::Error> {
        let sample = evaluate(self.patch, param.x, param.y, false);
        anyhow::ensure!(sample.valid, "patch weight vanishes");
        Ok(sample.point - self.point)
    }
}

impl<T: FloatingPoint> Hessian for PatchClosestParameterProblem<'_, T> {
    type Param = Vector2<T>;
    /// `h[k][l]` is the derivative of order `k` in u and `l` in v
    type Hessian = Vec<Vec<Vector3<T>>>;

    fn hessian(&self, param: &Self::Param) -> Result<Self::Hessian, anyhow::Error> {
        let (s, t) = (param.x, param.y);
        let h = scalar::<T>(SECOND_DERIVATIVE_STEP);
        // step back from the far end so the differences stay on the patch
        let hs = if s > scalar(0.5) { -h } else { h };
        let ht = if t > scalar(0.5) { -h } else { h };

        let (p, su, sv) = self.first_derivatives(s, t)?;
        let (_, su_s, sv_s) = self.first_derivatives(s + hs, t)?;
        let (_, _, sv_t) = self.first_derivatives(s, t + ht)?;

        let suu = (su_s - su) / hs;
        let suv = (sv_s - sv) / hs;
        let svv = (sv_t - sv) / ht;
        Ok(vec![vec![p.coords, sv, svv], vec![su, suv], vec![suu]])
    }
}
