use argmin::{argmin_error, argmin_error_closure, core::*, float};
use nalgebra::{ComplexField, Matrix2, Vector2, Vector3};

use crate::misc::FloatingPoint;

/// Customized Newton's method for finding the closest local parameter on a Bezier patch
/// Original source: https://argmin-rs.github.io/argmin/argmin/solver/newton/struct.Newton.html
#[derive(Clone, Copy)]
pub struct PatchClosestParameterNewton<F> {
    /// gamma
    gamma: F,
    /// box the local parameters are kept in
    domain: (F, F),
    /// parameter step below which the iteration has converged
    tolerance: F,
}

impl<F> PatchClosestParameterNewton<F>
where
    F: ArgminFloat,
{
    /// Construct a new instance of [`PatchClosestParameterNewton`]
    pub fn new(domain: (F, F)) -> Self {
        PatchClosestParameterNewton {
            gamma: float!(1.0),
            domain,
            tolerance: float!(1e-12),
        }
    }

    /// Set step size gamma
    ///
    /// Gamma must be in `(0, 1]` and defaults to `1`.
    pub fn with_gamma(mut self, gamma: F) -> Result<Self, Error> {
        if gamma <= float!(0.0) || gamma > float!(1.0) {
            return Err(argmin_error!(
                InvalidParameter,
                "Newton: gamma must be in  (0, 1]."
            ));
        }
        self.gamma = gamma;
        Ok(self)
    }
}

impl<O, F> Solver<O, IterState<Vector2<F>, Vector3<F>, (), (), (), F>> for PatchClosestParameterNewton<F>
where
    F: FloatingPoint + ArgminFloat,
    O: CostFunction<Param = Vector2<F>, Output = F>
        + Gradient<Param = Vector2<F>, Gradient = Vector3<F>>
        + Hessian<Param = Vector2<F>, Hessian = Vec<Vec<Vector3<F>>>>,
{
    const NAME: &'static str = "Patch closest parameter newton method";

    fn init(
        &mut self,
        problem: &mut Problem<O>,
        state: IterState<Vector2<F>, Vector3<F>, (), (), (), F>,
    ) -> Result<(IterState<Vector2<F>, Vector3<F>, (), (), (), F>, Option<KV>), Error> {
        let x0 = state.get_param().ok_or_else(argmin_error_closure!(
            NotInitialized,
            concat!(
                "`Newton` requires an initial parameter vector. ",
                "Please provide an initial guess via `Executor`s `configure` method."
            )
        ))?;
        let cost = problem.cost(x0)?;
        Ok((state.cost(cost), None))
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<O>,
        state: IterState<Vector2<F>, Vector3<F>, (), (), (), F>,
    ) -> Result<(IterState<Vector2<F>, Vector3<F>, (), (), (), F>, Option<KV>), Error> {
        let param = state.get_param().ok_or_else(argmin_error_closure!(
            NotInitialized,
            concat!(
                "`Newton` requires an initial parameter vector. ",
                "Please provide an initial guess via `Executor`s `configure` method."
            )
        ))?;

        let dif = problem.gradient(param)?;

        // halt if point is close enough
        if dif.norm() < float!(1e-12) {
            let p = *param;
            return Ok((state.param(p), None));
        }

        let e = problem.hessian(param)?;
        let s_u = &e[1][0];
        let s_v = &e[0][1];
        let s_uu = &e[2][0];
        let s_vv = &e[0][2];
        let s_uv = &e[1][1];

        let grad = Vector2::new(s_u.dot(&dif), s_v.dot(&dif));

        let u_d = s_u.norm() < F::default_epsilon();
        let v_d = s_v.norm() < F::default_epsilon();
        let delta = match (u_d, v_d) {
            (false, false) => {
                let j00 = s_u.dot(s_u) + s_uu.dot(&dif);
                let j01 = s_u.dot(s_v) + s_uv.dot(&dif);
                let j11 = s_v.dot(s_v) + s_vv.dot(&dif);
                let jacobian = Matrix2::new(j00, j01, j01, j11);
                jacobian
                    .lu()
                    .solve(&-grad)
                    .ok_or(anyhow::anyhow!("Singular jacobian"))?
            }
            (true, false) => {
                let v_delta = -grad.y / (s_v.dot(s_v) + s_vv.dot(&dif));
                Vector2::new(F::zero(), v_delta)
            }
            (false, true) => {
                let u_delta = -grad.x / (s_u.dot(s_u) + s_uu.dot(&dif));
                Vector2::new(u_delta, F::zero())
            }
            _ => {
                return Err(anyhow::anyhow!("Both tangents vanish"));
            }
        };

        let new_param = *param + delta * self.gamma;
        anyhow::ensure!(
            ComplexField::is_finite(&new_param.x) && ComplexField::is_finite(&new_param.y),
            "Newton step diverged"
        );

        // Constrain the parameter to the domain
        let new_param = Vector2::new(
            nalgebra::clamp(new_param.x, self.domain.0, self.domain.1),
            nalgebra::clamp(new_param.y, self.domain.0, self.domain.1),
        );

        let new_cost = problem.cost(&new_param)?;

        // halt if cost is not decreasing
        if state.get_cost() < new_cost {
            let p = *param;
            Ok((state.param(p), None))
        } else {
            Ok((state.cost(new_cost).param(new_param), None))
        }
    }

    fn terminate(&mut self, state: &IterState<Vector2<F>, Vector3<F>, (), (), (), F>) -> TerminationStatus {
        if state.iter > state.max_iters {
            return TerminationStatus::Terminated(TerminationReason::MaxItersReached);
        }

        match (state.get_param(), state.get_prev_param()) {
            (Some(current_param), Some(prev_param)) => {
                let delta = (current_param - prev_param).norm();
                if delta < self.tolerance {
                    TerminationStatus::Terminated(TerminationReason::SolverConverged)
                } else {
                    TerminationStatus::NotTerminated
                }
            }
            _ => TerminationStatus::NotTerminated,
        }
    }
}
