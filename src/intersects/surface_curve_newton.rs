use argmin::{argmin_error_closure, core::*};
use nalgebra::{Matrix3, Vector3};

use crate::misc::FloatingPoint;

/// Newton-Raphson iteration solving for (curve parameter, u, v) where curve and surface meet.
/// A solution is only trusted after `required_converged` consecutive converged iterations.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceCurveNewton<F> {
    /// residual distance below which an iteration counts as converged
    tolerance: F,
    required_converged: usize,
    converged: usize,
}

impl<F: ArgminFloat> SurfaceCurveNewton<F> {
    pub fn new(tolerance: F, required_converged: usize) -> Self {
        Self {
            tolerance,
            required_converged: required_converged.max(1),
            converged: 0,
        }
    }

    /// Whether the last run ended on enough consecutive converged iterations
    pub fn is_converged(&self) -> bool {
        self.converged >= self.required_converged
    }
}

impl<O, F> Solver<O, IterState<Vector3<F>, (), Matrix3<F>, (), (), F>> for SurfaceCurveNewton<F>
where
    F: FloatingPoint + ArgminFloat,
    O: Operator<Param = Vector3<F>, Output = Vector3<F>> + Jacobian<Param = Vector3<F>, Jacobian = Matrix3<F>>,
{
    const NAME: &'static str = "Surface curve newton method";

    fn init(
        &mut self,
        problem: &mut Problem<O>,
        state: IterState<Vector3<F>, (), Matrix3<F>, (), (), F>,
    ) -> Result<(IterState<Vector3<F>, (), Matrix3<F>, (), (), F>, Option<KV>), Error> {
        let x0 = state.get_param().ok_or_else(argmin_error_closure!(
            NotInitialized,
            concat!(
                "`SurfaceCurveNewton` requires an initial parameter vector. ",
                "Please provide an initial guess via `Executor`s `configure` method."
            )
        ))?;
        let residual = problem.apply(x0)?;
        self.converged = 0;
        Ok((state.cost(residual.norm()), None))
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<O>,
        state: IterState<Vector3<F>, (), Matrix3<F>, (), (), F>,
    ) -> Result<(IterState<Vector3<F>, (), Matrix3<F>, (), (), F>, Option<KV>), Error> {
        let param = state.get_param().ok_or_else(argmin_error_closure!(
            NotInitialized,
            "`SurfaceCurveNewton` requires an initial parameter vector."
        ))?;

        let residual = problem.apply(param)?;
        let jacobian = problem.jacobian(param)?;
        let delta = jacobian
            .lu()
            .solve(&-residual)
            .ok_or(anyhow::anyhow!("Singular jacobian"))?;
        let new_param = param + delta;

        let new_residual = problem.apply(&new_param)?;
        let cost = new_residual.norm();

        if cost <= self.tolerance {
            self.converged += 1;
        } else {
            self.converged = 0;
        }

        Ok((state.param(new_param).jacobian(jacobian).cost(cost), None))
    }

    fn terminate(&mut self, state: &IterState<Vector3<F>, (), Matrix3<F>, (), (), F>) -> TerminationStatus {
        if self.is_converged() {
            return TerminationStatus::Terminated(TerminationReason::SolverConverged);
        }
        if state.iter > state.max_iters {
            return TerminationStatus::Terminated(TerminationReason::MaxItersReached);
        }
        TerminationStatus::NotTerminated
    }
}
