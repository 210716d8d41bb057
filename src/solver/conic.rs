//! # Conic Solver
//!
//! $$
//! \min_{\mathbf{x}} \ \tfrac12\mathbf{x}^\top P\mathbf{x}+\mathbf{q}^\top\mathbf{x}
//! \quad \text{s.t.} \quad
//! \begin{bmatrix} A \\ G \end{bmatrix}\mathbf{x} + \mathbf{s}
//! = \begin{bmatrix} \mathbf{b} \\ \mathbf{h} \end{bmatrix},
//! \quad \mathbf{s} \in \{0\}^{m_e} \times \mathbb{R}_+^{m}
//! $$
//!
//! Clarabel interior point backend. Equality rows go to the zero cone and
//! inequality rows to the nonnegative cone.

use clarabel::algebra::CscMatrix;
use clarabel::solver::DefaultSettings;
use clarabel::solver::DefaultSettingsBuilder;
use clarabel::solver::DefaultSolver;
use clarabel::solver::IPSolver;
use clarabel::solver::SolverStatus;
use clarabel::solver::SupportedConeT;
use nalgebra::DMatrix;
use nalgebra::DVector;
use tracing::debug;
use tracing::warn;

use super::ConvexProgram;
use super::ConvexSolver;
use super::Objective;
use super::Solution;
use super::SolveStatus;
use super::SolverSettings;
use crate::error::PortfolioError;
use crate::error::Result;

/// Stateless Clarabel backend. A fresh solver instance is built per call.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClarabelSolver;

/// Column-compressed copy of a dense matrix, keeping only the upper
/// triangle when `upper` is set.
fn to_csc(m: &DMatrix<f64>, upper: bool) -> CscMatrix<f64> {
  let mut colptr = Vec::with_capacity(m.ncols() + 1);
  let mut rowval = Vec::new();
  let mut nzval = Vec::new();

  colptr.push(0);
  for j in 0..m.ncols() {
    let rows = if upper { (j + 1).min(m.nrows()) } else { m.nrows() };
    for i in 0..rows {
      let v = m[(i, j)];
      if v != 0.0 {
        rowval.push(i);
        nzval.push(v);
      }
    }
    colptr.push(rowval.len());
  }

  CscMatrix::new(m.nrows(), m.ncols(), colptr, rowval, nzval)
}

/// `[A; G]`, `[b; h]` and the matching cone list.
fn stack_constraints(
  program: &ConvexProgram,
) -> (DMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
  let n = program.dim();
  let me = program.num_equalities();
  let m = program.num_inequalities();

  let mut a = DMatrix::zeros(me + m, n);
  let mut b = Vec::with_capacity(me + m);
  let mut cones = Vec::with_capacity(2);

  if let Some(eq) = &program.equality {
    a.view_mut((0, 0), (me, n)).copy_from(&eq.lhs);
    b.extend(eq.rhs.iter().copied());
    cones.push(SupportedConeT::ZeroConeT(me));
  }
  if let Some(ineq) = &program.inequality {
    a.view_mut((me, 0), (m, n)).copy_from(&ineq.lhs);
    b.extend(ineq.rhs.iter().copied());
    cones.push(SupportedConeT::NonnegativeConeT(m));
  }

  (a, b, cones)
}

fn clarabel_settings(settings: &SolverSettings) -> Result<DefaultSettings<f64>> {
  DefaultSettingsBuilder::default()
    .max_iter(u32::try_from(settings.max_iters).unwrap_or(u32::MAX))
    .tol_gap_abs(settings.abstol)
    .tol_gap_rel(settings.reltol)
    .tol_feas(settings.feastol)
    .tol_infeas_abs(settings.infeasibility_tol)
    .tol_infeas_rel(settings.infeasibility_tol)
    .max_step_fraction(settings.step_fraction)
    .static_regularization_constant(settings.regularization)
    .iterative_refinement_max_iter(u32::try_from(settings.refinement_steps).unwrap_or(u32::MAX))
    .verbose(settings.verbose)
    .build()
    .map_err(|e| PortfolioError::invalid(format!("invalid solver settings: {e:?}")))
}

fn map_status(status: &SolverStatus) -> SolveStatus {
  match status {
    SolverStatus::Solved => SolveStatus::Optimal,
    SolverStatus::PrimalInfeasible => SolveStatus::Infeasible,
    SolverStatus::DualInfeasible => SolveStatus::Unbounded,
    _ => SolveStatus::Unknown,
  }
}

impl ConvexSolver for ClarabelSolver {
  fn solve(&self, program: &ConvexProgram, settings: &SolverSettings) -> Result<Solution> {
    program.validate()?;

    let n = program.dim();
    let (p, q) = match &program.objective {
      Objective::Quadratic { p, q } => (p.clone(), q.clone()),
      Objective::Linear { c } => (DMatrix::zeros(n, n), c.clone()),
    };

    // Objective rescaled to unit magnitude; the minimizer is unchanged.
    let scale = p.amax().max(q.amax());
    let scale = if scale > 0.0 && scale.is_finite() { scale } else { 1.0 };
    let p = to_csc(&(p / scale), true);
    let q: Vec<f64> = q.iter().map(|v| v / scale).collect();

    let (a, b, cones) = stack_constraints(program);
    let a = to_csc(&a, false);

    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, clarabel_settings(settings)?)
      .map_err(|e| PortfolioError::invalid(format!("solver rejected the program: {e:?}")))?;
    solver.solve();

    let status = map_status(&solver.solution.status);
    let iterations = solver.solution.iterations as usize;
    let x = DVector::from_column_slice(&solver.solution.x);

    if status == SolveStatus::Optimal {
      debug!(iterations, "conic solve converged");
    } else {
      warn!(
        ?status,
        backend_status = ?solver.solution.status,
        iterations,
        "conic solve ended without an optimal point"
      );
    }

    Ok(Solution {
      status,
      objective: program.objective.value(&x),
      x,
      iterations,
    })
  }
}
