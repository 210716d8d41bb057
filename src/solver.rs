//! # Convex Solver
//!
//! $$
//! \min_{\mathbf{x}} \ \tfrac12\mathbf{x}^\top P\mathbf{x}+\mathbf{q}^\top\mathbf{x}
//! \quad \text{s.t.} \quad A\mathbf{x}=\mathbf{b},\ G\mathbf{x}\le\mathbf{h}
//! $$
//!
//! Narrow interface between the portfolio layer and a QP/LP backend. A backend
//! receives a [`ConvexProgram`] plus per-call [`SolverSettings`] and reports a
//! [`SolveStatus`] together with the final iterate.

pub mod conic;

use nalgebra::DMatrix;
use nalgebra::DVector;

use crate::error::PortfolioError;
use crate::error::Result;

pub use conic::ClarabelSolver;

/// Objective of a convex program.
#[derive(Clone, Debug)]
pub enum Objective {
  /// `½ xᵀ P x + qᵀ x` with `P` symmetric positive semi-definite.
  Quadratic { p: DMatrix<f64>, q: DVector<f64> },
  /// `cᵀ x`.
  Linear { c: DVector<f64> },
}

impl Objective {
  /// Number of decision variables.
  pub fn dim(&self) -> usize {
    match self {
      Objective::Quadratic { q, .. } => q.len(),
      Objective::Linear { c } => c.len(),
    }
  }

  /// Objective value at `x`.
  pub fn value(&self, x: &DVector<f64>) -> f64 {
    match self {
      Objective::Quadratic { p, q } => 0.5 * x.dot(&(p * x)) + q.dot(x),
      Objective::Linear { c } => c.dot(x),
    }
  }
}

/// A block of linear constraints `lhs · x (= | ≤) rhs`.
#[derive(Clone, Debug)]
pub struct LinearConstraints {
  pub lhs: DMatrix<f64>,
  pub rhs: DVector<f64>,
}

impl LinearConstraints {
  pub fn new(lhs: DMatrix<f64>, rhs: DVector<f64>) -> Self {
    Self { lhs, rhs }
  }

  /// Number of constraint rows.
  pub fn len(&self) -> usize {
    self.rhs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rhs.is_empty()
  }

  /// Stack two blocks on top of each other.
  pub fn stack(self, other: LinearConstraints) -> Self {
    let cols = self.lhs.ncols();
    let rows = self.len() + other.len();
    let mut lhs = DMatrix::zeros(rows, cols);
    lhs.view_mut((0, 0), (self.len(), cols)).copy_from(&self.lhs);
    lhs
      .view_mut((self.len(), 0), (other.len(), cols))
      .copy_from(&other.lhs);
    let rhs = DVector::from_iterator(rows, self.rhs.iter().chain(other.rhs.iter()).copied());
    Self { lhs, rhs }
  }

  fn check(&self, dim: usize, label: &str) -> Result<()> {
    if self.lhs.ncols() != dim {
      return Err(PortfolioError::invalid(format!(
        "{label} constraint matrix has {} columns, expected {dim}",
        self.lhs.ncols()
      )));
    }
    if self.lhs.nrows() != self.rhs.len() {
      return Err(PortfolioError::invalid(format!(
        "{label} constraint matrix has {} rows but right-hand side has {}",
        self.lhs.nrows(),
        self.rhs.len()
      )));
    }
    if self.lhs.iter().chain(self.rhs.iter()).any(|v| !v.is_finite()) {
      return Err(PortfolioError::invalid(format!(
        "{label} constraints contain non-finite values"
      )));
    }
    Ok(())
  }
}

/// A QP or LP with optional equality (`A x = b`) and inequality (`G x ≤ h`) blocks.
#[derive(Clone, Debug)]
pub struct ConvexProgram {
  pub objective: Objective,
  pub equality: Option<LinearConstraints>,
  pub inequality: Option<LinearConstraints>,
}

impl ConvexProgram {
  /// Program minimizing `½ xᵀ P x + qᵀ x` without constraints.
  pub fn quadratic(p: DMatrix<f64>, q: DVector<f64>) -> Self {
    Self {
      objective: Objective::Quadratic { p, q },
      equality: None,
      inequality: None,
    }
  }

  /// Program minimizing `cᵀ x` without constraints.
  pub fn linear(c: DVector<f64>) -> Self {
    Self {
      objective: Objective::Linear { c },
      equality: None,
      inequality: None,
    }
  }

  /// Append equality rows `lhs · x = rhs`.
  pub fn subject_to_eq(mut self, lhs: DMatrix<f64>, rhs: DVector<f64>) -> Self {
    let block = LinearConstraints::new(lhs, rhs);
    self.equality = Some(match self.equality.take() {
      Some(existing) => existing.stack(block),
      None => block,
    });
    self
  }

  /// Append inequality rows `lhs · x ≤ rhs`.
  pub fn subject_to_ineq(mut self, lhs: DMatrix<f64>, rhs: DVector<f64>) -> Self {
    let block = LinearConstraints::new(lhs, rhs);
    self.inequality = Some(match self.inequality.take() {
      Some(existing) => existing.stack(block),
      None => block,
    });
    self
  }

  /// Number of decision variables.
  pub fn dim(&self) -> usize {
    self.objective.dim()
  }

  pub fn num_equalities(&self) -> usize {
    self.equality.as_ref().map_or(0, LinearConstraints::len)
  }

  pub fn num_inequalities(&self) -> usize {
    self.inequality.as_ref().map_or(0, LinearConstraints::len)
  }

  /// Check that every block is consistently sized and finite.
  pub fn validate(&self) -> Result<()> {
    let n = self.dim();
    if n == 0 {
      return Err(PortfolioError::invalid("program has no decision variables"));
    }

    match &self.objective {
      Objective::Quadratic { p, q } => {
        if p.nrows() != n || p.ncols() != n {
          return Err(PortfolioError::invalid(format!(
            "quadratic term is {}x{}, expected {n}x{n}",
            p.nrows(),
            p.ncols()
          )));
        }
        if p.iter().chain(q.iter()).any(|v| !v.is_finite()) {
          return Err(PortfolioError::invalid("objective contains non-finite values"));
        }
      }
      Objective::Linear { c } => {
        if c.iter().any(|v| !v.is_finite()) {
          return Err(PortfolioError::invalid("objective contains non-finite values"));
        }
      }
    }

    if let Some(eq) = &self.equality {
      eq.check(n, "equality")?;
    }
    if let Some(ineq) = &self.inequality {
      ineq.check(n, "inequality")?;
    }

    Ok(())
  }
}

/// Termination status reported by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
  Optimal,
  Infeasible,
  Unbounded,
  /// Iteration cap reached or the iterates stalled.
  Unknown,
}

/// Final state of a solve.
#[derive(Clone, Debug)]
pub struct Solution {
  pub status: SolveStatus,
  /// Last primal iterate. Only meaningful when `status` is [`SolveStatus::Optimal`].
  pub x: DVector<f64>,
  /// Objective value at `x`.
  pub objective: f64,
  pub iterations: usize,
}

impl Solution {
  /// Primal solution, or the typed error matching a non-optimal status.
  pub fn into_optimal(self) -> Result<DVector<f64>> {
    match self.status {
      SolveStatus::Optimal => Ok(self.x),
      SolveStatus::Infeasible => Err(PortfolioError::infeasible(format!(
        "solver certified infeasibility after {} iterations",
        self.iterations
      ))),
      SolveStatus::Unbounded => Err(PortfolioError::numerical(format!(
        "objective is unbounded below (detected after {} iterations)",
        self.iterations
      ))),
      SolveStatus::Unknown => Err(PortfolioError::numerical(format!(
        "solver did not converge within {} iterations",
        self.iterations
      ))),
    }
  }
}

/// Per-call solver configuration.
#[derive(Clone, Debug)]
pub struct SolverSettings {
  /// Iteration cap.
  pub max_iters: usize,
  /// Absolute duality-gap tolerance.
  pub abstol: f64,
  /// Relative duality-gap tolerance.
  pub reltol: f64,
  /// Primal and dual residual tolerance (relative to the data norms).
  pub feastol: f64,
  /// Tolerance for accepting an infeasibility or unboundedness certificate.
  pub infeasibility_tol: f64,
  /// Fraction of the distance to the cone boundary taken per step.
  pub step_fraction: f64,
  /// Static diagonal regularization of the KKT system.
  pub regularization: f64,
  /// Iterative refinement passes per KKT solve.
  pub refinement_steps: usize,
  /// Print the backend's own iteration log.
  pub verbose: bool,
}

impl Default for SolverSettings {
  fn default() -> Self {
    Self {
      max_iters: 200,
      abstol: 1e-9,
      reltol: 1e-9,
      feastol: 1e-9,
      infeasibility_tol: 1e-8,
      step_fraction: 0.99,
      regularization: 1e-8,
      refinement_steps: 10,
      verbose: false,
    }
  }
}

/// A backend able to solve a [`ConvexProgram`].
///
/// Implementations must be stateless across calls so that independent
/// portfolios can be solved concurrently.
pub trait ConvexSolver: Sync {
  /// Solve `program`. `Err` is reserved for malformed programs; convergence
  /// problems are reported through [`Solution::status`].
  fn solve(&self, program: &ConvexProgram, settings: &SolverSettings) -> Result<Solution>;
}

/// Solve and unwrap the primal solution, turning every non-optimal status into an error.
pub fn solve_optimal<S: ConvexSolver + ?Sized>(
  solver: &S,
  program: &ConvexProgram,
  settings: &SolverSettings,
) -> Result<DVector<f64>> {
  solver.solve(program, settings)?.into_optimal()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stacking_keeps_row_order() {
    let program = ConvexProgram::linear(DVector::from_vec(vec![1.0, 1.0]))
      .subject_to_ineq(DMatrix::from_row_slice(1, 2, &[1.0, 0.0]), DVector::from_vec(vec![2.0]))
      .subject_to_ineq(DMatrix::from_row_slice(1, 2, &[0.0, 1.0]), DVector::from_vec(vec![3.0]));

    let ineq = program.inequality.as_ref().unwrap();
    assert_eq!(program.num_inequalities(), 2);
    assert_eq!(ineq.lhs[(1, 1)], 1.0);
    assert_eq!(ineq.rhs[1], 3.0);
    assert!(program.validate().is_ok());
  }

  #[test]
  fn validate_rejects_mismatched_blocks() {
    let program = ConvexProgram::quadratic(DMatrix::identity(3, 3), DVector::zeros(3))
      .subject_to_eq(DMatrix::from_element(1, 2, 1.0), DVector::from_vec(vec![1.0]));

    assert!(matches!(
      program.validate(),
      Err(PortfolioError::InvalidInput(_))
    ));
  }

  #[test]
  fn non_optimal_statuses_map_to_errors() {
    let solution = |status| Solution {
      status,
      x: DVector::zeros(1),
      objective: 0.0,
      iterations: 7,
    };

    assert!(solution(SolveStatus::Optimal).into_optimal().is_ok());
    assert!(matches!(
      solution(SolveStatus::Infeasible).into_optimal(),
      Err(PortfolioError::InfeasibleProblem(_))
    ));
    assert!(matches!(
      solution(SolveStatus::Unbounded).into_optimal(),
      Err(PortfolioError::NumericalFailure(_))
    ));
    assert!(matches!(
      solution(SolveStatus::Unknown).into_optimal(),
      Err(PortfolioError::NumericalFailure(_))
    ));
  }
}
