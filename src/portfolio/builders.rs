//! # Problem Builders
//!
//! $$
//! \min_{\mathbf{y}} \ \tfrac12\mathbf{y}^\top\Sigma\mathbf{y}
//! \quad \text{s.t.} \quad (\mu - r_f\mathbf{1})^\top\mathbf{y}=1,
//! \qquad \mathbf{w}=\mathbf{y}/\mathbf{1}^\top\mathbf{y}
//! $$
//!
//! Translation of each portfolio objective into a [`ConvexProgram`]. The
//! objective is always `½ wᵀ Σ w`; the constraint variant contributes the
//! budget row and, for long-only portfolios, the sign rows `-w ≤ 0`.

use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use tracing::debug;

use super::types::PortfolioConstraints;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::solver::ConvexProgram;

pub(crate) fn to_dmatrix(a: ArrayView2<f64>) -> DMatrix<f64> {
  let (rows, cols) = a.dim();
  DMatrix::from_fn(rows, cols, |i, j| a[[i, j]])
}

fn risk_objective(cov: ArrayView2<f64>) -> ConvexProgram {
  let n = cov.nrows();
  ConvexProgram::quadratic(to_dmatrix(cov), DVector::zeros(n))
}

fn with_budget(program: ConvexProgram, n: usize, budget: f64) -> ConvexProgram {
  program.subject_to_eq(DMatrix::from_element(1, n, 1.0), DVector::from_element(1, budget))
}

fn with_sign(program: ConvexProgram, n: usize, constraints: PortfolioConstraints) -> ConvexProgram {
  match constraints {
    PortfolioConstraints::LongOnly => {
      program.subject_to_ineq(-DMatrix::<f64>::identity(n, n), DVector::zeros(n))
    }
    PortfolioConstraints::LongShort | PortfolioConstraints::MarketNeutral => program,
  }
}

fn reject_market_neutral(constraints: PortfolioConstraints, what: &str) -> Result<()> {
  if constraints == PortfolioConstraints::MarketNeutral {
    return Err(PortfolioError::invalid(format!(
      "{what} portfolios are not defined for market-neutral weights"
    )));
  }
  Ok(())
}

fn log_program(kind: &str, constraints: PortfolioConstraints, program: &ConvexProgram) {
  debug!(
    kind,
    %constraints,
    dim = program.dim(),
    equalities = program.num_equalities(),
    inequalities = program.num_inequalities(),
    "built portfolio program"
  );
}

/// Range of expected returns reachable by weights satisfying `constraints`.
///
/// Unrestricted weights reach every return unless all means coincide, in which
/// case only that common mean (or zero for market-neutral weights) is reachable.
pub fn achievable_return_range(
  mean: ArrayView1<f64>,
  constraints: PortfolioConstraints,
) -> (f64, f64) {
  let lo = mean.iter().copied().fold(f64::INFINITY, f64::min);
  let hi = mean.iter().copied().fold(f64::NEG_INFINITY, f64::max);

  match constraints {
    PortfolioConstraints::LongOnly => (lo, hi),
    _ if hi > lo => (f64::NEG_INFINITY, f64::INFINITY),
    PortfolioConstraints::LongShort => (lo, lo),
    PortfolioConstraints::MarketNeutral => (0.0, 0.0),
  }
}

fn return_slack(lo: f64, hi: f64) -> f64 {
  1e-12 * lo.abs().max(hi.abs()).max(1.0)
}

/// Assets that must carry the whole long-only portfolio when `target_return`
/// sits at an end of the achievable range.
///
/// Such a target leaves no strictly feasible point: only assets whose mean
/// equals that end may hold weight. Returns `None` for interior targets, for
/// other constraint variants and when every asset has the same mean.
pub fn pinned_assets(
  mean: ArrayView1<f64>,
  target_return: f64,
  constraints: PortfolioConstraints,
) -> Option<Vec<usize>> {
  if constraints != PortfolioConstraints::LongOnly {
    return None;
  }

  let (lo, hi) = achievable_return_range(mean, constraints);
  let slack = return_slack(lo, hi);
  if hi - lo <= slack {
    return None;
  }
  let edge = if (target_return - hi).abs() <= slack {
    hi
  } else if (target_return - lo).abs() <= slack {
    lo
  } else {
    return None;
  };

  Some(
    mean
      .iter()
      .enumerate()
      .filter(|&(_, &m)| (m - edge).abs() <= slack)
      .map(|(i, _)| i)
      .collect(),
  )
}

/// `min ½ wᵀΣw` s.t. `Σw = 1` (and `w ≥ 0` when long-only).
pub fn min_variance_program(
  cov: ArrayView2<f64>,
  constraints: PortfolioConstraints,
) -> Result<ConvexProgram> {
  reject_market_neutral(constraints, "minimum-variance")?;

  let n = cov.nrows();
  let program = with_sign(
    with_budget(risk_objective(cov), n, constraints.budget()),
    n,
    constraints,
  );
  log_program("minimum variance", constraints, &program);
  Ok(program)
}

/// `min ½ wᵀΣw` s.t. `Σw = budget`, `μᵀw = target` and the sign rows.
///
/// Fails with [`PortfolioError::InfeasibleProblem`] when the target lies
/// outside [`achievable_return_range`].
pub fn markowitz_program(
  mean: ArrayView1<f64>,
  cov: ArrayView2<f64>,
  target_return: f64,
  constraints: PortfolioConstraints,
) -> Result<ConvexProgram> {
  let n = cov.nrows();
  let (lo, hi) = achievable_return_range(mean, constraints);
  let slack = return_slack(lo, hi);
  if target_return < lo - slack || target_return > hi + slack {
    return Err(PortfolioError::infeasible(format!(
      "target return {target_return} is outside the achievable range [{lo}, {hi}] \
       for {constraints} weights"
    )));
  }

  let returns_row = DMatrix::from_iterator(1, n, mean.iter().copied());
  let program = with_sign(
    with_budget(risk_objective(cov), n, constraints.budget())
      .subject_to_eq(returns_row, DVector::from_element(1, target_return)),
    n,
    constraints,
  );
  log_program("markowitz", constraints, &program);
  Ok(program)
}

/// Sharpe maximisation in the scaled variable `y = w / k`:
/// `min ½ yᵀΣy` s.t. `(μ - r_f)ᵀ y = 1` (and `y ≥ 0` when long-only).
///
/// Fails with [`PortfolioError::InfeasibleProblem`] when no admissible
/// portfolio has a positive excess return.
pub fn tangency_program(
  mean: ArrayView1<f64>,
  cov: ArrayView2<f64>,
  risk_free_rate: f64,
  constraints: PortfolioConstraints,
) -> Result<ConvexProgram> {
  reject_market_neutral(constraints, "tangency")?;

  let n = cov.nrows();
  let excess: Vec<f64> = mean.iter().map(|m| m - risk_free_rate).collect();
  let best = excess.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let attainable = match constraints {
    PortfolioConstraints::LongOnly => best > 0.0,
    _ => excess.iter().any(|&e| e != 0.0),
  };
  if !attainable {
    return Err(PortfolioError::infeasible(format!(
      "no {constraints} portfolio earns more than the risk-free rate {risk_free_rate}"
    )));
  }

  let program = with_sign(
    risk_objective(cov).subject_to_eq(
      DMatrix::from_row_slice(1, n, &excess),
      DVector::from_element(1, 1.0),
    ),
    n,
    constraints,
  );
  log_program("tangency", constraints, &program);
  Ok(program)
}
