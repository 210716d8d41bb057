//! # Portfolio Optimizers
//!
//! $$
//! \mathbf{w}^\*=\operatorname{normalize}\big(\operatorname{solve}(\operatorname{build}(\mu,\Sigma))\big)
//! $$
//!
//! Validate, build, solve and normalize pipelines for every portfolio type,
//! plus the maximum-return portfolio and the efficient frontier sweep.

use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use rayon::prelude::*;
use tracing::debug;

use super::builders::markowitz_program;
use super::builders::min_variance_program;
use super::builders::pinned_assets;
use super::builders::tangency_program;
use super::engine::OptimizerConfig;
use super::normalize::normalize_weights;
use super::performance::evaluate;
use super::types::FrontierPoint;
use super::types::PortfolioConstraints;
use super::validation::validate_covariance;
use super::validation::validate_mean;
use super::validation::validate_scalar;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::solver::ConvexProgram;
use crate::solver::ConvexSolver;
use crate::solver::solve_optimal;

fn solve_raw<S: ConvexSolver + ?Sized>(
  solver: &S,
  program: &ConvexProgram,
  config: &OptimizerConfig,
) -> Result<Array1<f64>> {
  let x = solve_optimal(solver, program, &config.solver)?;
  Ok(Array1::from_iter(x.iter().copied()))
}

fn validate_inputs(
  mean: Option<ArrayView1<f64>>,
  cov: ArrayView2<f64>,
  config: &OptimizerConfig,
) -> Result<()> {
  validate_covariance(cov, config.symmetry_tolerance)?;
  if let Some(mean) = mean {
    validate_mean(mean, cov.nrows())?;
  }
  Ok(())
}

/// Weights minimizing `wᵀΣw` under `constraints`.
pub fn min_variance_portfolio<S: ConvexSolver + ?Sized>(
  solver: &S,
  cov: ArrayView2<f64>,
  constraints: PortfolioConstraints,
  config: &OptimizerConfig,
) -> Result<Array1<f64>> {
  validate_inputs(None, cov, config)?;

  let program = min_variance_program(cov, constraints)?;
  let raw = solve_raw(solver, &program, config)?;
  normalize_weights(raw, constraints, config.weight_tolerance)
}

/// Weights minimizing `wᵀΣw` subject to `wᵀμ = target_return`.
pub fn markowitz_portfolio<S: ConvexSolver + ?Sized>(
  solver: &S,
  mean: ArrayView1<f64>,
  cov: ArrayView2<f64>,
  target_return: f64,
  constraints: PortfolioConstraints,
  config: &OptimizerConfig,
) -> Result<Array1<f64>> {
  validate_inputs(Some(mean), cov, config)?;
  validate_scalar(target_return, "target return")?;

  if let Some(assets) = pinned_assets(mean, target_return, constraints) {
    return pinned_min_variance(solver, cov, &assets, config);
  }

  let program = markowitz_program(mean, cov, target_return, constraints)?;
  let raw = solve_raw(solver, &program, config)?;
  normalize_weights(raw, constraints, config.weight_tolerance)
}

/// Long-only minimum variance restricted to `assets`, scattered back to the
/// full universe.
fn pinned_min_variance<S: ConvexSolver + ?Sized>(
  solver: &S,
  cov: ArrayView2<f64>,
  assets: &[usize],
  config: &OptimizerConfig,
) -> Result<Array1<f64>> {
  debug!(?assets, "target return pinned to the extreme assets");

  let mut weights = Array1::zeros(cov.nrows());
  if let [only] = assets {
    weights[*only] = 1.0;
    return Ok(weights);
  }

  let sub = cov.select(Axis(0), assets).select(Axis(1), assets);
  let sub_weights =
    min_variance_portfolio(solver, sub.view(), PortfolioConstraints::LongOnly, config)?;
  for (&i, &w) in assets.iter().zip(sub_weights.iter()) {
    weights[i] = w;
  }
  Ok(weights)
}

/// Weights maximizing the Sharpe ratio at `config.risk_free_rate`.
///
/// The solver works on `y = w / k`; the weights are recovered as
/// `y / Σy`. A non-positive `Σy` means no admissible portfolio has a positive
/// Sharpe ratio.
pub fn tangency_portfolio<S: ConvexSolver + ?Sized>(
  solver: &S,
  mean: ArrayView1<f64>,
  cov: ArrayView2<f64>,
  constraints: PortfolioConstraints,
  config: &OptimizerConfig,
) -> Result<Array1<f64>> {
  validate_inputs(Some(mean), cov, config)?;
  validate_scalar(config.risk_free_rate, "risk-free rate")?;

  let program = tangency_program(mean, cov, config.risk_free_rate, constraints)?;
  let y = solve_raw(solver, &program, config)?;

  let scale = y.sum();
  debug!(scale, "recovering tangency weights from scaled solution");
  if !scale.is_finite() || scale.abs() <= config.weight_tolerance {
    return Err(PortfolioError::numerical(format!(
      "tangency scale Σy = {scale} is too close to zero to recover weights"
    )));
  }
  if scale < 0.0 {
    return Err(PortfolioError::infeasible(format!(
      "no {constraints} portfolio has a positive Sharpe ratio at risk-free rate {}",
      config.risk_free_rate
    )));
  }

  normalize_weights(y / scale, constraints, config.weight_tolerance)
}

/// Equal weights over every asset attaining the highest expected return.
pub fn max_return_portfolio(mean: ArrayView1<f64>) -> Result<Array1<f64>> {
  if mean.is_empty() {
    return Err(PortfolioError::invalid("mean vector is empty"));
  }
  validate_mean(mean, mean.len())?;

  let best = mean.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let winners = mean.iter().filter(|&&m| m == best).count();
  let share = 1.0 / winners as f64;

  Ok(mean.mapv(|m| if m == best { share } else { 0.0 }))
}

/// `points` evenly spaced targets from the minimum-variance return to the
/// highest asset mean.
pub fn frontier_targets<S: ConvexSolver + ?Sized>(
  solver: &S,
  mean: ArrayView1<f64>,
  cov: ArrayView2<f64>,
  constraints: PortfolioConstraints,
  points: usize,
  config: &OptimizerConfig,
) -> Result<Vec<f64>> {
  if constraints == PortfolioConstraints::MarketNeutral {
    return Err(PortfolioError::invalid(
      "efficient frontier is defined for fully invested portfolios only",
    ));
  }
  if points == 0 {
    return Err(PortfolioError::invalid("efficient frontier needs at least one point"));
  }
  validate_inputs(Some(mean), cov, config)?;

  let w = min_variance_portfolio(solver, cov, constraints, config)?;
  let lo = w.dot(&mean);
  let hi = mean.iter().copied().fold(f64::NEG_INFINITY, f64::max);

  if points == 1 {
    return Ok(vec![lo]);
  }
  Ok(Array1::linspace(lo, hi, points).to_vec())
}

/// Markowitz portfolio and metrics for each target, solved in parallel.
///
/// Points come back in target order; the first failing target aborts the sweep.
pub fn efficient_frontier<S: ConvexSolver + ?Sized>(
  solver: &S,
  mean: ArrayView1<f64>,
  cov: ArrayView2<f64>,
  targets: &[f64],
  constraints: PortfolioConstraints,
  config: &OptimizerConfig,
) -> Result<Vec<FrontierPoint>> {
  debug!(points = targets.len(), %constraints, "sweeping efficient frontier");

  targets
    .par_iter()
    .map(|&target_return| {
      let weights = markowitz_portfolio(solver, mean, cov, target_return, constraints, config)?;
      let metrics = evaluate(weights.view(), mean, cov, config.risk_free_rate)?;
      Ok(FrontierPoint {
        target_return,
        weights,
        metrics,
      })
    })
    .collect()
}
