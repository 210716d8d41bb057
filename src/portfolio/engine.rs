//! # Portfolio Optimizer
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}(\mu, \Sigma, \mathcal C)
//! $$
//!
//! High-level entry point holding the solver backend and per-call configuration.

use ndarray::Array1;
use rayon::prelude::*;
use tracing::info;

use super::data::SampleStatistics;
use super::optimizers::efficient_frontier;
use super::optimizers::frontier_targets;
use super::optimizers::markowitz_portfolio;
use super::optimizers::max_return_portfolio;
use super::optimizers::min_variance_portfolio;
use super::optimizers::tangency_portfolio;
use super::performance::evaluate;
use super::types::FrontierPoint;
use super::types::PortfolioConstraints;
use super::types::PortfolioKind;
use super::types::PortfolioResult;
use crate::error::Result;
use crate::solver::ClarabelSolver;
use crate::solver::ConvexSolver;
use crate::solver::SolverSettings;

/// Runtime configuration for [`PortfolioOptimizer`].
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
  /// Settings forwarded to the convex solver on every call.
  pub solver: SolverSettings,
  /// Weights with magnitude below this are treated as solver noise.
  pub weight_tolerance: f64,
  /// Relative tolerance of the covariance symmetry and definiteness checks.
  pub symmetry_tolerance: f64,
  /// Risk-free rate used by the tangency portfolio and Sharpe ratios.
  pub risk_free_rate: f64,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      solver: SolverSettings::default(),
      weight_tolerance: 1e-8,
      symmetry_tolerance: 1e-9,
      risk_free_rate: 0.0,
    }
  }
}

/// Single entry point for mean-variance portfolio construction.
#[derive(Clone, Debug)]
pub struct PortfolioOptimizer<S: ConvexSolver = ClarabelSolver> {
  solver: S,
  config: OptimizerConfig,
}

impl PortfolioOptimizer<ClarabelSolver> {
  /// Optimizer backed by the Clarabel conic solver.
  pub fn new(config: OptimizerConfig) -> Self {
    Self::with_solver(ClarabelSolver, config)
  }
}

impl Default for PortfolioOptimizer<ClarabelSolver> {
  fn default() -> Self {
    Self::new(OptimizerConfig::default())
  }
}

impl<S: ConvexSolver> PortfolioOptimizer<S> {
  pub fn with_solver(solver: S, config: OptimizerConfig) -> Self {
    Self { solver, config }
  }

  pub fn config(&self) -> &OptimizerConfig {
    &self.config
  }

  pub fn solver(&self) -> &S {
    &self.solver
  }

  pub fn min_variance(
    &self,
    stats: &SampleStatistics,
    constraints: PortfolioConstraints,
  ) -> Result<Array1<f64>> {
    min_variance_portfolio(
      &self.solver,
      stats.covariance.view(),
      constraints,
      &self.config,
    )
  }

  pub fn markowitz(
    &self,
    stats: &SampleStatistics,
    target_return: f64,
    constraints: PortfolioConstraints,
  ) -> Result<Array1<f64>> {
    markowitz_portfolio(
      &self.solver,
      stats.mean.view(),
      stats.covariance.view(),
      target_return,
      constraints,
      &self.config,
    )
  }

  pub fn tangency(
    &self,
    stats: &SampleStatistics,
    constraints: PortfolioConstraints,
  ) -> Result<Array1<f64>> {
    tangency_portfolio(
      &self.solver,
      stats.mean.view(),
      stats.covariance.view(),
      constraints,
      &self.config,
    )
  }

  pub fn max_return(&self, stats: &SampleStatistics) -> Result<Array1<f64>> {
    max_return_portfolio(stats.mean.view())
  }

  /// Solve one portfolio and attach its performance metrics.
  ///
  /// The maximum-return portfolio ignores `constraints` and is always long-only.
  pub fn optimize(
    &self,
    stats: &SampleStatistics,
    kind: PortfolioKind,
    constraints: PortfolioConstraints,
  ) -> Result<PortfolioResult> {
    let (weights, constraints) = match kind {
      PortfolioKind::MinimumVariance => (self.min_variance(stats, constraints)?, constraints),
      PortfolioKind::Markowitz { target_return } => {
        (self.markowitz(stats, target_return, constraints)?, constraints)
      }
      PortfolioKind::Tangency => (self.tangency(stats, constraints)?, constraints),
      PortfolioKind::MaximumReturn => (self.max_return(stats)?, PortfolioConstraints::LongOnly),
    };

    let metrics = evaluate(
      weights.view(),
      stats.mean.view(),
      stats.covariance.view(),
      self.config.risk_free_rate,
    )?;
    info!(
      %kind,
      %constraints,
      expected_return = metrics.expected_return,
      volatility = metrics.volatility(),
      sharpe = metrics.sharpe_ratio,
      "portfolio optimized"
    );

    Ok(PortfolioResult {
      kind,
      constraints,
      assets: stats.assets.clone(),
      weights,
      metrics,
    })
  }

  /// Run independent requests in parallel; results follow request order.
  pub fn optimize_all(
    &self,
    stats: &SampleStatistics,
    requests: &[(PortfolioKind, PortfolioConstraints)],
  ) -> Vec<Result<PortfolioResult>> {
    requests
      .par_iter()
      .map(|&(kind, constraints)| self.optimize(stats, kind, constraints))
      .collect()
  }

  /// `points` frontier portfolios from the minimum-variance return to the
  /// highest asset mean.
  pub fn efficient_frontier(
    &self,
    stats: &SampleStatistics,
    constraints: PortfolioConstraints,
    points: usize,
  ) -> Result<Vec<FrontierPoint>> {
    let targets = frontier_targets(
      &self.solver,
      stats.mean.view(),
      stats.covariance.view(),
      constraints,
      points,
      &self.config,
    )?;

    efficient_frontier(
      &self.solver,
      stats.mean.view(),
      stats.covariance.view(),
      &targets,
      constraints,
      &self.config,
    )
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use tracing_test::traced_test;

  use super::*;
  use crate::error::PortfolioError;
  use crate::portfolio::types::AssetUniverse;
  use crate::solver::ConvexProgram;
  use crate::solver::Solution;
  use crate::solver::SolveStatus;

  fn stats() -> SampleStatistics {
    SampleStatistics::new(
      AssetUniverse::new(["bonds", "stocks", "gold"]).unwrap(),
      array![0.03, 0.07, 0.05],
      array![[0.01, 0.002, 0.0], [0.002, 0.04, 0.004], [0.0, 0.004, 0.0225]],
      1e-9,
    )
    .unwrap()
  }

  /// Backend that never converges.
  struct Stalled;

  impl ConvexSolver for Stalled {
    fn solve(&self, program: &ConvexProgram, _settings: &SolverSettings) -> Result<Solution> {
      Ok(Solution {
        status: SolveStatus::Unknown,
        x: nalgebra::DVector::zeros(program.dim()),
        objective: f64::NAN,
        iterations: 100,
      })
    }
  }

  #[test]
  #[traced_test]
  fn optimize_attaches_metrics_and_assets() {
    let optimizer = PortfolioOptimizer::new(OptimizerConfig::default());
    let result = optimizer
      .optimize(&stats(), PortfolioKind::MinimumVariance, PortfolioConstraints::LongOnly)
      .unwrap();

    assert_eq!(result.assets.names(), stats().assets.names());
    assert_abs_diff_eq!(result.weights.sum(), 1.0, epsilon = 1e-14);
    assert!(result.weight("bonds").unwrap() > result.weight("stocks").unwrap());
    assert_abs_diff_eq!(
      result.metrics.expected_return,
      result.weights.dot(&stats().mean),
      epsilon = 1e-15
    );
    assert!(logs_contain("portfolio optimized"));
  }

  #[test]
  fn max_return_is_reported_as_long_only() {
    let optimizer = PortfolioOptimizer::new(OptimizerConfig::default());
    let result = optimizer
      .optimize(&stats(), PortfolioKind::MaximumReturn, PortfolioConstraints::LongShort)
      .unwrap();

    assert_eq!(result.constraints, PortfolioConstraints::LongOnly);
    assert_eq!(result.weight("stocks"), Some(1.0));
  }

  #[test]
  fn batch_matches_sequential_runs() {
    let optimizer = PortfolioOptimizer::new(OptimizerConfig::default());
    let requests = [
      (PortfolioKind::MinimumVariance, PortfolioConstraints::LongOnly),
      (PortfolioKind::Tangency, PortfolioConstraints::LongShort),
      (
        PortfolioKind::Markowitz { target_return: 0.06 },
        PortfolioConstraints::LongOnly,
      ),
      (PortfolioKind::Tangency, PortfolioConstraints::MarketNeutral),
    ];

    let batch = optimizer.optimize_all(&stats(), &requests);
    assert_eq!(batch.len(), requests.len());
    for (result, &(kind, constraints)) in batch.iter().zip(&requests) {
      let single = optimizer.optimize(&stats(), kind, constraints);
      match (result, single) {
        (Ok(a), Ok(b)) => assert_eq!(a.weights, b.weights),
        (Err(a), Err(b)) => assert_eq!(*a, b),
        _ => panic!("batch and sequential runs disagree for {kind}"),
      }
    }
    assert!(matches!(batch[3], Err(PortfolioError::InvalidInput(_))));
  }

  #[test]
  fn non_convergence_surfaces_as_numerical_failure() {
    let optimizer = PortfolioOptimizer::with_solver(Stalled, OptimizerConfig::default());
    assert!(matches!(
      optimizer.min_variance(&stats(), PortfolioConstraints::LongOnly),
      Err(PortfolioError::NumericalFailure(_))
    ));
  }

  #[test]
  fn frontier_starts_at_min_variance() {
    let optimizer = PortfolioOptimizer::new(OptimizerConfig::default());
    let frontier = optimizer
      .efficient_frontier(&stats(), PortfolioConstraints::LongOnly, 5)
      .unwrap();
    let min_var = optimizer
      .min_variance(&stats(), PortfolioConstraints::LongOnly)
      .unwrap();

    assert_eq!(frontier.len(), 5);
    assert_abs_diff_eq!(
      frontier[0].metrics.expected_return,
      min_var.dot(&stats().mean),
      epsilon = 1e-7
    );
    assert_abs_diff_eq!(frontier[4].target_return, 0.07, epsilon = 1e-15);
  }
}
