//! # Errors
//!
//! $$
//! \texttt{Result}<T> = T \ \lor\ \texttt{PortfolioError}
//! $$
//!
//! Typed failure modes shared by the solver and portfolio layers.

use thiserror::Error;

/// Failure modes of portfolio construction and evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  /// Dimension mismatch, malformed covariance or non-finite inputs.
  #[error("invalid input: {0}")]
  InvalidInput(String),
  /// The constraints admit no solution.
  #[error("infeasible problem: {0}")]
  InfeasibleProblem(String),
  /// Solver non-convergence or a division by a vanishing quantity.
  #[error("numerical failure: {0}")]
  NumericalFailure(String),
  /// A zero-variance portfolio was handed to the evaluator.
  #[error("portfolio variance is exactly zero, Sharpe ratio is undefined")]
  DegenerateVariance,
}

pub type Result<T, E = PortfolioError> = std::result::Result<T, E>;

impl PortfolioError {
  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidInput(msg.into())
  }

  pub(crate) fn infeasible(msg: impl Into<String>) -> Self {
    Self::InfeasibleProblem(msg.into())
  }

  pub(crate) fn numerical(msg: impl Into<String>) -> Self {
    Self::NumericalFailure(msg.into())
  }
}
