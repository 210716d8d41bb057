//! # Performance Evaluation
//!
//! $$
//! \mathbb E[R_p]=\mathbf{w}^\top\mu,\qquad
//! \sigma_p^2=\mathbf{w}^\top\Sigma\mathbf{w},\qquad
//! S=\frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Expected return, variance and Sharpe ratio of a weight vector.

use ndarray::ArrayView1;
use ndarray::ArrayView2;

use super::types::PerformanceMetrics;
use crate::error::PortfolioError;
use crate::error::Result;

/// Expected return, variance and Sharpe ratio of `weights`.
///
/// A variance within rounding noise of zero, `|σ²| ≤ n·ε·max|Σ|·‖w‖₁²`, has
/// no meaningful Sharpe ratio and yields [`PortfolioError::DegenerateVariance`].
pub fn evaluate(
  weights: ArrayView1<f64>,
  mean: ArrayView1<f64>,
  cov: ArrayView2<f64>,
  risk_free_rate: f64,
) -> Result<PerformanceMetrics> {
  let n = weights.len();
  if mean.len() != n || cov.dim() != (n, n) {
    return Err(PortfolioError::invalid(format!(
      "cannot evaluate {n} weights against a mean of length {} and a {}x{} covariance",
      mean.len(),
      cov.nrows(),
      cov.ncols()
    )));
  }

  let expected_return = weights.dot(&mean);
  let expected_variance = weights.dot(&cov.dot(&weights));

  let cov_scale = cov.iter().fold(0.0_f64, |acc, c| acc.max(c.abs()));
  let gross = weights.iter().map(|w| w.abs()).sum::<f64>();
  let rounding = n as f64 * f64::EPSILON * cov_scale * gross * gross;
  if expected_variance.abs() <= rounding {
    return Err(PortfolioError::DegenerateVariance);
  }
  if !expected_variance.is_finite() || expected_variance < 0.0 {
    return Err(PortfolioError::numerical(format!(
      "portfolio variance {expected_variance} is not a valid variance"
    )));
  }

  let sharpe_ratio = (expected_return - risk_free_rate) / expected_variance.sqrt();
  if !sharpe_ratio.is_finite() {
    return Err(PortfolioError::numerical(format!(
      "Sharpe ratio is not finite (return {expected_return}, variance {expected_variance})"
    )));
  }

  Ok(PerformanceMetrics::new(
    expected_return,
    expected_variance,
    sharpe_ratio,
  ))
}
