//! # Input Validation
//!
//! $$
//! \Sigma = \Sigma^\top,\quad \Sigma_{ii}\ge 0,\quad \lambda_{\min}(\Sigma)\ge 0
//! $$
//!
//! Checks run before any program is built.

use approx::relative_eq;
use nalgebra::DMatrix;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

use crate::error::PortfolioError;
use crate::error::Result;

/// Square, finite, symmetric, non-negative diagonal and positive semi-definite.
pub fn validate_covariance(cov: ArrayView2<f64>, tolerance: f64) -> Result<()> {
  let (rows, cols) = cov.dim();
  if rows == 0 {
    return Err(PortfolioError::invalid("covariance matrix is empty"));
  }
  if rows != cols {
    return Err(PortfolioError::invalid(format!(
      "covariance matrix must be square, got {rows}x{cols}"
    )));
  }
  if cov.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::invalid("covariance matrix contains non-finite values"));
  }

  for i in 0..rows {
    if cov[[i, i]] < 0.0 {
      return Err(PortfolioError::invalid(format!(
        "covariance diagonal entry {i} is negative ({})",
        cov[[i, i]]
      )));
    }
    for j in (i + 1)..rows {
      if !relative_eq!(
        cov[[i, j]],
        cov[[j, i]],
        epsilon = tolerance,
        max_relative = tolerance
      ) {
        return Err(PortfolioError::invalid(format!(
          "covariance matrix is not symmetric at ({i}, {j}): {} vs {}",
          cov[[i, j]],
          cov[[j, i]]
        )));
      }
    }
  }

  let eigenvalues = DMatrix::from_fn(rows, rows, |i, j| 0.5 * (cov[[i, j]] + cov[[j, i]]))
    .symmetric_eigenvalues();
  let scale = eigenvalues.iter().fold(0.0_f64, |acc, l| acc.max(l.abs()));
  let smallest = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
  if smallest < -tolerance * scale {
    return Err(PortfolioError::invalid(format!(
      "covariance matrix is not positive semi-definite (smallest eigenvalue {smallest})"
    )));
  }

  Ok(())
}

/// Finite vector of the expected dimension.
pub fn validate_mean(mean: ArrayView1<f64>, n: usize) -> Result<()> {
  if mean.len() != n {
    return Err(PortfolioError::invalid(format!(
      "mean vector has {} entries, covariance matrix is {n}x{n}",
      mean.len()
    )));
  }
  if mean.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::invalid("mean vector contains non-finite values"));
  }
  Ok(())
}

pub fn validate_scalar(value: f64, label: &str) -> Result<()> {
  if value.is_finite() {
    Ok(())
  } else {
    Err(PortfolioError::invalid(format!("{label} must be finite, got {value}")))
  }
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;

  #[test]
  fn accepts_valid_covariance() {
    let cov = array![[0.04, 0.01], [0.01, 0.09]];
    assert!(validate_covariance(cov.view(), 1e-9).is_ok());
  }

  #[test]
  fn accepts_all_zero_covariance() {
    let cov = ndarray::Array2::<f64>::zeros((3, 3));
    assert!(validate_covariance(cov.view(), 1e-9).is_ok());
  }

  #[test]
  fn rejects_asymmetric_covariance() {
    let cov = array![[0.04, 0.01], [0.02, 0.09]];
    assert!(matches!(
      validate_covariance(cov.view(), 1e-9),
      Err(PortfolioError::InvalidInput(_))
    ));
  }

  #[test]
  fn rejects_negative_diagonal() {
    let cov = array![[-0.04, 0.0], [0.0, 0.09]];
    assert!(validate_covariance(cov.view(), 1e-9).is_err());
  }

  #[test]
  fn rejects_indefinite_covariance() {
    // Eigenvalues 3 and -1.
    let cov = array![[1.0, 2.0], [2.0, 1.0]];
    assert!(validate_covariance(cov.view(), 1e-9).is_err());
  }

  #[test]
  fn rejects_non_square_and_mismatched_mean() {
    let cov = array![[0.04, 0.01, 0.0], [0.01, 0.09, 0.0]];
    assert!(validate_covariance(cov.view(), 1e-9).is_err());
    assert!(validate_mean(array![0.1, 0.2].view(), 3).is_err());
    assert!(validate_mean(array![0.1, f64::NAN].view(), 2).is_err());
  }
}
