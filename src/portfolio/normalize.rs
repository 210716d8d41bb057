//! # Weight Normalization
//!
//! $$
//! \tilde w_i = \frac{w_i \mathbb 1_{\{|w_i|\ge\varepsilon\}}}{\sum_j w_j \mathbb 1_{\{|w_j|\ge\varepsilon\}}}
//! $$
//!
//! Cleanup of raw solver output and user-facing weight truncation.

use ndarray::Array1;
use tracing::warn;

use super::types::PortfolioConstraints;
use crate::error::PortfolioError;
use crate::error::Result;

/// Bring a raw solver vector onto the exact constraint set.
///
/// Long-only: weights in `[-ε, ε)` are snapped to zero, then the vector is
/// rescaled to sum to one. Long/short: rescaled only when the sum drifts more
/// than `ε` from one. Market-neutral: a drift of more than `ε` from zero is
/// removed by shifting every weight by `-sum / N`.
pub fn normalize_weights(
  raw: Array1<f64>,
  constraints: PortfolioConstraints,
  tolerance: f64,
) -> Result<Array1<f64>> {
  if raw.is_empty() {
    return Err(PortfolioError::invalid("cannot normalize an empty weight vector"));
  }
  if raw.iter().any(|w| !w.is_finite()) {
    return Err(PortfolioError::numerical("solver returned non-finite weights"));
  }

  let mut weights = raw;
  match constraints {
    PortfolioConstraints::LongOnly => {
      let most_negative = weights.iter().copied().fold(f64::INFINITY, f64::min);
      if most_negative < -tolerance {
        return Err(PortfolioError::numerical(format!(
          "long-only solution has weight {most_negative} below -{tolerance}"
        )));
      }

      weights.mapv_inplace(|w| if w < tolerance { 0.0 } else { w });
      let sum = weights.sum();
      if sum <= tolerance {
        return Err(PortfolioError::numerical(format!(
          "long-only weights sum to {sum} after snapping, cannot rescale"
        )));
      }
      weights /= sum;
    }
    PortfolioConstraints::LongShort => {
      let sum = weights.sum();
      if (sum - 1.0).abs() > tolerance {
        if sum.abs() <= tolerance {
          return Err(PortfolioError::numerical(format!(
            "long/short weights sum to {sum}, cannot rescale to one"
          )));
        }
        warn!(sum, "rescaling long/short weights to unit budget");
        weights /= sum;
      }
    }
    PortfolioConstraints::MarketNeutral => {
      let sum = weights.sum();
      if sum.abs() > tolerance {
        warn!(sum, "shifting market-neutral weights to zero budget");
        let shift = sum / weights.len() as f64;
        weights -= shift;
      }
    }
  }

  Ok(weights)
}

/// Zero every weight with `|w| < min_weight`, optionally rescaling to a unit sum.
pub fn truncate_weights(
  weights: &Array1<f64>,
  min_weight: f64,
  rescale: bool,
) -> Result<Array1<f64>> {
  if !min_weight.is_finite() || min_weight < 0.0 {
    return Err(PortfolioError::invalid(format!(
      "minimum weight must be finite and non-negative, got {min_weight}"
    )));
  }

  let mut adjusted = weights.mapv(|w| if w.abs() < min_weight { 0.0 } else { w });
  if rescale {
    let sum = adjusted.sum();
    if sum == 0.0 || !sum.is_finite() {
      return Err(PortfolioError::numerical(format!(
        "cannot rescale weights summing to {sum}"
      )));
    }
    adjusted /= sum;
  }

  Ok(adjusted)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn long_only_snaps_noise_and_rescales() {
    let raw = array![0.5, -1e-16, 0.3, 5e-10, 0.2000001];
    let w = normalize_weights(raw, PortfolioConstraints::LongOnly, 1e-9).unwrap();

    assert_eq!(w[1], 0.0);
    assert_eq!(w[3], 0.0);
    assert!(w.iter().all(|&x| x >= 0.0));
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-15);
  }

  #[test]
  fn long_only_rejects_material_short_positions() {
    let raw = array![0.6, -0.1, 0.5];
    assert!(matches!(
      normalize_weights(raw, PortfolioConstraints::LongOnly, 1e-9),
      Err(PortfolioError::NumericalFailure(_))
    ));
  }

  #[test]
  fn long_short_within_tolerance_is_untouched() {
    let raw = array![1.2, -0.4, 0.2 + 1e-12];
    let w = normalize_weights(raw.clone(), PortfolioConstraints::LongShort, 1e-9).unwrap();
    assert_eq!(w, raw);

    let drifted = array![1.2, -0.4, 0.3];
    let w = normalize_weights(drifted, PortfolioConstraints::LongShort, 1e-9).unwrap();
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-15);
    assert!(w[1] < 0.0);
  }

  #[test]
  fn market_neutral_drift_is_removed() {
    let raw = array![0.5, -0.3, -0.19];
    let w = normalize_weights(raw, PortfolioConstraints::MarketNeutral, 1e-9).unwrap();
    assert_abs_diff_eq!(w.sum(), 0.0, epsilon = 1e-15);
  }

  #[test]
  fn non_finite_weights_are_a_numerical_failure() {
    let raw = array![0.5, f64::NAN];
    assert!(matches!(
      normalize_weights(raw, PortfolioConstraints::LongShort, 1e-9),
      Err(PortfolioError::NumericalFailure(_))
    ));
  }

  #[test]
  fn truncate_without_rescale_only_zeroes_small_weights() {
    let raw = array![0.5, 0.4, 0.01, 0.09];
    let w = truncate_weights(&raw, 0.05, false).unwrap();
    assert_eq!(w, array![0.5, 0.4, 0.0, 0.09]);
  }

  #[test]
  fn truncate_with_rescale_sums_to_one() {
    let raw = array![0.5, 0.4, 0.01, 0.8];
    let w = truncate_weights(&raw, 0.0, true).unwrap();
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn truncate_cannot_rescale_zero_sum() {
    let raw = array![0.01, 0.02];
    assert!(matches!(
      truncate_weights(&raw, 0.05, true),
      Err(PortfolioError::NumericalFailure(_))
    ));
  }
}
