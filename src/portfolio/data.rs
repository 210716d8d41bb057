//! # Return Data
//!
//! $$
//! \hat\mu_i=\frac1T\sum_{t=1}^T r_{t,i},\qquad
//! \hat\Sigma_{ij}=\frac1{T-1}\sum_{t=1}^T (r_{t,i}-\hat\mu_i)(r_{t,j}-\hat\mu_j)
//! $$
//!
//! Dated return tables and the sample statistics fed into the optimizers.

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use super::types::AssetUniverse;
use super::validation::validate_covariance;
use super::validation::validate_mean;
use crate::error::PortfolioError;
use crate::error::Result;

/// `T × N` table of per-period asset returns indexed by date.
#[derive(Clone, Debug)]
pub struct ReturnSeries {
  assets: AssetUniverse,
  index: Vec<NaiveDate>,
  returns: Array2<f64>,
}

impl ReturnSeries {
  /// Rows are observations, columns follow `assets`. The index must be
  /// strictly increasing and hold at least two dates.
  pub fn new(assets: AssetUniverse, index: Vec<NaiveDate>, returns: Array2<f64>) -> Result<Self> {
    let (rows, cols) = returns.dim();
    if cols != assets.len() {
      return Err(PortfolioError::invalid(format!(
        "return table has {cols} columns for {} assets",
        assets.len()
      )));
    }
    if rows != index.len() {
      return Err(PortfolioError::invalid(format!(
        "return table has {rows} rows for {} dates",
        index.len()
      )));
    }
    if rows < 2 {
      return Err(PortfolioError::invalid(format!(
        "at least two observations are needed, got {rows}"
      )));
    }
    if returns.iter().any(|r| !r.is_finite()) {
      return Err(PortfolioError::invalid("return table contains non-finite values"));
    }
    if let Some(pair) = index.windows(2).find(|pair| pair[0] >= pair[1]) {
      return Err(PortfolioError::invalid(format!(
        "dates must be strictly increasing, {} is followed by {}",
        pair[0], pair[1]
      )));
    }

    Ok(Self {
      assets,
      index,
      returns,
    })
  }

  pub fn assets(&self) -> &AssetUniverse {
    &self.assets
  }

  pub fn index(&self) -> &[NaiveDate] {
    &self.index
  }

  pub fn returns(&self) -> ArrayView2<'_, f64> {
    self.returns.view()
  }

  /// Number of observations.
  pub fn len(&self) -> usize {
    self.index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.index.is_empty()
  }
}

/// Expected returns and covariance keyed by an asset universe.
#[derive(Clone, Debug)]
pub struct SampleStatistics {
  pub assets: AssetUniverse,
  pub mean: Array1<f64>,
  pub covariance: Array2<f64>,
}

impl SampleStatistics {
  /// Wrap externally estimated statistics after checking them against `assets`.
  pub fn new(
    assets: AssetUniverse,
    mean: Array1<f64>,
    covariance: Array2<f64>,
    symmetry_tolerance: f64,
  ) -> Result<Self> {
    validate_covariance(covariance.view(), symmetry_tolerance)?;
    if covariance.nrows() != assets.len() {
      return Err(PortfolioError::invalid(format!(
        "covariance matrix is {0}x{0} for {1} assets",
        covariance.nrows(),
        assets.len()
      )));
    }
    validate_mean(mean.view(), assets.len())?;

    Ok(Self {
      assets,
      mean,
      covariance,
    })
  }

  pub fn len(&self) -> usize {
    self.assets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.assets.is_empty()
  }
}

/// Column means of a `T × N` return table.
pub fn mean_returns(returns: ArrayView2<f64>) -> Result<Array1<f64>> {
  returns
    .mean_axis(Axis(0))
    .ok_or_else(|| PortfolioError::invalid("cannot average an empty return table"))
}

/// Bessel-corrected sample covariance of a `T × N` return table.
pub fn sample_covariance(returns: ArrayView2<f64>) -> Result<Array2<f64>> {
  let observations = returns.nrows();
  if observations < 2 {
    return Err(PortfolioError::invalid(format!(
      "sample covariance needs at least two observations, got {observations}"
    )));
  }

  returns
    .t()
    .cov(1.0)
    .map_err(|_| PortfolioError::invalid("cannot estimate covariance of an empty return table"))
}

/// Sample mean and covariance of a validated return series.
pub fn sample_statistics(series: &ReturnSeries) -> Result<SampleStatistics> {
  let mean = mean_returns(series.returns())?;
  let covariance = sample_covariance(series.returns())?;

  Ok(SampleStatistics {
    assets: series.assets().clone(),
    mean,
    covariance,
  })
}
