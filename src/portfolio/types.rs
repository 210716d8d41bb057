//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Shared enums and result containers for portfolio optimization.

use std::collections::HashSet;
use std::fmt::Display;

use impl_new_derive::ImplNew;
use ndarray::Array1;

use crate::error::PortfolioError;
use crate::error::Result;

/// Ordered, duplicate-free set of asset identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetUniverse {
  names: Vec<String>,
}

impl AssetUniverse {
  pub fn new<I, S>(names: I) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    if names.is_empty() {
      return Err(PortfolioError::invalid("asset universe is empty"));
    }

    let mut seen = HashSet::with_capacity(names.len());
    for name in &names {
      if !seen.insert(name.as_str()) {
        return Err(PortfolioError::invalid(format!("duplicate asset identifier '{name}'")));
      }
    }

    Ok(Self { names })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }

  pub fn index_of(&self, name: &str) -> Option<usize> {
    self.names.iter().position(|n| n == name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

/// Admissible weight set.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortfolioConstraints {
  /// `w ≥ 0`, `Σw = 1`.
  #[default]
  LongOnly,
  /// `Σw = 1`, shorting allowed.
  LongShort,
  /// `Σw = 0`, shorting allowed. Markowitz target-return portfolios only.
  MarketNeutral,
}

impl PortfolioConstraints {
  /// Required sum of the weights.
  pub fn budget(&self) -> f64 {
    match self {
      PortfolioConstraints::MarketNeutral => 0.0,
      PortfolioConstraints::LongOnly | PortfolioConstraints::LongShort => 1.0,
    }
  }

  pub fn allows_short(&self) -> bool {
    !matches!(self, PortfolioConstraints::LongOnly)
  }
}

impl Display for PortfolioConstraints {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PortfolioConstraints::LongOnly => write!(f, "long-only"),
      PortfolioConstraints::LongShort => write!(f, "long/short"),
      PortfolioConstraints::MarketNeutral => write!(f, "market-neutral"),
    }
  }
}

/// Portfolio objective.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PortfolioKind {
  /// Lowest variance without a return target.
  MinimumVariance,
  /// Lowest variance at a given expected return.
  Markowitz { target_return: f64 },
  /// Highest Sharpe ratio.
  Tangency,
  /// Equal weights over the assets with the highest expected return.
  MaximumReturn,
}

impl Display for PortfolioKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PortfolioKind::MinimumVariance => write!(f, "minimum variance"),
      PortfolioKind::Markowitz { target_return } => {
        write!(f, "Markowitz (target return {target_return})")
      }
      PortfolioKind::Tangency => write!(f, "tangency"),
      PortfolioKind::MaximumReturn => write!(f, "maximum return"),
    }
  }
}

/// Expected return, variance and Sharpe ratio of a weight vector.
#[derive(ImplNew, Clone, Copy, Debug, Default, PartialEq)]
pub struct PerformanceMetrics {
  pub expected_return: f64,
  pub expected_variance: f64,
  /// `(expected_return - risk_free) / sqrt(expected_variance)`.
  pub sharpe_ratio: f64,
}

impl PerformanceMetrics {
  pub fn volatility(&self) -> f64 {
    self.expected_variance.sqrt()
  }
}

/// Output of a portfolio optimization run.
#[derive(Clone, Debug)]
pub struct PortfolioResult {
  pub kind: PortfolioKind,
  pub constraints: PortfolioConstraints,
  pub assets: AssetUniverse,
  /// Final portfolio weights, ordered like `assets`.
  pub weights: Array1<f64>,
  pub metrics: PerformanceMetrics,
}

impl PortfolioResult {
  /// Weight of a single asset.
  pub fn weight(&self, asset: &str) -> Option<f64> {
    self.assets.index_of(asset).map(|i| self.weights[i])
  }

  /// `(asset, weight)` pairs in universe order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.assets.iter().zip(self.weights.iter().copied())
  }
}

/// One point of an efficient frontier sweep.
#[derive(Clone, Debug)]
pub struct FrontierPoint {
  pub target_return: f64,
  pub weights: Array1<f64>,
  pub metrics: PerformanceMetrics,
}
