//! # markowitz-rs
//!
//! $$
//! \min_{\mathbf{w}} \ \tfrac12\mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.} \quad \mathbf{1}^\top\mathbf{w}=1,\ \mu^\top\mathbf{w}=r^\*
//! $$
//!
//! Mean-variance portfolio optimization. Expected returns and a covariance
//! matrix are turned into quadratic programs for the minimum-variance,
//! Markowitz and tangency portfolios (long-only, long/short and, for the
//! Markowitz case, market-neutral), solved by a pluggable convex solver and
//! post-processed into clean weight vectors.

pub mod error;
pub mod portfolio;
pub mod solver;

pub use error::PortfolioError;
pub use error::Result;
