//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Mean-variance portfolio construction: problem builders, solver pipelines,
//! weight normalization and performance evaluation.

pub mod builders;
pub mod data;
pub mod engine;
pub mod normalize;
pub mod optimizers;
pub mod performance;
pub mod types;
pub mod validation;

pub use builders::achievable_return_range;
pub use builders::markowitz_program;
pub use builders::min_variance_program;
pub use builders::pinned_assets;
pub use builders::tangency_program;
pub use data::ReturnSeries;
pub use data::SampleStatistics;
pub use data::mean_returns;
pub use data::sample_covariance;
pub use data::sample_statistics;
pub use engine::OptimizerConfig;
pub use engine::PortfolioOptimizer;
pub use normalize::normalize_weights;
pub use normalize::truncate_weights;
pub use optimizers::efficient_frontier;
pub use optimizers::frontier_targets;
pub use optimizers::markowitz_portfolio;
pub use optimizers::max_return_portfolio;
pub use optimizers::min_variance_portfolio;
pub use optimizers::tangency_portfolio;
pub use performance::evaluate;
pub use types::AssetUniverse;
pub use types::FrontierPoint;
pub use types::PerformanceMetrics;
pub use types::PortfolioConstraints;
pub use types::PortfolioKind;
pub use types::PortfolioResult;
pub use validation::validate_covariance;
