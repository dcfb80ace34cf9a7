//! `marketsize-sizing`: cross-source market size estimation engine.
//!
//! Pure engine crate: receives pre-loaded series, returns estimate tables,
//! segment splits and fiscal-year conversions. No CLI dependencies.

pub mod average;
pub mod category;
pub mod config;
pub mod error;
pub mod estimator;
pub mod export;
pub mod fiscal;
pub mod load;
pub mod mapping;
pub mod model;
pub mod proportions;
pub mod ratio;
pub mod segment;
pub mod summary;

pub use average::adjusted_mean;
pub use category::Category;
pub use config::SizingConfig;
pub use error::SizingError;
pub use estimator::{estimate_all, run};
pub use mapping::{resolve, resolve_field, CategoryMapping};
pub use model::{EstimateResult, RunYears, SeriesSet, SourceSeries};
