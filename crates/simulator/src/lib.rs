//! Experiment driver for the order-mesh simulator.
//!
//! An experiment is one [`ExecutionConfig`]: a simulation setup plus the
//! scenario, engine and performance candidates, repeated over several seeds.
//! [`Execution`] runs every seed on a rayon pool and folds the measurements
//! into an [`ExecutionReport`].
//!
//! # Example
//!
//! ```ignore
//! use meshsim_simulator::{Execution, ExecutionConfig};
//!
//! let config = ExecutionConfig::from_toml_file("configs/default.toml")?
//!     .with_runs(8)
//!     .with_seed(42);
//!
//! let report = Execution::new(config)?.run()?;
//! report.print_summary();
//! ```

pub mod aggregate;
pub mod config;
pub mod execution;
pub mod report;

pub use aggregate::{ScalarSummary, SeriesSummary};
pub use config::{ConfigError, ExecutionConfig};
pub use execution::{Execution, ExecutionError, RunResult};
pub use report::ExecutionReport;
