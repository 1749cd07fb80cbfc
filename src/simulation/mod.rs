//! Batch execution and its ambient concerns
//!
//! This module contains the batch runner, run statistics, logging setup and
//! error handling.
//!
//! # Overview
//!
//! - **BatchRunner**: runs every survey source against one shared facility pool
//! - **ConvergenceSummary**: collects and reports per-run diagnostics
//! - **LoggingConfig**: configures the `tracing` subscriber
//! - **AssignmentError**: error handling for assignment operations
//!
//! # Usage Example
//!
//! ```rust
//! use activity_chain_locator::simulation::*;
//! use activity_chain_locator::facility::FacilityPool;
//! use activity_chain_locator::types::AssignmentConfig;
//!
//! let config = AssignmentConfig {
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! let runner = BatchRunner::new(config).unwrap();
//!
//! // No sources: nothing to assign, the run still succeeds
//! let result = runner.run(FacilityPool::new(Vec::new()), Vec::new()).unwrap();
//! assert_eq!(result.summary.success_rate(), 1.0);
//! ```

pub mod batch;
pub mod error;
pub mod logging;
pub mod statistics;

// Re-export all public types for convenience
pub use batch::*;
pub use error::*;
pub use logging::*;
pub use statistics::*;
