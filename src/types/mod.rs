//! Core types and identifiers for the secondary location assigner
//!
//! This module contains fundamental types, identifiers, geometry and configuration
//! structures used throughout the assignment engine.
//!
//! # Overview
//!
//! - **Identifiers**: opaque upstream identifiers plus the UUID-based run identifier
//! - **Enums**: activity purposes, travel modes and the give-up policy
//! - **Geometry**: planar points in projected metres
//! - **Configuration**: assignment configuration with validation and CLI support
//!
//! # Usage Example
//!
//! ```rust
//! use activity_chain_locator::types::*;
//!
//! let person = PersonId::from("P-1");
//! let purpose: ActivityPurpose = "6".parse().unwrap();
//! assert!(!purpose.is_anchor());
//!
//! let config = AssignmentConfig {
//!     maximum_iterations: 50,
//!     ..Default::default()
//! };
//! assert_eq!(config.threshold_for("1"), 100.0);
//! # let _ = person;
//! ```

pub mod config;
pub mod enums;
pub mod geometry;
pub mod identifiers;

// Re-export all public types for convenience
pub use config::*;
pub use enums::*;
pub use geometry::*;
pub use identifiers::*;
