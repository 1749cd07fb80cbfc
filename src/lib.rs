//! Activity Chain Locator
//!
//! Assigns concrete facility locations to the secondary activities (shopping,
//! leisure, errands, ...) of synthetic persons whose anchor locations (home,
//! work, education) are already known.
//!
//! # Overview
//!
//! Each person's daily trip chain is cut into assignment problems: runs of
//! free stops between fixed anchors, or open tails before the first and after
//! the last anchor. Every problem goes through a bounded loop of four stages:
//!
//! - **Distance sampling**: one target distance per leg from the survey,
//!   conditioned on mode and travel time
//! - **Relaxation**: continuous coordinates for the free stops that reproduce
//!   those distances as closely as geometry allows
//! - **Discretization**: each coordinate snapped onto the nearest facility
//!   with remaining capacity
//! - **Evaluation**: realized leg lengths checked against per-mode thresholds
//!
//! The kept attempt is committed, decrementing facility capacity; facilities
//! reaching zero drop out of the nearest-neighbour index.
//!
//! ## Quick Start
//!
//! ```rust
//! use activity_chain_locator::*;
//!
//! let pool = FacilityPool::new(vec![
//!     FacilityRecord::new("shop", Point::new(500.0, 0.0), 10),
//! ]);
//!
//! let config = AssignmentConfig {
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let runner = BatchRunner::new(config)?;
//! let result = runner.run(pool, Vec::new())?;
//! println!("{}", result.summary.compact_summary());
//! # Ok::<(), AssignmentError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: identifiers, purposes and modes, geometry, configuration
//! - [`survey`]: distance distributions built from the travel survey
//! - [`chain`]: trip records and the chain decomposer
//! - [`facility`]: the capacity-limited facility pool
//! - [`solver`]: the solver stages and the per-problem orchestrator
//! - [`simulation`]: batch runner, statistics, logging and errors
//! - [`io`]: scenario loading and result writing
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │   Survey    │    │    Chain    │    │  Facility   │
//! │             │    │             │    │             │
//! │ Distance    │    │ Decomposer  │    │ Pool        │
//! │ Bands       │    │ Problems    │    │ k-d Index   │
//! └─────────────┘    └─────────────┘    └─────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────┐
//! │                     Solver                        │
//! │  Sampler → Relaxation → Discretization → Objective│
//! └───────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//!                    ┌─────────────┐
//!                    │ Simulation  │
//!                    │ BatchRunner │
//!                    │ Statistics  │
//!                    └─────────────┘
//! ```
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

// Module declarations
pub mod chain;
pub mod facility;
pub mod io;
pub mod simulation;
pub mod solver;
pub mod survey;

pub mod types;

// Core types and identifiers
pub use types::{
    ActivityPurpose,
    // Configuration
    AssignmentConfig,
    ConfigValidationError,
    FacilityId,
    GiveUpPolicy,
    // Identifiers
    PersonId,
    // Geometry
    Point,
    RunId,
    // Enums
    TravelMode,
    TripId,
};

// Survey distance model
pub use survey::{DistanceDistribution, SurveyPerson, SurveyTrip};

// Chains and problems
pub use chain::{AnchorLocations, AssignmentProblem, ChainDecomposer, TripRecord};

// Facilities
pub use facility::{FacilityIndex, FacilityPool, FacilityRecord};

// Solver stages
pub use solver::{
    AssignmentOutcome, AssignmentSolver, CapacityAwareDiscretizer, DiscretizationSolver,
    DistanceSampler, FeasibleDistanceSampler, GravityChainSolver, Objective, RelaxationSolver,
    ThresholdObjective,
};

// Batch execution
pub use simulation::{
    AssignmentError, AssignmentRecord, AssignmentResult, BatchResult, BatchRunner,
    ConvergenceRecord, ConvergenceSummary, LoggingConfig, SurveySource,
};

// Input and output
pub use io::Scenario;
