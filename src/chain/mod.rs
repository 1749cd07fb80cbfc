//! Trip chains and assignment problems
//!
//! Input trip and anchor records, the [`AssignmentProblem`] handed to the solver,
//! and the [`ChainDecomposer`] that turns one into the other.

pub mod decomposer;
pub mod problem;

pub use decomposer::{ChainDecomposer, DecomposerStats};
pub use problem::{AnchorLocations, AssignmentProblem, TripRecord};
