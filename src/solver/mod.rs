//! Solver stages of the secondary location assignment
//!
//! Each stage is a trait so alternative strategies can be injected into the
//! [`AssignmentSolver`] and tested against the same contract:
//!
//! - [`DistanceSampler`]: one target distance per leg
//! - [`RelaxationSolver`]: continuous coordinates for the free stops
//! - [`DiscretizationSolver`]: snaps coordinates onto facilities and owns the pool
//! - [`Objective`]: scores a discretized attempt against per-mode thresholds
//!
//! Randomness is always drawn from the generator passed in by the caller.

pub mod assignment;
pub mod discretization;
pub mod objective;
pub mod relaxation;
pub mod sampler;

pub use assignment::{AssignmentOutcome, AssignmentSolver};
pub use discretization::CapacityAwareDiscretizer;
pub use objective::ThresholdObjective;
pub use relaxation::GravityChainSolver;
pub use sampler::FeasibleDistanceSampler;

use crate::chain::AssignmentProblem;
use crate::facility::{FacilityIndex, FacilityPool};
use crate::simulation::error::AssignmentResult;
use crate::types::{FacilityId, Point};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Target distances drawn for one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceSample {
    /// One target distance per leg
    pub distances: Vec<f64>,
    /// Whether the targets can close the chain between its fixed ends
    pub feasible: bool,
    /// Number of draws spent
    pub draws: usize,
}

/// Continuous stop coordinates produced by a relaxation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relaxation {
    /// One coordinate per free stop
    pub points: Vec<Point>,
    /// Whether every leg matched its target within tolerance
    pub converged: bool,
    /// Correction rounds spent
    pub iterations: usize,
}

/// A facility picked for one free stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityChoice {
    /// Pool slot of the facility
    pub index: FacilityIndex,
    /// Upstream facility identifier
    pub id: FacilityId,
    /// Facility coordinate
    pub point: Point,
}

/// Facilities picked for all free stops of a problem, in stop order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Discretization {
    /// One choice per free stop
    pub choices: Vec<FacilityChoice>,
}

impl Discretization {
    /// Coordinates of the chosen facilities
    pub fn points(&self) -> Vec<Point> {
        self.choices.iter().map(|choice| choice.point).collect()
    }
}

/// Score of a discretized attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Realized distance of every leg
    pub realized: Vec<f64>,
    /// Largest deviation beyond its mode threshold over all legs; 0 when valid
    pub objective: f64,
    /// Whether every leg is within its threshold
    pub valid: bool,
}

/// Draws target leg distances for a problem
pub trait DistanceSampler {
    /// Draw one distance per leg of `problem`
    fn sample<R>(&self, problem: &AssignmentProblem, rng: &mut R) -> AssignmentResult<DistanceSample>
    where
        R: Rng + ?Sized;
}

/// Places the free stops of a problem in continuous space
pub trait RelaxationSolver {
    /// Compute one coordinate per free stop; never fails
    fn relax<R>(&self, problem: &AssignmentProblem, distances: &[f64], rng: &mut R) -> Relaxation
    where
        R: Rng + ?Sized;
}

/// Maps continuous coordinates onto facilities with remaining capacity
pub trait DiscretizationSolver {
    /// Pick a facility for every position, without changing capacities
    fn solve(&self, problem: &AssignmentProblem, positions: &[Point]) -> AssignmentResult<Discretization>;

    /// Take one unit of capacity from a facility and return what is left
    fn consume(&mut self, index: FacilityIndex) -> AssignmentResult<u32>;

    /// Remove an exhausted facility and rebuild the spatial index
    fn update(&mut self, index: FacilityIndex) -> AssignmentResult<()>;

    /// Read access to the underlying pool
    fn pool(&self) -> &FacilityPool;
}

/// Scores a discretized attempt
pub trait Objective {
    /// Compare realized leg distances with the sampled targets
    fn evaluate(
        &self,
        problem: &AssignmentProblem,
        sample: &DistanceSample,
        discretization: &Discretization,
    ) -> Evaluation;
}
