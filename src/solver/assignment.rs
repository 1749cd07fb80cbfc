//! Per-problem orchestration of the solver stages
//!
//! Every problem runs a bounded loop of sample, relax, discretize and evaluate.
//! The loop stops at the first valid attempt; otherwise the attempt selected by
//! the give-up policy is kept and flagged invalid. Capacity is only taken from
//! the pool once the kept attempt is committed.

use super::{
    Discretization, DiscretizationSolver, DistanceSample, DistanceSampler, Evaluation,
    FacilityChoice, Objective, Relaxation, RelaxationSolver,
};
use crate::chain::AssignmentProblem;
use crate::facility::FacilityIndex;
use crate::simulation::error::AssignmentResult;
use crate::types::{GiveUpPolicy, Point};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Default bound on attempts per problem
pub const DEFAULT_MAXIMUM_ITERATIONS: usize = 20;

/// One full pass through the solver stages
#[derive(Debug, Clone)]
struct Attempt {
    iteration: usize,
    sample: DistanceSample,
    relaxation: Relaxation,
    discretization: Discretization,
    evaluation: Evaluation,
}

/// Result of solving one problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    /// Facility per free stop, in stop order
    pub choices: Vec<FacilityChoice>,
    /// Target leg distances of the kept attempt
    pub distances: Vec<f64>,
    /// Continuous stop positions of the kept attempt
    pub relaxed: Vec<Point>,
    /// Score of the kept attempt
    pub evaluation: Evaluation,
    /// Whether the kept attempt met every threshold
    pub valid: bool,
    /// Attempts made
    pub iterations: usize,
    /// Attempt that was kept (1-based)
    pub kept_iteration: usize,
    /// Facilities exhausted and pruned by the commit
    pub pruned: Vec<FacilityIndex>,
}

/// Orchestrates the sampler, relaxation, discretization and objective
#[derive(Debug)]
pub struct AssignmentSolver<S, X, D, O> {
    sampler: S,
    relaxer: X,
    discretizer: D,
    objective: O,
    maximum_iterations: usize,
    give_up_policy: GiveUpPolicy,
    rng: StdRng,
}

impl<S, X, D, O> AssignmentSolver<S, X, D, O>
where
    S: DistanceSampler,
    X: RelaxationSolver,
    D: DiscretizationSolver,
    O: Objective,
{
    /// Create a solver drawing all randomness from `rng`
    pub fn new(sampler: S, relaxer: X, discretizer: D, objective: O, rng: StdRng) -> Self {
        Self {
            sampler,
            relaxer,
            discretizer,
            objective,
            maximum_iterations: DEFAULT_MAXIMUM_ITERATIONS,
            give_up_policy: GiveUpPolicy::default(),
            rng,
        }
    }

    /// Set the bound on attempts per problem (at least one)
    pub fn with_maximum_iterations(mut self, maximum_iterations: usize) -> Self {
        self.maximum_iterations = maximum_iterations.max(1);
        self
    }

    /// Set which attempt is kept when none is valid
    pub fn with_give_up_policy(mut self, policy: GiveUpPolicy) -> Self {
        self.give_up_policy = policy;
        self
    }

    /// The discretization stage and its pool
    pub fn discretizer(&self) -> &D {
        &self.discretizer
    }

    /// The sampling stage
    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Release the discretization stage, keeping the pool for later use
    pub fn into_discretizer(self) -> D {
        self.discretizer
    }

    fn attempt(&mut self, problem: &AssignmentProblem, iteration: usize) -> AssignmentResult<Attempt> {
        let sample = self.sampler.sample(problem, &mut self.rng)?;
        let relaxation = self.relaxer.relax(problem, &sample.distances, &mut self.rng);
        let discretization = self.discretizer.solve(problem, &relaxation.points)?;
        let evaluation = self.objective.evaluate(problem, &sample, &discretization);

        trace!(
            person = %problem.person,
            iteration,
            feasible = sample.feasible,
            relaxed = relaxation.converged,
            objective = evaluation.objective,
            "Attempt evaluated"
        );
        Ok(Attempt { iteration, sample, relaxation, discretization, evaluation })
    }

    fn keep(&self, previous: Attempt, attempt: Attempt) -> Attempt {
        let improves = attempt.evaluation.valid
            || attempt.evaluation.objective < previous.evaluation.objective;
        match self.give_up_policy {
            GiveUpPolicy::Best if !improves => previous,
            _ => attempt,
        }
    }

    /// Run the attempt loop without touching capacities
    ///
    /// Fails only on fatal conditions such as an exhausted pool.
    pub fn search(&mut self, problem: &AssignmentProblem) -> AssignmentResult<AssignmentOutcome> {
        let mut kept = self.attempt(problem, 1)?;
        let mut iterations = 1;

        while !kept.evaluation.valid && iterations < self.maximum_iterations {
            iterations += 1;
            let attempt = self.attempt(problem, iterations)?;
            kept = self.keep(kept, attempt);
        }
        let attempt = kept;

        Ok(AssignmentOutcome {
            choices: attempt.discretization.choices,
            distances: attempt.sample.distances,
            relaxed: attempt.relaxation.points,
            valid: attempt.evaluation.valid,
            evaluation: attempt.evaluation,
            iterations,
            kept_iteration: attempt.iteration,
            pruned: Vec::new(),
        })
    }

    /// Take one unit of capacity per chosen facility, pruning exhausted ones
    pub fn commit(&mut self, outcome: &mut AssignmentOutcome) -> AssignmentResult<()> {
        for choice in &outcome.choices {
            let remaining = self.discretizer.consume(choice.index)?;
            if remaining == 0 {
                self.discretizer.update(choice.index)?;
                outcome.pruned.push(choice.index);
            }
        }
        Ok(())
    }

    /// Solve a problem and commit the kept attempt
    pub fn solve(&mut self, problem: &AssignmentProblem) -> AssignmentResult<AssignmentOutcome> {
        let mut outcome = self.search(problem)?;
        self.commit(&mut outcome)?;

        debug!(
            person = %problem.person,
            size = problem.size(),
            valid = outcome.valid,
            iterations = outcome.iterations,
            objective = outcome.evaluation.objective,
            "Problem solved"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::{FacilityPool, FacilityRecord};
    use crate::solver::{CapacityAwareDiscretizer, GravityChainSolver, ThresholdObjective};
    use crate::types::{ActivityPurpose, FacilityId, PersonId, TravelMode, TripId};
    use rand::{Rng, SeedableRng};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Replays a fixed list of samples, one per call
    struct ScriptedSampler {
        samples: RefCell<Vec<Vec<f64>>>,
    }

    impl DistanceSampler for ScriptedSampler {
        fn sample<R>(&self, _: &AssignmentProblem, _: &mut R) -> AssignmentResult<DistanceSample>
        where
            R: Rng + ?Sized,
        {
            let distances = self.samples.borrow_mut().remove(0);
            Ok(DistanceSample { distances, feasible: true, draws: 1 })
        }
    }

    fn round_trip() -> AssignmentProblem {
        AssignmentProblem {
            person: PersonId::from("p"),
            purposes: vec![ActivityPurpose::Secondary("6".to_string())],
            modes: vec![TravelMode::from("1"); 2],
            travel_times: vec![10.0; 2],
            trip_ids: vec![TripId::from("t1"), TripId::from("t2")],
            trip_orders: vec![1, 2],
            origin: Some(Point::ORIGIN),
            destination: Some(Point::ORIGIN),
        }
    }

    fn solver(
        samples: Vec<Vec<f64>>,
        policy: GiveUpPolicy,
    ) -> AssignmentSolver<ScriptedSampler, GravityChainSolver, CapacityAwareDiscretizer, ThresholdObjective>
    {
        // One facility 1000 m east, capacity 2
        let pool = FacilityPool::new(vec![FacilityRecord::new("f", Point::new(1000.0, 0.0), 2)]);
        AssignmentSolver::new(
            ScriptedSampler { samples: RefCell::new(samples) },
            GravityChainSolver::default(),
            CapacityAwareDiscretizer::new(pool),
            ThresholdObjective::new(BTreeMap::new(), 100.0),
            StdRng::seed_from_u64(1),
        )
        .with_maximum_iterations(3)
        .with_give_up_policy(policy)
    }

    #[test]
    fn test_stops_at_first_valid_attempt() {
        let mut solver =
            solver(vec![vec![100.0; 2], vec![1000.0; 2], vec![100.0; 2]], GiveUpPolicy::Last);
        let outcome = solver.solve(&round_trip()).unwrap();

        assert!(outcome.valid);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.kept_iteration, 2);
        assert_eq!(outcome.choices[0].id, FacilityId::from("f"));
        assert_eq!(solver.discretizer().pool().total_capacity(), 1);
    }

    #[test]
    fn test_give_up_keeps_last_attempt() {
        let mut solver =
            solver(vec![vec![800.0; 2], vec![100.0; 2], vec![500.0; 2]], GiveUpPolicy::Last);
        let outcome = solver.search(&round_trip()).unwrap();

        assert!(!outcome.valid);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.kept_iteration, 3);
        assert_eq!(outcome.distances, vec![500.0; 2]);
    }

    #[test]
    fn test_give_up_keeps_best_attempt() {
        let mut solver =
            solver(vec![vec![100.0; 2], vec![850.0; 2], vec![500.0; 2]], GiveUpPolicy::Best);
        let outcome = solver.search(&round_trip()).unwrap();

        assert!(!outcome.valid);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.kept_iteration, 2);
        assert_eq!(outcome.evaluation.objective, 50.0);
    }

    #[test]
    fn test_search_leaves_capacity_untouched() {
        let mut solver = solver(vec![vec![1000.0; 2]], GiveUpPolicy::Last);
        solver.search(&round_trip()).unwrap();
        assert_eq!(solver.discretizer().pool().total_capacity(), 2);
    }

    #[test]
    fn test_commit_prunes_exhausted_facility() {
        let mut solver = solver(vec![vec![1000.0; 2], vec![1000.0; 2]], GiveUpPolicy::Last);

        let first = solver.solve(&round_trip()).unwrap();
        assert!(first.pruned.is_empty());

        let second = solver.solve(&round_trip()).unwrap();
        assert_eq!(second.pruned, vec![second.choices[0].index]);
        assert!(solver.discretizer().pool().is_empty());
    }
}
