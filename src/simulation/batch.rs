//! Batch runner over survey sources
//!
//! Sources are processed strictly in input order against one shared facility
//! pool, so capacity used by an earlier source is gone for later ones. Within a
//! source, persons are processed in identifier order. Given a seed and fixed
//! inputs the whole run is reproducible.

use crate::chain::{AnchorLocations, ChainDecomposer, TripRecord};
use crate::facility::FacilityPool;
use crate::simulation::error::{AssignmentError, AssignmentResult};
use crate::simulation::statistics::{ConvergenceRecord, ConvergenceSummary};
use crate::solver::{
    AssignmentSolver, CapacityAwareDiscretizer, DiscretizationSolver, FeasibleDistanceSampler,
    GravityChainSolver, ThresholdObjective,
};
use crate::survey::{DistanceDistribution, SurveyPerson, SurveyTrip};
use crate::types::{
    ActivityPurpose, AssignmentConfig, FacilityId, PersonId, Point, RunId, TravelMode, TripId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// One survey source with the synthetic population it calibrates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveySource {
    /// Source name, carried into the result tables
    pub name: String,
    /// Survey respondents with expansion weights
    #[serde(default)]
    pub survey_persons: Vec<SurveyPerson>,
    /// Surveyed trips
    #[serde(default)]
    pub survey_trips: Vec<SurveyTrip>,
    /// Synthetic trips to place
    #[serde(default)]
    pub trips: Vec<TripRecord>,
    /// Anchor locations of the synthetic persons
    #[serde(default)]
    pub anchors: Vec<AnchorLocations>,
}

/// A free stop placed on a facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// Person making the trip
    pub person: PersonId,
    /// Trip reported for the stop
    pub trip: TripId,
    /// Order number of that trip
    pub order: u32,
    /// Mode of that trip
    pub mode: TravelMode,
    /// Purpose of the stop
    pub purpose: ActivityPurpose,
    /// Facility the stop was placed on
    pub facility: FacilityId,
    /// Facility coordinate
    pub point: Point,
    /// Survey source of the person
    pub source: String,
}

/// Everything a batch run produces
#[derive(Debug)]
pub struct BatchResult {
    /// Placed stops in processing order
    pub locations: Vec<AssignmentRecord>,
    /// One record per solved problem
    pub convergence: Vec<ConvergenceRecord>,
    /// Aggregated diagnostics
    pub summary: ConvergenceSummary,
    /// Pool with the capacity left after the run
    pub pool: FacilityPool,
}

/// Runs the assignment over all sources of a batch
#[derive(Debug)]
pub struct BatchRunner {
    config: AssignmentConfig,
    run_id: RunId,
}

impl BatchRunner {
    /// Create a runner; the configuration is validated first
    pub fn new(config: AssignmentConfig) -> AssignmentResult<Self> {
        config
            .validate()
            .map_err(|error| AssignmentError::configuration_error(error.to_string()))?;
        Ok(Self { config, run_id: RunId::new() })
    }

    /// Identifier stamped on this run's summary
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The validated configuration
    pub fn config(&self) -> &AssignmentConfig {
        &self.config
    }

    /// Assign secondary locations for every source, in order
    ///
    /// Fails on the first fatal condition, e.g. when the pool runs dry.
    #[instrument(skip_all, fields(run_id = %self.run_id, sources = sources.len(), facilities = pool.len()))]
    pub fn run(&self, pool: FacilityPool, sources: Vec<SurveySource>) -> AssignmentResult<BatchResult> {
        let mut batch_rng: StdRng = if let Some(seed) = self.config.seed {
            info!("Using deterministic seed: {}", seed);
            StdRng::seed_from_u64(seed)
        } else {
            debug!("Using entropy-based random seed");
            StdRng::from_entropy()
        };

        let mut result = BatchResult {
            locations: Vec::new(),
            convergence: Vec::new(),
            summary: ConvergenceSummary::new(self.run_id),
            pool,
        };
        info!(
            "Starting secondary location assignment for {} sources over {} facilities (capacity {})",
            sources.len(),
            result.pool.len(),
            result.pool.total_capacity()
        );

        for source in sources {
            let source_seed: u64 = batch_rng.gen();
            let pool = std::mem::replace(&mut result.pool, FacilityPool::new(Vec::new()));
            let discretizer = self.run_source(source, pool, source_seed, &mut result)?;
            result.pool = discretizer.into_pool();
        }

        result.summary.finish();
        info!("{}", result.summary.compact_summary());
        if let Some(advice) = result.summary.recommendation(self.config.low_success_rate) {
            warn!("{}", advice);
        }
        Ok(result)
    }

    #[instrument(skip_all, fields(source = %source.name, persons = source.anchors.len(), trips = source.trips.len()))]
    fn run_source(
        &self,
        source: SurveySource,
        pool: FacilityPool,
        seed: u64,
        result: &mut BatchResult,
    ) -> AssignmentResult<CapacityAwareDiscretizer> {
        let SurveySource { name, survey_persons, survey_trips, mut trips, mut anchors } = source;

        let mut distribution = DistanceDistribution::build(
            name.clone(),
            &survey_persons,
            &survey_trips,
            self.config.minimum_band_samples,
        )?;
        distribution.resample(&self.config.cdf_adjustments);

        let mut solver = AssignmentSolver::new(
            FeasibleDistanceSampler::new(distribution, self.config.sampler_maximum_iterations),
            GravityChainSolver::new(
                self.config.lateral_deviation,
                self.config.relaxation_alpha,
                self.config.relaxation_eps,
                self.config.relaxation_maximum_iterations,
            ),
            CapacityAwareDiscretizer::new(pool),
            ThresholdObjective::from_config(&self.config),
            StdRng::seed_from_u64(seed),
        )
        .with_maximum_iterations(self.config.maximum_iterations)
        .with_give_up_policy(self.config.give_up_policy);

        trips.sort_by(|a, b| a.person.cmp(&b.person).then(a.order.cmp(&b.order)));
        anchors.sort_by(|a, b| a.person.cmp(&b.person));

        let mut decomposer = ChainDecomposer::new(trips, anchors);
        let mut problems = 0usize;
        let mut valid = 0usize;

        for problem in decomposer.by_ref() {
            let outcome = solver.solve(&problem)?;

            for (stop, (choice, purpose)) in outcome.choices.iter().zip(&problem.purposes).enumerate() {
                let trip = problem.trip_for_stop(stop);
                result.locations.push(AssignmentRecord {
                    person: problem.person.clone(),
                    trip: problem.trip_ids[trip].clone(),
                    order: problem.trip_orders[trip],
                    mode: problem.modes[trip].clone(),
                    purpose: purpose.clone(),
                    facility: choice.id.clone(),
                    point: choice.point,
                    source: name.clone(),
                });
            }

            let record = ConvergenceRecord {
                person: problem.person.clone(),
                valid: outcome.valid,
                size: problem.size(),
                iterations: outcome.iterations,
                source: name.clone(),
            };
            result.summary.record(&record);
            result.summary.record_exhausted(outcome.pruned.len());
            result.convergence.push(record);

            problems += 1;
            valid += usize::from(outcome.valid);
        }

        let stats = decomposer.stats();
        result.summary.record_skipped(stats.skipped());
        crate::assign_event!(
            info,
            "Source completed",
            source = name.as_str(),
            problems = problems,
            valid = valid,
            skipped = stats.skipped(),
            remaining_facilities = solver.discretizer().pool().len(),
        );

        Ok(solver.into_discretizer())
    }
}
