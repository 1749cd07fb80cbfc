//! Distance sampling from the survey distance model

use super::{DistanceSample, DistanceSampler};
use crate::chain::AssignmentProblem;
use crate::simulation::error::AssignmentResult;
use crate::survey::DistanceDistribution;
use rand::Rng;

/// Slack on the polygon inequality, in metres
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Samples leg distances, redrawing closed chains until they can close
#[derive(Debug, Clone)]
pub struct FeasibleDistanceSampler {
    distribution: DistanceDistribution,
    maximum_iterations: usize,
}

impl FeasibleDistanceSampler {
    /// Create a sampler over a distance model
    pub fn new(distribution: DistanceDistribution, maximum_iterations: usize) -> Self {
        Self { distribution, maximum_iterations: maximum_iterations.max(1) }
    }

    /// The distance model sampled from
    pub fn distribution(&self) -> &DistanceDistribution {
        &self.distribution
    }

    fn draw<R>(&self, problem: &AssignmentProblem, rng: &mut R) -> AssignmentResult<Vec<f64>>
    where
        R: Rng + ?Sized,
    {
        problem
            .modes
            .iter()
            .zip(&problem.travel_times)
            .map(|(mode, &travel_time)| self.distribution.sample(mode, travel_time, rng))
            .collect()
    }
}

/// Whether legs of these lengths can connect two points `direct` apart
///
/// The legs and the direct span form a closed polygon, so no side may be longer
/// than the sum of all others.
pub fn can_close(distances: &[f64], direct: f64) -> bool {
    let total: f64 = distances.iter().sum::<f64>() + direct;
    let longest = distances.iter().copied().fold(direct, f64::max);
    longest <= total - longest + FEASIBILITY_TOLERANCE
}

impl DistanceSampler for FeasibleDistanceSampler {
    fn sample<R>(&self, problem: &AssignmentProblem, rng: &mut R) -> AssignmentResult<DistanceSample>
    where
        R: Rng + ?Sized,
    {
        let (origin, destination) = match (problem.origin, problem.destination) {
            (Some(origin), Some(destination)) => (origin, destination),
            _ => {
                let distances = self.draw(problem, rng)?;
                return Ok(DistanceSample { distances, feasible: true, draws: 1 });
            }
        };

        let direct = origin.distance_to(&destination);
        let mut distances = Vec::new();
        for draw in 1..=self.maximum_iterations {
            distances = self.draw(problem, rng)?;
            if can_close(&distances, direct) {
                return Ok(DistanceSample { distances, feasible: true, draws: draw });
            }
        }

        Ok(DistanceSample { distances, feasible: false, draws: self.maximum_iterations })
    }
}
