//! Threshold objective over realized leg distances

use super::{Discretization, DistanceSample, Evaluation, Objective};
use crate::chain::AssignmentProblem;
use crate::types::{leg_lengths, mode_threshold, AssignmentConfig};
use std::collections::BTreeMap;

/// Scores an attempt by the largest leg deviation beyond its mode threshold
#[derive(Debug, Clone)]
pub struct ThresholdObjective {
    thresholds: BTreeMap<String, f64>,
    default_threshold: f64,
}

impl ThresholdObjective {
    /// Create an objective from per-mode thresholds and a fallback
    pub fn new(thresholds: BTreeMap<String, f64>, default_threshold: f64) -> Self {
        Self { thresholds, default_threshold }
    }

    /// Create an objective from the run configuration
    pub fn from_config(config: &AssignmentConfig) -> Self {
        Self::new(config.thresholds.clone(), config.default_threshold)
    }

    /// Threshold applied to a mode code
    pub fn threshold(&self, mode: &str) -> f64 {
        mode_threshold(&self.thresholds, self.default_threshold, mode)
    }
}

impl Objective for ThresholdObjective {
    fn evaluate(
        &self,
        problem: &AssignmentProblem,
        sample: &DistanceSample,
        discretization: &Discretization,
    ) -> Evaluation {
        let chain = problem.chain_points(&discretization.points());
        let realized = leg_lengths(&chain);

        let objective = realized
            .iter()
            .zip(&sample.distances)
            .zip(&problem.modes)
            .map(|((realized, target), mode)| {
                ((realized - target).abs() - self.threshold(mode.code())).max(0.0)
            })
            .fold(0.0, f64::max);

        Evaluation { realized, objective, valid: objective == 0.0 }
    }
}
