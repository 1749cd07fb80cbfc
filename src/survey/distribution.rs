//! Empirical distance distributions per mode and travel-time band
//!
//! Built once per survey source from weighted survey legs. Each mode's travel
//! times are cut into bands holding at least a minimum number of samples; each
//! band stores the sorted leg distances and their cumulative normalised weights.

use crate::simulation::error::{AssignmentError, AssignmentResult};
use crate::types::{ActivityPurpose, PersonId, TravelMode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Respondent of a travel survey with its expansion weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyPerson {
    /// Respondent identifier
    pub person: PersonId,
    /// Expansion weight
    pub weight: f64,
}

/// Surveyed trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyTrip {
    /// Respondent making the trip
    pub person: PersonId,
    /// Main mode
    pub mode: TravelMode,
    /// Purpose at the origin
    pub origin_purpose: ActivityPurpose,
    /// Purpose at the destination
    pub destination_purpose: ActivityPurpose,
    /// Declared travel time in minutes
    pub travel_time: f64,
    /// Crow-flies distance in metres
    pub distance: f64,
}

/// Distance CDF of one travel-time band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceBand {
    /// Leg distances, ascending
    pub values: Vec<f64>,
    /// Cumulative normalised weight aligned with `values`; the last entry is 1
    pub cdf: Vec<f64>,
}

impl DistanceBand {
    /// Build a band from `(distance, weight)` samples
    ///
    /// Falls back to uniform weights when every weight is zero.
    pub fn from_samples(mut samples: Vec<(f64, f64)>) -> Self {
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total: f64 = samples.iter().map(|&(_, weight)| weight).sum();
        let uniform = !(total > 0.0);

        let mut values = Vec::with_capacity(samples.len());
        let mut cdf = Vec::with_capacity(samples.len());
        let mut cumulative = 0.0;
        for (value, weight) in samples {
            cumulative += if uniform { 1.0 } else { weight };
            values.push(value);
            cdf.push(cumulative);
        }
        if let Some(&last) = cdf.last() {
            cdf.iter_mut().for_each(|entry| *entry /= last);
        }

        Self { values, cdf }
    }

    /// Distance at the first CDF entry exceeding `u`
    pub fn quantile(&self, u: f64) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let index = self.cdf.partition_point(|&entry| entry <= u);
        Some(self.values[index.min(self.values.len() - 1)])
    }

    /// Tilt the CDF by `factor` in (-1, 1) and renormalise
    pub fn resample(&mut self, factor: f64) {
        resample_cdf(&mut self.cdf, factor);
    }
}

/// Travel-time bands and their CDFs for one mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeDistribution {
    /// Upper band bounds, ascending; the last one is infinite
    pub bounds: Vec<f64>,
    /// One band per bound; band `i` covers `(bounds[i-1], bounds[i]]`
    pub bands: Vec<DistanceBand>,
}

impl ModeDistribution {
    /// Build the bands of one mode from `(travel_time, distance, weight)` samples
    pub fn from_samples(samples: &[(f64, f64, f64)], minimum_band_samples: usize) -> Self {
        let times: Vec<f64> = samples.iter().map(|&(time, _, _)| time).collect();
        let bin_size = minimum_band_samples.min(times.len().saturating_sub(1));
        let bounds = calculate_bounds(&times, bin_size);

        let mut per_band: Vec<Vec<(f64, f64)>> = vec![Vec::new(); bounds.len()];
        for &(time, distance, weight) in samples {
            let band = band_index(&bounds, time);
            per_band[band].push((distance, weight));
        }

        let bands = per_band.into_iter().map(DistanceBand::from_samples).collect();
        Self { bounds, bands }
    }

    /// Band for a travel time: the number of bounds it strictly exceeds
    pub fn band_for(&self, travel_time: f64) -> Option<&DistanceBand> {
        self.bands.get(band_index(&self.bounds, travel_time))
    }
}

fn band_index(bounds: &[f64], travel_time: f64) -> usize {
    let index = bounds.partition_point(|&bound| travel_time > bound);
    index.min(bounds.len().saturating_sub(1))
}

/// Adaptive band bounds over `values` with at least `bin_size` samples per band
///
/// Values equal to the previous bound never open a new band. The final bound is
/// always infinite, so at least one band exists.
pub fn calculate_bounds(values: &[f64], bin_size: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut bounds = Vec::new();
    let mut count = 0;
    let mut previous: Option<f64> = None;

    for value in sorted {
        if previous == Some(value) {
            continue;
        }
        if count < bin_size {
            count += 1;
        } else {
            count = 0;
            bounds.push(value);
            previous = Some(value);
        }
    }

    match bounds.last_mut() {
        Some(last) => *last = f64::INFINITY,
        None => bounds.push(f64::INFINITY),
    }
    bounds
}

/// Tilt a CDF towards longer (`factor > 0`) or shorter (`factor < 0`) distances
///
/// Entry `i` (1-based) of `n` is scaled by `1 + f*i/n` for `f >= 0` and by
/// `1 + |f| - |f|*i/n` otherwise, then the CDF is renormalised to end at 1.
pub fn resample_cdf(cdf: &mut [f64], factor: f64) {
    let n = cdf.len() as f64;
    for (position, entry) in cdf.iter_mut().enumerate() {
        let i = (position + 1) as f64;
        let scale = if factor >= 0.0 {
            1.0 + factor * i / n
        } else {
            1.0 + factor.abs() - factor.abs() * i / n
        };
        *entry *= scale;
    }
    if let Some(&last) = cdf.last() {
        if last > 0.0 {
            cdf.iter_mut().for_each(|entry| *entry /= last);
        }
    }
}

/// Per-mode distance distributions of one survey source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceDistribution {
    /// Name of the survey source
    pub source: String,
    /// Distribution per mode
    pub modes: BTreeMap<TravelMode, ModeDistribution>,
}

impl DistanceDistribution {
    /// Build the distributions from survey persons and trips
    ///
    /// Trips between two anchors are ignored. Trips of unknown respondents and
    /// trips with non-finite values are dropped.
    pub fn build(
        source: impl Into<String>,
        persons: &[SurveyPerson],
        trips: &[SurveyTrip],
        minimum_band_samples: usize,
    ) -> AssignmentResult<Self> {
        let source = source.into();
        let weights: HashMap<&PersonId, f64> =
            persons.iter().map(|person| (&person.person, person.weight.max(0.0))).collect();

        let mut samples: BTreeMap<TravelMode, Vec<(f64, f64, f64)>> = BTreeMap::new();
        let mut unmatched = 0usize;
        let mut anchor_legs = 0usize;

        for trip in trips {
            let Some(&weight) = weights.get(&trip.person) else {
                unmatched += 1;
                continue;
            };
            if trip.origin_purpose.is_anchor() && trip.destination_purpose.is_anchor() {
                anchor_legs += 1;
                continue;
            }
            if !trip.travel_time.is_finite() || !trip.distance.is_finite() || trip.distance < 0.0 {
                unmatched += 1;
                continue;
            }
            samples
                .entry(trip.mode.clone())
                .or_default()
                .push((trip.travel_time, trip.distance, weight));
        }

        if unmatched > 0 {
            warn!(source = %source, dropped = unmatched, "Dropped survey trips without a respondent or with invalid values");
        }
        if samples.is_empty() {
            return Err(AssignmentError::empty_survey(source));
        }

        let modes: BTreeMap<_, _> = samples
            .into_iter()
            .map(|(mode, mode_samples)| {
                let distribution = ModeDistribution::from_samples(&mode_samples, minimum_band_samples);
                debug!(
                    source = %source,
                    mode = %mode,
                    samples = mode_samples.len(),
                    bands = distribution.bands.len(),
                    "Built distance distribution"
                );
                (mode, distribution)
            })
            .collect();

        debug!(source = %source, anchor_legs, modes = modes.len(), "Distance model ready");
        Ok(Self { source, modes })
    }

    /// Distribution of a mode
    pub fn mode(&self, mode: &TravelMode) -> Option<&ModeDistribution> {
        self.modes.get(mode)
    }

    /// Apply per-mode CDF tilt factors; modes without a factor are unchanged
    pub fn resample(&mut self, adjustments: &BTreeMap<String, f64>) {
        for (mode, distribution) in self.modes.iter_mut() {
            let factor = adjustments.get(mode.code()).copied().unwrap_or(0.0);
            if factor == 0.0 {
                continue;
            }
            for band in distribution.bands.iter_mut() {
                band.resample(factor);
            }
        }
    }

    /// Draw one distance for a leg of `mode` with the given travel time
    pub fn sample<R>(&self, mode: &TravelMode, travel_time: f64, rng: &mut R) -> AssignmentResult<f64>
    where
        R: Rng + ?Sized,
    {
        let band = self
            .mode(mode)
            .and_then(|distribution| distribution.band_for(travel_time))
            .ok_or_else(|| AssignmentError::missing_distribution(mode.clone()))?;
        let u: f64 = rng.gen();
        band.quantile(u).ok_or_else(|| AssignmentError::missing_distribution(mode.clone()))
    }
}
