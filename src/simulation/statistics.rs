//! Convergence statistics collection and reporting
//!
//! One [`ConvergenceRecord`] is produced per solved problem. The
//! [`ConvergenceSummary`] aggregates them over a whole batch run.

use crate::types::{PersonId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Diagnostic outcome of one assignment problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceRecord {
    /// Person owning the chain
    pub person: PersonId,
    /// Whether every leg met its threshold
    pub valid: bool,
    /// Number of free stops
    pub size: usize,
    /// Attempts spent
    pub iterations: usize,
    /// Survey source the person belongs to
    pub source: String,
}

/// Problem counts for one chain size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStatistics {
    /// Problems of this size
    pub problems: usize,
    /// Valid problems of this size
    pub valid: usize,
}

impl SizeStatistics {
    /// Share of valid problems, in percent
    pub fn success_percentage(&self) -> f64 {
        if self.problems == 0 {
            0.0
        } else {
            (self.valid as f64 / self.problems as f64) * 100.0
        }
    }
}

/// Aggregated outcome of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceSummary {
    /// Run identifier
    pub run_id: RunId,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished, once it has
    pub finished_at: Option<DateTime<Utc>>,
    /// Problems solved
    pub problems: usize,
    /// Problems whose kept attempt met every threshold
    pub valid: usize,
    /// Free stops placed on facilities
    pub assigned_stops: usize,
    /// Attempts spent over all problems
    pub total_iterations: usize,
    /// Facilities whose capacity ran out
    pub facilities_exhausted: usize,
    /// Chains skipped for missing or unplaced anchors
    pub skipped_chains: usize,
    /// Breakdown by number of free stops
    pub by_size: BTreeMap<usize, SizeStatistics>,
}

impl ConvergenceSummary {
    /// Start a summary for a new run
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            problems: 0,
            valid: 0,
            assigned_stops: 0,
            total_iterations: 0,
            facilities_exhausted: 0,
            skipped_chains: 0,
            by_size: BTreeMap::new(),
        }
    }

    /// Account for one solved problem
    pub fn record(&mut self, record: &ConvergenceRecord) {
        self.problems += 1;
        self.assigned_stops += record.size;
        self.total_iterations += record.iterations;

        let size = self.by_size.entry(record.size).or_default();
        size.problems += 1;
        if record.valid {
            self.valid += 1;
            size.valid += 1;
        }
    }

    /// Account for facilities pruned from the pool
    pub fn record_exhausted(&mut self, count: usize) {
        self.facilities_exhausted += count;
    }

    /// Account for chains skipped by the decomposer
    pub fn record_skipped(&mut self, count: usize) {
        self.skipped_chains += count;
    }

    /// Stamp the finishing time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Share of valid problems in [0, 1]; a run without problems counts as fully successful
    pub fn success_rate(&self) -> f64 {
        if self.problems == 0 {
            1.0
        } else {
            self.valid as f64 / self.problems as f64
        }
    }

    /// Share of valid problems, in percent
    pub fn success_percentage(&self) -> f64 {
        self.success_rate() * 100.0
    }

    /// Problems kept without meeting their thresholds
    pub fn invalid(&self) -> usize {
        self.problems - self.valid
    }

    /// Average attempts per problem
    pub fn average_iterations(&self) -> f64 {
        if self.problems == 0 {
            0.0
        } else {
            self.total_iterations as f64 / self.problems as f64
        }
    }

    /// Wall-clock duration, once finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }

    /// Tuning advice when the success rate falls below `low_success_rate`
    pub fn recommendation(&self, low_success_rate: f64) -> Option<String> {
        if self.success_rate() >= low_success_rate {
            return None;
        }
        Some(format!(
            "Success rate {:.0}% is below {:.0}%. Invalid chains keep the location of their final attempt. \
             Consider increasing maximum_iterations or widening the mode thresholds.",
            self.success_percentage(),
            low_success_rate * 100.0
        ))
    }

    /// Compact one-line summary suitable for logging
    pub fn compact_summary(&self) -> String {
        format!(
            "{} problems | valid: {} ({:.1}%) | stops: {} | exhausted facilities: {} | skipped chains: {}",
            self.problems,
            self.valid,
            self.success_percentage(),
            self.assigned_stops,
            self.facilities_exhausted,
            self.skipped_chains
        )
    }
}

impl fmt::Display for ConvergenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Secondary Location Assignment ({}) ===", self.run_id)?;
        writeln!(f, "  Problems solved: {}", self.problems)?;
        writeln!(f, "  Valid: {} ({:.1}%)", self.valid, self.success_percentage())?;
        writeln!(f, "  Invalid (kept anyway): {}", self.invalid())?;
        writeln!(f, "  Stops assigned: {}", self.assigned_stops)?;
        writeln!(f, "  Average attempts: {:.2}", self.average_iterations())?;
        writeln!(f, "  Facilities exhausted: {}", self.facilities_exhausted)?;
        writeln!(f, "  Chains skipped: {}", self.skipped_chains)?;
        for (size, stats) in &self.by_size {
            writeln!(
                f,
                "    size {}: {} problems, {:.1}% valid",
                size,
                stats.problems,
                stats.success_percentage()
            )?;
        }
        if let Some(duration) = self.duration() {
            writeln!(f, "  Duration: {} ms", duration.num_milliseconds())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(valid: bool, size: usize) -> ConvergenceRecord {
        ConvergenceRecord {
            person: PersonId::from("p"),
            valid,
            size,
            iterations: if valid { 2 } else { 20 },
            source: "mid".to_string(),
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = ConvergenceSummary::new(RunId::new());
        assert_eq!(summary.problems, 0);
        assert_eq!(summary.success_rate(), 1.0);
        assert_eq!(summary.average_iterations(), 0.0);
        assert!(summary.recommendation(0.9).is_none());
        assert!(summary.duration().is_none());
    }

    #[test]
    fn test_recording_problems() {
        let mut summary = ConvergenceSummary::new(RunId::new());
        summary.record(&record(true, 1));
        summary.record(&record(true, 2));
        summary.record(&record(false, 2));
        summary.record(&record(true, 1));
        summary.record_exhausted(3);
        summary.record_skipped(5);

        assert_eq!(summary.problems, 4);
        assert_eq!(summary.valid, 3);
        assert_eq!(summary.invalid(), 1);
        assert_eq!(summary.assigned_stops, 6);
        assert_eq!(summary.success_rate(), 0.75);
        assert_eq!(summary.average_iterations(), 26.0 / 4.0);
        assert_eq!(summary.facilities_exhausted, 3);
        assert_eq!(summary.skipped_chains, 5);
        assert_eq!(summary.by_size[&2], SizeStatistics { problems: 2, valid: 1 });
        assert_eq!(summary.by_size[&2].success_percentage(), 50.0);
    }

    #[test]
    fn test_recommendation_below_threshold() {
        let mut summary = ConvergenceSummary::new(RunId::new());
        summary.record(&record(true, 1));
        summary.record(&record(false, 1));

        let advice = summary.recommendation(0.9).unwrap();
        assert!(advice.contains("maximum_iterations"));
        assert!(advice.contains("50%"));
        assert!(summary.recommendation(0.5).is_none());
    }

    #[test]
    fn test_summary_rendering() {
        let mut summary = ConvergenceSummary::new(RunId::new());
        summary.record(&record(true, 3));
        summary.finish();

        let text = summary.to_string();
        assert!(text.contains("Problems solved: 1"));
        assert!(text.contains("size 3"));
        assert!(summary.compact_summary().contains("valid: 1 (100.0%)"));
        assert!(summary.duration().is_some());
    }

    #[test]
    fn test_summary_serializes() {
        let mut summary = ConvergenceSummary::new(RunId::new());
        summary.record(&record(false, 2));
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"run_id\":\"RUN_"));

        let back: ConvergenceSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.problems, 1);
        assert_eq!(back.by_size[&2].problems, 1);
    }
}
