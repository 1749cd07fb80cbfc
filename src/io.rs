//! Scenario loading and result table writing
//!
//! A scenario is a single JSON document holding the facility inventory and the
//! survey sources. Results are written as JSON lines (one record per line) plus
//! a pretty-printed run summary.

use crate::facility::{FacilityPool, FacilityRecord};
use crate::simulation::batch::{AssignmentRecord, BatchResult, SurveySource};
use crate::simulation::error::{AssignmentError, AssignmentResult};
use crate::simulation::statistics::{ConvergenceRecord, ConvergenceSummary};
use crate::types::{FacilityId, Point};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the placed stops table
pub const LOCATIONS_FILE: &str = "locations_secondary.jsonl";
/// File name of the per-problem diagnostics table
pub const CONVERGENCE_FILE: &str = "convergence_secondary.jsonl";
/// File name of the run summary
pub const SUMMARY_FILE: &str = "summary.json";

/// Facility entry as delivered by the upstream inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityInput {
    /// Facility identifier
    pub id: FacilityId,
    /// Projected x coordinate (metres)
    pub x: f64,
    /// Projected y coordinate (metres)
    pub y: f64,
    /// Visitor capacity
    #[serde(default)]
    pub visitors: u32,
    /// Offers leisure activities
    #[serde(default)]
    pub offers_freetime: bool,
    /// Offers shopping
    #[serde(default)]
    pub offers_shopping: bool,
    /// Offers errands
    #[serde(default)]
    pub offers_errands: bool,
}

impl FacilityInput {
    /// Whether the facility can host a secondary activity at all
    pub fn is_secondary(&self) -> bool {
        (self.offers_freetime || self.offers_shopping || self.offers_errands) && self.visitors >= 1
    }
}

/// Complete input of one batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Facility inventory
    #[serde(default)]
    pub facilities: Vec<FacilityInput>,
    /// Survey sources, processed in this order
    #[serde(default)]
    pub sources: Vec<SurveySource>,
}

impl Scenario {
    /// Load a scenario from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AssignmentResult<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let scenario: Scenario = serde_json::from_reader(reader)?;
        info!(
            "Loaded scenario {} with {} facilities and {} sources",
            path.display(),
            scenario.facilities.len(),
            scenario.sources.len()
        );
        Ok(scenario)
    }

    /// Build the facility pool from the entries offering a secondary purpose
    pub fn facility_pool(&self) -> FacilityPool {
        let records: Vec<FacilityRecord> = self
            .facilities
            .iter()
            .filter(|facility| facility.is_secondary())
            .map(|facility| {
                FacilityRecord::new(facility.id.clone(), Point::new(facility.x, facility.y), facility.visitors)
            })
            .collect();

        let dropped = self.facilities.len() - records.len();
        if dropped > 0 {
            warn!(dropped, "Ignored facilities without secondary purposes or visitors");
        }
        FacilityPool::new(records)
    }

    /// Split into the pool and the sources
    pub fn into_parts(self) -> (FacilityPool, Vec<SurveySource>) {
        let pool = self.facility_pool();
        (pool, self.sources)
    }
}

/// Write serializable records as JSON lines
pub fn write_jsonl<T: Serialize, P: AsRef<Path>>(path: P, records: &[T]) -> AssignmentResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read JSON lines back into records, skipping blank lines
pub fn read_jsonl<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> AssignmentResult<Vec<T>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(AssignmentError::from))
        .collect()
}

/// Paths written by [`write_results`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Placed stops
    pub locations: PathBuf,
    /// Per-problem diagnostics
    pub convergence: PathBuf,
    /// Run summary
    pub summary: PathBuf,
}

impl OutputPaths {
    /// Standard file names under `directory`
    pub fn in_directory<P: AsRef<Path>>(directory: P) -> Self {
        let directory = directory.as_ref();
        Self {
            locations: directory.join(LOCATIONS_FILE),
            convergence: directory.join(CONVERGENCE_FILE),
            summary: directory.join(SUMMARY_FILE),
        }
    }
}

/// Write the three result files of a batch run, creating the directory if needed
pub fn write_results<P: AsRef<Path>>(directory: P, result: &BatchResult) -> AssignmentResult<OutputPaths> {
    fs::create_dir_all(directory.as_ref())?;
    let paths = OutputPaths::in_directory(directory);

    write_jsonl::<AssignmentRecord, _>(&paths.locations, &result.locations)?;
    write_jsonl::<ConvergenceRecord, _>(&paths.convergence, &result.convergence)?;
    write_summary(&paths.summary, &result.summary)?;

    info!(
        locations = result.locations.len(),
        problems = result.convergence.len(),
        "Results written to {}",
        paths.locations.display()
    );
    Ok(paths)
}

/// Write the run summary as pretty JSON
pub fn write_summary<P: AsRef<Path>>(path: P, summary: &ConvergenceSummary) -> AssignmentResult<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}
