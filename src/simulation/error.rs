//! Error types and handling
//!
//! This module contains the error taxonomy of the assignment engine. Data-quality
//! skips and unconverged problems are not errors: the first is counted by the chain
//! decomposer, the second is reported as an invalid convergence record.

use crate::facility::FacilityIndex;
use crate::types::{ActivityPurpose, TravelMode};
use thiserror::Error;
use tracing::{error, warn};

/// Errors that can occur during an assignment run
#[derive(Debug, Error)]
pub enum AssignmentError {
    /// The facility pool has no capacity left for a required purpose
    #[error("Facility pool exhausted for purpose {purpose}: destination inventory is insufficient for the modelled population")]
    PoolExhausted {
        /// Purpose of the stop that could not be placed
        purpose: ActivityPurpose,
    },

    /// A population leg uses a mode that the survey never observed
    #[error("No distance distribution for mode {mode}")]
    MissingDistribution {
        /// Mode without survey legs
        mode: TravelMode,
    },

    /// A survey source has no usable legs at all
    #[error("Survey source {source_name} has no usable legs")]
    EmptySurvey {
        /// Name of the survey source
        source_name: String,
    },

    /// A facility record could not be used
    #[error("Invalid facility: {0}")]
    InvalidFacility(String),

    /// A commit referenced a facility slot that was already pruned
    #[error("Facility slot {index} was already removed from the pool")]
    StaleFacility {
        /// The pruned slot
        index: FacilityIndex,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Configuration(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AssignmentError {
    /// Create a pool exhaustion error
    pub fn pool_exhausted(purpose: ActivityPurpose) -> Self {
        Self::PoolExhausted { purpose }
    }

    /// Create a missing distribution error
    pub fn missing_distribution(mode: TravelMode) -> Self {
        Self::MissingDistribution { mode }
    }

    /// Create an empty survey error
    pub fn empty_survey(source_name: impl Into<String>) -> Self {
        Self::EmptySurvey { source_name: source_name.into() }
    }

    /// Create an invalid facility error
    pub fn invalid_facility(msg: impl Into<String>) -> Self {
        Self::InvalidFacility(msg.into())
    }

    /// Create a configuration error
    pub fn configuration_error(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this is a recoverable error
    ///
    /// Only a malformed facility record can be dropped while the run continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AssignmentError::InvalidFacility(_))
    }

    /// Get the error category
    pub fn category(&self) -> &'static str {
        match self {
            AssignmentError::PoolExhausted { .. } => "Pool Exhausted",
            AssignmentError::MissingDistribution { .. } => "Distance Model",
            AssignmentError::EmptySurvey { .. } => "Distance Model",
            AssignmentError::InvalidFacility(_) => "Facility",
            AssignmentError::StaleFacility { .. } => "Facility",
            AssignmentError::Configuration(_) => "Configuration",
            AssignmentError::Io(_) => "IO",
            AssignmentError::Serialization(_) => "Serialization",
        }
    }

    /// Log the error at a level matching its recoverability
    pub fn report(&self) {
        if self.is_recoverable() {
            warn!(category = self.category(), "Recoverable error: {}", self);
        } else {
            error!(category = self.category(), "Fatal error: {}", self);
        }
    }
}

/// Result type for assignment operations
pub type AssignmentResult<T> = Result<T, AssignmentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let error = AssignmentError::pool_exhausted(ActivityPurpose::Secondary("6".to_string()));
        assert!(matches!(error, AssignmentError::PoolExhausted { .. }));
        assert!(error.to_string().contains("purpose Secondary(6)"));

        let error = AssignmentError::configuration_error("bad thresholds");
        assert_eq!(error.to_string(), "Configuration validation failed: bad thresholds");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: AssignmentError = io_error.into();
        assert!(matches!(error, AssignmentError::Io(_)));
        assert_eq!(error.category(), "IO");
    }

    #[test]
    fn test_error_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: AssignmentError = json_error.into();
        assert!(matches!(error, AssignmentError::Serialization(_)));
    }

    #[test]
    fn test_error_recoverability() {
        assert!(AssignmentError::invalid_facility("negative visitors").is_recoverable());
        assert!(!AssignmentError::pool_exhausted(ActivityPurpose::Home).is_recoverable());
        assert!(!AssignmentError::missing_distribution(TravelMode::from("6")).is_recoverable());
        assert!(!AssignmentError::empty_survey("mid").is_recoverable());
        assert!(!AssignmentError::StaleFacility { index: FacilityIndex(3) }.is_recoverable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            AssignmentError::pool_exhausted(ActivityPurpose::Home).category(),
            "Pool Exhausted"
        );
        assert_eq!(AssignmentError::empty_survey("mid").category(), "Distance Model");
        assert_eq!(AssignmentError::invalid_facility("x").category(), "Facility");
        assert_eq!(AssignmentError::configuration_error("x").category(), "Configuration");
    }
}
