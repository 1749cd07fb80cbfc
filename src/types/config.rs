//! Configuration structures for the secondary location assigner
//!
//! This module contains the assignment configuration structure and validation
//! logic used to control the solver loop, the distance model and the batch run.

use super::GiveUpPolicy;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default per-mode deviation thresholds in metres
pub mod thresholds {
    /// Threshold for slow modes (on foot, bike)
    pub const SLOW_MODE_METRES: f64 = 100.0;

    /// Threshold for every other mode
    pub const DEFAULT_METRES: f64 = 200.0;

    /// Mode codes that use the slow-mode threshold
    pub const SLOW_MODES: [&str; 2] = ["1", "2"];

    /// Mode codes that use the default threshold
    pub const OTHER_MODES: [&str; 7] = ["3", "4", "5", "6", "7", "8", "999"];
}

/// Command line arguments structure
#[derive(Debug, Clone, Parser)]
#[command(
    name = "activity-chain-locator",
    version = "0.1.0",
    about = "Assigns secondary activity locations to synthetic persons",
    long_about = "Places the secondary stops (shopping, leisure, errands, ...) of every synthetic person's trip chain on capacity-limited facilities so that leg distances follow the travel survey per mode and travel time.

EXAMPLES:
    # Run a scenario with default settings
    activity-chain-locator --input scenario.json

    # Use a configuration file
    activity-chain-locator --config config.json --input scenario.json

    # Override specific settings
    activity-chain-locator --input scenario.json --maximum-iterations 50 --seed 42

    # Generate configuration template
    activity-chain-locator --print-config > my-config.json

    # Validate configuration without running
    activity-chain-locator --config my-config.json --dry-run

CONFIGURATION:
    Configuration can be provided via:
    1. Command line arguments (highest priority)
    2. Configuration file (--config flag)
    3. Default values (lowest priority)

    Supported configuration file formats: JSON (.json)"
)]
pub struct CliArgs {
    /// Configuration file path (JSON format)
    #[arg(
        short,
        long,
        help = "Configuration file path (JSON format)",
        long_help = "Path to a JSON configuration file. CLI arguments will override file settings."
    )]
    pub config: Option<String>,

    /// Scenario input file
    #[arg(short, long, help = "Scenario input file (JSON)")]
    pub input: Option<String>,

    /// Directory for result tables
    #[arg(short, long, help = "Output directory for result tables")]
    pub output_directory: Option<String>,

    /// Maximum sample/relax/discretize attempts per problem
    #[arg(
        long,
        help = "Maximum solver iterations per problem",
        long_help = "Maximum number of sample, relax, discretize and evaluate rounds per assignment problem before giving up. Default: 20"
    )]
    pub maximum_iterations: Option<usize>,

    /// Maximum redraws when sampling feasible distances
    #[arg(long, help = "Maximum redraws for feasible distance samples")]
    pub sampler_maximum_iterations: Option<usize>,

    /// Bound on the lateral offset of the initial relaxation placement
    #[arg(long, help = "Lateral deviation bound for relaxation (metres)")]
    pub lateral_deviation: Option<f64>,

    /// Fallback threshold for modes without an explicit threshold
    #[arg(long, help = "Fallback deviation threshold (metres)")]
    pub default_threshold: Option<f64>,

    /// Minimum survey samples per travel-time band
    #[arg(long, help = "Minimum survey samples per travel-time band")]
    pub minimum_band_samples: Option<usize>,

    /// Which attempt to keep for unconverged problems
    #[arg(long, help = "Give-up policy for unconverged problems (last or best)")]
    pub give_up_policy: Option<String>,

    /// Random seed for reproducible results
    #[arg(long, help = "Random seed for reproducible results")]
    pub seed: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, help = "Enable debug logging")]
    pub debug: bool,

    /// Dry run mode - validate configuration without running the assignment
    #[arg(long, help = "Validate configuration without running the assignment")]
    pub dry_run: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in JSON format and exit")]
    pub print_config: bool,
}

/// Configuration file structure (allows partial configuration)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Maximum solver iterations per problem
    pub maximum_iterations: Option<usize>,
    /// Maximum redraws for feasible distance samples
    pub sampler_maximum_iterations: Option<usize>,
    /// Lateral deviation bound for relaxation
    pub lateral_deviation: Option<f64>,
    /// Relaxation step size
    pub relaxation_alpha: Option<f64>,
    /// Relaxation convergence tolerance
    pub relaxation_eps: Option<f64>,
    /// Relaxation iteration cap
    pub relaxation_maximum_iterations: Option<usize>,
    /// Minimum survey samples per travel-time band
    pub minimum_band_samples: Option<usize>,
    /// Per-mode deviation thresholds
    pub thresholds: Option<BTreeMap<String, f64>>,
    /// Fallback threshold
    pub default_threshold: Option<f64>,
    /// Per-mode CDF adjustment factors
    pub cdf_adjustments: Option<BTreeMap<String, f64>>,
    /// Give-up policy
    pub give_up_policy: Option<GiveUpPolicy>,
    /// Success rate below which a recommendation is logged
    pub low_success_rate: Option<f64>,
    /// Random seed
    pub seed: Option<u64>,
    /// Scenario input file
    pub input: Option<String>,
    /// Output directory
    pub output_directory: Option<String>,
}

/// Configuration for a secondary location assignment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// Maximum sample/relax/discretize/evaluate rounds per problem
    pub maximum_iterations: usize,

    /// Maximum redraws when looking for geometrically feasible distances
    pub sampler_maximum_iterations: usize,

    /// Bound on the lateral offset of the initial relaxation placement (metres)
    pub lateral_deviation: f64,

    /// Fraction of the leg error corrected per relaxation step (0, 1]
    pub relaxation_alpha: f64,

    /// Largest leg error (metres) at which the relaxation counts as converged
    pub relaxation_eps: f64,

    /// Relaxation iteration cap
    pub relaxation_maximum_iterations: usize,

    /// Minimum survey samples per travel-time band
    pub minimum_band_samples: usize,

    /// Maximum acceptable deviation per mode code (metres)
    pub thresholds: BTreeMap<String, f64>,

    /// Threshold used for modes missing from `thresholds`
    pub default_threshold: f64,

    /// Per-mode CDF tilt factors in (-1, 1); missing modes are left unchanged
    pub cdf_adjustments: BTreeMap<String, f64>,

    /// Which attempt to keep when no iteration converges
    pub give_up_policy: GiveUpPolicy,

    /// Success rate below which the run summary recommends tuning
    pub low_success_rate: f64,

    /// Random seed for reproducible results
    pub seed: Option<u64>,

    /// Scenario input file
    pub input: Option<String>,

    /// Directory receiving the result tables
    pub output_directory: String,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Configuration file read error
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("Failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unsupported configuration file format
    #[error("Unsupported configuration file format: {0} (supported: .json)")]
    UnsupportedFormat(String),

    /// A CLI value could not be interpreted
    #[error("Invalid command line value: {0}")]
    InvalidArgument(String),
}

/// Validation errors for the assignment configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    /// An iteration cap is zero
    #[error("{field} must be greater than 0")]
    ZeroIterations {
        /// Name of the offending field
        field: String,
    },

    /// Band sample minimum is zero
    #[error("Minimum band samples must be greater than 0")]
    InvalidBandSamples,

    /// A threshold is not a positive finite number
    #[error("Invalid threshold for mode {mode}: {value} (must be positive and finite)")]
    InvalidThreshold {
        /// Mode code (or "default")
        mode: String,
        /// The invalid threshold
        value: f64,
    },

    /// Relaxation step size out of range
    #[error("Relaxation alpha must be in (0, 1], got {0}")]
    InvalidAlpha(f64),

    /// Negative or non-finite distance parameter
    #[error("Invalid value for {field}: {value} (must be finite and >= 0)")]
    InvalidDistance {
        /// Name of the offending field
        field: String,
        /// The invalid value
        value: f64,
    },

    /// Percentage value is out of range
    #[error("Invalid percentage for {field}: {value} (must be between 0.0 and 1.0)")]
    InvalidPercentage {
        /// Name of the field with invalid percentage
        field: String,
        /// The invalid percentage value
        value: f64,
    },

    /// CDF adjustment factor out of range
    #[error("Invalid CDF adjustment for mode {mode}: {value} (must be in (-1, 1))")]
    InvalidAdjustment {
        /// Mode code
        mode: String,
        /// The invalid factor
        value: f64,
    },
}

/// Production thresholds: 100 m for walking and cycling, 200 m otherwise
pub fn default_thresholds() -> BTreeMap<String, f64> {
    let mut map = BTreeMap::new();
    for mode in thresholds::SLOW_MODES {
        map.insert(mode.to_string(), thresholds::SLOW_MODE_METRES);
    }
    for mode in thresholds::OTHER_MODES {
        map.insert(mode.to_string(), thresholds::DEFAULT_METRES);
    }
    map
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            maximum_iterations: 20,
            sampler_maximum_iterations: 1000,
            lateral_deviation: 10.0,
            relaxation_alpha: 0.3,
            relaxation_eps: 1.0,
            relaxation_maximum_iterations: 1000,
            minimum_band_samples: 20,
            thresholds: default_thresholds(),
            default_threshold: thresholds::DEFAULT_METRES,
            cdf_adjustments: BTreeMap::new(),
            give_up_policy: GiveUpPolicy::Last,
            low_success_rate: 0.9,
            seed: None,
            input: None,
            output_directory: "output".to_string(),
        }
    }
}

impl AssignmentConfig {
    /// Create a new configuration from command line arguments and optional config file
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::from_cli_args(args)
    }

    /// Create configuration from parsed CLI arguments
    pub fn from_cli_args(args: CliArgs) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(config_path) = &args.config {
            config = Self::from_file(config_path)?;
        }

        // CLI takes precedence over the file
        Self::apply_cli_overrides(&mut config, args)?;

        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                let config_file: ConfigFile = serde_json::from_str(&content)?;
                Ok(Self::from_config_file(config_file))
            }
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }
    }

    /// Create configuration from a config file, merging with defaults
    fn from_config_file(config_file: ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            maximum_iterations: config_file
                .maximum_iterations
                .unwrap_or(defaults.maximum_iterations),
            sampler_maximum_iterations: config_file
                .sampler_maximum_iterations
                .unwrap_or(defaults.sampler_maximum_iterations),
            lateral_deviation: config_file
                .lateral_deviation
                .unwrap_or(defaults.lateral_deviation),
            relaxation_alpha: config_file.relaxation_alpha.unwrap_or(defaults.relaxation_alpha),
            relaxation_eps: config_file.relaxation_eps.unwrap_or(defaults.relaxation_eps),
            relaxation_maximum_iterations: config_file
                .relaxation_maximum_iterations
                .unwrap_or(defaults.relaxation_maximum_iterations),
            minimum_band_samples: config_file
                .minimum_band_samples
                .unwrap_or(defaults.minimum_band_samples),
            thresholds: config_file.thresholds.unwrap_or(defaults.thresholds),
            default_threshold: config_file
                .default_threshold
                .unwrap_or(defaults.default_threshold),
            cdf_adjustments: config_file.cdf_adjustments.unwrap_or(defaults.cdf_adjustments),
            give_up_policy: config_file.give_up_policy.unwrap_or(defaults.give_up_policy),
            low_success_rate: config_file.low_success_rate.unwrap_or(defaults.low_success_rate),
            seed: config_file.seed.or(defaults.seed),
            input: config_file.input.or(defaults.input),
            output_directory: config_file
                .output_directory
                .unwrap_or(defaults.output_directory),
        }
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(config: &mut Self, args: CliArgs) -> Result<(), ConfigError> {
        if let Some(value) = args.input {
            config.input = Some(value);
        }
        if let Some(value) = args.output_directory {
            config.output_directory = value;
        }
        if let Some(value) = args.maximum_iterations {
            config.maximum_iterations = value;
        }
        if let Some(value) = args.sampler_maximum_iterations {
            config.sampler_maximum_iterations = value;
        }
        if let Some(value) = args.lateral_deviation {
            config.lateral_deviation = value;
        }
        if let Some(value) = args.default_threshold {
            config.default_threshold = value;
        }
        if let Some(value) = args.minimum_band_samples {
            config.minimum_band_samples = value;
        }
        if let Some(value) = args.give_up_policy {
            config.give_up_policy = value.parse().map_err(ConfigError::InvalidArgument)?;
        }
        if let Some(value) = args.seed {
            config.seed = Some(value);
        }
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Print configuration as JSON
    pub fn print_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        Self::validate_iterations("maximum_iterations", self.maximum_iterations)?;
        Self::validate_iterations("sampler_maximum_iterations", self.sampler_maximum_iterations)?;
        Self::validate_iterations(
            "relaxation_maximum_iterations",
            self.relaxation_maximum_iterations,
        )?;

        if self.minimum_band_samples == 0 {
            return Err(ConfigValidationError::InvalidBandSamples);
        }

        if !(self.relaxation_alpha > 0.0 && self.relaxation_alpha <= 1.0) {
            return Err(ConfigValidationError::InvalidAlpha(self.relaxation_alpha));
        }

        Self::validate_distance("lateral_deviation", self.lateral_deviation)?;
        Self::validate_distance("relaxation_eps", self.relaxation_eps)?;

        for (mode, &value) in &self.thresholds {
            Self::validate_threshold(mode, value)?;
        }
        Self::validate_threshold("default", self.default_threshold)?;

        for (mode, &value) in &self.cdf_adjustments {
            if !(value > -1.0 && value < 1.0) {
                return Err(ConfigValidationError::InvalidAdjustment { mode: mode.clone(), value });
            }
        }

        if !(0.0..=1.0).contains(&self.low_success_rate) {
            return Err(ConfigValidationError::InvalidPercentage {
                field: "low_success_rate".to_string(),
                value: self.low_success_rate,
            });
        }

        Ok(())
    }

    fn validate_iterations(field: &str, value: usize) -> Result<(), ConfigValidationError> {
        if value == 0 {
            return Err(ConfigValidationError::ZeroIterations { field: field.to_string() });
        }
        Ok(())
    }

    fn validate_distance(field: &str, value: f64) -> Result<(), ConfigValidationError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigValidationError::InvalidDistance { field: field.to_string(), value });
        }
        Ok(())
    }

    fn validate_threshold(mode: &str, value: f64) -> Result<(), ConfigValidationError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigValidationError::InvalidThreshold { mode: mode.to_string(), value });
        }
        Ok(())
    }

    /// Deviation threshold for a mode code, falling back to `default_threshold`
    pub fn threshold_for(&self, mode: &str) -> f64 {
        mode_threshold(&self.thresholds, self.default_threshold, mode)
    }
}

/// Threshold for `mode` from a per-mode table, or `default` when it has no entry
pub fn mode_threshold(thresholds: &BTreeMap<String, f64>, default: f64, mode: &str) -> f64 {
    thresholds.get(mode).copied().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            config: None,
            input: None,
            output_directory: None,
            maximum_iterations: None,
            sampler_maximum_iterations: None,
            lateral_deviation: None,
            default_threshold: None,
            minimum_band_samples: None,
            give_up_policy: None,
            seed: None,
            verbose: false,
            debug: false,
            dry_run: false,
            print_config: false,
        }
    }

    #[test]
    fn test_assignment_config_default() {
        let config = AssignmentConfig::default();

        assert_eq!(config.maximum_iterations, 20);
        assert_eq!(config.sampler_maximum_iterations, 1000);
        assert_eq!(config.lateral_deviation, 10.0);
        assert_eq!(config.relaxation_alpha, 0.3);
        assert_eq!(config.minimum_band_samples, 20);
        assert_eq!(config.thresholds.len(), 9);
        assert_eq!(config.threshold_for("1"), 100.0);
        assert_eq!(config.threshold_for("6"), 200.0);
        assert_eq!(config.give_up_policy, GiveUpPolicy::Last);
        assert!(config.seed.is_none());
        assert!(config.cdf_adjustments.is_empty());
    }

    #[test]
    fn test_threshold_fallback() {
        let mut config = AssignmentConfig::default();
        config.default_threshold = 350.0;
        assert_eq!(config.threshold_for("unknown-mode"), 350.0);
    }

    #[test]
    fn test_cli_parsing() {
        let args = vec!["test", "--input", "scenario.json", "--maximum-iterations", "5", "--seed", "7"];
        let cli_args = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(cli_args.input.as_deref(), Some("scenario.json"));
        assert_eq!(cli_args.maximum_iterations, Some(5));
        assert_eq!(cli_args.seed, Some(7));
        assert!(!cli_args.dry_run);
    }

    #[test]
    fn test_cli_overrides() {
        let mut args = empty_args();
        args.maximum_iterations = Some(50);
        args.lateral_deviation = Some(25.0);
        args.give_up_policy = Some("best".to_string());
        args.seed = Some(54321);

        let config = AssignmentConfig::from_cli_args(args).unwrap();

        assert_eq!(config.maximum_iterations, 50);
        assert_eq!(config.lateral_deviation, 25.0);
        assert_eq!(config.give_up_policy, GiveUpPolicy::Best);
        assert_eq!(config.seed, Some(54321));
        // Default values should remain for non-overridden fields
        assert_eq!(config.sampler_maximum_iterations, 1000);
    }

    #[test]
    fn test_cli_rejects_unknown_policy() {
        let mut args = empty_args();
        args.give_up_policy = Some("never".to_string());

        match AssignmentConfig::from_cli_args(args) {
            Err(ConfigError::InvalidArgument(msg)) => assert!(msg.contains("never")),
            other => panic!("Expected InvalidArgument error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_file_loading() {
        use std::io::Write;
        use tempfile::Builder;

        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        let config_json = r#"{
            "maximum_iterations": 30,
            "thresholds": { "1": 50.0, "6": 400.0 },
            "cdf_adjustments": { "6": 0.2 },
            "give_up_policy": "best",
            "seed": 12345
        }"#;

        temp_file.write_all(config_json.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = AssignmentConfig::from_file(temp_file.path()).unwrap();

        assert_eq!(config.maximum_iterations, 30);
        assert_eq!(config.threshold_for("1"), 50.0);
        assert_eq!(config.threshold_for("6"), 400.0);
        // Modes missing from a replaced map use the fallback
        assert_eq!(config.threshold_for("3"), 200.0);
        assert_eq!(config.cdf_adjustments.get("6"), Some(&0.2));
        assert_eq!(config.give_up_policy, GiveUpPolicy::Best);
        assert_eq!(config.seed, Some(12345));
        assert_eq!(config.lateral_deviation, 10.0);
    }

    #[test]
    fn test_config_file_errors() {
        assert!(matches!(
            AssignmentConfig::from_file("/definitely/not/here.json"),
            Err(ConfigError::FileNotFound(_))
        ));

        let temp_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            AssignmentConfig::from_file(temp_file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_config_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AssignmentConfig::default();
        config.seed = Some(99);
        config.save_to_file(&path).unwrap();

        let reloaded = AssignmentConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.seed, Some(99));
        assert_eq!(reloaded.thresholds, config.thresholds);
    }

    #[test]
    fn test_validation_success() {
        assert!(AssignmentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_iterations() {
        let mut config = AssignmentConfig::default();
        config.maximum_iterations = 0;

        match config.validate() {
            Err(ConfigValidationError::ZeroIterations { field }) => {
                assert_eq!(field, "maximum_iterations")
            }
            _ => panic!("Expected ZeroIterations error"),
        }
    }

    #[test]
    fn test_validation_thresholds() {
        let mut config = AssignmentConfig::default();
        config.thresholds.insert("3".to_string(), -5.0);

        match config.validate() {
            Err(ConfigValidationError::InvalidThreshold { mode, value }) => {
                assert_eq!(mode, "3");
                assert_eq!(value, -5.0);
            }
            _ => panic!("Expected InvalidThreshold error"),
        }

        let mut config = AssignmentConfig::default();
        config.default_threshold = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_validation_alpha_and_distances() {
        let mut config = AssignmentConfig::default();
        config.relaxation_alpha = 1.5;
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidAlpha(_))));

        let mut config = AssignmentConfig::default();
        config.lateral_deviation = -1.0;
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidDistance { .. })));
    }

    #[test]
    fn test_validation_adjustments_and_rate() {
        let mut config = AssignmentConfig::default();
        config.cdf_adjustments.insert("1".to_string(), 1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidAdjustment { .. })
        ));

        let mut config = AssignmentConfig::default();
        config.low_success_rate = 1.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidPercentage { .. })
        ));
    }

    #[test]
    fn test_print_json_roundtrip() {
        let config = AssignmentConfig::default();
        let json = config.print_json().unwrap();
        let back: AssignmentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.maximum_iterations, config.maximum_iterations);
        assert_eq!(back.thresholds, config.thresholds);
    }
}
