// Activity Chain Locator - Main Entry Point
//
// You can run it via Cargo:
//
// ```console
// $ cargo build --release
// $ ./target/release/activity-chain-locator --input scenario.json
// ```
//
// Or with custom configuration:
//
// ```console
// $ ./target/release/activity-chain-locator --input scenario.json --maximum-iterations 50 --seed 42 --verbose
// ```

use activity_chain_locator::io::{self, Scenario};
use activity_chain_locator::simulation::{BatchRunner, ConvergenceSummary, LoggingConfig};
use activity_chain_locator::types::config::CliArgs;
use activity_chain_locator::types::AssignmentConfig;
use anyhow::{anyhow, Context};
use clap::Parser;
use std::process;
use tracing::{error, info};

fn main() {
    // Parse CLI arguments first to check for special flags
    let args = CliArgs::parse();

    // Handle special CLI flags that don't require full initialization
    if args.print_config {
        match AssignmentConfig::default().print_json() {
            Ok(json) => {
                println!("{}", json);
                return;
            }
            Err(e) => {
                eprintln!("Failed to serialize default configuration: {}", e);
                process::exit(1);
            }
        }
    }

    // Initialize logging based on CLI flags; the guard flushes file output on drop
    let logging_result = if args.debug {
        LoggingConfig::init_debug()
    } else if args.verbose {
        LoggingConfig::init_verbose()
    } else {
        LoggingConfig::init_default()
    };

    let _logging_guard = match logging_result {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    info!("Starting Activity Chain Locator");

    // Load configuration from CLI arguments and optional config file
    let config = match AssignmentConfig::from_cli_args(args.clone()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        process::exit(1);
    }

    info!("Configuration loaded and validated successfully");

    // Handle dry run mode
    if args.dry_run {
        eprintln!("Configuration validation successful!");
        eprintln!("Dry run mode - assignment will not be executed.");
        print_configuration_summary(&config);
        return;
    }

    print_startup_banner(&config);

    if let Err(e) = run_assignment(config) {
        error!("Assignment failed: {:#}", e);
        eprintln!("Assignment failed: {:#}", e);
        process::exit(1);
    }

    info!("Activity Chain Locator completed successfully");
}

/// Load the scenario, run every source and write the result tables
fn run_assignment(config: AssignmentConfig) -> anyhow::Result<()> {
    let input = config
        .input
        .clone()
        .ok_or_else(|| anyhow!("No scenario given; pass --input or set \"input\" in the config file"))?;
    let output_directory = config.output_directory.clone();

    eprintln!("Loading scenario {}...", input);
    let scenario =
        Scenario::from_file(&input).with_context(|| format!("Failed to load scenario '{}'", input))?;
    let (pool, sources) = scenario.into_parts();
    info!(
        "Facility pool ready: {} facilities at {} sites, capacity {}",
        pool.len(),
        pool.site_count(),
        pool.total_capacity()
    );

    let runner = BatchRunner::new(config).context("Failed to create batch runner")?;

    eprintln!("Assigning secondary locations for {} sources...", sources.len());
    let result = runner.run(pool, sources).context("Secondary location assignment failed")?;

    let paths = io::write_results(&output_directory, &result)
        .with_context(|| format!("Failed to write results to '{}'", output_directory))?;
    eprintln!("Locations written to: {}", paths.locations.display());
    eprintln!("Convergence written to: {}", paths.convergence.display());
    eprintln!("Summary written to: {}", paths.summary.display());

    print_final_summary(&result.summary);
    Ok(())
}

/// Print startup banner and configuration summary
fn print_startup_banner(config: &AssignmentConfig) {
    eprintln!("Activity Chain Locator");
    eprintln!("======================");
    eprintln!("Secondary activity location assignment");
    eprintln!();

    print_configuration_summary(config);
}

/// Print configuration summary
fn print_configuration_summary(config: &AssignmentConfig) {
    eprintln!("Configuration:");
    if let Some(input) = &config.input {
        eprintln!("  Scenario: {}", input);
    }
    eprintln!("  Output Directory: {}", config.output_directory);
    eprintln!("  Maximum Iterations: {}", config.maximum_iterations);
    eprintln!("  Sampler Maximum Iterations: {}", config.sampler_maximum_iterations);
    eprintln!("  Lateral Deviation: {:.1} m", config.lateral_deviation);
    eprintln!(
        "  Relaxation: alpha {:.2}, eps {:.2} m, {} iterations",
        config.relaxation_alpha, config.relaxation_eps, config.relaxation_maximum_iterations
    );
    eprintln!("  Minimum Band Samples: {}", config.minimum_band_samples);
    eprintln!("  Default Threshold: {:.0} m", config.default_threshold);
    for (mode, threshold) in &config.thresholds {
        eprintln!("    mode {}: {:.0} m", mode, threshold);
    }
    if !config.cdf_adjustments.is_empty() {
        eprintln!("  CDF Adjustments:");
        for (mode, factor) in &config.cdf_adjustments {
            eprintln!("    mode {}: {:+.2}", mode, factor);
        }
    }
    eprintln!("  Give-up Policy: {}", config.give_up_policy);
    if let Some(seed) = config.seed {
        eprintln!("  Random Seed: {}", seed);
    }
    eprintln!();
}

/// Print the run summary
fn print_final_summary(summary: &ConvergenceSummary) {
    eprintln!();
    eprintln!("{}", summary);
}
