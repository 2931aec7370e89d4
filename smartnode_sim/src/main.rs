//! smartnode Simulator CLI
//!
//! Run node profiles under fault scenarios on a virtual clock.

use clap::Parser;
use smartnode_core::NodeProfile;
use smartnode_sim::scenarios::ScenarioId;
use smartnode_sim::{ScenarioResult, ScenarioRunner};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// smartnode Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "smartnode-sim")]
#[command(about = "Run smartnode profiles under simulated session faults", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Profile to run (light, display, safety, server, all)
    #[arg(short, long, default_value = "all")]
    profile: String,

    /// Scenario to run (steady, flaky_publish, fetch_blackout, cancel_midrun, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Virtual run time per scenario in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.json { Level::WARN } else { level })
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("smartnode simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let profiles: Vec<NodeProfile> = if args.profile == "all" {
        NodeProfile::all()
    } else {
        vec![args.profile.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available profiles: light, display, safety, server, all");
            std::process::exit(1);
        })]
    };

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: steady, flaky_publish, fetch_blackout, cancel_midrun, all");
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);

        for profile in &profiles {
            let runner = ScenarioRunner::new(seed, *profile).with_duration(args.duration);

            for scenario in &scenarios {
                let result = match runner.run(*scenario) {
                    Ok(result) => result,
                    Err(e) => {
                        error!("Cannot run simulation: {}", e);
                        std::process::exit(2);
                    }
                };

                if !args.json {
                    if result.passed {
                        info!("✓ {}/{} (seed={}) PASSED", profile, scenario.name(), seed);
                    } else {
                        error!(
                            "✗ {}/{} (seed={}) FAILED: {}",
                            profile,
                            scenario.name(),
                            seed,
                            result.failure_reason.as_deref().unwrap_or("unknown")
                        );
                    }
                }

                if !result.passed {
                    failed_count += 1;
                }

                all_results.push(result);
            }
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "profile": r.profile.name(),
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "time_secs": r.final_time_secs,
                    "late_calls": r.late_calls,
                    "failure_reason": r.failure_reason,
                    "report": r.report,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {}/{} seed={}: {}",
                        result.profile,
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
