//! ChronoFlux headless CLI
//!
//! Runs deterministic multi-replica swarm scenarios and optional event
//! trail exports.

use chronoflux_sim::scenarios::ScenarioId;
use chronoflux_sim::{
    BusRouter, Replica, ScenarioResult, ScenarioRunner, Scheduler, TelemetryExport,
    AUTOSAVE_PERIOD,
};

use chronoflux_core::SimConfig;
use chronoflux_env::ReplicaId;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Runs one autopilot replica and writes its event trail to JSON.
fn run_with_export(
    seed: u64,
    replica_seed: u64,
    agents: usize,
    room: &str,
    duration: f64,
    export_path: &str,
) -> std::io::Result<()> {
    let replica_id = ReplicaId::from_seed(replica_seed);
    let config = SimConfig {
        seed,
        agent_count: agents,
        room: room.to_string(),
        replica: replica_id,
        ..SimConfig::default()
    };

    let mut router = BusRouter::new(seed);
    let net = router.attach(replica_id);
    let mut replica = Replica::new(config, net);
    replica.enable_autopilot();

    // Long runs overwrite the export file periodically so that a killed
    // process still leaves a recent trail behind.
    let mut autosave = Scheduler::new();
    autosave.every("autosave", AUTOSAVE_PERIOD);

    let dt = 0.016;
    let target_ticks = (duration / dt).round() as u64;
    for tick in 0..target_ticks {
        replica.step(dt);
        router.route();

        for _ in autosave.advance(dt) {
            let mut partial = TelemetryExport::new(room, &replica_id.to_string(), seed);
            partial.snapshot(replica.sim());
            partial.write_to_file(export_path)?;
            info!(
                "Autosaved {} records at t={:.1}s",
                partial.records.len(),
                replica.sim().t()
            );
        }

        if tick % 625 == 0 {
            info!(
                "  t={:.1}s | H={:.3} | τ={:.4} | intents={}",
                replica.sim().t(),
                replica.sim().harmony(),
                replica.sim().turbulence(),
                replica.sim().intents().len(),
            );
        }
    }

    let sim = replica.into_sim();
    let (t, harmony, turbulence) = (sim.t(), sim.harmony(), sim.turbulence());

    let mut export = TelemetryExport::new(room, &replica_id.to_string(), seed);
    export.finalize(sim.shutdown(), t, harmony, turbulence);
    export.write_to_file(export_path)?;

    info!(
        "Exported {} records to {}",
        export.records.len(),
        export_path
    );
    Ok(())
}

/// ChronoFlux deterministic swarm simulator
#[derive(Parser, Debug)]
#[command(name = "chronoflux-sim")]
#[command(about = "Run deterministic ChronoFlux swarm scenarios", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of agents per replica
    #[arg(short, long, default_value = "100")]
    agents: usize,

    /// Room identifier for exports
    #[arg(short, long, default_value = "headless-swarm")]
    room: String,

    /// Replica identity seed (defaults to the master seed)
    #[arg(long)]
    replica: Option<u64>,

    /// Scenario to run (solo, relay, portal_wave, flip_storm, lossy_mesh, split_brain, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum simulation duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export a solo run's event trail to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    // Export mode runs one autopilot replica instead of the scenario set.
    if let Some(export_path) = &args.export {
        info!("Running autopilot export to: {}", export_path);
        match run_with_export(
            base_seed,
            args.replica.unwrap_or(base_seed),
            args.agents,
            &args.room,
            args.duration,
            export_path,
        ) {
            Ok(()) => return,
            Err(e) => {
                error!("Export failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!(
                "Available scenarios: solo, relay, portal_wave, flip_storm, lossy_mesh, split_brain, all"
            );
            std::process::exit(1);
        })]
    };

    if !args.json {
        info!("ChronoFlux deterministic swarm simulator v0.1.0");
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed, args.agents).with_duration(args.duration);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
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

    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "harmony": r.final_harmony,
                    "turbulence": r.final_turbulence,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else if failed_count == 0 {
        info!("All {} scenario runs passed", total);
    } else {
        error!("{}/{} scenario runs failed", failed_count, total);
        for result in &all_results {
            if !result.passed {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if failed_count > 0 {
        std::process::exit(1);
    }
}
