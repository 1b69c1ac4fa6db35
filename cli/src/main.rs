//! `lanempc` CLI: closed-loop scenario runs, metrics export, run-log replay.

use anyhow::Result;
use clap::{Parser, Subcommand};
use nmpc_core::types::{state_from_array, state_to_array};
use nmpc_core::{
    IntegratorPlant, LevenbergMarquardt, Plant, RecedingHorizonController, ReferenceSource,
    RunMetrics, TickRecord,
};
use sim::plant::DisturbedPlant;
use sim::replay::{load_run_log, save_run_log, RunLog};
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::PathBuf;
use vehicle_models::{BicycleModel, PacejkaTire};

#[derive(Parser)]
#[command(name = "lanempc", about = "Receding-horizon vehicle controller CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named scenario in closed loop and output tracking metrics.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for the plant disturbance
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the full run log
        #[arg(long)]
        save_log: Option<PathBuf>,
    },
    /// Re-integrate the controls of a recorded run and report the divergence
    /// from the logged states.
    Replay {
        /// Path to run-log JSON file
        input: PathBuf,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            output,
            save_log,
        } => {
            run_scenario(scenario, seed, output.as_deref(), save_log.as_deref())?;
        }
        Commands::Replay { input, output } => {
            run_replay(&input, output.as_deref())?;
        }
    }

    Ok(())
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    output_path: Option<&std::path::Path>,
    log_path: Option<&std::path::Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    let model = BicycleModel::new(scenario.vehicle.clone(), PacejkaTire::default());
    let dt = scenario.horizon.dt;
    let plant = DisturbedPlant::new(model.clone(), dt, scenario.disturbance_std, seed);
    let mut controller = RecedingHorizonController::new(
        model,
        scenario.horizon.clone(),
        LevenbergMarquardt::default(),
        plant,
        state_from_array(&scenario.initial_state),
    )?;

    println!(
        "Running scenario '{}' (seed={}, duration={:.0}s)...",
        scenario.name, seed, scenario.duration
    );

    let start = std::time::Instant::now();
    let mut metrics = RunMetrics::default();
    let mut records: Vec<TickRecord> = Vec::new();

    while controller.time() < scenario.duration {
        let reference = scenario.reference_at(controller.time());
        let record = controller.tick(reference)?;
        metrics.accumulate(&record);
        records.push(record);
    }

    let elapsed = start.elapsed();
    println!(
        "Done: {} ticks, elapsed={:.2}s",
        metrics.n_ticks,
        elapsed.as_secs_f64(),
    );
    println!(
        "Tracking: yaw RMSE {:.4} rad, lateral RMSE {:.4} m, max |steering| {:.4} rad, {:.1} solver iters/tick",
        metrics.rmse_yaw(),
        metrics.rmse_lateral(),
        metrics.max_control,
        metrics.mean_iterations(),
    );

    if let Some(path) = log_path {
        let log = RunLog {
            scenario_name: scenario.name.clone(),
            seed,
            dt,
            vehicle: scenario.vehicle.clone(),
            initial_state: scenario.initial_state,
            records,
        };
        save_run_log(&log, path)?;
        println!("Run log saved to {}", path.display());
    }

    if let Some(path) = output_path {
        let json = serde_json::json!({
            "scenario": scenario.name,
            "seed": seed,
            "elapsed_s": elapsed.as_secs_f64(),
            "metrics": metrics,
        });
        std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
        println!("Metrics saved to {}", path.display());
    }

    Ok(())
}

fn run_replay(input: &std::path::Path, output_path: Option<&std::path::Path>) -> Result<()> {
    let log = load_run_log(input)?;
    println!(
        "Replaying '{}' ({} ticks)...",
        log.scenario_name,
        log.records.len()
    );

    // Re-integrate the logged controls open loop, with the recorded vehicle.
    // Against a disturbed run the divergence measures the injected
    // disturbance; against an undisturbed run it must stay at
    // floating-point noise.
    let model = BicycleModel::new(log.vehicle.clone(), PacejkaTire::default());
    let mut plant = IntegratorPlant::new(model, log.dt);
    let mut state = state_from_array(&log.initial_state);
    let mut max_divergence = 0.0f64;

    for record in &log.records {
        state = plant.apply(&state, record.control);
        let replayed = state_to_array(&state);
        for i in 0..6 {
            max_divergence = max_divergence.max((replayed[i] - record.state[i]).abs());
        }
    }

    println!("Replay done: max state divergence {:.6}", max_divergence);

    if let Some(path) = output_path {
        let json = serde_json::json!({
            "scenario": log.scenario_name,
            "seed": log.seed,
            "ticks": log.records.len(),
            "max_divergence": max_divergence,
        });
        std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
    }

    Ok(())
}
