//! Run logs: serialize/deserialize controller runs for offline analysis & replay.

use nmpc_core::TickRecord;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use vehicle_models::VehicleParams;

/// A full recorded controller run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunLog {
    pub scenario_name: String,
    pub seed: u64,
    pub dt: f64,
    /// Vehicle the run was recorded with; replay must re-integrate with the
    /// same model, not whatever the defaults happen to be
    pub vehicle: VehicleParams,
    /// State before the first tick
    pub initial_state: [f64; 6],
    /// One record per controller tick, in chronological order
    pub records: Vec<TickRecord>,
}

/// Save a run log to a JSON file.
pub fn save_run_log(log: &RunLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a run log from a JSON file.
pub fn load_run_log(path: &Path) -> anyhow::Result<RunLog> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let log: RunLog = serde_json::from_reader(reader)?;
    Ok(log)
}
