//! `sim` — Scenario simulator: plants, reference trajectories, run logs.

pub mod plant;
pub mod replay;
pub mod scenarios;
pub mod trajectory;

pub use plant::DisturbedPlant;
pub use replay::{load_run_log, save_run_log, RunLog};
pub use scenarios::{Scenario, ScenarioKind};
pub use trajectory::LaneChangeReference;
