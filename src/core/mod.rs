mod comparison;
mod engine;
mod solver;
mod types;

pub use comparison::{
    Scenario, ScenarioOutcome, SharedAssumptions, compare_scenarios, default_scenarios,
};
pub use engine::{simulate_horizon, year_step};
pub use solver::{CalibrationConfig, calibrate};
pub use types::{
    Adjustment, CalibrationIteration, CalibrationOutcome, CalibrationResult, EconomicParameters,
    SimulationError, SimulationTrace, StatutoryConstants, YearResult,
};
