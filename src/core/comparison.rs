use serde::Serialize;
use tracing::info;

use super::solver::{CalibrationConfig, calibrate};
use super::types::{CalibrationResult, EconomicParameters, SimulationError, StatutoryConstants};

/// Assumptions held fixed across every scenario in a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedAssumptions {
    pub inflation_pct: f64,
    pub growth_pct: f64,
    pub tax_pct: f64,
    pub end_year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub target_monthly: f64,
    pub start_year: i32,
    pub initial_guess: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    /// Resolved starting capital, whole units with thousands separators.
    pub label: String,
    pub result: CalibrationResult,
}

/// Two income levels retiring in 2035 and 2040.
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            target_monthly: 2_000.0,
            start_year: 2035,
            initial_guess: 360_000.0,
        },
        Scenario {
            target_monthly: 3_000.0,
            start_year: 2035,
            initial_guess: 400_000.0,
        },
        Scenario {
            target_monthly: 2_000.0,
            start_year: 2040,
            initial_guess: 400_000.0,
        },
        Scenario {
            target_monthly: 3_000.0,
            start_year: 2040,
            initial_guess: 400_000.0,
        },
    ]
}

/// Calibrates each scenario independently, preserving input order.
pub fn compare_scenarios(
    scenarios: &[Scenario],
    shared: SharedAssumptions,
    constants: &StatutoryConstants,
    config: CalibrationConfig,
) -> Result<Vec<ScenarioOutcome>, SimulationError> {
    let mut outcomes = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let params = EconomicParameters {
            target_monthly: scenario.target_monthly,
            inflation_pct: shared.inflation_pct,
            growth_pct: shared.growth_pct,
            tax_pct: shared.tax_pct,
        };
        let result = calibrate(
            scenario.initial_guess,
            &params,
            scenario.start_year,
            shared.end_year,
            constants,
            config,
        )?;
        info!(
            target_monthly = scenario.target_monthly,
            start_year = scenario.start_year,
            start_capital = result.start_capital,
            outcome = ?result.outcome,
            "scenario calibrated"
        );
        outcomes.push(ScenarioOutcome {
            scenario: *scenario,
            label: group_thousands(result.start_capital.round() as i64),
            result,
        });
    }
    Ok(outcomes)
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
