use tracing::{debug, info, warn};

use super::engine::simulate_horizon;
use super::types::{
    Adjustment, CalibrationIteration, CalibrationOutcome, CalibrationResult, EconomicParameters,
    SimulationError, StatutoryConstants,
};

/// Tuning knobs for the starting-capital search.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationConfig {
    pub max_iterations: u32,
    /// Terminal capital must end below this share of the peak.
    pub healthy_band: f64,
    pub decrease_factor: f64,
    pub increase_factor: f64,
    pub rounding_step: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            healthy_band: 0.75,
            decrease_factor: 0.98,
            increase_factor: 1.02,
            rounding_step: 10.0,
        }
    }
}

/// Searches for a starting capital whose trajectory rises and then draws
/// down, ending above where it started but below `healthy_band` of its peak.
///
/// Each rejected guess is scaled by one of two fixed factors and rounded to
/// `rounding_step`. The search stops at the first accepted guess, so the
/// result is acceptable rather than minimal. Running out of iterations is
/// reported as [`CalibrationOutcome::Exhausted`] together with the last trace.
pub fn calibrate(
    initial_guess: f64,
    params: &EconomicParameters,
    start_year: i32,
    end_year: i32,
    constants: &StatutoryConstants,
    config: CalibrationConfig,
) -> Result<CalibrationResult, SimulationError> {
    validate_config(initial_guess, config)?;
    validate_params(params)?;

    let mut guess = initial_guess;
    let mut iteration = 0u32;
    let mut evaluations = 0u32;
    let mut history = Vec::new();

    loop {
        let trace = simulate_horizon(guess, params, start_year, end_year, constants)?;
        evaluations += 1;

        let (first, last, peak) = match (
            trace.first_capital(),
            trace.terminal_capital(),
            trace.peak_capital(),
        ) {
            (Some(first), Some(last), Some(peak)) => (first, last, peak),
            _ => {
                return Err(SimulationError::InvalidHorizon {
                    start_year,
                    end_year,
                });
            }
        };
        debug!(iteration, guess, first, last, peak, "calibration step");

        let adjustment = if last < config.healthy_band * peak && last > first {
            Adjustment::Accept
        } else if iteration >= config.max_iterations {
            Adjustment::Stop
        } else if last >= config.healthy_band * peak {
            Adjustment::Decrease
        } else if last <= first {
            Adjustment::Increase
        } else {
            Adjustment::Stop
        };

        history.push(CalibrationIteration {
            iteration,
            guess,
            first_capital: first,
            terminal_capital: last,
            peak_capital: peak,
            adjustment,
        });

        let outcome = match adjustment {
            Adjustment::Decrease => {
                guess = round_to_step(guess * config.decrease_factor, config.rounding_step);
                iteration += 1;
                continue;
            }
            Adjustment::Increase => {
                guess = round_to_step(guess * config.increase_factor, config.rounding_step);
                iteration += 1;
                continue;
            }
            Adjustment::Accept => {
                info!(start_capital = guess, iteration, "calibration accepted");
                CalibrationOutcome::Accepted
            }
            Adjustment::Stop => {
                warn!(
                    start_capital = guess,
                    iteration,
                    max_iterations = config.max_iterations,
                    "no acceptable starting capital within iteration budget"
                );
                CalibrationOutcome::Exhausted
            }
        };

        return Ok(CalibrationResult {
            start_capital: guess,
            outcome,
            iterations: iteration,
            evaluations,
            history,
            trace,
        });
    }
}

fn round_to_step(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

fn validate_config(initial_guess: f64, config: CalibrationConfig) -> Result<(), SimulationError> {
    if !initial_guess.is_finite() || initial_guess <= 0.0 {
        return Err(invalid("initial_guess", "must be finite and > 0"));
    }
    if !config.healthy_band.is_finite() || config.healthy_band <= 0.0 {
        return Err(invalid("healthy_band", "must be finite and > 0"));
    }
    if !config.decrease_factor.is_finite()
        || config.decrease_factor <= 0.0
        || config.decrease_factor >= 1.0
    {
        return Err(invalid("decrease_factor", "must be between 0 and 1"));
    }
    if !config.increase_factor.is_finite() || config.increase_factor <= 1.0 {
        return Err(invalid("increase_factor", "must be finite and > 1"));
    }
    if !config.rounding_step.is_finite() || config.rounding_step <= 0.0 {
        return Err(invalid("rounding_step", "must be finite and > 0"));
    }
    Ok(())
}

fn validate_params(params: &EconomicParameters) -> Result<(), SimulationError> {
    for (name, value) in [
        ("target_monthly", params.target_monthly),
        ("inflation_pct", params.inflation_pct),
        ("growth_pct", params.growth_pct),
        ("tax_pct", params.tax_pct),
    ] {
        if !value.is_finite() {
            return Err(invalid(name, "must be finite"));
        }
    }
    Ok(())
}

fn invalid(name: &'static str, reason: &str) -> SimulationError {
    SimulationError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}
