use serde::Serialize;
use thiserror::Error;

/// Fixed statutory values for the wage side of the payout.
///
/// Monetary amounts are yearly and expressed at `reference_year` prices.
/// Defaults are the 2025 Estonian figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatutoryConstants {
    pub reference_year: i32,
    pub min_gross_wage: f64,
    pub tax_free_allowance: f64,
    /// Share of gross wage left after pension and unemployment contributions.
    pub income_tax_base_factor: f64,
    /// Gross wage plus employer social tax and unemployment insurance.
    pub employer_cost_factor: f64,
}

impl Default for StatutoryConstants {
    fn default() -> Self {
        Self {
            reference_year: 2025,
            min_gross_wage: 10_632.0,
            tax_free_allowance: 9_312.0,
            income_tax_base_factor: 0.964,
            employer_cost_factor: 1.338,
        }
    }
}

/// Macro assumptions for one run. Rates are percentages (`3.0` means 3%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicParameters {
    pub target_monthly: f64,
    pub inflation_pct: f64,
    pub growth_pct: f64,
    pub tax_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearResult {
    pub next_capital: f64,
    pub net_monthly: f64,
    pub monthly_cost: f64,
    pub dividend: f64,
}

/// Five aligned series over the simulated horizon.
///
/// `capital[i]` is the pool at the end of `years[i]`, after that year's
/// payout and growth.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationTrace {
    pub capital: Vec<f64>,
    pub net_monthly: Vec<f64>,
    pub monthly_expense: Vec<f64>,
    pub dividend: Vec<f64>,
    pub years: Vec<i32>,
}

impl SimulationTrace {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            capital: Vec::with_capacity(n),
            net_monthly: Vec::with_capacity(n),
            monthly_expense: Vec::with_capacity(n),
            dividend: Vec::with_capacity(n),
            years: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, year: i32, step: YearResult) {
        self.capital.push(step.next_capital);
        self.net_monthly.push(step.net_monthly);
        self.monthly_expense.push(step.monthly_cost);
        self.dividend.push(step.dividend);
        self.years.push(year);
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn first_capital(&self) -> Option<f64> {
        self.capital.first().copied()
    }

    pub fn terminal_capital(&self) -> Option<f64> {
        self.capital.last().copied()
    }

    pub fn peak_capital(&self) -> Option<f64> {
        self.capital.iter().copied().reduce(f64::max)
    }

    /// First year that closes with the pool below zero.
    pub fn first_depleted_year(&self) -> Option<i32> {
        self.capital
            .iter()
            .zip(&self.years)
            .find(|(capital, _)| **capital < 0.0)
            .map(|(_, year)| *year)
    }

    pub fn monthly_dividends(&self) -> Vec<f64> {
        self.dividend.iter().map(|d| d / 12.0).collect()
    }

    /// Employer-side wage cost per month: total expense minus the dividend part.
    pub fn wage_expenses(&self) -> Vec<f64> {
        self.monthly_expense
            .iter()
            .zip(&self.dividend)
            .map(|(expense, dividend)| expense - dividend / 12.0)
            .collect()
    }

    pub fn dividend_share_pct(&self) -> Vec<f64> {
        self.monthly_expense
            .iter()
            .zip(&self.dividend)
            .map(|(expense, dividend)| {
                if *expense == 0.0 {
                    0.0
                } else {
                    (dividend / 12.0) * 100.0 / expense
                }
            })
            .collect()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationOutcome {
    Accepted,
    Exhausted,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Adjustment {
    Accept,
    Decrease,
    Increase,
    Stop,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationIteration {
    pub iteration: u32,
    pub guess: f64,
    pub first_capital: f64,
    pub terminal_capital: f64,
    pub peak_capital: f64,
    pub adjustment: Adjustment,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationResult {
    pub start_capital: f64,
    pub outcome: CalibrationOutcome,
    pub iterations: u32,
    pub evaluations: u32,
    pub history: Vec<CalibrationIteration>,
    pub trace: SimulationTrace,
}

impl CalibrationResult {
    pub fn is_accepted(&self) -> bool {
        self.outcome == CalibrationOutcome::Accepted
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid horizon: end year {end_year} is before start year {start_year}")]
    InvalidHorizon { start_year: i32, end_year: i32 },
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
