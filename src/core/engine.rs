use super::types::{
    EconomicParameters, SimulationError, SimulationTrace, StatutoryConstants, YearResult,
};

const MAX_PREALLOCATED_YEARS: usize = 512;

/// Advances the pool by one year of payouts and growth.
///
/// The wage is pinned to the statutory minimum and the rest of the target is
/// paid as a dividend. The dividend is the closed-form solution of
/// `min_net + dividend * (1 - tax) = target_yearly`, so the returned net
/// income always equals the inflated target. Negative capital is carried
/// through unchanged.
pub fn year_step(
    year: i32,
    capital: f64,
    params: &EconomicParameters,
    constants: &StatutoryConstants,
) -> YearResult {
    let price_index = price_index(year, params.inflation_pct, constants.reference_year);
    let tax = params.tax_pct / 100.0;

    let adj_monthly = params.target_monthly * price_index;
    let adj_yearly = adj_monthly * 12.0;

    let min_gross = constants.min_gross_wage * price_index;
    let min_net = statutory_min_net(min_gross, tax, constants);

    let dividend = (adj_yearly - min_net) / (1.0 - tax);
    let monthly_cost = (dividend + constants.employer_cost_factor * min_gross) / 12.0;

    let next_capital = (capital - 12.0 * monthly_cost) * (1.0 + params.growth_pct / 100.0);

    YearResult {
        next_capital,
        net_monthly: adj_monthly,
        monthly_cost,
        dividend,
    }
}

/// Runs [`year_step`] for every year in `start_year..=end_year`, threading the
/// closing capital of each year into the next.
pub fn simulate_horizon(
    start_capital: f64,
    params: &EconomicParameters,
    start_year: i32,
    end_year: i32,
    constants: &StatutoryConstants,
) -> Result<SimulationTrace, SimulationError> {
    if end_year < start_year {
        return Err(SimulationError::InvalidHorizon {
            start_year,
            end_year,
        });
    }

    let span = i64::from(end_year) - i64::from(start_year) + 1;
    let capacity = usize::try_from(span).map_or(MAX_PREALLOCATED_YEARS, |n| {
        n.min(MAX_PREALLOCATED_YEARS)
    });
    let mut trace = SimulationTrace::with_capacity(capacity);
    let mut capital = start_capital;
    for year in start_year..=end_year {
        let step = year_step(year, capital, params, constants);
        capital = step.next_capital;
        trace.push(year, step);
    }
    Ok(trace)
}

fn price_index(year: i32, inflation_pct: f64, reference_year: i32) -> f64 {
    (1.0 + inflation_pct / 100.0).powi(year.saturating_sub(reference_year))
}

// Income tax applies to the wage after pension and unemployment deductions,
// less the tax-free allowance. The allowance is not indexed.
fn statutory_min_net(min_gross: f64, tax: f64, constants: &StatutoryConstants) -> f64 {
    min_gross - (constants.income_tax_base_factor * min_gross - constants.tax_free_allowance) * tax
}
