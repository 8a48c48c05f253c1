use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    CalibrationConfig, CalibrationIteration, CalibrationOutcome, CalibrationResult,
    EconomicParameters, Scenario, ScenarioOutcome, SharedAssumptions, SimulationTrace,
    StatutoryConstants, calibrate, compare_scenarios, default_scenarios, simulate_horizon,
};

const MAX_HORIZON_YEARS: i64 = 200;
const MAX_ITERATIONS_LIMIT: u32 = 1_000;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    target_monthly: Option<f64>,
    start_year: Option<i32>,
    end_year: Option<i32>,
    inflation_rate: Option<f64>,
    growth_rate: Option<f64>,
    tax_rate: Option<f64>,

    start_capital: Option<f64>,
    initial_guess: Option<f64>,
    max_iterations: Option<u32>,

    reference_year: Option<i32>,
    min_gross_wage: Option<f64>,
    tax_free_allowance: Option<f64>,
    income_tax_base_factor: Option<f64>,
    employer_cost_factor: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioPayload {
    target_monthly: f64,
    start_year: i32,
    initial_guess: f64,
}

impl From<ScenarioPayload> for Scenario {
    fn from(value: ScenarioPayload) -> Self {
        Scenario {
            target_monthly: value.target_monthly,
            start_year: value.start_year,
            initial_guess: value.initial_guess,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    #[serde(flatten)]
    shared: SimulatePayload,
    scenarios: Option<Vec<ScenarioPayload>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Retirement drawdown projection with minimum-wage plus dividend payouts"
)]
struct Cli {
    #[arg(
        long,
        default_value_t = 2000.0,
        help = "Desired monthly post-tax income at reference-year prices"
    )]
    target_monthly: f64,
    #[arg(long, default_value_t = 2035, help = "First year of drawdown")]
    start_year: i32,
    #[arg(long, default_value_t = 2096, help = "Last simulated year")]
    end_year: i32,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Expected annual inflation in percent"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 9.0,
        help = "Expected annual investment growth in percent"
    )]
    growth_rate: f64,
    #[arg(long, default_value_t = 25.0, help = "Flat income tax rate in percent")]
    tax_rate: f64,
    #[arg(
        long,
        help = "Project this starting capital directly instead of calibrating one"
    )]
    start_capital: Option<f64>,
    #[arg(
        long,
        default_value_t = 360000.0,
        help = "Starting capital the calibration search begins from"
    )]
    initial_guess: f64,
    #[arg(long, default_value_t = 30, help = "Calibration adjustment budget")]
    max_iterations: u32,
    #[arg(
        long,
        default_value_t = false,
        help = "Calibrate the four built-in scenarios instead of a single one"
    )]
    compare: bool,
    #[arg(
        long,
        default_value_t = 2025,
        help = "Year whose prices the target income and statutory figures use"
    )]
    reference_year: i32,
    #[arg(
        long,
        default_value_t = 10632.0,
        help = "Statutory minimum yearly gross wage (reference-year prices)"
    )]
    min_gross_wage: f64,
    #[arg(
        long,
        default_value_t = 9312.0,
        help = "Yearly income tax free allowance"
    )]
    tax_free_allowance: f64,
    #[arg(
        long,
        default_value_t = 0.964,
        help = "Share of gross wage subject to income tax after payroll deductions"
    )]
    income_tax_base_factor: f64,
    #[arg(
        long,
        default_value_t = 1.338,
        help = "Employer cost of one unit of gross wage"
    )]
    employer_cost_factor: f64,
}

#[derive(Debug, Clone, Copy)]
struct Inputs {
    params: EconomicParameters,
    start_year: i32,
    end_year: i32,
    start_capital: Option<f64>,
    initial_guess: f64,
    constants: StatutoryConstants,
    calibration: CalibrationConfig,
}

impl Inputs {
    fn shared(&self) -> SharedAssumptions {
        SharedAssumptions {
            inflation_pct: self.params.inflation_pct,
            growth_pct: self.params.growth_pct,
            tax_pct: self.params.tax_pct,
            end_year: self.end_year,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TraceResponse {
    years: Vec<i32>,
    capital: Vec<f64>,
    net_monthly: Vec<f64>,
    monthly_expense: Vec<f64>,
    dividend: Vec<f64>,
    monthly_dividend: Vec<f64>,
    wage_expense: Vec<f64>,
    dividend_share_pct: Vec<f64>,
    depleted_year: Option<i32>,
}

impl From<&SimulationTrace> for TraceResponse {
    fn from(trace: &SimulationTrace) -> Self {
        TraceResponse {
            years: trace.years.clone(),
            capital: trace.capital.clone(),
            net_monthly: trace.net_monthly.clone(),
            monthly_expense: trace.monthly_expense.clone(),
            dividend: trace.dividend.clone(),
            monthly_dividend: trace.monthly_dividends(),
            wage_expense: trace.wage_expenses(),
            dividend_share_pct: trace.dividend_share_pct(),
            depleted_year: trace.first_depleted_year(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    start_capital: f64,
    reference_year: i32,
    trace: TraceResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalibrateResponse {
    start_capital: f64,
    outcome: CalibrationOutcome,
    warning: Option<String>,
    iterations: u32,
    evaluations: u32,
    history: Vec<CalibrationIteration>,
    trace: TraceResponse,
}

impl From<&CalibrationResult> for CalibrateResponse {
    fn from(result: &CalibrationResult) -> Self {
        CalibrateResponse {
            start_capital: result.start_capital,
            outcome: result.outcome,
            warning: exhaustion_warning(result),
            iterations: result.iterations,
            evaluations: result.evaluations,
            history: result.history.clone(),
            trace: (&result.trace).into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioResponse {
    target_monthly: f64,
    start_year: i32,
    initial_guess: f64,
    label: String,
    calibration: CalibrateResponse,
}

impl From<&ScenarioOutcome> for ScenarioResponse {
    fn from(outcome: &ScenarioOutcome) -> Self {
        ScenarioResponse {
            target_monthly: outcome.scenario.target_monthly,
            start_year: outcome.scenario.start_year,
            initial_guess: outcome.scenario.initial_guess,
            label: outcome.label.clone(),
            calibration: (&outcome.result).into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    shared: SharedAssumptions,
    scenarios: Vec<ScenarioResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn exhaustion_warning(result: &CalibrationResult) -> Option<String> {
    match result.outcome {
        CalibrationOutcome::Accepted => None,
        CalibrationOutcome::Exhausted => Some(format!(
            "No acceptable starting capital found within {} iterations; last tried {}",
            result.iterations, result.start_capital
        )),
    }
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    if cli.end_year < cli.start_year {
        return Err("--end-year must be >= --start-year".to_string());
    }

    if i64::from(cli.end_year) - i64::from(cli.start_year) > MAX_HORIZON_YEARS {
        return Err(format!(
            "--end-year must be within {MAX_HORIZON_YEARS} years of --start-year"
        ));
    }

    if cli.max_iterations > MAX_ITERATIONS_LIMIT {
        return Err(format!("--max-iterations must be <= {MAX_ITERATIONS_LIMIT}"));
    }

    if !cli.target_monthly.is_finite() || cli.target_monthly <= 0.0 {
        return Err("--target-monthly must be > 0".to_string());
    }

    if !cli.tax_rate.is_finite() || !(0.0..100.0).contains(&cli.tax_rate) {
        return Err("--tax-rate must be >= 0 and < 100".to_string());
    }

    for (name, rate) in [
        ("--inflation-rate", cli.inflation_rate),
        ("--growth-rate", cli.growth_rate),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(format!("{name} must be > -100"));
        }
    }

    if cli.start_capital.is_some_and(|capital| !capital.is_finite()) {
        return Err("--start-capital must be finite".to_string());
    }

    if !cli.initial_guess.is_finite() || cli.initial_guess <= 0.0 {
        return Err("--initial-guess must be > 0".to_string());
    }

    for (name, value) in [
        ("--min-gross-wage", cli.min_gross_wage),
        ("--tax-free-allowance", cli.tax_free_allowance),
        ("--income-tax-base-factor", cli.income_tax_base_factor),
        ("--employer-cost-factor", cli.employer_cost_factor),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    Ok(Inputs {
        params: EconomicParameters {
            target_monthly: cli.target_monthly,
            inflation_pct: cli.inflation_rate,
            growth_pct: cli.growth_rate,
            tax_pct: cli.tax_rate,
        },
        start_year: cli.start_year,
        end_year: cli.end_year,
        start_capital: cli.start_capital,
        initial_guess: cli.initial_guess,
        constants: StatutoryConstants {
            reference_year: cli.reference_year,
            min_gross_wage: cli.min_gross_wage,
            tax_free_allowance: cli.tax_free_allowance,
            income_tax_base_factor: cli.income_tax_base_factor,
            employer_cost_factor: cli.employer_cost_factor,
        },
        calibration: CalibrationConfig {
            max_iterations: cli.max_iterations,
            ..CalibrationConfig::default()
        },
    })
}

fn run_simulation(inputs: &Inputs, start_capital: f64) -> Result<SimulateResponse, String> {
    let trace = simulate_horizon(
        start_capital,
        &inputs.params,
        inputs.start_year,
        inputs.end_year,
        &inputs.constants,
    )
    .map_err(|e| e.to_string())?;
    Ok(SimulateResponse {
        start_capital,
        reference_year: inputs.constants.reference_year,
        trace: (&trace).into(),
    })
}

fn run_calibration(inputs: &Inputs) -> Result<CalibrateResponse, String> {
    let result = calibrate(
        inputs.initial_guess,
        &inputs.params,
        inputs.start_year,
        inputs.end_year,
        &inputs.constants,
        inputs.calibration,
    )
    .map_err(|e| e.to_string())?;
    Ok((&result).into())
}

fn run_comparison(inputs: &Inputs, scenarios: &[Scenario]) -> Result<CompareResponse, String> {
    let shared = inputs.shared();
    let outcomes = compare_scenarios(scenarios, shared, &inputs.constants, inputs.calibration)
        .map_err(|e| e.to_string())?;
    Ok(CompareResponse {
        shared,
        scenarios: outcomes.iter().map(ScenarioResponse::from).collect(),
    })
}

/// Parses command-line arguments and runs a projection, a calibration or the
/// built-in comparison. Returns the result as pretty-printed JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;
    let compare = cli.compare;
    let inputs = build_inputs(cli)?;

    let json = if compare {
        serde_json::to_string_pretty(&run_comparison(&inputs, &default_scenarios())?)
    } else if let Some(capital) = inputs.start_capital {
        serde_json::to_string_pretty(&run_simulation(&inputs, capital)?)
    } else {
        serde_json::to_string_pretty(&run_calibration(&inputs)?)
    };
    json.map_err(|e| format!("Failed to encode result: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/calibrate",
            get(calibrate_get_handler).post(calibrate_post_handler),
        )
        .route("/api/compare", post(compare_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "nestegg HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let start_capital = inputs.start_capital.unwrap_or(inputs.initial_guess);
    match run_simulation(&inputs, start_capital) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn calibrate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    calibrate_handler_impl(payload).await
}

async fn calibrate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    calibrate_handler_impl(payload).await
}

async fn calibrate_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match run_calibration(&inputs) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn compare_post_handler(Json(payload): Json<ComparePayload>) -> Response {
    let (inputs, scenarios) = match compare_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match run_comparison(&inputs, &scenarios) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

fn inputs_from_payload(payload: SimulatePayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.target_monthly {
        cli.target_monthly = v;
    }
    if let Some(v) = payload.start_year {
        cli.start_year = v;
    }
    if let Some(v) = payload.end_year {
        cli.end_year = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.growth_rate {
        cli.growth_rate = v;
    }
    if let Some(v) = payload.tax_rate {
        cli.tax_rate = v;
    }

    if let Some(v) = payload.start_capital {
        cli.start_capital = Some(v);
    }
    if let Some(v) = payload.initial_guess {
        cli.initial_guess = v;
    }
    if let Some(v) = payload.max_iterations {
        cli.max_iterations = v;
    }

    if let Some(v) = payload.reference_year {
        cli.reference_year = v;
    }
    if let Some(v) = payload.min_gross_wage {
        cli.min_gross_wage = v;
    }
    if let Some(v) = payload.tax_free_allowance {
        cli.tax_free_allowance = v;
    }
    if let Some(v) = payload.income_tax_base_factor {
        cli.income_tax_base_factor = v;
    }
    if let Some(v) = payload.employer_cost_factor {
        cli.employer_cost_factor = v;
    }

    build_inputs(cli)
}

fn compare_request_from_payload(
    payload: ComparePayload,
) -> Result<(Inputs, Vec<Scenario>), String> {
    let inputs = inputs_from_payload(payload.shared)?;
    let scenarios = match payload.scenarios {
        Some(list) => {
            if list.is_empty() {
                return Err("scenarios must not be empty".to_string());
            }
            list.into_iter().map(Scenario::from).collect()
        }
        None => default_scenarios(),
    };
    for (i, scenario) in scenarios.iter().enumerate() {
        if !scenario.target_monthly.is_finite() || scenario.target_monthly <= 0.0 {
            return Err(format!("scenarios[{i}].targetMonthly must be > 0"));
        }
        if !scenario.initial_guess.is_finite() || scenario.initial_guess <= 0.0 {
            return Err(format!("scenarios[{i}].initialGuess must be > 0"));
        }
        if scenario.start_year > inputs.end_year {
            return Err(format!("scenarios[{i}].startYear must be <= endYear"));
        }
        if i64::from(inputs.end_year) - i64::from(scenario.start_year) > MAX_HORIZON_YEARS {
            return Err(format!(
                "scenarios[{i}].startYear must be within {MAX_HORIZON_YEARS} years of endYear"
            ));
        }
    }
    Ok((inputs, scenarios))
}

fn default_cli_for_api() -> Cli {
    Cli {
        target_monthly: 2_000.0,
        start_year: 2035,
        end_year: 2096,
        inflation_rate: 3.0,
        growth_rate: 9.0,
        tax_rate: 25.0,
        start_capital: None,
        initial_guess: 360_000.0,
        max_iterations: 30,
        compare: false,
        reference_year: 2025,
        min_gross_wage: 10_632.0,
        tax_free_allowance: 9_312.0,
        income_tax_base_factor: 0.964,
        employer_cost_factor: 1.338,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn clap_defaults_match_api_defaults() {
        let parsed = Cli::parse_from(["nestegg"]);
        let api = default_cli_for_api();
        assert_approx(parsed.target_monthly, api.target_monthly);
        assert_eq!(parsed.start_year, api.start_year);
        assert_eq!(parsed.end_year, api.end_year);
        assert_approx(parsed.inflation_rate, api.inflation_rate);
        assert_approx(parsed.growth_rate, api.growth_rate);
        assert_approx(parsed.tax_rate, api.tax_rate);
        assert_approx(parsed.initial_guess, api.initial_guess);
        assert_eq!(parsed.max_iterations, api.max_iterations);
        assert_eq!(parsed.reference_year, api.reference_year);
        assert_approx(parsed.min_gross_wage, api.min_gross_wage);
        assert_approx(parsed.tax_free_allowance, api.tax_free_allowance);
        assert_approx(parsed.income_tax_base_factor, api.income_tax_base_factor);
        assert_approx(parsed.employer_cost_factor, api.employer_cost_factor);
        assert!(parsed.start_capital.is_none());
        assert!(!parsed.compare);
    }

    #[test]
    fn build_inputs_defaults_use_statutory_constants() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        assert_eq!(inputs.constants, StatutoryConstants::default());
        assert_eq!(inputs.calibration.max_iterations, 30);
        assert_approx(inputs.calibration.healthy_band, 0.75);
    }

    #[test]
    fn build_inputs_rejects_reversed_horizon() {
        let mut cli = sample_cli();
        cli.start_year = 2050;
        cli.end_year = 2049;

        let err = build_inputs(cli).expect_err("must reject reversed horizon");
        assert!(err.contains("--end-year"));
    }

    #[test]
    fn build_inputs_rejects_full_tax_rate() {
        let mut cli = sample_cli();
        cli.tax_rate = 100.0;

        let err = build_inputs(cli).expect_err("dividend solve divides by 1 - tax");
        assert!(err.contains("--tax-rate"));
    }

    #[test]
    fn build_inputs_rejects_non_finite_rates() {
        let mut cli = sample_cli();
        cli.growth_rate = f64::NAN;
        let err = build_inputs(cli).expect_err("must reject NaN growth");
        assert!(err.contains("--growth-rate"));

        let mut cli = sample_cli();
        cli.inflation_rate = -100.0;
        let err = build_inputs(cli).expect_err("must reject -100 inflation");
        assert!(err.contains("--inflation-rate"));
    }

    #[test]
    fn build_inputs_rejects_huge_iteration_budget() {
        let mut cli = sample_cli();
        cli.max_iterations = u32::MAX;
        let err = build_inputs(cli).expect_err("must reject oversized budget");
        assert!(err.contains("--max-iterations"));

        let mut cli = sample_cli();
        cli.max_iterations = MAX_ITERATIONS_LIMIT;
        assert!(build_inputs(cli).is_ok());

        let err = inputs_from_json(r#"{"maxIterations": 4294967295}"#)
            .expect_err("must reject oversized budget from JSON");
        assert!(err.contains("--max-iterations"));
    }

    #[test]
    fn build_inputs_rejects_horizon_beyond_ceiling() {
        let mut cli = sample_cli();
        cli.start_year = i32::MIN;
        cli.end_year = i32::MAX;
        let err = build_inputs(cli).expect_err("must reject full i32 range");
        assert!(err.contains("within 200 years"));

        let mut cli = sample_cli();
        cli.start_year = 0;
        cli.end_year = 2_000_000_000;
        let err = build_inputs(cli).expect_err("must reject very long horizon");
        assert!(err.contains("--end-year"));

        let mut cli = sample_cli();
        cli.start_year = 2000;
        cli.end_year = 2200;
        assert!(build_inputs(cli).is_ok());
    }

    #[test]
    fn build_inputs_rejects_non_positive_guess() {
        let mut cli = sample_cli();
        cli.initial_guess = 0.0;
        let err = build_inputs(cli).expect_err("must reject zero guess");
        assert!(err.contains("--initial-guess"));
    }

    #[test]
    fn inputs_from_json_parses_web_keys() {
        let json = r#"{
          "targetMonthly": 3000,
          "startYear": 2040,
          "endYear": 2090,
          "inflationRate": 2.5,
          "growthRate": 7,
          "taxRate": 22,
          "startCapital": 450000,
          "initialGuess": 400000,
          "maxIterations": 12,
          "referenceYear": 2024,
          "minGrossWage": 9840,
          "taxFreeAllowance": 7848
        }"#;
        let inputs = inputs_from_json(json).expect("json should parse");

        assert_approx(inputs.params.target_monthly, 3_000.0);
        assert_eq!(inputs.start_year, 2040);
        assert_eq!(inputs.end_year, 2090);
        assert_approx(inputs.params.inflation_pct, 2.5);
        assert_approx(inputs.params.growth_pct, 7.0);
        assert_approx(inputs.params.tax_pct, 22.0);
        assert_eq!(inputs.start_capital, Some(450_000.0));
        assert_approx(inputs.initial_guess, 400_000.0);
        assert_eq!(inputs.calibration.max_iterations, 12);
        assert_eq!(inputs.constants.reference_year, 2024);
        assert_approx(inputs.constants.min_gross_wage, 9_840.0);
        assert_approx(inputs.constants.tax_free_allowance, 7_848.0);
        assert_approx(inputs.constants.income_tax_base_factor, 0.964);
        assert_approx(inputs.constants.employer_cost_factor, 1.338);
    }

    #[test]
    fn inputs_from_json_reports_validation_errors() {
        let err = inputs_from_json(r#"{"startYear": 2100}"#).expect_err("start after end");
        assert!(err.contains("--end-year"));

        let err = inputs_from_json(r#"{"taxRate": "high"}"#).expect_err("bad type");
        assert!(err.starts_with("Invalid API JSON payload"));
    }

    #[test]
    fn simulate_response_has_aligned_series() {
        let mut cli = sample_cli();
        cli.start_year = 2035;
        cli.end_year = 2044;
        let inputs = build_inputs(cli).expect("valid inputs");

        let response = run_simulation(&inputs, 500_000.0).expect("valid horizon");
        assert_eq!(response.trace.years.len(), 10);
        assert_eq!(response.trace.capital.len(), 10);
        assert_eq!(response.trace.wage_expense.len(), 10);
        assert_eq!(response.trace.dividend_share_pct.len(), 10);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"startCapital\""));
        assert!(json.contains("\"netMonthly\""));
        assert!(json.contains("\"monthlyExpense\""));
        assert!(json.contains("\"wageExpense\""));
        assert!(json.contains("\"depletedYear\""));
    }

    #[test]
    fn exhausted_calibration_carries_warning() {
        let mut cli = sample_cli();
        cli.max_iterations = 0;
        let inputs = build_inputs(cli).expect("valid inputs");

        let response = run_calibration(&inputs).expect("valid inputs");
        assert_eq!(response.outcome, CalibrationOutcome::Exhausted);
        assert_eq!(response.evaluations, 1);
        assert!(response.warning.is_some());

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"outcome\":\"exhausted\""));
        assert!(json.contains("\"history\""));
        assert!(json.contains("\"adjustment\":\"stop\""));
    }

    #[test]
    fn compare_payload_defaults_to_built_in_scenarios() {
        let payload: ComparePayload =
            serde_json::from_str(r#"{"growthRate": 8}"#).expect("json should parse");
        let (inputs, scenarios) = compare_request_from_payload(payload).expect("valid request");
        assert_approx(inputs.params.growth_pct, 8.0);
        assert_eq!(scenarios, default_scenarios());
    }

    #[test]
    fn compare_payload_parses_custom_scenarios() {
        let json = r#"{
          "endYear": 2080,
          "scenarios": [
            {"targetMonthly": 1500, "startYear": 2030, "initialGuess": 250000},
            {"targetMonthly": 2500, "startYear": 2045, "initialGuess": 420000}
          ]
        }"#;
        let payload: ComparePayload = serde_json::from_str(json).expect("json should parse");
        let (inputs, scenarios) = compare_request_from_payload(payload).expect("valid request");

        assert_eq!(inputs.end_year, 2080);
        assert_eq!(scenarios.len(), 2);
        assert_approx(scenarios[1].target_monthly, 2_500.0);
        assert_eq!(scenarios[1].start_year, 2045);

        let response = run_comparison(&inputs, &scenarios).expect("valid scenarios");
        assert_eq!(response.scenarios.len(), 2);
        assert_eq!(response.scenarios[0].calibration.trace.years.len(), 51);
        assert_eq!(response.scenarios[1].calibration.trace.years.len(), 36);
    }

    #[test]
    fn compare_payload_rejects_scenario_after_end_year() {
        let json = r#"{
          "endYear": 2050,
          "scenarios": [{"targetMonthly": 1500, "startYear": 2060, "initialGuess": 250000}]
        }"#;
        let payload: ComparePayload = serde_json::from_str(json).expect("json should parse");
        let err = compare_request_from_payload(payload).expect_err("must reject");
        assert!(err.contains("scenarios[0].startYear"));
    }

    #[test]
    fn compare_payload_rejects_scenario_far_before_end_year() {
        let json = r#"{
          "endYear": 2096,
          "scenarios": [{"targetMonthly": 1500, "startYear": -2147483648, "initialGuess": 250000}]
        }"#;
        let payload: ComparePayload = serde_json::from_str(json).expect("json should parse");
        let err = compare_request_from_payload(payload).expect_err("must reject");
        assert!(err.contains("scenarios[0].startYear must be within 200 years"));
    }

    #[test]
    fn run_cli_returns_parse_errors_instead_of_exiting() {
        let err = run_cli(["nestegg", "--bogus-flag"]).expect_err("unknown flag");
        assert!(err.contains("--bogus-flag"));

        let err = run_cli(["nestegg", "--max-iterations", "many"]).expect_err("bad value");
        assert!(err.contains("--max-iterations"));
    }

    #[test]
    fn run_cli_projects_given_start_capital() {
        let json = run_cli([
            "nestegg",
            "--start-capital",
            "800000",
            "--start-year",
            "2035",
            "--end-year",
            "2040",
        ])
        .expect("valid arguments");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["startCapital"], serde_json::json!(800000.0));
        assert_eq!(
            value["trace"]["years"],
            serde_json::json!([2035, 2036, 2037, 2038, 2039, 2040])
        );
    }

    #[test]
    fn run_cli_reports_invalid_horizon() {
        let err = run_cli(["nestegg", "--start-year", "2050", "--end-year", "2040"])
            .expect_err("must reject");
        assert!(err.contains("--end-year"));
    }
}
