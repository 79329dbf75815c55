use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{AgePoint, Inputs, PlanResult, format_currency, run_plan};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    monthly_expense: Option<f64>,
    inflation_rate: Option<f64>,
    pre_retirement_return: Option<f64>,
    post_retirement_return: Option<f64>,
    currency_symbol: Option<String>,
}

#[derive(Parser, Debug)]
#[command(
    name = "retire",
    about = "Retirement planner: inflation-adjusted corpus, required yearly investment and balance trajectories"
)]
struct Cli {
    #[arg(long, default_value_t = 30, help = "Current age (20-60)")]
    current_age: u32,
    #[arg(long, default_value_t = 60, help = "Retirement age (after current age, up to 80)")]
    retirement_age: u32,
    #[arg(
        long,
        default_value_t = 85,
        help = "Life expectancy (after retirement age, up to 100)"
    )]
    life_expectancy: u32,
    #[arg(
        long,
        default_value_t = 50_000.0,
        help = "Current monthly expenses (1000-1000000)"
    )]
    monthly_expense: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Expected annual inflation in percent (0-15)"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Annual return before retirement in percent (0-20)"
    )]
    pre_retirement_return: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Annual return after retirement in percent (0-20)"
    )]
    post_retirement_return: f64,
    #[arg(long, default_value = "₹")]
    currency_symbol: String,
    #[arg(long, help = "Print the plan as JSON instead of a text report")]
    json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    #[serde(flatten)]
    plan: PlanResult,
    future_monthly_expense_display: String,
    required_corpus_display: String,
    yearly_investment_display: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: &Cli) -> Result<Inputs, String> {
    if !(20..=60).contains(&cli.current_age) {
        return Err("--current-age must be between 20 and 60".to_string());
    }

    if cli.retirement_age <= cli.current_age {
        return Err("--retirement-age must be > --current-age".to_string());
    }

    if cli.retirement_age > 80 {
        return Err("--retirement-age must be <= 80".to_string());
    }

    if cli.life_expectancy <= cli.retirement_age {
        return Err("--life-expectancy must be > --retirement-age".to_string());
    }

    if cli.life_expectancy > 100 {
        return Err("--life-expectancy must be <= 100".to_string());
    }

    if !(1_000.0..=1_000_000.0).contains(&cli.monthly_expense) {
        return Err("--monthly-expense must be between 1000 and 1000000".to_string());
    }

    if !(0.0..=15.0).contains(&cli.inflation_rate) {
        return Err("--inflation-rate must be between 0 and 15".to_string());
    }

    for (name, rate) in [
        ("--pre-retirement-return", cli.pre_retirement_return),
        ("--post-retirement-return", cli.post_retirement_return),
    ] {
        if !(0.0..=20.0).contains(&rate) {
            return Err(format!("{name} must be between 0 and 20"));
        }
    }

    Ok(Inputs {
        current_age: cli.current_age,
        retirement_age: cli.retirement_age,
        life_expectancy: cli.life_expectancy,
        monthly_expense: cli.monthly_expense,
        inflation_rate: cli.inflation_rate / 100.0,
        pre_retirement_return: cli.pre_retirement_return / 100.0,
        post_retirement_return: cli.post_retirement_return / 100.0,
    })
}

/// Parses command-line flags, runs the plan and prints it to stdout.
pub fn run_cli() -> Result<(), String> {
    let cli = Cli::parse();
    let inputs = build_inputs(&cli)?;
    let plan = run_plan(&inputs).map_err(|e| e.to_string())?;

    if cli.json {
        let response = build_plan_response(plan, &cli.currency_symbol);
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| format!("Failed to serialize plan: {e}"))?;
        println!("{json}");
    } else {
        print!("{}", render_report(&plan, &cli.currency_symbol));
    }
    Ok(())
}

fn render_report(plan: &PlanResult, symbol: &str) -> String {
    let money = |amount: f64| format_currency(amount, symbol);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Summary");
    let _ = writeln!(
        out,
        "  Years to retirement:           {} years",
        plan.years_to_retirement
    );
    let _ = writeln!(
        out,
        "  Monthly expense at retirement: {}",
        money(plan.future_monthly_expense)
    );
    let _ = writeln!(
        out,
        "  Required retirement corpus:    {}",
        money(plan.required_corpus)
    );
    let _ = writeln!(
        out,
        "  Suggested annual investment:   {}",
        money(plan.yearly_investment)
    );
    if let Some(age) = plan.depletion_age {
        let _ = writeln!(out, "  WARNING: corpus runs out at age {age}");
    }

    render_trajectory(
        &mut out,
        "Corpus growth until retirement",
        &plan.accumulation,
        &money,
    );
    render_trajectory(
        &mut out,
        "Post-retirement corpus drawdown",
        &plan.drawdown,
        &money,
    );
    out
}

fn render_trajectory(
    out: &mut String,
    title: &str,
    points: &[AgePoint],
    money: &dyn Fn(f64) -> String,
) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    for point in points {
        let _ = writeln!(out, "  {:>3}  {:>20}", point.age, money(point.balance));
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/api/plan", get(plan_get_handler).post(plan_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("Retirement planner listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn plan_get_handler(Query(payload): Query<PlanPayload>) -> Response {
    plan_handler_impl(payload).await
}

async fn plan_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    plan_handler_impl(payload).await
}

async fn plan_handler_impl(payload: PlanPayload) -> Response {
    let (inputs, symbol) = match inputs_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            log::debug!("rejected plan request: {msg}");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match run_plan(&inputs) {
        Ok(plan) => json_response(StatusCode::OK, build_plan_response(plan, &symbol)),
        Err(e) => {
            log::warn!("plan failed for {inputs:?}: {e}");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
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
fn inputs_from_json(json: &str) -> Result<(Inputs, String), String> {
    let payload = serde_json::from_str::<PlanPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

fn inputs_from_payload(payload: PlanPayload) -> Result<(Inputs, String), String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        cli.life_expectancy = v;
    }
    if let Some(v) = payload.monthly_expense {
        cli.monthly_expense = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.pre_retirement_return {
        cli.pre_retirement_return = v;
    }
    if let Some(v) = payload.post_retirement_return {
        cli.post_retirement_return = v;
    }
    if let Some(v) = payload.currency_symbol {
        cli.currency_symbol = v;
    }

    let inputs = build_inputs(&cli)?;
    Ok((inputs, cli.currency_symbol))
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 30,
        retirement_age: 60,
        life_expectancy: 85,
        monthly_expense: 50_000.0,
        inflation_rate: 6.0,
        pre_retirement_return: 10.0,
        post_retirement_return: 7.0,
        currency_symbol: "₹".to_string(),
        json: false,
    }
}

fn build_plan_response(plan: PlanResult, symbol: &str) -> PlanResponse {
    PlanResponse {
        future_monthly_expense_display: format_currency(plan.future_monthly_expense, symbol),
        required_corpus_display: format_currency(plan.required_corpus, symbol),
        yearly_investment_display: format_currency(plan.yearly_investment, symbol),
        plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

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
    fn cli_defaults_match_api_defaults() {
        let parsed = Cli::try_parse_from(["retire"]).expect("defaults should parse");
        let defaults = default_cli_for_api();
        assert_eq!(parsed.current_age, defaults.current_age);
        assert_eq!(parsed.retirement_age, defaults.retirement_age);
        assert_eq!(parsed.life_expectancy, defaults.life_expectancy);
        assert_approx(parsed.monthly_expense, defaults.monthly_expense);
        assert_approx(parsed.inflation_rate, defaults.inflation_rate);
        assert_approx(parsed.pre_retirement_return, defaults.pre_retirement_return);
        assert_approx(parsed.post_retirement_return, defaults.post_retirement_return);
        assert_eq!(parsed.currency_symbol, defaults.currency_symbol);
        assert!(!parsed.json);
    }

    #[test]
    fn cli_parses_kebab_case_flags() {
        let parsed = Cli::try_parse_from([
            "retire",
            "--current-age",
            "35",
            "--retirement-age",
            "55",
            "--post-retirement-return",
            "5.5",
            "--json",
        ])
        .expect("flags should parse");
        assert_eq!(parsed.current_age, 35);
        assert_eq!(parsed.retirement_age, 55);
        assert_approx(parsed.post_retirement_return, 5.5);
        assert!(parsed.json);
    }

    #[test]
    fn build_inputs_converts_percent_to_fraction() {
        let inputs = build_inputs(&sample_cli()).expect("valid inputs");
        assert_approx(inputs.inflation_rate, 0.06);
        assert_approx(inputs.pre_retirement_return, 0.10);
        assert_approx(inputs.post_retirement_return, 0.07);
        assert_approx(inputs.monthly_expense, 50_000.0);
    }

    #[test]
    fn build_inputs_rejects_current_age_out_of_range() {
        let mut cli = sample_cli();
        cli.current_age = 19;
        let err = build_inputs(&cli).expect_err("must reject age below 20");
        assert!(err.contains("--current-age"));
    }

    #[test]
    fn build_inputs_rejects_retirement_not_after_current_age() {
        let mut cli = sample_cli();
        cli.retirement_age = cli.current_age;
        let err = build_inputs(&cli).expect_err("must reject equal ages");
        assert!(err.contains("--retirement-age must be > --current-age"));
    }

    #[test]
    fn build_inputs_rejects_life_expectancy_beyond_100() {
        let mut cli = sample_cli();
        cli.life_expectancy = 101;
        let err = build_inputs(&cli).expect_err("must reject life expectancy above 100");
        assert!(err.contains("--life-expectancy"));
    }

    #[test]
    fn build_inputs_rejects_out_of_range_rates_and_expense() {
        let mut cli = sample_cli();
        cli.post_retirement_return = 20.5;
        let err = build_inputs(&cli).expect_err("must reject high return");
        assert!(err.contains("--post-retirement-return"));

        let mut cli = sample_cli();
        cli.inflation_rate = f64::NAN;
        let err = build_inputs(&cli).expect_err("must reject NaN inflation");
        assert!(err.contains("--inflation-rate"));

        let mut cli = sample_cli();
        cli.monthly_expense = 999.0;
        let err = build_inputs(&cli).expect_err("must reject tiny expense");
        assert!(err.contains("--monthly-expense"));
    }

    #[test]
    fn build_inputs_accepts_zero_returns() {
        let mut cli = sample_cli();
        cli.pre_retirement_return = 0.0;
        cli.post_retirement_return = 0.0;
        let inputs = build_inputs(&cli).expect("zero returns are allowed");
        let plan = run_plan(&inputs).expect("zero returns are handled");
        assert!(plan.required_corpus.is_finite());
        assert!(plan.yearly_investment.is_finite());
    }

    #[test]
    fn inputs_from_json_parses_web_keys() {
        let json = r#"{
          "currentAge": 35,
          "retirementAge": 58,
          "lifeExpectancy": 90,
          "monthlyExpense": 80000,
          "inflationRate": 5,
          "preRetirementReturn": 12,
          "postRetirementReturn": 6.5,
          "currencySymbol": "$"
        }"#;
        let (inputs, symbol) = inputs_from_json(json).expect("json should parse");
        assert_eq!(inputs.current_age, 35);
        assert_eq!(inputs.retirement_age, 58);
        assert_eq!(inputs.life_expectancy, 90);
        assert_approx(inputs.monthly_expense, 80_000.0);
        assert_approx(inputs.inflation_rate, 0.05);
        assert_approx(inputs.pre_retirement_return, 0.12);
        assert_approx(inputs.post_retirement_return, 0.065);
        assert_eq!(symbol, "$");
    }

    #[test]
    fn inputs_from_json_fills_missing_keys_with_defaults() {
        let (inputs, symbol) =
            inputs_from_json(r#"{"retirementAge": 65}"#).expect("json should parse");
        assert_eq!(inputs.current_age, 30);
        assert_eq!(inputs.retirement_age, 65);
        assert_eq!(inputs.life_expectancy, 85);
        assert_eq!(symbol, "₹");
    }

    #[test]
    fn inputs_from_json_reports_range_errors() {
        let err = inputs_from_json(r#"{"currentAge": 50, "retirementAge": 45}"#)
            .expect_err("must reject retirement before current age");
        assert!(err.contains("--retirement-age"));

        let err = inputs_from_json(r#"{"currentAge": "thirty"}"#).expect_err("bad json type");
        assert!(err.starts_with("Invalid API JSON payload"));
    }

    #[test]
    fn plan_response_serialization_contains_expected_fields() {
        let inputs = build_inputs(&sample_cli()).expect("valid inputs");
        let plan = run_plan(&inputs).expect("valid plan");
        let response = build_plan_response(plan, "₹");
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"yearsToRetirement\":30"));
        assert!(json.contains("\"yearsPostRetirement\":25"));
        assert!(json.contains("\"requiredCorpus\""));
        assert!(json.contains("\"yearlyInvestment\""));
        assert!(json.contains("\"accumulation\""));
        assert!(json.contains("\"drawdown\""));
        assert!(json.contains("\"depletionAge\":null"));
        assert!(json.contains("\"futureMonthlyExpenseDisplay\":\"₹287,175\""));
        assert!(json.contains("\"requiredCorpusDisplay\""));
    }

    #[test]
    fn render_report_lists_summary_and_both_trajectories() {
        let inputs = build_inputs(&sample_cli()).expect("valid inputs");
        let plan = run_plan(&inputs).expect("valid plan");
        let report = render_report(&plan, "₹");
        assert!(report.contains("Years to retirement:           30 years"));
        assert!(report.contains("Monthly expense at retirement: ₹287,175"));
        assert!(report.contains("Required retirement corpus:"));
        assert!(report.contains("Suggested annual investment:"));
        assert!(report.contains("Corpus growth until retirement"));
        assert!(report.contains("Post-retirement corpus drawdown"));
        assert!(!report.contains("WARNING"));
        // 30 accumulation rows + 26 drawdown rows, each starting with an age.
        let rows = report
            .lines()
            .filter(|line| {
                line.trim_start()
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit())
            })
            .count();
        assert_eq!(rows, 56);
    }

    #[test]
    fn render_report_flags_depletion() {
        let plan = PlanResult {
            years_to_retirement: 1,
            years_post_retirement: 2,
            future_monthly_expense: 100.0,
            future_annual_expense: 1_200.0,
            required_corpus: 1_500.0,
            yearly_investment: 1_500.0,
            accumulation: vec![AgePoint {
                age: 61,
                balance: 1_500.0,
            }],
            drawdown: vec![
                AgePoint {
                    age: 61,
                    balance: 1_500.0,
                },
                AgePoint {
                    age: 62,
                    balance: 300.0,
                },
                AgePoint {
                    age: 63,
                    balance: -900.0,
                },
            ],
            depletion_age: Some(63),
        };
        let report = render_report(&plan, "$");
        assert!(report.contains("WARNING: corpus runs out at age 63"));
        assert!(report.contains("-$900"));
    }
}
