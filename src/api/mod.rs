mod args;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use chrono::NaiveDate;

use crate::core::{
    AccrualMode, Budget, BudgetCategory, BudgetRecord, BudgetReport, CapitalGainsResult,
    EngineError, FilingStatus, IncomeSummary, NetWorth, NetWorthRecord, NetWorthSummary,
    PeriodActivity, ProjectionResult, PtoRow, PtoSettings, SavingsRow, TaxSettings, TaxYearConfig,
    Trade, TradeBook, amortize, net_capital_gains, plan_time_off, project_savings, run_projection,
    summarize_income,
};

pub use args::{
    Cli, CliFilingStatus, Command, ProjectionArgs, ServeArgs, TaxArgs, build_income,
    build_projection,
};
use args::{default_projection_args, default_tax_args};

type SharedConfig = Arc<TaxYearConfig>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiFilingStatus {
    Single,
    #[serde(alias = "marriedJoint", alias = "married-joint", alias = "married_joint")]
    Married,
}

impl From<ApiFilingStatus> for CliFilingStatus {
    fn from(value: ApiFilingStatus) -> Self {
        match value {
            ApiFilingStatus::Single => CliFilingStatus::Single,
            ApiFilingStatus::Married => CliFilingStatus::Married,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectionPayload {
    current_age: Option<u32>,
    target_age: Option<u32>,
    salary: Option<f64>,
    annual_raise: Option<f64>,
    tenure_years: Option<u32>,
    simulations: Option<u32>,
    seed: Option<u64>,
    start_year: Option<i32>,
    grow_first_period: Option<bool>,

    deferred_balance: Option<f64>,
    deferred_personal_rate: Option<f64>,
    deferred_employer_rate: Option<f64>,
    deferred_return: Option<f64>,
    deferred_variance: Option<f64>,

    advantaged_balance: Option<f64>,
    advantaged_rate: Option<f64>,
    advantaged_return: Option<f64>,
    advantaged_variance: Option<f64>,

    equity_balance: Option<f64>,
    equity_grant_rate: Option<f64>,
    equity_vesting_years: Option<u32>,
    equity_return: Option<f64>,
    equity_variance: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IncomeTaxPayload {
    gross_income: Option<f64>,
    retirement_contribution: Option<f64>,
    roth_401k: Option<bool>,
    ira_contribution: Option<f64>,
    roth_ira: Option<bool>,
    filing_status: Option<ApiFilingStatus>,
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapitalGainsPayload {
    #[serde(default)]
    trades: Vec<Trade>,
    #[serde(default = "default_filing_status")]
    filing_status: FilingStatus,
    #[serde(default = "default_region")]
    region: String,
    #[serde(default)]
    taxable_income: f64,
    #[serde(default)]
    surtax_applies: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BudgetPayload {
    /// Takes precedence over `income` when both are given.
    net_income: Option<f64>,
    income: Option<IncomeTaxPayload>,
    categories: Vec<BudgetCategory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MortgagePayload {
    principal: Option<f64>,
    annual_rate_percent: Option<f64>,
    term_years: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SavingsPayload {
    starting_income: Option<f64>,
    annual_raise_percent: Option<f64>,
    savings_rate_percent: Option<f64>,
    years: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NetWorthPayload {
    /// Omitted means the starter sheet with every account at zero.
    accounts: Option<Vec<NetWorthRecord>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PtoPayload {
    pto_days_per_year: Option<f64>,
    pay_frequency_days: Option<u32>,
    most_recent_pay_date: Option<NaiveDate>,
    accrual: Option<AccrualMode>,
    current_pto_balance: Option<f64>,
    comp_time: Option<bool>,
    current_comp_balance: Option<f64>,
    holiday_banking: Option<bool>,
    current_holiday_balance: Option<f64>,
    periods: Option<u32>,
    activity: Vec<PeriodActivity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    tax_year: u16,
    current_age: u32,
    target_age: u32,
    #[serde(flatten)]
    result: ProjectionResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CapitalGainsResponse {
    trades: Vec<Trade>,
    #[serde(flatten)]
    result: CapitalGainsResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BudgetResponse {
    income: Option<IncomeSummary>,
    report: BudgetReport,
    records: Vec<BudgetRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SavingsResponse {
    total_saved: f64,
    rows: Vec<SavingsRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetWorthResponse {
    records: Vec<NetWorthRecord>,
    #[serde(flatten)]
    summary: NetWorthSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PtoResponse {
    periods_per_year: u32,
    rows: Vec<PtoRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn default_filing_status() -> FilingStatus {
    FilingStatus::Single
}

fn default_region() -> String {
    "MI".to_string()
}

pub fn router(config: TaxYearConfig) -> Router {
    let state: SharedConfig = Arc::new(config);
    Router::new()
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .route("/api/income-tax", post(income_tax_handler))
        .route("/api/capital-gains", post(capital_gains_handler))
        .route("/api/budget", post(budget_handler))
        .route("/api/mortgage", post(mortgage_handler))
        .route("/api/savings", post(savings_handler))
        .route("/api/net-worth", post(net_worth_handler))
        .route("/api/pto", post(pto_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, config: TaxYearConfig) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let tax_year = config.tax_year;
    let app = router(config);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, tax_year, "nestegg HTTP API listening");
    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn projection_get_handler(
    State(config): State<SharedConfig>,
    Query(payload): Query<ProjectionPayload>,
) -> Response {
    projection_handler_impl(config, payload).await
}

async fn projection_post_handler(
    State(config): State<SharedConfig>,
    Json(payload): Json<ProjectionPayload>,
) -> Response {
    projection_handler_impl(config, payload).await
}

async fn projection_handler_impl(config: SharedConfig, payload: ProjectionPayload) -> Response {
    let args = projection_args_from_payload(payload);
    let projection = match build_projection(&args, &config) {
        Ok(projection) => projection,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    info!(
        simulations = projection.simulations,
        horizon_years = projection.horizon_years,
        "projection requested"
    );

    let joined = tokio::task::spawn_blocking(move || run_projection(&projection)).await;
    match joined {
        Ok(Ok(result)) => json_response(
            StatusCode::OK,
            ProjectionResponse {
                tax_year: config.tax_year,
                current_age: args.current_age,
                target_age: args.target_age,
                result,
            },
        ),
        Ok(Err(e)) => engine_error_response(&e),
        Err(e) => {
            warn!(error = %e, "projection task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "projection task failed")
        }
    }
}

async fn income_tax_handler(
    State(config): State<SharedConfig>,
    Json(payload): Json<IncomeTaxPayload>,
) -> Response {
    match income_summary_from_payload(payload, &config) {
        Ok(summary) => {
            info!(
                gross_income = summary.gross_income,
                total_tax = summary.total_tax,
                "income tax computed"
            );
            json_response(StatusCode::OK, summary)
        }
        Err(resp) => resp,
    }
}

async fn capital_gains_handler(
    State(config): State<SharedConfig>,
    Json(payload): Json<CapitalGainsPayload>,
) -> Response {
    let book = match TradeBook::from_trades(payload.trades) {
        Ok(book) => book,
        Err(e) => return engine_error_response(&e),
    };
    let settings = TaxSettings {
        filing_status: payload.filing_status,
        region: payload.region,
        taxable_income: payload.taxable_income,
        surtax_applies: payload.surtax_applies,
    };

    match net_capital_gains(book.trades(), &settings, &config) {
        Ok(result) => {
            info!(
                trades = book.len(),
                total_tax = result.tax.total_tax,
                "capital gains netted"
            );
            json_response(
                StatusCode::OK,
                CapitalGainsResponse {
                    trades: book.trades().to_vec(),
                    result,
                },
            )
        }
        Err(e) => engine_error_response(&e),
    }
}

async fn budget_handler(
    State(config): State<SharedConfig>,
    Json(payload): Json<BudgetPayload>,
) -> Response {
    let budget = match Budget::new(payload.categories) {
        Ok(budget) => budget,
        Err(e) => return engine_error_response(&e),
    };

    let (net_income, income) = match (payload.net_income, payload.income) {
        (Some(net), _) => (net, None),
        (None, Some(income)) => match income_summary_from_payload(income, &config) {
            Ok(summary) => (summary.net_income, Some(summary)),
            Err(resp) => return resp,
        },
        (None, None) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "budget requires netIncome or an income section",
            );
        }
    };

    match budget.evaluate(net_income) {
        Ok(report) => {
            info!(
                net_income,
                health_score = report.health_score,
                "budget evaluated"
            );
            json_response(
                StatusCode::OK,
                BudgetResponse {
                    income,
                    report,
                    records: budget.records(),
                },
            )
        }
        Err(e) => engine_error_response(&e),
    }
}

async fn mortgage_handler(Json(payload): Json<MortgagePayload>) -> Response {
    let principal = payload.principal.unwrap_or(300_000.0);
    let rate = payload.annual_rate_percent.unwrap_or(4.5);
    let term = payload.term_years.unwrap_or(30);

    match amortize(principal, rate, term) {
        Ok(loan) => {
            info!(
                principal,
                monthly_payment = loan.monthly_payment,
                "mortgage amortized"
            );
            json_response(StatusCode::OK, loan)
        }
        Err(e) => engine_error_response(&e),
    }
}

async fn savings_handler(Json(payload): Json<SavingsPayload>) -> Response {
    let rows = match project_savings(
        payload.starting_income.unwrap_or(50_000.0),
        payload.annual_raise_percent.unwrap_or(3.0),
        payload.savings_rate_percent.unwrap_or(10.0),
        payload.years.unwrap_or(30),
    ) {
        Ok(rows) => rows,
        Err(e) => return engine_error_response(&e),
    };
    let total_saved = rows.last().map_or(0.0, |r| r.cumulative_savings);
    info!(months = rows.len(), total_saved, "savings projected");
    json_response(StatusCode::OK, SavingsResponse { total_saved, rows })
}

async fn net_worth_handler(Json(payload): Json<NetWorthPayload>) -> Response {
    let sheet = match payload.accounts {
        Some(records) => match NetWorth::from_records(&records) {
            Ok(sheet) => sheet,
            Err(e) => return engine_error_response(&e),
        },
        None => NetWorth::starter(),
    };
    let summary = sheet.summary();
    info!(net_worth = summary.net_worth, "net worth summarized");
    json_response(
        StatusCode::OK,
        NetWorthResponse {
            records: sheet.records(),
            summary,
        },
    )
}

async fn pto_handler(Json(payload): Json<PtoPayload>) -> Response {
    let settings = PtoSettings {
        pto_days_per_year: payload.pto_days_per_year.unwrap_or(0.0),
        pay_frequency_days: payload.pay_frequency_days.unwrap_or(14),
        most_recent_pay_date: payload
            .most_recent_pay_date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        accrual: payload.accrual.unwrap_or_default(),
        current_pto_balance: payload.current_pto_balance.unwrap_or(0.0),
        comp_time: payload.comp_time.unwrap_or(false),
        current_comp_balance: payload.current_comp_balance.unwrap_or(0.0),
        holiday_banking: payload.holiday_banking.unwrap_or(false),
        current_holiday_balance: payload.current_holiday_balance.unwrap_or(0.0),
    };
    let periods = payload.periods.unwrap_or(10);

    match plan_time_off(&settings, &payload.activity, periods) {
        Ok(rows) => {
            info!(periods, "time off planned");
            json_response(
                StatusCode::OK,
                PtoResponse {
                    periods_per_year: settings.periods_per_year(),
                    rows,
                },
            )
        }
        Err(e) => engine_error_response(&e),
    }
}

fn projection_args_from_payload(payload: ProjectionPayload) -> ProjectionArgs {
    let mut args = default_projection_args();

    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.target_age {
        args.target_age = v;
    }
    if let Some(v) = payload.salary {
        args.salary = v;
    }
    if let Some(v) = payload.annual_raise {
        args.annual_raise = v;
    }
    if let Some(v) = payload.tenure_years {
        args.tenure_years = v;
    }
    if let Some(v) = payload.simulations {
        args.simulations = v;
    }
    if let Some(v) = payload.seed {
        args.seed = v;
    }
    if let Some(v) = payload.start_year {
        args.start_year = v;
    }
    if let Some(v) = payload.grow_first_period {
        args.grow_first_period = v;
    }
    if let Some(v) = payload.deferred_balance {
        args.deferred_balance = v;
    }
    if let Some(v) = payload.deferred_personal_rate {
        args.deferred_personal_rate = v;
    }
    if let Some(v) = payload.deferred_employer_rate {
        args.deferred_employer_rate = v;
    }
    if let Some(v) = payload.deferred_return {
        args.deferred_return = v;
    }
    if let Some(v) = payload.deferred_variance {
        args.deferred_variance = v;
    }
    if let Some(v) = payload.advantaged_balance {
        args.advantaged_balance = v;
    }
    if let Some(v) = payload.advantaged_rate {
        args.advantaged_rate = v;
    }
    if let Some(v) = payload.advantaged_return {
        args.advantaged_return = v;
    }
    if let Some(v) = payload.advantaged_variance {
        args.advantaged_variance = v;
    }
    if let Some(v) = payload.equity_balance {
        args.equity_balance = v;
    }
    if let Some(v) = payload.equity_grant_rate {
        args.equity_grant_rate = v;
    }
    if let Some(v) = payload.equity_vesting_years {
        args.equity_vesting_years = v;
    }
    if let Some(v) = payload.equity_return {
        args.equity_return = v;
    }
    if let Some(v) = payload.equity_variance {
        args.equity_variance = v;
    }

    args
}

fn tax_args_from_payload(payload: IncomeTaxPayload) -> TaxArgs {
    let mut args = default_tax_args();

    if let Some(v) = payload.gross_income {
        args.gross_income = v;
    }
    if let Some(v) = payload.retirement_contribution {
        args.retirement_contribution = v;
    }
    if let Some(v) = payload.roth_401k {
        args.roth_401k = v;
    }
    if let Some(v) = payload.ira_contribution {
        args.ira_contribution = v;
    }
    if let Some(v) = payload.roth_ira {
        args.roth_ira = v;
    }
    if let Some(v) = payload.filing_status {
        args.filing_status = v.into();
    }
    if let Some(v) = payload.region {
        args.region = v;
    }

    args
}

fn income_summary_from_payload(
    payload: IncomeTaxPayload,
    config: &TaxYearConfig,
) -> Result<IncomeSummary, Response> {
    let input = build_income(&tax_args_from_payload(payload))
        .map_err(|msg| error_response(StatusCode::BAD_REQUEST, &msg))?;
    summarize_income(&input, config).map_err(|e| engine_error_response(&e))
}

fn status_for(e: &EngineError) -> StatusCode {
    match e {
        EngineError::InvalidInput(_) | EngineError::TooLarge { .. } | EngineError::Config(_) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::ConfigurationMissing(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn engine_error_response(e: &EngineError) -> Response {
    let status = status_for(e);
    warn!(%status, error = %e, "request rejected");
    error_response(status, &e.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
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
