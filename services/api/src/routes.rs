use crate::infra::{
    deserialize_optional_date, load_dataset, utc_today, AppState, RangeSelection,
};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use lending_lens::error::AppError;
use lending_lens::lending::{
    commit_thresholds, performance, DashboardView, DateRange, DecisionMode, DisplayMode,
    FundedCohort, LendingDashboard, MonthlyPerformance, MonthlyStatView, OverallSummary,
    ThresholdMatrixView, Thresholds,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub(crate) const COMMIT_KEY_HEADER: &str = "x-commit-key";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ReportMode {
    #[default]
    Historical,
    Simulation,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReportRequest {
    #[serde(default)]
    pub(crate) mode: ReportMode,
    #[serde(default)]
    pub(crate) default_threshold: Option<f64>,
    #[serde(default)]
    pub(crate) refusal_threshold: Option<f64>,
    #[serde(flatten)]
    pub(crate) range: RangeSelection,
    #[serde(default)]
    pub(crate) csv: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReportResponse {
    pub(crate) mode: ReportMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) thresholds: Option<Thresholds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) range: Option<DateRange>,
    pub(crate) overall: OverallSummary,
    pub(crate) refusal_rate: f64,
    pub(crate) monthly: Vec<MonthlyStatView>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SweepRequest {
    #[serde(default)]
    pub(crate) step: Option<f64>,
    #[serde(flatten)]
    pub(crate) range: RangeSelection,
    #[serde(default)]
    pub(crate) csv: Option<String>,
    /// `[row, column]` of a cell to carry into a simulation.
    #[serde(default)]
    pub(crate) select: Option<(usize, usize)>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SweepResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) range: Option<DateRange>,
    pub(crate) matrix: ThresholdMatrixView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) selection: Option<CellSelection>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CellSelection {
    pub(crate) row: usize,
    pub(crate) column: usize,
    pub(crate) thresholds: Thresholds,
    pub(crate) overall: OverallSummary,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThresholdUpdate {
    pub(crate) default_threshold: f64,
    pub(crate) refusal_threshold: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ThresholdsResponse {
    pub(crate) thresholds: Thresholds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) committed_at: Option<DateTime<Utc>>,
    pub(crate) commits_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PerformanceRequest {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
    pub(crate) cohorts: Vec<FundedCohort>,
}

pub(crate) fn lending_routes() -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/lending/report",
            axum::routing::post(report_endpoint),
        )
        .route("/api/v1/lending/sweep", axum::routing::post(sweep_endpoint))
        .route(
            "/api/v1/lending/thresholds",
            axum::routing::get(thresholds_endpoint).put(commit_thresholds_endpoint),
        )
        .route(
            "/api/v1/lending/performance",
            axum::routing::post(performance_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn validated_threshold(name: &str, value: f64) -> Result<f64, AppError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(AppError::InvalidRequest(format!(
            "{name} must lie within [0, 1], got {value}"
        )))
    }
}

pub(crate) async fn report_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, AppError> {
    let ReportRequest {
        mode,
        default_threshold,
        refusal_threshold,
        range,
        csv,
    } = payload;

    let active = state.lending.active_thresholds()?;
    let thresholds = Thresholds {
        default_threshold: match default_threshold {
            Some(value) => validated_threshold("default_threshold", value)?,
            None => active.default_threshold,
        },
        refusal_threshold: match refusal_threshold {
            Some(value) => validated_threshold("refusal_threshold", value)?,
            None => active.refusal_threshold,
        },
    };

    let range = range.resolve(utc_today())?;
    let records = load_dataset(&state.lending, csv, range).await?;

    let mut dashboard = LendingDashboard::new(records).with_thresholds(thresholds);
    dashboard.set_range(range);
    let (decision_mode, thresholds) = match mode {
        ReportMode::Historical => (DecisionMode::Historical, None),
        ReportMode::Simulation => (DecisionMode::Simulation(thresholds), Some(thresholds)),
    };
    let report = dashboard.report(decision_mode);

    Ok(Json(ReportResponse {
        mode,
        thresholds,
        range,
        overall: report.overall,
        refusal_rate: report.overall.refusal_rate(),
        monthly: report.monthly_views(),
    }))
}

pub(crate) async fn sweep_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<SweepRequest>,
) -> Result<Json<SweepResponse>, AppError> {
    let SweepRequest {
        step,
        range,
        csv,
        select,
    } = payload;

    let range = range.resolve(utc_today())?;
    let records = load_dataset(&state.lending, csv, range).await?;

    let mut dashboard = LendingDashboard::new(records);
    dashboard.set_range(range);
    if let Some(step) = step {
        dashboard.set_step(step)?;
    }
    dashboard.set_mode(DisplayMode::ThresholdGrid);
    let matrix = dashboard.matrix().view();

    let selection = match select {
        Some((row, column)) => {
            let thresholds = dashboard.select_cell(row, column)?;
            let overall = match dashboard.view() {
                DashboardView::Simulation { report, .. } => report.overall,
                _ => OverallSummary::default(),
            };
            Some(CellSelection {
                row,
                column,
                thresholds,
                overall,
            })
        }
        None => None,
    };

    Ok(Json(SweepResponse {
        range,
        matrix,
        selection,
    }))
}

pub(crate) async fn thresholds_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<ThresholdsResponse>, AppError> {
    let committed = state.lending.repository.current()?;
    Ok(Json(ThresholdsResponse {
        thresholds: committed
            .map(|record| record.thresholds)
            .unwrap_or(state.lending.defaults),
        committed_at: committed.map(|record| record.committed_at),
        commits_enabled: state.lending.authority.is_enabled(),
    }))
}

pub(crate) async fn commit_thresholds_endpoint(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(update): Json<ThresholdUpdate>,
) -> Result<Json<ThresholdsResponse>, AppError> {
    let presented = headers
        .get(COMMIT_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let thresholds = Thresholds {
        default_threshold: validated_threshold("default_threshold", update.default_threshold)?,
        refusal_threshold: validated_threshold("refusal_threshold", update.refusal_threshold)?,
    };

    let committed = commit_thresholds(
        &state.lending.authority,
        state.lending.repository.as_ref(),
        presented,
        thresholds,
    )?;

    Ok(Json(ThresholdsResponse {
        thresholds: committed.thresholds,
        committed_at: Some(committed.committed_at),
        commits_enabled: true,
    }))
}

pub(crate) async fn performance_endpoint(
    Json(payload): Json<PerformanceRequest>,
) -> Json<Vec<MonthlyPerformance>> {
    let today = payload.today.unwrap_or_else(utc_today);
    Json(performance::summarize(&payload.cohorts, today))
}
