use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;

use commander_api::{SortOrder, TimeRange, TimeScale, parse_datetime};
use query_fanout::{FanoutResult, QueryMode, Resample, SourceTree};

use crate::AppState;
use crate::error::GatewayError;

/// Верхняя граница `num` для `/efd/top_timeseries`.
pub const MAX_TOP_N: usize = 100_000;

// ═══════════════════════════════════════════════════════════════
//  Field helpers
// ═══════════════════════════════════════════════════════════════

pub(crate) fn required<T>(value: Option<T>, name: &'static str) -> Result<T, GatewayError> {
    value.ok_or(GatewayError::MissingParameter(name))
}

/// Целое из числа или строки (`10` и `"10"`).
pub(crate) fn integer(value: Option<&Value>, name: &'static str) -> Result<i64, GatewayError> {
    let value = match value {
        None | Some(Value::Null) => return Err(GatewayError::MissingParameter(name)),
        Some(v) => v,
    };
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| GatewayError::Validation(format!("{name} must be a 64-bit integer, got {value}")))
}

fn source_tree(value: Option<Value>) -> Result<SourceTree, GatewayError> {
    let value = required(value, "cscs")?;
    serde_json::from_value(value).map_err(|e| GatewayError::Validation(format!("invalid cscs: {e}")))
}

pub(crate) fn date(value: &str, scale: TimeScale) -> Result<chrono::DateTime<Utc>, GatewayError> {
    parse_datetime(value, scale).map_err(|e| GatewayError::Validation(e.message().to_string()))
}

// ═══════════════════════════════════════════════════════════════
//  POST /efd/timeseries
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct TimeseriesBody {
    #[serde(alias = "dataInstance")]
    efd_instance: Option<String>,
    #[serde(alias = "startDate")]
    start_date: Option<String>,
    /// Ширина окна в минутах, окно центрировано на `start_date`.
    #[serde(alias = "timeWindow")]
    time_window: Option<Value>,
    #[serde(alias = "sources")]
    cscs: Option<Value>,
    resample: Option<String>,
    #[serde(default)]
    scale: TimeScale,
}

pub(crate) async fn handle_timeseries(
    State(state): State<AppState>,
    body: Result<Json<TimeseriesBody>, JsonRejection>,
) -> Result<Json<FanoutResult>, GatewayError> {
    let Json(body) = body?;
    let instance = required(body.efd_instance, "efd_instance")?;
    let start = required(body.start_date, "start_date")?;
    let window = integer(body.time_window.as_ref(), "time_window")?;
    let tree = source_tree(body.cscs)?;
    let resample: Resample = required(body.resample, "resample")?
        .parse()
        .map_err(|e: query_fanout::ResampleError| GatewayError::Validation(e.to_string()))?;

    let out_of_range = || GatewayError::Validation(format!("time_window {window} is out of range"));
    let width = TimeDelta::try_minutes(window).ok_or_else(out_of_range)?;
    let range = TimeRange::centered(date(&start, body.scale)?, width).ok_or_else(out_of_range)?;
    let mode = QueryMode::Window { range, resample };
    Ok(Json(state.queries.run(&instance, &tree, &mode).await?))
}

// ═══════════════════════════════════════════════════════════════
//  POST /efd/top_timeseries
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct TopTimeseriesBody {
    #[serde(alias = "dataInstance")]
    efd_instance: Option<String>,
    #[serde(alias = "sources")]
    cscs: Option<Value>,
    #[serde(alias = "topN")]
    num: Option<Value>,
    #[serde(alias = "timeCut")]
    time_cut: Option<String>,
    #[serde(default)]
    scale: TimeScale,
}

pub(crate) async fn handle_top_timeseries(
    State(state): State<AppState>,
    body: Result<Json<TopTimeseriesBody>, JsonRejection>,
) -> Result<Json<FanoutResult>, GatewayError> {
    let Json(body) = body?;
    let instance = required(body.efd_instance, "efd_instance")?;
    let tree = source_tree(body.cscs)?;
    let num = match body.num {
        None | Some(Value::Null) => 1,
        Some(ref v) => usize::try_from(integer(Some(v), "num")?)
            .ok()
            .filter(|n| *n <= MAX_TOP_N)
            .ok_or_else(|| GatewayError::Validation(format!("num must be between 0 and {MAX_TOP_N}")))?,
    };
    let time_cut = body.time_cut.as_deref().map(|t| date(t, body.scale)).transpose()?;

    let mode = QueryMode::TopN { num, time_cut };
    Ok(Json(state.queries.run(&instance, &tree, &mode).await?))
}

// ═══════════════════════════════════════════════════════════════
//  POST /efd/logmessages
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct LogMessagesBody {
    #[serde(alias = "dataInstance")]
    efd_instance: Option<String>,
    #[serde(alias = "startDate")]
    start_date: Option<String>,
    #[serde(alias = "endDate")]
    end_date: Option<String>,
    #[serde(alias = "sources")]
    cscs: Option<Value>,
    #[serde(default)]
    scale: TimeScale,
    #[serde(default)]
    order: SortOrder,
}

pub(crate) async fn handle_log_messages(
    State(state): State<AppState>,
    body: Result<Json<LogMessagesBody>, JsonRejection>,
) -> Result<Json<FanoutResult>, GatewayError> {
    let Json(body) = body?;
    let instance = required(body.efd_instance, "efd_instance")?;
    let start = required(body.start_date, "start_date")?;
    let end = required(body.end_date, "end_date")?;
    let tree = source_tree(body.cscs)?;

    let range = TimeRange::new(date(&start, body.scale)?, date(&end, body.scale)?)
        .ok_or_else(|| GatewayError::Validation("end_date must not precede start_date".into()))?;
    let mode = QueryMode::Logs { range, cap: state.log_cap, order: body.order };
    Ok(Json(state.queries.run(&instance, &tree, &mode).await?))
}

// ═══════════════════════════════════════════════════════════════
//  GET /efd/efd_clients, GET /heartbeat
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_efd_clients(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    let instances = state
        .queries
        .list_instances()
        .await
        .map_err(|e| GatewayError::DependencyUnavailable(e.to_string()))?;
    Ok(Json(serde_json::json!({ "instances": instances })))
}

pub(crate) async fn handle_heartbeat() -> Json<Value> {
    let timestamp = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
    Json(serde_json::json!({ "timestamp": timestamp }))
}
