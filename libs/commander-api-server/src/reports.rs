use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde_json::Value;

use commander_api::{TimeRange, TimeScale};
use efd_reports::{BumpTestReport, BumpTestRequest};

use crate::AppState;
use crate::efd::{date, integer, required};
use crate::error::GatewayError;

// ═══════════════════════════════════════════════════════════════
//  POST /reports/m1m3-bump-tests
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct BumpTestsBody {
    #[serde(alias = "dataInstance")]
    efd_instance: Option<String>,
    #[serde(alias = "startDate")]
    start_date: Option<String>,
    #[serde(alias = "endDate")]
    end_date: Option<String>,
    #[serde(alias = "actuatorId")]
    actuator_id: Option<Value>,
}

pub(crate) async fn handle_m1m3_bump_tests(
    State(state): State<AppState>,
    body: Result<Json<BumpTestsBody>, JsonRejection>,
) -> Result<Json<BumpTestReport>, GatewayError> {
    let Json(body) = body?;
    let instance = required(body.efd_instance, "efd_instance")?;
    let start = required(body.start_date, "start_date")?;
    let end = required(body.end_date, "end_date")?;
    let actuator_id = u32::try_from(integer(body.actuator_id.as_ref(), "actuator_id")?)
        .map_err(|_| GatewayError::Validation("actuator_id is out of range".into()))?;

    // даты отчёта всегда UTC
    let range = TimeRange::new(date(&start, TimeScale::Utc)?, date(&end, TimeScale::Utc)?)
        .ok_or_else(|| GatewayError::Validation("end_date must not precede start_date".into()))?;

    let request = BumpTestRequest { instance, range, actuator_id };
    Ok(Json(state.reports.m1m3_bump_tests(&request).await?))
}
