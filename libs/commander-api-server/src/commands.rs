use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde_json::Value;

use command_dispatch::CommandRequest;
use commander_api::{CommandParams, ComponentKey};

use crate::AppState;
use crate::efd::{integer, required};
use crate::error::GatewayError;

/// Identity команд, у которых отправитель не указан.
pub const DEFAULT_IDENTITY: &str = "LOVE";

fn params_object(value: Option<Value>, name: &'static str) -> Result<CommandParams, GatewayError> {
    match required(value, name)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(CommandParams::new()),
        _ => Err(GatewayError::Validation(format!("{name} must be a JSON object"))),
    }
}

async fn execute(state: &AppState, request: CommandRequest) -> Result<Json<Value>, GatewayError> {
    let result = state.commands.dispatch(&request).await?;
    Ok(Json(serde_json::json!({ "ack": result })))
}

// ═══════════════════════════════════════════════════════════════
//  POST /cmd
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct CommandBody {
    #[serde(alias = "type")]
    csc: Option<String>,
    #[serde(alias = "index")]
    salindex: Option<Value>,
    #[serde(alias = "operation")]
    cmd: Option<String>,
    #[serde(alias = "parameters")]
    params: Option<Value>,
    identity: Option<String>,
}

pub(crate) async fn handle_cmd(
    State(state): State<AppState>,
    body: Result<Json<CommandBody>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(body) = body?;
    let csc = required(body.csc, "csc")?;
    let index = u32::try_from(integer(body.salindex.as_ref(), "salindex")?)
        .map_err(|_| GatewayError::Validation("salindex must not be negative".into()))?;
    let operation = required(body.cmd, "cmd")?;
    let params = params_object(body.params, "params")?;

    let request = CommandRequest {
        target: ComponentKey::new(csc, index),
        operation,
        params,
        identity: body.identity.unwrap_or_else(|| DEFAULT_IDENTITY.to_string()),
    };
    execute(&state, request).await
}

// ═══════════════════════════════════════════════════════════════
//  POST /tcs/aux, POST /tcs/main
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct TcsBody {
    command_name: Option<String>,
    params: Option<Value>,
}

async fn tcs_command(state: &AppState, system: &str, body: TcsBody) -> Result<Json<Value>, GatewayError> {
    let request = CommandRequest {
        target: ComponentKey::new(system, 0),
        operation: required(body.command_name, "command_name")?,
        params: params_object(body.params.or(Some(Value::Null)), "params")?,
        identity: DEFAULT_IDENTITY.to_string(),
    };
    execute(state, request).await
}

pub(crate) async fn handle_tcs_aux(
    State(state): State<AppState>,
    body: Result<Json<TcsBody>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(body) = body?;
    tcs_command(&state, "ATCS", body).await
}

pub(crate) async fn handle_tcs_main(
    State(state): State<AppState>,
    body: Result<Json<TcsBody>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(body) = body?;
    tcs_command(&state, "MTCS", body).await
}
