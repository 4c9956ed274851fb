use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use command_dispatch::DispatchError;
use component_catalog::CatalogError;
use efd_reports::ReportError;
use query_fanout::FanoutError;

/// Ответ, когда registry не смог подключиться к data instance.
pub const EFD_UNAVAILABLE: &str = "EFD client could not establish connection";

/// Ошибка HTTP-слоя. Тело ответа всегда `{"ack": <сообщение>}`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("Some of the required parameters is not present: {0}")]
    MissingParameter(&'static str),

    #[error("{0}")]
    DependencyUnavailable(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("{0}")]
    AckTimeout(String),

    #[error("{0}")]
    Upstream(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_)
            | GatewayError::MissingParameter(_)
            | GatewayError::DependencyUnavailable(_)
            | GatewayError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            GatewayError::AckTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<DispatchError> for GatewayError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::ChannelUnavailable(_) => GatewayError::DependencyUnavailable(e.to_string()),
            DispatchError::InvalidOperation { .. } | DispatchError::InvalidParameters { .. } => {
                GatewayError::InvalidOperation(e.to_string())
            }
            DispatchError::AckTimeout { .. } => GatewayError::AckTimeout(e.to_string()),
            DispatchError::Upstream { .. } => GatewayError::Upstream(e.to_string()),
        }
    }
}

impl From<FanoutError> for GatewayError {
    fn from(e: FanoutError) -> Self {
        match e {
            FanoutError::Unavailable(_) => GatewayError::DependencyUnavailable(EFD_UNAVAILABLE.to_string()),
            FanoutError::Resample(e) => GatewayError::Validation(e.to_string()),
            FanoutError::Upstream { .. } => GatewayError::Upstream(e.to_string()),
        }
    }
}

impl From<CatalogError> for GatewayError {
    fn from(e: CatalogError) -> Self {
        GatewayError::DependencyUnavailable(e.to_string())
    }
}

impl From<ReportError> for GatewayError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::Unavailable(_) => GatewayError::DependencyUnavailable(EFD_UNAVAILABLE.to_string()),
            ReportError::UnknownActuator(_) | ReportError::NoDashboard(_) => GatewayError::Validation(e.to_string()),
            ReportError::Upstream { .. } => GatewayError::Upstream(e.to_string()),
        }
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::Validation(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }
        (status, Json(serde_json::json!({ "ack": self.to_string() }))).into_response()
    }
}
