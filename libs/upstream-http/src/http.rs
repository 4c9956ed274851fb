use serde::de::DeserializeOwned;

use commander_api::ClientError;

// ═══════════════════════════════════════════════════════════════
//  HTTP helpers
// ═══════════════════════════════════════════════════════════════

/// Ошибка отправки запроса: недоступный endpoint → `Connect`, остальное → `Io`.
pub(crate) fn send_error(url: &str, e: reqwest::Error) -> ClientError {
    if e.is_connect() || e.is_timeout() {
        ClientError::connect(format!("{url}: {e}"))
    } else {
        ClientError::io(format!("{url}: HTTP request failed: {e}"))
    }
}

/// Проверить статус ответа и вернуть его, иначе `Rejected` с телом.
pub(crate) async fn check_status(url: &str, resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::rejected(format!("{url}: HTTP {status}: {body}")))
}

/// GET и разбор JSON-ответа.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, ClientError> {
    let resp = http.get(url).query(query).send().await.map_err(|e| send_error(url, e))?;
    let resp = check_status(url, resp).await?;
    let body = resp
        .text()
        .await
        .map_err(|e| ClientError::io(format!("{url}: read response body: {e}")))?;
    serde_json::from_str(&body).map_err(|e| ClientError::format_err(format!("{url}: parse JSON: {e}")))
}

/// Достать значение по пути `a.b.0.c` из JSON.
pub(crate) fn lookup<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    if let Some(direct) = value.get(path) {
        return Some(direct);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            other => other.get(segment)?,
        };
    }
    Some(current)
}

/// Числовое значение поля; всё нечисловое → `NaN`.
pub(crate) fn as_number(value: Option<&serde_json::Value>) -> f64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(serde_json::Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}
