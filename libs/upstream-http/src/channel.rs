use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;

use commander_api::{
    AckProgress, AckStage, BoxFuture, ClientError, CommandChannel, CommandParams, ComponentKey,
    Connector, Operation, OperationTable,
};

use crate::http::{check_status, fetch_json, send_error};

/// Описание команды, которое middleware отдаёт для компонента.
#[derive(Debug, Deserialize)]
struct CommandSpec {
    name: String,
    #[serde(default)]
    parameters: Option<Vec<String>>,
}

/// Одна строка потока подтверждений.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct AckLine {
    ack: AckStage,
    #[serde(default)]
    result: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Ack stream decoding
// ═══════════════════════════════════════════════════════════════

/// Собирает NDJSON-строки из произвольно нарезанных chunk'ов.
#[derive(Default)]
struct AckDecoder {
    buf: Vec<u8>,
}

impl AckDecoder {
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<AckLine>, ClientError> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(ack) = parse_line(&line)? {
                lines.push(ack);
            }
        }
        Ok(lines)
    }

    /// Хвост без завершающего перевода строки.
    fn finish(&mut self) -> Result<Option<AckLine>, ClientError> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<AckLine>, ClientError> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(trimmed)
        .map(Some)
        .map_err(|e| ClientError::format_err(format!("malformed ack line: {e}")))
}

/// Обработать подтверждение: `Some` если оно финальное.
fn apply(progress: &AckProgress, line: AckLine) -> Option<Result<String, ClientError>> {
    progress.record(line.ack);
    match line.ack {
        AckStage::Complete => Some(Ok(line.result.unwrap_or_else(|| "Done".to_string()))),
        stage if stage.is_failure() => {
            let detail = line.result.unwrap_or_default();
            Some(Err(ClientError::rejected(format!("{stage}: {detail}"))))
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════
//  MiddlewareOperation
// ═══════════════════════════════════════════════════════════════

/// Команда компонента, исполняемая через middleware.
///
/// `POST {url}` с `{identity, params}`; ответ: поток строк
/// `{ack, result}` до финальной стадии.
pub struct MiddlewareOperation {
    http: reqwest::Client,
    url: String,
    parameters: Option<Vec<String>>,
}

impl MiddlewareOperation {
    pub fn new(http: reqwest::Client, url: impl Into<String>, parameters: Option<Vec<String>>) -> Self {
        Self { http, url: url.into(), parameters }
    }
}

impl Operation for MiddlewareOperation {
    fn parameters(&self) -> Option<&[String]> {
        self.parameters.as_deref()
    }

    fn issue<'a>(
        &'a self,
        identity: &'a str,
        params: &'a CommandParams,
        progress: &'a AckProgress,
    ) -> BoxFuture<'a, Result<String, ClientError>> {
        Box::pin(async move {
            let body = serde_json::json!({ "identity": identity, "params": params });
            let resp = self
                .http
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| send_error(&self.url, e))?;
            let resp = check_status(&self.url, resp).await?;

            let mut decoder = AckDecoder::default();
            let mut chunks = resp.bytes_stream();
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk.map_err(|e| ClientError::io(format!("{}: ack stream: {e}", self.url)))?;
                for line in decoder.push(&chunk)? {
                    if let Some(done) = apply(progress, line) {
                        return done;
                    }
                }
            }
            if let Some(line) = decoder.finish()? {
                if let Some(done) = apply(progress, line) {
                    return done;
                }
            }
            Err(ClientError::io(format!(
                "{}: ack stream ended at {}",
                self.url,
                progress.last()
            )))
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MiddlewareChannel / connector
// ═══════════════════════════════════════════════════════════════

/// Командный канал одного компонента. Таблица операций фиксируется
/// при подключении.
pub struct MiddlewareChannel {
    key: ComponentKey,
    ops: OperationTable,
}

impl CommandChannel for MiddlewareChannel {
    fn key(&self) -> &ComponentKey {
        &self.key
    }

    fn operations(&self) -> &OperationTable {
        &self.ops
    }
}

/// Строит командные каналы через middleware:
/// `GET {url}/components/{name}/{index}/commands` → `[{name, parameters}]`.
pub struct HttpChannelConnector {
    http: reqwest::Client,
    base_url: String,
}

impl HttpChannelConnector {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn commands_url(&self, key: &ComponentKey) -> String {
        format!("{}/components/{}/{}/commands", self.base_url, key.name, key.index)
    }
}

impl Connector for HttpChannelConnector {
    type Key = ComponentKey;
    type Handle = Arc<dyn CommandChannel>;

    fn connect<'a>(&'a self, key: &'a ComponentKey) -> BoxFuture<'a, Result<Self::Handle, ClientError>> {
        Box::pin(async move {
            let url = self.commands_url(key);
            let specs: Vec<CommandSpec> = fetch_json(&self.http, &url, &[]).await?;

            let mut ops = OperationTable::new();
            for spec in specs {
                let op_url = format!("{url}/{}", spec.name);
                ops.register(
                    spec.name,
                    Arc::new(MiddlewareOperation::new(self.http.clone(), op_url, spec.parameters)),
                );
            }
            tracing::debug!(component = %key, operations = ops.len(), "command channel established");
            Ok(Arc::new(MiddlewareChannel { key: key.clone(), ops }) as Self::Handle)
        })
    }
}
