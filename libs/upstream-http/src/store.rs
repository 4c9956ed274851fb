use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use commander_api::{
    BoxFuture, ClientError, Connector, FieldFrame, LogRow, Sample, SeriesQuery, TimeSeriesStore,
    TopNQuery, TopicRef,
};

use crate::http::{as_number, fetch_json, lookup};

/// Поле со временем приёма в строках логов.
const RECEIVE_STAMP_FIELD: &str = "private_rcvStamp";

/// Одна запись topic'а в ответе REST API data instance.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicRecord {
    pub ts_ms: i64,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl TopicRecord {
    fn ts(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts_ms)
    }

    fn field(&self, path: &str) -> Option<&serde_json::Value> {
        lookup(&self.value, path)
    }
}

/// Разложить записи по полям. Записи без валидного времени пропускаются.
fn frame_from_records(records: &[TopicRecord], fields: &[String]) -> FieldFrame {
    let mut frame: FieldFrame = fields.iter().map(|f| (f.clone(), Vec::with_capacity(records.len()))).collect();
    for record in records {
        let Some(ts) = record.ts() else { continue };
        for (field, samples) in frame.iter_mut() {
            samples.push(Sample::new(ts, as_number(record.field(field))));
        }
    }
    frame
}

fn row_from_record(record: &TopicRecord, fields: &[String]) -> Option<LogRow> {
    let ts = record.ts()?;
    let mut row = serde_json::Map::new();
    for field in fields {
        let value = match record.field(field) {
            Some(v) => v.clone(),
            None if field == RECEIVE_STAMP_FIELD => serde_json::json!(record.ts_ms as f64 / 1000.0),
            None => serde_json::Value::Null,
        };
        row.insert(field.clone(), value);
    }
    Some(LogRow { ts, fields: row })
}

// ═══════════════════════════════════════════════════════════════
//  HttpStore
// ═══════════════════════════════════════════════════════════════

/// Клиент одного data instance поверх topic REST API.
///
/// `GET {url}/api/topics/{component}.{topic}?key={index}&from=&to=&limit=&order=`
/// возвращает `[{ts_ms, key, value}]`.
pub struct HttpStore {
    http: reqwest::Client,
    name: String,
    base_url: String,
}

impl HttpStore {
    pub fn new(http: reqwest::Client, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn topic_url(&self, topic: &TopicRef) -> String {
        format!("{}/api/topics/{}.{}", self.base_url, topic.component, topic.topic)
    }

    async fn records(&self, topic: &TopicRef, query: &[(&str, String)]) -> Result<Vec<TopicRecord>, ClientError> {
        let url = self.topic_url(topic);
        let mut params = vec![("key", topic.index.to_string())];
        params.extend_from_slice(query);
        tracing::debug!(instance = %self.name, url = %url, "store query");
        fetch_json(&self.http, &url, &params)
            .await
            .map_err(|e| e.with_context(format!("{} on {}", topic.source_id(), self.name)))
    }
}

impl TimeSeriesStore for HttpStore {
    fn select_time_series<'a>(&'a self, query: &'a SeriesQuery) -> BoxFuture<'a, Result<FieldFrame, ClientError>> {
        Box::pin(async move {
            let mut records = self
                .records(
                    &query.topic,
                    &[
                        ("from", query.range.start.timestamp_millis().to_string()),
                        ("to", query.range.end.timestamp_millis().to_string()),
                        ("order", "asc".to_string()),
                    ],
                )
                .await?;
            records.retain(|r| r.ts().is_some_and(|ts| query.range.contains(ts)));
            records.sort_by_key(|r| r.ts_ms);
            Ok(frame_from_records(&records, &query.fields))
        })
    }

    fn select_top_n<'a>(&'a self, query: &'a TopNQuery) -> BoxFuture<'a, Result<FieldFrame, ClientError>> {
        Box::pin(async move {
            let mut params = vec![("limit", query.num.to_string()), ("order", "desc".to_string())];
            if let Some(cut) = query.time_cut {
                params.push(("to", cut.timestamp_millis().to_string()));
            }
            let mut records = self.records(&query.topic, &params).await?;
            if let Some(cut) = query.time_cut {
                records.retain(|r| r.ts_ms < cut.timestamp_millis());
            }
            records.sort_by_key(|r| std::cmp::Reverse(r.ts_ms));
            records.truncate(query.num);
            records.reverse();
            Ok(frame_from_records(&records, &query.fields))
        })
    }

    fn select_log_rows<'a>(&'a self, query: &'a SeriesQuery) -> BoxFuture<'a, Result<Vec<LogRow>, ClientError>> {
        Box::pin(async move {
            let records = self
                .records(
                    &query.topic,
                    &[
                        ("from", query.range.start.timestamp_millis().to_string()),
                        ("to", query.range.end.timestamp_millis().to_string()),
                        ("order", "desc".to_string()),
                    ],
                )
                .await?;
            Ok(records
                .iter()
                .filter_map(|r| row_from_record(r, &query.fields))
                .filter(|row| query.range.contains(row.ts))
                .collect())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  HttpStoreConnector
// ═══════════════════════════════════════════════════════════════

/// Ответ каталога: `{"instances": [...]}` или просто `[...]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum DirectoryResponse {
    Wrapped { instances: Vec<String> },
    Plain(Vec<String>),
}

/// Подключает data instance'ы по имени из конфигурации.
///
/// Подключение считается живым, если `GET {url}/api/topics` отвечает
/// успешно.
pub struct HttpStoreConnector {
    http: reqwest::Client,
    instances: BTreeMap<String, String>,
    directory_url: Option<String>,
}

impl HttpStoreConnector {
    pub fn new(http: reqwest::Client, instances: BTreeMap<String, String>, directory_url: Option<String>) -> Self {
        Self { http, instances, directory_url }
    }

    pub fn instance_url(&self, name: &str) -> Option<&str> {
        self.instances.get(name).map(String::as_str)
    }
}

impl Connector for HttpStoreConnector {
    type Key = String;
    type Handle = Arc<dyn TimeSeriesStore>;

    fn connect<'a>(&'a self, key: &'a String) -> BoxFuture<'a, Result<Self::Handle, ClientError>> {
        Box::pin(async move {
            let url = self
                .instance_url(key)
                .ok_or_else(|| ClientError::config(format!("unknown data instance '{key}'")))?;
            let store = HttpStore::new(self.http.clone(), key.clone(), url);
            let _: serde_json::Value = fetch_json(&self.http, &format!("{}/api/topics", store.base_url), &[]).await?;
            Ok(Arc::new(store) as Self::Handle)
        })
    }

    fn discover(&self) -> BoxFuture<'_, Result<Vec<String>, ClientError>> {
        Box::pin(async move {
            match &self.directory_url {
                Some(url) => match fetch_json::<DirectoryResponse>(&self.http, url, &[]).await? {
                    DirectoryResponse::Wrapped { instances } | DirectoryResponse::Plain(instances) => Ok(instances),
                },
                None => Ok(self.instances.keys().cloned().collect()),
            }
        })
    }
}
