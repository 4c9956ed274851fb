use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::error::ClientError;
use crate::types::{FieldFrame, LogRow, TimeRange, TopicRef};

/// Запрос серий по полям topic'а в интервале.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    pub topic: TopicRef,
    pub fields: Vec<String>,
    pub range: TimeRange,
}

/// Запрос последних `num` значений по полям topic'а.
#[derive(Debug, Clone, PartialEq)]
pub struct TopNQuery {
    pub topic: TopicRef,
    pub fields: Vec<String>,
    pub num: usize,
    /// Верхняя граница (exclusive). `None`: до текущего момента.
    pub time_cut: Option<DateTime<Utc>>,
}

/// Handle подключения к data instance (time-series/log store).
///
/// Язык запросов store'а непрозрачен для gateway: реализация сама
/// транслирует запросы в свой протокол.
pub trait TimeSeriesStore: Send + Sync {
    /// Серии значений по полям в `query.range`, по возрастанию времени.
    fn select_time_series<'a>(
        &'a self,
        query: &'a SeriesQuery,
    ) -> BoxFuture<'a, Result<FieldFrame, ClientError>>;

    /// Последние `num` значений по каждому полю, по возрастанию времени.
    fn select_top_n<'a>(
        &'a self,
        query: &'a TopNQuery,
    ) -> BoxFuture<'a, Result<FieldFrame, ClientError>>;

    /// Сырые строки (все выбранные поля разом) в `query.range`.
    fn select_log_rows<'a>(
        &'a self,
        query: &'a SeriesQuery,
    ) -> BoxFuture<'a, Result<Vec<LogRow>, ClientError>>;

    fn close(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async { Ok(()) })
    }
}
