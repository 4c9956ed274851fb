//! Fan-out of time-series and log queries over a source tree, with the
//! reductions the gateway exposes: windowed resample, most-recent-N and
//! capped log merge.

pub mod error;
pub mod log_merge;
pub mod record;
pub mod resample;
pub mod source_tree;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::TryFutureExt;
use futures::future::try_join_all;
use serde::Serialize;

use client_registry::ClientRegistry;
use commander_api::{Connector, SeriesQuery, SortOrder, TimeRange, TimeSeriesStore, TopNQuery};

pub use error::FanoutError;
pub use log_merge::{DEFAULT_LOG_CAP, capped_merge};
pub use record::{LogRecord, ResultRecord};
pub use resample::{Resample, ResampleError, resample_mean};
pub use source_tree::{IndexKey, QueryTask, SourceTree};

/// Поле со временем приёма, которое всегда запрашивается для логов.
pub const RECEIVE_STAMP_FIELD: &str = "private_rcvStamp";

/// Handle data instance, который хранит registry.
pub type StoreHandle = Arc<dyn TimeSeriesStore>;

/// Registry data instances, ключ: имя instance.
pub type StoreRegistry<C> = ClientRegistry<C>;

/// `sourceId → field → records`.
pub type SeriesResult = BTreeMap<String, BTreeMap<String, Vec<ResultRecord>>>;

/// `sourceId → records`.
pub type LogResult = BTreeMap<String, Vec<LogRecord>>;

// ═══════════════════════════════════════════════════════════════
//  Modes
// ═══════════════════════════════════════════════════════════════

/// Режим сведения результатов.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryMode {
    /// Серии в окне с ресемплингом.
    Window { range: TimeRange, resample: Resample },
    /// Последние `num` значений по каждому полю.
    TopN { num: usize, time_cut: Option<DateTime<Utc>> },
    /// Логи в интервале, слитые с глобальным лимитом.
    Logs { range: TimeRange, cap: usize, order: SortOrder },
}

impl QueryMode {
    fn name(&self) -> &'static str {
        match self {
            QueryMode::Window { .. } => "window",
            QueryMode::TopN { .. } => "top_n",
            QueryMode::Logs { .. } => "logs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FanoutResult {
    Series(SeriesResult),
    Logs(LogResult),
}

impl FanoutResult {
    pub fn len(&self) -> usize {
        match self {
            FanoutResult::Series(m) => m.len(),
            FanoutResult::Logs(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════════
//  QueryFanout
// ═══════════════════════════════════════════════════════════════

/// Выполняет запросы по всем topic'ам дерева параллельно на одном data
/// instance и сводит результаты.
///
/// Все запросы создаются до первого ожидания и собираются fail-fast:
/// первая ошибка отменяет batch.
pub struct QueryFanout<C>
where
    C: Connector<Key = String, Handle = StoreHandle>,
{
    stores: Arc<StoreRegistry<C>>,
}

impl<C> QueryFanout<C>
where
    C: Connector<Key = String, Handle = StoreHandle>,
{
    pub fn new(stores: Arc<StoreRegistry<C>>) -> Self {
        Self { stores }
    }

    pub fn stores(&self) -> &Arc<StoreRegistry<C>> {
        &self.stores
    }

    pub async fn run(
        &self,
        instance: &str,
        tree: &SourceTree,
        mode: &QueryMode,
    ) -> Result<FanoutResult, FanoutError> {
        let store = self.stores.get_or_connect(&instance.to_string()).await?;
        let tasks = tree.expand();
        tracing::debug!(instance, mode = mode.name(), tasks = tasks.len(), "fan-out started");

        let result = match mode {
            QueryMode::Window { range, resample } => {
                FanoutResult::Series(window(store.as_ref(), &tasks, *range, *resample).await?)
            }
            QueryMode::TopN { num, time_cut } => {
                FanoutResult::Series(top_n(store.as_ref(), &tasks, *num, *time_cut).await?)
            }
            QueryMode::Logs { range, cap, order } => {
                FanoutResult::Logs(logs(store.as_ref(), &tasks, *range, *cap, *order).await?)
            }
        };

        tracing::debug!(instance, mode = mode.name(), sources = result.len(), "fan-out finished");
        Ok(result)
    }
}

async fn window(
    store: &dyn TimeSeriesStore,
    tasks: &[QueryTask],
    range: TimeRange,
    resample: Resample,
) -> Result<SeriesResult, FanoutError> {
    let queries: Vec<SeriesQuery> = tasks
        .iter()
        .map(|t| SeriesQuery { topic: t.topic.clone(), fields: t.fields.clone(), range })
        .collect();
    let frames = try_join_all(tasks.iter().zip(&queries).map(|(task, query)| {
        store
            .select_time_series(query)
            .map_err(move |e| FanoutError::upstream(&task.source_id, e))
    }))
    .await?;

    let mut out = SeriesResult::new();
    for (task, frame) in tasks.iter().zip(frames) {
        let mut fields = BTreeMap::new();
        for (field, samples) in frame {
            fields.insert(field, resample_mean(&samples, resample)?);
        }
        out.insert(task.source_id.clone(), fields);
    }
    Ok(out)
}

async fn top_n(
    store: &dyn TimeSeriesStore,
    tasks: &[QueryTask],
    num: usize,
    time_cut: Option<DateTime<Utc>>,
) -> Result<SeriesResult, FanoutError> {
    let queries: Vec<TopNQuery> = tasks
        .iter()
        .map(|t| TopNQuery { topic: t.topic.clone(), fields: t.fields.clone(), num, time_cut })
        .collect();
    let frames = try_join_all(tasks.iter().zip(&queries).map(|(task, query)| {
        store
            .select_top_n(query)
            .map_err(move |e| FanoutError::upstream(&task.source_id, e))
    }))
    .await?;

    Ok(tasks
        .iter()
        .zip(frames)
        .map(|(task, frame)| {
            let fields = frame
                .into_iter()
                .map(|(field, mut samples)| {
                    samples.sort_by_key(|s| s.ts);
                    let skip = samples.len().saturating_sub(num);
                    (field, samples.into_iter().skip(skip).map(ResultRecord::from).collect())
                })
                .collect();
            (task.source_id.clone(), fields)
        })
        .collect())
}

async fn logs(
    store: &dyn TimeSeriesStore,
    tasks: &[QueryTask],
    range: TimeRange,
    cap: usize,
    order: SortOrder,
) -> Result<LogResult, FanoutError> {
    let queries: Vec<SeriesQuery> = tasks
        .iter()
        .map(|t| {
            let mut fields = t.fields.clone();
            if !fields.iter().any(|f| f == RECEIVE_STAMP_FIELD) {
                fields.push(RECEIVE_STAMP_FIELD.to_string());
            }
            SeriesQuery { topic: t.topic.clone(), fields, range }
        })
        .collect();
    let batches = try_join_all(tasks.iter().zip(&queries).map(|(task, query)| {
        store
            .select_log_rows(query)
            .map_err(move |e| FanoutError::upstream(&task.source_id, e))
    }))
    .await?;

    let batches = tasks.iter().map(|t| t.source_id.clone()).zip(batches).collect();
    Ok(capped_merge(batches, cap, order))
}
