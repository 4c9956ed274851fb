//! Отчёты поверх data instance'ов: интервалы bump-тестов силовых
//! актуаторов M1M3 со ссылками на dashboard сайта.

pub mod actuator;
pub mod dashboard;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use client_registry::RegistryError;
use commander_api::{ClientError, Connector, SeriesQuery, TimeRange, TopicRef};
use query_fanout::{StoreHandle, StoreRegistry};

pub use actuator::{ActuatorTable, ForceActuator};
pub use bump_test::{BUMP_TEST_COMPONENT, BUMP_TEST_TOPIC, BumpTestStage, bump_intervals};
pub use dashboard::{Dashboard, default_dashboards, isot};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Unavailable(#[from] RegistryError),

    #[error("unknown force actuator {0}")]
    UnknownActuator(u32),

    #[error("no bump test dashboard configured for '{0}'")]
    NoDashboard(String),

    #[error("bump test status query on {instance} failed: {source}")]
    Upstream { instance: String, source: ClientError },
}

/// Запрос интервалов bump-тестов одного актуатора.
#[derive(Debug, Clone, PartialEq)]
pub struct BumpTestRequest {
    pub instance: String,
    pub range: TimeRange,
    pub actuator_id: u32,
}

/// Один найденный тест.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BumpTestLink {
    pub start: String,
    pub end: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BumpTestReport {
    pub primary: Vec<BumpTestLink>,
    pub secondary: Vec<BumpTestLink>,
}

/// Построитель отчётов. Делит registry data instance'ов с fan-out.
pub struct Reports<C>
where
    C: Connector<Key = String, Handle = StoreHandle>,
{
    stores: Arc<StoreRegistry<C>>,
    actuators: ActuatorTable,
    dashboards: BTreeMap<String, Dashboard>,
}

impl<C> Reports<C>
where
    C: Connector<Key = String, Handle = StoreHandle>,
{
    pub fn new(stores: Arc<StoreRegistry<C>>, actuators: ActuatorTable, dashboards: BTreeMap<String, Dashboard>) -> Self {
        Self { stores, actuators, dashboards }
    }

    pub fn stores(&self) -> &Arc<StoreRegistry<C>> {
        &self.stores
    }

    pub async fn m1m3_bump_tests(&self, request: &BumpTestRequest) -> Result<BumpTestReport, ReportError> {
        let instance = request.instance.as_str();
        let actuator = self
            .actuators
            .get(request.actuator_id)
            .ok_or(ReportError::UnknownActuator(request.actuator_id))?;
        let dashboard = self
            .dashboards
            .get(instance)
            .ok_or_else(|| ReportError::NoDashboard(instance.to_string()))?;
        let store = self.stores.get_or_connect(&request.instance).await?;

        let primary_field = actuator.primary_field();
        let secondary_field = actuator.secondary_field();
        let mut fields = vec![primary_field.clone()];
        fields.extend(secondary_field.clone());

        tracing::info!(
            instance,
            actuator = actuator.id,
            start = %request.range.start,
            end = %request.range.end,
            "looking up bump tests"
        );
        let query = SeriesQuery {
            topic: TopicRef {
                component: BUMP_TEST_COMPONENT.to_string(),
                index: 0,
                topic: BUMP_TEST_TOPIC.to_string(),
            },
            fields,
            range: request.range,
        };
        let mut rows = store
            .select_log_rows(&query)
            .await
            .map_err(|source| ReportError::Upstream { instance: instance.to_string(), source })?;
        rows.sort_by_key(|row| row.ts);

        let links = |field: &str| -> Vec<BumpTestLink> {
            bump_intervals(&rows, field)
                .into_iter()
                .map(|(start, end)| BumpTestLink {
                    start: isot(&start),
                    end: isot(&end),
                    url: dashboard.bump_test_url(actuator, &start, &end),
                })
                .collect()
        };
        Ok(BumpTestReport {
            primary: links(&primary_field),
            secondary: secondary_field.as_deref().map(links).unwrap_or_default(),
        })
    }
}
