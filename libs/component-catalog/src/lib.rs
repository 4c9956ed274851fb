//! Описания интерфейсов компонентов (версии, topic'и, поля) по всем
//! компонентам, которые отдаёт discovery.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;

use client_registry::ClientRegistry;
use commander_api::{ClientError, ComponentMetadata, ComponentSchema, Connector, TopicCategory, TopicFields};

/// Handle схемы компонента, который хранит registry.
pub type SchemaHandle = Arc<ComponentSchema>;

/// Registry схем, ключ: имя компонента.
pub type SchemaRegistry<C> = ClientRegistry<C>;

/// `component → версии`.
pub type MetadataMap = BTreeMap<String, ComponentMetadata>;

/// `component → "{category}_names" → [topic]`.
pub type TopicNamesMap = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// `component → "{category}_data" → topic → field → FieldInfo`.
pub type TopicDataMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, TopicFields>>>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("component discovery failed: {0}")]
    Discovery(#[source] ClientError),
}

/// Каталог интерфейсов компонентов поверх registry схем.
///
/// Схема загружается один раз на компонент и живёт в registry до
/// shutdown. Компонент, схему которого получить не удалось, пропускается
/// и запрашивается снова при следующем вызове.
pub struct ComponentCatalog<C>
where
    C: Connector<Key = String, Handle = SchemaHandle>,
{
    schemas: Arc<SchemaRegistry<C>>,
    /// Сколько первых компонентов из discovery обслуживать.
    limit: Option<usize>,
}

impl<C> ComponentCatalog<C>
where
    C: Connector<Key = String, Handle = SchemaHandle>,
{
    pub fn new(schemas: Arc<SchemaRegistry<C>>, limit: Option<usize>) -> Self {
        Self { schemas, limit }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry<C>> {
        &self.schemas
    }

    /// Схемы всех доступных компонентов, в порядке discovery.
    pub async fn load(&self) -> Result<Vec<SchemaHandle>, CatalogError> {
        let mut names = self
            .schemas
            .list_available_endpoints()
            .await
            .map_err(CatalogError::Discovery)?;
        if let Some(limit) = self.limit {
            names.truncate(limit);
        }

        let results = join_all(names.iter().map(|name| self.schemas.get_or_connect(name))).await;
        let mut loaded = Vec::with_capacity(names.len());
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(schema) => loaded.push(schema),
                Err(e) => tracing::warn!(component = %name, error = %e, "component schema unavailable, skipped"),
            }
        }
        tracing::debug!(requested = names.len(), loaded = loaded.len(), "component schemas loaded");
        Ok(loaded)
    }

    pub async fn metadata(&self) -> Result<MetadataMap, CatalogError> {
        Ok(self
            .load()
            .await?
            .iter()
            .map(|schema| (schema.name.clone(), schema.metadata.clone()))
            .collect())
    }

    pub async fn topic_names(&self, categories: &[TopicCategory]) -> Result<TopicNamesMap, CatalogError> {
        Ok(self
            .load()
            .await?
            .iter()
            .map(|schema| {
                let names = categories
                    .iter()
                    .map(|c| (c.names_key(), schema.topic_names(*c)))
                    .collect();
                (schema.name.clone(), names)
            })
            .collect())
    }

    /// Описания полей по topic'ам, без служебных `private_*` полей.
    pub async fn topic_data(&self, categories: &[TopicCategory]) -> Result<TopicDataMap, CatalogError> {
        Ok(self
            .load()
            .await?
            .iter()
            .map(|schema| {
                let data = categories
                    .iter()
                    .map(|c| (c.data_key(), schema.public_topics(*c)))
                    .collect();
                (schema.name.clone(), data)
            })
            .collect())
    }
}
