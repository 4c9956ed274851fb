use std::sync::Arc;

use commander_api::{BoxFuture, ClientError, ComponentSchema, Connector};

use crate::http::fetch_json;

/// Схемы интерфейсов компонентов через middleware:
/// `GET {url}/components` → `[name]`,
/// `GET {url}/components/{name}/schema` → `ComponentSchema`.
pub struct HttpSchemaConnector {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSchemaConnector {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Connector for HttpSchemaConnector {
    type Key = String;
    type Handle = Arc<ComponentSchema>;

    fn connect<'a>(&'a self, key: &'a String) -> BoxFuture<'a, Result<Self::Handle, ClientError>> {
        Box::pin(async move {
            let url = format!("{}/components/{key}/schema", self.base_url);
            let mut schema: ComponentSchema = fetch_json(&self.http, &url, &[]).await?;
            if schema.name.is_empty() {
                schema.name = key.clone();
            }
            tracing::debug!(
                component = %key,
                xml_version = %schema.metadata.xml_version,
                "component schema loaded"
            );
            Ok(Arc::new(schema))
        })
    }

    fn discover(&self) -> BoxFuture<'_, Result<Vec<String>, ClientError>> {
        Box::pin(async move {
            let url = format!("{}/components", self.base_url);
            fetch_json::<Vec<String>>(&self.http, &url, &[]).await
        })
    }
}
