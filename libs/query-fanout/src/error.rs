use client_registry::RegistryError;
use commander_api::ClientError;

use crate::resample::ResampleError;

#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    /// Registry не смог получить клиента data instance.
    #[error("dependency unavailable: {0}")]
    Unavailable(#[from] RegistryError),

    #[error("{0}")]
    Resample(#[from] ResampleError),

    /// Запрос одного из источников упал: весь batch отменён.
    #[error("query for '{source_id}' failed: {source}")]
    Upstream { source_id: String, source: ClientError },
}

impl FanoutError {
    pub(crate) fn upstream(source_id: &str, source: ClientError) -> Self {
        FanoutError::Upstream {
            source_id: source_id.to_string(),
            source,
        }
    }
}
