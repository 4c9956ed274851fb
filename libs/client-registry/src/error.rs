use std::time::Duration;

use commander_api::ClientError;

/// Клиент для ключа недоступен. Ничего не закэшировано: следующий
/// вызов для того же ключа снова попробует подключиться.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("'{key}' did not connect within {timeout:?}")]
    Timeout { key: String, timeout: Duration },

    #[error("'{key}' connect failed: {source}")]
    Connect { key: String, source: ClientError },
}

impl RegistryError {
    pub fn key(&self) -> &str {
        match self {
            RegistryError::Timeout { key, .. } | RegistryError::Connect { key, .. } => key,
        }
    }
}
