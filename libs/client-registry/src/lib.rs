pub mod error;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use commander_api::{ClientError, Connector};

pub use error::RegistryError;

/// Бюджет на подключение по умолчанию.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════
//  ClientEntry
// ═══════════════════════════════════════════════════════════════

struct ClientEntry<H> {
    handle: H,
    connected_at: DateTime<Utc>,
}

/// Read-only снимок записи кэша.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo<K> {
    pub key: K,
    pub connected_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════
//  ClientRegistry
// ═══════════════════════════════════════════════════════════════

/// Кэш подключённых клиентов по ключу endpoint'а.
///
/// Подключение выполняется лениво, под дедлайном и без удержания
/// lock'а. В кэш попадает только успешно построенный handle; ошибка
/// или таймаут ничего не сохраняют, поэтому следующий вызов для того
/// же ключа снова пробует подключиться. Запись, однажды появившись,
/// заменяется только явным `reset`/`close_all`.
pub struct ClientRegistry<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    entries: RwLock<HashMap<C::Key, ClientEntry<C::Handle>>>,
}

impl<C: Connector> ClientRegistry<C> {
    pub fn new(connector: C, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Вернуть закэшированный handle или подключиться.
    ///
    /// Существующая запись возвращается без повторной проверки.
    /// Две одновременные первые попытки для одного ключа могут обе
    /// подключиться; в кэш попадает первая завершившаяся, дубликат
    /// закрывается.
    pub async fn get_or_connect(&self, key: &C::Key) -> Result<C::Handle, RegistryError> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                return Ok(entry.handle.clone());
            }
        }

        tracing::info!(key = %key, timeout = ?self.connect_timeout, "connecting client");

        let handle = match tokio::time::timeout(self.connect_timeout, self.connector.connect(key)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "client connect failed");
                return Err(RegistryError::Connect {
                    key: key.to_string(),
                    source: e,
                });
            }
            Err(_) => {
                tracing::warn!(key = %key, timeout = ?self.connect_timeout, "client connect timed out");
                return Err(RegistryError::Timeout {
                    key: key.to_string(),
                    timeout: self.connect_timeout,
                });
            }
        };

        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(key) {
            let winner = existing.handle.clone();
            drop(entries);
            tracing::debug!(key = %key, "concurrent connect already cached, closing duplicate");
            if let Err(e) = self.connector.close(handle).await {
                tracing::debug!(key = %key, error = %e, "closing duplicate client failed");
            }
            return Ok(winner);
        }

        entries.insert(
            key.clone(),
            ClientEntry {
                handle: handle.clone(),
                connected_at: Utc::now(),
            },
        );
        tracing::info!(key = %key, "client connected");
        Ok(handle)
    }

    /// Удалить и закрыть запись. `false` если записи не было.
    pub async fn reset(&self, key: &C::Key) -> bool {
        let removed = self.entries.write().await.remove(key);
        match removed {
            Some(entry) => {
                if let Err(e) = self.connector.close(entry.handle).await {
                    tracing::error!(key = %key, error = %e, "error closing client");
                }
                tracing::info!(key = %key, "client reset");
                true
            }
            None => false,
        }
    }

    /// Закрыть все клиенты и очистить кэш (graceful shutdown).
    pub async fn close_all(&self) {
        let drained: Vec<(C::Key, ClientEntry<C::Handle>)> =
            self.entries.write().await.drain().collect();
        for (key, entry) in drained {
            if let Err(e) = self.connector.close(entry.handle).await {
                tracing::error!(key = %key, error = %e, "error closing client");
            }
        }
    }

    pub async fn contains(&self, key: &C::Key) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn entries(&self) -> Vec<EntryInfo<C::Key>> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(key, entry)| EntryInfo {
                key: key.clone(),
                connected_at: entry.connected_at,
            })
            .collect()
    }

    /// Проксировать discovery-вызов коннектора. Ошибка возвращается
    /// вызывающему и на кэш не влияет.
    pub async fn list_available_endpoints(&self) -> Result<Vec<String>, ClientError> {
        self.connector.discover().await.inspect_err(|e| {
            tracing::warn!(error = %e, "endpoint discovery failed");
        })
    }
}

#[cfg(test)]
mod tests;
