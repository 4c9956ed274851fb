use std::hash::Hash;

use futures::future::BoxFuture;

use crate::error::ClientError;

/// Фабрика подключений к внешним endpoint'ам одного вида.
///
/// Registry вызывает `connect` под дедлайном и кэширует только
/// успешно построенные handle'ы.
pub trait Connector: Send + Sync + 'static {
    /// Ключ endpoint'а (имя data instance, `ComponentKey`, ...).
    type Key: Clone + Eq + Hash + std::fmt::Display + Send + Sync + 'static;
    /// Дешёво клонируемый handle (обычно `Arc<dyn ...>`).
    type Handle: Clone + Send + Sync + 'static;

    /// Построить новый подключённый handle для `key`.
    fn connect<'a>(&'a self, key: &'a Self::Key) -> BoxFuture<'a, Result<Self::Handle, ClientError>>;

    /// Закрыть handle (при reset/shutdown или проигранной гонке).
    fn close(&self, _handle: Self::Handle) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async { Ok(()) })
    }

    /// Список доступных endpoint'ов (discovery).
    fn discover(&self) -> BoxFuture<'_, Result<Vec<String>, ClientError>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}
