use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ClientError;
use crate::types::ComponentKey;

/// Параметры команды: JSON-объект `name → value`.
pub type CommandParams = serde_json::Map<String, serde_json::Value>;

// ════════════════════════════════════════════════════════════════
//  Acknowledgment stages
// ════════════════════════════════════════════════════════════════

/// Стадия подтверждения команды, сообщаемая компонентом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckStage {
    #[serde(rename = "CMD_ACK")]
    Ack,
    #[serde(rename = "CMD_INPROGRESS")]
    InProgress,
    #[serde(rename = "CMD_STALLED")]
    Stalled,
    #[serde(rename = "CMD_COMPLETE")]
    Complete,
    #[serde(rename = "CMD_NOPERM")]
    NoPerm,
    /// Ничего не получено.
    #[serde(rename = "CMD_NOACK")]
    NoAck,
    #[serde(rename = "CMD_FAILED")]
    Failed,
    #[serde(rename = "CMD_ABORTED")]
    Aborted,
    #[serde(rename = "CMD_TIMEOUT")]
    Timeout,
}

impl AckStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStage::Ack => "CMD_ACK",
            AckStage::InProgress => "CMD_INPROGRESS",
            AckStage::Stalled => "CMD_STALLED",
            AckStage::Complete => "CMD_COMPLETE",
            AckStage::NoPerm => "CMD_NOPERM",
            AckStage::NoAck => "CMD_NOACK",
            AckStage::Failed => "CMD_FAILED",
            AckStage::Aborted => "CMD_ABORTED",
            AckStage::Timeout => "CMD_TIMEOUT",
        }
    }

    /// Команда завершилась неуспешно.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AckStage::NoPerm | AckStage::Failed | AckStage::Aborted | AckStage::Timeout
        )
    }

    /// Дальнейших подтверждений не будет.
    pub fn is_final(&self) -> bool {
        *self == AckStage::Complete || self.is_failure()
    }
}

impl std::fmt::Display for AckStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Последняя наблюдённая стадия подтверждения.
///
/// Канал обновляет её по мере прихода ack'ов; dispatcher читает после
/// истечения дедлайна, чтобы отличить "ничего не пришло" от
/// "застряли на стадии X".
#[derive(Debug, Clone)]
pub struct AckProgress {
    tx: Arc<watch::Sender<AckStage>>,
}

impl Default for AckProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl AckProgress {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AckStage::NoAck);
        Self { tx: Arc::new(tx) }
    }

    pub fn record(&self, stage: AckStage) {
        self.tx.send_replace(stage);
    }

    pub fn last(&self) -> AckStage {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AckStage> {
        self.tx.subscribe()
    }
}

// ════════════════════════════════════════════════════════════════
//  Operations
// ════════════════════════════════════════════════════════════════

/// Одна именованная операция командного канала.
pub trait Operation: Send + Sync {
    /// Объявленные имена параметров. `None`: операция принимает любые.
    fn parameters(&self) -> Option<&[String]> {
        None
    }

    /// Отправить команду и дождаться финального подтверждения.
    ///
    /// Промежуточные стадии пишутся в `progress`. Успех: текстовый
    /// результат команды.
    fn issue<'a>(
        &'a self,
        identity: &'a str,
        params: &'a CommandParams,
        progress: &'a AckProgress,
    ) -> BoxFuture<'a, Result<String, ClientError>>;
}

/// Таблица зарегистрированных операций канала: name → handler.
///
/// Строится один раз при установке канала; неизвестное имя: промах
/// таблицы, а не ошибка рефлексии.
#[derive(Clone, Default)]
pub struct OperationTable {
    ops: HashMap<String, Arc<dyn Operation>>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, op: Arc<dyn Operation>) {
        self.ops.insert(name.into(), op);
    }

    pub fn with(mut self, name: impl Into<String>, op: Arc<dyn Operation>) -> Self {
        self.register(name, op);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.ops.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Имена операций в отсортированном порядке.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ops.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl std::fmt::Debug for OperationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Командный канал к одному компоненту.
///
/// Канал только для команд: не подписывается на телеметрию и события.
pub trait CommandChannel: Send + Sync {
    fn key(&self) -> &ComponentKey;

    fn operations(&self) -> &OperationTable;

    fn close(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async { Ok(()) })
    }
}
