pub mod error;

use std::sync::Arc;
use std::time::Duration;

use client_registry::ClientRegistry;
use commander_api::{AckProgress, CommandChannel, CommandParams, ComponentKey, Connector};

pub use error::{DispatchError, ack_timeout_detail};

/// Дедлайн подтверждения команды по умолчанию.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle командного канала, который хранит registry.
pub type ChannelHandle = Arc<dyn CommandChannel>;

/// Registry командных каналов, ключ: `type+index`.
pub type ChannelRegistry<C> = ClientRegistry<C>;

// ═══════════════════════════════════════════════════════════════
//  Request / state
// ═══════════════════════════════════════════════════════════════

/// Одна команда: цель, имя операции, параметры, identity отправителя.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub target: ComponentKey,
    pub operation: String,
    pub params: CommandParams,
    pub identity: String,
}

/// Стадии обработки одного запроса (для логов).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    ChannelResolved,
    OperationResolved,
    Issued,
    Acked,
    TimedOut,
    Rejected,
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DispatchState::Idle => "idle",
            DispatchState::ChannelResolved => "channel_resolved",
            DispatchState::OperationResolved => "operation_resolved",
            DispatchState::Issued => "issued",
            DispatchState::Acked => "acked",
            DispatchState::TimedOut => "timed_out",
            DispatchState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

// ═══════════════════════════════════════════════════════════════
//  CommandDispatcher
// ═══════════════════════════════════════════════════════════════

/// Разрешает и выполняет одну именованную операцию на канале
/// компонента с дедлайном подтверждения.
///
/// Команды к одному компоненту не сериализуются: два перекрывающихся
/// запроса на один ключ могут чередоваться.
pub struct CommandDispatcher<C>
where
    C: Connector<Key = ComponentKey, Handle = ChannelHandle>,
{
    channels: Arc<ChannelRegistry<C>>,
    ack_timeout: Duration,
}

impl<C> CommandDispatcher<C>
where
    C: Connector<Key = ComponentKey, Handle = ChannelHandle>,
{
    pub fn new(channels: Arc<ChannelRegistry<C>>, ack_timeout: Duration) -> Self {
        Self { channels, ack_timeout }
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry<C>> {
        &self.channels
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Выполнить команду. Успех: текстовый результат, как его вернул
    /// компонент.
    pub async fn dispatch(&self, request: &CommandRequest) -> Result<String, DispatchError> {
        let target = &request.target;
        let operation = request.operation.as_str();
        tracing::debug!(component = %target, operation, state = %DispatchState::Idle, "dispatching command");

        let channel = match self.channels.get_or_connect(target).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(component = %target, operation, state = %DispatchState::Rejected, error = %e, "channel unavailable");
                return Err(DispatchError::ChannelUnavailable(e));
            }
        };
        tracing::debug!(component = %target, state = %DispatchState::ChannelResolved);

        let Some(op) = channel.operations().get(operation) else {
            tracing::warn!(component = %target, operation, state = %DispatchState::Rejected, "invalid command");
            return Err(DispatchError::InvalidOperation {
                target: target.clone(),
                operation: operation.to_string(),
            });
        };
        tracing::debug!(component = %target, operation, state = %DispatchState::OperationResolved);

        if let Some(declared) = op.parameters() {
            let unknown: Vec<String> = request
                .params
                .keys()
                .filter(|name| !declared.iter().any(|d| d == *name))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                tracing::warn!(component = %target, operation, ?unknown, state = %DispatchState::Rejected, "unknown parameters");
                return Err(DispatchError::InvalidParameters {
                    target: target.clone(),
                    operation: operation.to_string(),
                    unknown,
                });
            }
        }

        let progress = AckProgress::new();
        tracing::info!(
            component = %target,
            operation,
            identity = %request.identity,
            timeout = ?self.ack_timeout,
            state = %DispatchState::Issued,
            "issuing command"
        );

        let issued = op.issue(&request.identity, &request.params, &progress);
        match tokio::time::timeout(self.ack_timeout, issued).await {
            Ok(Ok(result)) => {
                tracing::info!(component = %target, operation, state = %DispatchState::Acked, "command acknowledged");
                Ok(result)
            }
            Ok(Err(e)) => {
                tracing::warn!(component = %target, operation, error = %e, state = %DispatchState::Rejected, "command failed");
                Err(DispatchError::Upstream {
                    target: target.clone(),
                    operation: operation.to_string(),
                    source: e,
                })
            }
            Err(_) => {
                let last = progress.last();
                tracing::warn!(component = %target, operation, last_ack = %last, state = %DispatchState::TimedOut, "command ack timed out");
                Err(DispatchError::AckTimeout {
                    target: target.clone(),
                    operation: operation.to_string(),
                    last,
                    timeout: self.ack_timeout,
                })
            }
        }
    }
}
