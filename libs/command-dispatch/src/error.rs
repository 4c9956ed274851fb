use std::time::Duration;

use client_registry::RegistryError;
use commander_api::{AckStage, ClientError, ComponentKey};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("channel unavailable: {0}")]
    ChannelUnavailable(#[from] RegistryError),

    #[error("Invalid command '{operation}' for {target}")]
    InvalidOperation { target: ComponentKey, operation: String },

    #[error("Invalid parameters for command '{operation}': {}", unknown.join(", "))]
    InvalidParameters {
        target: ComponentKey,
        operation: String,
        unknown: Vec<String>,
    },

    #[error("Command time out. {}", ack_timeout_detail(*last))]
    AckTimeout {
        target: ComponentKey,
        operation: String,
        last: AckStage,
        timeout: Duration,
    },

    #[error("Error running command {operation}: {source}")]
    Upstream {
        target: ComponentKey,
        operation: String,
        source: ClientError,
    },
}

/// "Ничего не пришло" против "последняя стадия была X".
pub fn ack_timeout_detail(last: AckStage) -> String {
    if last == AckStage::NoAck {
        "No ack received from component.".to_string()
    } else {
        format!("Last ack received {last}.")
    }
}
