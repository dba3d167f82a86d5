//! Error taxonomy for the SDK surface.

use bellhop_wire::{RpcError, SocketError};

/// Failures surfaced to action code through the `io` namespace.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The operator canceled the transaction mid-render.
    #[error("transaction canceled")]
    Canceled,
    /// IO attempted after the transaction was closed.
    #[error("transaction closed")]
    TransactionClosed,
    /// A second render was driven while one was already in flight.
    #[error("render already in progress")]
    RenderBusy,
    /// The coordinator broke a protocol invariant; the transaction ends.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),
    /// A group was built around an exclusive promise.
    #[error("group contains an exclusive promise")]
    GroupContainsExclusive,
    /// A value failed its method schema.
    #[error("schema: {0}")]
    Schema(String),
    /// A raw return could not be mapped to the promised type.
    #[error("bad return value: {0}")]
    BadReturn(String),
    #[error(transparent)]
    Transport(#[from] RpcError),
}

/// Failures of the host lifecycle itself.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The coordinator rejected the api key. Fatal.
    #[error("invalid api key")]
    AuthInvalid,
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// What an action run can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
