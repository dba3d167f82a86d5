//! User-registered actions.

use crate::error::ActionError;
use crate::io::Io;
use crate::loading::TransactionLoading;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;

/// One interactive operation this host can run for an operator.
///
/// Implementations drive the session through the `io` namespace; the return
/// value is shown to the operator when the transaction completes.
#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self, io: Io, ctx: ActionContext) -> Result<Value, ActionError>;
}

/// Per-run context handed to the action beside `io`.
#[derive(Clone)]
pub struct ActionContext {
    pub transaction_id: String,
    pub loading: TransactionLoading,
}

/// Adapter turning an async closure into an [`Action`].
pub struct FnAction<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnAction<F, Fut>
where
    F: Fn(Io, ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Action for FnAction<F, Fut>
where
    F: Fn(Io, ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    async fn run(&self, io: Io, ctx: ActionContext) -> Result<Value, ActionError> {
        (self.f)(io, ctx).await
    }
}
