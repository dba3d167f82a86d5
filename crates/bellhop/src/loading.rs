//! Transaction loading state.
//!
//! A side channel for progress while an action runs non-interactively.
//! Updates are best-effort: transmit failures are logged and never surface
//! to the action.

use bellhop_wire::packets::LoadingState;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub(crate) type LoadingSend =
    Arc<dyn Fn(LoadingState) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Fields settable through [`TransactionLoading::start`] and
/// [`TransactionLoading::update`].
#[derive(Debug, Clone, Default)]
pub struct LoadingOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items_in_queue: Option<u64>,
}

impl LoadingOptions {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_items_in_queue(mut self, items: u64) -> Self {
        self.items_in_queue = Some(items);
        self
    }
}

/// Per-transaction progress reporter. Progress is monotone: completed
/// counts never decrease.
#[derive(Clone)]
pub struct TransactionLoading {
    inner: Arc<Inner>,
}

struct Inner {
    send: LoadingSend,
    state: Mutex<Option<LoadingState>>,
}

impl TransactionLoading {
    pub(crate) fn new(send: LoadingSend) -> Self {
        Self {
            inner: Arc::new(Inner {
                send,
                state: Mutex::new(None),
            }),
        }
    }

    /// Establish a fresh loading state and transmit it.
    pub async fn start(&self, opts: LoadingOptions) {
        let state = LoadingState {
            title: opts.title,
            description: opts.description,
            items_in_queue: opts.items_in_queue,
            items_completed: opts.items_in_queue.map(|_| 0),
        };
        *self.inner.state.lock().await = Some(state.clone());
        self.transmit(state).await;
    }

    /// Merge into the existing state. Without a prior `start` this logs and
    /// redirects there.
    pub async fn update(&self, opts: LoadingOptions) {
        let merged = {
            let mut guard = self.inner.state.lock().await;
            let Some(state) = guard.as_mut() else {
                drop(guard);
                warn!("loading update before start; starting instead");
                self.start(opts).await;
                return;
            };
            if opts.title.is_some() {
                state.title = opts.title;
            }
            if opts.description.is_some() {
                state.description = opts.description;
            }
            if let Some(items) = opts.items_in_queue {
                state.items_in_queue = Some(items);
                if state.items_completed.is_none() {
                    state.items_completed = Some(0);
                }
            }
            state.clone()
        };
        self.transmit(merged).await;
    }

    /// Count one queued item as done. Meaningless without `items_in_queue`.
    pub async fn complete_one(&self) {
        let updated = {
            let mut guard = self.inner.state.lock().await;
            match guard.as_mut() {
                Some(state) if state.items_in_queue.is_some() => {
                    let done = state.items_completed.unwrap_or(0) + 1;
                    state.items_completed = Some(done);
                    state.clone()
                }
                _ => {
                    warn!("completeOne without itemsInQueue is a no-op");
                    return;
                }
            }
        };
        self.transmit(updated).await;
    }

    pub(crate) async fn snapshot(&self) -> Option<LoadingState> {
        self.inner.state.lock().await.clone()
    }

    async fn transmit(&self, state: LoadingState) {
        if let Err(e) = (self.inner.send)(state).await {
            warn!(error = %e, "failed to transmit loading state");
        }
    }
}
