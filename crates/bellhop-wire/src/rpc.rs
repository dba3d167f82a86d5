//! Duplex RPC: many concurrent calls multiplexed over one communicator.
//!
//! Both peers may call and be called. Outbound methods implement
//! [`CallMethod`]; inbound methods implement [`RespondMethod`] and get a
//! handler registered with [`DuplexRpc::respond_to`]. Serde is the schema
//! layer: a payload that does not (de)serialize fails with
//! [`RpcError::Schema`] and never reaches a handler.

use crate::envelope::{Envelope, ResponseBody};
use crate::socket::{Communicator, SocketError, SocketEvent};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A method this side is allowed to call on the peer.
pub trait CallMethod {
    const NAME: &'static str;
    type Inputs: Serialize + Send + 'static;
    type Returns: DeserializeOwned + Send + 'static;
}

/// A method the peer is allowed to call on this side.
pub trait RespondMethod {
    const NAME: &'static str;
    type Inputs: DeserializeOwned + Send + 'static;
    type Returns: Serialize + Send + 'static;
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("schema: {0}")]
    Schema(String),
    #[error("call timed out")]
    Timeout,
    #[error("transport closed")]
    TransportClosed,
    #[error(transparent)]
    Send(#[from] SocketError),
    #[error("remote error: {0}")]
    Remote(String),
}

type BoxHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Why the dispatch loop stopped.
#[derive(Debug, Clone)]
pub struct CloseReason {
    pub code: Option<u16>,
    pub reason: String,
}

/// Request/response multiplexer over one [`Communicator`].
pub struct DuplexRpc {
    comm: Arc<dyn Communicator>,
    next_call_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<ResponseBody>>>,
    handlers: RwLock<HashMap<&'static str, BoxHandler>>,
    call_timeout: Option<Duration>,
}

impl DuplexRpc {
    pub fn new(comm: Arc<dyn Communicator>) -> Self {
        Self {
            comm,
            next_call_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            call_timeout: None,
        }
    }

    /// Reject calls that receive no response within `timeout`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn communicator(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    /// Register the handler for an inbound method, replacing any previous
    /// one. Handlers may be registered after construction so wiring can
    /// close over the rpc itself.
    pub fn respond_to<M, F, Fut>(&self, handler: F)
    where
        M: RespondMethod,
        F: Fn(M::Inputs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M::Returns, String>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let boxed: BoxHandler = Arc::new(move |raw: Value| {
            let handler = handler.clone();
            Box::pin(async move {
                let inputs = serde_json::from_value::<M::Inputs>(raw)
                    .map_err(|e| format!("invalid inputs for {}: {e}", M::NAME))?;
                let returns = handler(inputs).await?;
                serde_json::to_value(returns).map_err(|e| e.to_string())
            })
        });
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(M::NAME, boxed);
    }

    /// Invoke a method on the peer and await its response.
    pub async fn call<M: CallMethod>(&self, inputs: M::Inputs) -> Result<M::Returns, RpcError> {
        let inputs = serde_json::to_value(inputs).map_err(|e| RpcError::Schema(e.to_string()))?;
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(call_id, tx);

        let frame = serde_json::to_string(&Envelope::Request {
            call_id,
            method: M::NAME.to_string(),
            inputs,
        })
        .map_err(|e| RpcError::Schema(e.to_string()))?;

        if let Err(e) = self.comm.send(frame).await {
            self.forget(call_id);
            return Err(RpcError::Send(e));
        }

        let body = match self.call_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.forget(call_id);
                    return Err(RpcError::Timeout);
                }
            },
            None => rx.await,
        }
        .map_err(|_| RpcError::TransportClosed)?;

        match body {
            ResponseBody::Ok { returns } => {
                serde_json::from_value(returns).map_err(|e| RpcError::Schema(e.to_string()))
            }
            ResponseBody::Error { message } => Err(RpcError::Remote(message)),
        }
    }

    /// Drive inbound dispatch until the socket closes. In-flight calls are
    /// rejected with [`RpcError::TransportClosed`] on exit.
    pub async fn run(self: Arc<Self>) -> Result<CloseReason, SocketError> {
        let mut events = self.comm.events().await?;
        let mut close = CloseReason {
            code: None,
            reason: "event stream ended".to_string(),
        };
        while let Some(event) = events.next().await {
            match event {
                SocketEvent::Message(text) => Self::dispatch(&self, &text),
                SocketEvent::Closed { code, reason } => {
                    close = CloseReason { code, reason };
                    break;
                }
            }
        }
        self.fail_pending();
        Ok(close)
    }

    fn dispatch(rpc: &Arc<Self>, text: &str) {
        let envelope = match serde_json::from_str::<Envelope>(text) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "dropping unparseable frame");
                return;
            }
        };
        match envelope {
            Envelope::Response { call_id, body } => {
                let tx = rpc
                    .pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&call_id);
                match tx {
                    Some(tx) => {
                        let _ = tx.send(body);
                    }
                    None => debug!(call_id, "response for unknown call"),
                }
            }
            Envelope::Request {
                call_id,
                method,
                inputs,
            } => {
                let handler = rpc
                    .handlers
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(method.as_str())
                    .cloned();
                let rpc = rpc.clone();
                match handler {
                    Some(handler) => {
                        tokio::spawn(async move {
                            let body = match handler(inputs).await {
                                Ok(returns) => ResponseBody::ok(returns),
                                Err(message) => ResponseBody::error(message),
                            };
                            rpc.reply(call_id, body).await;
                        });
                    }
                    None => {
                        warn!(%method, "request for unknown method");
                        tokio::spawn(async move {
                            rpc.reply(call_id, ResponseBody::error(format!("unknown method: {method}")))
                                .await;
                        });
                    }
                }
            }
        }
    }

    async fn reply(&self, call_id: u64, body: ResponseBody) {
        let frame = match serde_json::to_string(&Envelope::Response { call_id, body }) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, call_id, "failed to encode response");
                return;
            }
        };
        if let Err(e) = self.comm.send(frame).await {
            warn!(error = %e, call_id, "failed to send response");
        }
    }

    fn forget(&self, call_id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&call_id);
    }

    fn fail_pending(&self) {
        // Dropping the senders rejects every waiting call with
        // TransportClosed.
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
