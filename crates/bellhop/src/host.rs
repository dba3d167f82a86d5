//! The host controller.
//!
//! Owns the connection to the coordinator and the transaction table.
//! Inbound `START_TRANSACTION` spawns one task per transaction around a
//! fresh render-loop client; inbound `IO_RESPONSE` is routed to that client
//! by transaction id. A lost connection is re-established on the step
//! backoff schedule; transactions do not survive the reconnect.

use crate::action::{Action, ActionContext};
use crate::client::{IoClient, RenderSend};
use crate::config::HostConfig;
use crate::error::{HostError, IoError};
use crate::io::Io;
use crate::loading::{LoadingSend, TransactionLoading};
use async_trait::async_trait;
use bellhop_wire::methods::{
    InitializeHost, InitializeHostInputs, InitializeHostResult, IoResponse, IoResponseInputs,
    MarkTransactionComplete, MarkTransactionCompleteInputs, SendIoCall, SendIoCallInputs,
    SendLoadingCall, SendLoadingCallInputs, StartTransaction, StartTransactionInputs,
};
use bellhop_wire::packets::ResponsePacket;
use bellhop_wire::rpc::CloseReason;
use bellhop_wire::{
    Communicator, DuplexRpc, ReconnectHandle, RpcError, SocketError, StepBackoff, WsCommunicator,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Produces a fresh connection per attempt; the reconnect loop's seam.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Communicator>, SocketError>;
}

struct WsConnector {
    endpoint: Url,
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Arc<dyn Communicator>, SocketError> {
        Ok(Arc::new(WsCommunicator::connect(&self.endpoint).await?))
    }
}

type TransactionTable = Arc<Mutex<HashMap<String, Arc<IoClient>>>>;

struct HostShared {
    api_key: String,
    actions: HashMap<String, Arc<dyn Action>>,
}

struct Session {
    pump: JoinHandle<Result<CloseReason, SocketError>>,
    transactions: TransactionTable,
    dashboard_url: Option<String>,
}

/// Unwind every live transaction as canceled, e.g. when the connection is
/// gone. Transactions never survive a reconnect.
async fn close_transactions(transactions: &TransactionTable) {
    for (_, client) in transactions.lock().await.drain() {
        client.cancel();
    }
}

/// A configured host: actions registered under names, ready to connect.
pub struct Host {
    config: HostConfig,
    actions: HashMap<String, Arc<dyn Action>>,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            actions: HashMap::new(),
        }
    }

    /// Register an action under the name operators will launch it by.
    pub fn register_action(
        &mut self,
        name: impl Into<String>,
        action: impl Action + 'static,
    ) -> &mut Self {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    /// Connect to the configured endpoint and supervise the connection,
    /// reconnecting on the backoff schedule until the handle is shut down.
    pub async fn listen(&self) -> Result<HostHandle, HostError> {
        self.listen_with(Arc::new(WsConnector {
            endpoint: self.config.endpoint.clone(),
        }))
        .await
    }

    /// [`Host::listen`] over a custom connector.
    pub async fn listen_with(&self, connector: Arc<dyn Connector>) -> Result<HostHandle, HostError> {
        let shared = self.shared();
        let comm = connector.connect().await?;
        let session = connect_session(&shared, comm).await?;
        let cancel = ReconnectHandle::new();
        let dashboard_url = session.dashboard_url.clone();
        let task = tokio::spawn(supervise(shared, connector, session, cancel.clone()));
        Ok(HostHandle {
            cancel,
            dashboard_url,
            task,
        })
    }

    /// Serve one already-established connection, without reconnecting.
    pub async fn connect_over(&self, comm: Arc<dyn Communicator>) -> Result<HostHandle, HostError> {
        let shared = self.shared();
        let session = connect_session(&shared, comm).await?;
        let cancel = ReconnectHandle::new();
        let dashboard_url = session.dashboard_url.clone();
        let task = tokio::spawn(async move {
            let _ = session.pump.await;
            close_transactions(&session.transactions).await;
        });
        Ok(HostHandle {
            cancel,
            dashboard_url,
            task,
        })
    }

    fn shared(&self) -> Arc<HostShared> {
        Arc::new(HostShared {
            api_key: self.config.api_key.clone(),
            actions: self.actions.clone(),
        })
    }
}

/// Handle over a running host connection.
pub struct HostHandle {
    cancel: ReconnectHandle,
    dashboard_url: Option<String>,
    task: JoinHandle<()>,
}

impl HostHandle {
    pub fn dashboard_url(&self) -> Option<&str> {
        self.dashboard_url.as_deref()
    }

    /// Stop supervising: no further reconnect attempts.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.task.abort();
    }

    /// Wait until the connection is gone for good.
    pub async fn closed(self) {
        let _ = self.task.await;
    }
}

async fn connect_session(
    shared: &Arc<HostShared>,
    comm: Arc<dyn Communicator>,
) -> Result<Session, HostError> {
    let rpc = Arc::new(DuplexRpc::new(comm));
    let transactions: TransactionTable = Arc::new(Mutex::new(HashMap::new()));

    {
        let shared = shared.clone();
        let transactions = transactions.clone();
        // Weak: the handler table lives inside the rpc itself.
        let rpc_for_start = Arc::downgrade(&rpc);
        rpc.respond_to::<StartTransaction, _, _>(move |inputs| {
            let shared = shared.clone();
            let rpc = rpc_for_start.upgrade();
            let transactions = transactions.clone();
            async move {
                match rpc {
                    Some(rpc) => start_transaction(shared, rpc, transactions, inputs).await,
                    None => debug!("start after session teardown"),
                }
                Ok(())
            }
        });
    }
    {
        let transactions = transactions.clone();
        rpc.respond_to::<IoResponse, _, _>(move |inputs| {
            let transactions = transactions.clone();
            async move {
                deliver_io_response(transactions, inputs).await;
                Ok(())
            }
        });
    }

    let pump = tokio::spawn(rpc.clone().run());

    let callable_action_names: Vec<String> = shared.actions.keys().cloned().collect();
    let handshake = rpc
        .call::<InitializeHost>(InitializeHostInputs {
            api_key: shared.api_key.clone(),
            callable_action_names,
        })
        .await;
    let dashboard_url = match handshake {
        Ok(InitializeHostResult::Granted { dashboard_url }) => {
            info!(%dashboard_url, "host connected");
            Some(dashboard_url)
        }
        Ok(InitializeHostResult::Denied(_)) => {
            pump.abort();
            return Err(HostError::AuthInvalid);
        }
        Err(RpcError::Remote(message)) => {
            pump.abort();
            warn!(%message, "handshake rejected");
            return Err(HostError::AuthInvalid);
        }
        Err(e) => {
            pump.abort();
            return Err(HostError::Rpc(e));
        }
    };

    Ok(Session {
        pump,
        transactions,
        dashboard_url,
    })
}

async fn start_transaction(
    shared: Arc<HostShared>,
    rpc: Arc<DuplexRpc>,
    transactions: TransactionTable,
    inputs: StartTransactionInputs,
) {
    let Some(action) = shared.actions.get(&inputs.action_name).cloned() else {
        warn!(action = %inputs.action_name, "start for unknown action");
        return;
    };
    let transaction_id = inputs.transaction_id;

    let send: RenderSend = {
        let rpc = rpc.clone();
        let transaction_id = transaction_id.clone();
        Arc::new(move |packet| {
            let rpc = rpc.clone();
            let transaction_id = transaction_id.clone();
            Box::pin(async move {
                let io_call =
                    serde_json::to_string(&packet).map_err(|e| IoError::Schema(e.to_string()))?;
                rpc.call::<SendIoCall>(SendIoCallInputs {
                    transaction_id,
                    io_call,
                })
                .await
                .map_err(IoError::Transport)?;
                Ok(())
            })
        })
    };
    let client = Arc::new(IoClient::new(send));

    {
        let mut table = transactions.lock().await;
        if table.contains_key(&transaction_id) {
            warn!(%transaction_id, "transaction already live");
            return;
        }
        table.insert(transaction_id.clone(), client.clone());
    }

    let loading_send: LoadingSend = {
        let rpc = rpc.clone();
        let transaction_id = transaction_id.clone();
        Arc::new(move |loading_state| {
            let rpc = rpc.clone();
            let transaction_id = transaction_id.clone();
            Box::pin(async move {
                rpc.call::<SendLoadingCall>(SendLoadingCallInputs {
                    transaction_id,
                    loading_state,
                })
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
            })
        })
    };
    let ctx = ActionContext {
        transaction_id: transaction_id.clone(),
        loading: TransactionLoading::new(loading_send),
    };
    let io = Io::new(client);

    tokio::spawn(async move {
        match action.run(io, ctx).await {
            Ok(_) => {
                let complete = rpc
                    .call::<MarkTransactionComplete>(MarkTransactionCompleteInputs {
                        transaction_id: transaction_id.clone(),
                    })
                    .await;
                if let Err(e) = complete {
                    warn!(error = %e, %transaction_id, "failed to mark transaction complete");
                }
            }
            // Failed and canceled actions are never marked complete; the
            // coordinator times them out.
            Err(e) => warn!(error = %e, %transaction_id, "action did not complete"),
        }
        transactions.lock().await.remove(&transaction_id);
    });
}

async fn deliver_io_response(transactions: TransactionTable, inputs: IoResponseInputs) {
    let client = transactions
        .lock()
        .await
        .get(&inputs.transaction_id)
        .cloned();
    let Some(client) = client else {
        debug!(transaction_id = %inputs.transaction_id, "io response for unknown transaction");
        return;
    };
    match serde_json::from_str::<ResponsePacket>(&inputs.value) {
        Ok(packet) => client.on_response(packet),
        Err(e) => warn!(error = %e, "unparseable io response"),
    }
}

async fn supervise(
    shared: Arc<HostShared>,
    connector: Arc<dyn Connector>,
    mut session: Session,
    cancel: ReconnectHandle,
) {
    loop {
        match session.pump.await {
            Ok(Ok(close)) => warn!(reason = %close.reason, "connection to coordinator closed"),
            Ok(Err(e)) => warn!(error = %e, "connection to coordinator failed"),
            Err(e) => warn!(error = %e, "connection task ended abnormally"),
        }
        close_transactions(&session.transactions).await;
        if cancel.is_cancelled() {
            return;
        }

        let mut backoff = StepBackoff::new();
        session = loop {
            tokio::time::sleep(backoff.next_delay()).await;
            if cancel.is_cancelled() {
                return;
            }
            match connector.connect().await {
                Ok(comm) => match connect_session(&shared, comm).await {
                    Ok(next) => break next,
                    Err(HostError::AuthInvalid) => {
                        error!("api key rejected on reconnect");
                        return;
                    }
                    Err(e) => warn!(error = %e, "reconnect handshake failed"),
                },
                Err(e) => debug!(error = %e, "reconnect attempt failed"),
            }
        };
        info!("reconnected to coordinator");
    }
}
