//! The per-transaction render loop.
//!
//! One client drives all IO for one transaction. A render ships the current
//! batch of components upstream, then consumes operator responses until the
//! batch returns: `SET_STATE` reshapes components and re-renders under the
//! same input group key, a failed validator re-renders with the error
//! message surfaced, `CANCELED` closes the transaction for good.

use crate::component::IoComponent;
use crate::error::IoError;
use bellhop_wire::codec;
use bellhop_wire::packets::{ComponentRenderInfo, RenderKind, RenderPacket, ResponseKind, ResponsePacket};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Outbound hook: ships one render packet to the coordinator.
pub(crate) type RenderSend =
    Arc<dyn Fn(RenderPacket) -> BoxFuture<'static, Result<(), IoError>> + Send + Sync>;

/// Post-return check for one component; a message means the batch is
/// rejected and re-rendered.
pub(crate) type ReturnCheck = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Check over the whole batch, run after every per-component check passed.
pub type GroupValidator = Arc<dyn Fn(&[Value]) -> Option<String> + Send + Sync>;

/// One component in the active batch.
pub(crate) struct RenderMember {
    pub(crate) component: Arc<IoComponent>,
    pub(crate) check: Option<ReturnCheck>,
}

enum ClientEvent {
    Response(ResponsePacket),
    Refresh,
}

pub struct IoClient {
    send: RenderSend,
    canceled: AtomicBool,
    busy: AtomicBool,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<ClientEvent>>,
}

impl IoClient {
    pub(crate) fn new(send: RenderSend) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            send,
            canceled: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            events_tx,
            events_rx: Mutex::new(events_rx),
        }
    }

    /// Deliver one operator response. Called by the host's routing layer.
    pub(crate) fn on_response(&self, packet: ResponsePacket) {
        let _ = self.events_tx.send(ClientEvent::Response(packet));
    }

    /// Close the transaction from the host side, e.g. when the connection
    /// is gone. The active render rejects; future renders reject too.
    pub(crate) fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        let _ = self.events_tx.send(ClientEvent::Response(ResponsePacket {
            input_group_key: None,
            kind: ResponseKind::Canceled,
            values: Vec::new(),
            values_meta: None,
        }));
    }

    pub(crate) fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Drive one batch to its return values, in member order.
    ///
    /// The action's awaits are sequential, so only one batch may be in
    /// flight; a concurrent call is a programming error and is rejected
    /// rather than silently racing the response handler.
    pub(crate) async fn render_components(
        &self,
        members: Vec<RenderMember>,
        group_validator: Option<GroupValidator>,
    ) -> Result<Vec<Value>, IoError> {
        if self.is_canceled() {
            return Err(IoError::TransactionClosed);
        }
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(IoError::RenderBusy);
        }
        let result = self.drive(&members, group_validator).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn drive(
        &self,
        members: &[RenderMember],
        group_validator: Option<GroupValidator>,
    ) -> Result<Vec<Value>, IoError> {
        let group_key = Uuid::new_v4();
        let mut validation_error: Option<String> = None;

        let mut events = self.events_rx.lock().await;
        // Anything still queued belongs to a finished batch.
        while events.try_recv().is_ok() {}

        // External state/prop writes re-render the active batch under the
        // same key; remote SET_STATE rides the same path via the component's
        // observer.
        for member in members {
            let tx = self.events_tx.clone();
            member
                .component
                .set_observer(Arc::new(move || {
                    let _ = tx.send(ClientEvent::Refresh);
                }))
                .await;
        }

        self.send_render(members, group_key, &validation_error).await?;

        loop {
            let Some(event) = events.recv().await else {
                return Err(IoError::TransactionClosed);
            };
            let packet = match event {
                ClientEvent::Refresh => {
                    self.send_render(members, group_key, &validation_error).await?;
                    continue;
                }
                ClientEvent::Response(packet) => packet,
            };

            if let Some(key) = packet.input_group_key {
                if key != group_key {
                    debug!(%key, "dropping response for stale input group");
                    continue;
                }
            }
            if packet.kind == ResponseKind::Canceled {
                self.canceled.store(true, Ordering::SeqCst);
                return Err(IoError::Canceled);
            }
            if self.is_canceled() {
                debug!("dropping response after cancel");
                continue;
            }

            if packet.values.len() != members.len() {
                return Err(IoError::ProtocolMismatch(format!(
                    "expected {} values, got {}",
                    members.len(),
                    packet.values.len()
                )));
            }
            let values: Vec<Value> = match &packet.values_meta {
                Some(metas) => packet
                    .values
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| codec::unpack(v, metas.get(i).unwrap_or(&Value::Null)))
                    .collect(),
                None => packet.values,
            };

            match packet.kind {
                ResponseKind::SetState => {
                    for (i, new_state) in values.into_iter().enumerate() {
                        if members[i].component.state().await != new_state {
                            // set_state notifies the observer, which queues
                            // the re-render.
                            members[i].component.set_state(new_state).await?;
                        }
                    }
                }
                ResponseKind::Return => {
                    let mut message = None;
                    for (i, member) in members.iter().enumerate() {
                        if let Some(check) = &member.check {
                            if let Some(found) = check(&values[i]) {
                                message = Some(found);
                                break;
                            }
                        }
                    }
                    if message.is_none() {
                        if let Some(group_validator) = &group_validator {
                            message = group_validator(&values);
                        }
                    }
                    match message {
                        Some(found) => {
                            validation_error = Some(found);
                            self.send_render(members, group_key, &validation_error).await?;
                        }
                        None => {
                            for (i, value) in values.into_iter().enumerate() {
                                members[i].component.set_return_value(value).await?;
                            }
                            break;
                        }
                    }
                }
                // Handled before the length check.
                ResponseKind::Canceled => {}
            }
        }

        let mut returns = Vec::with_capacity(members.len());
        for member in members {
            let rx = member
                .component
                .take_return_receiver()
                .await
                .ok_or_else(|| {
                    IoError::ProtocolMismatch("return cell already consumed".to_string())
                })?;
            returns.push(rx.await.map_err(|_| IoError::TransactionClosed)?);
        }
        Ok(returns)
    }

    async fn send_render(
        &self,
        members: &[RenderMember],
        group_key: Uuid,
        validation_error: &Option<String>,
    ) -> Result<(), IoError> {
        let mut to_render = Vec::with_capacity(members.len());
        for member in members {
            let props = codec::strip_null_entries(member.component.props().await);
            let packed = codec::pack(&props);
            to_render.push(ComponentRenderInfo {
                method_name: member.component.method().as_str().to_string(),
                label: member.component.label().to_string(),
                props: packed.json,
                props_meta: packed.meta,
            });
        }
        let packet = RenderPacket {
            id: Uuid::new_v4(),
            input_group_key: group_key,
            to_render,
            validation_error_message: validation_error.clone(),
            kind: RenderKind::Render,
        };
        (self.send)(packet).await
    }
}
