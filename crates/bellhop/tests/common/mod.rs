//! In-memory coordinator harness for end-to-end scenarios.
#![allow(dead_code)] // not every test binary uses every helper

use bellhop::{Host, HostError, HostHandle};
use bellhop_wire::envelope::{Envelope, ResponseBody};
use bellhop_wire::packets::{RenderPacket, ResponseKind, ResponsePacket};
use bellhop_wire::socket::{channel_pair, BoxEventStream, ChannelCommunicator, SocketEvent};
use bellhop_wire::Communicator;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// The coordinator's side of one in-memory connection.
pub struct Coordinator {
    comm: Arc<ChannelCommunicator>,
    events: BoxEventStream,
    next_call_id: u64,
}

impl Coordinator {
    /// Connect `host` over an in-memory pair, grant the handshake, and
    /// return the running handle plus this coordinator side.
    pub async fn start(host: &Host) -> (HostHandle, Coordinator) {
        let (host_side, coordinator_side) = channel_pair();
        let comm = Arc::new(coordinator_side);
        let events = comm.events().await.expect("coordinator events");
        let mut coordinator = Coordinator {
            comm,
            events,
            next_call_id: 1000,
        };

        let (handle, ()) = tokio::join!(
            async {
                host.connect_over(Arc::new(host_side))
                    .await
                    .expect("host connect")
            },
            async {
                let (call_id, method, _inputs) = coordinator.next_request().await;
                assert_eq!(method, "INITIALIZE_HOST");
                coordinator
                    .reply(call_id, json!({"dashboardUrl": "https://dash.test/bellhop"}))
                    .await;
            }
        );
        (handle, coordinator)
    }

    /// Like [`Coordinator::start`] but the handshake is denied with `false`.
    pub async fn start_denied(host: &Host) -> HostError {
        let (host_side, coordinator_side) = channel_pair();
        let comm = Arc::new(coordinator_side);
        let events = comm.events().await.expect("coordinator events");
        let mut coordinator = Coordinator {
            comm,
            events,
            next_call_id: 1000,
        };

        let (result, ()) = tokio::join!(host.connect_over(Arc::new(host_side)), async {
            let (call_id, method, _inputs) = coordinator.next_request().await;
            assert_eq!(method, "INITIALIZE_HOST");
            coordinator.reply(call_id, json!(false)).await;
        });
        match result {
            Err(error) => error,
            Ok(_) => panic!("handshake must fail"),
        }
    }

    /// Next inbound request envelope, skipping the host's responses to our
    /// own requests.
    pub async fn next_request(&mut self) -> (u64, String, Value) {
        loop {
            match self.events.next().await {
                Some(SocketEvent::Message(text)) => {
                    let envelope: Envelope =
                        serde_json::from_str(&text).expect("parseable envelope");
                    match envelope {
                        Envelope::Request {
                            call_id,
                            method,
                            inputs,
                        } => return (call_id, method, inputs),
                        Envelope::Response { .. } => continue,
                    }
                }
                other => panic!("channel ended while waiting for a request: {other:?}"),
            }
        }
    }

    /// True when no further request arrives within a short grace window.
    pub async fn assert_quiet(&mut self) {
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(100), self.next_request()).await;
        assert!(waited.is_err(), "expected no further requests");
    }

    pub async fn reply(&mut self, call_id: u64, returns: Value) {
        let frame = serde_json::to_string(&Envelope::Response {
            call_id,
            body: ResponseBody::ok(returns),
        })
        .expect("encodable response");
        self.comm.send(frame).await.expect("reply send");
    }

    pub async fn send_request(&mut self, method: &str, inputs: Value) {
        self.next_call_id += 1;
        let frame = serde_json::to_string(&Envelope::Request {
            call_id: self.next_call_id,
            method: method.to_string(),
            inputs,
        })
        .expect("encodable request");
        self.comm.send(frame).await.expect("request send");
    }

    pub async fn start_transaction(&mut self, transaction_id: &str, action_name: &str) {
        self.send_request(
            "START_TRANSACTION",
            json!({"transactionId": transaction_id, "actionName": action_name}),
        )
        .await;
    }

    /// Await the next `SEND_IO_CALL`, acknowledge it, and hand back the
    /// parsed render packet.
    pub async fn next_io_call(&mut self) -> (String, RenderPacket) {
        let (call_id, method, inputs) = self.next_request().await;
        assert_eq!(method, "SEND_IO_CALL");
        self.reply(call_id, Value::Null).await;
        let transaction_id = inputs["transactionId"].as_str().expect("txId").to_string();
        let packet: RenderPacket =
            serde_json::from_str(inputs["ioCall"].as_str().expect("ioCall"))
                .expect("parseable render packet");
        (transaction_id, packet)
    }

    pub async fn respond_io(&mut self, transaction_id: &str, packet: &ResponsePacket) {
        let value = serde_json::to_string(packet).expect("encodable response packet");
        self.send_request(
            "IO_RESPONSE",
            json!({"transactionId": transaction_id, "value": value}),
        )
        .await;
    }

    /// Await `MARK_TRANSACTION_COMPLETE`, acknowledge it, return the txId.
    pub async fn expect_complete(&mut self) -> String {
        let (call_id, method, inputs) = self.next_request().await;
        assert_eq!(method, "MARK_TRANSACTION_COMPLETE");
        self.reply(call_id, Value::Null).await;
        inputs["transactionId"].as_str().expect("txId").to_string()
    }
}

pub fn return_packet(key: Uuid, values: Vec<Value>) -> ResponsePacket {
    ResponsePacket {
        input_group_key: Some(key),
        kind: ResponseKind::Return,
        values,
        values_meta: None,
    }
}

pub fn set_state_packet(key: Uuid, values: Vec<Value>) -> ResponsePacket {
    ResponsePacket {
        input_group_key: Some(key),
        kind: ResponseKind::SetState,
        values,
        values_meta: None,
    }
}

pub fn canceled_packet(key: Uuid) -> ResponsePacket {
    ResponsePacket {
        input_group_key: Some(key),
        kind: ResponseKind::Canceled,
        values: Vec::new(),
        values_meta: None,
    }
}

/// Minimal coordinator for reconnect tests: grants the handshake, then
/// either drops the connection or keeps it open.
pub async fn auto_grant(comm: ChannelCommunicator, drop_after_handshake: bool) {
    let comm = Arc::new(comm);
    let mut events = comm.events().await.expect("auto-grant events");
    while let Some(event) = events.next().await {
        let SocketEvent::Message(text) = event else {
            return;
        };
        let envelope: Envelope = serde_json::from_str(&text).expect("parseable envelope");
        if let Envelope::Request {
            call_id, method, ..
        } = envelope
        {
            if method == "INITIALIZE_HOST" {
                let frame = serde_json::to_string(&Envelope::Response {
                    call_id,
                    body: ResponseBody::ok(json!({"dashboardUrl": "https://dash.test"})),
                })
                .expect("encodable response");
                let _ = comm.send(frame).await;
                if drop_after_handshake {
                    let _ = comm.close().await;
                    return;
                }
            }
        }
    }
}
