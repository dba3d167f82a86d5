//! Framed envelopes shared by both directions of the duplex channel.
//!
//! Every frame on the wire is one JSON-encoded [`Envelope`]. Requests carry a
//! `callId` allocated by the sender; the matching response echoes it back.
//! There is no ordering between distinct call ids in either direction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One framed message on the duplex channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Envelope {
    /// An invocation of a named method on the peer.
    #[serde(rename_all = "camelCase")]
    Request {
        call_id: u64,
        method: String,
        inputs: Value,
    },
    /// The reply to a previously received request with the same `call_id`.
    #[serde(rename_all = "camelCase")]
    Response { call_id: u64, body: ResponseBody },
}

/// Outcome half of a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ResponseBody {
    #[serde(rename_all = "camelCase")]
    Ok { returns: Value },
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

impl ResponseBody {
    pub fn ok(returns: Value) -> Self {
        Self::Ok { returns }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
