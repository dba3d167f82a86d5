//! Typed definitions of the methods exchanged with the coordinator.
//!
//! Outbound (host → coordinator) methods implement [`CallMethod`]; inbound
//! (coordinator → host) methods implement [`RespondMethod`]. The host wires
//! handlers for the inbound set when it connects.

use crate::packets::LoadingState;
use crate::rpc::{CallMethod, RespondMethod};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── outbound ───────────────────────────────────────────────────────

/// Handshake. Announces the api key and the callable action names; the
/// coordinator replies with the dashboard url, or `false` to deny.
pub struct InitializeHost;

impl CallMethod for InitializeHost {
    const NAME: &'static str = "INITIALIZE_HOST";
    type Inputs = InitializeHostInputs;
    type Returns = InitializeHostResult;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeHostInputs {
    pub api_key: String,
    pub callable_action_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitializeHostResult {
    #[serde(rename_all = "camelCase")]
    Granted { dashboard_url: String },
    Denied(bool),
}

/// Ship one serialized render packet for a transaction.
pub struct SendIoCall;

impl CallMethod for SendIoCall {
    const NAME: &'static str = "SEND_IO_CALL";
    type Inputs = SendIoCallInputs;
    type Returns = Value;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendIoCallInputs {
    pub transaction_id: String,
    /// Serialized [`crate::packets::RenderPacket`].
    pub io_call: String,
}

/// Tell the coordinator the action finished.
pub struct MarkTransactionComplete;

impl CallMethod for MarkTransactionComplete {
    const NAME: &'static str = "MARK_TRANSACTION_COMPLETE";
    type Inputs = MarkTransactionCompleteInputs;
    type Returns = Value;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkTransactionCompleteInputs {
    pub transaction_id: String,
}

/// Best-effort progress update while an action runs non-interactively.
pub struct SendLoadingCall;

impl CallMethod for SendLoadingCall {
    const NAME: &'static str = "SEND_LOADING_CALL";
    type Inputs = SendLoadingCallInputs;
    type Returns = Value;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendLoadingCallInputs {
    pub transaction_id: String,
    pub loading_state: LoadingState,
}

// ── inbound ────────────────────────────────────────────────────────

/// Coordinator starts one execution of one action.
pub struct StartTransaction;

impl RespondMethod for StartTransaction {
    const NAME: &'static str = "START_TRANSACTION";
    type Inputs = StartTransactionInputs;
    type Returns = ();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransactionInputs {
    pub transaction_id: String,
    pub action_name: String,
}

/// Operator response for an in-flight render, routed by transaction id.
pub struct IoResponse;

impl RespondMethod for IoResponse {
    const NAME: &'static str = "IO_RESPONSE";
    type Inputs = IoResponseInputs;
    type Returns = ();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoResponseInputs {
    pub transaction_id: String,
    /// Serialized [`crate::packets::ResponsePacket`].
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_result_accepts_dashboard_url_or_false() {
        let granted: InitializeHostResult =
            serde_json::from_str(r#"{"dashboardUrl":"https://x"}"#).unwrap();
        assert!(matches!(
            granted,
            InitializeHostResult::Granted { ref dashboard_url } if dashboard_url == "https://x"
        ));

        let denied: InitializeHostResult = serde_json::from_str("false").unwrap();
        assert!(matches!(denied, InitializeHostResult::Denied(false)));
    }

    #[test]
    fn start_transaction_inputs_use_camel_case() {
        let inputs: StartTransactionInputs =
            serde_json::from_str(r#"{"transactionId":"t1","actionName":"refund"}"#).unwrap();
        assert_eq!(inputs.transaction_id, "t1");
        assert_eq!(inputs.action_name, "refund");
    }
}
