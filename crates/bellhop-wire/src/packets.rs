//! Render and response packets, plus the loading-state payload.
//!
//! A render packet travels serialized inside `SEND_IO_CALL.ioCall`; a
//! response packet arrives serialized inside `IO_RESPONSE.value`. Both sides
//! scope a batch with the `inputGroupKey`: a response whose key does not
//! match the currently active batch is stale and must be dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One batch of components shipped to the operator side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPacket {
    pub id: Uuid,
    pub input_group_key: Uuid,
    pub to_render: Vec<ComponentRenderInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error_message: Option<String>,
    pub kind: RenderKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderKind {
    #[serde(rename = "RENDER")]
    Render,
}

/// The minimal remote-facing payload for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRenderInfo {
    pub method_name: String,
    pub label: String,
    pub props: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub props_meta: Value,
}

/// Operator-side answer for the active batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePacket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_group_key: Option<Uuid>,
    pub kind: ResponseKind,
    /// One entry per rendered component for `RETURN` and `SET_STATE`;
    /// ignored for `CANCELED`.
    #[serde(default)]
    pub values: Vec<Value>,
    /// Optional codec sidecar, parallel to `values`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_meta: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    #[serde(rename = "RETURN")]
    Return,
    #[serde(rename = "SET_STATE")]
    SetState,
    #[serde(rename = "CANCELED")]
    Canceled,
}

/// Progress shown to the operator while an action runs non-interactively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_in_queue: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_completed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_packet_wire_shape() {
        let packet = RenderPacket {
            id: Uuid::new_v4(),
            input_group_key: Uuid::new_v4(),
            to_render: vec![ComponentRenderInfo {
                method_name: "INPUT_TEXT".to_string(),
                label: "name".to_string(),
                props: Value::Null,
                props_meta: Value::Null,
            }],
            validation_error_message: None,
            kind: RenderKind::Render,
        };
        let raw = serde_json::to_value(&packet).unwrap();
        assert_eq!(raw["kind"], "RENDER");
        assert_eq!(raw["toRender"][0]["methodName"], "INPUT_TEXT");
        // Absent optionals and null metas stay off the wire.
        assert!(raw.get("validationErrorMessage").is_none());
        assert!(raw["toRender"][0].get("propsMeta").is_none());
    }

    #[test]
    fn response_packet_tolerates_missing_optionals() {
        let packet: ResponsePacket =
            serde_json::from_value(json!({"kind": "CANCELED"})).unwrap();
        assert_eq!(packet.kind, ResponseKind::Canceled);
        assert!(packet.input_group_key.is_none());
        assert!(packet.values.is_empty());
        assert!(packet.values_meta.is_none());
    }

    #[test]
    fn loading_state_serializes_only_set_fields() {
        let state = LoadingState {
            title: Some("Crunching".to_string()),
            items_in_queue: Some(3),
            items_completed: Some(0),
            ..Default::default()
        };
        let raw = serde_json::to_value(&state).unwrap();
        assert_eq!(raw, json!({"title": "Crunching", "itemsInQueue": 3, "itemsCompleted": 0}));
    }
}
