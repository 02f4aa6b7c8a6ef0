use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ClientId, WidgetId};

/// Messages the bridge sends to the widget server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "widget-update")]
    WidgetUpdate {
        widget_id: WidgetId,
        property: String,
        value: Value,
    },
    #[serde(rename = "get-widget-states")]
    GetWidgetStates { client_id: ClientId },
}

/// Messages the widget server sends to the bridge.
///
/// Unrecognized `type` tags deserialize as [`ServerMessage::Unknown`] so that
/// newer servers can add message types without breaking older clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "widget-update")]
    WidgetUpdate {
        widget_id: WidgetId,
        property: String,
        value: Value,
    },
    #[serde(rename = "session-error")]
    SessionError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: String,
    },
    #[serde(rename = "init-config")]
    InitConfig {
        #[serde(default)]
        widgets: Vec<String>,
    },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::WidgetUpdate { .. } => "widget-update",
            Self::GetWidgetStates { .. } => "get-widget-states",
        }
    }
}

impl ServerMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::WidgetUpdate { .. } => "widget-update",
            Self::SessionError { .. } => "session-error",
            Self::Error { .. } => "error",
            Self::InitConfig { .. } => "init-config",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_update_wire_shape() {
        let msg = ClientMessage::WidgetUpdate {
            widget_id: WidgetId::new("w1"),
            property: "count".into(),
            value: serde_json::json!(42),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "widget-update");
        assert_eq!(json["widget_id"], "w1");
        assert_eq!(json["property"], "count");
        assert_eq!(json["value"], 42);
    }

    #[test]
    fn get_widget_states_wire_shape() {
        let client_id = ClientId::new();
        let msg = ClientMessage::GetWidgetStates {
            client_id: client_id.clone(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "get-widget-states");
        assert_eq!(json["client_id"], client_id.as_str());
    }

    #[test]
    fn server_widget_update_parses() {
        let raw = r#"{"type":"widget-update","widget_id":"w1","property":"label","value":"hi"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::WidgetUpdate {
                widget_id,
                property,
                value,
            } => {
                assert_eq!(widget_id.as_str(), "w1");
                assert_eq!(property, "label");
                assert_eq!(value, serde_json::json!("hi"));
            }
            other => panic!("expected WidgetUpdate, got {other:?}"),
        }
    }

    #[test]
    fn session_error_message_optional() {
        let raw = r#"{"type":"session-error"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, ServerMessage::SessionError { message: None }));

        let raw = r#"{"type":"session-error","message":"expired"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::SessionError { message: Some(m) } if m == "expired"
        ));
    }

    #[test]
    fn unrecognized_type_is_unknown() {
        let raw = r#"{"type":"totally-new-thing","payload":123}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, ServerMessage::Unknown));
        assert_eq!(msg.message_type(), "unknown");
    }

    #[test]
    fn init_config_tolerates_missing_fields() {
        let raw = r#"{"type":"init-config"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, ServerMessage::InitConfig { widgets } if widgets.is_empty()));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let raw = r#"{"type": "widget-update", "widget_id":"#;
        assert!(serde_json::from_str::<ServerMessage>(raw).is_err());
    }
}
