use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{FormData, Results};

pub const ACTION_FEEDBACK: &str = "feedback";
pub const ACTION_RESULTS: &str = "results";
pub const ACTION_CALCULATION_COMPLETE: &str = "calculation_complete";
pub const ACTION_CALCULATION_ERROR: &str = "calculation_error";

/// Inbound command envelope, shared by the agent runtime and UI adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl AssistantAction {
    pub fn new(kind: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, None)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculatorState {
    #[serde(rename = "formData")]
    pub form_data: FormData,
    pub results: Option<Results>,
}

/// State snapshot handed to the agent runtime on request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantAppState {
    pub calculator_state: CalculatorState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameters {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAction {
    pub action_id: String,
    pub parameters: ActionParameters,
}

/// Outbound confirmation relayed to the agent runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantSendData {
    pub action: SendAction,
}

impl AssistantSendData {
    pub fn value(action_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action: SendAction {
                action_id: action_id.into(),
                parameters: ActionParameters {
                    value: value.into(),
                },
            },
        }
    }

    pub fn action_id(&self) -> &str {
        &self.action.action_id
    }

    pub fn text(&self) -> &str {
        &self.action.parameters.value
    }
}

/// Advisory data delivered back for an outbound send.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAssistantEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    action: Option<AssistantAction>,
    #[serde(default)]
    character: Option<Value>,
    #[serde(default)]
    insets: Option<Value>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// Notifications pushed by the external conversational runtime.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawAssistantEvent")]
pub enum AssistantEvent {
    Character {
        character_id: Option<String>,
    },
    Insets {
        insets: Value,
    },
    Start {
        payload: Value,
    },
    Command {
        detail: Value,
        action: Option<AssistantAction>,
    },
    Error {
        detail: Value,
    },
    Data {
        kind: String,
        action: Option<AssistantAction>,
    },
}

impl AssistantEvent {
    pub fn data(action: AssistantAction) -> Self {
        AssistantEvent::Data {
            kind: "smart_app_data".to_string(),
            action: Some(action),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            AssistantEvent::Character { .. } => "character",
            AssistantEvent::Insets { .. } => "insets",
            AssistantEvent::Start { .. } => "start",
            AssistantEvent::Command { .. } => "command",
            AssistantEvent::Error { .. } => "error",
            AssistantEvent::Data { kind, .. } => kind,
        }
    }

    /// The embedded action, if the event carries one.
    pub fn action(&self) -> Option<&AssistantAction> {
        match self {
            AssistantEvent::Command { action, .. } | AssistantEvent::Data { action, .. } => {
                action.as_ref()
            }
            _ => None,
        }
    }
}

impl From<RawAssistantEvent> for AssistantEvent {
    fn from(raw: RawAssistantEvent) -> Self {
        match raw.kind.as_str() {
            "character" => AssistantEvent::Character {
                character_id: raw
                    .character
                    .as_ref()
                    .and_then(|character| character.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            "insets" => AssistantEvent::Insets {
                insets: raw.insets.unwrap_or(Value::Null),
            },
            "start" => AssistantEvent::Start {
                payload: raw.payload.unwrap_or(Value::Null),
            },
            "command" => AssistantEvent::Command {
                detail: detail_of(raw.payload, raw.rest),
                action: raw.action,
            },
            "error" => AssistantEvent::Error {
                detail: detail_of(raw.payload, raw.rest),
            },
            _ => AssistantEvent::Data {
                kind: raw.kind,
                action: raw.action,
            },
        }
    }
}

fn detail_of(payload: Option<Value>, rest: Map<String, Value>) -> Value {
    match payload {
        Some(payload) => payload,
        None => Value::Object(rest),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn snapshot_uses_agent_facing_keys() {
        let json = serde_json::to_value(AssistantAppState::default()).expect("serialize");
        assert_eq!(json["calculator_state"]["formData"]["age"], json!(25));
        assert_eq!(json["calculator_state"]["results"], Value::Null);
    }

    #[test]
    fn send_data_wraps_value_in_parameters() {
        let data = AssistantSendData::value(ACTION_FEEDBACK, "hello");
        assert_eq!(
            serde_json::to_value(&data).expect("serialize"),
            json!({ "action": { "action_id": "feedback", "parameters": { "value": "hello" } } })
        );
    }

    #[test]
    fn data_event_exposes_embedded_action() {
        let event: AssistantEvent = serde_json::from_value(json!({
            "type": "smart_app_data",
            "action": { "type": "set_age", "payload": 30 }
        }))
        .expect("deserialize");
        let action = event.action().expect("action");
        assert_eq!(action.kind, "set_age");
        assert_eq!(action.payload, Some(json!(30)));
        assert_eq!(event.kind(), "smart_app_data");
    }

    #[test]
    fn character_and_insets_events_carry_no_action() {
        let character: AssistantEvent =
            serde_json::from_value(json!({ "type": "character", "character": { "id": "sber" } }))
                .expect("deserialize");
        assert_eq!(
            character,
            AssistantEvent::Character {
                character_id: Some("sber".to_string())
            }
        );
        assert!(character.action().is_none());

        let insets: AssistantEvent =
            serde_json::from_value(json!({ "type": "insets", "insets": { "top": 0 } }))
                .expect("deserialize");
        assert!(insets.action().is_none());
    }

    #[test]
    fn command_event_keeps_unrecognized_fields_as_detail() {
        let event: AssistantEvent = serde_json::from_value(json!({
            "type": "command",
            "command": "close_app"
        }))
        .expect("deserialize");
        match event {
            AssistantEvent::Command { detail, action } => {
                assert_eq!(detail["command"], json!("close_app"));
                assert!(action.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
