//! JSON-lines command scripts replayed against the calculator.
//!
//! Each non-empty line is either an agent runtime event (it carries an
//! `action` object or one of the runtime's own event types) or a bare
//! `{type, payload}` action envelope. Lines starting with `#` are comments.

use anyhow::{Context, Result};
use serde_json::Value;
use shared::protocol::{AssistantAction, AssistantEvent};

const RUNTIME_EVENT_TYPES: [&str; 5] = ["character", "insets", "start", "command", "error"];

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptLine {
    Event(AssistantEvent),
    Action(AssistantAction),
}

pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            parse_line(line).with_context(|| format!("script line {}", index + 1))
        })
        .collect()
}

pub fn parse_line(line: &str) -> Result<ScriptLine> {
    let value: Value = serde_json::from_str(line.trim())?;
    let is_event = value.get("action").is_some()
        || value
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|kind| RUNTIME_EVENT_TYPES.contains(&kind));

    if is_event {
        Ok(ScriptLine::Event(serde_json::from_value(value)?))
    } else {
        Ok(ScriptLine::Action(serde_json::from_value(value)?))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_envelopes_and_runtime_events_are_told_apart() {
        let script = r#"
# set up a profile
{"type": "set_age", "payload": 30}
{"type": "smart_app_data", "action": {"type": "set_goal", "payload": "gain"}}
{"type": "character", "character": {"id": "eva"}}

{"type": "calculate"}
"#;
        let lines = parse_script(script).expect("parse");
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            ScriptLine::Action(AssistantAction::new("set_age", Some(json!(30))))
        );
        match &lines[1] {
            ScriptLine::Event(event) => {
                assert_eq!(event.action().map(|a| a.kind.as_str()), Some("set_goal"));
            }
            other => panic!("unexpected line: {other:?}"),
        }
        assert!(matches!(lines[2], ScriptLine::Event(AssistantEvent::Character { .. })));
        assert_eq!(lines[3], ScriptLine::Action(AssistantAction::bare("calculate")));
    }

    #[test]
    fn invalid_json_reports_line_number() {
        let err = parse_script("{\"type\": \"calculate\"}\nnot json\n").expect_err("must fail");
        assert!(format!("{err:#}").contains("script line 2"));
    }
}
