//! Validation of inbound action envelopes into typed calculator commands.

use serde_json::Value;
use shared::{
    domain::{check_range, Field, Gender, Goal},
    protocol::AssistantAction,
};

pub const SET_GENDER: &str = "set_gender";
pub const SET_AGE: &str = "set_age";
pub const SET_HEIGHT: &str = "set_height";
pub const SET_WEIGHT: &str = "set_weight";
pub const SET_GOAL: &str = "set_goal";
pub const CALCULATE: &str = "calculate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculatorCommand {
    SetGender(Gender),
    SetAge(u32),
    SetHeight(u32),
    SetWeight(u32),
    SetGoal(Goal),
    Calculate,
}

impl CalculatorCommand {
    pub fn name(&self) -> &'static str {
        match self {
            CalculatorCommand::SetGender(_) => SET_GENDER,
            CalculatorCommand::SetAge(_) => SET_AGE,
            CalculatorCommand::SetHeight(_) => SET_HEIGHT,
            CalculatorCommand::SetWeight(_) => SET_WEIGHT,
            CalculatorCommand::SetGoal(_) => SET_GOAL,
            CalculatorCommand::Calculate => CALCULATE,
        }
    }

    pub fn field(&self) -> Option<Field> {
        match self {
            CalculatorCommand::SetGender(_) => Some(Field::Gender),
            CalculatorCommand::SetAge(_) => Some(Field::Age),
            CalculatorCommand::SetHeight(_) => Some(Field::Height),
            CalculatorCommand::SetWeight(_) => Some(Field::Weight),
            CalculatorCommand::SetGoal(_) => Some(Field::Goal),
            CalculatorCommand::Calculate => None,
        }
    }

    /// Re-checks a typed command against the field ranges; typed commands can
    /// be built directly by a UI adapter and skip envelope parsing.
    pub fn is_valid(&self) -> bool {
        match *self {
            CalculatorCommand::SetAge(value) => check_range(Field::Age, value).is_ok(),
            CalculatorCommand::SetHeight(value) => check_range(Field::Height, value).is_ok(),
            CalculatorCommand::SetWeight(value) => check_range(Field::Weight, value).is_ok(),
            CalculatorCommand::SetGender(_)
            | CalculatorCommand::SetGoal(_)
            | CalculatorCommand::Calculate => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedAction {
    Command(CalculatorCommand),
    /// Known action type whose payload is malformed or out of range.
    Rejected { kind: &'static str },
    Unknown(String),
}

pub fn parse_action(action: &AssistantAction) -> ParsedAction {
    let payload = action.payload.as_ref();
    let parsed = match action.kind.as_str() {
        SET_GENDER => (
            SET_GENDER,
            enum_payload::<Gender>(payload).map(CalculatorCommand::SetGender),
        ),
        SET_AGE => (
            SET_AGE,
            numeric_payload(Field::Age, payload).map(CalculatorCommand::SetAge),
        ),
        SET_HEIGHT => (
            SET_HEIGHT,
            numeric_payload(Field::Height, payload).map(CalculatorCommand::SetHeight),
        ),
        SET_WEIGHT => (
            SET_WEIGHT,
            numeric_payload(Field::Weight, payload).map(CalculatorCommand::SetWeight),
        ),
        SET_GOAL => (
            SET_GOAL,
            enum_payload::<Goal>(payload).map(CalculatorCommand::SetGoal),
        ),
        CALCULATE => (CALCULATE, Some(CalculatorCommand::Calculate)),
        other => return ParsedAction::Unknown(other.to_string()),
    };

    match parsed {
        (_, Some(command)) => ParsedAction::Command(command),
        (kind, None) => ParsedAction::Rejected { kind },
    }
}

fn enum_payload<T: std::str::FromStr>(payload: Option<&Value>) -> Option<T> {
    payload?.as_str()?.parse().ok()
}

fn numeric_payload(field: Field, payload: Option<&Value>) -> Option<u32> {
    let value = match payload? {
        Value::Number(number) => integral_number(number)?,
        Value::String(text) => text.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    let value = u32::try_from(value).ok()?;
    check_range(field, value).ok()
}

fn integral_number(number: &serde_json::Number) -> Option<i64> {
    if let Some(value) = number.as_i64() {
        return Some(value);
    }
    let value = number.as_f64()?;
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(kind: &str, payload: Value) -> ParsedAction {
        parse_action(&AssistantAction::new(kind, Some(payload)))
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        assert_eq!(
            parse(SET_AGE, json!(30)),
            ParsedAction::Command(CalculatorCommand::SetAge(30))
        );
        assert_eq!(
            parse(SET_HEIGHT, json!(" 182 ")),
            ParsedAction::Command(CalculatorCommand::SetHeight(182))
        );
        assert_eq!(
            parse(SET_WEIGHT, json!(70.0)),
            ParsedAction::Command(CalculatorCommand::SetWeight(70))
        );
    }

    #[test]
    fn rejects_malformed_numeric_payloads() {
        for payload in [
            json!("abc"),
            json!(150),
            json!(0),
            json!(-5),
            json!(70.5),
            json!(true),
            json!(null),
            json!([30]),
        ] {
            assert_eq!(
                parse(SET_AGE, payload.clone()),
                ParsedAction::Rejected { kind: SET_AGE },
                "payload {payload} must be rejected"
            );
        }
        assert_eq!(
            parse_action(&AssistantAction::bare(SET_WEIGHT)),
            ParsedAction::Rejected { kind: SET_WEIGHT }
        );
    }

    #[test]
    fn range_edges_follow_inclusive_bounds() {
        assert!(matches!(parse(SET_AGE, json!(120)), ParsedAction::Command(_)));
        assert!(matches!(parse(SET_HEIGHT, json!(50)), ParsedAction::Command(_)));
        assert!(matches!(parse(SET_HEIGHT, json!(250)), ParsedAction::Command(_)));
        assert!(matches!(parse(SET_WEIGHT, json!(20)), ParsedAction::Command(_)));
        assert!(matches!(parse(SET_WEIGHT, json!(301)), ParsedAction::Rejected { .. }));
    }

    #[test]
    fn enum_payloads_must_match_exactly() {
        assert_eq!(
            parse(SET_GENDER, json!("female")),
            ParsedAction::Command(CalculatorCommand::SetGender(Gender::Female))
        );
        assert_eq!(
            parse(SET_GOAL, json!("lose")),
            ParsedAction::Command(CalculatorCommand::SetGoal(Goal::Lose))
        );
        assert_eq!(
            parse(SET_GENDER, json!("MALE")),
            ParsedAction::Rejected { kind: SET_GENDER }
        );
        assert_eq!(
            parse(SET_GOAL, json!(1)),
            ParsedAction::Rejected { kind: SET_GOAL }
        );
    }

    #[test]
    fn calculate_ignores_payload_and_unknown_types_are_reported() {
        assert_eq!(
            parse(CALCULATE, json!("anything")),
            ParsedAction::Command(CalculatorCommand::Calculate)
        );
        assert_eq!(
            parse("set_mood", json!("happy")),
            ParsedAction::Unknown("set_mood".to_string())
        );
    }

    #[test]
    fn typed_commands_are_range_checked() {
        assert!(CalculatorCommand::SetAge(120).is_valid());
        assert!(!CalculatorCommand::SetAge(0).is_valid());
        assert!(!CalculatorCommand::SetHeight(49).is_valid());
        assert!(CalculatorCommand::Calculate.is_valid());
    }
}
