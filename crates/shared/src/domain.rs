use std::{fmt, ops::RangeInclusive, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

pub const AGE_RANGE: RangeInclusive<u32> = 1..=120;
pub const HEIGHT_RANGE: RangeInclusive<u32> = 50..=250;
pub const WEIGHT_RANGE: RangeInclusive<u32> = 20..=300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Gender,
    Age,
    Height,
    Weight,
    Goal,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Gender => "gender",
            Field::Age => "age",
            Field::Height => "height",
            Field::Weight => "weight",
            Field::Goal => "goal",
        }
    }

    /// Inclusive bounds for the numeric fields, `None` for the enum ones.
    pub fn numeric_range(self) -> Option<RangeInclusive<u32>> {
        match self {
            Field::Age => Some(AGE_RANGE),
            Field::Height => Some(HEIGHT_RANGE),
            Field::Weight => Some(WEIGHT_RANGE),
            Field::Gender | Field::Goal => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl FromStr for Gender {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(DomainError::UnknownVariant {
                field: Field::Gender,
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Lose,
    #[default]
    Maintain,
    Gain,
}

impl Goal {
    pub fn as_str(self) -> &'static str {
        match self {
            Goal::Lose => "lose",
            Goal::Maintain => "maintain",
            Goal::Gain => "gain",
        }
    }
}

impl FromStr for Goal {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "lose" => Ok(Goal::Lose),
            "maintain" => Ok(Goal::Maintain),
            "gain" => Ok(Goal::Gain),
            other => Err(DomainError::UnknownVariant {
                field: Field::Goal,
                value: other.to_string(),
            }),
        }
    }
}

/// Anthropometric inputs of the calculator form. Heights are centimeters,
/// weights kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    pub gender: Gender,
    pub age: u32,
    pub height: u32,
    pub weight: u32,
    pub goal: Goal,
}

impl Default for FormData {
    fn default() -> Self {
        Self {
            gender: Gender::Male,
            age: 25,
            height: 170,
            weight: 70,
            goal: Goal::Maintain,
        }
    }
}

impl FormData {
    pub fn validate(&self) -> Result<(), DomainError> {
        check_range(Field::Age, self.age)?;
        check_range(Field::Height, self.height)?;
        check_range(Field::Weight, self.weight)?;
        Ok(())
    }
}

pub fn check_range(field: Field, value: u32) -> Result<u32, DomainError> {
    let Some(range) = field.numeric_range() else {
        return Ok(value);
    };
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(DomainError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightRange {
    pub min: f64,
    pub max: f64,
}

/// Derived calorie and macronutrient targets. Values are kept at full
/// precision; rounding happens only when presenting them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Results {
    pub mifflin: f64,
    pub harris: f64,
    #[serde(alias = "weightBased")]
    pub weight_based_range: WeightRange,
    pub protein: f64,
    pub fats: f64,
    pub carbs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_form_matches_initial_screen() {
        let form = FormData::default();
        assert_eq!(form.gender, Gender::Male);
        assert_eq!((form.age, form.height, form.weight), (25, 170, 70));
        assert_eq!(form.goal, Goal::Maintain);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        assert!(check_range(Field::Age, 120).is_ok());
        assert!(check_range(Field::Age, 0).is_err());
        assert!(check_range(Field::Height, 50).is_ok());
        assert!(check_range(Field::Height, 251).is_err());
        assert!(check_range(Field::Weight, 20).is_ok());
        assert!(check_range(Field::Weight, 300).is_ok());
        assert!(check_range(Field::Weight, 19).is_err());
    }

    #[test]
    fn enum_parsing_is_exact() {
        assert_eq!("female".parse::<Gender>().ok(), Some(Gender::Female));
        assert!("Female".parse::<Gender>().is_err());
        assert_eq!("gain".parse::<Goal>().ok(), Some(Goal::Gain));
        assert!("bulk".parse::<Goal>().is_err());
    }

    #[test]
    fn form_data_uses_lowercase_wire_values() {
        let json = serde_json::to_value(FormData::default()).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "gender": "male",
                "age": 25,
                "height": 170,
                "weight": 70,
                "goal": "maintain"
            })
        );
    }

    #[test]
    fn results_accept_legacy_weight_based_key() {
        let results: Results = serde_json::from_value(serde_json::json!({
            "mifflin": 1.0,
            "harris": 2.0,
            "weightBased": { "min": 3.0, "max": 4.0 },
            "protein": 5.0,
            "fats": 6.0,
            "carbs": 7.0
        }))
        .expect("deserialize");
        assert_eq!(results.weight_based_range.max, 4.0);

        let json = serde_json::to_value(results).expect("serialize");
        assert!(json.get("weightBasedRange").is_some());
    }
}
