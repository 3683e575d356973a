//! Calorie and macronutrient calculation.
//!
//! Two basal metabolic estimators are computed side by side (Mifflin–St Jeor
//! and Harris–Benedict), plus a goal-scaled calorie band derived from body
//! weight alone. Macros are anchored on the Mifflin estimate: protein and fat
//! are fixed per kilogram and carbohydrates take whatever calories remain.

use shared::{
    domain::{FormData, Gender, Goal, Results, WeightRange},
    error::DomainError,
};
use thiserror::Error;

const PROTEIN_KCAL_PER_GRAM: f64 = 4.0;
const FAT_KCAL_PER_GRAM: f64 = 9.0;
const CARB_KCAL_PER_GRAM: f64 = 4.0;

#[derive(Debug, Error)]
pub enum CalculationError {
    #[error("invalid calculator input: {0}")]
    InvalidInput(#[from] DomainError),
    #[error("calculation produced a non-finite {field}")]
    NonFinite { field: &'static str },
}

pub fn mifflin_st_jeor(data: &FormData) -> f64 {
    let (weight, height, age) = as_f64(data);
    let base = 10.0 * weight + 6.25 * height - 5.0 * age;
    match data.gender {
        Gender::Male => base + 5.0,
        Gender::Female => base - 161.0,
    }
}

pub fn harris_benedict(data: &FormData) -> f64 {
    let (weight, height, age) = as_f64(data);
    match data.gender {
        Gender::Male => 88.362 + 13.397 * weight + 4.799 * height - 5.677 * age,
        Gender::Female => 447.593 + 9.247 * weight + 3.098 * height - 4.330 * age,
    }
}

pub fn weight_based_range(weight: u32, goal: Goal) -> WeightRange {
    let weight = f64::from(weight);
    let (min_factor, max_factor) = match goal {
        Goal::Lose => (22.0, 25.0),
        Goal::Maintain => (26.0, 30.0),
        Goal::Gain => (30.0, 35.0),
    };
    WeightRange {
        min: min_factor * weight,
        max: max_factor * weight,
    }
}

pub fn protein_grams(weight: u32, goal: Goal) -> f64 {
    let per_kg = match goal {
        Goal::Gain => 2.5,
        Goal::Lose | Goal::Maintain => 1.8,
    };
    per_kg * f64::from(weight)
}

pub fn fat_grams(weight: u32) -> f64 {
    f64::from(weight)
}

pub fn carb_grams(mifflin: f64, protein: f64, fats: f64) -> f64 {
    (mifflin - (protein * PROTEIN_KCAL_PER_GRAM + fats * FAT_KCAL_PER_GRAM)) / CARB_KCAL_PER_GRAM
}

/// Computes every result field from `data` without rounding.
pub fn compute(data: &FormData) -> Results {
    let mifflin = mifflin_st_jeor(data);
    let harris = harris_benedict(data);
    let protein = protein_grams(data.weight, data.goal);
    let fats = fat_grams(data.weight);
    let carbs = carb_grams(mifflin, protein, fats);

    Results {
        mifflin,
        harris,
        weight_based_range: weight_based_range(data.weight, data.goal),
        protein,
        fats,
        carbs,
    }
}

/// [`compute`] guarded against inputs that never went through validation.
pub fn try_compute(data: &FormData) -> Result<Results, CalculationError> {
    data.validate()?;
    let results = compute(data);

    let fields = [
        ("mifflin", results.mifflin),
        ("harris", results.harris),
        ("weight_based_range.min", results.weight_based_range.min),
        ("weight_based_range.max", results.weight_based_range.max),
        ("protein", results.protein),
        ("fats", results.fats),
        ("carbs", results.carbs),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(CalculationError::NonFinite { field });
        }
    }

    Ok(results)
}

/// Rounds to the nearest integer with halves going up, so `-2.5` becomes `-2`.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn as_f64(data: &FormData) -> (f64, f64, f64) {
    (
        f64::from(data.weight),
        f64::from(data.height),
        f64::from(data.age),
    )
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
