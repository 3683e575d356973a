//! User-facing confirmation texts.

use shared::domain::{Gender, Goal, Results};

use crate::{dispatch::CalculatorCommand, engine::round_half_up};

pub const CALCULATION_DONE: &str = "Расчет выполнен!";
pub const CALCULATION_FAILED: &str = "Ошибка при расчете. Проверьте введенные данные.";

fn gender_text(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "мужской",
        Gender::Female => "женский",
    }
}

fn goal_text(goal: Goal) -> &'static str {
    match goal {
        Goal::Lose => "снижение веса",
        Goal::Maintain => "поддержание веса",
        Goal::Gain => "набор массы",
    }
}

/// Confirmation for an applied field edit; `None` for `Calculate`.
pub fn field_confirmation(command: &CalculatorCommand) -> Option<String> {
    let text = match *command {
        CalculatorCommand::SetGender(gender) => {
            format!("Пол установлен: {}", gender_text(gender))
        }
        CalculatorCommand::SetAge(age) => format!("Возраст установлен: {age} лет"),
        CalculatorCommand::SetHeight(height) => format!("Рост установлен: {height} см"),
        CalculatorCommand::SetWeight(weight) => format!("Вес установлен: {weight} кг"),
        CalculatorCommand::SetGoal(goal) => format!("Цель установлена: {}", goal_text(goal)),
        CalculatorCommand::Calculate => return None,
    };
    Some(text)
}

pub fn results_summary(results: &Results) -> String {
    format!(
        "По формуле Миффлина-Сан Жеора: {} ккал/день. Белков: {}г, Жиров: {}г, Углеводов: {}г.",
        round_half_up(results.mifflin),
        round_half_up(results.protein),
        round_half_up(results.fats),
        round_half_up(results.carbs),
    )
}
