use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use calculator_core::{
    engine::round_half_up, AgentConnector, CalculatorCore, MissingAgentConnector, Origin,
    RenderState,
};
use clap::Parser;
use serde_json::json;
use shared::protocol::AssistantAction;
use tracing_subscriber::EnvFilter;

mod config;
mod console_agent;
mod script;

use console_agent::ConsoleAgentConnector;
use script::ScriptLine;

#[derive(Parser, Debug)]
#[command(about = "Daily calorie and macronutrient calculator")]
struct Args {
    /// TOML settings file (defaults to ./calculator.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    age: Option<String>,
    #[arg(long)]
    height: Option<String>,
    #[arg(long)]
    weight: Option<String>,
    #[arg(long)]
    goal: Option<String>,
    /// JSON-lines file of agent events or action envelopes to replay.
    #[arg(long)]
    script: Option<PathBuf>,
    #[arg(long)]
    calculate: bool,
    /// Print the final state as JSON.
    #[arg(long)]
    json: bool,
    #[arg(long)]
    no_agent: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = config::load_settings(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let core = CalculatorCore::new(settings.core_settings());
    let connector: Arc<dyn AgentConnector> = if settings.agent_enabled && !args.no_agent {
        Arc::new(ConsoleAgentConnector)
    } else {
        Arc::new(MissingAgentConnector)
    };
    core.attach_agent(connector).await;

    for (kind, value) in [
        ("set_gender", &args.gender),
        ("set_age", &args.age),
        ("set_height", &args.height),
        ("set_weight", &args.weight),
        ("set_goal", &args.goal),
    ] {
        if let Some(value) = value {
            let payload = match value.trim().parse::<i64>() {
                Ok(number) => json!(number),
                Err(_) => json!(value),
            };
            core.dispatch_from(AssistantAction::new(kind, Some(payload)), Origin::Ui);
        }
    }

    if let Some(path) = &args.script {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read script '{}'", path.display()))?;
        for line in script::parse_script(&source)? {
            match line {
                ScriptLine::Event(event) => core.handle_agent_event(event),
                ScriptLine::Action(action) => core.dispatch(action),
            }
        }
    }

    if args.calculate {
        core.on_calculate();
    }

    let view = core.view();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view);
    }

    core.shutdown();
    Ok(())
}

fn print_view(view: &RenderState) {
    let form = &view.form_data;
    if let Some(message) = &view.feedback_message {
        println!("> {message}");
    }
    println!(
        "Пол: {}, возраст: {}, рост: {} см, вес: {} кг, цель: {}",
        form.gender.as_str(),
        form.age,
        form.height,
        form.weight,
        form.goal.as_str()
    );

    let Some(results) = &view.results else {
        return;
    };
    println!("Суточная норма калорий");
    println!(
        "  По формуле Миффлина-Сан Жеора: {} ккал",
        round_half_up(results.mifflin)
    );
    println!(
        "  По формуле Харриса-Бенедикта: {} ккал",
        round_half_up(results.harris)
    );
    println!(
        "  Рекомендуемый диапазон: {} - {} ккал",
        round_half_up(results.weight_based_range.min),
        round_half_up(results.weight_based_range.max)
    );
    println!("Рекомендуемые макронутриенты");
    println!("  Белки: {} г", round_half_up(results.protein));
    println!("  Жиры: {} г", round_half_up(results.fats));
    println!("  Углеводы: {} г", round_half_up(results.carbs));
}
