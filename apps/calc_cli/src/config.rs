use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use calculator_core::CoreSettings;
use serde::Deserialize;
use shared::protocol::ACTION_RESULTS;

pub const DEFAULT_CONFIG_FILE: &str = "calculator.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feedback_ttl_ms: u64,
    pub results_action_id: String,
    pub log_level: Option<String>,
    pub dev_mode: bool,
    pub agent_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feedback_ttl_ms: 3000,
            results_action_id: ACTION_RESULTS.to_string(),
            log_level: None,
            dev_mode: false,
            agent_enabled: true,
        }
    }
}

impl Settings {
    pub fn core_settings(&self) -> CoreSettings {
        CoreSettings {
            feedback_ttl: Duration::from_millis(self.feedback_ttl_ms),
            results_action_id: self.results_action_id.clone(),
        }
    }

    /// Explicit level first, otherwise verbose in development and quiet in
    /// production.
    pub fn log_filter(&self) -> String {
        match &self.log_level {
            Some(level) => level.clone(),
            None if self.dev_mode => "debug".to_string(),
            None => "error".to_string(),
        }
    }
}

/// Defaults, then the TOML file, then `APP__*` environment variables.
/// A missing default file is fine; a missing explicit file is an error.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            parse_settings(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?
        }
        None => match fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(raw) => parse_settings(&raw)
                .with_context(|| format!("invalid config file '{DEFAULT_CONFIG_FILE}'"))?,
            Err(_) => Settings::default(),
        },
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str::<Settings>(raw)?)
}

pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("APP__FEEDBACK_TTL_MS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.feedback_ttl_ms = parsed;
        }
    }
    if let Some(v) = lookup("APP__RESULTS_ACTION_ID") {
        if !v.trim().is_empty() {
            settings.results_action_id = v.trim().to_string();
        }
    }
    if let Some(v) = lookup("APP__LOG_LEVEL") {
        settings.log_level = Some(v);
    }
    if let Some(v) = lookup("APP__DEV_MODE") {
        if let Some(flag) = parse_flag(&v) {
            settings.dev_mode = flag;
        }
    }
    if let Some(v) = lookup("APP__AGENT_ENABLED") {
        if let Some(flag) = parse_flag(&v) {
            settings.agent_enabled = flag;
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
