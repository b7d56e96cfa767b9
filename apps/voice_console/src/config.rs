use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use assistant_core::ControllerOptions;

pub const DEFAULT_CONFIG_PATH: &str = "voice_console.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub agent_id: String,
    pub start_powered_on: bool,
    pub follow_up_delay_ms: u64,
    pub deny_microphone: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent_id: "local-agent".into(),
            start_powered_on: true,
            follow_up_delay_ms: 1000,
            deny_microphone: false,
        }
    }
}

impl Settings {
    pub fn controller_options(&self) -> ControllerOptions {
        let mut options = ControllerOptions::new(self.agent_id.clone());
        options.follow_up_delay = Duration::from_millis(self.follow_up_delay_ms);
        options
    }
}

/// Defaults, then the config file, then environment overrides. An explicit
/// path must exist; the default path is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let raw = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?,
        ),
        None => fs::read_to_string(DEFAULT_CONFIG_PATH).ok(),
    };
    if let Some(raw) = raw {
        apply_file_settings(&mut settings, &raw)?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file_settings(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let table = raw
        .parse::<toml::Table>()
        .context("config file is not valid toml")?;

    if let Some(value) = table.get("agent_id") {
        match value.as_str() {
            Some(agent_id) => settings.agent_id = agent_id.to_string(),
            None => bail!("agent_id must be a string"),
        }
    }
    if let Some(value) = table.get("start_powered_on") {
        match value.as_bool() {
            Some(flag) => settings.start_powered_on = flag,
            None => bail!("start_powered_on must be a boolean"),
        }
    }
    if let Some(value) = table.get("follow_up_delay_ms") {
        match value.as_integer().and_then(|ms| u64::try_from(ms).ok()) {
            Some(ms) => settings.follow_up_delay_ms = ms,
            None => bail!("follow_up_delay_ms must be a non-negative integer"),
        }
    }
    if let Some(value) = table.get("deny_microphone") {
        match value.as_bool() {
            Some(flag) => settings.deny_microphone = flag,
            None => bail!("deny_microphone must be a boolean"),
        }
    }

    Ok(())
}

fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("AGENT_ID") {
        settings.agent_id = v;
    }
    if let Some(v) = lookup("APP__AGENT_ID") {
        settings.agent_id = v;
    }

    if let Some(v) = lookup("APP__START_POWERED_ON") {
        settings.start_powered_on = parse_flag("APP__START_POWERED_ON", &v)?;
    }

    if let Some(v) = lookup("APP__FOLLOW_UP_DELAY_MS") {
        settings.follow_up_delay_ms = v
            .trim()
            .parse()
            .with_context(|| format!("APP__FOLLOW_UP_DELAY_MS is not a number: '{v}'"))?;
    }

    if let Some(v) = lookup("APP__DENY_MICROPHONE") {
        settings.deny_microphone = parse_flag("APP__DENY_MICROPHONE", &v)?;
    }

    Ok(())
}

fn parse_flag(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got '{other}'"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
