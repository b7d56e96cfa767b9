//! Scripted conversations replayed against the loopback transport.

use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use serde_json::Value;

pub const DEMO_SCRIPT: &str = include_str!("../scripts/demo.jsonl");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Power,
    Mute,
    Stop,
    Start,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Action(UserAction),
    Speaking(bool),
    Wait(Duration),
    Transport(Value),
}

/// One JSON object per line; blank lines and `#` comments are skipped.
/// Objects carrying `action`, `speaking` or `wait_ms` drive the console;
/// anything else is pushed to the transport verbatim.
pub fn parse_script(raw: &str) -> anyhow::Result<Vec<ScriptStep>> {
    raw.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            parse_step(line).with_context(|| format!("invalid script line {line_no}"))
        })
        .collect()
}

fn parse_step(line: &str) -> anyhow::Result<ScriptStep> {
    let value: Value = serde_json::from_str(line)?;
    let Some(object) = value.as_object() else {
        bail!("expected a json object");
    };

    if let Some(action) = object.get("action") {
        let action = UserAction::deserialize(action)
            .map_err(|err| anyhow!("unknown action {action}: {err}"))?;
        return Ok(ScriptStep::Action(action));
    }
    if let Some(speaking) = object.get("speaking") {
        let speaking = speaking
            .as_bool()
            .ok_or_else(|| anyhow!("speaking must be a boolean"))?;
        return Ok(ScriptStep::Speaking(speaking));
    }
    if let Some(wait) = object.get("wait_ms") {
        let ms = wait
            .as_u64()
            .ok_or_else(|| anyhow!("wait_ms must be a non-negative integer"))?;
        return Ok(ScriptStep::Wait(Duration::from_millis(ms)));
    }

    Ok(ScriptStep::Transport(value))
}
