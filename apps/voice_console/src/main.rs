mod config;
mod script;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use assistant_core::{
    ControllerEvent, EmotionPicker, FixedEmotion, RandomEmotionPicker, SessionController,
};
use clap::Parser;
use shared::domain::Emotion;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voice_transport::{LoopbackTransport, StaticMicrophone};

use crate::script::{parse_script, ScriptStep, UserAction, DEMO_SCRIPT};

const SETTLE_DELAY: Duration = Duration::from_millis(20);

/// Replays a scripted conversation through the session controller and prints
/// every projected view as JSON.
#[derive(Parser, Debug)]
struct Args {
    /// JSON-lines script; the bundled demo runs when omitted.
    #[arg(long)]
    script: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "info")]
    log_filter: String,
    #[arg(long)]
    agent_id: Option<String>,
    /// Pin the assistant's mood instead of drawing one per turn.
    #[arg(long, value_parser = parse_emotion)]
    emotion: Option<Emotion>,
}

fn parse_emotion(raw: &str) -> Result<Emotion, String> {
    raw.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(agent_id) = args.agent_id {
        settings.agent_id = agent_id;
    }

    let raw_script = match &args.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script '{}'", path.display()))?,
        None => DEMO_SCRIPT.to_string(),
    };
    let steps = parse_script(&raw_script)?;

    let transport = LoopbackTransport::new();
    let microphone = Arc::new(StaticMicrophone {
        granted: !settings.deny_microphone,
    });
    let emotions: Arc<dyn EmotionPicker> = match args.emotion {
        Some(emotion) => Arc::new(FixedEmotion(emotion)),
        None => Arc::new(RandomEmotionPicker),
    };
    let controller = SessionController::new_with_dependencies(
        transport.clone(),
        microphone,
        emotions,
        settings.controller_options(),
    );

    let pump = controller.spawn_event_pump();
    let printer = spawn_view_printer(Arc::clone(&controller));

    info!(
        agent_id = %settings.agent_id,
        steps = steps.len(),
        "voice_console: replaying script"
    );

    if settings.start_powered_on {
        controller.power_on().await;
    }

    for step in steps {
        match step {
            ScriptStep::Action(UserAction::Power) => controller.toggle_power().await,
            ScriptStep::Action(UserAction::Mute) => controller.toggle_mute().await,
            ScriptStep::Action(UserAction::Stop) => controller.stop_session().await,
            ScriptStep::Action(UserAction::Start) => controller.start_session().await,
            ScriptStep::Speaking(speaking) => {
                transport.set_speaking(speaking);
                controller.transport_activity_changed();
            }
            ScriptStep::Wait(duration) => tokio::time::sleep(duration).await,
            ScriptStep::Transport(payload) => transport.inject(payload),
        }
        tokio::time::sleep(SETTLE_DELAY).await;
    }

    for turn in controller.history().await {
        println!("{}", serde_json::to_string(&turn)?);
    }

    pump.abort();
    printer.abort();
    Ok(())
}

fn spawn_view_printer(controller: Arc<SessionController>) -> tokio::task::JoinHandle<()> {
    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        let mut last_printed = String::new();
        loop {
            match events.recv().await {
                Ok(ControllerEvent::StateChanged) => {
                    let view = controller.view_model().await;
                    match serde_json::to_string(&view) {
                        Ok(encoded) if encoded != last_printed => {
                            println!("{encoded}");
                            last_printed = encoded;
                        }
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "voice_console: view encode failed"),
                    }
                }
                Ok(ControllerEvent::TurnCommitted(turn)) => {
                    info!(speaker = ?turn.speaker, text = %turn.text, "voice_console: turn");
                }
                Ok(ControllerEvent::ErrorReported(message)) => {
                    warn!(%message, "voice_console: assistant error");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "voice_console: view events lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
