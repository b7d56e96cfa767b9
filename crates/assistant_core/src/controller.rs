//! Session lifecycle, protocol dispatch and control actions.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use shared::{
    domain::{ConnectionState, TransportStatus, Turn},
    error::{AssistantError, TransportFault},
    protocol::{SessionParams, TransportEvent, TransportSignal},
};
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use voice_transport::{ConversationTransport, MicrophoneAccess};

use crate::{
    emotion::{EmotionPicker, RandomEmotionPicker},
    history::{ChatHistory, StreamingBuffer},
    projector::{project, ViewModel},
};

const DEFAULT_FOLLOW_UP_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captions {
    pub idle: String,
    pub listening: String,
    pub follow_up: String,
    pub ended: String,
}

impl Default for Captions {
    fn default() -> Self {
        Self {
            idle: "Ask me anything...".into(),
            listening: "Listening...".into(),
            follow_up: "What else can I help you with?".into(),
            ended: "Conversation ended".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub session_params: SessionParams,
    pub follow_up_delay: Duration,
    pub captions: Captions,
}

impl ControllerOptions {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            session_params: SessionParams {
                agent_id: agent_id.into(),
            },
            follow_up_delay: DEFAULT_FOLLOW_UP_DELAY,
            captions: Captions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub connection_state: ConnectionState,
    pub powered_on: bool,
    pub muted: bool,
    pub subtitle: String,
    pub last_user_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session: Session,
    pub history: ChatHistory,
    pub buffer: Option<StreamingBuffer>,
    pub transport_speaking: bool,
    pub transport_status: TransportStatus,
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StateChanged,
    TurnCommitted(Turn),
    ErrorReported(String),
}

#[derive(Default)]
struct ControllerState {
    session: Session,
    history: ChatHistory,
    buffer: Option<StreamingBuffer>,
    subtitle_generation: u64,
    // power-on edge seen while a stop was still in flight
    pending_start: bool,
}

impl ControllerState {
    fn set_subtitle(&mut self, text: impl Into<String>) {
        self.session.subtitle = text.into();
        self.subtitle_generation += 1;
    }

    fn settle_disconnected(&mut self, ended_caption: &str) {
        self.session.connection_state = ConnectionState::Disconnected;
        self.session.muted = false;
        if let Some(buffer) = self.buffer.take() {
            debug!(
                discarded_chars = buffer.text().len(),
                "assistant: discarded unfinished response"
            );
        }
        self.set_subtitle(ended_caption);
    }
}

pub struct SessionController {
    transport: Arc<dyn ConversationTransport>,
    microphone: Arc<dyn MicrophoneAccess>,
    emotions: Arc<dyn EmotionPicker>,
    options: ControllerOptions,
    inner: Arc<Mutex<ControllerState>>,
    events: broadcast::Sender<ControllerEvent>,
}

impl SessionController {
    pub fn new(
        transport: Arc<dyn ConversationTransport>,
        microphone: Arc<dyn MicrophoneAccess>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        Self::new_with_dependencies(
            transport,
            microphone,
            Arc::new(RandomEmotionPicker),
            options,
        )
    }

    pub fn new_with_dependencies(
        transport: Arc<dyn ConversationTransport>,
        microphone: Arc<dyn MicrophoneAccess>,
        emotions: Arc<dyn EmotionPicker>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            transport,
            microphone,
            emotions,
            options,
            inner: Arc::new(Mutex::new(ControllerState::default())),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    fn state_changed(&self) {
        self.emit(ControllerEvent::StateChanged);
    }

    // speaking is read from the transport at snapshot time
    pub fn transport_activity_changed(&self) {
        debug!(
            speaking = self.transport.is_speaking(),
            "assistant: transport activity changed"
        );
        self.state_changed();
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock().await;
        SessionSnapshot {
            session: state.session.clone(),
            history: state.history.clone(),
            buffer: state.buffer.clone(),
            transport_speaking: self.transport.is_speaking(),
            transport_status: self.transport.status(),
        }
    }

    pub async fn view_model(&self) -> ViewModel {
        project(&self.snapshot().await)
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.lock().await.session.connection_state
    }

    pub async fn history(&self) -> Vec<Turn> {
        self.inner.lock().await.history.turns().to_vec()
    }

    pub async fn power_on(&self) {
        let should_start = {
            let mut state = self.inner.lock().await;
            if state.session.powered_on {
                debug!("assistant: power on ignored, already powered");
                return;
            }
            state.session.powered_on = true;
            match state.session.connection_state {
                ConnectionState::Disconnecting => {
                    state.pending_start = true;
                    false
                }
                current => !current.is_live(),
            }
        };
        info!("assistant: powered on");
        self.state_changed();

        if should_start {
            self.start_session().await;
        }
    }

    pub async fn power_off(&self) {
        let should_stop = {
            let mut state = self.inner.lock().await;
            if !state.session.powered_on {
                debug!("assistant: power off ignored, already off");
                return;
            }
            state.session.powered_on = false;
            state.pending_start = false;
            if let Some(buffer) = state.buffer.take() {
                debug!(
                    discarded_chars = buffer.text().len(),
                    "assistant: discarded unfinished response on power off"
                );
            }
            state.session.connection_state.is_live()
        };
        info!("assistant: powered off");
        self.state_changed();

        if should_stop {
            self.stop_session().await;
        }
    }

    pub async fn toggle_power(&self) {
        let powered_on = self.inner.lock().await.session.powered_on;
        if powered_on {
            self.power_off().await;
        } else {
            self.power_on().await;
        }
    }

    pub async fn start_session(&self) {
        let origin = {
            let mut state = self.inner.lock().await;
            if !state.session.powered_on {
                debug!("assistant: start ignored while powered off");
                return;
            }
            let origin = state.session.connection_state;
            if !origin.can_start() {
                debug!(state = ?origin, "assistant: start ignored, session busy");
                return;
            }
            state.session.connection_state = ConnectionState::Connecting;
            origin
        };
        info!(
            agent_id = %self.options.session_params.agent_id,
            "assistant: connecting"
        );
        self.state_changed();

        if let Err(err) = self.microphone.request_access().await {
            warn!(error = %err, "assistant: microphone access failed");
            self.abort_start(origin, AssistantError::PermissionDenied)
                .await;
            return;
        }

        if !self.still_connecting().await {
            info!("assistant: start cancelled before the transport opened");
            return;
        }

        match self
            .transport
            .start_session(self.options.session_params.clone())
            .await
        {
            Ok(()) => self.confirm_connected().await,
            Err(err) => {
                warn!(error = %err, "assistant: transport connect failed");
                self.abort_start(origin, AssistantError::TransportConnect(err.to_string()))
                    .await;
            }
        }
    }

    async fn still_connecting(&self) -> bool {
        let state = self.inner.lock().await;
        state.session.powered_on && state.session.connection_state == ConnectionState::Connecting
    }

    async fn abort_start(&self, origin: ConnectionState, error: AssistantError) {
        {
            let mut state = self.inner.lock().await;
            if state.session.connection_state == ConnectionState::Connecting {
                state.session.connection_state = origin;
            }
        }
        self.handle_transport_error(error).await;
    }

    /// A confirmation nobody is waiting for tears the session down again.
    async fn confirm_connected(&self) {
        let orphaned = {
            let mut state = self.inner.lock().await;
            match state.session.connection_state {
                ConnectionState::Connected if state.session.powered_on => {
                    debug!("assistant: connection re-confirmed");
                    return;
                }
                ConnectionState::Connecting if state.session.powered_on => {
                    state.session.connection_state = ConnectionState::Connected;
                    let idle = self.options.captions.idle.clone();
                    state.set_subtitle(idle);
                    false
                }
                _ => true,
            }
        };

        if orphaned {
            self.teardown_orphan().await;
        } else {
            info!("assistant: connected");
            self.state_changed();
        }
    }

    async fn teardown_orphan(&self) {
        info!("assistant: tearing down a connection nobody asked for");
        if let Err(err) = self.transport.end_session().await {
            warn!(error = %err, "assistant: orphan teardown failed");
        }
        {
            let mut state = self.inner.lock().await;
            state.settle_disconnected(&self.options.captions.ended);
        }
        self.state_changed();
    }

    pub async fn stop_session(&self) {
        {
            let mut state = self.inner.lock().await;
            if !state.session.connection_state.is_live() {
                debug!(
                    state = ?state.session.connection_state,
                    "assistant: stop ignored, no live session"
                );
                return;
            }
            state.session.connection_state = ConnectionState::Disconnecting;
        }
        info!("assistant: disconnecting");
        self.state_changed();

        let result = self.transport.end_session().await;
        let restart = {
            let mut state = self.inner.lock().await;
            state.settle_disconnected(&self.options.captions.ended);
            std::mem::take(&mut state.pending_start) && state.session.powered_on
        };
        info!("assistant: disconnected");
        self.state_changed();

        if let Err(err) = result {
            warn!(error = %err, "assistant: transport teardown failed");
            self.handle_transport_error(AssistantError::TransportTeardown(err.to_string()))
                .await;
        }

        if restart {
            info!("assistant: powered on during disconnect, reconnecting");
            self.start_session().await;
        }
    }

    pub async fn toggle_mute(&self) {
        let target = {
            let state = self.inner.lock().await;
            if state.session.connection_state != ConnectionState::Connected {
                debug!(
                    state = ?state.session.connection_state,
                    "assistant: mute ignored, not connected"
                );
                return;
            }
            !state.session.muted
        };

        let level = if target { 0.0 } else { 1.0 };
        if let Err(err) = self.transport.set_volume(level).await {
            warn!(error = %err, level, "assistant: volume change failed");
            self.handle_transport_error(AssistantError::TransportRuntime(err.to_string()))
                .await;
            return;
        }

        {
            let mut state = self.inner.lock().await;
            if state.session.connection_state != ConnectionState::Connected {
                return;
            }
            state.session.muted = target;
        }
        info!(muted = target, "assistant: output volume changed");
        self.state_changed();
    }

    pub async fn handle_transport_error(&self, error: impl Into<TransportFault>) {
        let message = error.into().normalized_message();
        {
            let mut state = self.inner.lock().await;
            state.set_subtitle(format!("Error: {message}"));
        }
        warn!(error = %message, "assistant: error reported");
        self.emit(ControllerEvent::ErrorReported(message));
        self.state_changed();
    }

    pub async fn handle_transport_event(&self, event: TransportEvent) {
        debug!(kind = event.kind(), "assistant: transport event");
        match event {
            TransportEvent::AgentResponseChunk { text } => self.on_agent_chunk(text).await,
            TransportEvent::TranscriptionChunk { text } => self.on_transcription(text).await,
            TransportEvent::AgentResponseFinished => self.on_agent_finished().await,
            TransportEvent::RawMessage { text } => {
                self.inner.lock().await.set_subtitle(text);
                self.state_changed();
            }
            TransportEvent::Connected => self.confirm_connected().await,
            TransportEvent::Disconnected => {
                {
                    let mut state = self.inner.lock().await;
                    state.settle_disconnected(&self.options.captions.ended);
                }
                info!("assistant: transport reported disconnect");
                self.state_changed();
            }
            TransportEvent::Unrecognized(unrecognized) => {
                let error = AssistantError::MalformedEvent(unrecognized.reason);
                debug!(
                    kind = ?unrecognized.kind,
                    code = ?error.code(),
                    error = %error,
                    "assistant: dropping unrecognized transport event"
                );
            }
        }
    }

    async fn on_agent_chunk(&self, text: String) {
        {
            let mut state = self.inner.lock().await;
            if !state.session.powered_on {
                debug!("assistant: response chunk dropped while powered off");
                return;
            }
            let buffer = state.buffer.get_or_insert_with(|| {
                let emotion = self.emotions.pick();
                debug!(%emotion, "assistant: response turn opened");
                StreamingBuffer::open(emotion)
            });
            buffer.push(&text);
            state.set_subtitle(text);
        }
        self.state_changed();
    }

    async fn on_transcription(&self, text: String) {
        let committed = {
            let mut state = self.inner.lock().await;
            if !state.session.powered_on {
                debug!("assistant: transcription dropped while powered off");
                return;
            }
            let committed = if text.is_empty() {
                None
            } else {
                let turn = Turn::user(text.clone());
                state.history.push(turn.clone());
                state.session.last_user_message = Some(text);
                Some(turn)
            };
            let listening = self.options.captions.listening.clone();
            state.set_subtitle(listening);
            committed
        };

        if let Some(turn) = committed {
            debug!(chars = turn.text.len(), "assistant: user turn committed");
            self.emit(ControllerEvent::TurnCommitted(turn));
        }
        self.state_changed();
    }

    async fn on_agent_finished(&self) {
        let (committed, generation) = {
            let mut state = self.inner.lock().await;
            let Some(buffer) = state.buffer.take() else {
                debug!("assistant: response finished without an open turn");
                return;
            };
            let committed = buffer.into_turn();
            if let Some(turn) = &committed {
                state.history.push(turn.clone());
            }
            (committed, state.subtitle_generation)
        };

        match committed {
            Some(turn) => {
                debug!(
                    chars = turn.text.len(),
                    emotion = ?turn.emotion,
                    "assistant: response turn committed"
                );
                self.emit(ControllerEvent::TurnCommitted(turn));
            }
            None => debug!("assistant: empty response discarded"),
        }
        self.state_changed();
        self.schedule_follow_up(generation).await;
    }

    // dropped if any caption change bumps the generation first
    async fn schedule_follow_up(&self, generation: u64) {
        let caption = self.options.captions.follow_up.clone();
        let delay = self.options.follow_up_delay;

        if delay.is_zero() {
            let mut state = self.inner.lock().await;
            if state.subtitle_generation == generation {
                state.set_subtitle(caption);
                drop(state);
                self.state_changed();
            }
            return;
        }

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = inner.lock().await;
            if state.subtitle_generation != generation {
                debug!("assistant: follow-up prompt superseded");
                return;
            }
            state.set_subtitle(caption);
            drop(state);
            let _ = events.send(ControllerEvent::StateChanged);
        });
    }

    async fn handle_signal(&self, signal: TransportSignal) {
        match signal {
            TransportSignal::Connected => {
                self.handle_transport_event(TransportEvent::Connected).await
            }
            TransportSignal::Disconnected => {
                self.handle_transport_event(TransportEvent::Disconnected)
                    .await
            }
            TransportSignal::Message(payload) => {
                self.handle_transport_event(TransportEvent::from_value(&payload))
                    .await
            }
            TransportSignal::Error(fault) => self.handle_transport_error(fault).await,
        }
    }

    pub fn spawn_event_pump(self: &Arc<Self>) -> JoinHandle<()> {
        let mut signals = self.transport.subscribe_events();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) => controller.handle_signal(signal).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "assistant: transport signals lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!("assistant: transport signal stream closed");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
