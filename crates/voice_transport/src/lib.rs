use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::TransportStatus,
    error::TransportFault,
    protocol::{SessionParams, TransportSignal},
};
use tokio::sync::broadcast;
use tracing::debug;

#[async_trait]
pub trait ConversationTransport: Send + Sync {
    async fn start_session(&self, params: SessionParams) -> anyhow::Result<()>;
    async fn end_session(&self) -> anyhow::Result<()>;
    async fn set_volume(&self, level: f32) -> anyhow::Result<()>;
    fn is_speaking(&self) -> bool;
    fn status(&self) -> TransportStatus;
    fn subscribe_events(&self) -> broadcast::Receiver<TransportSignal>;
}

#[async_trait]
pub trait MicrophoneAccess: Send + Sync {
    async fn request_access(&self) -> anyhow::Result<()>;
}

pub struct StaticMicrophone {
    pub granted: bool,
}

#[async_trait]
impl MicrophoneAccess for StaticMicrophone {
    async fn request_access(&self) -> anyhow::Result<()> {
        if self.granted {
            Ok(())
        } else {
            Err(anyhow!("microphone permission denied"))
        }
    }
}

#[derive(Default)]
struct LoopbackState {
    status: TransportStatus,
    started: Vec<SessionParams>,
    end_calls: u32,
    volumes: Vec<f32>,
}

/// In-process transport: sessions open and close immediately and messages are
/// pushed by whoever drives it (a script, a test).
pub struct LoopbackTransport {
    events: broadcast::Sender<TransportSignal>,
    state: Mutex<LoopbackState>,
    speaking: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            events,
            state: Mutex::new(LoopbackState::default()),
            speaking: AtomicBool::new(false),
        })
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut LoopbackState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn emit(&self, signal: TransportSignal) {
        if self.events.send(signal).is_err() {
            debug!("loopback: signal dropped, no subscribers");
        }
    }

    pub fn inject(&self, payload: Value) {
        self.emit(TransportSignal::Message(payload));
    }

    pub fn inject_error(&self, fault: impl Into<TransportFault>) {
        self.emit(TransportSignal::Error(fault.into()));
    }

    pub fn set_speaking(&self, speaking: bool) {
        self.speaking.store(speaking, Ordering::SeqCst);
    }

    pub fn drop_connection(&self) {
        self.with_state(|state| state.status = TransportStatus::Disconnected);
        self.speaking.store(false, Ordering::SeqCst);
        self.emit(TransportSignal::Disconnected);
    }

    pub fn started_sessions(&self) -> Vec<SessionParams> {
        self.with_state(|state| state.started.clone())
    }

    pub fn end_calls(&self) -> u32 {
        self.with_state(|state| state.end_calls)
    }

    pub fn volume_levels(&self) -> Vec<f32> {
        self.with_state(|state| state.volumes.clone())
    }
}

#[async_trait]
impl ConversationTransport for LoopbackTransport {
    async fn start_session(&self, params: SessionParams) -> anyhow::Result<()> {
        self.with_state(|state| {
            if state.status == TransportStatus::Connected {
                bail!("a loopback session is already active");
            }
            state.status = TransportStatus::Connected;
            state.started.push(params);
            Ok(())
        })?;
        self.emit(TransportSignal::Connected);
        Ok(())
    }

    async fn end_session(&self) -> anyhow::Result<()> {
        self.with_state(|state| {
            state.status = TransportStatus::Disconnected;
            state.end_calls += 1;
        });
        self.speaking.store(false, Ordering::SeqCst);
        self.emit(TransportSignal::Disconnected);
        Ok(())
    }

    async fn set_volume(&self, level: f32) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&level) {
            bail!("volume {level} is outside 0..=1");
        }
        self.with_state(|state| state.volumes.push(level));
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn status(&self) -> TransportStatus {
        self.with_state(|state| state.status)
    }

    fn subscribe_events(&self) -> broadcast::Receiver<TransportSignal> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SessionParams {
        SessionParams {
            agent_id: "agent-1".to_string(),
        }
    }

    #[tokio::test]
    async fn loopback_session_emits_connect_and_disconnect() {
        let transport = LoopbackTransport::new();
        let mut rx = transport.subscribe_events();

        transport.start_session(params()).await.expect("start");
        assert_eq!(transport.status(), TransportStatus::Connected);
        assert!(matches!(rx.recv().await, Ok(TransportSignal::Connected)));

        transport.end_session().await.expect("end");
        assert_eq!(transport.status(), TransportStatus::Disconnected);
        assert!(matches!(rx.recv().await, Ok(TransportSignal::Disconnected)));
        assert_eq!(transport.end_calls(), 1);
        assert_eq!(transport.started_sessions(), vec![params()]);
    }

    #[tokio::test]
    async fn loopback_rejects_second_start_and_bad_volume() {
        let transport = LoopbackTransport::new();
        transport.start_session(params()).await.expect("start");
        assert!(transport.start_session(params()).await.is_err());

        transport.set_volume(0.0).await.expect("mute");
        assert!(transport.set_volume(1.5).await.is_err());
        assert_eq!(transport.volume_levels(), vec![0.0]);
    }

    #[tokio::test]
    async fn static_microphone_reports_denial() {
        assert!(StaticMicrophone { granted: true }.request_access().await.is_ok());
        assert!(StaticMicrophone { granted: false }
            .request_access()
            .await
            .is_err());
    }
}
