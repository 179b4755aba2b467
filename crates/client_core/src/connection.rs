//! The one websocket the client keeps open to the simulator.
//!
//! A [`ConnectionManager`] is shared process-wide. Widgets never open
//! sockets of their own; they read the store and the store talks to the
//! manager. The manager owns a single supervisor task which connects,
//! pumps frames in both directions and, when the socket goes away, sleeps
//! through a linear backoff before trying again. `stop()` aborts that task,
//! which drops the socket and cancels any pending backoff in one step.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use shared::{
    domain::ConnectionState,
    error::ProtocolError,
    protocol::{ControlInput, TelemetrySnapshot},
};
use tokio::{
    net::TcpStream,
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{error::SendError, store::ControlSink};

type SimulatorSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Telemetry(TelemetrySnapshot),
    StateChanged(ConnectionState),
    /// No more automatic attempts until `start` is called again.
    GaveUp { attempts: u32 },
}

pub struct ConnectionManager {
    policy: ReconnectPolicy,
    inner: Mutex<ManagerState>,
    events: broadcast::Sender<ConnectionEvent>,
}

struct ManagerState {
    connection: ConnectionState,
    // Bumped by start/stop; a supervisor holding an older value is stale.
    generation: u64,
    supervisor: Option<JoinHandle<()>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    gave_up: bool,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            policy,
            inner: Mutex::new(ManagerState {
                connection: ConnectionState::default(),
                generation: 0,
                supervisor: None,
                outbound: None,
                gave_up: false,
            }),
            events,
        })
    }

    /// Begins connecting. A no-op while a supervisor is already connecting,
    /// connected or waiting out a backoff.
    pub fn start(self: &Arc<Self>, endpoint: impl Into<String>) {
        let mut guard = self.lock_state();
        if guard.supervisor.is_some() {
            debug!("simulator connection already running; ignoring start");
            return;
        }
        guard.generation += 1;
        guard.gave_up = false;
        let generation = guard.generation;
        let endpoint = endpoint.into();
        let manager = Arc::clone(self);
        guard.supervisor = Some(tokio::spawn(async move {
            manager.supervise(endpoint, generation).await;
        }));
    }

    /// Closes the socket, cancels a pending reconnect and stays down until
    /// the next `start`. Queued outbound frames are discarded.
    pub fn stop(&self) {
        let mut guard = self.lock_state();
        guard.generation += 1;
        if let Some(supervisor) = guard.supervisor.take() {
            supervisor.abort();
            info!("simulator connection stopped");
        }
        guard.outbound = None;
        self.transition(&mut guard, ConnectionState::disconnected(0));
    }

    pub fn send(&self, input: &ControlInput) -> Result<(), SendError> {
        let guard = self.lock_state();
        let outbound = match (&guard.outbound, guard.connection.is_connected()) {
            (Some(outbound), true) => outbound,
            _ => return Err(SendError::NotConnected),
        };
        let payload = input.encode()?;
        outbound
            .send(payload)
            .map_err(|_| SendError::NotConnected)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock_state().connection
    }

    pub fn has_given_up(&self) -> bool {
        self.lock_state().gave_up
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    async fn supervise(self: Arc<Self>, endpoint: String, generation: u64) {
        let mut attempt = 0;
        loop {
            if !self.transition_if_current(generation, ConnectionState::connecting(attempt)) {
                return;
            }
            info!(%endpoint, attempt, "connecting to simulator");
            match connect_async(endpoint.as_str()).await {
                Ok((socket, _)) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    if !self.mark_connected(generation, tx) {
                        return;
                    }
                    attempt = 0;
                    info!(%endpoint, "simulator connection open");
                    self.pump(socket, rx, generation).await;
                }
                Err(error) => {
                    warn!(%endpoint, attempt, %error, "failed to connect to simulator");
                }
            }

            attempt += 1;
            if self.policy.exhausted(attempt) {
                self.give_up(generation, attempt);
                return;
            }
            if !self.transition_if_current(generation, ConnectionState::disconnected(attempt)) {
                return;
            }
            let delay = self.policy.delay_for(attempt);
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "scheduling simulator reconnect"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn pump(
        &self,
        socket: SimulatorSocket,
        mut outbound: mpsc::UnboundedReceiver<String>,
        generation: u64,
    ) {
        let (mut writer, mut reader) = socket.split();
        loop {
            tokio::select! {
                inbound = reader.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.receive(&text, generation),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => self.receive(&text, generation),
                        Err(_) => warn!(error = %ProtocolError::NonUtf8Frame, "dropping frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "simulator closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(%error, "simulator connection error");
                        break;
                    }
                    None => {
                        warn!("simulator stream ended without a close frame");
                        break;
                    }
                },
                Some(payload) = outbound.recv() => {
                    if let Err(error) = writer.send(Message::Text(payload)).await {
                        warn!(%error, "failed to send control input");
                        break;
                    }
                }
            }
        }
    }

    fn receive(&self, text: &str, generation: u64) {
        let snapshot = match TelemetrySnapshot::decode(text) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "dropping telemetry frame");
                return;
            }
        };
        let mut guard = self.lock_state();
        if guard.generation != generation {
            return;
        }
        // Only a healthy socket delivers data.
        guard.connection.attempt = 0;
        let _ = self.events.send(ConnectionEvent::Telemetry(snapshot));
    }

    fn mark_connected(&self, generation: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut guard = self.lock_state();
        if guard.generation != generation {
            return false;
        }
        guard.outbound = Some(outbound);
        self.transition(&mut guard, ConnectionState::connected());
        true
    }

    fn give_up(&self, generation: u64, attempts: u32) {
        let mut guard = self.lock_state();
        if guard.generation != generation {
            return;
        }
        guard.supervisor = None;
        guard.gave_up = true;
        self.transition(&mut guard, ConnectionState::disconnected(attempts));
        warn!(attempts, "giving up on simulator connection until restarted");
        let _ = self.events.send(ConnectionEvent::GaveUp { attempts });
    }

    fn transition_if_current(&self, generation: u64, next: ConnectionState) -> bool {
        let mut guard = self.lock_state();
        if guard.generation != generation {
            return false;
        }
        self.transition(&mut guard, next);
        true
    }

    // Events go out under the lock so subscribers see transitions in order.
    fn transition(&self, guard: &mut ManagerState, next: ConnectionState) {
        if !next.is_connected() {
            guard.outbound = None;
        }
        if guard.connection == next {
            return;
        }
        guard.connection = next;
        let _ = self.events.send(ConnectionEvent::StateChanged(next));
    }

    #[cfg(test)]
    pub(crate) fn force_state(&self, next: ConnectionState) {
        let mut guard = self.lock_state();
        self.transition(&mut guard, next);
    }

    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ControlSink for ConnectionManager {
    fn send_control(&self, input: &ControlInput) -> Result<(), SendError> {
        self.send(input)
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
