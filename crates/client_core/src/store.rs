//! Single source of truth for everything the dashboard shows.
//!
//! Mutations arrive as [`Action`]s and are applied one at a time. After each
//! one that changes the state, every subscriber is called with the complete
//! new [`AppState`], in the order they subscribed. An action dispatched while
//! another is being applied (including from inside a subscriber) waits in a
//! queue and runs once the current notification round has finished, so no
//! subscriber ever sees two mutations interleave.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use chrono::{DateTime, Utc};
use shared::{
    domain::{ConnectionState, ConnectionStatus, Notice, StatusNotice},
    protocol::{ControlInput, TelemetrySnapshot},
};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, warn};
use transmission::{
    input::{command_for, InputEvent},
    Command, ControlState,
};

use crate::{
    connection::{ConnectionEvent, ConnectionManager},
    error::SendError,
};

/// Where the store pushes rider input whenever it changes.
pub trait ControlSink: Send + Sync {
    fn send_control(&self, input: &ControlInput) -> Result<(), SendError>;
}

/// Sink for a store that is not wired to a simulator.
pub struct MissingControlSink;

impl ControlSink for MissingControlSink {
    fn send_control(&self, _input: &ControlInput) -> Result<(), SendError> {
        Err(SendError::NotConnected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub telemetry: TelemetrySnapshot,
    pub control: ControlState,
    pub connection: ConnectionState,
    pub notice: Option<StatusNotice>,
    pub last_telemetry_at: Option<DateTime<Utc>>,
}

impl AppState {
    /// The latest notice, unless it has already timed out at `now`.
    pub fn active_notice(&self, now: DateTime<Utc>) -> Option<&StatusNotice> {
        self.notice
            .as_ref()
            .filter(|notice| !notice.is_expired_at(now))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            telemetry: TelemetrySnapshot::idle(),
            control: ControlState::default(),
            connection: ConnectionState::default(),
            notice: None,
            last_telemetry_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Control(Command),
    Telemetry(TelemetrySnapshot),
    Connection(ConnectionState),
    Notice(Notice),
    ClearNotice,
}

impl Action {
    pub fn from_connection_event(event: ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::Telemetry(snapshot) => Action::Telemetry(snapshot),
            ConnectionEvent::StateChanged(state) => Action::Connection(state),
            ConnectionEvent::GaveUp { attempts } => Action::Notice(Notice::error(format!(
                "Server unreachable after {attempts} attempts"
            ))),
        }
    }
}

type Subscriber = Arc<dyn Fn(&AppState) + Send + Sync>;
type SubscriberList = Mutex<Vec<(u64, Subscriber)>>;
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Store {
    inner: Mutex<StoreInner>,
    subscribers: Arc<SubscriberList>,
    next_subscriber_id: AtomicU64,
    sink: Arc<dyn ControlSink>,
    clock: Clock,
}

struct StoreInner {
    state: AppState,
    pending: VecDeque<Action>,
    draining: bool,
}

impl Store {
    pub fn new(sink: Arc<dyn ControlSink>) -> Arc<Self> {
        Self::with_clock(sink, Arc::new(Utc::now))
    }

    pub fn with_clock(sink: Arc<dyn ControlSink>, clock: Clock) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(StoreInner {
                state: AppState::default(),
                pending: VecDeque::new(),
                draining: false,
            }),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscriber_id: AtomicU64::new(0),
            sink,
            clock,
        })
    }

    pub fn state(&self) -> AppState {
        self.lock_inner().state.clone()
    }

    pub fn dispatch(&self, action: Action) {
        {
            let mut inner = self.lock_inner();
            inner.pending.push_back(action);
            if inner.draining {
                return;
            }
            inner.draining = true;
        }
        let _reset = DrainReset(self);

        loop {
            let (changed, outbound) = {
                let mut inner = self.lock_inner();
                let Some(action) = inner.pending.pop_front() else {
                    inner.draining = false;
                    return;
                };
                let before = inner.state.clone();
                let outbound = self.reduce(&mut inner.state, action);
                let changed = (inner.state != before).then(|| inner.state.clone());
                (changed, outbound)
            };

            if let Some(input) = outbound {
                self.push_control(&input);
            }
            if let Some(state) = changed {
                self.notify(&state);
            }
        }
    }

    pub fn dispatch_command(&self, command: Command) {
        self.dispatch(Action::Control(command));
    }

    /// Maps a key press through the rider bindings. Returns whether the key
    /// was bound.
    pub fn dispatch_input(&self, event: InputEvent) -> bool {
        let throttle = self.lock_inner().state.control.throttle_position;
        match command_for(event, throttle) {
            Some(command) => {
                self.dispatch_command(command);
                true
            }
            None => false,
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&AppState) + Send + Sync + 'static) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let callback: Subscriber = Arc::new(callback);
        lock(&self.subscribers).push((id, callback));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Feeds connection events into the store, in the order the manager
    /// emitted them. Skipped events are made up for by reading the manager's
    /// current link state.
    pub fn attach(self: &Arc<Self>, manager: &Arc<ConnectionManager>) -> JoinHandle<()> {
        let mut events = manager.subscribe_events();
        let store = Arc::clone(self);
        let manager = Arc::downgrade(manager);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => store.dispatch(Action::from_connection_event(event)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "store fell behind link events; resyncing");
                        if let Some(manager) = manager.upgrade() {
                            store.dispatch(Action::Connection(manager.connection_state()));
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    // Returns the input to push when the rider-facing fields changed or the
    // link just came up.
    fn reduce(&self, state: &mut AppState, action: Action) -> Option<ControlInput> {
        let now = (self.clock)();
        match action {
            Action::Control(command) => {
                let before = state.control;
                let (next, notice) = transmission::apply(before, command);
                state.control = next;
                if let Some(notice) = notice {
                    state.notice = Some(notice.stamped(now));
                }
                (next != before).then(|| next.to_input())
            }
            Action::Telemetry(snapshot) => {
                state.telemetry = snapshot;
                state.last_telemetry_at = Some(now);
                None
            }
            Action::Connection(next) => {
                let previous = state.connection;
                state.connection = next;
                match (previous.status, next.status) {
                    (ConnectionStatus::Connected, ConnectionStatus::Connected) => None,
                    (_, ConnectionStatus::Connected) => {
                        state.notice = Some(Notice::info("Connected to server").stamped(now));
                        Some(state.control.to_input())
                    }
                    (ConnectionStatus::Connected, ConnectionStatus::Disconnected) => {
                        state.notice = Some(Notice::error("Disconnected from server").stamped(now));
                        None
                    }
                    _ => None,
                }
            }
            Action::Notice(notice) => {
                state.notice = Some(notice.stamped(now));
                None
            }
            Action::ClearNotice => {
                state.notice = None;
                None
            }
        }
    }

    fn push_control(&self, input: &ControlInput) {
        match self.sink.send_control(input) {
            Ok(()) => debug!(
                throttle = input.throttle_position,
                clutch = input.clutch_position,
                gear = input.gear.number(),
                "pushed control input"
            ),
            Err(SendError::NotConnected) => debug!("simulator offline; control input dropped"),
            Err(error) => warn!(%error, "control input dropped"),
        }
    }

    fn notify(&self, state: &AppState) {
        let subscribers: Vec<Subscriber> = lock(&self.subscribers)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(state);
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, StoreInner> {
        lock(&self.inner)
    }
}

/// Keeps a subscriber registered until dropped or unsubscribed.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<SubscriberList>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            lock(&subscribers).retain(|(id, _)| *id != self.id);
        }
    }
}

// A panicking subscriber unwinds out of `dispatch`; the store must still
// accept the next action.
struct DrainReset<'a>(&'a Store);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut inner = self.0.lock_inner();
            inner.draining = false;
            inner.pending.clear();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
