//! Client side of the motorcycle simulator link: one supervised websocket,
//! a store that owns everything the dashboard renders, and the settings that
//! point them at a simulator.

pub mod config;
pub mod connection;
pub mod error;
pub mod store;

pub use config::{load_settings, ClientSettings};
pub use connection::{ConnectionEvent, ConnectionManager, ReconnectPolicy};
pub use error::{ConfigError, SendError};
pub use store::{Action, AppState, ControlSink, MissingControlSink, Store, Subscription};
