use std::{collections::HashMap, fs, path::Path, time::Duration};

use tracing::warn;
use url::Url;

use crate::{connection::ReconnectPolicy, error::ConfigError};

pub const SETTINGS_FILE: &str = "client.toml";
pub const WS_PATH: &str = "/ws";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Full endpoint; when set it wins over host/port/secure.
    pub ws_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_attempts: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            ws_url: None,
            host: "localhost".into(),
            port: 8080,
            secure: false,
            reconnect_base_delay_ms: 1000,
            reconnect_max_attempts: 5,
        }
    }
}

impl ClientSettings {
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let raw = match &self.ws_url {
            Some(url) => url.trim().to_string(),
            None => {
                let scheme = if self.secure { "wss" } else { "ws" };
                format!("{scheme}://{}:{}{WS_PATH}", self.host, self.port)
            }
        };
        let url = Url::parse(&raw).map_err(|source| ConfigError::InvalidEndpoint {
            endpoint: raw.clone(),
            source,
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_attempts: self.reconnect_max_attempts,
        }
    }
}

/// Defaults, then `client.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();
    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw, Path::new(SETTINGS_FILE));
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut ClientSettings, raw: &str, path: &Path) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(cfg) => cfg,
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring unreadable client settings file");
            return;
        }
    };
    apply_values(settings, |key| {
        file_cfg.get(key).map(|value| match value {
            toml::Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    });
}

fn apply_env(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    apply_values(settings, |key| {
        let upper = key.to_ascii_uppercase();
        lookup(&format!("APP__SIMULATOR_{upper}"))
            .or_else(|| lookup(&format!("SIMULATOR_{upper}")))
    });
}

fn apply_values(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ws_url") {
        settings.ws_url = Some(v);
    }
    if let Some(v) = lookup("host") {
        settings.host = v;
    }
    if let Some(v) = lookup("port") {
        parse_into(&mut settings.port, "port", &v);
    }
    if let Some(v) = lookup("secure") {
        settings.secure = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = lookup("reconnect_base_delay_ms") {
        parse_into(&mut settings.reconnect_base_delay_ms, "reconnect_base_delay_ms", &v);
    }
    if let Some(v) = lookup("reconnect_max_attempts") {
        parse_into(&mut settings.reconnect_max_attempts, "reconnect_max_attempts", &v);
    }
}

fn parse_into<T: std::str::FromStr>(slot: &mut T, key: &str, raw: &str) {
    match raw.trim().parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value = raw, "ignoring unparsable client setting"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
