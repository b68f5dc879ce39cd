// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration management.
//!
//! Configuration is read from a TOML file (by default
//! `<config dir>/switchboard/config.toml`). Every field is optional:
//! - `endpoint`: base WebSocket URL of the notification server
//! - `path`: path template, `{identity}` is replaced by the topic identity
//! - `reconnect_interval_ms` / `max_reconnect_attempts`: linear backoff policy
//! - `sync_interval_ms`: how often the offline queue is drained
//! - `queue_dir`: where pending outbound messages are persisted
//! - `operator_name`: sender name of this operator's own chat messages

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::realtime::{ConnectionConfig, SyncConfig};

const APP_DIR_NAME: &str = "switchboard";
const CONFIG_FILE_NAME: &str = "config.toml";
const QUEUE_DIR_NAME: &str = "queue";

/// Placeholder in the path template replaced by the connection identity.
pub const IDENTITY_PLACEHOLDER: &str = "{identity}";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base WebSocket URL (`ws://` or `wss://`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Path template appended to the endpoint.
    #[serde(default = "default_path")]
    pub path: String,
    /// Base interval of the linear reconnect backoff (default: 5000).
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Reconnect attempts before the connection is declared failed (default: 5).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Offline queue drain interval (default: 5000).
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,
    /// Directory for the persisted offline queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_dir: Option<PathBuf>,
    /// Sender name used by this operator; chat echoes from it raise no notice.
    #[serde(default = "default_operator_name")]
    pub operator_name: String,
}

fn default_endpoint() -> String {
    "ws://localhost:8000".to_string()
}

fn default_path() -> String {
    format!("/ws/admin/{IDENTITY_PLACEHOLDER}")
}

fn default_reconnect_interval_ms() -> u64 {
    5_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_sync_interval_ms() -> u64 {
    5_000
}

fn default_operator_name() -> String {
    "admin".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: default_endpoint(),
            path: default_path(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            sync_interval_ms: default_sync_interval_ms(),
            queue_dir: None,
            operator_name: default_operator_name(),
        }
    }
}

impl ClientConfig {
    /// Loads and validates the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise the default config file if it exists,
    /// otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Checks that intervals and limits are usable.
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_interval_ms == 0 {
            return Err(Error::Config(
                "reconnect_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(Error::Config(
                "max_reconnect_attempts must be greater than 0".to_string(),
            ));
        }
        if self.sync_interval_ms == 0 {
            return Err(Error::Config(
                "sync_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.operator_name.trim().is_empty() {
            return Err(Error::Config("operator_name must not be empty".to_string()));
        }
        self.endpoint()?;
        Ok(())
    }

    /// The parsed connection endpoint.
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::new(&self.endpoint, &self.path)
    }

    /// The connection URI for `identity`, authenticated by `token`.
    pub fn endpoint_url(&self, identity: &str, token: &str) -> Result<String> {
        Ok(self.endpoint()?.url(identity, token))
    }

    /// Reconnect policy for the connection manager.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
            operator_name: self.operator_name.clone(),
        }
    }

    /// Timer settings for the sync loop.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            interval: Duration::from_millis(self.sync_interval_ms),
        }
    }

    /// Directory holding the persisted offline queue.
    pub fn queue_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.queue_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR_NAME}")))
            .join(QUEUE_DIR_NAME)
    }
}

/// Default location of the config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// A WebSocket endpoint parameterized by identity, carrying the auth token
/// as a query parameter.
///
/// The token goes in the URI because the browser-style handshake offers no
/// custom headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    path: String,
}

impl Endpoint {
    /// Parses a base URL and path template.
    pub fn new(base: &str, path: &str) -> Result<Self> {
        let url = Url::parse(base)
            .map_err(|e| Error::Config(format!("invalid endpoint '{base}': {e}")))?;

        if !matches!(url.scheme(), "ws" | "wss") || url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "invalid endpoint '{base}'\n  hint: use a ws:// or wss:// URL"
            )));
        }

        Ok(Endpoint {
            base: url,
            path: path.to_string(),
        })
    }

    /// Builds the connection URI for `identity`, authenticated by `token`.
    pub fn url(&self, identity: &str, token: &str) -> String {
        let mut url = self.base.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for part in self.path.split('/').filter(|p| !p.is_empty()) {
                if part == IDENTITY_PLACEHOLDER {
                    segments.push(identity);
                } else {
                    segments.push(part);
                }
            }
        }
        url.query_pairs_mut().append_pair("token", token);

        url.into()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
