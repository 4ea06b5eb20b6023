//! Configuration loading.
//!
//! Reads the shared tools configuration document and exposes the one key
//! this crate recognizes: `WebSocketClient.AntBaseUrl`. A missing file, a
//! missing key, or a parse failure all degrade to "no URL" - connection
//! attempts then fail (and are retried) instead of the process aborting.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CONFIG_PATH;

/// Top-level tools configuration document.
///
/// Other subsystems keep their own sections in the same file; unknown keys
/// are ignored on load.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    /// Section consumed by the plugin socket client.
    #[serde(rename = "WebSocketClient", default)]
    pub websocket_client: WebSocketClientConfig,
}

/// The `WebSocketClient` section.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct WebSocketClientConfig {
    /// Base URL of the Ant backend (e.g. `http://127.0.0.1:8600`).
    #[serde(rename = "AntBaseUrl", default, skip_serializing_if = "Option::is_none")]
    pub ant_base_url: Option<String>,
}

impl Config {
    /// Loads configuration from `path`, with environment variable overrides.
    ///
    /// Never fails: unreadable or malformed input is logged and replaced by
    /// the default (empty) configuration.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut config = match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("[Config] failed to read {}: {e:#}", path.display());
                Self::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    /// Loads configuration from the default document location.
    pub fn load_default() -> Self {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("config file not found: {}", path.display()))?;
        serde_json::from_str(&content).context("config file is not valid JSON")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("ANTLINK_BASE_URL") {
            self.websocket_client.ant_base_url = Some(base_url);
        }
    }

    /// Backend base URL, or `None` when unset or empty.
    ///
    /// Callers must treat `None` as a failed connection attempt, not an
    /// error to surface.
    pub fn base_url(&self) -> Option<&str> {
        self.websocket_client
            .ant_base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
