use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::relay::PairingConfig;
use crate::session::SessionConfig;
use crate::upstream::client::DEFAULT_ENDPOINT;
use crate::upstream::GeminiLiveConnector;

/// Prefix for environment overrides, e.g. `STREAMSCRIBE__RELAY__PORT=9000`
pub const ENV_PREFIX: &str = "STREAMSCRIBE";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub relay: RelayConfig,
    pub upstream: UpstreamConfig,
    pub client: ClientConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    pub bind: String,
    pub port: u16,
    pub upstream_open_timeout_secs: u64,
    /// Unset: an unresponsive upstream keeps the pairing alive
    pub upstream_idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub relay_url: String,
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_secs: u64,
    pub mock_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub quantum: usize,
    pub buffer_size: usize,
}

impl Config {
    /// Load defaults, then `path` (if it exists), then the environment
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("relay.bind", "0.0.0.0")?
            .set_default("relay.port", 8787i64)?
            .set_default("relay.upstream_open_timeout_secs", 15i64)?
            .set_default("upstream.endpoint", DEFAULT_ENDPOINT)?
            .set_default("upstream.api_key", "")?
            .set_default("upstream.model", "gemini-live-2.5-flash-preview")?
            .set_default("client.relay_url", "ws://localhost:8787")?
            .set_default("client.auto_reconnect", true)?
            .set_default("client.reconnect_delay_ms", 700i64)?
            .set_default("client.connect_timeout_secs", 10i64)?
            .set_default("client.mock_interval_ms", 700i64)?
            .set_default("audio.quantum", 128i64)?
            .set_default("audio.buffer_size", 4096i64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        Ok(cfg.with_fallbacks(|key| std::env::var(key).ok()))
    }

    /// Fill unset values from the conventional variables
    /// (`GEMINI_API_KEY`, `GEMINI_LIVE_MODEL`, `PORT`)
    pub fn with_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.upstream.api_key.is_empty() {
            if let Some(key) = lookup("GEMINI_API_KEY") {
                self.upstream.api_key = key;
            }
        }
        if let Some(model) = lookup("GEMINI_LIVE_MODEL") {
            self.upstream.model = model;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.relay.port = port;
        }
        self
    }

    pub fn connector(&self) -> GeminiLiveConnector {
        GeminiLiveConnector::new(
            self.upstream.endpoint.clone(),
            self.upstream.api_key.clone(),
            self.upstream.model.clone(),
        )
    }
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn pairing_config(&self) -> PairingConfig {
        PairingConfig {
            upstream_open_timeout: Duration::from_secs(self.upstream_open_timeout_secs),
            upstream_idle_timeout: self.upstream_idle_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl ClientConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            relay_url: self.relay_url.clone(),
            auto_reconnect: self.auto_reconnect,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            mock_interval: Duration::from_millis(self.mock_interval_ms),
        }
    }
}

impl AudioConfig {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            quantum: self.quantum,
            buffer_size: self.buffer_size,
            ..CaptureConfig::default()
        }
    }
}
