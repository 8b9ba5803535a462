use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

/// How the client reaches the relay, plus the reconnect policy.
///
/// The reconnect delay is fixed: no exponential growth and no attempt
/// cap. The client always tries to come back online rather than staying
/// in a terminal disconnected state.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP base URL of the relay and its REST surface,
    /// e.g. `http://127.0.0.1:4040`.
    pub server_url: String,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:4040".into(),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `CHAT_SERVER_URL` and `CHAT_RECONNECT_MS`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(v) = std::env::var("CHAT_SERVER_URL") {
            settings.server_url = v;
        }
        if let Ok(v) = std::env::var("CHAT_RECONNECT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                settings.reconnect_delay = Duration::from_millis(ms);
            }
        }

        settings
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Websocket endpoint derived from the HTTP base URL.
    pub fn ws_url(&self) -> Result<String> {
        let parsed = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server url: {}", self.server_url))?;
        let ws_url = match parsed.scheme() {
            "http" => self.server_url.replacen("http://", "ws://", 1),
            "https" => self.server_url.replacen("https://", "wss://", 1),
            other => bail!("server url must start with http:// or https://, got {other}://"),
        };
        Ok(format!("{ws_url}/ws"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_ws_url_from_http_base() {
        let config = ClientConfig::default().with_server_url("http://relay.local:4040");
        assert_eq!(config.ws_url().unwrap(), "ws://relay.local:4040/ws");

        let config = ClientConfig::default().with_server_url("https://relay.local");
        assert_eq!(config.ws_url().unwrap(), "wss://relay.local/ws");
    }

    #[test]
    fn env_vars_override_defaults() {
        std::env::set_var("CHAT_SERVER_URL", "http://relay.example:9000");
        std::env::set_var("CHAT_RECONNECT_MS", "250");
        let overridden = ClientConfig::from_env();
        std::env::remove_var("CHAT_SERVER_URL");
        std::env::remove_var("CHAT_RECONNECT_MS");

        assert_eq!(overridden.server_url, "http://relay.example:9000");
        assert_eq!(overridden.reconnect_delay, Duration::from_millis(250));

        let defaults = ClientConfig::from_env();
        assert_eq!(defaults.server_url, ClientConfig::default().server_url);
        assert_eq!(
            defaults.reconnect_delay,
            ClientConfig::default().reconnect_delay
        );
    }

    #[test]
    fn rejects_non_http_server_url() {
        let config = ClientConfig::default().with_server_url("ftp://relay.local");
        assert!(config.ws_url().is_err());
    }
}
