use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::{EmitPolicy, SessionConfig, TransportKind};
use crate::sync::StaleHistoryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Settings for the chat client, read from a JSON file and overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub user_id: Option<String>,
    /// Transport preference, tried in order.
    pub transports: Vec<TransportKind>,
    pub connect_timeout_ms: u64,
    pub typing_quiet_ms: u64,
    pub history_per_page: u32,
    pub chat_name_placeholder: String,
    pub preview_placeholder: String,
    pub emit_policy: EmitPolicy,
    pub emit_buffer_limit: usize,
    pub stale_history: StaleHistoryPolicy,
    /// Delay before the console host reopens a dropped session; 0 disables it.
    pub reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            user_id: None,
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            connect_timeout_ms: 5_000,
            typing_quiet_ms: 2_000,
            history_per_page: 50,
            chat_name_placeholder: "Unnamed Chat".to_string(),
            preview_placeholder: "No messages".to_string(),
            emit_policy: EmitPolicy::Drop,
            emit_buffer_limit: 64,
            stale_history: StaleHistoryPolicy::Discard,
            reconnect_delay_ms: 3_000,
        }
    }
}

impl ClientConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            server_url: self.server_url.trim_end_matches('/').to_string(),
            transports: self.transports.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            emit_policy: self.emit_policy,
            emit_buffer_limit: self.emit_buffer_limit,
        }
    }

    pub fn typing_quiet(&self) -> Duration {
        Duration::from_millis(self.typing_quiet_ms)
    }

    pub fn reconnect_delay(&self) -> Option<Duration> {
        (self.reconnect_delay_ms > 0).then(|| Duration::from_millis(self.reconnect_delay_ms))
    }
}

pub fn load_config(path: &str) -> ClientConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<ClientConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                ClientConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            ClientConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &ClientConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}
