use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [server]
//                    port = 9000
//
//   env var:         CHAT_SERVER__PORT=9000   (double underscore = nesting)
//
//   (single underscore stays within field names: CHAT_CLIENT__RETRY_DELAY_MS)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub client: ClientFileConfig,
}

/// Router tunables (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Outbound frames buffered per channel before new ones are dropped.
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
    /// Also deliver each routed message event back to its sender.
    #[serde(default)]
    pub echo_to_sender: bool,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            send_channel_capacity: default_send_channel_capacity(),
            echo_to_sender: false,
        }
    }
}

/// Client tunables (lives under `[client]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientFileConfig {
    /// Channel base address; the local identity is appended as the last segment.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_typing_idle_ms")]
    pub typing_idle_ms: u64,
    /// Show our own sent messages without waiting for a server echo.
    #[serde(default = "default_local_echo")]
    pub local_echo: bool,
}

impl Default for ClientFileConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            retry_delay_ms: default_retry_delay_ms(),
            typing_idle_ms: default_typing_idle_ms(),
            local_echo: default_local_echo(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    10000
}
fn default_send_channel_capacity() -> usize {
    64
}
fn default_server_url() -> String {
    "ws://127.0.0.1:10000/ws/chat".to_string()
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_typing_idle_ms() -> u64 {
    100
}
fn default_local_echo() -> bool {
    true
}

/// Default config file location: `<config dir>/classroom-chat/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("classroom-chat").join("config.toml"))
}

/// Build a figment that layers: defaults → config.toml → CHAT_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `CHAT_SERVER__PORT=9000`  →  `server.port = 9000`
///   `CHAT_CLIENT__TYPING_IDLE_MS=250`  →  `client.typing_idle_ms = 250`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("CHAT_").split("__"))
}

/// Resolve the layered file config from an explicit path or the default location.
pub fn resolve(config_path: Option<PathBuf>) -> Result<FileConfig> {
    let path = config_path.or_else(default_config_path);
    load_config(path.as_deref())
        .extract()
        .with_context(|| format!("Failed to load configuration from {:?}", path))
}

// =============================================================================
// Runtime config structs (derived from FileConfig)
// =============================================================================

/// Router configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub send_channel_capacity: usize,
    pub echo_to_sender: bool,
}

impl ServerConfig {
    pub fn from_file(fc: &ServerFileConfig) -> Self {
        Self {
            host: fc.host.clone(),
            port: fc.port,
            // A zero-capacity mpsc channel panics on creation
            send_channel_capacity: fc.send_channel_capacity.max(1),
            echo_to_sender: fc.echo_to_sender,
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

/// Client configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub server_url: String,
    /// Pause between re-establishing the channel and retrying a failed send.
    pub retry_delay: Duration,
    /// Quiet period after the last keystroke before a typing notice goes out.
    pub typing_idle: Duration,
    pub local_echo: bool,
}

impl ClientConfig {
    pub fn from_file(fc: &ClientFileConfig) -> Self {
        Self {
            server_url: fc.server_url.clone(),
            retry_delay: Duration::from_millis(fc.retry_delay_ms),
            typing_idle: Duration::from_millis(fc.typing_idle_ms),
            local_echo: fc.local_echo,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_file(&ClientFileConfig::default())
    }
}
