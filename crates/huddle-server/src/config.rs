//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (HUDDLE_HOST, HUDDLE_PORT, PORT)
//! - TOML configuration file
//! - Command line arguments

use anyhow::{bail, Context, Result};
use clap::Parser;
use huddle_core::message::{is_valid_time_format, ADMIN, DEFAULT_TIME_FORMAT, DEFAULT_WELCOME};
use huddle_core::room::{DEFAULT_MAX_DISPLAY_NAME_LENGTH, DEFAULT_MAX_ROOM_NAME_LENGTH};
use huddle_core::router::DEFAULT_MAX_MESSAGE_LENGTH;
use huddle_core::RouterConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Files searched, in order, when no `--config` is given.
const CONFIG_PATHS: [&str; 3] = [
    "huddle.toml",
    "/etc/huddle/huddle.toml",
    "~/.config/huddle/huddle.toml",
];

/// Command line arguments.
#[derive(Debug, Default, Parser)]
#[command(name = "huddle", version, about = "Room-scoped realtime chat relay")]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to.
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory of static client assets.
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for every path that is not an endpoint.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Chat presentation.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Cross-origin policy.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum inbound WebSocket message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Maximum room name length, in characters.
    #[serde(default = "default_max_room_name_length")]
    pub max_room_name_length: usize,

    /// Maximum display name length, in characters.
    #[serde(default = "default_max_display_name_length")]
    pub max_display_name_length: usize,

    /// Maximum chat message length, in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

/// Chat presentation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Author name of server notices.
    #[serde(default = "default_admin_name")]
    pub admin_name: String,

    /// Greeting sent to every new connection.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// strftime format of message timestamps.
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. No CORS headers are sent when empty.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("HUDDLE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}

fn default_port() -> u16 {
    std::env::var("HUDDLE_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3500)
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_max_room_name_length() -> usize {
    DEFAULT_MAX_ROOM_NAME_LENGTH
}

fn default_max_display_name_length() -> usize {
    DEFAULT_MAX_DISPLAY_NAME_LENGTH
}

fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LENGTH
}

fn default_admin_name() -> String {
    ADMIN.to_string()
}

fn default_welcome_message() -> String {
    DEFAULT_WELCOME.to_string()
}

fn default_time_format() -> String {
    DEFAULT_TIME_FORMAT.to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            chat: ChatConfig::default(),
            cors: CorsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_message_size: default_max_message_size(),
            max_room_name_length: default_max_room_name_length(),
            max_display_name_length: default_max_display_name_length(),
            max_message_length: default_max_message_length(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            admin_name: default_admin_name(),
            welcome_message: default_welcome_message(),
            time_format: default_time_format(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration for the given command line.
    ///
    /// Uses `--config` if given, otherwise the first existing default path,
    /// otherwise defaults. Command line flags override the file.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::discover()?,
        };

        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    fn discover() -> Result<Self> {
        for path in &CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.as_ref().to_string_lossy()).into_owned();
        let path = Path::new(&expanded);
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply command line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(dir) = &cli.static_dir {
            self.static_dir = dir.clone();
        }
    }

    /// Check values that would otherwise fail at runtime.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !self.transport.websocket_path.starts_with('/') {
            bail!(
                "transport.websocket_path must start with '/': {}",
                self.transport.websocket_path
            );
        }
        if self.chat.admin_name.trim().is_empty() {
            bail!("chat.admin_name cannot be empty");
        }
        if !is_valid_time_format(&self.chat.time_format) {
            bail!("chat.time_format is not a valid format: {}", self.chat.time_format);
        }

        let limits = &self.limits;
        for (name, value) in [
            ("limits.max_message_size", limits.max_message_size),
            ("limits.max_room_name_length", limits.max_room_name_length),
            ("limits.max_display_name_length", limits.max_display_name_length),
            ("limits.max_message_length", limits.max_message_length),
        ] {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }

        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid bind host: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Router settings derived from this configuration.
    #[must_use]
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            admin_name: self.chat.admin_name.clone(),
            welcome_message: self.chat.welcome_message.clone(),
            time_format: self.chat.time_format.clone(),
            max_room_name_length: self.limits.max_room_name_length,
            max_display_name_length: self.limits.max_display_name_length,
            max_message_length: self.limits.max_message_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport.websocket_path, "/ws");
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.chat.admin_name, "Admin");
        assert_eq!(config.chat.welcome_message, "Welcome to Chat App!");
        assert!(config.cors.allowed_origins.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_bind_addr() {
        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        config.port = 3500;
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 3500);

        config.host = "not a host".to_string();
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_config_bind_addr_ipv6() {
        let mut config = Config::default();
        config.host = "::".to_string();
        config.port = 3500;

        let addr = config.bind_addr().unwrap();
        assert!(addr.is_ipv6());
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 3500);

        let cli = Cli::parse_from(["huddle", "-H", "::1"]);
        config.apply_cli(&cli);
        assert_eq!(config.bind_addr().unwrap().to_string(), "[::1]:3500");
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "127.0.0.1"
            port = 9000
            static_dir = "web"

            [limits]
            max_connections = 500
            max_message_length = 140

            [chat]
            welcome_message = "Hi there"

            [cors]
            allowed_origins = ["http://localhost:5173"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.static_dir, PathBuf::from("web"));
        assert_eq!(config.limits.max_connections, 500);
        assert_eq!(config.limits.max_message_length, 140);
        assert_eq!(config.limits.max_room_name_length, DEFAULT_MAX_ROOM_NAME_LENGTH);
        assert_eq!(config.chat.welcome_message, "Hi there");
        assert_eq!(config.chat.admin_name, "Admin");
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config: Config = toml::from_str("host = \"127.0.0.1\"\nport = 9000").unwrap();
        let cli = Cli::parse_from(["huddle", "-H", "0.0.0.0", "--port", "4000", "--static-dir", "dist"]);
        config.apply_cli(&cli);

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 4000);
        assert_eq!(config.static_dir, PathBuf::from("dist"));
    }

    #[test]
    fn test_cli_without_flags_keeps_file() {
        let mut config: Config = toml::from_str("port = 9000").unwrap();
        config.apply_cli(&Cli::parse_from(["huddle"]));
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.chat.time_format = "%Q".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transport.websocket_path = "ws".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.max_message_length = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chat.admin_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_router_config_mirrors_chat_and_limits() {
        let mut config = Config::default();
        config.chat.admin_name = "Bot".to_string();
        config.limits.max_message_length = 10;

        let router = config.router_config();
        assert_eq!(router.admin_name, "Bot");
        assert_eq!(router.max_message_length, 10);
        assert_eq!(router.time_format, DEFAULT_TIME_FORMAT);
    }

    #[test]
    fn test_from_file_missing() {
        assert!(Config::from_file("/nonexistent/huddle.toml").is_err());
    }
}
