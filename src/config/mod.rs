use crate::chat::IrcConfig;
use crate::room::BridgeOptions;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DudesConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub world: WorldConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    std::env::var("DUDES_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Upstream chat configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_host")]
    pub host: String,
    #[serde(default = "default_chat_port")]
    pub port: u16,
    /// Anonymous read-only login
    #[serde(default = "default_chat_nick")]
    pub nick: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_emote_cdn_host")]
    pub emote_cdn_host: String,
    /// One reconnect attempt per entry, after sleeping that long (milliseconds)
    #[serde(default = "default_reconnect_delays")]
    pub reconnect_delays_ms: Vec<u64>,
    /// Per-room broadcast capacity; slow viewers past this skip messages
    #[serde(default = "default_room_buffer")]
    pub room_buffer: usize,
}

fn default_chat_host() -> String {
    "irc.chat.twitch.tv".to_string()
}

fn default_chat_port() -> u16 {
    6667
}

fn default_chat_nick() -> String {
    "justinfan12345".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_emote_cdn_host() -> String {
    "static-cdn.jtvnw.net".to_string()
}

fn default_reconnect_delays() -> Vec<u64> {
    vec![1000, 2000, 4000]
}

fn default_room_buffer() -> usize {
    256
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: default_chat_host(),
            port: default_chat_port(),
            nick: default_chat_nick(),
            connect_timeout_secs: default_connect_timeout(),
            emote_cdn_host: default_emote_cdn_host(),
            reconnect_delays_ms: default_reconnect_delays(),
            room_buffer: default_room_buffer(),
        }
    }
}

impl ChatConfig {
    pub fn irc(&self) -> IrcConfig {
        IrcConfig {
            host: self.host.clone(),
            port: self.port,
            nick: self.nick.clone(),
        }
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            reconnect_delays: self
                .reconnect_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        }
    }
}

/// Scene and simulation tuning. Times are milliseconds, distances scene units.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f64,
    pub height: f64,
    /// Frame rate cap for the scheduler
    pub max_fps: f64,
    /// Elapsed time is clamped to this after a stall
    pub max_elapsed_ms: f64,
    /// Logical duration of one tick
    pub fixed_delta_ms: f64,
    pub max_lifetime_ms: f64,
    pub max_fade_ms: f64,
    pub land_duration_ms: f64,
    /// Upper bound of the uniformly rolled idle/run dwell
    pub max_dwell_ms: f64,
    pub message_display_ms: f64,
    pub emote_interval_ms: f64,
    pub emote_lifetime_ms: f64,
    /// Fixed RNG seed; random when unset
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            max_fps: 60.0,
            max_elapsed_ms: 100.0,
            fixed_delta_ms: 1000.0 / 60.0,
            max_lifetime_ms: 1000.0 * 60.0 * 69.0,
            max_fade_ms: 5000.0,
            land_duration_ms: 200.0,
            max_dwell_ms: 5000.0,
            message_display_ms: 5000.0,
            emote_interval_ms: 150.0,
            emote_lifetime_ms: 2000.0,
            seed: None,
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<DudesConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let config: DudesConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DudesConfig::default();
        assert_eq!(config.chat.host, "irc.chat.twitch.tv");
        assert_eq!(config.chat.port, 6667);
        assert_eq!(config.chat.reconnect_delays_ms, vec![1000, 2000, 4000]);
        assert_eq!(config.world.max_fps, 60.0);
        assert_eq!(config.world.max_fade_ms, 5000.0);
        assert_eq!(config.world.seed, None);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind_addr = "127.0.0.1:8080"

            [chat]
            host = "irc.example.com"
            port = 6697
            connect_timeout_secs = 3
            reconnect_delays_ms = [100, 200]
            room_buffer = 32

            [world]
            width = 800.0
            height = 600.0
            seed = 42
        "#;

        let config: DudesConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.chat.host, "irc.example.com");
        assert_eq!(config.chat.room_buffer, 32);
        assert_eq!(config.world.width, 800.0);
        assert_eq!(config.world.seed, Some(42));

        let options = config.chat.bridge_options();
        assert_eq!(options.connect_timeout, Duration::from_secs(3));
        assert_eq!(
            options.reconnect_delays,
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn test_partial_config() {
        // Missing sections and fields use defaults
        let toml = r#"
            [world]
            max_fps = 30.0
        "#;

        let config: DudesConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.world.max_fps, 30.0);
        assert_eq!(config.world.height, 1080.0);
        assert_eq!(config.chat.nick, "justinfan12345");
        assert_eq!(config.chat.emote_cdn_host, "static-cdn.jtvnw.net");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chat]\nport = 7000").unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.chat.port, 7000);
        assert_eq!(config.chat.host, "irc.chat.twitch.tv");
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/dudes.toml").is_err());
    }
}
