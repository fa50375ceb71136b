//! Server configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the streaming server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Stream settings.
    pub stream: StreamConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

/// Stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Width every frame is scaled to before encoding.
    pub width: u32,
    /// Height every frame is scaled to before encoding.
    pub height: u32,
    /// Codec quality (1..=100 for jpeg, zstd level for zstd).
    pub quality: u8,
    /// Image codec: "jpeg" or "zstd". Viewers must match.
    pub codec: String,
    /// Target frames per second; 0 streams uncapped.
    pub fps: u32,
    /// Display index to capture (0 = primary).
    pub display: usize,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            stream: StreamConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 9999,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            quality: 90,
            codec: "jpeg".into(),
            fps: 30,
            display: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("host"));
        assert!(text.contains("quality"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 9999);
        assert_eq!(parsed.stream.codec, "jpeg");
        assert_eq!(parsed.stream.fps, 30);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: ServerConfig = toml::from_str("[network]\nport = 4321\n").unwrap();
        assert_eq!(parsed.network.port, 4321);
        assert_eq!(parsed.network.host, "0.0.0.0");
        assert_eq!(parsed.stream.quality, 90);
    }
}
