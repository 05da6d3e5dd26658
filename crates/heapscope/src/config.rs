//! Server and visualizer configuration.

use heapscope_transport::{FrameConfig, DEFAULT_MAX_FRAME_LEN};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Configuration for a heap server.
///
/// Drivers can load this from a file; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name announced to visualizers during the handshake.
    pub name: String,

    /// Free text sent with the bootstrap (collector description, flags).
    pub general_info: String,

    /// Largest frame payload in either direction.
    pub max_frame_len: usize,

    /// Count events and time them with the built-in stopwatches. Without
    /// it every enabled event is transmitted regardless of its period.
    pub collect_stats: bool,
}

impl ServerConfig {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig::with_max_frame_len(self.max_frame_len)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "heapscope".to_string(),
            general_info: String::new(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            collect_stats: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for a visualizer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Ask the server to pause at its first safepoint.
    pub pause_at_start: bool,

    /// Largest frame payload in either direction.
    pub max_frame_len: usize,

    /// Bound of the notification channel. The receive loop waits when it
    /// is full, which in turn holds the server at its next send.
    pub notification_capacity: usize,
}

impl ClientConfig {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig::with_max_frame_len(self.max_frame_len)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pause_at_start: false,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            notification_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_frame_len, 4 * 1024 * 1024);
        assert!(config.collect_stats);
        assert_eq!(config.frame_config().max_frame_len, config.max_frame_len);
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(!config.pause_at_start);
        assert_eq!(config.notification_capacity, 64);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{ "name": "JikesRVM", "collect_stats": false }"#).unwrap();
        assert_eq!(config.name, "JikesRVM");
        assert!(!config.collect_stats);
        assert_eq!(config.max_frame_len, DEFAULT_MAX_FRAME_LEN);

        let config: ClientConfig = serde_json::from_str(r#"{ "pause_at_start": true }"#).unwrap();
        assert!(config.pause_at_start);
        assert_eq!(config.notification_capacity, 64);
    }
}
