//! Relay configuration
//!
//! Persisted as JSON in the key-value store. Every field has a default so
//! partial or older documents still load.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::platform::storage::KeyValueStore;

/// Options handed to the transport when it is constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    /// Connection timeout (ms)
    pub timeout_ms: u64,
    /// Transports to try, in order
    pub transports: Vec<String>,
    /// Transport-level automatic reconnection. Off: the relay owns retries.
    pub reconnection: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 20_000,
            transports: vec!["websocket".to_string(), "polling".to_string()],
            reconnection: false,
        }
    }
}

/// Notification relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Realtime endpoint
    pub url: String,
    /// First reconnect delay; doubles on every further attempt
    pub base_delay_ms: u64,
    /// Reconnect attempts before giving up
    pub max_attempts: u32,
    pub transport: TransportOptions,
    /// Storage key holding the signed-in user's id (for the room join)
    pub user_id_key: String,
    /// Event emitted after connecting to join the user's waitlist room
    pub room_join_event: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "/".to_string(),
            base_delay_ms: 1000,
            max_attempts: 5,
            transport: TransportOptions::default(),
            user_id_key: "waitlist_user_id".to_string(),
            room_join_event: "join-waitlist".to_string(),
        }
    }
}

impl RelayConfig {
    /// Storage key
    const STORAGE_KEY: &'static str = "waitlist_relay_config";

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Load from the store, falling back to defaults
    pub fn load(store: &dyn KeyValueStore) -> Self {
        if let Some(json) = store.get_item(Self::STORAGE_KEY) {
            match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("Loaded relay config from storage");
                    return config;
                }
                Err(e) => log::warn!("Malformed relay config, using defaults: {}", e),
            }
        }

        log::info!("Using default relay config");
        Self::default()
    }

    /// Save to the store
    pub fn save(&self, store: &dyn KeyValueStore) {
        match serde_json::to_string(self) {
            Ok(json) => {
                if let Err(e) = store.set_item(Self::STORAGE_KEY, &json) {
                    log::warn!("Failed to save relay config: {}", e);
                } else {
                    log::info!("Relay config saved");
                }
            }
            Err(e) => log::warn!("Failed to encode relay config: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::storage::MemoryStore;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay(), Duration::from_secs(1));
        assert_eq!(config.transport.timeout_ms, 20_000);
        assert_eq!(config.transport.transports, ["websocket", "polling"]);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let store = MemoryStore::new();
        store
            .set_item(RelayConfig::STORAGE_KEY, r#"{"url":"wss://rt.example","max_attempts":3}"#)
            .unwrap();
        let config = RelayConfig::load(&store);
        assert_eq!(config.url, "wss://rt.example");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.room_join_event, "join-waitlist");
    }

    #[test]
    fn test_malformed_document_uses_defaults() {
        let store = MemoryStore::new();
        store.set_item(RelayConfig::STORAGE_KEY, "{not json").unwrap();
        assert_eq!(RelayConfig::load(&store), RelayConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        let mut config = RelayConfig::default();
        config.base_delay_ms = 250;
        config.save(&store);
        assert_eq!(RelayConfig::load(&store), config);
    }
}
