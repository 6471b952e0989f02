//! Best score, persisted across runs through the key-value store

use serde::{Deserialize, Serialize};

use crate::platform::storage::KeyValueStore;

/// Best score achieved on this device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestScore {
    value: u32,
}

impl BestScore {
    /// Storage key
    pub const STORAGE_KEY: &'static str = "waitlist_arcade_best_score";

    pub fn new(value: u32) -> Self {
        Self { value }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Record a finished run's score. Returns true if it is a new best.
    pub fn record(&mut self, score: u32) -> bool {
        if score > self.value {
            self.value = score;
            true
        } else {
            false
        }
    }

    /// Load from the store; missing or malformed values count as zero
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match store.get_item(Self::STORAGE_KEY) {
            Some(raw) => match serde_json::from_str::<u32>(raw.trim()) {
                Ok(value) => {
                    log::info!("Loaded best score {}", value);
                    Self { value }
                }
                Err(e) => {
                    log::warn!("Ignoring malformed best score {:?}: {}", raw, e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) {
        if let Err(e) = store.set_item(Self::STORAGE_KEY, &self.value.to_string()) {
            log::warn!("Failed to save best score: {}", e);
        }
    }
}
