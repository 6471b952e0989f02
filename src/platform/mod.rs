//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Storage (LocalStorage on web, in-memory elsewhere)
//! - Input filtering (jump keys, never while typing in a form)
//! - Frame loop (requestAnimationFrame on web)
//! - Timers and the realtime socket (setTimeout / Socket.IO on web)

pub mod input;
pub mod storage;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use storage::{KeyValueStore, MemoryStore, StorageError};
