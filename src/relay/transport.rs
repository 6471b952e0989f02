//! Transport boundary
//!
//! The relay never speaks a wire protocol itself. It drives a named-event
//! channel (Socket.IO-style) through [`Transport`] and creates new ones
//! through a [`TransportFactory`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use super::error::TransportError;
use crate::settings::TransportOptions;

/// Callback for a named transport event
pub type TransportHandler = Rc<dyn Fn(&Value)>;

/// Opaque auth token passed at construction
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("token", &"<redacted>").finish()
    }
}

/// A bidirectional named-event channel
pub trait Transport {
    fn connect(&self);
    fn disconnect(&self);
    fn connected(&self) -> bool;
    fn emit(&self, event: &str, payload: Value);
    fn on(&self, event: &str, handler: TransportHandler);
    /// Remove a handler previously passed to [`on`](Self::on) (by identity)
    fn off(&self, event: &str, handler: &TransportHandler);
}

/// Builds transports with the caller's credentials and options
pub trait TransportFactory {
    fn create(
        &self,
        url: &str,
        credentials: &Credentials,
        options: &TransportOptions,
    ) -> Result<Rc<dyn Transport>, TransportError>;
}

/// Reason string for a disconnect initiated by the server
pub const SERVER_DISCONNECT: &str = "io server disconnect";
/// Reason string for a disconnect initiated by this client
pub const CLIENT_DISCONNECT: &str = "io client disconnect";

/// In-process transport. The "server" side is driven by hand through
/// [`accept`](Self::accept), [`push`](Self::push), [`drop_connection`](Self::drop_connection)
/// and [`fail`](Self::fail).
#[derive(Default)]
pub struct MemoryTransport {
    handlers: RefCell<HashMap<String, Vec<TransportHandler>>>,
    connected: Cell<bool>,
    connect_calls: Cell<u32>,
    emitted: RefCell<Vec<(String, Value)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every handler registered for `event`
    pub fn push(&self, event: &str, payload: Value) {
        let handlers: Vec<TransportHandler> = self
            .handlers
            .borrow()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(&payload);
        }
    }

    /// Server accepts the pending connection
    pub fn accept(&self) {
        self.connected.set(true);
        self.push("connect", Value::Null);
    }

    /// Connection lost with the given reason
    pub fn drop_connection(&self, reason: &str) {
        self.connected.set(false);
        self.push("disconnect", Value::String(reason.to_string()));
    }

    /// Connection attempt failed
    pub fn fail(&self, message: &str) {
        self.connected.set(false);
        self.push("connect_error", serde_json::json!({ "message": message }));
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.borrow().get(event).map_or(0, Vec::len)
    }

    pub fn total_handlers(&self) -> usize {
        self.handlers.borrow().values().map(Vec::len).sum()
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.get()
    }

    /// Everything the client emitted, oldest first
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.emitted.borrow().clone()
    }
}

impl Transport for MemoryTransport {
    fn connect(&self) {
        self.connect_calls.set(self.connect_calls.get() + 1);
    }

    fn disconnect(&self) {
        if self.connected.get() {
            self.drop_connection(CLIENT_DISCONNECT);
        }
    }

    fn connected(&self) -> bool {
        self.connected.get()
    }

    fn emit(&self, event: &str, payload: Value) {
        self.emitted.borrow_mut().push((event.to_string(), payload));
    }

    fn on(&self, event: &str, handler: TransportHandler) {
        self.handlers
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    fn off(&self, event: &str, handler: &TransportHandler) {
        if let Some(list) = self.handlers.borrow_mut().get_mut(event) {
            list.retain(|h| !Rc::ptr_eq(h, handler));
        }
    }
}

/// Factory handing out [`MemoryTransport`]s and remembering each one
#[derive(Default)]
pub struct MemoryTransportFactory {
    created: RefCell<Vec<Rc<MemoryTransport>>>,
    failures_left: Cell<u32>,
    attempts: Cell<u32>,
    last_options: RefCell<Option<TransportOptions>>,
    last_token: RefCell<Option<String>>,
}

impl MemoryTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` constructions fail
    pub fn fail_next(&self, n: u32) {
        self.failures_left.set(n);
    }

    /// Transports created so far
    pub fn created(&self) -> Vec<Rc<MemoryTransport>> {
        self.created.borrow().clone()
    }

    pub fn latest(&self) -> Option<Rc<MemoryTransport>> {
        self.created.borrow().last().cloned()
    }

    /// Construction attempts, failed ones included
    pub fn attempts(&self) -> u32 {
        self.attempts.get()
    }

    pub fn last_options(&self) -> Option<TransportOptions> {
        self.last_options.borrow().clone()
    }

    pub fn last_token(&self) -> Option<String> {
        self.last_token.borrow().clone()
    }
}

impl TransportFactory for MemoryTransportFactory {
    fn create(
        &self,
        url: &str,
        credentials: &Credentials,
        options: &TransportOptions,
    ) -> Result<Rc<dyn Transport>, TransportError> {
        self.attempts.set(self.attempts.get() + 1);
        *self.last_options.borrow_mut() = Some(options.clone());
        *self.last_token.borrow_mut() = Some(credentials.token.clone());

        let failures = self.failures_left.get();
        if failures > 0 {
            self.failures_left.set(failures - 1);
            return Err(TransportError::Construction {
                url: url.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        let transport = Rc::new(MemoryTransport::new());
        self.created.borrow_mut().push(transport.clone());
        Ok(transport as Rc<dyn Transport>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_on_off_by_identity() {
        let transport = MemoryTransport::new();
        let hits = Rc::new(Cell::new(0));
        let h1: TransportHandler = {
            let hits = hits.clone();
            Rc::new(move |_: &Value| hits.set(hits.get() + 1))
        };
        let h2: TransportHandler = {
            let hits = hits.clone();
            Rc::new(move |_: &Value| hits.set(hits.get() + 10))
        };
        transport.on("bulk-update", h1.clone());
        transport.on("bulk-update", h2.clone());
        transport.push("bulk-update", json!({}));
        assert_eq!(hits.get(), 11);

        transport.off("bulk-update", &h1);
        transport.push("bulk-update", json!({}));
        assert_eq!(hits.get(), 21);
        assert_eq!(transport.handler_count("bulk-update"), 1);
    }

    #[test]
    fn test_factory_failures() {
        let factory = MemoryTransportFactory::new();
        let creds = Credentials::new("t");
        factory.fail_next(1);
        assert!(factory.create("/", &creds, &TransportOptions::default()).is_err());
        assert!(factory.create("/", &creds, &TransportOptions::default()).is_ok());
        assert_eq!(factory.attempts(), 2);
        assert_eq!(factory.created().len(), 1);
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = Credentials::new("secret-token");
        assert!(!format!("{:?}", creds).contains("secret"));
    }
}
