//! Reconnecting waitlist notification relay
//!
//! [`NotificationRelay`] is a cheap, clonable handle. It owns the local
//! listener registry and the reconnect policy; the transport is created
//! through the injected factory and only driven (connect/disconnect/on/off).
//! Transport handlers hold a weak reference back to the relay, so dropping
//! every handle drops the relay even while a transport is alive.
//!
//! Everything runs on one thread. Borrows of the relay's cells are never
//! held across a call into the transport, a scheduler or a listener, since
//! any of those can re-enter the relay.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde_json::{Value, json};

use super::error::ListenerResult;
use super::event::{EventKind, RelayEvent};
use super::notify::{NotificationSink, notification_for};
use super::scheduler::{Scheduler, TimerId};
use super::transport::{CLIENT_DISCONNECT, Credentials, Transport, TransportFactory, TransportHandler};
use crate::platform::storage::KeyValueStore;
use crate::settings::RelayConfig;

/// Local subscriber callback
pub type Listener = Rc<dyn Fn(&RelayEvent) -> ListenerResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Backoff delay for a 1-based attempt: `base * 2^(attempt-1)`
pub fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exp)
}

struct Registration {
    id: u64,
    callback: Listener,
}

struct PendingReconnect {
    timer: TimerId,
    generation: u64,
}

struct RelayState {
    status: RelayStatus,
    credentials: Option<Credentials>,
    transport: Option<Rc<dyn Transport>>,
    handlers: Vec<(&'static str, TransportHandler)>,
    reconnect_attempt: u32,
    pending: Option<PendingReconnect>,
    degraded_reported: bool,
}

struct RelayInner {
    config: RelayConfig,
    factory: Rc<dyn TransportFactory>,
    scheduler: Rc<dyn Scheduler>,
    store: Rc<dyn KeyValueStore>,
    sink: Rc<dyn NotificationSink>,
    state: RefCell<RelayState>,
    listeners: RefCell<HashMap<EventKind, Vec<Registration>>>,
    next_listener_id: Cell<u64>,
    next_generation: Cell<u64>,
}

/// Handle returned by [`NotificationRelay::on`]; removes exactly that
/// registration
#[must_use = "dropping a Subscription keeps the listener registered"]
pub struct Subscription {
    relay: Weak<RelayInner>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the listener. Safe to call from inside the listener itself.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.relay.upgrade() {
            inner.remove_listener(self.kind, self.id);
        }
    }
}

/// The waitlist notification relay
#[derive(Clone)]
pub struct NotificationRelay {
    inner: Rc<RelayInner>,
}

impl NotificationRelay {
    pub fn new(
        config: RelayConfig,
        factory: Rc<dyn TransportFactory>,
        scheduler: Rc<dyn Scheduler>,
        store: Rc<dyn KeyValueStore>,
        sink: Rc<dyn NotificationSink>,
    ) -> Self {
        Self {
            inner: Rc::new(RelayInner {
                config,
                factory,
                scheduler,
                store,
                sink,
                state: RefCell::new(RelayState {
                    status: RelayStatus::Disconnected,
                    credentials: None,
                    transport: None,
                    handlers: Vec::new(),
                    reconnect_attempt: 0,
                    pending: None,
                    degraded_reported: false,
                }),
                listeners: RefCell::new(HashMap::new()),
                next_listener_id: Cell::new(1),
                next_generation: Cell::new(1),
            }),
        }
    }

    pub fn status(&self) -> RelayStatus {
        self.inner.state.borrow().status
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.state.borrow().reconnect_attempt
    }

    /// Whether a reconnect timer is pending
    pub fn reconnect_pending(&self) -> bool {
        self.inner.state.borrow().pending.is_some()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.borrow().get(&kind).map_or(0, Vec::len)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Open the connection. No-op while connecting or connected. Otherwise
    /// resets the retry budget, cancels any pending reconnect and builds a
    /// fresh transport.
    pub fn connect(&self, credentials: Credentials) {
        let cancelled = {
            let mut state = self.inner.state.borrow_mut();
            if state.status != RelayStatus::Disconnected {
                log::debug!("connect() ignored, relay is {:?}", state.status);
                return;
            }
            state.credentials = Some(credentials);
            state.reconnect_attempt = 0;
            state.degraded_reported = false;
            state.pending.take()
        };
        if let Some(pending) = cancelled {
            self.inner.scheduler.cancel(pending.timer);
        }
        RelayInner::open_transport(&self.inner);
    }

    /// Full teardown: cancel reconnects, drop the transport and forget every
    /// local listener
    pub fn disconnect(&self) {
        let cancelled = {
            let mut state = self.inner.state.borrow_mut();
            state.credentials = None;
            state.status = RelayStatus::Disconnected;
            state.reconnect_attempt = 0;
            state.pending.take()
        };
        if let Some(pending) = cancelled {
            self.inner.scheduler.cancel(pending.timer);
        }
        self.inner.detach_transport();
        self.inner.listeners.borrow_mut().clear();
        log::info!("Relay disconnected");
    }

    /// Register a listener. Registering the same callback (same `Rc`) twice
    /// for one kind keeps a single registration.
    pub fn on(&self, kind: EventKind, callback: Listener) -> Subscription {
        let mut listeners = self.inner.listeners.borrow_mut();
        let list = listeners.entry(kind).or_default();

        let id = match list.iter().find(|r| Rc::ptr_eq(&r.callback, &callback)) {
            Some(existing) => existing.id,
            None => {
                let id = self.inner.next_listener_id.get();
                self.inner.next_listener_id.set(id + 1);
                list.push(Registration { id, callback });
                id
            }
        };

        Subscription {
            relay: Rc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Remove a listener by identity
    pub fn off(&self, kind: EventKind, callback: &Listener) {
        if let Some(list) = self.inner.listeners.borrow_mut().get_mut(&kind) {
            list.retain(|r| !Rc::ptr_eq(&r.callback, callback));
        }
    }

    /// Deliver an event to the listeners registered for its kind
    pub fn emit_local(&self, event: &RelayEvent) {
        self.inner.emit_local(event);
    }
}

impl RelayInner {
    fn next_generation(&self) -> u64 {
        let generation = self.next_generation.get();
        self.next_generation.set(generation + 1);
        generation
    }

    fn remove_listener(&self, kind: EventKind, id: u64) {
        if let Some(list) = self.listeners.borrow_mut().get_mut(&kind) {
            list.retain(|r| r.id != id);
        }
    }

    fn emit_local(&self, event: &RelayEvent) {
        let kind = event.kind();
        // Snapshot so listeners may (un)subscribe while we iterate
        let callbacks: Vec<Listener> = self
            .listeners
            .borrow()
            .get(&kind)
            .map(|list| list.iter().map(|r| r.callback.clone()).collect())
            .unwrap_or_default();

        for callback in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Listener for {} failed: {}", kind.as_str(), e),
                Err(_) => log::error!("Listener for {} panicked", kind.as_str()),
            }
        }
    }

    /// Unhook and disconnect the current transport, if any
    fn detach_transport(&self) {
        let (transport, handlers) = {
            let mut state = self.state.borrow_mut();
            (state.transport.take(), std::mem::take(&mut state.handlers))
        };
        if let Some(transport) = transport {
            for (name, handler) in &handlers {
                transport.off(name, handler);
            }
            transport.disconnect();
        }
    }

    /// Build a transport for the stored credentials and start connecting
    fn open_transport(self: &Rc<Self>) {
        let Some(credentials) = self.state.borrow().credentials.clone() else {
            return;
        };
        self.detach_transport();
        self.state.borrow_mut().status = RelayStatus::Connecting;

        let transport = match self
            .factory
            .create(&self.config.url, &credentials, &self.config.transport)
        {
            Ok(transport) => transport,
            Err(e) => {
                log::warn!("Transport construction failed: {}", e);
                self.state.borrow_mut().status = RelayStatus::Disconnected;
                Self::handle_reconnection(self);
                return;
            }
        };

        let mut handlers = Vec::with_capacity(EventKind::TRANSPORT_EVENTS.len());
        for kind in EventKind::TRANSPORT_EVENTS {
            let name = kind.as_str();
            let relay = Rc::downgrade(self);
            let handler: TransportHandler = Rc::new(move |payload: &Value| {
                if let Some(inner) = relay.upgrade() {
                    Self::on_transport_event(&inner, name, payload);
                }
            });
            transport.on(name, handler.clone());
            handlers.push((name, handler));
        }

        {
            let mut state = self.state.borrow_mut();
            state.transport = Some(transport.clone());
            state.handlers = handlers;
        }
        log::info!("Connecting to {}", self.config.url);
        transport.connect();
    }

    fn on_transport_event(self: &Rc<Self>, name: &str, payload: &Value) {
        let event = match RelayEvent::decode(name, payload) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Dropping message: {}", e);
                return;
            }
        };

        match &event {
            RelayEvent::Connected => self.on_connected(),
            RelayEvent::Disconnected { reason } => {
                self.state.borrow_mut().status = RelayStatus::Disconnected;
                log::info!("Disconnected: {}", reason);
                self.emit_local(&event);
                // Server kicks and network drops retry; our own disconnects don't
                if reason != CLIENT_DISCONNECT {
                    Self::handle_reconnection(self);
                }
            }
            RelayEvent::ConnectError { message } => {
                self.state.borrow_mut().status = RelayStatus::Disconnected;
                log::warn!("Connection error: {}", message);
                self.emit_local(&event);
                Self::handle_reconnection(self);
            }
            _ => {
                if let Some(notification) = notification_for(&event) {
                    self.sink.notify(notification);
                }
                self.emit_local(&event);
            }
        }
    }

    fn on_connected(&self) {
        let (cancelled, transport) = {
            let mut state = self.state.borrow_mut();
            state.status = RelayStatus::Connected;
            state.reconnect_attempt = 0;
            state.degraded_reported = false;
            (state.pending.take(), state.transport.clone())
        };
        if let Some(pending) = cancelled {
            self.scheduler.cancel(pending.timer);
        }
        log::info!("Relay connected");

        if let (Some(transport), Some(user_id)) =
            (transport, self.store.get_item(&self.config.user_id_key))
        {
            log::debug!("Joining waitlist room for {}", user_id);
            transport.emit(&self.config.room_join_event, json!({ "userId": user_id }));
        }

        self.emit_local(&RelayEvent::Connected);
    }

    /// Schedule the next reconnect with exponential backoff, or report the
    /// degraded state once the budget is spent
    fn handle_reconnection(self: &Rc<Self>) {
        let attempt = {
            let mut state = self.state.borrow_mut();
            if state.credentials.is_none() || state.pending.is_some() {
                return;
            }
            if state.reconnect_attempt >= self.config.max_attempts {
                if state.degraded_reported {
                    return;
                }
                state.degraded_reported = true;
                None
            } else {
                state.reconnect_attempt += 1;
                Some(state.reconnect_attempt)
            }
        };

        let Some(attempt) = attempt else {
            let attempts = self.config.max_attempts;
            log::error!("Giving up after {} reconnect attempts", attempts);
            let event = RelayEvent::Degraded { attempts };
            if let Some(notification) = notification_for(&event) {
                self.sink.notify(notification);
            }
            self.emit_local(&event);
            return;
        };

        let delay = reconnect_delay(self.config.base_delay(), attempt);
        let generation = self.next_generation();
        let relay = Rc::downgrade(self);
        let scheduled = self.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = relay.upgrade() {
                    Self::on_reconnect_timer(&inner, generation);
                }
            }),
        );
        let timer = match scheduled {
            Ok(timer) => timer,
            Err(e) => {
                // Give the attempt back so the next failure event can retry
                log::error!("Reconnect attempt {} not scheduled: {}", attempt, e);
                self.state.borrow_mut().reconnect_attempt = attempt - 1;
                return;
            }
        };
        self.state.borrow_mut().pending = Some(PendingReconnect { timer, generation });
        log::info!(
            "Reconnect attempt {}/{} in {:?}",
            attempt,
            self.config.max_attempts,
            delay
        );
    }

    fn on_reconnect_timer(self: &Rc<Self>, generation: u64) {
        {
            let mut state = self.state.borrow_mut();
            let current = state.pending.as_ref().map(|p| p.generation);
            // Cancelled or superseded
            if current != Some(generation) {
                return;
            }
            state.pending = None;
        }
        Self::open_transport(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::storage::MemoryStore;
    use crate::relay::notify::{NotificationCategory, RecordingSink};
    use crate::relay::scheduler::ManualScheduler;
    use crate::relay::transport::{CLIENT_DISCONNECT, MemoryTransportFactory, SERVER_DISCONNECT};

    struct Harness {
        relay: NotificationRelay,
        factory: Rc<MemoryTransportFactory>,
        scheduler: Rc<ManualScheduler>,
        store: Rc<MemoryStore>,
        sink: Rc<RecordingSink>,
    }

    fn harness() -> Harness {
        let factory = Rc::new(MemoryTransportFactory::new());
        let scheduler = Rc::new(ManualScheduler::new());
        let store = Rc::new(MemoryStore::new());
        let sink = Rc::new(RecordingSink::new());
        let relay = NotificationRelay::new(
            RelayConfig::default(),
            factory.clone(),
            scheduler.clone(),
            store.clone(),
            sink.clone(),
        );
        Harness {
            relay,
            factory,
            scheduler,
            store,
            sink,
        }
    }

    fn counter() -> (Rc<Cell<u32>>, Listener) {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let listener: Listener = Rc::new(move |_: &RelayEvent| -> ListenerResult {
            h.set(h.get() + 1);
            Ok(())
        });
        (hits, listener)
    }

    #[test]
    fn test_reconnect_delay_doubles() {
        let base = Duration::from_millis(1000);
        assert_eq!(reconnect_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(reconnect_delay(base, 2), Duration::from_millis(2000));
        assert_eq!(reconnect_delay(base, 5), Duration::from_millis(16000));
    }

    #[test]
    fn test_connect_registers_every_handler_once() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));

        let transport = h.factory.latest().unwrap();
        for kind in EventKind::TRANSPORT_EVENTS {
            assert_eq!(transport.handler_count(kind.as_str()), 1, "{}", kind.as_str());
        }
        assert_eq!(transport.connect_calls(), 1);
        assert_eq!(h.factory.last_token().as_deref(), Some("tok"));
        assert_eq!(h.factory.last_options(), Some(RelayConfig::default().transport));
        assert_eq!(h.relay.status(), RelayStatus::Connecting);

        transport.accept();
        assert_eq!(h.relay.status(), RelayStatus::Connected);
    }

    #[test]
    fn test_connect_is_idempotent() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));
        h.relay.connect(Credentials::new("tok"));
        assert_eq!(h.factory.created().len(), 1);

        h.factory.latest().unwrap().accept();
        h.relay.connect(Credentials::new("tok"));
        assert_eq!(h.factory.created().len(), 1);
    }

    #[test]
    fn test_join_room_with_stored_user() {
        let h = harness();
        h.store.set_item("waitlist_user_id", "user-42").unwrap();
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        transport.accept();

        let emitted = transport.emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, "join-waitlist");
        assert_eq!(emitted[0].1, json!({ "userId": "user-42" }));
    }

    #[test]
    fn test_no_join_without_user() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        transport.accept();
        assert!(transport.emitted().is_empty());
    }

    #[test]
    fn test_server_event_reaches_listener_and_sink() {
        let h = harness();
        let (hits, listener) = counter();
        let _sub = h.relay.on(EventKind::PositionUpdated, listener);
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        transport.accept();

        transport.push("position-updated", json!({ "position": 3, "previousPosition": 8 }));
        assert_eq!(hits.get(), 1);
        let received = h.sink.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].category, NotificationCategory::Success);
        assert!(received[0].message.contains("#3"));
    }

    #[test]
    fn test_silent_event_has_no_toast() {
        let h = harness();
        let (hits, listener) = counter();
        let _sub = h.relay.on(EventKind::QueueMovement, listener);
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        transport.accept();
        transport.push("queue-movement", json!({ "positionsMoved": 2 }));
        assert_eq!(hits.get(), 1);
        assert!(h.sink.received().is_empty());
    }

    #[test]
    fn test_malformed_payload_dropped() {
        let h = harness();
        let (hits, listener) = counter();
        let _sub = h.relay.on(EventKind::BulkUpdate, listener);
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        transport.push("bulk-update", json!({ "updatedCount": "lots" }));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_duplicate_listener_deduplicated() {
        let h = harness();
        let (hits, listener) = counter();
        let _a = h.relay.on(EventKind::BulkUpdate, listener.clone());
        let _b = h.relay.on(EventKind::BulkUpdate, listener.clone());
        assert_eq!(h.relay.listener_count(EventKind::BulkUpdate), 1);

        h.relay.emit_local(&RelayEvent::BulkUpdate(Default::default()));
        assert_eq!(hits.get(), 1);

        h.relay.off(EventKind::BulkUpdate, &listener);
        assert_eq!(h.relay.listener_count(EventKind::BulkUpdate), 0);
    }

    #[test]
    fn test_unsubscribe_removes_only_its_registration() {
        let h = harness();
        let (hits_a, a) = counter();
        let (hits_b, b) = counter();
        let sub_a = h.relay.on(EventKind::AdminAction, a);
        let _sub_b = h.relay.on(EventKind::AdminAction, b);

        sub_a.unsubscribe();
        h.relay.emit_local(&RelayEvent::AdminAction(Default::default()));
        assert_eq!(hits_a.get(), 0);
        assert_eq!(hits_b.get(), 1);
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let h = harness();
        let failing: Listener = Rc::new(|_: &RelayEvent| -> ListenerResult { Err("boom".into()) });
        let (hits, counting) = counter();
        let _f = h.relay.on(EventKind::StatusChanged, failing);
        let _c = h.relay.on(EventKind::StatusChanged, counting);

        h.relay.emit_local(&RelayEvent::StatusChanged(Default::default()));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let h = harness();
        let panicking: Listener = Rc::new(|_: &RelayEvent| -> ListenerResult { panic!("listener bug") });
        let (hits, counting) = counter();
        let _p = h.relay.on(EventKind::StatusChanged, panicking);
        let _c = h.relay.on(EventKind::StatusChanged, counting);

        h.relay.emit_local(&RelayEvent::StatusChanged(Default::default()));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_listener_unsubscribing_itself_during_dispatch() {
        let h = harness();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let once_hits = Rc::new(Cell::new(0));

        let once: Listener = {
            let slot = slot.clone();
            let once_hits = once_hits.clone();
            Rc::new(move |_: &RelayEvent| -> ListenerResult {
                once_hits.set(once_hits.get() + 1);
                if let Some(sub) = slot.borrow_mut().take() {
                    sub.unsubscribe();
                }
                Ok(())
            })
        };
        let (hits, other) = counter();
        *slot.borrow_mut() = Some(h.relay.on(EventKind::InvitationSent, once));
        let _o = h.relay.on(EventKind::InvitationSent, other);

        let event = RelayEvent::InvitationSent(Default::default());
        h.relay.emit_local(&event);
        h.relay.emit_local(&event);
        assert_eq!(once_hits.get(), 1);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_server_disconnect_schedules_backoff() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));
        let first = h.factory.latest().unwrap();
        first.accept();

        first.drop_connection(SERVER_DISCONNECT);
        assert_eq!(h.relay.status(), RelayStatus::Disconnected);
        assert_eq!(h.relay.reconnect_attempt(), 1);
        assert_eq!(h.scheduler.history(), [Duration::from_millis(1000)]);

        h.scheduler.advance(Duration::from_millis(1000));
        assert_eq!(h.factory.created().len(), 2);
        // The old transport is fully unhooked
        assert_eq!(first.total_handlers(), 0);

        h.factory.latest().unwrap().accept();
        assert_eq!(h.relay.status(), RelayStatus::Connected);
        assert_eq!(h.relay.reconnect_attempt(), 0);
    }

    #[test]
    fn test_network_drop_schedules_backoff() {
        let h = harness();
        assert!(!h.relay.config().transport.reconnection);
        h.relay.connect(Credentials::new("tok"));
        h.factory.latest().unwrap().accept();

        h.factory.latest().unwrap().drop_connection("transport close");
        assert_eq!(h.relay.status(), RelayStatus::Disconnected);
        assert!(h.relay.reconnect_pending());
        assert_eq!(h.scheduler.history(), [Duration::from_millis(1000)]);

        h.scheduler.advance(Duration::from_millis(1000));
        assert_eq!(h.factory.created().len(), 2);
        h.factory.latest().unwrap().accept();
        assert_eq!(h.relay.status(), RelayStatus::Connected);
    }

    #[test]
    fn test_repeated_network_drops_end_degraded() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));
        for _ in 0..=5 {
            h.factory.latest().unwrap().drop_connection("ping timeout");
            h.scheduler.run_all();
        }
        assert_eq!(h.relay.reconnect_attempt(), 5);
        assert!(!h.relay.reconnect_pending());
        assert_eq!(h.factory.created().len(), 6);
        assert_eq!(h.sink.count(NotificationCategory::Error), 1);
    }

    #[test]
    fn test_refused_timer_does_not_wedge_reconnects() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        transport.accept();

        h.scheduler.refuse_next(1);
        transport.drop_connection("transport close");
        assert!(!h.relay.reconnect_pending());
        assert_eq!(h.relay.reconnect_attempt(), 0);

        // The next failure from the same transport gets a real timer
        transport.fail("xhr poll error");
        assert!(h.relay.reconnect_pending());
        assert_eq!(h.relay.reconnect_attempt(), 1);
        h.scheduler.run_all();
        assert_eq!(h.factory.created().len(), 2);
    }

    #[test]
    fn test_client_disconnect_reason_does_not_reconnect() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        transport.accept();
        transport.drop_connection(CLIENT_DISCONNECT);
        assert!(!h.relay.reconnect_pending());
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn test_connect_error_backoff_until_degraded() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));

        let mut delays = Vec::new();
        for attempt in 1..=5u32 {
            h.factory.latest().unwrap().fail("timeout");
            assert_eq!(h.relay.reconnect_attempt(), attempt);
            let delay = reconnect_delay(Duration::from_millis(1000), attempt);
            delays.push(delay);
            h.scheduler.advance(delay);
        }
        assert_eq!(h.scheduler.history(), delays);
        assert_eq!(h.factory.created().len(), 6);

        // Budget spent: next error schedules nothing and reports once
        let (degraded_hits, degraded) = counter();
        let _d = h.relay.on(EventKind::Degraded, degraded);
        h.factory.latest().unwrap().fail("timeout");
        h.factory.latest().unwrap().fail("timeout");
        assert_eq!(h.scheduler.pending(), 0);
        assert!(!h.relay.reconnect_pending());
        assert_eq!(h.sink.count(NotificationCategory::Error), 1);
        assert_eq!(degraded_hits.get(), 1);
    }

    #[test]
    fn test_construction_failure_uses_same_policy() {
        let h = harness();
        h.factory.fail_next(10);
        h.relay.connect(Credentials::new("tok"));
        assert_eq!(h.relay.status(), RelayStatus::Disconnected);
        assert!(h.relay.reconnect_pending());

        h.scheduler.run_all();
        assert_eq!(h.factory.attempts(), 6);
        assert_eq!(h.relay.reconnect_attempt(), 5);
        assert_eq!(h.sink.count(NotificationCategory::Error), 1);
    }

    #[test]
    fn test_manual_connect_after_degraded_resets_budget() {
        let h = harness();
        h.factory.fail_next(6);
        h.relay.connect(Credentials::new("tok"));
        h.scheduler.run_all();
        assert_eq!(h.relay.reconnect_attempt(), 5);

        h.relay.connect(Credentials::new("tok"));
        assert_eq!(h.relay.reconnect_attempt(), 0);
        assert_eq!(h.relay.status(), RelayStatus::Connecting);
        h.factory.latest().unwrap().accept();
        assert_eq!(h.relay.status(), RelayStatus::Connected);
    }

    #[test]
    fn test_manual_connect_while_backoff_pending() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));
        h.factory.latest().unwrap().accept();
        h.factory.latest().unwrap().drop_connection(SERVER_DISCONNECT);
        assert!(h.relay.reconnect_pending());
        assert_eq!(h.relay.reconnect_attempt(), 1);

        h.relay.connect(Credentials::new("tok2"));
        assert!(!h.relay.reconnect_pending());
        assert_eq!(h.scheduler.pending(), 0);
        assert_eq!(h.relay.reconnect_attempt(), 0);
        assert_eq!(h.relay.status(), RelayStatus::Connecting);
        assert_eq!(h.factory.created().len(), 2);
        assert_eq!(h.factory.last_token().as_deref(), Some("tok2"));

        // The cancelled timer never builds a third transport
        h.scheduler.run_all();
        assert_eq!(h.factory.created().len(), 2);
        h.factory.latest().unwrap().accept();
        assert_eq!(h.relay.status(), RelayStatus::Connected);
    }

    #[test]
    fn test_disconnect_cancels_timer_and_clears_listeners() {
        let h = harness();
        let (_, listener) = counter();
        let _sub = h.relay.on(EventKind::PositionUpdated, listener);
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        transport.fail("down");
        assert!(h.relay.reconnect_pending());

        h.relay.disconnect();
        assert_eq!(h.scheduler.pending(), 0);
        assert_eq!(h.relay.listener_count(EventKind::PositionUpdated), 0);
        assert_eq!(transport.total_handlers(), 0);

        // A stale timer firing would build a transport; nothing happens
        h.scheduler.run_all();
        assert_eq!(h.factory.attempts(), 1);
        assert_eq!(h.relay.status(), RelayStatus::Disconnected);
    }

    #[test]
    fn test_successful_connect_cancels_pending_timer() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        transport.fail("slow");
        assert!(h.relay.reconnect_pending());

        // The original transport gets through after all
        transport.accept();
        assert!(!h.relay.reconnect_pending());
        assert_eq!(h.scheduler.pending(), 0);
        h.scheduler.run_all();
        assert_eq!(h.factory.created().len(), 1);
    }

    #[test]
    fn test_dropping_relay_silences_transport() {
        let h = harness();
        h.relay.connect(Credentials::new("tok"));
        let transport = h.factory.latest().unwrap();
        drop(h.relay);
        // Handlers only hold a weak reference
        transport.push("position-updated", json!({ "position": 1 }));
        assert!(h.sink.received().is_empty());
    }
}
