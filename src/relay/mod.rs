//! Waitlist notification relay
//!
//! Subscribes to the server's waitlist events over an injected transport,
//! decodes them into typed events, shows toasts through the notification
//! table, and fans events out to local listeners. Reconnection uses bounded
//! exponential backoff on top of the transport.

pub mod client;
pub mod error;
pub mod event;
pub mod notify;
pub mod scheduler;
pub mod transport;

pub use client::{Listener, NotificationRelay, RelayStatus, Subscription, reconnect_delay};
pub use error::{DecodeError, ListenerError, ListenerResult, SchedulerError, TransportError};
pub use event::{EventKind, RelayEvent};
pub use notify::{
    LogSink, NOTIFICATION_TABLE, Notification, NotificationCategory, NotificationSink,
    RecordingSink, notification_for,
};
pub use scheduler::{ManualScheduler, Scheduler, TimerId};
pub use transport::{
    CLIENT_DISCONNECT, Credentials, MemoryTransport, MemoryTransportFactory, SERVER_DISCONNECT,
    Transport, TransportFactory, TransportHandler,
};
