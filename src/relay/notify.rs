//! Event -> toast notification table
//!
//! What happened (a [`RelayEvent`]) is kept apart from how it is shown: every
//! user-visible toast comes from exactly one row of [`NOTIFICATION_TABLE`].

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use super::event::{EventKind, RelayEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationCategory {
    Success,
    Info,
    Warning,
    Error,
}

/// A transient user-visible notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub category: NotificationCategory,
    pub message: String,
    /// How long the toast stays up
    pub duration_ms: u32,
}

/// One row of the mapping
pub struct NotificationRule {
    pub kind: EventKind,
    pub category: NotificationCategory,
    pub duration_ms: u32,
    pub message: fn(&RelayEvent) -> String,
}

fn position_message(event: &RelayEvent) -> String {
    match event {
        RelayEvent::PositionUpdated(update) => match update.gained() {
            Some(gained) if gained > 0 => {
                format!("You moved up {} spots! You're now #{}", gained, update.position)
            }
            _ => format!("Your waitlist position is now #{}", update.position),
        },
        _ => String::new(),
    }
}

fn status_message(event: &RelayEvent) -> String {
    match event {
        RelayEvent::StatusChanged(change) => match &change.message {
            Some(message) => message.clone(),
            None => format!("Your waitlist status is now {}", change.status),
        },
        _ => String::new(),
    }
}

fn referral_message(event: &RelayEvent) -> String {
    match event {
        RelayEvent::ReferralSuccess(referral) => {
            let who = referral.referred_name.as_deref().unwrap_or("A friend");
            match referral.positions_gained {
                Some(gained) => format!("{} joined with your link! You moved up {} spots", who, gained),
                None => format!("{} joined with your link!", who),
            }
        }
        _ => String::new(),
    }
}

fn admin_message(event: &RelayEvent) -> String {
    match event {
        RelayEvent::AdminAction(action) => action
            .message
            .clone()
            .unwrap_or_else(|| format!("An administrator updated your account ({})", action.action)),
        _ => String::new(),
    }
}

fn enabled_message(event: &RelayEvent) -> String {
    match event {
        RelayEvent::WaitlistEnabled(toggle) => toggle
            .message
            .clone()
            .unwrap_or_else(|| "The waitlist is now active".to_string()),
        _ => String::new(),
    }
}

fn disabled_message(event: &RelayEvent) -> String {
    match event {
        RelayEvent::WaitlistDisabled(toggle) => toggle
            .message
            .clone()
            .unwrap_or_else(|| "The waitlist is closed. Everyone's in!".to_string()),
        _ => String::new(),
    }
}

fn degraded_message(event: &RelayEvent) -> String {
    match event {
        RelayEvent::Degraded { attempts } => format!(
            "Live waitlist updates are unavailable after {} attempts. Refresh to try again.",
            attempts
        ),
        _ => String::new(),
    }
}

/// The complete event -> notification mapping. Kinds without a row
/// (queue movement, invitations, bulk updates, connection lifecycle)
/// produce no toast.
pub const NOTIFICATION_TABLE: &[NotificationRule] = &[
    NotificationRule {
        kind: EventKind::PositionUpdated,
        category: NotificationCategory::Success,
        duration_ms: 4000,
        message: position_message,
    },
    NotificationRule {
        kind: EventKind::StatusChanged,
        category: NotificationCategory::Info,
        duration_ms: 5000,
        message: status_message,
    },
    NotificationRule {
        kind: EventKind::ReferralSuccess,
        category: NotificationCategory::Success,
        duration_ms: 5000,
        message: referral_message,
    },
    NotificationRule {
        kind: EventKind::AdminAction,
        category: NotificationCategory::Warning,
        duration_ms: 6000,
        message: admin_message,
    },
    NotificationRule {
        kind: EventKind::WaitlistEnabled,
        category: NotificationCategory::Info,
        duration_ms: 4000,
        message: enabled_message,
    },
    NotificationRule {
        kind: EventKind::WaitlistDisabled,
        category: NotificationCategory::Info,
        duration_ms: 4000,
        message: disabled_message,
    },
    NotificationRule {
        kind: EventKind::Degraded,
        category: NotificationCategory::Error,
        duration_ms: 8000,
        message: degraded_message,
    },
];

/// Look up the toast for an event
pub fn notification_for(event: &RelayEvent) -> Option<Notification> {
    let kind = event.kind();
    NOTIFICATION_TABLE
        .iter()
        .find(|rule| rule.kind == kind)
        .map(|rule| Notification {
            category: rule.category,
            message: (rule.message)(event),
            duration_ms: rule.duration_ms,
        })
}

/// Where notifications are shown (the UI's toast layer)
pub trait NotificationSink {
    fn notify(&self, notification: Notification);
}

/// Sink that only logs
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        log::info!("[{:?}] {}", notification.category, notification.message);
    }
}

/// Sink that keeps everything it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: RefCell<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received.borrow().clone()
    }

    pub fn count(&self, category: NotificationCategory) -> usize {
        self.received
            .borrow()
            .iter()
            .filter(|n| n.category == category)
            .count()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.received.borrow_mut().push(notification);
    }
}
