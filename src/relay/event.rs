//! Typed waitlist events
//!
//! The server pushes named events with JSON payloads; each known name
//! decodes into one [`RelayEvent`] variant. Connection lifecycle changes are
//! delivered through the same type so subscribers see one stream.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DecodeError;

/// Every event a local subscriber can listen for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    PositionUpdated,
    StatusChanged,
    ReferralSuccess,
    QueueMovement,
    InvitationSent,
    BulkUpdate,
    AdminAction,
    WaitlistEnabled,
    WaitlistDisabled,
    Connected,
    Disconnected,
    ConnectError,
    /// Reconnect budget exhausted (relay-local, never sent by the server)
    Degraded,
}

impl EventKind {
    /// Transport event names the relay registers a handler for, one each
    pub const TRANSPORT_EVENTS: [EventKind; 12] = [
        EventKind::PositionUpdated,
        EventKind::StatusChanged,
        EventKind::ReferralSuccess,
        EventKind::QueueMovement,
        EventKind::InvitationSent,
        EventKind::BulkUpdate,
        EventKind::AdminAction,
        EventKind::WaitlistEnabled,
        EventKind::WaitlistDisabled,
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::ConnectError,
    ];

    /// Name on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PositionUpdated => "position-updated",
            EventKind::StatusChanged => "status-changed",
            EventKind::ReferralSuccess => "referral-success",
            EventKind::QueueMovement => "queue-movement",
            EventKind::InvitationSent => "invitation-sent",
            EventKind::BulkUpdate => "bulk-update",
            EventKind::AdminAction => "admin-action",
            EventKind::WaitlistEnabled => "waitlist-enabled",
            EventKind::WaitlistDisabled => "waitlist-disabled",
            EventKind::Connected => "connect",
            EventKind::Disconnected => "disconnect",
            EventKind::ConnectError => "connect_error",
            EventKind::Degraded => "degraded",
        }
    }

    /// Inverse of [`as_str`](Self::as_str) for transport events
    pub fn from_name(name: &str) -> Option<Self> {
        Self::TRANSPORT_EVENTS
            .iter()
            .copied()
            .find(|kind| kind.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionUpdate {
    pub position: u32,
    pub previous_position: Option<u32>,
    pub total: Option<u32>,
}

impl PositionUpdate {
    /// Positions gained (negative when moved back)
    pub fn gained(&self) -> Option<i64> {
        self.previous_position
            .map(|prev| i64::from(prev) - i64::from(self.position))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusChange {
    pub status: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferralSuccess {
    pub referred_name: Option<String>,
    pub positions_gained: Option<u32>,
    pub new_position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueMovement {
    pub positions_moved: i64,
    pub new_position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvitationSent {
    pub email: Option<String>,
    pub invited_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkUpdate {
    pub updated_count: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminAction {
    pub action: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaitlistToggle {
    pub message: Option<String>,
}

/// A decoded event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum RelayEvent {
    PositionUpdated(PositionUpdate),
    StatusChanged(StatusChange),
    ReferralSuccess(ReferralSuccess),
    QueueMovement(QueueMovement),
    InvitationSent(InvitationSent),
    BulkUpdate(BulkUpdate),
    AdminAction(AdminAction),
    WaitlistEnabled(WaitlistToggle),
    WaitlistDisabled(WaitlistToggle),
    Connected,
    Disconnected { reason: String },
    ConnectError { message: String },
    Degraded { attempts: u32 },
}

fn payload<T: DeserializeOwned + Default>(kind: EventKind, value: &Value) -> Result<T, DecodeError> {
    if value.is_null() {
        return Ok(T::default());
    }
    T::deserialize(value).map_err(|source| DecodeError::Payload {
        event: kind.as_str(),
        source,
    })
}

/// Pull a human-readable string out of a reason/error payload
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl RelayEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RelayEvent::PositionUpdated(_) => EventKind::PositionUpdated,
            RelayEvent::StatusChanged(_) => EventKind::StatusChanged,
            RelayEvent::ReferralSuccess(_) => EventKind::ReferralSuccess,
            RelayEvent::QueueMovement(_) => EventKind::QueueMovement,
            RelayEvent::InvitationSent(_) => EventKind::InvitationSent,
            RelayEvent::BulkUpdate(_) => EventKind::BulkUpdate,
            RelayEvent::AdminAction(_) => EventKind::AdminAction,
            RelayEvent::WaitlistEnabled(_) => EventKind::WaitlistEnabled,
            RelayEvent::WaitlistDisabled(_) => EventKind::WaitlistDisabled,
            RelayEvent::Connected => EventKind::Connected,
            RelayEvent::Disconnected { .. } => EventKind::Disconnected,
            RelayEvent::ConnectError { .. } => EventKind::ConnectError,
            RelayEvent::Degraded { .. } => EventKind::Degraded,
        }
    }

    /// Decode a named transport message
    pub fn decode(name: &str, value: &Value) -> Result<Self, DecodeError> {
        let kind = EventKind::from_name(name).ok_or_else(|| DecodeError::UnknownEvent(name.to_string()))?;
        let event = match kind {
            EventKind::PositionUpdated => RelayEvent::PositionUpdated(payload(kind, value)?),
            EventKind::StatusChanged => RelayEvent::StatusChanged(payload(kind, value)?),
            EventKind::ReferralSuccess => RelayEvent::ReferralSuccess(payload(kind, value)?),
            EventKind::QueueMovement => RelayEvent::QueueMovement(payload(kind, value)?),
            EventKind::InvitationSent => RelayEvent::InvitationSent(payload(kind, value)?),
            EventKind::BulkUpdate => RelayEvent::BulkUpdate(payload(kind, value)?),
            EventKind::AdminAction => RelayEvent::AdminAction(payload(kind, value)?),
            EventKind::WaitlistEnabled => RelayEvent::WaitlistEnabled(payload(kind, value)?),
            EventKind::WaitlistDisabled => RelayEvent::WaitlistDisabled(payload(kind, value)?),
            EventKind::Connected => RelayEvent::Connected,
            EventKind::Disconnected => RelayEvent::Disconnected { reason: text(value) },
            EventKind::ConnectError => RelayEvent::ConnectError { message: text(value) },
            EventKind::Degraded => return Err(DecodeError::UnknownEvent(name.to_string())),
        };
        Ok(event)
    }
}
