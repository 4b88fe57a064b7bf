use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{AvailabilitySlot, ContactChannel};

/// Customer response tokens stay valid this long by default.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Follow-up reminders carry a shorter window.
pub const FOLLOW_UP_TOKEN_TTL_HOURS: i64 = 12;

/// Context a response token is bound to. Redemption resolves the workflow to
/// act on without any storage lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTokenBinding {
    pub rescheduling_request_id: Uuid,
    pub tenant_id: Uuid,
    pub contact_id: Uuid,
    pub available_slots: Vec<AvailabilitySlot>,
}

/// Result of a successful redemption. `selected_slot` is `None` when the
/// customer declined every offered time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRedemption {
    pub rescheduling_request_id: Uuid,
    pub tenant_id: Uuid,
    pub contact_id: Uuid,
    pub selected_slot: Option<AvailabilitySlot>,
    pub declined: bool,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub delivered: bool,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub token: String,
    pub channel: ContactChannel,
    pub delivery: DeliveryResult,
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("selected slot {index} is out of range ({available} offered)")]
    InvalidSelection { index: usize, available: usize },

    #[error("no adapter registered for channel {0}")]
    ChannelUnavailable(ContactChannel),

    #[error("notification delivery failed: {0}")]
    DeliveryFailed(String),
}
