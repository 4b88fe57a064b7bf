use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::scheduling::CalendarCredential;

/// Rolling contact-history log is capped; the oldest event is dropped when a
/// new one arrives at the cap.
pub const CONTACT_LOG_CAP: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub preferred_channel: ContactChannel,
    pub appointment_time: Option<DateTime<Utc>>,
    pub appointment_status: ContactAppointmentStatus,
    pub appointment_type: Option<String>,
    pub preferred_duration_minutes: i64,
    /// Contact-level calendar binding; overrides the tenant credential when set.
    pub calendar_credential: Option<CalendarCredential>,
    pub engagement: EngagementCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Email,
    Sms,
    Voice,
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactChannel::Email => write!(f, "email"),
            ContactChannel::Sms => write!(f, "sms"),
            ContactChannel::Voice => write!(f, "voice"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactAppointmentStatus {
    Scheduled,
    Pending,
    RescheduleRequested,
    Confirmed,
    Cancelled,
}

impl fmt::Display for ContactAppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactAppointmentStatus::Scheduled => write!(f, "scheduled"),
            ContactAppointmentStatus::Pending => write!(f, "pending"),
            ContactAppointmentStatus::RescheduleRequested => write!(f, "reschedule_requested"),
            ContactAppointmentStatus::Confirmed => write!(f, "confirmed"),
            ContactAppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// ENGAGEMENT HISTORY
// ==============================================================================

/// Persisted behavioral counters; the responsiveness pattern is derived from
/// these on demand, never stored verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub call_attempts: u32,
    pub total_successful_contacts: u32,
    pub consecutive_no_answers: u32,
    pub no_show_count: u32,
    pub contact_pattern_data: Vec<ContactEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub occurred_at: DateTime<Utc>,
    pub channel: ContactChannel,
    pub outcome: ContactOutcome,
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactOutcome {
    Answered,
    NoAnswer,
    Busy,
    Voicemail,
    Failed,
}

impl ContactOutcome {
    pub fn is_successful(&self) -> bool {
        matches!(self, ContactOutcome::Answered)
    }
}
