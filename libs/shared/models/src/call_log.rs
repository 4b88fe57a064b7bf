use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit record written by the workflow at every state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub contact_id: Uuid,
    pub rescheduling_request_id: Option<Uuid>,
    pub event: CallLogEvent,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CallLogEntry {
    pub fn new(
        tenant_id: Uuid,
        contact_id: Uuid,
        rescheduling_request_id: Option<Uuid>,
        event: CallLogEvent,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            contact_id,
            rescheduling_request_id,
            event,
            detail,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallLogEvent {
    RescheduleRequested,
    StageCompleted,
    NotificationSent,
    NotificationFailed,
    CustomerResponded,
    RescheduleConfirmed,
    RescheduleCancelled,
    RequestExpired,
    ContactAttemptRecorded,
}
