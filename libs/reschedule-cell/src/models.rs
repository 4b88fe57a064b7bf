use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use notification_cell::models::NotificationError;
use scheduling_cell::models::CalendarError;
use shared_models::error::AppError;
use shared_storage::StorageError;

// Workflow state lives in shared-models so the storage seam can speak the
// same types; re-exported here as the cell's public vocabulary.
pub use shared_models::reschedule::{
    derive_idempotency_key, RequestStatus, RescheduleReason, ReschedulingRequest, UrgencyLevel,
    WorkflowStage,
};

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Inbound payload creating a rescheduling request, whether it arrives from
/// the webhook or the manual API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequestData {
    pub tenant_id: Uuid,
    pub contact_id: Uuid,
    pub call_session_id: Option<String>,
    pub webhook_event_id: Option<String>,
    pub original_appointment_time: Option<DateTime<Utc>>,
    pub original_appointment_type: Option<String>,
    pub reschedule_reason: RescheduleReason,
    pub customer_preference: Option<String>,
    pub urgency_level: UrgencyLevel,
    pub proposed_times: Option<Vec<DateTime<Utc>>>,
}

/// How the engine advances: `Automated` chains stages until one pauses,
/// `Manual` runs exactly one stage per call. Always chosen explicitly by the
/// caller, never inferred from the call path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    Automated,
    Manual,
}

/// Customer reply collected against a response token. `selected_slot_index`
/// of `None` means none of the offered times work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerResponse {
    pub token: String,
    pub selected_slot_index: Option<usize>,
    pub comments: Option<String>,
}

/// What one stage processor produced: the request status to record, a
/// human-readable message for callers, and whether the engine may move on.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub status: RequestStatus,
    pub message: String,
    pub advance: bool,
}

impl StageResult {
    pub fn advance(status: RequestStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            advance: true,
        }
    }

    pub fn halt(status: RequestStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            advance: false,
        }
    }
}

/// Result of one `process_workflow` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub request: ReschedulingRequest,
    pub stages_run: Vec<WorkflowStage>,
    pub message: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RescheduleError {
    #[error("Rescheduling request not found")]
    RequestNotFound,

    #[error("Contact not found")]
    ContactNotFound,

    #[error("Tenant configuration not found")]
    TenantNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Request in stage {0} cannot accept this operation")]
    InvalidStage(WorkflowStage),

    #[error("Request already resolved with status {0}")]
    AlreadyResolved(RequestStatus),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),
}

impl From<RescheduleError> for AppError {
    fn from(err: RescheduleError) -> Self {
        match err {
            RescheduleError::RequestNotFound
            | RescheduleError::ContactNotFound
            | RescheduleError::TenantNotFound => AppError::NotFound(err.to_string()),
            RescheduleError::ValidationError(msg) => AppError::ValidationError(msg),
            RescheduleError::InvalidStage(_) | RescheduleError::AlreadyResolved(_) => {
                AppError::Conflict(err.to_string())
            }
            RescheduleError::Storage(inner) => AppError::Storage(inner.to_string()),
            // Token problems are the responder's to fix, not a server fault.
            RescheduleError::Notification(NotificationError::InvalidToken)
            | RescheduleError::Notification(NotificationError::InvalidSelection { .. }) => {
                AppError::BadRequest(err.to_string())
            }
            RescheduleError::Notification(inner) => AppError::ExternalService(inner.to_string()),
            RescheduleError::Calendar(inner) => AppError::ExternalService(inner.to_string()),
        }
    }
}
