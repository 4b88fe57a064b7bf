use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::scheduling::AvailabilitySlot;

// ==============================================================================
// CORE RESCHEDULING MODELS
// ==============================================================================

/// The tracked unit of work moving one appointment-change conversation
/// through the workflow. Created once, mutated only by stage processors,
/// never deleted - terminal states are retained for audit and
/// response-time reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReschedulingRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub contact_id: Uuid,
    pub call_session_id: Option<String>,
    /// Unique per tenant; duplicate creation resolves to the existing request.
    pub idempotency_key: String,
    pub webhook_event_id: Option<String>,

    pub original_appointment_time: DateTime<Utc>,
    pub original_appointment_type: Option<String>,
    pub reschedule_reason: RescheduleReason,
    pub customer_preference: Option<String>,
    pub urgency_level: UrgencyLevel,
    pub proposed_times: Vec<DateTime<Utc>>,

    pub status: RequestStatus,
    pub workflow_stage: WorkflowStage,

    /// Frozen snapshot taken at the availability-check stage; recomputed only
    /// if that stage restarts.
    pub available_slots: Vec<AvailabilitySlot>,
    pub final_selected_time: Option<DateTime<Utc>>,
    pub calendar_updated: bool,
    pub confirmation_sent: bool,
    pub processed_by: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub response_time_hours: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReschedulingRequest {
    /// Still waiting on workflow progress or customer input; eligible for the
    /// retention sweep.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Pending | RequestStatus::Blocked | RequestStatus::Approved
        )
    }

    /// Stamp terminal bookkeeping: who resolved it, when, and the elapsed
    /// hours from creation used for responsiveness reporting.
    pub fn mark_resolved(&mut self, processed_by: Option<String>, now: DateTime<Utc>) {
        if processed_by.is_some() {
            self.processed_by = processed_by;
        }
        self.processed_at = Some(now);
        self.response_time_hours = Some((now - self.created_at).num_seconds() as f64 / 3600.0);
        self.updated_at = now;
    }
}

/// Deterministic dedup key collapsing duplicate triggering events into one
/// request. Derived from the call session when present, otherwise from the
/// creation instant.
pub fn derive_idempotency_key(
    tenant_id: Uuid,
    contact_id: Uuid,
    call_session_id: Option<&str>,
    created_at: DateTime<Utc>,
) -> String {
    match call_session_id {
        Some(session) => format!("reschedule:{}:{}:{}", tenant_id, contact_id, session),
        None => format!(
            "reschedule:{}:{}:{}",
            tenant_id,
            contact_id,
            created_at.timestamp()
        ),
    }
}

// ==============================================================================
// WORKFLOW ENUMS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleReason {
    CustomerConflict,
    Emergency,
    Illness,
    PreferDifferentTime,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Urgent,
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Expired,
    Blocked,
    Error,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Rejected | RequestStatus::Expired
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
            RequestStatus::Completed => write!(f, "completed"),
            RequestStatus::Expired => write!(f, "expired"),
            RequestStatus::Blocked => write!(f, "blocked"),
            RequestStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    CustomerRequest,
    AvailabilityCheck,
    Confirmation,
    CalendarUpdate,
    Cancelled,
    Expired,
}

impl WorkflowStage {
    /// Ordered pipeline stages; `Cancelled`/`Expired` are side states
    /// reachable from anywhere.
    pub const PIPELINE: [WorkflowStage; 4] = [
        WorkflowStage::CustomerRequest,
        WorkflowStage::AvailabilityCheck,
        WorkflowStage::Confirmation,
        WorkflowStage::CalendarUpdate,
    ];

    /// Position in the forward pipeline; side states have none.
    pub fn pipeline_order(&self) -> Option<usize> {
        Self::PIPELINE.iter().position(|s| s == self)
    }

    pub fn is_side_state(&self) -> bool {
        matches!(self, WorkflowStage::Cancelled | WorkflowStage::Expired)
    }

    /// A request never regresses from a later stage to an earlier one; the
    /// only sideways moves are cancellation and expiry.
    pub fn can_advance_to(&self, target: WorkflowStage) -> bool {
        if target.is_side_state() {
            return !self.is_side_state();
        }
        match (self.pipeline_order(), target.pipeline_order()) {
            (Some(from), Some(to)) => to >= from,
            _ => false,
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStage::CustomerRequest => write!(f, "customer_request"),
            WorkflowStage::AvailabilityCheck => write!(f, "availability_check"),
            WorkflowStage::Confirmation => write!(f, "confirmation"),
            WorkflowStage::CalendarUpdate => write!(f, "calendar_update"),
            WorkflowStage::Cancelled => write!(f, "cancelled"),
            WorkflowStage::Expired => write!(f, "expired"),
        }
    }
}
