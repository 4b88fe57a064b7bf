use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use engagement_cell::models::AnalyticsSnapshot;
use shared_models::error::AppError;
use shared_models::{ContactChannel, ContactEvent, ContactOutcome};

use crate::models::{
    CustomerResponse, RescheduleReason, RescheduleRequestData, UrgencyLevel, WorkflowMode,
};
use crate::services::workflow::WorkflowEngine;

// ==============================================================================
// PAYLOADS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateRequestPayload {
    #[serde(flatten)]
    pub data: RescheduleRequestData,
    pub mode: WorkflowMode,
    pub auto_confirm: Option<bool>,
}

/// Shape delivered by the upstream voice/calendar platform when a customer
/// signals a conflict. Collapsed into `RescheduleRequestData`; duplicate
/// deliveries dedup on the derived idempotency key.
#[derive(Debug, Deserialize)]
pub struct WebhookEventPayload {
    pub event_id: String,
    pub tenant_id: Uuid,
    pub contact_id: Uuid,
    pub call_session_id: Option<String>,
    pub appointment_time: Option<DateTime<Utc>>,
    pub appointment_type: Option<String>,
    pub reason: Option<RescheduleReason>,
    pub customer_preference: Option<String>,
    pub urgency: Option<UrgencyLevel>,
    pub proposed_times: Option<Vec<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ProcessPayload {
    pub tenant_id: Uuid,
    pub mode: WorkflowMode,
    pub auto_confirm: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPayload {
    pub tenant_id: Uuid,
    pub selected_time: DateTime<Utc>,
    pub processed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelPayload {
    pub tenant_id: Uuid,
    pub reason: String,
    pub processed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct RemindPayload {
    pub tenant_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ResponsivenessQuery {
    pub tenant_id: Uuid,
    pub average_sentiment: Option<f64>,
    pub engagement_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CallOutcomePayload {
    pub tenant_id: Uuid,
    pub channel: ContactChannel,
    pub outcome: ContactOutcome,
    pub occurred_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u32>,
}

// ==============================================================================
// REQUEST LIFECYCLE HANDLERS
// ==============================================================================

/// Manually initiated reschedule. The caller states the workflow mode
/// explicitly; automated mode chains stages immediately after creation.
pub async fn create_reschedule_request(
    State(engine): State<Arc<WorkflowEngine>>,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<Json<Value>, AppError> {
    let (request, created) = engine.create_rescheduling_request(payload.data).await?;

    // A collapsed duplicate is already in flight; re-processing it would
    // re-notify the customer.
    let workflow = if created && payload.mode == WorkflowMode::Automated {
        Some(
            engine
                .process_workflow(
                    request.id,
                    request.tenant_id,
                    WorkflowMode::Automated,
                    payload.auto_confirm.unwrap_or(false),
                )
                .await?,
        )
    } else {
        None
    };

    Ok(Json(json!({
        "request": workflow.as_ref().map(|w| &w.request).unwrap_or(&request),
        "created": created,
        "workflow": workflow,
    })))
}

/// Inbound cancellation/reschedule signal from an external platform. Always
/// runs automated.
pub async fn webhook_appointment_event(
    State(engine): State<Arc<WorkflowEngine>>,
    Json(payload): Json<WebhookEventPayload>,
) -> Result<Json<Value>, AppError> {
    let data = RescheduleRequestData {
        tenant_id: payload.tenant_id,
        contact_id: payload.contact_id,
        call_session_id: payload.call_session_id,
        webhook_event_id: Some(payload.event_id),
        original_appointment_time: payload.appointment_time,
        original_appointment_type: payload.appointment_type,
        reschedule_reason: payload.reason.unwrap_or(RescheduleReason::Other),
        customer_preference: payload.customer_preference,
        urgency_level: payload.urgency.unwrap_or(UrgencyLevel::Normal),
        proposed_times: payload.proposed_times,
    };

    let (request, created) = engine.create_rescheduling_request(data).await?;

    if !created {
        return Ok(Json(json!({
            "request": request,
            "created": false,
            "stages_run": [],
            "message": "Duplicate delivery resolved to existing request",
        })));
    }

    let workflow = engine
        .process_workflow(
            request.id,
            request.tenant_id,
            WorkflowMode::Automated,
            false,
        )
        .await?;

    Ok(Json(json!({
        "request": workflow.request,
        "created": created,
        "stages_run": workflow.stages_run,
        "message": workflow.message,
    })))
}

pub async fn get_request(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(request_id): Path<Uuid>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, AppError> {
    let request = engine.get_request(request_id, query.tenant_id).await?;
    Ok(Json(json!({ "request": request })))
}

pub async fn process_request(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ProcessPayload>,
) -> Result<Json<Value>, AppError> {
    let outcome = engine
        .process_workflow(
            request_id,
            payload.tenant_id,
            payload.mode,
            payload.auto_confirm.unwrap_or(false),
        )
        .await?;
    Ok(Json(json!(outcome)))
}

pub async fn confirm_request(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ConfirmPayload>,
) -> Result<Json<Value>, AppError> {
    let outcome = engine
        .confirm_reschedule(
            request_id,
            payload.tenant_id,
            payload.selected_time,
            &payload.processed_by,
        )
        .await?;
    Ok(Json(json!(outcome)))
}

pub async fn cancel_request(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<CancelPayload>,
) -> Result<Json<Value>, AppError> {
    let request = engine
        .cancel_rescheduling_request(
            request_id,
            payload.tenant_id,
            &payload.reason,
            &payload.processed_by,
        )
        .await?;
    Ok(Json(json!({ "request": request })))
}

pub async fn remind_request(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<RemindPayload>,
) -> Result<Json<Value>, AppError> {
    let receipt = engine
        .send_follow_up_reminder(request_id, payload.tenant_id)
        .await?;
    Ok(Json(json!({
        "channel": receipt.channel,
        "delivered": receipt.delivery.delivered,
    })))
}

// ==============================================================================
// CUSTOMER RESPONSE COLLECTION
// ==============================================================================

/// Accepts `{token, selected_slot_index|null, comments}`. Invalid or expired
/// tokens come back as 400-class responses for the responder to handle.
pub async fn collect_response(
    State(engine): State<Arc<WorkflowEngine>>,
    Json(response): Json<CustomerResponse>,
) -> Result<Json<Value>, AppError> {
    let outcome = engine.handle_customer_response(response).await?;
    Ok(Json(json!(outcome)))
}

// ==============================================================================
// MAINTENANCE & RESPONSIVENESS
// ==============================================================================

pub async fn run_expiry_sweep(
    State(engine): State<Arc<WorkflowEngine>>,
) -> Result<Json<Value>, AppError> {
    let expired = engine.process_expired_requests().await?;
    Ok(Json(json!({ "expired": expired })))
}

pub async fn get_responsiveness(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(contact_id): Path<Uuid>,
    Query(query): Query<ResponsivenessQuery>,
) -> Result<Json<Value>, AppError> {
    let analytics = AnalyticsSnapshot {
        average_sentiment: query.average_sentiment,
        engagement_score: query.engagement_score,
    };
    let pattern = engine
        .contact_responsiveness(contact_id, query.tenant_id, analytics)
        .await?;
    Ok(Json(json!(pattern)))
}

pub async fn record_call_outcome(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(contact_id): Path<Uuid>,
    Json(payload): Json<CallOutcomePayload>,
) -> Result<Json<Value>, AppError> {
    let event = ContactEvent {
        occurred_at: payload.occurred_at.unwrap_or_else(Utc::now),
        channel: payload.channel,
        outcome: payload.outcome,
        duration_seconds: payload.duration_seconds,
    };
    let contact = engine
        .record_call_outcome(contact_id, payload.tenant_id, event)
        .await?;
    Ok(Json(json!({
        "contact_id": contact.id,
        "call_attempts": contact.engagement.call_attempts,
        "consecutive_no_answers": contact.engagement.consecutive_no_answers,
    })))
}
