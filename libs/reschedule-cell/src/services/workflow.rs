use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use engagement_cell::models::{AnalyticsSnapshot, ResponsivenessPattern};
use engagement_cell::services::scoring::ResponsivenessScorer;
use engagement_cell::services::tracking::record_contact_event;
use notification_cell::models::NotificationReceipt;
use notification_cell::services::dispatch::NotificationService;
use scheduling_cell::services::calendar::CalendarProviderRegistry;
use scheduling_cell::services::slots::SlotGenerator;
use shared_models::{
    CallLogEntry, CallLogEvent, Contact, ContactAppointmentStatus, ContactEvent, TenantConfig,
};
use shared_storage::Storage;

use crate::models::{
    derive_idempotency_key, CustomerResponse, RequestStatus, RescheduleError,
    RescheduleRequestData, ReschedulingRequest, WorkflowMode, WorkflowOutcome, WorkflowStage,
};
use crate::services::stages::{
    AvailabilityCheckStage, CalendarUpdateStage, ConfirmationStage, CustomerRequestStage,
    StageContext, StageProcessor,
};

/// Unresolved requests older than this are swept to `expired`.
pub const RETENTION_DAYS: i64 = 7;

/// Orchestrates a rescheduling request through its stages. Request-scoped
/// and single-threaded per request: advancement happens in one bounded loop
/// per call, and only the confirmation stage legitimately pauses for
/// external input.
pub struct WorkflowEngine {
    storage: Arc<dyn Storage>,
    notifications: Arc<NotificationService>,
    scorer: ResponsivenessScorer,
    processors: HashMap<WorkflowStage, Arc<dyn StageProcessor>>,
}

impl WorkflowEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        slot_generator: SlotGenerator,
        calendars: Arc<CalendarProviderRegistry>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        let mut processors: HashMap<WorkflowStage, Arc<dyn StageProcessor>> = HashMap::new();
        processors.insert(
            WorkflowStage::CustomerRequest,
            Arc::new(CustomerRequestStage),
        );
        processors.insert(
            WorkflowStage::AvailabilityCheck,
            Arc::new(AvailabilityCheckStage::new(
                slot_generator,
                Arc::clone(&calendars),
            )),
        );
        processors.insert(
            WorkflowStage::Confirmation,
            Arc::new(ConfirmationStage::new(
                Arc::clone(&notifications),
                ResponsivenessScorer::new(),
            )),
        );
        processors.insert(
            WorkflowStage::CalendarUpdate,
            Arc::new(CalendarUpdateStage::new(calendars)),
        );

        Self {
            storage,
            notifications,
            scorer: ResponsivenessScorer::new(),
            processors,
        }
    }

    pub fn notifications(&self) -> Arc<NotificationService> {
        Arc::clone(&self.notifications)
    }

    // ==========================================================================
    // INTAKE
    // ==========================================================================

    /// Validates and persists a new rescheduling request. Duplicate triggers
    /// carrying the same idempotency key resolve to the already-persisted
    /// request; the boolean reports whether this call created it.
    #[instrument(skip(self, data), fields(tenant_id = %data.tenant_id, contact_id = %data.contact_id))]
    pub async fn create_rescheduling_request(
        &self,
        data: RescheduleRequestData,
    ) -> Result<(ReschedulingRequest, bool), RescheduleError> {
        let original_time = data.original_appointment_time.ok_or_else(|| {
            RescheduleError::ValidationError("original_appointment_time is required".to_string())
        })?;

        let mut contact = self.load_contact(data.contact_id, data.tenant_id).await?;
        if self
            .storage
            .get_tenant_config(data.tenant_id)
            .await?
            .is_none()
        {
            return Err(RescheduleError::TenantNotFound);
        }

        let now = Utc::now();
        let request = ReschedulingRequest {
            id: Uuid::new_v4(),
            tenant_id: data.tenant_id,
            contact_id: data.contact_id,
            call_session_id: data.call_session_id.clone(),
            idempotency_key: derive_idempotency_key(
                data.tenant_id,
                data.contact_id,
                data.call_session_id.as_deref(),
                now,
            ),
            webhook_event_id: data.webhook_event_id,
            original_appointment_time: original_time,
            original_appointment_type: data.original_appointment_type,
            reschedule_reason: data.reschedule_reason,
            customer_preference: data.customer_preference,
            urgency_level: data.urgency_level,
            proposed_times: data.proposed_times.unwrap_or_default(),
            status: RequestStatus::Pending,
            workflow_stage: WorkflowStage::CustomerRequest,
            available_slots: Vec::new(),
            final_selected_time: None,
            calendar_updated: false,
            confirmation_sent: false,
            processed_by: None,
            processed_at: None,
            response_time_hours: None,
            created_at: now,
            updated_at: now,
        };

        let outcome = self.storage.create_rescheduling_request(request).await?;

        if outcome.created {
            contact.appointment_status = ContactAppointmentStatus::RescheduleRequested;
            contact.updated_at = now;
            self.storage.update_contact(&contact).await?;
            self.storage
                .create_call_log(CallLogEntry::new(
                    data.tenant_id,
                    data.contact_id,
                    Some(outcome.request.id),
                    CallLogEvent::RescheduleRequested,
                    Some(format!("reason: {:?}", outcome.request.reschedule_reason)),
                ))
                .await?;
            info!(request_id = %outcome.request.id, "rescheduling request created");
        } else {
            info!(
                request_id = %outcome.request.id,
                "duplicate trigger collapsed into existing request"
            );
        }

        Ok((outcome.request, outcome.created))
    }

    // ==========================================================================
    // ADVANCEMENT
    // ==========================================================================

    /// Advances the request through eligible stages. Automated mode chains
    /// until a stage pauses, blocks, or completes; manual mode runs exactly
    /// one stage. The loop is bounded by the pipeline length, so a
    /// mis-registered stage can never spin.
    #[instrument(skip(self), fields(request_id = %request_id, mode = ?mode))]
    pub async fn process_workflow(
        &self,
        request_id: Uuid,
        tenant_id: Uuid,
        mode: WorkflowMode,
        auto_confirm: bool,
    ) -> Result<WorkflowOutcome, RescheduleError> {
        let mut request = self.load_request(request_id, tenant_id).await?;

        if request.workflow_stage.is_side_state() || request.status.is_terminal() {
            let message = format!(
                "Request is {} in stage {}; nothing to process",
                request.status, request.workflow_stage
            );
            return Ok(WorkflowOutcome {
                request,
                stages_run: Vec::new(),
                message,
            });
        }

        let contact = self.load_contact(request.contact_id, tenant_id).await?;
        let tenant = self.load_tenant(tenant_id).await?;

        let mut ctx = StageContext {
            mode,
            auto_confirm,
            contact,
            tenant,
            now: Utc::now(),
        };

        let mut stages_run = Vec::new();
        let mut message = String::from("No stage was eligible to run");

        for _ in 0..WorkflowStage::PIPELINE.len() {
            let stage = request.workflow_stage;
            let Some(processor) = self.processors.get(&stage) else {
                break;
            };
            if !processor.can_process(&request) {
                break;
            }

            debug!(request_id = %request.id, %stage, "entering stage");
            let result = processor.process(&mut request, &mut ctx).await?;

            request.status = result.status;
            request.updated_at = ctx.now;

            if result.advance {
                if let Some(next) = processor.next_stage() {
                    if request.workflow_stage.can_advance_to(next) {
                        request.workflow_stage = next;
                    }
                }
            }

            self.storage.update_rescheduling_request(&request).await?;
            self.storage.update_contact(&ctx.contact).await?;
            self.storage
                .create_call_log(CallLogEntry::new(
                    tenant_id,
                    request.contact_id,
                    Some(request.id),
                    CallLogEvent::StageCompleted,
                    Some(format!("{}: {}", stage, result.message)),
                ))
                .await?;

            // A paused confirmation means a notification was attempted.
            if stage == WorkflowStage::Confirmation && !result.advance {
                let event = if request.confirmation_sent {
                    CallLogEvent::NotificationSent
                } else {
                    CallLogEvent::NotificationFailed
                };
                self.storage
                    .create_call_log(CallLogEntry::new(
                        tenant_id,
                        request.contact_id,
                        Some(request.id),
                        event,
                        None,
                    ))
                    .await?;
            }

            stages_run.push(stage);
            message = result.message;

            if !result.advance || mode == WorkflowMode::Manual {
                break;
            }
        }

        info!(
            request_id = %request.id,
            stages = stages_run.len(),
            status = %request.status,
            stage = %request.workflow_stage,
            "workflow advance finished"
        );

        Ok(WorkflowOutcome {
            request,
            stages_run,
            message,
        })
    }

    // ==========================================================================
    // EXTERNAL RESOLUTION PATHS
    // ==========================================================================

    /// Supplies the customer's (or an operator's) chosen time, then resumes
    /// the engine from the calendar-update stage.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn confirm_reschedule(
        &self,
        request_id: Uuid,
        tenant_id: Uuid,
        selected_time: DateTime<Utc>,
        processed_by: &str,
    ) -> Result<WorkflowOutcome, RescheduleError> {
        let mut request = self.load_request(request_id, tenant_id).await?;

        if request.status.is_terminal() {
            return Err(RescheduleError::AlreadyResolved(request.status));
        }
        if request.workflow_stage.is_side_state() {
            return Err(RescheduleError::InvalidStage(request.workflow_stage));
        }

        let mut contact = self.load_contact(request.contact_id, tenant_id).await?;
        let now = Utc::now();

        request.final_selected_time = Some(selected_time);
        request.status = RequestStatus::Approved;
        request.processed_by = Some(processed_by.to_string());
        request.workflow_stage = WorkflowStage::CalendarUpdate;
        request.updated_at = now;

        contact.appointment_time = Some(selected_time);
        contact.appointment_status = ContactAppointmentStatus::Confirmed;
        contact.updated_at = now;

        self.storage.update_rescheduling_request(&request).await?;
        self.storage.update_contact(&contact).await?;
        self.storage
            .create_call_log(CallLogEntry::new(
                tenant_id,
                request.contact_id,
                Some(request.id),
                CallLogEvent::RescheduleConfirmed,
                Some(format!("selected {} by {}", selected_time, processed_by)),
            ))
            .await?;

        self.process_workflow(request_id, tenant_id, WorkflowMode::Automated, false)
            .await
    }

    /// Operator cancellation: moves the request to the terminal cancelled
    /// side state and restores the contact's standing appointment. Any
    /// further automated advancement short-circuits on the side state.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn cancel_rescheduling_request(
        &self,
        request_id: Uuid,
        tenant_id: Uuid,
        reason: &str,
        processed_by: &str,
    ) -> Result<ReschedulingRequest, RescheduleError> {
        let mut request = self.load_request(request_id, tenant_id).await?;

        if request.status.is_terminal() {
            return Err(RescheduleError::AlreadyResolved(request.status));
        }

        let now = Utc::now();
        request.status = RequestStatus::Rejected;
        request.workflow_stage = WorkflowStage::Cancelled;
        request.mark_resolved(Some(processed_by.to_string()), now);

        let mut contact = self.load_contact(request.contact_id, tenant_id).await?;
        contact.appointment_status = ContactAppointmentStatus::Scheduled;
        contact.updated_at = now;

        self.storage.update_rescheduling_request(&request).await?;
        self.storage.update_contact(&contact).await?;
        self.storage
            .create_call_log(CallLogEntry::new(
                tenant_id,
                request.contact_id,
                Some(request.id),
                CallLogEvent::RescheduleCancelled,
                Some(format!("{} (by {})", reason, processed_by)),
            ))
            .await?;

        info!(request_id = %request.id, "rescheduling request cancelled");
        Ok(request)
    }

    /// Redeems a customer's response token and resolves the bound request: a
    /// valid slot selection confirms it, a decline cancels it.
    pub async fn handle_customer_response(
        &self,
        response: CustomerResponse,
    ) -> Result<WorkflowOutcome, RescheduleError> {
        let redemption = self
            .notifications
            .token_service()
            .redeem(&response.token, response.selected_slot_index)
            .await?;

        self.storage
            .create_call_log(CallLogEntry::new(
                redemption.tenant_id,
                redemption.contact_id,
                Some(redemption.rescheduling_request_id),
                CallLogEvent::CustomerResponded,
                response.comments.clone(),
            ))
            .await?;

        if redemption.declined {
            let mut request = self
                .load_request(redemption.rescheduling_request_id, redemption.tenant_id)
                .await?;
            let now = Utc::now();

            request.status = RequestStatus::Rejected;
            request.workflow_stage = WorkflowStage::Cancelled;
            request.mark_resolved(Some("customer_response".to_string()), now);

            let mut contact = self
                .load_contact(request.contact_id, redemption.tenant_id)
                .await?;
            contact.appointment_status = ContactAppointmentStatus::Scheduled;
            contact.updated_at = now;

            self.storage.update_rescheduling_request(&request).await?;
            self.storage.update_contact(&contact).await?;
            self.storage
                .create_call_log(CallLogEntry::new(
                    redemption.tenant_id,
                    request.contact_id,
                    Some(request.id),
                    CallLogEvent::RescheduleCancelled,
                    Some("customer declined all offered slots".to_string()),
                ))
                .await?;

            info!(request_id = %request.id, "customer declined offered slots");
            return Ok(WorkflowOutcome {
                request,
                stages_run: Vec::new(),
                message: "Customer declined all offered slots".to_string(),
            });
        }

        let slot = redemption.selected_slot.ok_or_else(|| {
            RescheduleError::ValidationError("redemption carried no selected slot".to_string())
        })?;

        self.confirm_reschedule(
            redemption.rescheduling_request_id,
            redemption.tenant_id,
            slot.start_time,
            "customer_response",
        )
        .await
    }

    /// Re-dispatches the confirmation ask with a fresh, shorter-lived token.
    /// Only meaningful while the request is paused in confirmation.
    pub async fn send_follow_up_reminder(
        &self,
        request_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<NotificationReceipt, RescheduleError> {
        let mut request = self.load_request(request_id, tenant_id).await?;

        if request.workflow_stage != WorkflowStage::Confirmation
            || request.status != RequestStatus::Pending
        {
            return Err(RescheduleError::InvalidStage(request.workflow_stage));
        }

        let contact = self.load_contact(request.contact_id, tenant_id).await?;
        let receipt = self
            .notifications
            .notify_slots(&contact, &request, None, true)
            .await?;

        request.confirmation_sent = receipt.delivery.delivered;
        request.updated_at = Utc::now();
        self.storage.update_rescheduling_request(&request).await?;

        let event = if receipt.delivery.delivered {
            CallLogEvent::NotificationSent
        } else {
            CallLogEvent::NotificationFailed
        };
        self.storage
            .create_call_log(CallLogEntry::new(
                tenant_id,
                request.contact_id,
                Some(request.id),
                event,
                Some("follow-up reminder".to_string()),
            ))
            .await?;

        Ok(receipt)
    }

    // ==========================================================================
    // MAINTENANCE
    // ==========================================================================

    /// Sweeps unresolved requests past the retention window to `expired` and
    /// reverts their contacts to a pending appointment. Bounds how long a
    /// stalled request can linger.
    pub async fn process_expired_requests(&self) -> Result<usize, RescheduleError> {
        let now = Utc::now();
        let cutoff = now - Duration::days(RETENTION_DAYS);
        let stale = self.storage.list_unresolved_requests_before(cutoff).await?;

        let mut expired = 0;
        for mut request in stale {
            request.status = RequestStatus::Expired;
            request.workflow_stage = WorkflowStage::Expired;
            request.mark_resolved(Some("retention_sweep".to_string()), now);

            self.storage.update_rescheduling_request(&request).await?;

            if let Some(mut contact) = self
                .storage
                .get_contact(request.contact_id, request.tenant_id)
                .await?
            {
                contact.appointment_status = ContactAppointmentStatus::Pending;
                contact.updated_at = now;
                self.storage.update_contact(&contact).await?;
            } else {
                warn!(request_id = %request.id, "expired request has no contact to revert");
            }

            self.storage
                .create_call_log(CallLogEntry::new(
                    request.tenant_id,
                    request.contact_id,
                    Some(request.id),
                    CallLogEvent::RequestExpired,
                    Some(format!("unresolved for over {} days", RETENTION_DAYS)),
                ))
                .await?;

            expired += 1;
        }

        if expired > 0 {
            info!(expired, "swept stale rescheduling requests");
        }
        Ok(expired)
    }

    // ==========================================================================
    // RESPONSIVENESS
    // ==========================================================================

    /// Folds a call outcome into the contact's history, independent of any
    /// rescheduling flow.
    pub async fn record_call_outcome(
        &self,
        contact_id: Uuid,
        tenant_id: Uuid,
        event: ContactEvent,
    ) -> Result<Contact, RescheduleError> {
        let mut contact = self.load_contact(contact_id, tenant_id).await?;
        let outcome = event.outcome;
        record_contact_event(&mut contact, event);
        self.storage.update_contact(&contact).await?;
        self.storage
            .create_call_log(CallLogEntry::new(
                tenant_id,
                contact_id,
                None,
                CallLogEvent::ContactAttemptRecorded,
                Some(format!("outcome: {:?}", outcome)),
            ))
            .await?;
        Ok(contact)
    }

    /// On-demand behavioral profile for a contact.
    pub async fn contact_responsiveness(
        &self,
        contact_id: Uuid,
        tenant_id: Uuid,
        analytics: AnalyticsSnapshot,
    ) -> Result<ResponsivenessPattern, RescheduleError> {
        let contact = self.load_contact(contact_id, tenant_id).await?;
        Ok(self.scorer.compute_pattern(&contact, &analytics))
    }

    pub async fn get_request(
        &self,
        request_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<ReschedulingRequest, RescheduleError> {
        self.load_request(request_id, tenant_id).await
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn load_request(
        &self,
        request_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<ReschedulingRequest, RescheduleError> {
        self.storage
            .get_rescheduling_request(request_id, tenant_id)
            .await?
            .ok_or(RescheduleError::RequestNotFound)
    }

    async fn load_contact(
        &self,
        contact_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Contact, RescheduleError> {
        self.storage
            .get_contact(contact_id, tenant_id)
            .await?
            .ok_or(RescheduleError::ContactNotFound)
    }

    async fn load_tenant(&self, tenant_id: Uuid) -> Result<TenantConfig, RescheduleError> {
        self.storage
            .get_tenant_config(tenant_id)
            .await?
            .ok_or(RescheduleError::TenantNotFound)
    }
}
