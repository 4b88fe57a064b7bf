use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use engagement_cell::models::{AnalyticsSnapshot, ContactStrategy};
use engagement_cell::services::scoring::ResponsivenessScorer;
use notification_cell::services::dispatch::NotificationService;
use scheduling_cell::models::{BookingAttendee, BookingWindow, CalendarBooking};
use scheduling_cell::services::calendar::CalendarProviderRegistry;
use scheduling_cell::services::slots::{SlotGenerator, SlotQuery};
use shared_models::{
    AvailabilitySlot, CalendarCredential, Contact, ContactChannel, SlotProvider, TenantConfig,
};

use crate::models::{
    RequestStatus, RescheduleError, ReschedulingRequest, StageResult, WorkflowMode, WorkflowStage,
};

/// Everything a stage may read or mutate besides the request itself. The
/// engine loads contact and tenant once per advance and persists them after
/// each stage, so processors work on plain values.
pub struct StageContext {
    pub mode: WorkflowMode,
    pub auto_confirm: bool,
    pub contact: Contact,
    pub tenant: TenantConfig,
    pub now: DateTime<Utc>,
}

impl StageContext {
    /// Contact-level calendar binding wins over the tenant default.
    pub fn calendar_credential(&self) -> Option<&CalendarCredential> {
        self.contact
            .calendar_credential
            .as_ref()
            .or(self.tenant.calendar_credential.as_ref())
    }
}

/// One processor per pipeline stage. A stage is entered only when its guard
/// holds; on success the engine persists the output and consults
/// `next_stage` to advance.
#[async_trait]
pub trait StageProcessor: Send + Sync {
    fn stage(&self) -> WorkflowStage;

    fn next_stage(&self) -> Option<WorkflowStage>;

    fn can_process(&self, request: &ReschedulingRequest) -> bool {
        request.status == RequestStatus::Pending && request.workflow_stage == self.stage()
    }

    async fn process(
        &self,
        request: &mut ReschedulingRequest,
        ctx: &mut StageContext,
    ) -> Result<StageResult, RescheduleError>;
}

// ==============================================================================
// STAGE 1: CUSTOMER REQUEST
// ==============================================================================

pub struct CustomerRequestStage;

#[async_trait]
impl StageProcessor for CustomerRequestStage {
    fn stage(&self) -> WorkflowStage {
        WorkflowStage::CustomerRequest
    }

    fn next_stage(&self) -> Option<WorkflowStage> {
        Some(WorkflowStage::AvailabilityCheck)
    }

    async fn process(
        &self,
        request: &mut ReschedulingRequest,
        ctx: &mut StageContext,
    ) -> Result<StageResult, RescheduleError> {
        if request.contact_id != ctx.contact.id {
            return Ok(StageResult::halt(
                RequestStatus::Error,
                "request is not bound to the loaded contact",
            ));
        }

        info!(
            request_id = %request.id,
            contact_id = %request.contact_id,
            reason = ?request.reschedule_reason,
            urgency = ?request.urgency_level,
            "customer reschedule request received"
        );

        Ok(StageResult::advance(
            RequestStatus::Pending,
            format!(
                "Reschedule request recorded for appointment at {}",
                request.original_appointment_time
            ),
        ))
    }
}

// ==============================================================================
// STAGE 2: AVAILABILITY CHECK
// ==============================================================================

pub struct AvailabilityCheckStage {
    slots: SlotGenerator,
    calendars: Arc<CalendarProviderRegistry>,
}

impl AvailabilityCheckStage {
    pub fn new(slots: SlotGenerator, calendars: Arc<CalendarProviderRegistry>) -> Self {
        Self { slots, calendars }
    }

    /// Pulls existing bookings from the bound provider. A provider failure is
    /// transient; the stage falls back to business hours rather than halting.
    async fn load_bookings(
        &self,
        ctx: &StageContext,
    ) -> (Vec<CalendarBooking>, SlotProvider) {
        let Some(credential) = ctx.calendar_credential() else {
            return (Vec::new(), SlotProvider::BusinessHours);
        };
        let Some(provider) = self.calendars.resolve(credential.kind) else {
            warn!(kind = ?credential.kind, "credential bound to unregistered calendar provider");
            return (Vec::new(), SlotProvider::BusinessHours);
        };

        let window = BookingWindow {
            from: ctx.now,
            to: ctx.now + Duration::days(14),
        };

        match provider.list_bookings(credential, &window).await {
            Ok(bookings) => (bookings, credential.kind.into()),
            Err(err) => {
                warn!(error = %err, "booking lookup failed; falling back to business hours");
                (Vec::new(), SlotProvider::BusinessHours)
            }
        }
    }
}

#[async_trait]
impl StageProcessor for AvailabilityCheckStage {
    fn stage(&self) -> WorkflowStage {
        WorkflowStage::AvailabilityCheck
    }

    fn next_stage(&self) -> Option<WorkflowStage> {
        Some(WorkflowStage::Confirmation)
    }

    /// A blocked check may be retried in place; restarting the stage
    /// recomputes the slot snapshot.
    fn can_process(&self, request: &ReschedulingRequest) -> bool {
        matches!(
            request.status,
            RequestStatus::Pending | RequestStatus::Blocked
        ) && request.workflow_stage == self.stage()
    }

    async fn process(
        &self,
        request: &mut ReschedulingRequest,
        ctx: &mut StageContext,
    ) -> Result<StageResult, RescheduleError> {
        let (bookings, provider) = self.load_bookings(ctx).await;

        let preferred_dates = if request.proposed_times.is_empty() {
            None
        } else {
            let mut dates: Vec<_> = request
                .proposed_times
                .iter()
                .map(|time| time.date_naive())
                .collect();
            dates.sort();
            dates.dedup();
            Some(dates)
        };

        let duration = if ctx.contact.preferred_duration_minutes > 0 {
            ctx.contact.preferred_duration_minutes
        } else {
            30
        };

        let query = SlotQuery {
            duration_minutes: duration,
            preferred_dates,
            original_appointment_time: request.original_appointment_time,
            appointment_type: request.original_appointment_type.clone(),
            provider,
            timezone: Some("UTC".to_string()),
            now: ctx.now,
        };

        let slots = self
            .slots
            .generate(&ctx.tenant.business_hours, &bookings, &query);

        if slots.is_empty() {
            // A business condition, not a system fault; the request waits for
            // an operator or a retry.
            return Ok(StageResult::halt(
                RequestStatus::Blocked,
                "No available slots found for the requested window",
            ));
        }

        let count = slots.len();
        request.available_slots = slots;

        debug!(request_id = %request.id, count, provider = %query.provider, "slot snapshot taken");

        Ok(StageResult::advance(
            RequestStatus::Pending,
            format!("Found {} candidate slots", count),
        ))
    }
}

// ==============================================================================
// STAGE 3: CONFIRMATION
// ==============================================================================

pub struct ConfirmationStage {
    notifications: Arc<NotificationService>,
    scorer: ResponsivenessScorer,
}

impl ConfirmationStage {
    pub fn new(notifications: Arc<NotificationService>, scorer: ResponsivenessScorer) -> Self {
        Self {
            notifications,
            scorer,
        }
    }

    fn alternate_channel(channel: ContactChannel) -> ContactChannel {
        match channel {
            ContactChannel::Email => ContactChannel::Sms,
            ContactChannel::Sms => ContactChannel::Voice,
            ContactChannel::Voice => ContactChannel::Sms,
        }
    }
}

#[async_trait]
impl StageProcessor for ConfirmationStage {
    fn stage(&self) -> WorkflowStage {
        WorkflowStage::Confirmation
    }

    fn next_stage(&self) -> Option<WorkflowStage> {
        Some(WorkflowStage::CalendarUpdate)
    }

    async fn process(
        &self,
        request: &mut ReschedulingRequest,
        ctx: &mut StageContext,
    ) -> Result<StageResult, RescheduleError> {
        let Some(first_slot) = request.available_slots.first().cloned() else {
            return Ok(StageResult::halt(
                RequestStatus::Blocked,
                "No slot snapshot to confirm against",
            ));
        };

        if ctx.mode == WorkflowMode::Automated && ctx.auto_confirm {
            request.final_selected_time = Some(first_slot.start_time);
            return Ok(StageResult::advance(
                RequestStatus::Approved,
                format!("Auto-selected top-ranked slot at {}", first_slot.start_time),
            ));
        }

        // The responsiveness profile decides which channel carries the ask.
        let pattern = self
            .scorer
            .compute_pattern(&ctx.contact, &AnalyticsSnapshot::default());
        let channel_override = match pattern.behavior_predictions.recommended_strategy {
            ContactStrategy::SwitchChannel => {
                Some(Self::alternate_channel(ctx.contact.preferred_channel))
            }
            _ => None,
        };

        debug!(
            request_id = %request.id,
            score = pattern.overall_score,
            strategy = %pattern.behavior_predictions.recommended_strategy,
            "dispatching confirmation request"
        );

        match self
            .notifications
            .notify_slots(&ctx.contact, request, channel_override, false)
            .await
        {
            Ok(receipt) if receipt.delivery.delivered => {
                request.confirmation_sent = true;
                Ok(StageResult::halt(
                    RequestStatus::Pending,
                    format!(
                        "Notification sent via {}; awaiting customer response",
                        receipt.channel
                    ),
                ))
            }
            Ok(receipt) => {
                // Slots stay snapshotted and the request remains resumable
                // from this stage via the follow-up reminder path.
                request.confirmation_sent = false;
                Ok(StageResult::halt(
                    RequestStatus::Pending,
                    format!("Notification via {} reported failure; retry pending", receipt.channel),
                ))
            }
            Err(err) => {
                warn!(request_id = %request.id, error = %err, "confirmation dispatch failed");
                request.confirmation_sent = false;
                Ok(StageResult::halt(
                    RequestStatus::Pending,
                    format!("Notification dispatch failed: {}; retry pending", err),
                ))
            }
        }
    }
}

// ==============================================================================
// STAGE 4: CALENDAR UPDATE
// ==============================================================================

pub struct CalendarUpdateStage {
    calendars: Arc<CalendarProviderRegistry>,
}

impl CalendarUpdateStage {
    pub fn new(calendars: Arc<CalendarProviderRegistry>) -> Self {
        Self { calendars }
    }
}

#[async_trait]
impl StageProcessor for CalendarUpdateStage {
    fn stage(&self) -> WorkflowStage {
        WorkflowStage::CalendarUpdate
    }

    fn next_stage(&self) -> Option<WorkflowStage> {
        None
    }

    /// Entered after approval as well as during automated chaining; a failed
    /// calendar write may be retried in place.
    fn can_process(&self, request: &ReschedulingRequest) -> bool {
        matches!(
            request.status,
            RequestStatus::Pending | RequestStatus::Approved | RequestStatus::Error
        ) && request.workflow_stage == self.stage()
    }

    async fn process(
        &self,
        request: &mut ReschedulingRequest,
        ctx: &mut StageContext,
    ) -> Result<StageResult, RescheduleError> {
        let Some(selected_time) = request.final_selected_time else {
            return Ok(StageResult::halt(
                RequestStatus::Error,
                "Calendar update requires a selected time",
            ));
        };

        let duration = if ctx.contact.preferred_duration_minutes > 0 {
            ctx.contact.preferred_duration_minutes
        } else {
            30
        };

        let message;

        if let Some(credential) = ctx.calendar_credential().cloned() {
            if let Some(provider) = self.calendars.resolve(credential.kind) {
                let slot = AvailabilitySlot {
                    start_time: selected_time,
                    end_time: selected_time + Duration::minutes(duration),
                    duration_minutes: duration,
                    appointment_type: request.original_appointment_type.clone(),
                    provider: credential.kind.into(),
                    location: None,
                    timezone: Some("UTC".to_string()),
                };
                let attendee = BookingAttendee {
                    name: ctx.contact.full_name.clone(),
                    email: ctx.contact.email.clone(),
                    phone: ctx.contact.phone.clone(),
                };

                match provider.create_booking(&credential, &slot, &attendee).await {
                    Ok(booking) => {
                        request.calendar_updated = true;
                        message = format!(
                            "Calendar booking created for {} (id {})",
                            selected_time,
                            booking.id.as_deref().unwrap_or("n/a")
                        );
                    }
                    Err(err) => {
                        // The contact's original data stays intact for
                        // manual reconciliation.
                        warn!(request_id = %request.id, error = %err, "calendar write failed");
                        request.calendar_updated = false;
                        return Ok(StageResult::halt(
                            RequestStatus::Error,
                            format!("Calendar update failed: {}", err),
                        ));
                    }
                }
            } else {
                warn!(kind = ?credential.kind, "no adapter for bound calendar provider");
                request.calendar_updated = false;
                message = "Calendar provider unavailable; update handled manually".to_string();
            }
        } else {
            request.calendar_updated = false;
            message = "No calendar provider bound; update handled manually".to_string();
        }

        ctx.contact.appointment_time = Some(selected_time);
        ctx.contact.appointment_status =
            shared_models::ContactAppointmentStatus::Confirmed;

        request.mark_resolved(None, ctx.now);

        info!(
            request_id = %request.id,
            selected_time = %selected_time,
            calendar_updated = request.calendar_updated,
            "reschedule completed"
        );

        Ok(StageResult::halt(RequestStatus::Completed, message))
    }
}
