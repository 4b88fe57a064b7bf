use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use notification_cell::models::{DeliveryResult, NotificationError, RenderedMessage};
use notification_cell::services::channels::NotificationChannel;
use notification_cell::services::dispatch::NotificationService;
use notification_cell::services::tokens::ResponseTokenService;
use reschedule_cell::models::{
    CustomerResponse, RequestStatus, RescheduleError, RescheduleReason, RescheduleRequestData,
    UrgencyLevel, WorkflowMode, WorkflowStage,
};
use reschedule_cell::services::workflow::WorkflowEngine;
use scheduling_cell::services::calendar::CalendarProviderRegistry;
use scheduling_cell::services::slots::SlotGenerator;
use shared_models::{
    derive_idempotency_key, AvailabilitySlot, BusinessCategory, BusinessHoursProfile, Contact,
    ContactAppointmentStatus, ContactChannel, EngagementCounters, ReschedulingRequest, TenantConfig,
    WeekdayHours,
};
use shared_storage::{MemoryStorage, Storage};

// ==============================================================================
// FIXTURES
// ==============================================================================

struct TestSetup {
    storage: Arc<MemoryStorage>,
    engine: WorkflowEngine,
    tokens: Arc<ResponseTokenService>,
    tenant_id: Uuid,
    contact_id: Uuid,
    captured_token: Arc<Mutex<Option<String>>>,
}

/// Channel adapter that records the response token it was asked to render,
/// so tests can play the customer.
struct CapturingChannel {
    captured: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl NotificationChannel for CapturingChannel {
    fn channel(&self) -> ContactChannel {
        ContactChannel::Sms
    }

    fn render(&self, _: &Contact, _: &[AvailabilitySlot], token: &str) -> RenderedMessage {
        *self.captured.lock().unwrap() = Some(token.to_string());
        RenderedMessage {
            subject: None,
            body: "options".to_string(),
        }
    }

    async fn send(
        &self,
        _: &Contact,
        _: &RenderedMessage,
    ) -> Result<DeliveryResult, NotificationError> {
        Ok(DeliveryResult {
            delivered: true,
            external_id: Some("test-sms".to_string()),
        })
    }
}

struct BrokenChannel;

#[async_trait]
impl NotificationChannel for BrokenChannel {
    fn channel(&self) -> ContactChannel {
        ContactChannel::Sms
    }

    fn render(&self, _: &Contact, _: &[AvailabilitySlot], _: &str) -> RenderedMessage {
        RenderedMessage {
            subject: None,
            body: "unused".to_string(),
        }
    }

    async fn send(
        &self,
        _: &Contact,
        _: &RenderedMessage,
    ) -> Result<DeliveryResult, NotificationError> {
        Err(NotificationError::DeliveryFailed("gateway down".into()))
    }
}

async fn setup_with(
    business_hours: Option<BusinessHoursProfile>,
    broken_channel: bool,
) -> TestSetup {
    let storage = Arc::new(MemoryStorage::new());
    let tenant_id = Uuid::new_v4();
    let contact_id = Uuid::new_v4();
    let now = Utc::now();

    let mut tenant = TenantConfig::new(tenant_id, "North Clinic", BusinessCategory::MedicalPractice);
    if let Some(hours) = business_hours {
        tenant.business_hours = hours;
    }
    storage.insert_tenant(tenant).await;

    storage
        .insert_contact(Contact {
            id: contact_id,
            tenant_id,
            full_name: "Dana Whitfield".to_string(),
            email: Some("dana@example.com".to_string()),
            phone: Some("+15550123".to_string()),
            preferred_channel: ContactChannel::Sms,
            appointment_time: Some(now + Duration::days(3)),
            appointment_status: ContactAppointmentStatus::Scheduled,
            appointment_type: Some("consultation".to_string()),
            preferred_duration_minutes: 30,
            calendar_credential: None,
            engagement: EngagementCounters::default(),
            created_at: now,
            updated_at: now,
        })
        .await;

    let tokens = Arc::new(ResponseTokenService::new());
    let captured_token = Arc::new(Mutex::new(None));
    let mut notifications = NotificationService::new(Arc::clone(&tokens));
    if broken_channel {
        notifications.register(Arc::new(BrokenChannel));
    } else {
        notifications.register(Arc::new(CapturingChannel {
            captured: Arc::clone(&captured_token),
        }));
    }

    let engine = WorkflowEngine::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        SlotGenerator::new(),
        Arc::new(CalendarProviderRegistry::new()),
        Arc::new(notifications),
    );

    TestSetup {
        storage,
        engine,
        tokens,
        tenant_id,
        contact_id,
        captured_token,
    }
}

async fn setup() -> TestSetup {
    setup_with(None, false).await
}

fn request_data(setup: &TestSetup, session: Option<&str>) -> RescheduleRequestData {
    RescheduleRequestData {
        tenant_id: setup.tenant_id,
        contact_id: setup.contact_id,
        call_session_id: session.map(str::to_string),
        webhook_event_id: None,
        original_appointment_time: Some(Utc::now() + Duration::days(3)),
        original_appointment_type: Some("consultation".to_string()),
        reschedule_reason: RescheduleReason::CustomerConflict,
        customer_preference: None,
        urgency_level: UrgencyLevel::Normal,
        proposed_times: None,
    }
}

fn closed_profile() -> BusinessHoursProfile {
    BusinessHoursProfile {
        days: [WeekdayHours::closed(); 7],
    }
}

// ==============================================================================
// INTAKE & IDEMPOTENCY
// ==============================================================================

#[tokio::test]
async fn creation_requires_an_original_appointment_time() {
    let setup = setup().await;
    let mut data = request_data(&setup, Some("call-1"));
    data.original_appointment_time = None;

    let result = setup.engine.create_rescheduling_request(data).await;
    assert_matches!(result, Err(RescheduleError::ValidationError(_)));
    assert_eq!(setup.storage.request_count().await, 0);
}

#[tokio::test]
async fn duplicate_triggers_collapse_into_one_request() {
    let setup = setup().await;

    let (first, created_first) = setup
        .engine
        .create_rescheduling_request(request_data(&setup, Some("call-9")))
        .await
        .unwrap();
    let (second, created_second) = setup
        .engine
        .create_rescheduling_request(request_data(&setup, Some("call-9")))
        .await
        .unwrap();

    assert!(created_first);
    assert!(!created_second);
    assert_eq!(first.id, second.id);
    assert_eq!(setup.storage.request_count().await, 1);
}

#[tokio::test]
async fn creation_flags_the_contact_as_reschedule_requested() {
    let setup = setup().await;
    setup
        .engine
        .create_rescheduling_request(request_data(&setup, Some("call-2")))
        .await
        .unwrap();

    let contact = setup
        .storage
        .get_contact(setup.contact_id, setup.tenant_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        contact.appointment_status,
        ContactAppointmentStatus::RescheduleRequested
    );
}

// ==============================================================================
// AUTOMATED ADVANCEMENT
// ==============================================================================

#[tokio::test]
async fn automated_flow_pauses_at_confirmation() {
    let setup = setup().await;
    let (request, _) = setup
        .engine
        .create_rescheduling_request(request_data(&setup, Some("call-3")))
        .await
        .unwrap();

    let outcome = setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Automated, false)
        .await
        .unwrap();

    assert_eq!(
        outcome.stages_run,
        vec![
            WorkflowStage::CustomerRequest,
            WorkflowStage::AvailabilityCheck,
            WorkflowStage::Confirmation,
        ]
    );
    assert_eq!(outcome.request.status, RequestStatus::Pending);
    assert_eq!(outcome.request.workflow_stage, WorkflowStage::Confirmation);
    assert!(!outcome.request.available_slots.is_empty());
    assert!(outcome.request.confirmation_sent);
    assert_eq!(setup.tokens.outstanding().await, 1);
}

#[tokio::test]
async fn manual_mode_runs_one_stage_per_call() {
    let setup = setup().await;
    let (request, _) = setup
        .engine
        .create_rescheduling_request(request_data(&setup, Some("call-4")))
        .await
        .unwrap();

    let first = setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Manual, false)
        .await
        .unwrap();
    assert_eq!(first.stages_run, vec![WorkflowStage::CustomerRequest]);
    assert_eq!(first.request.workflow_stage, WorkflowStage::AvailabilityCheck);

    let second = setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Manual, false)
        .await
        .unwrap();
    assert_eq!(second.stages_run, vec![WorkflowStage::AvailabilityCheck]);
    assert_eq!(second.request.workflow_stage, WorkflowStage::Confirmation);
}

#[tokio::test]
async fn auto_confirm_selects_the_top_slot_and_completes() {
    let setup = setup().await;
    let (request, _) = setup
        .engine
        .create_rescheduling_request(request_data(&setup, Some("call-5")))
        .await
        .unwrap();

    let outcome = setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Automated, true)
        .await
        .unwrap();

    let request = outcome.request;
    assert_eq!(request.status, RequestStatus::Completed);
    assert_eq!(request.workflow_stage, WorkflowStage::CalendarUpdate);
    assert_eq!(
        request.final_selected_time,
        Some(request.available_slots[0].start_time)
    );
    // No calendar provider bound: the write is manual, but the flow completes.
    assert!(!request.calendar_updated);
    assert!(request.response_time_hours.is_some());

    let contact = setup
        .storage
        .get_contact(setup.contact_id, setup.tenant_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contact.appointment_status, ContactAppointmentStatus::Confirmed);
    assert_eq!(contact.appointment_time, request.final_selected_time);
}

#[tokio::test]
async fn zero_slots_blocks_the_workflow() {
    let setup = setup_with(Some(closed_profile()), false).await;
    let (request, _) = setup
        .engine
        .create_rescheduling_request(request_data(&setup, Some("call-6")))
        .await
        .unwrap();

    let outcome = setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Automated, false)
        .await
        .unwrap();

    assert_eq!(outcome.request.status, RequestStatus::Blocked);
    assert_eq!(
        outcome.request.workflow_stage,
        WorkflowStage::AvailabilityCheck
    );
    assert!(outcome.request.available_slots.is_empty());
    // Blocked is a resting state, not an error: nothing advanced past it.
    assert_eq!(
        outcome.stages_run,
        vec![WorkflowStage::CustomerRequest, WorkflowStage::AvailabilityCheck]
    );
}

#[tokio::test]
async fn notification_failure_leaves_the_request_resumable() {
    let setup = setup_with(None, true).await;
    let (request, _) = setup
        .engine
        .create_rescheduling_request(request_data(&setup, Some("call-7")))
        .await
        .unwrap();

    let outcome = setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Automated, false)
        .await
        .unwrap();

    let request = outcome.request;
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.workflow_stage, WorkflowStage::Confirmation);
    assert!(!request.confirmation_sent);
    // Slots stay snapshotted for the retry; no dangling token remains.
    assert!(!request.available_slots.is_empty());
    assert_eq!(setup.tokens.outstanding().await, 0);
}

// ==============================================================================
// CUSTOMER RESPONSE
// ==============================================================================

async fn run_to_confirmation(setup: &TestSetup, session: &str) -> ReschedulingRequest {
    let (request, _) = setup
        .engine
        .create_rescheduling_request(request_data(setup, Some(session)))
        .await
        .unwrap();
    setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Automated, false)
        .await
        .unwrap()
        .request
}

#[tokio::test]
async fn customer_slot_selection_completes_the_reschedule() {
    let setup = setup().await;
    let request = run_to_confirmation(&setup, "call-8").await;
    let token = setup.captured_token.lock().unwrap().clone().unwrap();

    let outcome = setup
        .engine
        .handle_customer_response(CustomerResponse {
            token: token.clone(),
            selected_slot_index: Some(1),
            comments: Some("second time works".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(outcome.request.status, RequestStatus::Completed);
    assert_eq!(
        outcome.request.final_selected_time,
        Some(request.available_slots[1].start_time)
    );
    assert_eq!(outcome.request.processed_by.as_deref(), Some("customer_response"));

    // Single use: replaying the same token fails.
    let replay = setup
        .engine
        .handle_customer_response(CustomerResponse {
            token,
            selected_slot_index: Some(1),
            comments: None,
        })
        .await;
    assert_matches!(
        replay,
        Err(RescheduleError::Notification(NotificationError::InvalidToken))
    );
}

#[tokio::test]
async fn customer_decline_cancels_the_request() {
    let setup = setup().await;
    let request = run_to_confirmation(&setup, "call-10").await;
    let token = setup.captured_token.lock().unwrap().clone().unwrap();

    let outcome = setup
        .engine
        .handle_customer_response(CustomerResponse {
            token,
            selected_slot_index: None,
            comments: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.request.id, request.id);
    assert_eq!(outcome.request.status, RequestStatus::Rejected);
    assert_eq!(outcome.request.workflow_stage, WorkflowStage::Cancelled);

    let contact = setup
        .storage
        .get_contact(setup.contact_id, setup.tenant_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contact.appointment_status, ContactAppointmentStatus::Scheduled);
}

#[tokio::test]
async fn out_of_range_selection_is_recoverable() {
    let setup = setup().await;
    let request = run_to_confirmation(&setup, "call-11").await;
    let token = setup.captured_token.lock().unwrap().clone().unwrap();
    let available = request.available_slots.len();

    let result = setup
        .engine
        .handle_customer_response(CustomerResponse {
            token: token.clone(),
            selected_slot_index: Some(available + 3),
            comments: None,
        })
        .await;
    assert_matches!(
        result,
        Err(RescheduleError::Notification(
            NotificationError::InvalidSelection { .. }
        ))
    );

    // The token survives the bad index and still confirms.
    let outcome = setup
        .engine
        .handle_customer_response(CustomerResponse {
            token,
            selected_slot_index: Some(0),
            comments: None,
        })
        .await
        .unwrap();
    assert_eq!(outcome.request.status, RequestStatus::Completed);
}

// ==============================================================================
// CANCELLATION & MONOTONICITY
// ==============================================================================

#[tokio::test]
async fn operator_cancel_short_circuits_further_advancement() {
    let setup = setup().await;
    let request = run_to_confirmation(&setup, "call-12").await;

    let cancelled = setup
        .engine
        .cancel_rescheduling_request(request.id, setup.tenant_id, "customer called back", "agent-7")
        .await
        .unwrap();
    assert_eq!(cancelled.status, RequestStatus::Rejected);
    assert_eq!(cancelled.workflow_stage, WorkflowStage::Cancelled);

    let outcome = setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Automated, false)
        .await
        .unwrap();
    assert!(outcome.stages_run.is_empty());
    assert_eq!(outcome.request.workflow_stage, WorkflowStage::Cancelled);
}

#[tokio::test]
async fn cancelling_a_resolved_request_is_rejected() {
    let setup = setup().await;
    let (request, _) = setup
        .engine
        .create_rescheduling_request(request_data(&setup, Some("call-13")))
        .await
        .unwrap();
    setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Automated, true)
        .await
        .unwrap();

    let result = setup
        .engine
        .cancel_rescheduling_request(request.id, setup.tenant_id, "too late", "agent-1")
        .await;
    assert_matches!(
        result,
        Err(RescheduleError::AlreadyResolved(RequestStatus::Completed))
    );
}

#[tokio::test]
async fn stages_never_regress() {
    let setup = setup().await;
    let request = run_to_confirmation(&setup, "call-14").await;
    assert_eq!(request.workflow_stage, WorkflowStage::Confirmation);

    // Re-processing from the pause point never moves the request backwards.
    let outcome = setup
        .engine
        .process_workflow(request.id, setup.tenant_id, WorkflowMode::Automated, false)
        .await
        .unwrap();
    assert!(
        outcome.request.workflow_stage.pipeline_order()
            >= request.workflow_stage.pipeline_order()
    );
}

// ==============================================================================
// EXPIRY SWEEP
// ==============================================================================

#[tokio::test]
async fn stale_requests_are_swept_to_expired() {
    let setup = setup().await;
    let now = Utc::now();

    // A request stuck in availability-check for 8 days.
    let mut stale = ReschedulingRequest {
        id: Uuid::new_v4(),
        tenant_id: setup.tenant_id,
        contact_id: setup.contact_id,
        call_session_id: Some("call-old".to_string()),
        idempotency_key: derive_idempotency_key(
            setup.tenant_id,
            setup.contact_id,
            Some("call-old"),
            now,
        ),
        webhook_event_id: None,
        original_appointment_time: now - Duration::days(1),
        original_appointment_type: None,
        reschedule_reason: RescheduleReason::Other,
        customer_preference: None,
        urgency_level: UrgencyLevel::Low,
        proposed_times: vec![],
        status: RequestStatus::Blocked,
        workflow_stage: WorkflowStage::AvailabilityCheck,
        available_slots: vec![],
        final_selected_time: None,
        calendar_updated: false,
        confirmation_sent: false,
        processed_by: None,
        processed_at: None,
        response_time_hours: None,
        created_at: now - Duration::days(8),
        updated_at: now - Duration::days(8),
    };
    stale = setup
        .storage
        .create_rescheduling_request(stale)
        .await
        .unwrap()
        .request;

    // A fresh pending request must survive the sweep.
    let fresh = run_to_confirmation(&setup, "call-fresh").await;

    let swept = setup.engine.process_expired_requests().await.unwrap();
    assert_eq!(swept, 1);

    let expired = setup
        .engine
        .get_request(stale.id, setup.tenant_id)
        .await
        .unwrap();
    assert_eq!(expired.status, RequestStatus::Expired);
    assert_eq!(expired.workflow_stage, WorkflowStage::Expired);
    assert!(expired.response_time_hours.is_some());

    let untouched = setup
        .engine
        .get_request(fresh.id, setup.tenant_id)
        .await
        .unwrap();
    assert_eq!(untouched.status, RequestStatus::Pending);

    let contact = setup
        .storage
        .get_contact(setup.contact_id, setup.tenant_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contact.appointment_status, ContactAppointmentStatus::Pending);
}
