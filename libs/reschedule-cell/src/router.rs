use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::workflow::WorkflowEngine;

pub fn reschedule_routes(engine: Arc<WorkflowEngine>) -> Router {
    Router::new()
        // Request lifecycle
        .route("/requests", post(handlers::create_reschedule_request))
        .route("/requests/{request_id}", get(handlers::get_request))
        .route("/requests/{request_id}/process", post(handlers::process_request))
        .route("/requests/{request_id}/confirm", post(handlers::confirm_request))
        .route("/requests/{request_id}/cancel", post(handlers::cancel_request))
        .route("/requests/{request_id}/remind", post(handlers::remind_request))
        // Inbound triggers
        .route("/webhooks/appointment-events", post(handlers::webhook_appointment_event))
        .route("/responses", post(handlers::collect_response))
        // Maintenance & responsiveness
        .route("/maintenance/expire", post(handlers::run_expiry_sweep))
        .route(
            "/contacts/{contact_id}/responsiveness",
            get(handlers::get_responsiveness),
        )
        .route(
            "/contacts/{contact_id}/call-outcomes",
            post(handlers::record_call_outcome),
        )
        .with_state(engine)
}
