use std::sync::Arc;

use axum::{routing::get, Router};

use reschedule_cell::router::reschedule_routes;
use reschedule_cell::services::workflow::WorkflowEngine;

pub fn create_router(engine: Arc<WorkflowEngine>) -> Router {
    Router::new()
        .route("/", get(|| async { "Reminder engine API is running!" }))
        .nest("/api/v1", reschedule_routes(engine))
}
