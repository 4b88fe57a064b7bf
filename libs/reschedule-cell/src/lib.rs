pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    CustomerResponse, RescheduleError, RescheduleRequestData, StageResult, WorkflowMode,
    WorkflowOutcome,
};
pub use services::workflow::WorkflowEngine;
