pub mod call_log;
pub mod contact;
pub mod error;
pub mod reschedule;
pub mod scheduling;
pub mod tenant;

pub use call_log::{CallLogEntry, CallLogEvent};
pub use contact::{
    Contact, ContactAppointmentStatus, ContactChannel, ContactEvent, ContactOutcome,
    EngagementCounters, CONTACT_LOG_CAP,
};
pub use error::AppError;
pub use reschedule::{
    derive_idempotency_key, RequestStatus, RescheduleReason, ReschedulingRequest, UrgencyLevel,
    WorkflowStage,
};
pub use scheduling::{
    AvailabilitySlot, BusinessCategory, BusinessHoursProfile, CalendarCredential,
    CalendarProviderKind, SlotProvider, WeekdayHours,
};
pub use tenant::TenantConfig;
