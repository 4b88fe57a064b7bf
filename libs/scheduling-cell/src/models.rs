use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An existing event on an external calendar. Only the interval matters to
/// slot generation; the rest is carried through for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarBooking {
    pub id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub summary: Option<String>,
}

/// Time window for booking lookups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookingWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingAttendee {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("calendar provider request failed: {0}")]
    Http(String),

    #[error("calendar provider rejected the credential")]
    Unauthorized,

    #[error("calendar provider returned an unexpected payload: {0}")]
    InvalidResponse(String),

    #[error("calendar provider timed out")]
    Timeout,
}
