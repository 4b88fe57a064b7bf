use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==============================================================================
// AVAILABILITY SLOT MODELS
// ==============================================================================

/// A candidate appointment window. Immutable once generated; a rescheduling
/// request snapshots the ranked list at the availability-check stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub appointment_type: Option<String>,
    pub provider: SlotProvider,
    pub location: Option<String>,
    pub timezone: Option<String>,
}

/// Where a slot came from: a named external calendar, or the tenant's
/// business-hours fallback when no provider is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotProvider {
    BusinessHours,
    BookingApi,
    SchedulingLink,
}

impl SlotProvider {
    pub fn is_external(&self) -> bool {
        !matches!(self, SlotProvider::BusinessHours)
    }
}

impl fmt::Display for SlotProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotProvider::BusinessHours => write!(f, "business_hours"),
            SlotProvider::BookingApi => write!(f, "booking_api"),
            SlotProvider::SchedulingLink => write!(f, "scheduling_link"),
        }
    }
}

// ==============================================================================
// BUSINESS HOURS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessCategory {
    MedicalPractice,
    Salon,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekdayHours {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WeekdayHours {
    pub fn open(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            enabled: true,
            start,
            end,
        }
    }

    pub fn closed() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }
    }
}

/// Per-weekday opening hours, indexed Monday..Sunday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessHoursProfile {
    pub days: [WeekdayHours; 7],
}

impl BusinessHoursProfile {
    pub fn for_category(category: BusinessCategory) -> Self {
        fn t(h: u32, m: u32) -> NaiveTime {
            NaiveTime::from_hms_opt(h, m, 0).unwrap()
        }

        match category {
            BusinessCategory::MedicalPractice => Self {
                days: [
                    WeekdayHours::open(t(9, 0), t(17, 0)),
                    WeekdayHours::open(t(9, 0), t(17, 0)),
                    WeekdayHours::open(t(9, 0), t(17, 0)),
                    WeekdayHours::open(t(9, 0), t(17, 0)),
                    WeekdayHours::open(t(9, 0), t(17, 0)),
                    WeekdayHours::closed(),
                    WeekdayHours::closed(),
                ],
            },
            BusinessCategory::Salon => Self {
                days: [
                    WeekdayHours::open(t(9, 0), t(20, 0)),
                    WeekdayHours::open(t(9, 0), t(20, 0)),
                    WeekdayHours::open(t(9, 0), t(20, 0)),
                    WeekdayHours::open(t(9, 0), t(20, 0)),
                    WeekdayHours::open(t(9, 0), t(20, 0)),
                    WeekdayHours::open(t(9, 0), t(20, 0)),
                    WeekdayHours::open(t(10, 0), t(16, 0)),
                ],
            },
            BusinessCategory::General => Self {
                days: [
                    WeekdayHours::open(t(8, 0), t(18, 0)),
                    WeekdayHours::open(t(8, 0), t(18, 0)),
                    WeekdayHours::open(t(8, 0), t(18, 0)),
                    WeekdayHours::open(t(8, 0), t(18, 0)),
                    WeekdayHours::open(t(8, 0), t(18, 0)),
                    WeekdayHours::open(t(9, 0), t(13, 0)),
                    WeekdayHours::closed(),
                ],
            },
        }
    }

    pub fn hours_for(&self, weekday: Weekday) -> Option<(NaiveTime, NaiveTime)> {
        let day = self.days[weekday.num_days_from_monday() as usize];
        day.enabled.then_some((day.start, day.end))
    }
}

// ==============================================================================
// CALENDAR PROVIDER BINDING
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarProviderKind {
    BookingApi,
    SchedulingLink,
}

impl From<CalendarProviderKind> for SlotProvider {
    fn from(kind: CalendarProviderKind) -> Self {
        match kind {
            CalendarProviderKind::BookingApi => SlotProvider::BookingApi,
            CalendarProviderKind::SchedulingLink => SlotProvider::SchedulingLink,
        }
    }
}

/// Credential binding a tenant or contact to one external calendar.
/// OAuth flows are out of scope; the token is opaque to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarCredential {
    pub kind: CalendarProviderKind,
    pub calendar_id: String,
    pub api_token: String,
}
