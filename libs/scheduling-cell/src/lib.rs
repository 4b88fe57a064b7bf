pub mod models;
pub mod services;

pub use models::{BookingAttendee, BookingWindow, CalendarBooking, CalendarError};
pub use services::calendar::{
    BookingApiProvider, CalendarProvider, CalendarProviderRegistry, SchedulingLinkProvider,
};
pub use services::slots::{SlotGenerator, SlotQuery};
