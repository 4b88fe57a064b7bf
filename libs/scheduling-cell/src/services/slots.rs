use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use tracing::debug;

use shared_models::{AvailabilitySlot, BusinessHoursProfile, SlotProvider};

use crate::models::CalendarBooking;

/// How far ahead slots are generated when the caller supplies no dates.
const DEFAULT_LOOKAHEAD_DAYS: i64 = 14;

/// Candidate start times step at an interval clamped to this range.
const MIN_STEP_MINUTES: i64 = 15;
const MAX_STEP_MINUTES: i64 = 60;

/// Buffer appended to every candidate so back-to-back bookings never touch.
const MAX_BUFFER_MINUTES: i64 = 15;

/// Ranked lists are truncated; nobody picks from a hundred options.
const MAX_RANKED_SLOTS: usize = 12;

/// Core-hours band that gets a small ranking boost.
const CORE_HOURS: (u32, u32) = (10, 16);

pub struct SlotQuery {
    pub duration_minutes: i64,
    /// Dates the customer asked about; defaults to the next 14 calendar days.
    pub preferred_dates: Option<Vec<NaiveDate>>,
    pub original_appointment_time: DateTime<Utc>,
    pub appointment_type: Option<String>,
    pub provider: SlotProvider,
    pub timezone: Option<String>,
    pub now: DateTime<Utc>,
}

/// Generates conflict-free candidate slots inside a tenant's business hours
/// and ranks them. The ordering is deterministic given identical inputs.
pub struct SlotGenerator;

impl SlotGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(
        &self,
        profile: &BusinessHoursProfile,
        bookings: &[CalendarBooking],
        query: &SlotQuery,
    ) -> Vec<AvailabilitySlot> {
        let duration = Duration::minutes(query.duration_minutes);
        let step = Duration::minutes(
            query
                .duration_minutes
                .clamp(MIN_STEP_MINUTES, MAX_STEP_MINUTES),
        );
        let buffer = Duration::minutes(MAX_BUFFER_MINUTES.min(query.duration_minutes));

        let dates: Vec<NaiveDate> = match &query.preferred_dates {
            Some(dates) => dates.clone(),
            None => (1..=DEFAULT_LOOKAHEAD_DAYS)
                .map(|offset| (query.now + Duration::days(offset)).date_naive())
                .collect(),
        };

        let mut slots = Vec::new();

        for date in dates {
            let Some((open, close)) = profile.hours_for(date.weekday()) else {
                continue;
            };
            let day_end = date.and_time(close).and_utc();
            let mut current = date.and_time(open).and_utc();

            while current + duration + buffer <= day_end {
                if current <= query.now {
                    current += step;
                    continue;
                }

                let slot_end = current + duration;
                let buffered_end = slot_end + buffer;

                // Standard interval overlap against the buffered window. On a
                // conflict, jump past the latest overlapping booking plus the
                // buffer instead of blindly stepping.
                let conflict_end = bookings
                    .iter()
                    .filter(|booking| current < booking.end_time && buffered_end > booking.start_time)
                    .map(|booking| booking.end_time)
                    .max();

                if let Some(end) = conflict_end {
                    current = end + buffer;
                    continue;
                }

                slots.push(AvailabilitySlot {
                    start_time: current,
                    end_time: slot_end,
                    duration_minutes: query.duration_minutes,
                    appointment_type: query.appointment_type.clone(),
                    provider: query.provider,
                    location: None,
                    timezone: query.timezone.clone(),
                });

                current += step;
            }
        }

        debug!(
            candidates = slots.len(),
            provider = %query.provider,
            "generated candidate slots"
        );

        self.rank(slots, query)
    }

    /// Descending composite score; ties broken by earliest start.
    fn rank(&self, slots: Vec<AvailabilitySlot>, query: &SlotQuery) -> Vec<AvailabilitySlot> {
        let mut scored: Vec<(f64, AvailabilitySlot)> = slots
            .into_iter()
            .map(|slot| (self.score(&slot, query), slot))
            .collect();

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.start_time.cmp(&b.1.start_time))
        });

        scored.truncate(MAX_RANKED_SLOTS);
        scored.into_iter().map(|(_, slot)| slot).collect()
    }

    fn score(&self, slot: &AvailabilitySlot, query: &SlotQuery) -> f64 {
        let mut score = 0.0;

        if slot.provider.is_external() {
            score += 2.0;
        }

        let days_away = (slot.start_time.date_naive() - query.now.date_naive())
            .num_days()
            .max(0) as f64;
        score += 1.5 / (1.0 + days_away);

        let slot_hour = slot.start_time.hour() as i64;
        let original_hour = query.original_appointment_time.hour() as i64;
        let hour_distance = (slot_hour - original_hour).abs() as f64;
        score += 1.0 / (1.0 + hour_distance);

        let hour = slot.start_time.hour();
        if hour >= CORE_HOURS.0 && hour < CORE_HOURS.1 {
            score += 0.25;
        }
        if hour < 8 || hour >= 18 {
            score -= 0.5;
        }

        score
    }
}

impl Default for SlotGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use shared_models::{BusinessCategory, WeekdayHours};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn weekday_profile(open: (u32, u32), close: (u32, u32)) -> BusinessHoursProfile {
        let hours = WeekdayHours::open(
            NaiveTime::from_hms_opt(open.0, open.1, 0).unwrap(),
            NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap(),
        );
        BusinessHoursProfile {
            days: [
                hours,
                hours,
                hours,
                hours,
                hours,
                WeekdayHours::closed(),
                WeekdayHours::closed(),
            ],
        }
    }

    fn query_for(date: NaiveDate, duration: i64, now: DateTime<Utc>) -> SlotQuery {
        SlotQuery {
            duration_minutes: duration,
            preferred_dates: Some(vec![date]),
            original_appointment_time: now + Duration::days(1),
            appointment_type: None,
            provider: SlotProvider::BusinessHours,
            timezone: None,
            now,
        }
    }

    #[test]
    fn booked_window_is_avoided_with_buffer() {
        // Weekday 09:00-17:00, one booking 10:00-11:00, 60-minute slots.
        // 2026-03-02 is a Monday.
        let profile = weekday_profile((9, 0), (17, 0));
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let now = utc(2026, 3, 1, 12, 0);
        let booking = CalendarBooking {
            id: None,
            start_time: utc(2026, 3, 2, 10, 0),
            end_time: utc(2026, 3, 2, 11, 0),
            summary: None,
        };

        let slots = SlotGenerator::new().generate(
            &profile,
            &[booking.clone()],
            &query_for(date, 60, now),
        );

        assert!(!slots.is_empty());
        // No slot may overlap the booking once buffered.
        for slot in &slots {
            let buffered_end = slot.end_time + Duration::minutes(15);
            assert!(
                slot.start_time >= booking.end_time + Duration::minutes(15)
                    || buffered_end <= booking.start_time,
                "slot {} overlaps the buffered booking",
                slot.start_time
            );
        }
        assert!(!slots.iter().any(|s| s.start_time == utc(2026, 3, 2, 9, 30)));
        assert!(slots.iter().any(|s| s.start_time == utc(2026, 3, 2, 11, 15)));
    }

    #[test]
    fn ranking_is_deterministic() {
        let profile = BusinessHoursProfile::for_category(BusinessCategory::General);
        let now = utc(2026, 3, 1, 8, 0);
        let query = SlotQuery {
            duration_minutes: 30,
            preferred_dates: None,
            original_appointment_time: utc(2026, 3, 4, 14, 0),
            appointment_type: Some("checkup".to_string()),
            provider: SlotProvider::BookingApi,
            timezone: Some("UTC".to_string()),
            now,
        };
        let generator = SlotGenerator::new();

        let first = generator.generate(&profile, &[], &query);
        let second = generator.generate(&profile, &[], &query);

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn disabled_days_produce_no_slots() {
        let profile = weekday_profile((9, 0), (17, 0));
        // 2026-03-07 is a Saturday.
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let now = utc(2026, 3, 1, 12, 0);

        let slots = SlotGenerator::new().generate(&profile, &[], &query_for(date, 30, now));
        assert!(slots.is_empty());
    }

    #[test]
    fn fully_booked_day_yields_empty_list() {
        let profile = weekday_profile((9, 0), (12, 0));
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let now = utc(2026, 3, 1, 12, 0);
        let all_day = CalendarBooking {
            id: None,
            start_time: utc(2026, 3, 2, 8, 0),
            end_time: utc(2026, 3, 2, 13, 0),
            summary: Some("offsite".to_string()),
        };

        let slots = SlotGenerator::new().generate(&profile, &[all_day], &query_for(date, 30, now));
        assert!(slots.is_empty());
    }

    #[test]
    fn slots_closer_to_original_hour_rank_first() {
        let profile = weekday_profile((9, 0), (17, 0));
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let now = utc(2026, 3, 1, 12, 0);
        let mut query = query_for(date, 60, now);
        query.original_appointment_time = utc(2026, 3, 2, 14, 0);

        let slots = SlotGenerator::new().generate(&profile, &[], &query);
        assert_eq!(slots[0].start_time.hour(), 14);
    }

    #[test]
    fn buffered_slot_never_spills_past_closing() {
        let profile = weekday_profile((9, 0), (10, 30));
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let now = utc(2026, 3, 1, 12, 0);

        let slots = SlotGenerator::new().generate(&profile, &[], &query_for(date, 60, now));
        // 09:00 + 60min + 15min buffer = 10:15 fits; 10:00 start would not.
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_time, utc(2026, 3, 2, 9, 0));
    }
}
