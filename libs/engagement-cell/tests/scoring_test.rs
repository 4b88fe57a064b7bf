use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use engagement_cell::models::{AnalyticsSnapshot, ContactStrategy, RiskLevel, TrendDirection};
use engagement_cell::services::scoring::ResponsivenessScorer;
use engagement_cell::services::tracking::{record_contact_event, record_no_show};
use shared_models::{
    Contact, ContactAppointmentStatus, ContactChannel, ContactEvent, ContactOutcome,
    EngagementCounters, CONTACT_LOG_CAP,
};

fn contact_with(engagement: EngagementCounters) -> Contact {
    let now = Utc::now();
    Contact {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        full_name: "Priya Natarajan".to_string(),
        email: Some("priya@example.com".to_string()),
        phone: Some("+15550111".to_string()),
        preferred_channel: ContactChannel::Sms,
        appointment_time: Some(now + Duration::days(5)),
        appointment_status: ContactAppointmentStatus::Scheduled,
        appointment_type: None,
        preferred_duration_minutes: 30,
        calendar_credential: None,
        engagement,
        created_at: now,
        updated_at: now,
    }
}

fn event(day: u32, hour: u32, outcome: ContactOutcome, duration: Option<u32>) -> ContactEvent {
    ContactEvent {
        occurred_at: Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap(),
        channel: ContactChannel::Voice,
        outcome,
        duration_seconds: duration,
    }
}

// ==============================================================================
// SCORE
// ==============================================================================

#[test]
fn answer_rate_alone_drives_the_score() {
    // 8/10 answered and no other signal: 0.5 + (0.8 - 0.5) = 0.8.
    let contact = contact_with(EngagementCounters {
        call_attempts: 10,
        total_successful_contacts: 8,
        ..Default::default()
    });

    let pattern =
        ResponsivenessScorer::new().compute_pattern(&contact, &AnalyticsSnapshot::default());
    assert!((pattern.overall_score - 0.8).abs() < 1e-9);
}

#[test]
fn no_signals_leaves_the_baseline() {
    let contact = contact_with(EngagementCounters::default());
    let pattern =
        ResponsivenessScorer::new().compute_pattern(&contact, &AnalyticsSnapshot::default());
    assert!((pattern.overall_score - 0.5).abs() < 1e-9);
}

#[test]
fn score_stays_in_bounds_for_any_signal_subset() {
    let scorer = ResponsivenessScorer::new();
    let sentiments = [None, Some(-1.0), Some(0.0), Some(1.0)];
    let engagements = [None, Some(0.0), Some(1.0)];
    let counter_cases = [
        (0u32, 0u32),
        (10, 0),
        (10, 10),
        (25, 5),
    ];

    for &(attempts, successes) in &counter_cases {
        for &average_sentiment in &sentiments {
            for &engagement_score in &engagements {
                let mut counters = EngagementCounters {
                    call_attempts: attempts,
                    total_successful_contacts: successes,
                    consecutive_no_answers: 4,
                    no_show_count: 3,
                    ..Default::default()
                };
                // Mixed event history exercises trend and timing signals too.
                counters.contact_pattern_data = (0..12u32)
                    .map(|i| {
                        let outcome = if i % 3 == 0 {
                            ContactOutcome::Answered
                        } else {
                            ContactOutcome::NoAnswer
                        };
                        event(2 + (i % 5), 9 + (i % 8), outcome, Some(60 + i * 40))
                    })
                    .collect();

                let contact = contact_with(counters);
                let analytics = AnalyticsSnapshot {
                    average_sentiment,
                    engagement_score,
                };

                let pattern = scorer.compute_pattern(&contact, &analytics);
                assert!(
                    (0.0..=1.0).contains(&pattern.overall_score),
                    "score {} out of bounds for attempts={} successes={}",
                    pattern.overall_score,
                    attempts,
                    successes
                );
            }
        }
    }
}

#[test]
fn strong_sentiment_and_engagement_lift_a_cold_start() {
    let contact = contact_with(EngagementCounters::default());
    let analytics = AnalyticsSnapshot {
        average_sentiment: Some(1.0),
        engagement_score: Some(1.0),
    };

    let pattern = ResponsivenessScorer::new().compute_pattern(&contact, &analytics);
    assert!(pattern.overall_score > 0.9);
}

// ==============================================================================
// TREND
// ==============================================================================

#[test]
fn recent_successes_read_as_improving() {
    let mut counters = EngagementCounters {
        call_attempts: 10,
        total_successful_contacts: 5,
        ..Default::default()
    };
    for i in 0..5 {
        counters
            .contact_pattern_data
            .push(event(2 + i, 10, ContactOutcome::NoAnswer, None));
    }
    for i in 0..5 {
        counters
            .contact_pattern_data
            .push(event(9 + i, 10, ContactOutcome::Answered, Some(120)));
    }

    let pattern = ResponsivenessScorer::new()
        .compute_pattern(&contact_with(counters), &AnalyticsSnapshot::default());
    assert_eq!(pattern.trend_direction, TrendDirection::Improving);
}

#[test]
fn recent_silence_reads_as_declining() {
    let mut counters = EngagementCounters {
        call_attempts: 10,
        total_successful_contacts: 8,
        ..Default::default()
    };
    for i in 0..5 {
        counters
            .contact_pattern_data
            .push(event(2 + i, 10, ContactOutcome::Answered, Some(90)));
    }
    for i in 0..5 {
        counters
            .contact_pattern_data
            .push(event(9 + i, 10, ContactOutcome::NoAnswer, None));
    }

    let pattern = ResponsivenessScorer::new()
        .compute_pattern(&contact_with(counters), &AnalyticsSnapshot::default());
    assert_eq!(pattern.trend_direction, TrendDirection::Declining);
    assert_eq!(
        pattern.behavior_predictions.recommended_strategy,
        ContactStrategy::SwitchChannel
    );
}

// ==============================================================================
// OPTIMAL CONTACT WINDOW
// ==============================================================================

#[test]
fn window_tracks_where_answers_cluster() {
    // 2026-03-03 and 2026-03-10 are Tuesdays; answers land at 14:00-15:00.
    let mut counters = EngagementCounters {
        call_attempts: 6,
        total_successful_contacts: 4,
        ..Default::default()
    };
    counters.contact_pattern_data = vec![
        event(3, 14, ContactOutcome::Answered, Some(100)),
        event(3, 15, ContactOutcome::Answered, Some(110)),
        event(10, 14, ContactOutcome::Answered, Some(95)),
        event(10, 15, ContactOutcome::Answered, Some(105)),
        event(2, 9, ContactOutcome::NoAnswer, None),
        event(9, 9, ContactOutcome::NoAnswer, None),
    ];

    let pattern = ResponsivenessScorer::new()
        .compute_pattern(&contact_with(counters), &AnalyticsSnapshot::default());
    let window = &pattern.optimal_contact_window;

    assert_eq!(window.day_of_week, "tuesday");
    assert!(window.confidence > 0.5);

    let start_hour: u32 = window.time_range[..2].parse().unwrap();
    assert!(start_hour <= 14 && 14 < start_hour + 4);
}

#[test]
fn sparse_history_yields_zero_confidence_window() {
    let counters = EngagementCounters {
        call_attempts: 1,
        total_successful_contacts: 1,
        contact_pattern_data: vec![event(3, 14, ContactOutcome::Answered, Some(100))],
        ..Default::default()
    };

    let pattern = ResponsivenessScorer::new()
        .compute_pattern(&contact_with(counters), &AnalyticsSnapshot::default());
    assert_eq!(pattern.optimal_contact_window.confidence, 0.0);
}

// ==============================================================================
// RISK & STRATEGY
// ==============================================================================

#[test]
fn reliable_contact_gets_single_channel() {
    let contact = contact_with(EngagementCounters {
        call_attempts: 10,
        total_successful_contacts: 9,
        ..Default::default()
    });

    let pattern =
        ResponsivenessScorer::new().compute_pattern(&contact, &AnalyticsSnapshot::default());
    assert_eq!(pattern.behavior_predictions.appointment_risk, RiskLevel::Low);
    assert_eq!(
        pattern.behavior_predictions.recommended_strategy,
        ContactStrategy::SingleChannel
    );
}

#[test]
fn no_shows_and_silence_escalate_to_multi_channel() {
    let contact = contact_with(EngagementCounters {
        call_attempts: 12,
        total_successful_contacts: 2,
        consecutive_no_answers: 5,
        no_show_count: 3,
        ..Default::default()
    });

    let pattern =
        ResponsivenessScorer::new().compute_pattern(&contact, &AnalyticsSnapshot::default());
    assert_eq!(pattern.behavior_predictions.appointment_risk, RiskLevel::High);
    assert_eq!(
        pattern.behavior_predictions.recommended_strategy,
        ContactStrategy::MultiChannelExtendedLead
    );
    assert!(pattern
        .insights
        .iter()
        .any(|line| line.contains("consecutive unanswered")));
}

// ==============================================================================
// COUNTER MAINTENANCE
// ==============================================================================

#[test]
fn attempts_accumulate_and_streak_resets_on_answer() {
    let mut contact = contact_with(EngagementCounters::default());

    record_contact_event(&mut contact, event(2, 10, ContactOutcome::NoAnswer, None));
    record_contact_event(&mut contact, event(3, 10, ContactOutcome::Busy, None));
    assert_eq!(contact.engagement.call_attempts, 2);
    assert_eq!(contact.engagement.consecutive_no_answers, 2);

    record_contact_event(&mut contact, event(4, 10, ContactOutcome::Answered, Some(80)));
    assert_eq!(contact.engagement.call_attempts, 3);
    assert_eq!(contact.engagement.total_successful_contacts, 1);
    assert_eq!(contact.engagement.consecutive_no_answers, 0);
}

#[test]
fn rolling_log_is_capped_at_fifty_events() {
    let mut contact = contact_with(EngagementCounters::default());

    for i in 0..60u32 {
        record_contact_event(
            &mut contact,
            event(2 + (i % 20), 8 + (i % 12), ContactOutcome::Answered, Some(60)),
        );
    }

    assert_eq!(contact.engagement.contact_pattern_data.len(), CONTACT_LOG_CAP);
    assert_eq!(contact.engagement.call_attempts, 60);
}

#[test]
fn no_show_counter_increments() {
    let mut contact = contact_with(EngagementCounters::default());
    record_no_show(&mut contact);
    record_no_show(&mut contact);
    assert_eq!(contact.engagement.no_show_count, 2);
}
