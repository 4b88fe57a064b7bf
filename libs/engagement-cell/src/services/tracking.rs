use chrono::Utc;
use tracing::debug;

use shared_models::{Contact, ContactEvent, ContactOutcome, CONTACT_LOG_CAP};

/// Folds one call outcome into the contact's persisted counters and rolling
/// log. The attempt counter always builds on the previous value, and the
/// no-answer streak resets on any successful contact.
pub fn record_contact_event(contact: &mut Contact, event: ContactEvent) {
    let counters = &mut contact.engagement;

    counters.call_attempts += 1;

    if event.outcome.is_successful() {
        counters.total_successful_contacts += 1;
        counters.consecutive_no_answers = 0;
    } else if matches!(
        event.outcome,
        ContactOutcome::NoAnswer | ContactOutcome::Busy | ContactOutcome::Voicemail
    ) {
        counters.consecutive_no_answers += 1;
    }

    counters.contact_pattern_data.push(event);
    if counters.contact_pattern_data.len() > CONTACT_LOG_CAP {
        counters.contact_pattern_data.remove(0);
    }

    contact.updated_at = Utc::now();

    debug!(
        contact_id = %contact.id,
        attempts = counters.call_attempts,
        successes = counters.total_successful_contacts,
        streak = counters.consecutive_no_answers,
        "recorded contact attempt"
    );
}

pub fn record_no_show(contact: &mut Contact) {
    contact.engagement.no_show_count += 1;
    contact.updated_at = Utc::now();
}
