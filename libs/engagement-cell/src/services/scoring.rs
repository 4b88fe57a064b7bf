use chrono::{Datelike, Timelike, Weekday};
use tracing::debug;

use shared_models::{Contact, ContactEvent, EngagementCounters};

use crate::models::{
    AnalyticsSnapshot, BehaviorPredictions, ContactStrategy, OptimalContactWindow,
    ResponsivenessPattern, RiskLevel, TrendDirection,
};

// Signal weights. They sum to 1.0; the score renormalizes over the weights
// actually present so missing signals never drag the score toward 0.
const WEIGHT_ANSWER_RATE: f64 = 0.30;
const WEIGHT_RECENT_TREND: f64 = 0.25;
const WEIGHT_SENTIMENT: f64 = 0.20;
const WEIGHT_ENGAGEMENT: f64 = 0.15;
const WEIGHT_TIMING: f64 = 0.10;

const TREND_WINDOW: usize = 5;
const TREND_STABILITY_BAND: f64 = 0.1;

const CONTACT_WINDOW_HOURS: u32 = 4;
const MIN_BIN_SAMPLES: usize = 2;
const VOLUME_SATURATION: f64 = 10.0;

const RISK_MEDIUM_THRESHOLD: f64 = 0.35;
const RISK_HIGH_THRESHOLD: f64 = 0.65;

/// Computes a contact's responsiveness profile from persisted counters and
/// externally supplied analytics. Pure and deterministic.
pub struct ResponsivenessScorer;

impl ResponsivenessScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn compute_pattern(
        &self,
        contact: &Contact,
        analytics: &AnalyticsSnapshot,
    ) -> ResponsivenessPattern {
        let counters = &contact.engagement;
        let overall_score = self.overall_score(counters, analytics);
        let trend_direction = self.trend_direction(&counters.contact_pattern_data);
        let optimal_contact_window = self.optimal_contact_window(&counters.contact_pattern_data);
        let appointment_risk = self.appointment_risk(overall_score, counters);
        let recommended_strategy =
            self.recommended_strategy(overall_score, trend_direction, appointment_risk);

        let likely_to_answer = (overall_score
            - 0.05 * counters.consecutive_no_answers as f64)
            .clamp(0.0, 1.0);

        let insights = self.insights(
            counters,
            overall_score,
            trend_direction,
            &optimal_contact_window,
        );

        debug!(
            contact_id = %contact.id,
            score = overall_score,
            risk = ?appointment_risk,
            strategy = %recommended_strategy,
            "computed responsiveness pattern"
        );

        ResponsivenessPattern {
            overall_score,
            trend_direction,
            optimal_contact_window,
            behavior_predictions: BehaviorPredictions {
                likely_to_answer,
                appointment_risk,
                recommended_strategy,
            },
            insights,
        }
    }

    /// Baseline 0.5 shifted by a weighted sum of the available signal
    /// deltas, renormalized by the weight actually present.
    fn overall_score(&self, counters: &EngagementCounters, analytics: &AnalyticsSnapshot) -> f64 {
        let mut weighted = 0.0;
        let mut weight_present = 0.0;

        if counters.call_attempts > 0 {
            let rate =
                counters.total_successful_contacts as f64 / counters.call_attempts as f64;
            weighted += WEIGHT_ANSWER_RATE * (rate - 0.5);
            weight_present += WEIGHT_ANSWER_RATE;
        }

        if let Some(delta) = self.trend_delta(&counters.contact_pattern_data) {
            // delta sits in [-1, 1]; halve it into the common signal range.
            weighted += WEIGHT_RECENT_TREND * (delta / 2.0);
            weight_present += WEIGHT_RECENT_TREND;
        }

        if let Some(sentiment) = analytics.average_sentiment {
            // Rescale [-1, 1] onto [0, 1], then center.
            weighted += WEIGHT_SENTIMENT * (sentiment.clamp(-1.0, 1.0) / 2.0);
            weight_present += WEIGHT_SENTIMENT;
        }

        if let Some(engagement) = analytics.engagement_score {
            weighted += WEIGHT_ENGAGEMENT * (engagement.clamp(0.0, 1.0) - 0.5);
            weight_present += WEIGHT_ENGAGEMENT;
        }

        if let Some(consistency) = self.timing_consistency(&counters.contact_pattern_data) {
            weighted += WEIGHT_TIMING * (consistency - 0.5);
            weight_present += WEIGHT_TIMING;
        }

        if weight_present == 0.0 {
            return 0.5;
        }

        (0.5 + weighted / weight_present).clamp(0.0, 1.0)
    }

    /// Success rate of the last 5 attempts minus the prior window. Needs at
    /// least one attempt in the prior window to say anything.
    fn trend_delta(&self, events: &[ContactEvent]) -> Option<f64> {
        if events.len() <= TREND_WINDOW {
            return None;
        }

        let split = events.len() - TREND_WINDOW;
        let prior_start = split.saturating_sub(TREND_WINDOW);
        let recent = &events[split..];
        let prior = &events[prior_start..split];

        Some(success_rate(recent) - success_rate(prior))
    }

    fn trend_direction(&self, events: &[ContactEvent]) -> TrendDirection {
        match self.trend_delta(events) {
            Some(delta) if delta > TREND_STABILITY_BAND => TrendDirection::Improving,
            Some(delta) if delta < -TREND_STABILITY_BAND => TrendDirection::Declining,
            _ => TrendDirection::Stable,
        }
    }

    /// Inverse coefficient-of-variation of successful contact durations.
    fn timing_consistency(&self, events: &[ContactEvent]) -> Option<f64> {
        let durations: Vec<f64> = events
            .iter()
            .filter(|event| event.outcome.is_successful())
            .filter_map(|event| event.duration_seconds)
            .map(f64::from)
            .collect();

        if durations.len() < MIN_BIN_SAMPLES {
            return None;
        }

        let mean = durations.iter().sum::<f64>() / durations.len() as f64;
        if mean <= 0.0 {
            return None;
        }

        let variance = durations
            .iter()
            .map(|duration| (duration - mean).powi(2))
            .sum::<f64>()
            / durations.len() as f64;
        let cv = variance.sqrt() / mean;

        Some(1.0 / (1.0 + cv))
    }

    /// Best day-of-week and sliding 4-hour window by observed success rate,
    /// among bins with at least 2 data points.
    fn optimal_contact_window(&self, events: &[ContactEvent]) -> OptimalContactWindow {
        let best_day = WEEKDAYS
            .iter()
            .filter_map(|&day| {
                let on_day: Vec<&ContactEvent> = events
                    .iter()
                    .filter(|event| event.occurred_at.weekday() == day)
                    .collect();
                if on_day.len() < MIN_BIN_SAMPLES {
                    return None;
                }
                let successes = on_day
                    .iter()
                    .filter(|event| event.outcome.is_successful())
                    .count();
                Some((day, successes as f64 / on_day.len() as f64))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let best_window = (0..=(24 - CONTACT_WINDOW_HOURS))
            .filter_map(|start| {
                let end = start + CONTACT_WINDOW_HOURS;
                let in_window: Vec<&ContactEvent> = events
                    .iter()
                    .filter(|event| {
                        let hour = event.occurred_at.hour();
                        hour >= start && hour < end
                    })
                    .collect();
                if in_window.len() < MIN_BIN_SAMPLES {
                    return None;
                }
                let successes = in_window
                    .iter()
                    .filter(|event| event.outcome.is_successful())
                    .count();
                Some((
                    start,
                    successes as f64 / in_window.len() as f64,
                    in_window.len(),
                ))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));

        match (best_day, best_window) {
            (Some((day, _)), Some((start, rate, samples))) => {
                let volume = (samples as f64 / VOLUME_SATURATION).min(1.0);
                OptimalContactWindow {
                    day_of_week: weekday_name(day).to_string(),
                    time_range: format!("{:02}:00-{:02}:00", start, start + CONTACT_WINDOW_HOURS),
                    confidence: (volume + rate) / 2.0,
                }
            }
            _ => OptimalContactWindow {
                day_of_week: weekday_name(Weekday::Tue).to_string(),
                time_range: "10:00-14:00".to_string(),
                confidence: 0.0,
            },
        }
    }

    /// Combines inverted score with no-show and consecutive-no-answer
    /// penalties, then thresholds into low/medium/high.
    fn appointment_risk(&self, score: f64, counters: &EngagementCounters) -> RiskLevel {
        let raw = (1.0 - score) * 0.5
            + (counters.no_show_count as f64 * 0.15).min(0.3)
            + (counters.consecutive_no_answers as f64 * 0.1).min(0.2);

        if raw < RISK_MEDIUM_THRESHOLD {
            RiskLevel::Low
        } else if raw < RISK_HIGH_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    fn recommended_strategy(
        &self,
        score: f64,
        trend: TrendDirection,
        risk: RiskLevel,
    ) -> ContactStrategy {
        if risk == RiskLevel::High || score < 0.3 {
            ContactStrategy::MultiChannelExtendedLead
        } else if trend == TrendDirection::Declining {
            ContactStrategy::SwitchChannel
        } else if score >= 0.7 && risk == RiskLevel::Low {
            ContactStrategy::SingleChannel
        } else {
            ContactStrategy::SingleChannelWithReminder
        }
    }

    fn insights(
        &self,
        counters: &EngagementCounters,
        score: f64,
        trend: TrendDirection,
        window: &OptimalContactWindow,
    ) -> Vec<String> {
        let mut insights = Vec::new();

        if counters.call_attempts > 0 {
            let rate = counters.total_successful_contacts as f64
                / counters.call_attempts as f64;
            insights.push(format!(
                "Answered {} of {} contact attempts ({:.0}%)",
                counters.total_successful_contacts,
                counters.call_attempts,
                rate * 100.0
            ));
        } else {
            insights.push("No contact attempts recorded yet".to_string());
        }

        match trend {
            TrendDirection::Improving => {
                insights.push("Responsiveness improving over recent contacts".to_string())
            }
            TrendDirection::Declining => {
                insights.push("Responsiveness declining over recent contacts".to_string())
            }
            TrendDirection::Stable => {}
        }

        if counters.consecutive_no_answers >= 3 {
            insights.push(format!(
                "{} consecutive unanswered attempts",
                counters.consecutive_no_answers
            ));
        }

        if counters.no_show_count > 0 {
            insights.push(format!(
                "{} recorded no-shows",
                counters.no_show_count
            ));
        }

        if window.confidence > 0.0 {
            insights.push(format!(
                "Most responsive on {} between {}",
                window.day_of_week, window.time_range
            ));
        } else if score > 0.0 {
            insights.push("Not enough contact history to pick an optimal window".to_string());
        }

        insights
    }
}

impl Default for ResponsivenessScorer {
    fn default() -> Self {
        Self::new()
    }
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn success_rate(events: &[ContactEvent]) -> f64 {
    if events.is_empty() {
        return 0.0;
    }
    let successes = events
        .iter()
        .filter(|event| event.outcome.is_successful())
        .count();
    successes as f64 / events.len() as f64
}
