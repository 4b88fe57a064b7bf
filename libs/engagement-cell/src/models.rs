use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived behavioral profile for one contact. Recomputed on demand from the
/// contact's persisted counters plus externally supplied analytics; never
/// stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsivenessPattern {
    /// Always within [0, 1].
    pub overall_score: f64,
    pub trend_direction: TrendDirection,
    pub optimal_contact_window: OptimalContactWindow,
    pub behavior_predictions: BehaviorPredictions,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalContactWindow {
    pub day_of_week: String,
    /// `HH:00-HH:00`, a four-hour band.
    pub time_range: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorPredictions {
    pub likely_to_answer: f64,
    pub appointment_risk: RiskLevel,
    pub recommended_strategy: ContactStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStrategy {
    SingleChannel,
    SingleChannelWithReminder,
    SwitchChannel,
    MultiChannelExtendedLead,
}

impl fmt::Display for ContactStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactStrategy::SingleChannel => write!(f, "single_channel"),
            ContactStrategy::SingleChannelWithReminder => write!(f, "single_channel_with_reminder"),
            ContactStrategy::SwitchChannel => write!(f, "switch_channel"),
            ContactStrategy::MultiChannelExtendedLead => write!(f, "multi_channel_extended_lead"),
        }
    }
}

/// Externally supplied aggregates (conversation sentiment, portal
/// engagement). Either signal may be absent; missing signals carry no weight
/// in the score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    /// Average sentiment in [-1, 1].
    pub average_sentiment: Option<f64>,
    /// Engagement score in [0, 1].
    pub engagement_score: Option<f64>,
}
