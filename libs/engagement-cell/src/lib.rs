pub mod models;
pub mod services;

pub use models::{
    AnalyticsSnapshot, BehaviorPredictions, ContactStrategy, OptimalContactWindow,
    ResponsivenessPattern, RiskLevel, TrendDirection,
};
pub use services::scoring::ResponsivenessScorer;
pub use services::tracking::{record_contact_event, record_no_show};
