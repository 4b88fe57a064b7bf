use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub booking_api_url: String,
    pub booking_api_key: String,
    pub scheduling_link_url: String,
    pub scheduling_link_api_key: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            booking_api_url: env::var("BOOKING_API_URL")
                .unwrap_or_else(|_| {
                    warn!("BOOKING_API_URL not set, using empty value");
                    String::new()
                }),
            booking_api_key: env::var("BOOKING_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("BOOKING_API_KEY not set, using empty value");
                    String::new()
                }),
            scheduling_link_url: env::var("SCHEDULING_LINK_URL")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULING_LINK_URL not set, using empty value");
                    String::new()
                }),
            scheduling_link_api_key: env::var("SCHEDULING_LINK_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULING_LINK_API_KEY not set, using empty value");
                    String::new()
                }),
        };

        if !config.is_booking_api_configured() && !config.is_scheduling_link_configured() {
            warn!("No calendar provider configured - slot generation will use business-hours fallback only");
        }

        config
    }

    pub fn is_booking_api_configured(&self) -> bool {
        !self.booking_api_url.is_empty() && !self.booking_api_key.is_empty()
    }

    pub fn is_scheduling_link_configured(&self) -> bool {
        !self.scheduling_link_url.is_empty() && !self.scheduling_link_api_key.is_empty()
    }
}
