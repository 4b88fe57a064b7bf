use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scheduling::{BusinessCategory, BusinessHoursProfile, CalendarCredential};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: Uuid,
    pub name: String,
    pub business_category: BusinessCategory,
    pub business_hours: BusinessHoursProfile,
    /// Default calendar binding for the tenant; individual contacts may
    /// carry their own credential which takes precedence.
    pub calendar_credential: Option<CalendarCredential>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantConfig {
    pub fn new(tenant_id: Uuid, name: impl Into<String>, category: BusinessCategory) -> Self {
        let now = Utc::now();
        Self {
            tenant_id,
            name: name.into(),
            business_category: category,
            business_hours: BusinessHoursProfile::for_category(category),
            calendar_credential: None,
            created_at: now,
            updated_at: now,
        }
    }
}
