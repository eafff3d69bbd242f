//! Database models for lookup settings.

use crate::api::models::settings::{SettingCategory, SettingCreate, SettingUpdate};
use crate::types::SettingId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct SettingCreateDBRequest {
    pub category: SettingCategory,
    pub value: String,
    pub display_order: i32,
}

impl From<SettingCreate> for SettingCreateDBRequest {
    fn from(api: SettingCreate) -> Self {
        Self {
            category: api.category,
            value: api.value.trim().to_string(),
            display_order: api.display_order,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingUpdateDBRequest {
    pub value: Option<String>,
    pub display_order: Option<i32>,
}

impl From<SettingUpdate> for SettingUpdateDBRequest {
    fn from(api: SettingUpdate) -> Self {
        Self {
            value: api.value.map(|v| v.trim().to_string()),
            display_order: api.display_order,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SettingDBResponse {
    pub id: SettingId,
    pub category: SettingCategory,
    pub value: String,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
