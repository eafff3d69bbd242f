//! API models for lookup settings (dropdown values grouped by category).

use crate::db::models::settings::SettingDBResponse;
use crate::types::SettingId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

/// Closed set of lookup categories. camelCase on the wire, snake_case in the database.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema,
)]
#[serde(rename_all = "camelCase")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SettingCategory {
    Priority,
    Status,
    Profession,
    JobType,
    MaritalStatus,
    Gender,
    PermanentCountry,
    PermanentCity,
    PresentCountry,
    PresentCity,
    Height,
    Qualification,
    Organization,
    Religion,
    SocialTitle,
    PackageType,
    PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingCreate {
    pub category: SettingCategory,
    pub value: String,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingUpdate {
    pub value: Option<String>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: SettingId,
    pub category: SettingCategory,
    pub value: String,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListSettingsQuery {
    /// Restrict to a single category
    pub category: Option<SettingCategory>,
}

/// Settings keyed by category, each list ordered by display order then value.
pub type SettingsByCategory = BTreeMap<SettingCategory, Vec<SettingResponse>>;

impl From<SettingDBResponse> for SettingResponse {
    fn from(db: SettingDBResponse) -> Self {
        Self {
            id: db.id,
            category: db.category,
            value: db.value,
            display_order: db.display_order,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Group settings by category, preserving the incoming order within each category.
pub fn group_by_category(settings: impl IntoIterator<Item = SettingDBResponse>) -> SettingsByCategory {
    let mut grouped = SettingsByCategory::new();
    for setting in settings {
        grouped.entry(setting.category).or_default().push(setting.into());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(category: SettingCategory, value: &str, order: i32) -> SettingDBResponse {
        SettingDBResponse {
            id: uuid::Uuid::new_v4(),
            category,
            value: value.to_string(),
            display_order: order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_category_wire_format() {
        assert_eq!(
            serde_json::to_string(&SettingCategory::MaritalStatus).unwrap(),
            "\"maritalStatus\""
        );
        assert!(serde_json::from_str::<SettingCategory>("\"favouriteColour\"").is_err());
    }

    #[test]
    fn test_group_by_category() {
        let grouped = group_by_category(vec![
            setting(SettingCategory::Gender, "Female", 0),
            setting(SettingCategory::Gender, "Male", 1),
            setting(SettingCategory::PaymentMethod, "Cash", 0),
        ]);

        assert_eq!(grouped.len(), 2);
        let genders: Vec<_> = grouped[&SettingCategory::Gender].iter().map(|s| s.value.as_str()).collect();
        assert_eq!(genders, vec!["Female", "Male"]);

        let json = serde_json::to_value(&grouped).unwrap();
        assert!(json.get("paymentMethod").is_some());
    }
}
