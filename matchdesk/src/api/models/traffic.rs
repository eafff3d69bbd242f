//! API request/response models for traffic (leads).

use super::pagination::Pagination;
use crate::db::models::traffic::TrafficDBResponse;
use crate::types::{TrafficId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use std::fmt;
use utoipa::{IntoParams, ToSchema};

/// Lifecycle status of a lead. `Paid` is only ever set by payment acceptance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TrafficStatus {
    #[default]
    Pending,
    Active,
    Inactive,
    Paid,
}

impl fmt::Display for TrafficStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrafficStatus::Pending => write!(f, "pending"),
            TrafficStatus::Active => write!(f, "active"),
            TrafficStatus::Inactive => write!(f, "inactive"),
            TrafficStatus::Paid => write!(f, "paid"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Demographic and profile data captured for a lead. Picture and CV fields hold URLs only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TrafficProfile {
    pub profession: Option<String>,
    pub job_type: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub marital_status: Option<String>,
    pub gender: Option<String>,
    pub permanent_country: Option<String>,
    pub permanent_city: Option<String>,
    pub present_country: Option<String>,
    pub present_city: Option<String>,
    pub height: Option<String>,
    pub qualification: Option<String>,
    pub organization: Option<String>,
    pub religion: Option<String>,
    pub social_title: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub candidate_pictures: Vec<String>,
    pub curriculum_vitae: Option<String>,
    pub requirements: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrafficCreate {
    pub name: String,
    pub contact_number: String,
    pub email: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TrafficStatus>,
    /// Assignee. Only a super admin may assign a lead to someone other than themself.
    #[schema(value_type = Option<String>, format = "uuid")]
    pub assigned_by: Option<UserId>,
    #[serde(flatten)]
    pub profile: TrafficProfile,
}

/// Partial update. For nullable fields: absent = no change, `null` = clear, value = set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrafficUpdate {
    pub name: Option<String>,
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub email: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub status: Option<TrafficStatus>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub assigned_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub profession: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub job_type: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub marital_status: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub gender: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub permanent_country: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub permanent_city: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub present_country: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub present_city: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub height: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub qualification: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub organization: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub religion: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub social_title: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub profile_picture: Option<Option<String>>,
    pub candidate_pictures: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub curriculum_vitae: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub requirements: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrafficResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TrafficId,
    pub name: String,
    pub contact_number: String,
    pub email: Option<String>,
    pub priority: Priority,
    pub status: TrafficStatus,
    #[schema(value_type = String, format = "uuid")]
    pub assigned_by: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    #[serde(flatten)]
    pub profile: TrafficProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TrafficDBResponse> for TrafficResponse {
    fn from(db: TrafficDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            contact_number: db.contact_number,
            email: db.email,
            priority: db.priority,
            status: db.status,
            assigned_by: db.assigned_by,
            created_by: db.created_by,
            profile: db.profile,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing traffic
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListTrafficQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<TrafficStatus>,

    pub priority: Option<Priority>,

    /// Case-insensitive substring match on name, contact number or email
    pub q: Option<String>,
}
