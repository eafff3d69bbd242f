//! API request/response models for user accounts.

use super::pagination::Pagination;
use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

/// Job function of an account. Stored as snake_case text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum Role {
    #[default]
    CroAgent,
    Matchmaker,
    SuperAdmin,
}

impl Role {
    pub fn is_super_admin(self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::CroAgent => write!(f, "cro_agent"),
            Role::Matchmaker => write!(f, "matchmaker"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

// User request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCreate {
    pub username: String,
    /// Initial password. A strong password is generated and returned once when omitted.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

// User response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Only present on the response that created the account without an explicit password
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub generated_password: Option<String>,
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Restrict to one role
    pub role: Option<Role>,

    /// Case-insensitive substring match on username
    pub search: Option<String>,
}

/// The authenticated caller. Every core operation takes this explicitly as its actor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub is_enabled: bool,
}

impl CurrentUser {
    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            role: db.role,
            is_enabled: db.is_enabled,
            created_at: db.created_at,
            updated_at: db.updated_at,
            generated_password: None,
        }
    }
}

impl UserResponse {
    pub fn with_generated_password(mut self, password: String) -> Self {
        self.generated_password = Some(password);
        self
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            role: db.role,
            is_enabled: db.is_enabled,
        }
    }
}
