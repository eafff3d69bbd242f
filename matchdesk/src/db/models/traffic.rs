//! Database models for traffic (leads).

use crate::api::models::traffic::{Priority, TrafficProfile, TrafficStatus, TrafficUpdate};
use crate::types::{TrafficId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a lead
#[derive(Debug, Clone)]
pub struct TrafficCreateDBRequest {
    pub name: String,
    pub contact_number: String,
    pub email: Option<String>,
    pub priority: Priority,
    pub status: TrafficStatus,
    pub assigned_by: UserId,
    pub created_by: UserId,
    pub profile: TrafficProfile,
}

/// Partial updates use the API shape directly; every field is already optional.
pub type TrafficUpdateDBRequest = TrafficUpdate;

/// Database response for a lead
#[derive(Debug, Clone, FromRow)]
pub struct TrafficDBResponse {
    pub id: TrafficId,
    pub name: String,
    pub contact_number: String,
    pub email: Option<String>,
    pub priority: Priority,
    pub status: TrafficStatus,
    pub assigned_by: UserId,
    pub created_by: UserId,
    #[sqlx(flatten)]
    pub profile: TrafficProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
