//! API models for dashboard statistics.

use crate::db::handlers::dashboard::DashboardStatsDBResponse;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Headline numbers, restricted to the caller's own leads unless they are a super admin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub traffic_count: i64,
    /// Leads with at least one accepted payment
    pub paid_clients_count: i64,
    pub pending_payments_count: i64,
    /// Sum of `paidAmount` over accepted payments
    pub total_paid_amount: Decimal,
}

impl From<DashboardStatsDBResponse> for DashboardStats {
    fn from(db: DashboardStatsDBResponse) -> Self {
        Self {
            traffic_count: db.traffic_count,
            paid_clients_count: db.paid_clients_count,
            pending_payments_count: db.pending_payments_count,
            total_paid_amount: db.total_paid_amount,
        }
    }
}
