//! API request/response models for payment requests.

use super::pagination::Pagination;
use crate::db::models::payments::{PaymentDBResponse, PendingPaymentDBResponse};
use crate::types::{PaymentId, TrafficId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

/// Payment request lifecycle. `Accepted` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Accepted,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Accepted => write!(f, "accepted"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Body of `POST /api/payments`. `dueAmount` is taken as supplied.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreate {
    #[schema(value_type = String, format = "uuid")]
    pub traffic_id: TrafficId,
    pub package_type: String,
    pub paid_amount: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub due_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub after_marriage_fee: Option<Decimal>,
}

impl PaymentCreate {
    /// Money fields that must not be negative.
    pub fn negative_amount(&self) -> Option<&'static str> {
        [
            ("paidAmount", Some(self.paid_amount)),
            ("discountAmount", Some(self.discount_amount)),
            ("totalAmount", Some(self.total_amount)),
            ("afterMarriageFee", self.after_marriage_fee),
        ]
        .into_iter()
        .find(|(_, amount)| amount.is_some_and(|a| a.is_sign_negative() && !a.is_zero()))
        .map(|(name, _)| name)
    }
}

/// Query parameters for `GET /api/payments`
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListPaymentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<PaymentStatus>,

    /// Only payments for this lead
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub traffic_id: Option<TrafficId>,
}

/// Body of `PATCH /api/payments/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    pub invoice_generated: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PaymentId,
    #[schema(value_type = String, format = "uuid")]
    pub traffic_id: TrafficId,
    pub package_type: String,
    pub paid_amount: Decimal,
    pub discount_amount: Decimal,
    pub due_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub after_marriage_fee: Option<Decimal>,
    pub status: PaymentStatus,
    pub invoice_generated: bool,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A pending payment request joined with the lead it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestResponse {
    #[serde(flatten)]
    pub payment: PaymentResponse,
    pub traffic_name: String,
    #[schema(value_type = String, format = "uuid")]
    pub assigned_by: UserId,
}

impl From<PaymentDBResponse> for PaymentResponse {
    fn from(db: PaymentDBResponse) -> Self {
        Self {
            id: db.id,
            traffic_id: db.traffic_id,
            package_type: db.package_type,
            paid_amount: db.paid_amount,
            discount_amount: db.discount_amount,
            due_amount: db.due_amount,
            total_amount: db.total_amount,
            payment_method: db.payment_method,
            after_marriage_fee: db.after_marriage_fee,
            status: db.status,
            invoice_generated: db.invoice_generated,
            created_by: db.created_by,
            decided_by: db.decided_by,
            decided_at: db.decided_at,
            created_at: db.created_at,
        }
    }
}

impl From<PendingPaymentDBResponse> for PaymentRequestResponse {
    fn from(db: PendingPaymentDBResponse) -> Self {
        Self {
            payment: db.payment.into(),
            traffic_name: db.traffic_name,
            assigned_by: db.assigned_by,
        }
    }
}
