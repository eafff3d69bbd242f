//! Database models for payment requests.

use crate::api::models::payments::{PaymentCreate, PaymentStatus};
use crate::types::{PaymentId, TrafficId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Database request for creating a payment request. Status always starts as pending.
#[derive(Debug, Clone)]
pub struct PaymentCreateDBRequest {
    pub traffic_id: TrafficId,
    pub package_type: String,
    pub paid_amount: Decimal,
    pub discount_amount: Decimal,
    pub due_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub after_marriage_fee: Option<Decimal>,
    pub created_by: UserId,
}

impl PaymentCreateDBRequest {
    pub fn new(created_by: UserId, api: PaymentCreate) -> Self {
        Self {
            traffic_id: api.traffic_id,
            package_type: api.package_type,
            paid_amount: api.paid_amount,
            discount_amount: api.discount_amount,
            due_amount: api.due_amount,
            total_amount: api.total_amount,
            payment_method: api.payment_method,
            after_marriage_fee: api.after_marriage_fee,
            created_by,
        }
    }
}

/// Database request for updating bookkeeping fields. Status is never updated this way.
#[derive(Debug, Clone, Default)]
pub struct PaymentUpdateDBRequest {
    pub invoice_generated: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentDBResponse {
    pub id: PaymentId,
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
    pub created_by: UserId,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Pending payment joined with its lead's name and assignee
#[derive(Debug, Clone, FromRow)]
pub struct PendingPaymentDBResponse {
    #[sqlx(flatten)]
    pub payment: PaymentDBResponse,
    pub traffic_name: String,
    pub assigned_by: UserId,
}

/// Result of a conditional status transition
#[derive(Debug, Clone)]
pub enum Transition {
    /// The payment was pending and now carries the requested status
    Applied(PaymentDBResponse),
    /// The payment had already been decided; carries the status it holds
    AlreadyDecided(PaymentStatus),
    NotFound,
}
