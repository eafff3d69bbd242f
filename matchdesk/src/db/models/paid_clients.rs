//! Database models for the paid clients projection (traffic joined with its latest accepted payment).

use crate::api::models::paid_clients::PaidClientQuery;
use crate::db::models::traffic::TrafficDBResponse;
use crate::types::{PaymentId, Scope};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct PaidClientDBResponse {
    #[sqlx(flatten)]
    pub traffic: TrafficDBResponse,
    pub payment_id: PaymentId,
    pub payment_date: DateTime<Utc>,
    pub package_type: String,
    pub paid_amount: Decimal,
    pub total_amount: Decimal,
    pub due_amount: Decimal,
    pub payment_method: String,
}

/// Filter for the paid clients query. The same predicates feed both the page and the count.
#[derive(Debug, Clone)]
pub struct PaidClientFilter {
    pub scope: Scope,
    pub gender: Option<String>,
    pub birth_year: Option<i32>,
    pub age: Option<i32>,
    pub height: Option<String>,
    pub marital_status: Option<String>,
    pub qualification: Option<String>,
    pub profession: Option<String>,
    pub permanent_country: Option<String>,
    pub permanent_city: Option<String>,
    pub present_country: Option<String>,
    pub present_city: Option<String>,
    pub q: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

impl PaidClientFilter {
    pub fn new(scope: Scope, query: PaidClientQuery) -> Self {
        // Blank strings from empty form fields mean "no filter"
        let clean = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            scope,
            offset: query.pagination.offset(),
            limit: query.pagination.page_size(),
            gender: clean(query.gender),
            birth_year: query.birth_year,
            age: query.age,
            height: clean(query.height),
            marital_status: clean(query.marital_status),
            qualification: clean(query.qualification),
            profession: clean(query.profession),
            permanent_country: clean(query.permanent_country),
            permanent_city: clean(query.permanent_city),
            present_country: clean(query.present_country),
            present_city: clean(query.present_city),
            q: clean(query.q),
        }
    }
}
