//! API models for the paid clients view.

use super::pagination::{PageInfo, PagePagination};
use super::traffic::TrafficResponse;
use crate::db::models::paid_clients::PaidClientDBResponse;
use crate::types::PaymentId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for `GET /api/paid-clients`.
///
/// Text filters are exact matches ignoring case; `q` is a substring match across the lead's
/// name, contact details, profession, qualification, locations, organization and requirements.
#[serde_as]
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaidClientQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PagePagination,

    pub gender: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub birth_year: Option<i32>,
    /// Age in whole years as of today
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
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
}

/// A lead with an accepted payment, carrying its most recent accepted payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaidClientResponse {
    #[serde(flatten)]
    pub traffic: TrafficResponse,
    #[schema(value_type = String, format = "uuid")]
    pub payment_id: PaymentId,
    pub payment_date: DateTime<Utc>,
    pub package_type: String,
    pub paid_amount: Decimal,
    pub total_amount: Decimal,
    pub due_amount: Decimal,
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaidClientPage {
    pub data: Vec<PaidClientResponse>,
    pub pagination: PageInfo,
}

impl From<PaidClientDBResponse> for PaidClientResponse {
    fn from(db: PaidClientDBResponse) -> Self {
        Self {
            traffic: db.traffic.into(),
            payment_id: db.payment_id,
            payment_date: db.payment_date,
            package_type: db.package_type,
            paid_amount: db.paid_amount,
            total_amount: db.total_amount,
            due_amount: db.due_amount,
            payment_method: db.payment_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parses_string_numbers() {
        let query: PaidClientQuery = serde_json::from_value(serde_json::json!({
            "page": "2",
            "pageSize": "500",
            "birthYear": "1990",
            "gender": "Female",
            "presentCity": "Dhaka"
        }))
        .unwrap();

        assert_eq!(query.pagination.page(), 2);
        assert_eq!(query.pagination.page_size(), 100);
        assert_eq!(query.birth_year, Some(1990));
        assert_eq!(query.present_city.as_deref(), Some("Dhaka"));
        assert!(query.age.is_none());
    }
}
