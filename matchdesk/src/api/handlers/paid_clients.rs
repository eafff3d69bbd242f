//! Paid clients: leads with at least one accepted payment.
//!
//! Each lead appears once, carrying its most recent accepted payment. Agents and matchmakers
//! only see their own.

use crate::api::handlers::traffic::{apply_update, check_update};
use crate::api::models::pagination::PageInfo;
use crate::api::models::paid_clients::{PaidClientPage, PaidClientQuery, PaidClientResponse};
use crate::api::models::traffic::{TrafficResponse, TrafficUpdate};
use crate::auth::permissions::{operation, resource, scope, RequiresPermission};
use crate::db::handlers::PaidClients;
use crate::db::models::paid_clients::PaidClientFilter;
use crate::errors::{Error, Result};
use crate::types::{Scope, TrafficId};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};

#[utoipa::path(
    get,
    path = "/paid-clients",
    tag = "paid_clients",
    summary = "List paid clients",
    description = "Leads with an accepted payment, most recent payment first. Non-admins only see leads assigned to them.",
    params(PaidClientQuery),
    responses(
        (status = 200, description = "One page of paid clients", body = PaidClientPage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Account disabled"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_paid_clients(
    State(state): State<AppState>,
    Query(query): Query<PaidClientQuery>,
    current_user: RequiresPermission<resource::PaidClients, operation::ReadOwn>,
) -> Result<Json<PaidClientPage>> {
    let pagination = query.pagination;
    let filter = PaidClientFilter::new(scope(&current_user), query);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = PaidClients::new(&mut pool_conn);

    let rows = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaidClientPage {
        data: rows.into_iter().map(PaidClientResponse::from).collect(),
        pagination: PageInfo::new(&pagination, total),
    }))
}

#[utoipa::path(
    patch,
    path = "/paid-clients/{traffic_id}",
    tag = "paid_clients",
    summary = "Update paid client",
    request_body = TrafficUpdate,
    responses(
        (status = 200, description = "Updated lead", body = TrafficResponse),
        (status = 400, description = "Invalid update, e.g. moving a paid lead back to pending"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Lead is not a paid client"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("traffic_id" = uuid::Uuid, Path, description = "Lead ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_paid_client(
    State(state): State<AppState>,
    Path(traffic_id): Path<TrafficId>,
    current_user: RequiresPermission<resource::PaidClients, operation::UpdateAll>,
    Json(update): Json<TrafficUpdate>,
) -> Result<Json<TrafficResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let client = PaidClients::new(&mut pool_conn)
        .get(Scope::All, traffic_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Paid client".to_string(),
            id: traffic_id.to_string(),
        })?;
    check_update(&current_user, &client.traffic, &update)?;

    let lead = apply_update(&mut pool_conn, traffic_id, &update).await?;
    Ok(Json(TrafficResponse::from(lead)))
}
