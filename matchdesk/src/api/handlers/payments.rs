//! Payment request handlers.
//!
//! Creation and the accept/cancel decision delegate to [`crate::workflow::payments`], which
//! owns the state machine. The remaining routes are plain reads and super admin bookkeeping.

use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::payments::{ListPaymentsQuery, PaymentCreate, PaymentRequestResponse, PaymentResponse, PaymentUpdate};
use crate::api::models::users::CurrentUser;
use crate::auth::permissions::{operation, resource, scope, RequiresPermission};
use crate::db::handlers::{payments::PaymentFilter, Payments, Repository, Traffic};
use crate::db::errors::DbError;
use crate::db::models::payments::PaymentUpdateDBRequest;
use crate::errors::{Error, Result};
use crate::types::{PaymentId, Scope};
use crate::workflow;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

fn not_found(id: PaymentId) -> Error {
    Error::NotFound {
        resource: "Payment".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    post,
    path = "/payments",
    tag = "payments",
    summary = "Create payment request",
    request_body = PaymentCreate,
    responses(
        (status = 201, description = "Pending payment request created", body = PaymentResponse),
        (status = 400, description = "Invalid request, e.g. a negative amount"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lead not found or not assigned to the caller"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<PaymentCreate>,
) -> Result<(StatusCode, Json<PaymentResponse>)> {
    let payment = workflow::payments::create_payment_request(&state.db, &current_user, create).await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    summary = "List payments",
    params(ListPaymentsQuery),
    responses(
        (status = 200, description = "Page of payments on leads visible to the caller, newest first", body = PaginatedResponse<PaymentResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
    current_user: RequiresPermission<resource::Payments, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<PaymentResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = PaymentFilter {
        status: query.status,
        traffic_id: query.traffic_id,
        ..PaymentFilter::new(scope(&current_user), skip, limit)
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Payments::new(&mut pool_conn);

    let payments = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    let data = payments.into_iter().map(PaymentResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/payments/pending",
    tag = "payments",
    summary = "List pending payment requests",
    responses(
        (status = 200, description = "Pending requests on leads visible to the caller, oldest first", body = Vec<PaymentRequestResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_pending_payments(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<PaymentRequestResponse>>> {
    let pending = workflow::payments::list_pending(&state.db, &current_user).await?;
    Ok(Json(pending.into_iter().map(PaymentRequestResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/payments/{payment_id}",
    tag = "payments",
    summary = "Get payment",
    responses(
        (status = 200, description = "Payment details", body = PaymentResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Payment not found or its lead is not assigned to the caller"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("payment_id" = uuid::Uuid, Path, description = "Payment ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<PaymentId>,
    current_user: RequiresPermission<resource::Payments, operation::ReadOwn>,
) -> Result<Json<PaymentResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let payment = Payments::new(&mut pool_conn)
        .get_by_id(payment_id)
        .await?
        .ok_or_else(|| not_found(payment_id))?;

    if let Scope::AssignedTo(assignee) = scope(&current_user) {
        let lead = Traffic::new(&mut pool_conn).get_by_id(payment.traffic_id).await?;
        if lead.is_none_or(|lead| lead.assigned_by != assignee) {
            return Err(not_found(payment_id));
        }
    }

    Ok(Json(PaymentResponse::from(payment)))
}

#[utoipa::path(
    post,
    path = "/payments/{payment_id}/accept",
    tag = "payments",
    summary = "Accept payment request",
    description = "Moves a pending request to accepted and promotes its lead to paid.",
    responses(
        (status = 200, description = "Payment accepted", body = PaymentResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Payment has already been decided"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("payment_id" = uuid::Uuid, Path, description = "Payment ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn accept_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<PaymentId>,
    current_user: CurrentUser,
) -> Result<Json<PaymentResponse>> {
    let payment = workflow::payments::accept_payment(&state.db, &current_user, payment_id).await?;
    Ok(Json(PaymentResponse::from(payment)))
}

#[utoipa::path(
    post,
    path = "/payments/{payment_id}/cancel",
    tag = "payments",
    summary = "Cancel payment request",
    responses(
        (status = 200, description = "Payment cancelled", body = PaymentResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Payment has already been decided"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("payment_id" = uuid::Uuid, Path, description = "Payment ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<PaymentId>,
    current_user: CurrentUser,
) -> Result<Json<PaymentResponse>> {
    let payment = workflow::payments::cancel_payment(&state.db, &current_user, payment_id).await?;
    Ok(Json(PaymentResponse::from(payment)))
}

#[utoipa::path(
    patch,
    path = "/payments/{payment_id}",
    tag = "payments",
    summary = "Update payment bookkeeping",
    request_body = PaymentUpdate,
    responses(
        (status = 200, description = "Payment updated", body = PaymentResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Payment not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("payment_id" = uuid::Uuid, Path, description = "Payment ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<PaymentId>,
    _: RequiresPermission<resource::Payments, operation::UpdateAll>,
    Json(update): Json<PaymentUpdate>,
) -> Result<Json<PaymentResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let request = PaymentUpdateDBRequest {
        invoice_generated: update.invoice_generated,
    };
    match Payments::new(&mut pool_conn).update(payment_id, &request).await {
        Ok(payment) => Ok(Json(PaymentResponse::from(payment))),
        Err(DbError::NotFound) => Err(not_found(payment_id)),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    delete,
    path = "/payments/{payment_id}",
    tag = "payments",
    summary = "Withdraw payment request",
    responses(
        (status = 204, description = "Pending payment request deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Payment has already been decided"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("payment_id" = uuid::Uuid, Path, description = "Payment ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<PaymentId>,
    _: RequiresPermission<resource::Payments, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Payments::new(&mut pool_conn).delete(payment_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(payment_id))
    }
}
