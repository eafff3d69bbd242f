//! Payment request lifecycle.
//!
//! A request starts `pending` and is decided exactly once, to `accepted` or `cancelled`.
//! Acceptance also promotes the lead to `paid`. The two writes are independent statements:
//! when the second one fails the caller gets a 500 and the [`super::reconciler`] finishes the
//! promotion later.

use sqlx::PgPool;
use tracing::{error, info, instrument};

use crate::{
    api::models::{
        payments::{PaymentCreate, PaymentStatus},
        users::CurrentUser,
    },
    auth::permissions::{authorize, scope},
    db::{
        handlers::{Payments, Repository, Traffic},
        models::payments::{PaymentCreateDBRequest, PaymentDBResponse, PendingPaymentDBResponse, Transition},
    },
    errors::{Error, Result},
    types::{Operation, PaymentId, Resource, Scope, abbrev_uuid},
};

/// Record a new pending payment request for a lead the actor can see.
#[instrument(skip(db, actor, request), fields(actor = %abbrev_uuid(&actor.id), traffic_id = %abbrev_uuid(&request.traffic_id)), err)]
pub async fn create_payment_request(db: &PgPool, actor: &CurrentUser, request: PaymentCreate) -> Result<PaymentDBResponse> {
    authorize(actor, Resource::Payments, Operation::CreateOwn)?;

    if let Some(field) = request.negative_amount() {
        return Err(Error::BadRequest {
            message: format!("{field} must not be negative"),
        });
    }
    if request.package_type.trim().is_empty() || request.payment_method.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "packageType and paymentMethod are required".to_string(),
        });
    }

    let mut tx = db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let traffic = Traffic::new(&mut tx).get_by_id(request.traffic_id).await?;
    let visible = match (traffic, scope(actor)) {
        (Some(_), Scope::All) => true,
        (Some(lead), Scope::AssignedTo(assignee)) => lead.assigned_by == assignee,
        (None, _) => false,
    };
    if !visible {
        return Err(Error::NotFound {
            resource: "Traffic".to_string(),
            id: request.traffic_id.to_string(),
        });
    }

    let payment = Payments::new(&mut tx)
        .create(&PaymentCreateDBRequest::new(actor.id, request))
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(payment_id = %abbrev_uuid(&payment.id), "Payment request created");
    Ok(payment)
}

/// Accept a pending payment and promote its lead to `paid`.
#[instrument(skip(db, actor), fields(actor = %abbrev_uuid(&actor.id), payment_id = %abbrev_uuid(&id)), err)]
pub async fn accept_payment(db: &PgPool, actor: &CurrentUser, id: PaymentId) -> Result<PaymentDBResponse> {
    let payment = decide(db, actor, id, PaymentStatus::Accepted).await?;

    let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Traffic::new(&mut conn).mark_paid(payment.traffic_id).await {
        Ok(true) => {
            info!(traffic_id = %abbrev_uuid(&payment.traffic_id), "Lead promoted to paid");
            Ok(payment)
        }
        Ok(false) => {
            error!(
                payment_id = %payment.id,
                traffic_id = %payment.traffic_id,
                "Payment accepted but its lead no longer exists"
            );
            Err(Error::Internal {
                operation: format!("promote lead {} to paid", payment.traffic_id),
            })
        }
        Err(e) => {
            error!(
                payment_id = %payment.id,
                traffic_id = %payment.traffic_id,
                error = %e,
                "Payment accepted but lead promotion failed; the reconciler will retry"
            );
            Err(Error::Internal {
                operation: format!("promote lead {} to paid", payment.traffic_id),
            })
        }
    }
}

/// Cancel a pending payment. The lead is left untouched.
#[instrument(skip(db, actor), fields(actor = %abbrev_uuid(&actor.id), payment_id = %abbrev_uuid(&id)), err)]
pub async fn cancel_payment(db: &PgPool, actor: &CurrentUser, id: PaymentId) -> Result<PaymentDBResponse> {
    decide(db, actor, id, PaymentStatus::Cancelled).await
}

async fn decide(db: &PgPool, actor: &CurrentUser, id: PaymentId, to: PaymentStatus) -> Result<PaymentDBResponse> {
    authorize(actor, Resource::Payments, Operation::Review)?;

    let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Payments::new(&mut conn).transition(id, to, actor.id).await? {
        Transition::Applied(payment) => {
            info!(payment_id = %abbrev_uuid(&payment.id), status = %to, "Payment decided");
            Ok(payment)
        }
        Transition::AlreadyDecided(current) => Err(Error::Conflict {
            message: format!("Payment has already been {current}"),
            current_status: Some(current.to_string()),
        }),
        Transition::NotFound => Err(Error::NotFound {
            resource: "Payment".to_string(),
            id: id.to_string(),
        }),
    }
}

/// Pending requests visible to the actor, oldest first.
#[instrument(skip(db, actor), fields(actor = %abbrev_uuid(&actor.id)), err)]
pub async fn list_pending(db: &PgPool, actor: &CurrentUser) -> Result<Vec<PendingPaymentDBResponse>> {
    authorize(actor, Resource::Payments, Operation::ReadOwn)?;

    let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Payments::new(&mut conn).list_pending(scope(actor)).await?)
}
