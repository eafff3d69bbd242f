//! Database repository for payment requests.
//!
//! Status changes only go through [`Payments::transition`], a single conditional UPDATE that
//! succeeds only while the row is still `pending`. Concurrent accept/cancel calls on the same
//! payment therefore resolve to exactly one winner without any in-process locking.

use crate::types::{Operation, PaymentId, Scope, TrafficId, UserId, abbrev_uuid};
use crate::{
    api::models::payments::PaymentStatus,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::payments::{
            PaymentCreateDBRequest, PaymentDBResponse, PaymentUpdateDBRequest, PendingPaymentDBResponse, Transition,
        },
    },
};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing payments. Scope applies to the lead's assignee.
#[derive(Debug, Clone)]
pub struct PaymentFilter {
    pub skip: i64,
    pub limit: i64,
    pub scope: Scope,
    pub status: Option<PaymentStatus>,
    pub traffic_id: Option<TrafficId>,
}

impl PaymentFilter {
    pub fn new(scope: Scope, skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            scope,
            status: None,
            traffic_id: None,
        }
    }

    fn push_predicates(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(assignee) = self.scope.assignee() {
            query.push(" AND t.assigned_by = ").push_bind(assignee);
        }
        if let Some(status) = self.status {
            query.push(" AND p.status = ").push_bind(status);
        }
        if let Some(traffic_id) = self.traffic_id {
            query.push(" AND p.traffic_id = ").push_bind(traffic_id);
        }
    }
}

pub struct Payments<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Payments<'c> {
    type CreateRequest = PaymentCreateDBRequest;
    type UpdateRequest = PaymentUpdateDBRequest;
    type Response = PaymentDBResponse;
    type Id = PaymentId;
    type Filter = PaymentFilter;

    #[instrument(skip(self, request), fields(traffic_id = %abbrev_uuid(&request.traffic_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            INSERT INTO payments (
                traffic_id, package_type, paid_amount, discount_amount, due_amount,
                total_amount, payment_method, after_marriage_fee, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(request.traffic_id)
        .bind(request.package_type.trim())
        .bind(request.paid_amount)
        .bind(request.discount_amount)
        .bind(request.due_amount)
        .bind(request.total_amount)
        .bind(request.payment_method.trim())
        .bind(request.after_marriage_fee)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(payment)
    }

    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(payment)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<PaymentId>) -> Result<HashMap<Self::Id, PaymentDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, PaymentDBResponse>("SELECT * FROM payments WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip, scope = ?filter.scope), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT p.* FROM payments p JOIN traffic t ON t.id = p.traffic_id");
        filter.push_predicates(&mut query);
        query.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let rows = query.build_query_as::<PaymentDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    /// Only pending requests may be deleted; decided payments are part of the audit trail.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match self.get_by_id(id).await? {
            None => Ok(false),
            Some(payment) => Err(DbError::ProtectedEntity {
                operation: Operation::DeleteAll,
                reason: format!("payment has already been {}", payment.status),
                entity_type: "payment".to_string(),
                entity_id: Some(id.to_string()),
            }),
        }
    }

    #[instrument(skip(self, request), fields(payment_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            UPDATE payments SET
                invoice_generated = COALESCE($2, invoice_generated)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.invoice_generated)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(payment)
    }
}

impl<'c> Payments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), fields(scope = ?filter.scope), err)]
    pub async fn count(&mut self, filter: &PaymentFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM payments p JOIN traffic t ON t.id = p.traffic_id");
        filter.push_predicates(&mut query);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Pending requests joined with the lead name, oldest first.
    #[instrument(skip(self), err)]
    pub async fn list_pending(&mut self, scope: Scope) -> Result<Vec<PendingPaymentDBResponse>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT p.*, t.name AS traffic_name, t.assigned_by FROM payments p JOIN traffic t ON t.id = p.traffic_id",
        );
        PaymentFilter {
            status: Some(PaymentStatus::Pending),
            ..PaymentFilter::new(scope, 0, 0)
        }
        .push_predicates(&mut query);
        query.push(" ORDER BY p.created_at ASC, p.id ASC");

        let rows = query
            .build_query_as::<PendingPaymentDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;
        Ok(rows)
    }

    /// Move a pending payment to `to`. The status check and the write happen in one statement;
    /// when no row matches, the payment is re-read to tell a missing id from a decided one.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id), to = %to, decided_by = %abbrev_uuid(&decided_by)), err)]
    pub async fn transition(&mut self, id: PaymentId, to: PaymentStatus, decided_by: UserId) -> Result<Transition> {
        if !to.is_terminal() {
            return Err(DbError::Other(anyhow::anyhow!("cannot transition a payment to {to}")));
        }

        let updated = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            UPDATE payments SET
                status = $2,
                decided_by = $3,
                decided_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to)
        .bind(decided_by)
        .fetch_optional(&mut *self.db)
        .await?;

        if let Some(payment) = updated {
            return Ok(Transition::Applied(payment));
        }

        let current: Option<PaymentStatus> = sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(match current {
            Some(status) => Transition::AlreadyDecided(status),
            None => Transition::NotFound,
        })
    }
}
