//! Aggregate counts for the dashboard, scoped the same way as the lists they summarize.

use crate::db::errors::Result;
use crate::types::Scope;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct DashboardStatsDBResponse {
    pub traffic_count: i64,
    pub paid_clients_count: i64,
    pub pending_payments_count: i64,
    pub total_paid_amount: Decimal,
}

pub struct Dashboard<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Dashboard<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn stats(&mut self, scope: Scope) -> Result<DashboardStatsDBResponse> {
        // $1 is NULL for an unrestricted scope
        let stats = sqlx::query_as::<_, DashboardStatsDBResponse>(
            r#"
            WITH visible AS (
                SELECT id FROM traffic WHERE ($1::uuid IS NULL OR assigned_by = $1)
            )
            SELECT
                (SELECT COUNT(*) FROM visible) AS traffic_count,
                (SELECT COUNT(DISTINCT p.traffic_id) FROM payments p
                    WHERE p.status = 'accepted' AND p.traffic_id IN (SELECT id FROM visible)) AS paid_clients_count,
                (SELECT COUNT(*) FROM payments p
                    WHERE p.status = 'pending' AND p.traffic_id IN (SELECT id FROM visible)) AS pending_payments_count,
                (SELECT COALESCE(SUM(p.paid_amount), 0) FROM payments p
                    WHERE p.status = 'accepted' AND p.traffic_id IN (SELECT id FROM visible)) AS total_paid_amount
            "#,
        )
        .bind(scope.assignee())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::payments::PaymentStatus;
    use crate::api::models::users::Role;
    use crate::db::handlers::Payments;
    use crate::test_utils::{create_test_payment, create_test_traffic, create_test_user};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_stats_are_scoped(pool: PgPool) {
        let agent_a = create_test_user(&pool, Role::CroAgent).await;
        let agent_b = create_test_user(&pool, Role::CroAgent).await;
        let admin = create_test_user(&pool, Role::SuperAdmin).await;

        let lead_a = create_test_traffic(&pool, agent_a.id).await;
        create_test_traffic(&pool, agent_a.id).await;
        let lead_b = create_test_traffic(&pool, agent_b.id).await;

        let accepted = create_test_payment(&pool, lead_a.id, agent_a.id).await;
        create_test_payment(&pool, lead_b.id, agent_b.id).await;

        let mut conn = pool.acquire().await.unwrap();
        Payments::new(&mut conn)
            .transition(accepted.id, PaymentStatus::Accepted, admin.id)
            .await
            .unwrap();

        let mut dashboard = Dashboard::new(&mut conn);

        let all = dashboard.stats(Scope::All).await.unwrap();
        assert_eq!(all.traffic_count, 3);
        assert_eq!(all.paid_clients_count, 1);
        assert_eq!(all.pending_payments_count, 1);
        assert_eq!(all.total_paid_amount, accepted.paid_amount);

        let b = dashboard.stats(Scope::AssignedTo(agent_b.id)).await.unwrap();
        assert_eq!(b.traffic_count, 1);
        assert_eq!(b.paid_clients_count, 0);
        assert_eq!(b.pending_payments_count, 1);
        assert_eq!(b.total_paid_amount, Decimal::ZERO);
    }
}
