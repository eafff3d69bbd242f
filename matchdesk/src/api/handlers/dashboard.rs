use crate::api::models::dashboard::DashboardStats;
use crate::auth::permissions::{operation, resource, scope, RequiresPermission};
use crate::db::handlers::Dashboard;
use crate::errors::{Error, Result};
use crate::AppState;
use axum::{extract::State, Json};

/// Headline counts for the caller's leads, or for every lead when called by a super admin.
#[utoipa::path(
    get,
    path = "/dashboard/stats",
    tag = "dashboard",
    summary = "Dashboard statistics",
    responses(
        (status = 200, description = "Scoped statistics", body = DashboardStats),
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
pub async fn get_stats(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Dashboard, operation::ReadOwn>,
) -> Result<Json<DashboardStats>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let stats = Dashboard::new(&mut pool_conn).stats(scope(&current_user)).await?;
    Ok(Json(DashboardStats::from(stats)))
}

#[cfg(test)]
mod tests {
    use crate::api::models::dashboard::DashboardStats;
    use crate::api::models::users::{CurrentUser, Role};
    use crate::test_utils::*;
    use crate::workflow;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_stats_follow_the_callers_scope(pool: PgPool) {
        let (app, _bg_services) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::CroAgent).await;
        let other = create_test_user(&pool, Role::Matchmaker).await;
        let admin = create_test_admin_user(&pool).await;

        let lead = create_test_traffic(&pool, agent.id).await;
        let payment = create_test_payment(&pool, lead.id, agent.id).await;
        create_test_payment(&pool, lead.id, agent.id).await;
        let other_lead = create_test_traffic(&pool, other.id).await;
        create_test_payment(&pool, other_lead.id, other.id).await;
        workflow::payments::accept_payment(&pool, &CurrentUser::from(admin.clone()), payment.id)
            .await
            .unwrap();

        let response = app
            .get("/api/dashboard/stats")
            .add_header(add_auth_headers(&agent).0, add_auth_headers(&agent).1)
            .await;
        response.assert_status_ok();
        let stats: DashboardStats = response.json();
        assert_eq!(
            stats,
            DashboardStats {
                traffic_count: 1,
                paid_clients_count: 1,
                pending_payments_count: 1,
                total_paid_amount: Decimal::from(30000),
            }
        );

        let response = app
            .get("/api/dashboard/stats")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await;
        let stats: DashboardStats = response.json();
        assert_eq!(stats.traffic_count, 2);
        assert_eq!(stats.pending_payments_count, 2);
    }
}
