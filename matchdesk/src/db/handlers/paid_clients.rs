//! Read-only repository for the paid clients view.
//!
//! A paid client is a lead with at least one accepted payment. Each lead appears once, paired
//! with its most recent accepted payment. Every query is built from [`push_predicates`], so the
//! page and the total can never disagree about which rows match.

use crate::db::{
    errors::Result,
    models::paid_clients::{PaidClientDBResponse, PaidClientFilter},
};
use crate::types::{Scope, TrafficId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use super::contains_pattern;
use tracing::instrument;

/// Latest accepted payment per lead
const LATEST_ACCEPTED: &str = r#"
    WITH latest AS (
        SELECT DISTINCT ON (p.traffic_id)
            p.id AS payment_id,
            p.traffic_id,
            p.created_at AS payment_date,
            p.package_type,
            p.paid_amount,
            p.total_amount,
            p.due_amount,
            p.payment_method
        FROM payments p
        WHERE p.status = 'accepted'
        ORDER BY p.traffic_id, p.created_at DESC, p.id DESC
    )
"#;

/// Text columns searched by `q`
const SEARCH_COLUMNS: [&str; 12] = [
    "t.name",
    "t.contact_number",
    "t.email",
    "t.profession",
    "t.qualification",
    "t.permanent_country",
    "t.permanent_city",
    "t.present_country",
    "t.present_city",
    "t.organization",
    "t.requirements",
    "t.job_type",
];

/// Appends the WHERE clause for `filter` within `scope`.
fn push_predicates(query: &mut QueryBuilder<'_, Postgres>, filter: &PaidClientFilter) {
    query.push(" WHERE TRUE");

    if let Scope::AssignedTo(assignee) = filter.scope {
        query.push(" AND t.assigned_by = ").push_bind(assignee);
    }

    let exact = [
        ("t.gender", &filter.gender),
        ("t.height", &filter.height),
        ("t.marital_status", &filter.marital_status),
        ("t.qualification", &filter.qualification),
        ("t.profession", &filter.profession),
        ("t.permanent_country", &filter.permanent_country),
        ("t.permanent_city", &filter.permanent_city),
        ("t.present_country", &filter.present_country),
        ("t.present_city", &filter.present_city),
    ];
    for (column, value) in exact {
        if let Some(value) = value {
            query
                .push(" AND lower(")
                .push(column)
                .push(") = lower(")
                .push_bind(value.clone())
                .push(")");
        }
    }

    if let Some(year) = filter.birth_year {
        query
            .push(" AND EXTRACT(YEAR FROM t.date_of_birth)::int = ")
            .push_bind(year);
    }
    if let Some(age) = filter.age {
        query
            .push(" AND date_part('year', age(CURRENT_DATE, t.date_of_birth))::int = ")
            .push_bind(age);
    }

    if let Some(q) = &filter.q {
        let pattern = contains_pattern(q);
        query.push(" AND (");
        let mut separated = query.separated(" OR ");
        for column in SEARCH_COLUMNS {
            separated.push(format!("{column} ILIKE "));
            separated.push_bind_unseparated(pattern.clone());
            separated.push_unseparated(" ESCAPE '\\'");
        }
        query.push(")");
    }
}

pub struct PaidClients<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PaidClients<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// One page of paid clients, most recent payment first.
    #[instrument(skip(self, filter), fields(scope = ?filter.scope, offset = filter.offset, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &PaidClientFilter) -> Result<Vec<PaidClientDBResponse>> {
        let mut query = QueryBuilder::<Postgres>::new(LATEST_ACCEPTED);
        query.push(
            r#"
            SELECT t.*, l.payment_id, l.payment_date, l.package_type, l.paid_amount,
                   l.total_amount, l.due_amount, l.payment_method
            FROM latest l
            JOIN traffic t ON t.id = l.traffic_id
            "#,
        );
        push_predicates(&mut query, filter);
        query.push(" ORDER BY l.payment_date DESC, l.payment_id DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.offset);

        let rows = query.build_query_as::<PaidClientDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    /// Number of paid clients matching the filter, ignoring its offset/limit.
    #[instrument(skip(self, filter), fields(scope = ?filter.scope), err)]
    pub async fn count(&mut self, filter: &PaidClientFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new(LATEST_ACCEPTED);
        query.push(" SELECT COUNT(*) FROM latest l JOIN traffic t ON t.id = l.traffic_id");
        push_predicates(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// A single paid client within `scope`, or None if the lead has no accepted payment.
    #[instrument(skip(self), fields(traffic_id = %abbrev_uuid(&traffic_id)), err)]
    pub async fn get(&mut self, scope: Scope, traffic_id: TrafficId) -> Result<Option<PaidClientDBResponse>> {
        let mut query = QueryBuilder::<Postgres>::new(LATEST_ACCEPTED);
        query.push(
            r#"
            SELECT t.*, l.payment_id, l.payment_date, l.package_type, l.paid_amount,
                   l.total_amount, l.due_amount, l.payment_method
            FROM latest l
            JOIN traffic t ON t.id = l.traffic_id
            WHERE t.id = "#,
        );
        query.push_bind(traffic_id);
        if let Scope::AssignedTo(assignee) = scope {
            query.push(" AND t.assigned_by = ").push_bind(assignee);
        }

        let row = query
            .build_query_as::<PaidClientDBResponse>()
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::paid_clients::PaidClientQuery;
    use crate::api::models::pagination::PagePagination;
    use crate::api::models::payments::PaymentStatus;
    use crate::api::models::users::Role;
    use crate::db::handlers::payments::Payments;
    use crate::db::handlers::{Repository, Traffic};
    use crate::test_utils::{create_test_payment, create_test_traffic, create_test_user};
    use crate::types::UserId;
    use sqlx::PgPool;

    async fn accept(pool: &PgPool, traffic_id: TrafficId, creator: UserId, admin: UserId) -> uuid::Uuid {
        let payment = create_test_payment(pool, traffic_id, creator).await;
        let mut conn = pool.acquire().await.unwrap();
        Payments::new(&mut conn)
            .transition(payment.id, PaymentStatus::Accepted, admin)
            .await
            .unwrap();
        payment.id
    }

    fn page(page: i64, page_size: i64) -> PaidClientQuery {
        PaidClientQuery {
            pagination: PagePagination {
                page: Some(page),
                page_size: Some(page_size),
            },
            ..Default::default()
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_only_accepted_payments_are_listed(pool: PgPool) {
        let agent = create_test_user(&pool, Role::CroAgent).await;
        let admin = create_test_user(&pool, Role::SuperAdmin).await;
        let pending_lead = create_test_traffic(&pool, agent.id).await;
        let paid_lead = create_test_traffic(&pool, agent.id).await;
        create_test_payment(&pool, pending_lead.id, agent.id).await;
        let payment_id = accept(&pool, paid_lead.id, agent.id, admin.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PaidClients::new(&mut conn);
        let filter = PaidClientFilter::new(Scope::All, page(1, 10));
        let rows = repo.list(&filter).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].traffic.id, paid_lead.id);
        assert_eq!(rows[0].payment_id, payment_id);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_scope_restricts_to_assignee(pool: PgPool) {
        let agent_a = create_test_user(&pool, Role::CroAgent).await;
        let agent_b = create_test_user(&pool, Role::CroAgent).await;
        let admin = create_test_user(&pool, Role::SuperAdmin).await;
        let lead_a = create_test_traffic(&pool, agent_a.id).await;
        let lead_b = create_test_traffic(&pool, agent_b.id).await;
        accept(&pool, lead_a.id, agent_a.id, admin.id).await;
        accept(&pool, lead_b.id, agent_b.id, admin.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PaidClients::new(&mut conn);

        let mine = repo
            .list(&PaidClientFilter::new(Scope::AssignedTo(agent_a.id), page(1, 10)))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert!(mine.iter().all(|r| r.traffic.assigned_by == agent_a.id));

        let all = repo.list(&PaidClientFilter::new(Scope::All, page(1, 10))).await.unwrap();
        assert_eq!(all.len(), 2);

        assert!(repo.get(Scope::AssignedTo(agent_b.id), lead_a.id).await.unwrap().is_none());
        assert!(repo.get(Scope::All, lead_a.id).await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_latest_accepted_payment_wins(pool: PgPool) {
        let agent = create_test_user(&pool, Role::CroAgent).await;
        let admin = create_test_user(&pool, Role::SuperAdmin).await;
        let lead = create_test_traffic(&pool, agent.id).await;
        accept(&pool, lead.id, agent.id, admin.id).await;
        let latest = accept(&pool, lead.id, agent.id, admin.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PaidClients::new(&mut conn);
        let filter = PaidClientFilter::new(Scope::All, page(1, 10));
        let rows = repo.list(&filter).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payment_id, latest);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pages_cover_total(pool: PgPool) {
        let agent = create_test_user(&pool, Role::CroAgent).await;
        let admin = create_test_user(&pool, Role::SuperAdmin).await;
        for _ in 0..7 {
            let lead = create_test_traffic(&pool, agent.id).await;
            accept(&pool, lead.id, agent.id, admin.id).await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PaidClients::new(&mut conn);

        let total = repo.count(&PaidClientFilter::new(Scope::All, page(1, 3))).await.unwrap();
        assert_eq!(total, 7);

        let mut seen = std::collections::HashSet::new();
        for p in 1..=3 {
            let rows = repo.list(&PaidClientFilter::new(Scope::All, page(p, 3))).await.unwrap();
            for row in rows {
                assert!(seen.insert(row.traffic.id), "row repeated across pages");
            }
        }
        assert_eq!(seen.len() as i64, total);

        let past_end = repo.list(&PaidClientFilter::new(Scope::All, page(9, 3))).await.unwrap();
        assert!(past_end.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_filters_and_search_match_count(pool: PgPool) {
        let agent = create_test_user(&pool, Role::CroAgent).await;
        let admin = create_test_user(&pool, Role::SuperAdmin).await;

        let profiles = [
            ("Female", "Dhaka", "1990-05-01", "Architect"),
            ("Female", "Chittagong", "1992-01-10", "Doctor"),
            ("Male", "Dhaka", "1990-11-30", "Engineer"),
        ];
        for (gender, city, dob, profession) in profiles {
            let lead = create_test_traffic(&pool, agent.id).await;
            let mut conn = pool.acquire().await.unwrap();
            Traffic::new(&mut conn)
                .update(
                    lead.id,
                    &crate::api::models::traffic::TrafficUpdate {
                        gender: Some(Some(gender.to_string())),
                        present_city: Some(Some(city.to_string())),
                        date_of_birth: Some(Some(dob.parse().unwrap())),
                        profession: Some(Some(profession.to_string())),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            drop(conn);
            accept(&pool, lead.id, agent.id, admin.id).await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PaidClients::new(&mut conn);

        let mut query = page(1, 10);
        query.gender = Some("female".to_string());
        query.present_city = Some("DHAKA".to_string());
        let filter = PaidClientFilter::new(Scope::All, query);
        let rows = repo.list(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
        assert_eq!(rows[0].traffic.profile.profession.as_deref(), Some("Architect"));

        let mut query = page(1, 10);
        query.birth_year = Some(1990);
        let filter = PaidClientFilter::new(Scope::All, query);
        assert_eq!(repo.list(&filter).await.unwrap().len(), 2);
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        let mut query = page(1, 10);
        query.q = Some("doct".to_string());
        let filter = PaidClientFilter::new(Scope::All, query);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);

        let mut query = page(1, 10);
        query.gender = Some("   ".to_string());
        let filter = PaidClientFilter::new(Scope::All, query);
        assert_eq!(repo.count(&filter).await.unwrap(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_search_treats_wildcards_literally(pool: PgPool) {
        let agent = create_test_user(&pool, Role::CroAgent).await;
        let admin = create_test_user(&pool, Role::SuperAdmin).await;
        for _ in 0..2 {
            let lead = create_test_traffic(&pool, agent.id).await;
            accept(&pool, lead.id, agent.id, admin.id).await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PaidClients::new(&mut conn);

        for (q, expected) in [("Lead", 2), ("_", 0), ("%", 0), ("L_ad", 0), ("\\", 0)] {
            let mut query = page(1, 10);
            query.q = Some(q.to_string());
            let filter = PaidClientFilter::new(Scope::All, query);
            assert_eq!(repo.count(&filter).await.unwrap(), expected, "q = {q:?}");
            assert_eq!(repo.list(&filter).await.unwrap().len() as i64, expected, "q = {q:?}");
        }
    }
}
