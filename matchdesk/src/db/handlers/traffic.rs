//! Database repository for traffic (leads).

use crate::types::{Operation, Scope, TrafficId, abbrev_uuid};
use crate::{
    api::models::traffic::{Priority, TrafficStatus},
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::traffic::{TrafficCreateDBRequest, TrafficDBResponse, TrafficUpdateDBRequest},
    },
};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use super::contains_pattern;
use tracing::instrument;

/// Filter for listing leads
#[derive(Debug, Clone)]
pub struct TrafficFilter {
    pub skip: i64,
    pub limit: i64,
    pub scope: Scope,
    pub status: Option<TrafficStatus>,
    pub priority: Option<Priority>,
    pub q: Option<String>,
}

impl TrafficFilter {
    pub fn new(scope: Scope, skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            scope,
            status: None,
            priority: None,
            q: None,
        }
    }

    /// Appends this filter's WHERE clause. Shared by `list` and `count`.
    fn push_predicates(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(assignee) = self.scope.assignee() {
            query.push(" AND assigned_by = ").push_bind(assignee);
        }
        if let Some(status) = self.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(priority) = self.priority {
            query.push(" AND priority = ").push_bind(priority);
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = contains_pattern(q);
            query
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR contact_number ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR email ILIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
    }
}

/// Appends `, column = $n` when a value was supplied.
fn push_assignment<'a, T>(query: &mut QueryBuilder<'a, Postgres>, column: &str, value: Option<T>)
where
    T: 'a + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send,
{
    if let Some(value) = value {
        query.push(", ").push(column).push(" = ").push_bind(value);
    }
}

pub struct Traffic<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Traffic<'c> {
    type CreateRequest = TrafficCreateDBRequest;
    type UpdateRequest = TrafficUpdateDBRequest;
    type Response = TrafficDBResponse;
    type Id = TrafficId;
    type Filter = TrafficFilter;

    #[instrument(skip(self, request), fields(assigned_by = %abbrev_uuid(&request.assigned_by)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let profile = &request.profile;
        let traffic = sqlx::query_as::<_, TrafficDBResponse>(
            r#"
            INSERT INTO traffic (
                name, contact_number, email, priority, status, assigned_by, created_by,
                profession, job_type, date_of_birth, marital_status, gender,
                permanent_country, permanent_city, present_country, present_city,
                height, qualification, organization, religion, social_title,
                profile_picture, candidate_pictures, curriculum_vitae, requirements
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25)
            RETURNING *
            "#,
        )
        .bind(request.name.trim())
        .bind(request.contact_number.trim())
        .bind(&request.email)
        .bind(request.priority)
        .bind(request.status)
        .bind(request.assigned_by)
        .bind(request.created_by)
        .bind(&profile.profession)
        .bind(&profile.job_type)
        .bind(profile.date_of_birth)
        .bind(&profile.marital_status)
        .bind(&profile.gender)
        .bind(&profile.permanent_country)
        .bind(&profile.permanent_city)
        .bind(&profile.present_country)
        .bind(&profile.present_city)
        .bind(&profile.height)
        .bind(&profile.qualification)
        .bind(&profile.organization)
        .bind(&profile.religion)
        .bind(&profile.social_title)
        .bind(&profile.profile_picture)
        .bind(&profile.candidate_pictures)
        .bind(&profile.curriculum_vitae)
        .bind(&profile.requirements)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(traffic)
    }

    #[instrument(skip(self), fields(traffic_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let traffic = sqlx::query_as::<_, TrafficDBResponse>("SELECT * FROM traffic WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(traffic)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<TrafficId>) -> Result<HashMap<Self::Id, TrafficDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, TrafficDBResponse>("SELECT * FROM traffic WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(|t| (t.id, t)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip, scope = ?filter.scope), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM traffic");
        filter.push_predicates(&mut query);
        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let rows = query.build_query_as::<TrafficDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(traffic_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let has_payments: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payments WHERE traffic_id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        if has_payments {
            return Err(DbError::ProtectedEntity {
                operation: Operation::DeleteAll,
                reason: "lead has payment records".to_string(),
                entity_type: "traffic".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM traffic WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(traffic_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE traffic SET updated_at = NOW()");
        push_assignment(&mut query, "name", request.name.as_deref().map(|s| s.trim().to_string()));
        push_assignment(
            &mut query,
            "contact_number",
            request.contact_number.as_deref().map(|s| s.trim().to_string()),
        );
        push_assignment(&mut query, "email", request.email.clone());
        push_assignment(&mut query, "priority", request.priority);
        push_assignment(&mut query, "status", request.status);
        push_assignment(&mut query, "assigned_by", request.assigned_by);
        push_assignment(&mut query, "profession", request.profession.clone());
        push_assignment(&mut query, "job_type", request.job_type.clone());
        push_assignment(&mut query, "date_of_birth", request.date_of_birth);
        push_assignment(&mut query, "marital_status", request.marital_status.clone());
        push_assignment(&mut query, "gender", request.gender.clone());
        push_assignment(&mut query, "permanent_country", request.permanent_country.clone());
        push_assignment(&mut query, "permanent_city", request.permanent_city.clone());
        push_assignment(&mut query, "present_country", request.present_country.clone());
        push_assignment(&mut query, "present_city", request.present_city.clone());
        push_assignment(&mut query, "height", request.height.clone());
        push_assignment(&mut query, "qualification", request.qualification.clone());
        push_assignment(&mut query, "organization", request.organization.clone());
        push_assignment(&mut query, "religion", request.religion.clone());
        push_assignment(&mut query, "social_title", request.social_title.clone());
        push_assignment(&mut query, "profile_picture", request.profile_picture.clone());
        push_assignment(&mut query, "candidate_pictures", request.candidate_pictures.clone());
        push_assignment(&mut query, "curriculum_vitae", request.curriculum_vitae.clone());
        push_assignment(&mut query, "requirements", request.requirements.clone());
        query.push(" WHERE id = ").push_bind(id);
        // A lead that became paid after the caller read it must keep its status
        if request.status.is_some_and(|status| status != TrafficStatus::Paid) {
            query.push(" AND status <> 'paid'");
        }
        query.push(" RETURNING *");

        let updated = query
            .build_query_as::<TrafficDBResponse>()
            .fetch_optional(&mut *self.db)
            .await?;

        match updated {
            Some(traffic) => Ok(traffic),
            None if self.get_by_id(id).await?.is_some() => Err(DbError::ProtectedEntity {
                operation: Operation::UpdateAll,
                reason: "a paid lead cannot change status".to_string(),
                entity_type: "traffic".to_string(),
                entity_id: Some(id.to_string()),
            }),
            None => Err(DbError::NotFound),
        }
    }
}

impl<'c> Traffic<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Count leads matching the filter, ignoring its skip/limit.
    #[instrument(skip(self, filter), fields(scope = ?filter.scope), err)]
    pub async fn count(&mut self, filter: &TrafficFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM traffic");
        filter.push_predicates(&mut query);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Promote a lead to `paid`. Idempotent; returns false when the lead does not exist.
    #[instrument(skip(self), fields(traffic_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_paid(&mut self, id: TrafficId) -> Result<bool> {
        let result = sqlx::query("UPDATE traffic SET status = 'paid', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Promote every lead that has an accepted payment but is not yet `paid`.
    /// Returns the number of leads repaired.
    #[instrument(skip(self), err)]
    pub async fn promote_leads_with_accepted_payments(&mut self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE traffic SET status = 'paid', updated_at = NOW()
            WHERE status <> 'paid'
              AND EXISTS (
                  SELECT 1 FROM payments p
                  WHERE p.traffic_id = traffic.id AND p.status = 'accepted'
              )
            "#,
        )
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
