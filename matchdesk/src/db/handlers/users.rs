//! Database repository for users.

use crate::types::{Operation, UserId, abbrev_uuid};
use crate::{
    api::models::users::Role,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use super::contains_pattern;
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
    pub role: Option<Role>,
    pub search: Option<String>,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: Option<Role>) -> Self {
        self.role = role;
        self
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty());
        self
    }

    /// Appends this filter's WHERE clause. Shared by `list` and `count`.
    fn push_predicates(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(role) = self.role {
            query.push(" AND role = ").push_bind(role);
        }
        if let Some(search) = &self.search {
            query
                .push(" AND username ILIKE ")
                .push_bind(contains_pattern(search.trim()))
                .push(" ESCAPE '\\'");
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            is_enabled: user.is_enabled,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username, role = %request.role), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.username.trim())
        .bind(&request.password_hash)
        .bind(request.role)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<UserId>) -> Result<HashMap<Self::Id, UserDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(|u| (u.id, u.into())).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM users");
        filter.push_predicates(&mut query);
        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let users = query.build_query_as::<User>().fetch_all(&mut *self.db).await?;

        Ok(users.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM traffic WHERE assigned_by = $1 OR created_by = $1)
                OR EXISTS (SELECT 1 FROM payments WHERE created_by = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *self.db)
        .await?;

        if referenced {
            return Err(DbError::ProtectedEntity {
                operation: Operation::DeleteAll,
                reason: "user is still referenced by traffic or payment records".to_string(),
                entity_type: "user".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Atomic update with conditional field updates
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                password_hash = COALESCE($3, password_hash),
                role = COALESCE($4, role),
                is_enabled = COALESCE($5, is_enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.username.as_deref().map(str::trim))
        .bind(&request.password_hash)
        .bind(request.role)
        .bind(request.is_enabled)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user.into())
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, username), err)]
    pub async fn get_user_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username.trim())
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    /// Count users matching the filter, ignoring its skip/limit.
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &UserFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        filter.push_predicates(&mut query);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Oldest user holding `role`, if any.
    #[instrument(skip(self), err)]
    pub async fn find_first_with_role(&mut self, role: Role) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE role = $1 ORDER BY created_at ASC LIMIT 1")
            .bind(role)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self, password_hash), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn set_password_hash(&mut self, id: UserId, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn set_enabled(&mut self, id: UserId, is_enabled: bool) -> Result<UserDBResponse> {
        self.update(
            id,
            &UserUpdateDBRequest {
                is_enabled: Some(is_enabled),
                ..Default::default()
            },
        )
        .await
    }

    /// Every user's id and stored credential, for the startup credential repair pass.
    #[instrument(skip(self), err)]
    pub async fn list_credentials(&mut self) -> Result<Vec<(UserId, String)>> {
        let rows: Vec<(UserId, String)> = sqlx::query_as("SELECT id, password_hash FROM users ORDER BY created_at")
            .fetch_all(&mut *self.db)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::test_utils::{create_test_traffic, create_test_user};
    use sqlx::PgPool;

    fn create_request(username: &str, role: Role) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: username.to_string(),
            password_hash: "a".repeat(128) + "." + &"b".repeat(32),
            role,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&create_request("  asha  ", Role::Matchmaker)).await.unwrap();
        assert_eq!(user.username, "asha");
        assert_eq!(user.role, Role::Matchmaker);
        assert!(user.is_enabled);

        let found = repo.get_user_by_username("asha").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_username_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&create_request("dup", Role::CroAgent)).await.unwrap();
        let err = repo.create(&create_request("dup", Role::CroAgent)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_and_count_share_filter(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        for i in 0..3 {
            repo.create(&create_request(&format!("agent{i}"), Role::CroAgent)).await.unwrap();
        }
        repo.create(&create_request("maker", Role::Matchmaker)).await.unwrap();

        let filter = UserFilter::new(0, 2).with_role(Some(Role::CroAgent));
        let page = repo.list(&filter).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|u| u.role == Role::CroAgent));
        assert_eq!(repo.count(&filter).await.unwrap(), 3);

        let filter = UserFilter::new(0, 10).with_search(Some("MAK".to_string()));
        assert_eq!(repo.count(&filter).await.unwrap(), 1);

        for search in ["t_", "%", "agent%"] {
            let filter = UserFilter::new(0, 10).with_search(Some(search.to_string()));
            assert_eq!(repo.count(&filter).await.unwrap(), 0, "search = {search:?}");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_toggle(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&create_request("ravi", Role::CroAgent)).await.unwrap();
        let updated = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    role: Some(Role::Matchmaker),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Matchmaker);
        assert_eq!(updated.username, "ravi");

        let disabled = repo.set_enabled(user.id, false).await.unwrap();
        assert!(!disabled.is_enabled);

        let missing = repo.set_enabled(uuid::Uuid::new_v4(), false).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_referenced_user_is_protected(pool: PgPool) {
        let agent = create_test_user(&pool, Role::CroAgent).await;
        create_test_traffic(&pool, agent.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let err = repo.delete(agent.id).await.unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { .. }));

        let lonely = repo.create(&create_request("lonely", Role::CroAgent)).await.unwrap();
        assert!(repo.delete(lonely.id).await.unwrap());
        assert!(repo.get_by_id(lonely.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_find_first_with_role(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        assert!(repo.find_first_with_role(Role::SuperAdmin).await.unwrap().is_none());
        let admin = repo.create(&create_request("root", Role::SuperAdmin)).await.unwrap();
        let found = repo.find_first_with_role(Role::SuperAdmin).await.unwrap().unwrap();
        assert_eq!(found.id, admin.id);
    }
}
