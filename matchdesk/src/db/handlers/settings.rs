//! Database repository for lookup settings.

use crate::types::{SettingId, abbrev_uuid};
use crate::{
    api::models::settings::SettingCategory,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::settings::{SettingCreateDBRequest, SettingDBResponse, SettingUpdateDBRequest},
    },
};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct SettingFilter {
    pub category: Option<SettingCategory>,
}

pub struct Settings<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Settings<'c> {
    type CreateRequest = SettingCreateDBRequest;
    type UpdateRequest = SettingUpdateDBRequest;
    type Response = SettingDBResponse;
    type Id = SettingId;
    type Filter = SettingFilter;

    #[instrument(skip(self, request), fields(category = ?request.category), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let setting = sqlx::query_as::<_, SettingDBResponse>(
            r#"
            INSERT INTO settings (category, value, display_order)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.category)
        .bind(&request.value)
        .bind(request.display_order)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(setting)
    }

    #[instrument(skip(self), fields(setting_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let setting = sqlx::query_as::<_, SettingDBResponse>("SELECT * FROM settings WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(setting)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<SettingId>) -> Result<HashMap<Self::Id, SettingDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, SettingDBResponse>("SELECT * FROM settings WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(|s| (s.id, s)).collect())
    }

    /// Settings ordered by category, then display order, then value. Not paginated; the
    /// lookup tables are small.
    #[instrument(skip(self, filter), fields(category = ?filter.category), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = sqlx::query_as::<_, SettingDBResponse>(
            r#"
            SELECT * FROM settings
            WHERE ($1::text IS NULL OR category = $1)
            ORDER BY category, display_order, value
            "#,
        )
        .bind(filter.category)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self), fields(setting_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(setting_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let setting = sqlx::query_as::<_, SettingDBResponse>(
            r#"
            UPDATE settings SET
                value = COALESCE($2, value),
                display_order = COALESCE($3, display_order),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.value)
        .bind(request.display_order)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(setting)
    }
}

impl<'c> Settings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}
