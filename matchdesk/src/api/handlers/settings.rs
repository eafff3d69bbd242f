//! Lookup settings handlers. Everyone reads; only super admins write.

use crate::api::models::settings::{
    group_by_category, ListSettingsQuery, SettingCreate, SettingResponse, SettingUpdate, SettingsByCategory,
};
use crate::auth::permissions::{operation, resource, RequiresPermission};
use crate::db::errors::DbError;
use crate::db::handlers::{settings::SettingFilter, Repository, Settings};
use crate::db::models::settings::{SettingCreateDBRequest, SettingUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::SettingId;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

fn not_found(id: SettingId) -> Error {
    Error::NotFound {
        resource: "Setting".to_string(),
        id: id.to_string(),
    }
}

fn blank_value() -> Error {
    Error::BadRequest {
        message: "value must not be empty".to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    summary = "List settings",
    description = "Lookup values keyed by category, each list ordered by display order then value.",
    params(ListSettingsQuery),
    responses(
        (status = 200, description = "Settings grouped by category", body = std::collections::BTreeMap<String, Vec<SettingResponse>>),
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
pub async fn list_settings(
    State(state): State<AppState>,
    Query(query): Query<ListSettingsQuery>,
    _: RequiresPermission<resource::Settings, operation::ReadAll>,
) -> Result<Json<SettingsByCategory>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let settings = Settings::new(&mut pool_conn)
        .list(&SettingFilter { category: query.category })
        .await?;

    Ok(Json(group_by_category(settings)))
}

#[utoipa::path(
    post,
    path = "/settings",
    tag = "settings",
    summary = "Create setting",
    request_body = SettingCreate,
    responses(
        (status = 201, description = "Setting created", body = SettingResponse),
        (status = 400, description = "Blank value or unknown category"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 409, description = "Value already exists in this category"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_setting(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Settings, operation::CreateAll>,
    Json(create): Json<SettingCreate>,
) -> Result<(StatusCode, Json<SettingResponse>)> {
    let request = SettingCreateDBRequest::from(create);
    if request.value.is_empty() {
        return Err(blank_value());
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let setting = Settings::new(&mut pool_conn).create(&request).await?;

    Ok((StatusCode::CREATED, Json(SettingResponse::from(setting))))
}

#[utoipa::path(
    patch,
    path = "/settings/{setting_id}",
    tag = "settings",
    summary = "Update setting",
    request_body = SettingUpdate,
    responses(
        (status = 200, description = "Setting updated", body = SettingResponse),
        (status = 400, description = "Blank value"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Setting not found"),
        (status = 409, description = "Value already exists in this category"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("setting_id" = uuid::Uuid, Path, description = "Setting ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_setting(
    State(state): State<AppState>,
    Path(setting_id): Path<SettingId>,
    _: RequiresPermission<resource::Settings, operation::UpdateAll>,
    Json(update): Json<SettingUpdate>,
) -> Result<Json<SettingResponse>> {
    let request = SettingUpdateDBRequest::from(update);
    if request.value.as_deref().is_some_and(str::is_empty) {
        return Err(blank_value());
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Settings::new(&mut pool_conn).update(setting_id, &request).await {
        Ok(setting) => Ok(Json(SettingResponse::from(setting))),
        Err(DbError::NotFound) => Err(not_found(setting_id)),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    delete,
    path = "/settings/{setting_id}",
    tag = "settings",
    summary = "Delete setting",
    responses(
        (status = 204, description = "Setting deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Setting not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("setting_id" = uuid::Uuid, Path, description = "Setting ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_setting(
    State(state): State<AppState>,
    Path(setting_id): Path<SettingId>,
    _: RequiresPermission<resource::Settings, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Settings::new(&mut pool_conn).delete(setting_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(setting_id))
    }
}
