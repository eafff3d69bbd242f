use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::users::{CurrentUser, ListUsersQuery, UserCreate, UserResponse, UserUpdate};
use crate::auth::password;
use crate::auth::permissions::{authorize, operation, resource, RequiresPermission};
use crate::db::handlers::{users::UserFilter, Repository, Users};
use crate::db::models::users::{UserCreateDBRequest, UserUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{Operation, Resource, UserId, UserIdOrCurrent};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

fn not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

fn require_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "username must not be empty".to_string(),
        });
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/accounts",
    tag = "accounts",
    summary = "List accounts",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of accounts", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = UserFilter::new(skip, limit).with_role(query.role).with_search(query.search);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut pool_conn);

    let users = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    let data = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/accounts/{user_id}",
    tag = "accounts",
    summary = "Get account",
    responses(
        (status = 200, description = "Account details", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only super admins may read other accounts"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = String, Path, description = "Account ID, or `current` for the caller")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserIdOrCurrent>,
    current_user: CurrentUser,
) -> Result<Json<UserResponse>> {
    let target = match user_id {
        UserIdOrCurrent::Current(_) => current_user.id,
        UserIdOrCurrent::Id(id) => id,
    };

    if target == current_user.id {
        authorize(&current_user, Resource::Users, Operation::ReadOwn)?;
    } else {
        authorize(&current_user, Resource::Users, Operation::ReadAll)?;
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn).get_by_id(target).await?.ok_or_else(|| not_found(target))?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/accounts",
    tag = "accounts",
    summary = "Create account",
    request_body = UserCreate,
    responses(
        (status = 201, description = "Account created. `generatedPassword` is set when no password was supplied", body = UserResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 409, description = "Username already taken"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Users, operation::CreateAll>,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    require_username(&create.username)?;
    let password_config = &state.config.auth.password;

    let (plaintext, generated) = match create.password {
        Some(password) => {
            password_config.check_length(&password)?;
            (password, false)
        }
        None => (password::generate_strong_password(), true),
    };
    let password_hash = password::hash_password_blocking(plaintext.clone(), password_config.argon2_params()).await?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn)
        .create(&UserCreateDBRequest {
            username: create.username,
            password_hash,
            role: create.role,
        })
        .await?;

    info!(user_id = %user.id, role = %user.role, created_by = %current_user.id, "Account created");

    let response = UserResponse::from(user);
    let response = if generated {
        response.with_generated_password(plaintext)
    } else {
        response
    };
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    patch,
    path = "/accounts/{user_id}",
    tag = "accounts",
    summary = "Update account",
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Account updated", body = UserResponse),
        (status = 400, description = "Invalid request, including changing your own role"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Username already taken"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::UpdateAll>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    if user_id == current_user.id && update.role.is_some_and(|role| role != current_user.role) {
        return Err(Error::BadRequest {
            message: "You cannot change your own role".to_string(),
        });
    }
    if let Some(username) = &update.username {
        require_username(username)?;
    }

    let password_config = &state.config.auth.password;
    let password_hash = match update.password {
        Some(password) => {
            password_config.check_length(&password)?;
            Some(password::hash_password_blocking(password, password_config.argon2_params()).await?)
        }
        None => None,
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn)
        .update(
            user_id,
            &UserUpdateDBRequest {
                username: update.username,
                password_hash,
                role: update.role,
                is_enabled: None,
            },
        )
        .await?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/accounts/{user_id}/toggle",
    tag = "accounts",
    summary = "Enable or disable account",
    responses(
        (status = 200, description = "Account with its new enabled state", body = UserResponse),
        (status = 400, description = "Cannot toggle your own account"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_user_status(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::UpdateAll>,
) -> Result<Json<UserResponse>> {
    if user_id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot disable your own account".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut pool_conn);

    let user = repo.get_by_id(user_id).await?.ok_or_else(|| not_found(user_id))?;
    let user = repo.set_enabled(user_id, !user.is_enabled).await?;

    info!(user_id = %user.id, is_enabled = user.is_enabled, toggled_by = %current_user.id, "Account status changed");
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/accounts/{user_id}",
    tag = "accounts",
    summary = "Delete account",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Cannot delete your own account"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Super admin only"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Account is still referenced by leads or payments"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::DeleteAll>,
) -> Result<StatusCode> {
    if user_id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot delete your own account".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Users::new(&mut pool_conn).delete(user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(user_id))
    }
}
