use axum::{Json, extract::State};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        auth::{AuthResponse, AuthSuccessResponse, ChangePasswordRequest, LoginRequest, LoginResponse, LogoutResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{password, session},
    db::handlers::{Repository, Users},
    errors::Error,
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid username or password".to_string()),
    }
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut pool_conn);

    let user = user_repo
        .get_user_by_username(&request.username)
        .await?
        .ok_or_else(invalid_credentials)?;

    // Verify password on a blocking thread to avoid blocking async runtime
    let is_valid = password::verify_password_blocking(
        request.password,
        user.password_hash.clone(),
        state.config.auth.password.argon2_params(),
    )
    .await?;

    if !is_valid {
        return Err(invalid_credentials());
    }

    // Checked after the password so a wrong guess does not reveal the account's state
    if !user.is_enabled {
        return Err(Error::AccountDisabled);
    }

    let current_user = CurrentUser::from(user.clone());
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = session::session_cookie(&token, &state.config)?;

    info!(user_id = %user.id, role = %user.role, "User logged in");

    let auth_response = AuthResponse {
        user: UserResponse::from(user),
        message: "Login successful".to_string(),
        token,
    };

    Ok(LoginResponse { auth_response, cookie })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    let cookie = session::clear_session_cookie(&state.config)?;

    let auth_response = AuthSuccessResponse {
        message: "Logout successful".to_string(),
    };

    Ok(LogoutResponse { auth_response, cookie })
}

/// Change password for authenticated user
#[utoipa::path(
    post,
    path = "/authentication/password-change",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed successfully", body = AuthSuccessResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Current password is incorrect"),
        (status = 403, description = "Account disabled"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    let password_config = &state.config.auth.password;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut pool_conn);

    let user = user_repo.get_by_id(current_user.id).await?.ok_or_else(|| Error::Unauthenticated {
        message: Some("User not found".to_string()),
    })?;

    let is_valid =
        password::verify_password_blocking(request.current_password, user.password_hash, password_config.argon2_params()).await?;

    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }

    password_config.check_length(&request.new_password)?;

    let new_password_hash = password::hash_password_blocking(request.new_password, password_config.argon2_params()).await?;
    user_repo.set_password_hash(current_user.id, &new_password_hash).await?;

    info!(user_id = %current_user.id, "Password changed");

    Ok(Json(AuthSuccessResponse {
        message: "Password changed successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::{TEST_PASSWORD, add_auth_headers, create_test_app, create_test_config, create_test_user};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::PgPool;

    fn auth_router(pool: PgPool) -> TestServer {
        let state = AppState::builder().db(pool).config(create_test_config()).build();

        let app = axum::Router::new()
            .route("/authentication/login", axum::routing::post(login))
            .route("/authentication/logout", axum::routing::post(logout))
            .route("/authentication/password-change", axum::routing::post(change_password))
            .with_state(state);

        TestServer::new(app).unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_success_sets_cookie(pool: PgPool) {
        let user = create_test_user(&pool, Role::CroAgent).await;
        let server = auth_router(pool);

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": user.username, "password": TEST_PASSWORD}))
            .await;

        response.assert_status_ok();
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("matchdesk_session="));
        assert!(cookie.contains("HttpOnly"));

        let body: AuthResponse = response.json();
        assert_eq!(body.user.id, user.id);
        assert_eq!(body.user.role, Role::CroAgent);
        assert!(!body.token.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_rejects_bad_credentials(pool: PgPool) {
        let user = create_test_user(&pool, Role::CroAgent).await;
        let server = auth_router(pool);

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": user.username, "password": "not-the-password"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "nobody", "password": TEST_PASSWORD}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("set-cookie").is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_disabled_account_is_forbidden(pool: PgPool) {
        let user = create_test_user(&pool, Role::Matchmaker).await;
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn).set_enabled(user.id, false).await.unwrap();
        let server = auth_router(pool);

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": user.username, "password": TEST_PASSWORD}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_logout_clears_cookie(pool: PgPool) {
        let server = auth_router(pool);

        let response = server.post("/authentication/logout").await;
        response.assert_status_ok();
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
        assert!(cookie.contains("Max-Age=0"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_change_password(pool: PgPool) {
        let user = create_test_user(&pool, Role::CroAgent).await;
        let (app, _bg_services) = create_test_app(pool.clone()).await;

        // Wrong current password
        let response = app
            .post("/authentication/password-change")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .json(&json!({"currentPassword": "wrong", "newPassword": "new-password-1"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        // Too short
        let response = app
            .post("/authentication/password-change")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .json(&json!({"currentPassword": TEST_PASSWORD, "newPassword": "short"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .post("/authentication/password-change")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .json(&json!({"currentPassword": TEST_PASSWORD, "newPassword": "new-password-1"}))
            .await;
        response.assert_status_ok();

        // The new password logs in, the old one does not
        let response = app
            .post("/authentication/login")
            .json(&json!({"username": user.username, "password": "new-password-1"}))
            .await;
        response.assert_status_ok();

        let response = app
            .post("/authentication/login")
            .json(&json!({"username": user.username, "password": TEST_PASSWORD}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_change_password_requires_session(pool: PgPool) {
        let server = auth_router(pool);

        let response = server
            .post("/authentication/password-change")
            .json(&json!({"currentPassword": TEST_PASSWORD, "newPassword": "new-password-1"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
