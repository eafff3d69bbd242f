use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Pull the session token out of the request.
///
/// The session cookie is checked first, then `Authorization: Bearer`. Returns `Ok(None)` when
/// neither is present.
fn session_token<'a>(parts: &'a Parts, config: &Config) -> Result<Option<&'a str>> {
    if let Some(cookie_header) = parts.headers.get(header::COOKIE) {
        let cookie_str = cookie_header.to_str().map_err(|e| Error::BadRequest {
            message: format!("Invalid cookie header: {e}"),
        })?;
        let cookie_name = &config.auth.session.cookie_name;

        let token = cookie_str
            .split(';')
            .filter_map(|cookie| cookie.trim().split_once('='))
            .find(|(name, value)| name == cookie_name && !value.is_empty())
            .map(|(_, value)| value);
        if token.is_some() {
            return Ok(token);
        }
    }

    if let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header.to_str().map_err(|e| Error::BadRequest {
            message: format!("Invalid authorization header: {e}"),
        })?;
        return Ok(auth_str.strip_prefix("Bearer ").map(str::trim));
    }

    Ok(None)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    /// Authenticate the request and reload the account, so role changes and disabling take
    /// effect on the very next request rather than when the token expires.
    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(token) = session_token(parts, &state.config)? else {
            trace!("No authentication credentials found in request");
            return Err(Error::Unauthenticated { message: None });
        };

        let claims = session::verify_session_token(token, &state.config)?;

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let user = Users::new(&mut conn).get_by_id(claims.sub).await?.ok_or_else(|| {
            debug!("Session refers to a user that no longer exists");
            Error::Unauthenticated { message: None }
        })?;

        if !user.is_enabled {
            debug!(user_id = %user.id, "Rejecting request from disabled account");
            return Err(Error::AccountDisabled);
        }

        Ok(CurrentUser::from(user))
    }
}
