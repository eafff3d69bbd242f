//! JWT session token creation and verification, plus the session cookie.

use axum::http::HeaderValue;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    api::models::users::{CurrentUser, Role},
    config::Config,
    errors::Error,
    types::UserId,
};

/// JWT session claims. Only identifies the user; role and enabled state are reloaded from
/// the database on every request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub username: String,
    /// Role at issue time, informational only
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    pub fn new(user: &CurrentUser, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.security.jwt_expiry;

        Self {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

fn secret(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "JWT sessions: secret_key is required".to_string(),
    })
}

/// Create a JWT token for a user session
pub fn create_session_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims::new(user, config);
    let key = EncodingKey::from_secret(secret(config)?.as_bytes());

    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Whether a decode failure is the caller's fault (bad, forged or stale token) rather than a
/// key or crypto problem on our side.
fn is_rejected_token(kind: &ErrorKind) -> bool {
    !matches!(
        kind,
        ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::RsaFailedSigning
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Crypto(_)
    )
}

/// Decode a session token. Any token problem is a 401; key problems are a 500.
pub fn verify_session_token(token: &str, config: &Config) -> Result<SessionClaims, Error> {
    let key = DecodingKey::from_secret(secret(config)?.as_bytes());

    decode::<SessionClaims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| {
            if is_rejected_token(e.kind()) {
                Error::Unauthenticated { message: None }
            } else {
                Error::Internal {
                    operation: format!("verify session token: {e}"),
                }
            }
        })
}

fn cookie_header(config: &Config, token: &str, max_age_secs: u64) -> Result<HeaderValue, Error> {
    let session = &config.auth.session;
    let same_site = match session.cookie_same_site.to_ascii_lowercase().as_str() {
        "lax" => "Lax",
        "none" => "None",
        _ => "Strict",
    };
    let secure = if session.cookie_secure { "; Secure" } else { "" };

    HeaderValue::from_str(&format!(
        "{}={token}; Path=/; HttpOnly; SameSite={same_site}; Max-Age={max_age_secs}{secure}",
        session.cookie_name
    ))
    .map_err(|e| Error::Internal {
        operation: format!("build session cookie: {e}"),
    })
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(token: &str, config: &Config) -> Result<HeaderValue, Error> {
    cookie_header(config, token, config.auth.security.jwt_expiry.as_secs())
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &Config) -> Result<HeaderValue, Error> {
    cookie_header(config, "", 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, SecurityConfig};
    use std::time::Duration;
    use uuid::Uuid;

    fn config() -> Config {
        Config {
            secret_key: Some("session-test-secret".to_string()),
            auth: AuthConfig {
                security: SecurityConfig {
                    jwt_expiry: Duration::from_secs(3600),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn agent() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "agent.a".to_string(),
            role: Role::CroAgent,
            is_enabled: true,
        }
    }

    #[test]
    fn test_create_and_verify_session_token() {
        let config = config();
        let user = agent();

        let token = create_session_token(&user, &config).unwrap();
        assert!(!token.is_empty());

        let claims = verify_session_token(&token, &config).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, user.username);
        assert_eq!(claims.role, user.role);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_signed_with_another_secret_is_rejected() {
        let mut config = config();
        let token = create_session_token(&agent(), &config).unwrap();

        config.secret_key = Some("rotated-secret".to_string());
        assert!(matches!(
            verify_session_token(&token, &config),
            Err(Error::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_missing_secret_is_a_server_error() {
        let mut config = config();
        config.secret_key = None;
        assert!(matches!(create_session_token(&agent(), &config), Err(Error::Internal { .. })));
    }

    #[test]
    fn test_verify_expired_token() {
        let config = config();
        let user = agent();

        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            exp: (now - chrono::Duration::seconds(3600)).timestamp(), // 1 hour ago
            iat: now.timestamp(),
        };

        let key = EncodingKey::from_secret(config.secret_key.as_ref().unwrap().as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let result = verify_session_token(&token, &config);
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_garbage_tokens_are_unauthenticated() {
        let config = config();
        for token in ["", "abc", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.e30."] {
            assert!(
                matches!(verify_session_token(token, &config), Err(Error::Unauthenticated { .. })),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_session_cookie_attributes() {
        let mut config = config();
        let cookie = session_cookie("abc", &config).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("matchdesk_session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));

        config.auth.session.cookie_secure = false;
        config.auth.session.cookie_same_site = "lax".to_string();
        let cleared = clear_session_cookie(&config).unwrap();
        let cleared = cleared.to_str().unwrap();
        assert!(cleared.contains("Max-Age=0"));
        assert!(cleared.contains("SameSite=Lax"));
        assert!(!cleared.contains("Secure"));
    }
}
