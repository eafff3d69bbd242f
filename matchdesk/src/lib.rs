//! # matchdesk: lead and payment tracking for a matchmaking agency
//!
//! `matchdesk` is the back office of a matchmaking agency. Agents capture prospective clients
//! ("traffic", or leads), raise payment requests against them, and a super admin approves or
//! rejects each request. An approved payment turns the lead into a paid client, which then shows
//! up in a paginated, filterable paid clients view.
//!
//! ## Roles
//!
//! Three roles exist. `cro_agent` and `matchmaker` share one permission table: they work only
//! with leads assigned to them and cannot decide payments. `super_admin` sees everything,
//! decides payments, and manages accounts and lookup settings. A disabled account is refused on
//! every authenticated route regardless of role.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum) and all state lives in PostgreSQL.
//!
//! The **API layer** ([`api`]) exposes login under `/authentication/*` and the management API
//! under `/api/*`. Handlers authenticate with a JWT carried in a cookie or a bearer header,
//! check the caller's permission, and call into repositories or workflows.
//!
//! The **authentication layer** ([`auth`]) holds the credential store (Argon2id, hex encoded),
//! session tokens, and the role to permission table including row scoping.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Role-scoped queries build one
//! predicate that feeds both the page and the count.
//!
//! The **workflow layer** ([`workflow`]) holds the payment state machine. Accepting a payment is
//! a conditional update on `status = 'pending'`, so two concurrent decisions cannot both win.
//! Promoting the lead is a second statement; if it is lost, the background reconciler finishes
//! the job.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use matchdesk::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = matchdesk::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     matchdesk::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;
pub mod workflow;
use crate::config::CorsOrigin;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::password,
    db::handlers::{Repository, Users},
    db::models::users::UserCreateDBRequest,
    workflow::reconciler::Reconciler,
};
use axum::http::HeaderValue;
use axum::{
    Json, Router, http,
    routing::{delete, get, patch, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, instrument, warn, Level};
use utoipa_scalar::{Scalar, Servable};

pub use types::{PaymentId, SettingId, TrafficId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the matchdesk database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Make sure a super admin exists.
///
/// - If the `admin_username` account exists, its password is reset to `admin_password` when one
///   is configured, and nothing else changes.
/// - Otherwise, if any other super admin exists, nothing happens.
/// - Otherwise the account is created with `admin_password`. Without one, production refuses to
///   start and development generates a password and logs it once.
///
/// Returns the id of the `admin_username` account when it exists or was created.
#[instrument(skip_all, fields(username = %config.admin_username))]
pub async fn create_initial_admin_user(config: &Config, db: &PgPool) -> anyhow::Result<Option<UserId>> {
    let params = config.auth.password.argon2_params();
    let mut conn = db.acquire().await?;
    let mut users = Users::new(&mut conn);

    if let Some(existing) = users.get_user_by_username(&config.admin_username).await? {
        if let Some(admin_password) = &config.admin_password {
            let password_hash = password::hash_password_blocking(admin_password.clone(), params).await?;
            users.set_password_hash(existing.id, &password_hash).await?;
            info!("Refreshed bootstrap admin password from configuration");
        }
        return Ok(Some(existing.id));
    }

    if users.find_first_with_role(Role::SuperAdmin).await?.is_some() {
        debug!("A super admin already exists, skipping bootstrap");
        return Ok(None);
    }

    let (admin_password, generated) = match &config.admin_password {
        Some(admin_password) => (admin_password.clone(), false),
        None if config.is_production() => {
            anyhow::bail!(
                "No super admin exists and admin_password is not configured. \
                 Set MATCHDESK_ADMIN_PASSWORD to bootstrap one."
            );
        }
        None => (password::generate_strong_password(), true),
    };

    let password_hash = password::hash_password_blocking(admin_password.clone(), params).await?;
    let created = users
        .create(&UserCreateDBRequest {
            username: config.admin_username.clone(),
            password_hash,
            role: Role::SuperAdmin,
        })
        .await?;

    if generated {
        warn!(
            user_id = %created.id,
            password = %admin_password,
            "Created bootstrap super admin with a generated password. Change it after first login"
        );
    } else {
        info!(user_id = %created.id, "Created bootstrap super admin");
    }

    Ok(Some(created.id))
}

/// Rehash any stored credential that is not in `<keyHex>.<saltHex>` form.
///
/// Such values are legacy plaintext passwords; hashing them in place keeps the same password
/// working. Returns the number of accounts repaired.
#[instrument(skip_all)]
pub async fn repair_legacy_credentials(config: &Config, db: &PgPool) -> anyhow::Result<usize> {
    let params = config.auth.password.argon2_params();
    let mut conn = db.acquire().await?;
    let mut users = Users::new(&mut conn);

    let mut repaired = 0;
    for (user_id, stored) in users.list_credentials().await? {
        if password::is_valid_hash_format(&stored) {
            continue;
        }
        let password_hash = password::hash_password_blocking(stored, params).await?;
        users.set_password_hash(user_id, &password_hash).await?;
        warn!(%user_id, "Rehashed legacy plaintext credential");
        repaired += 1;
    }

    Ok(repaired)
}

async fn connect(config: &config::DatabaseConfig) -> anyhow::Result<PgPool> {
    let settings = &config.pool;
    let optional = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(optional(settings.idle_timeout_secs))
        .max_lifetime(optional(settings.max_lifetime_secs))
        .connect(&config.url)
        .await?;
    Ok(pool)
}

/// Connect (unless a pool is supplied), migrate, repair credentials and bootstrap the admin.
async fn setup_database(config: &Config, pool: Option<PgPool>) -> anyhow::Result<PgPool> {
    let pool = match pool {
        Some(pool) => pool,
        None => {
            info!("Connecting to database");
            connect(&config.database).await?
        }
    };

    migrator().run(&pool).await?;

    let repaired = repair_legacy_credentials(config, &pool).await?;
    if repaired > 0 {
        warn!(repaired, "Repaired legacy credentials");
    }

    create_initial_admin_user(config, &pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: authentication at the root, the management API under `/api`,
/// health and documentation routes, CORS and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, dashboard, paid_clients, payments, settings, traffic, users};

    let auth_routes = Router::new()
        .route("/authentication/login", post(auth::login))
        .route("/authentication/logout", post(auth::logout))
        .route("/authentication/password-change", post(auth::change_password))
        .with_state(state.clone());

    let api_routes = Router::new()
        // Accounts (super admin, except reading your own)
        .route("/accounts", get(users::list_users))
        .route("/accounts", post(users::create_user))
        .route("/accounts/{user_id}", get(users::get_user))
        .route("/accounts/{user_id}", patch(users::update_user))
        .route("/accounts/{user_id}", delete(users::delete_user))
        .route("/accounts/{user_id}/toggle", post(users::toggle_user_status))
        // Leads
        .route("/traffic", get(traffic::list_traffic))
        .route("/traffic", post(traffic::create_traffic))
        .route("/traffic/{traffic_id}", get(traffic::get_traffic))
        .route("/traffic/{traffic_id}", patch(traffic::update_traffic))
        .route("/traffic/{traffic_id}", delete(traffic::delete_traffic))
        // Payment requests
        .route("/payments", get(payments::list_payments))
        .route("/payments", post(payments::create_payment))
        .route("/payments/pending", get(payments::list_pending_payments))
        .route("/payments/{payment_id}", get(payments::get_payment))
        .route("/payments/{payment_id}", patch(payments::update_payment))
        .route("/payments/{payment_id}", delete(payments::delete_payment))
        .route("/payments/{payment_id}/accept", post(payments::accept_payment))
        .route("/payments/{payment_id}/cancel", post(payments::cancel_payment))
        // Paid clients
        .route("/paid-clients", get(paid_clients::list_paid_clients))
        .route("/paid-clients/{traffic_id}", patch(paid_clients::update_paid_client))
        // Lookup settings
        .route("/settings", get(settings::list_settings))
        .route("/settings", post(settings::create_setting))
        .route("/settings/{setting_id}", patch(settings::update_setting))
        .route("/settings/{setting_id}", delete(settings::delete_setting))
        .route("/dashboard/stats", get(dashboard::get_stats))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/openapi.json", get(|| async { Json(openapi::document()) }))
        .merge(auth_routes)
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/docs", openapi::document()));

    let router = router.layer(create_cors_layer(&state.config)?);

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Background tasks that run alongside the HTTP server.
///
/// [`shutdown`](BackgroundServices::shutdown) stops them and waits. Dropping the struct cancels
/// them without waiting, through `drop_guard`.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

fn setup_background_services(pool: PgPool, config: &Config, shutdown_token: CancellationToken) -> BackgroundServices {
    let mut background_tasks = Vec::new();

    if config.reconciler.enabled {
        let reconciler = Reconciler::new(pool, &config.reconciler);
        background_tasks.push(tokio::spawn(reconciler.run(shutdown_token.clone())));
    } else {
        info!("Payment reconciler disabled");
    }

    BackgroundServices {
        background_tasks,
        drop_guard: Some(shutdown_token.clone().drop_guard()),
        shutdown_token,
    }
}

/// The assembled service: database pool, router and background tasks.
///
/// 1. **Create**: [`Application::new`] connects, migrates, bootstraps the admin account and
///    starts the reconciler
/// 2. **Serve**: [`Application::serve`] binds and handles requests until the shutdown future
///    resolves, then stops background tasks and closes the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Application::new`], but reuses `pool` instead of connecting to `database.url`.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting matchdesk with configuration: {:#?}", config);

        let pool = setup_database(&config, pool).await?;

        let shutdown_token = CancellationToken::new();
        let bg_services = setup_background_services(pool.clone(), &config, shutdown_token);

        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(app_state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "matchdesk listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
