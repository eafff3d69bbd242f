//! Shared fixtures for tests: a fully wired test server, users with session headers, leads and payments.

use crate::auth::password::{Argon2Params, hash_password};
use crate::auth::session::create_session_token;
use crate::config::{Config, DatabaseConfig, PasswordConfig, PoolSettings, ReconcilerConfig, SessionConfig};
use crate::db::handlers::repository::Repository;
use crate::types::{TrafficId, UserId};
use crate::{
    api::models::{
        payments::PaymentCreate,
        traffic::{Priority, TrafficProfile, TrafficStatus},
        users::{CurrentUser, Role},
    },
    db::{
        handlers::{Payments, Traffic, Users},
        models::{
            payments::{PaymentCreateDBRequest, PaymentDBResponse},
            traffic::{TrafficCreateDBRequest, TrafficDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
};
use axum_test::TestServer;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Password set on every user made by [`create_test_user`].
pub const TEST_PASSWORD: &str = "password123";

/// Hashing cost low enough to keep tests fast.
pub const TEST_ARGON2: Argon2Params = Argon2Params {
    memory_kib: 1024,
    iterations: 1,
    parallelism: 1,
};

pub async fn create_test_app(pool: PgPool) -> (TestServer, crate::BackgroundServices) {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        database: DatabaseConfig {
            pool: PoolSettings {
                max_connections: 4,
                min_connections: 0,
                ..Default::default()
            },
            // Will get overriden by the pool handed to the app
            url: "Something".to_string(),
        },
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_username: "admin".to_string(),
        admin_password: Some("admin-password-for-tests".to_string()),
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: crate::config::AuthConfig {
            session: SessionConfig {
                cookie_secure: false,
                ..Default::default()
            },
            password: PasswordConfig {
                argon2_memory_kib: TEST_ARGON2.memory_kib,
                argon2_iterations: TEST_ARGON2.iterations,
                argon2_parallelism: TEST_ARGON2.parallelism,
                ..Default::default()
            },
            ..Default::default()
        },
        reconciler: ReconcilerConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users = Users::new(&mut conn);

    let username = format!("testuser_{}", Uuid::new_v4().simple());
    let password_hash = hash_password(TEST_PASSWORD, TEST_ARGON2).expect("Failed to hash test password");

    users
        .create(&UserCreateDBRequest {
            username,
            password_hash,
            role,
        })
        .await
        .expect("Failed to create test user")
}

pub async fn create_test_admin_user(pool: &PgPool) -> UserDBResponse {
    create_test_user(pool, Role::SuperAdmin).await
}

/// `Authorization: Bearer` header for `user`, signed with the test config's secret.
pub fn add_auth_headers(user: &UserDBResponse) -> (String, String) {
    let token = create_session_token(&CurrentUser::from(user.clone()), &create_test_config()).expect("Failed to create session token");
    ("authorization".to_string(), format!("Bearer {token}"))
}

pub async fn create_test_traffic(pool: &PgPool, assignee: UserId) -> TrafficDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    Traffic::new(&mut conn)
        .create(&TrafficCreateDBRequest {
            name: format!("Lead {}", &Uuid::new_v4().simple().to_string()[..8]),
            contact_number: "+8801700000000".to_string(),
            email: None,
            priority: Priority::Medium,
            status: TrafficStatus::Pending,
            assigned_by: assignee,
            created_by: assignee,
            profile: TrafficProfile::default(),
        })
        .await
        .expect("Failed to create test traffic")
}

/// A pending payment for `traffic_id`: Gold package, 30000 paid in cash, nothing due.
pub async fn create_test_payment(pool: &PgPool, traffic_id: TrafficId, created_by: UserId) -> PaymentDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    let request = PaymentCreate {
        traffic_id,
        package_type: "Gold".to_string(),
        paid_amount: Decimal::from(30000),
        discount_amount: Decimal::ZERO,
        due_amount: Decimal::ZERO,
        total_amount: Decimal::from(30000),
        payment_method: "Cash".to_string(),
        after_marriage_fee: None,
    };

    Payments::new(&mut conn)
        .create(&PaymentCreateDBRequest::new(created_by, request))
        .await
        .expect("Failed to create test payment")
}
