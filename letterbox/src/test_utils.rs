//! Test utilities shared by unit and integration tests.

use crate::{
    AppState,
    api::models::users::Role,
    config::{Config, DummyConfig, PasswordConfig, PaymentConfig, ProxyHeaderAuthConfig},
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
};
use axum_test::TestServer;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

pub fn create_test_config() -> Config {
    let mut config = Config {
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        payment: Some(PaymentConfig::Dummy(DummyConfig::default())),
        ..Default::default()
    };

    config.auth.native.enabled = true;
    config.auth.native.allow_registration = true;
    config.auth.native.session.cookie_secure = false;
    // Cheap hashes keep auth tests fast
    config.auth.native.password = PasswordConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Default::default()
    };
    config.auth.proxy_header = ProxyHeaderAuthConfig {
        enabled: true,
        ..Default::default()
    };
    config
}

/// State over a pool that never connects, for tests that must not reach the database.
pub fn create_test_state(config: Config) -> AppState {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy("postgres://letterbox@127.0.0.1:1/unreachable")
        .expect("Failed to create lazy pool");
    AppState::new(pool, config)
}

pub async fn create_test_app(pool: PgPool, config: Config) -> TestServer {
    let state = AppState::new(pool, config);
    let router = crate::build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let username = format!("testuser_{}", Uuid::new_v4().simple());

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: format!("{username}@example.com"),
            username,
            display_name: Some("Test User".to_string()),
            role,
            auth_source: "test".to_string(),
            password_hash: None,
        })
        .await
        .expect("Failed to create test user")
}

/// Headers authenticating `user` through the trusted proxy header.
pub fn add_auth_headers(user: &UserDBResponse) -> Vec<(String, String)> {
    let config = ProxyHeaderAuthConfig::default();
    vec![(config.header_name, user.email.clone())]
}
