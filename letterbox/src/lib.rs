//! # letterbox: monetization backend for newsletter creators
//!
//! `letterbox` lets newsletter creators earn money from six revenue streams and lets brands pay
//! them for advertising. Every payment is split between the creator and the platform at a fixed
//! rate per stream (see [`revenue`]), and the creator's share lands in an earnings ledger they can
//! withdraw from.
//!
//! ## Revenue streams
//!
//! | Stream | Creator share | Paid by |
//! |---|---|---|
//! | Sponsored ads | 80% | brand funds, per click |
//! | Cross-promotions | 80% | per click |
//! | Subscriptions | 90% | subscribers |
//! | Donations | 90% | readers, signed in or not |
//! | Digital products | 90% | buyers |
//! | Affiliate referrals | 50% | per conversion |
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); persistence is PostgreSQL through
//! SQLx. Requests are authenticated with a JWT session cookie or a trusted proxy header
//! ([`auth`]), handled by the route handlers in [`api`] and stored through the repositories in
//! [`db`]. Card payments go through a [`payment_providers::PaymentProvider`] (Stripe, or a dummy
//! provider for development). Balance changes and their ledger rows are written in one
//! transaction, and every balance decrement is a conditional update, so concurrent requests
//! cannot overdraw an account.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use letterbox::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = letterbox::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     letterbox::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
mod crypto;
pub mod db;
pub mod errors;
mod openapi;
pub mod payment_providers;
pub mod revenue;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::password,
    config::{CorsOrigin, PoolSettings},
    db::handlers::{Repository, Users},
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    errors::Error,
    openapi::ApiDoc,
    payment_providers::PaymentProvider,
};
use axum::{
    Json, Router,
    http::{self, HeaderValue},
    routing::{get, patch, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{CampaignId, ProductId, PurchaseId, TierId, UserId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .maybe_payment_provider(provider)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Unset when no `payment` section is configured
    pub payment_provider: Option<Arc<dyn PaymentProvider>>,
}

impl AppState {
    /// State with the payment provider built from `config.payment`
    pub fn new(db: PgPool, config: Config) -> Self {
        let payment_provider = config
            .payment
            .clone()
            .map(|payment| Arc::from(payment_providers::create_provider(payment)));
        Self::builder()
            .db(db)
            .config(config)
            .maybe_payment_provider(payment_provider)
            .build()
    }

    /// The configured payment provider, or a 500 for routes that need one
    pub fn payment_provider(&self) -> Result<&dyn PaymentProvider, Error> {
        self.payment_provider.as_deref().ok_or_else(|| Error::NotConfigured {
            what: "Payment provider".to_string(),
        })
    }
}

/// Get the letterbox database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: an existing user with this email keeps their account and only gets the password
/// updated when one is given.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = password.map(password::hash_string).transpose()?;

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing_user) = user_repo.get_user_by_email(email).await? {
        if password_hash.is_some() {
            user_repo
                .update(
                    existing_user.id,
                    &UserUpdateDBRequest {
                        password_hash,
                        ..Default::default()
                    },
                )
                .await?;
        }
        tx.commit().await?;
        return Ok(existing_user.id);
    }

    let created_user = user_repo
        .create(&UserCreateDBRequest {
            username: email.to_string(),
            email: email.to_string(),
            display_name: None,
            role: Role::Admin,
            auth_source: "system".to_string(),
            password_hash,
        })
        .await?;

    tx.commit().await?;
    info!("Created initial admin user {}", email);
    Ok(created_user.id)
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let optional = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(optional(settings.idle_timeout_secs))
        .max_lifetime(optional(settings.max_lifetime_secs))
}

/// Connect, run migrations and make sure the admin account exists
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = pool_options(&config.database.pool).connect(&config.database.url).await?;
    migrator().run(&pool).await?;

    create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;
    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            // Origins never carry a trailing slash
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut exposed = Vec::new();
    for header in &cors_config.exposed_headers {
        exposed.push(header.parse::<http::HeaderName>()?);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(exposed);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }
    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - `/authentication/*`: native registration and sessions
/// - `/api/*`: the REST API
/// - `/signup`: affiliate referral redirect
/// - `/webhooks/payments`: payment provider events
/// - `/docs` and `/api-docs/openapi.json`: API documentation
///
/// # Errors
///
/// Returns an error if the CORS configuration cannot be turned into headers.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{
        affiliates, auth, billing, brand_funds, cross_promotions, digital_products, donations, funds, monetization, sponsored_ads,
        subscriptions, users, webhooks,
    };

    // Authentication routes (at root level, can be masked when deployed behind an SSO proxy)
    let auth_routes = Router::new()
        .route("/authentication/register", get(auth::get_registration_info).post(auth::register))
        .route("/authentication/login", post(auth::login))
        .route("/authentication/logout", post(auth::logout));

    let api_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/current", get(users::get_current_user))
        .route("/monetization", get(monetization::get_overview))
        // Subscriptions
        .route(
            "/monetization/subscription-tiers",
            get(subscriptions::list_tiers).post(subscriptions::create_tier),
        )
        .route(
            "/monetization/subscription-tiers/{tier_id}",
            patch(subscriptions::update_tier).delete(subscriptions::delete_tier),
        )
        .route(
            "/monetization/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::create_subscription),
        )
        .route(
            "/monetization/subscriptions/{subscription_id}",
            patch(subscriptions::update_subscription),
        )
        // Donations
        .route(
            "/monetization/donations",
            get(donations::list_donations).post(donations::create_donation),
        )
        .route(
            "/monetization/donations/{donation_id}",
            patch(donations::update_donation).delete(donations::delete_donation),
        )
        .route(
            "/monetization/donation-tiers",
            get(donations::list_donation_tiers).post(donations::create_donation_tier),
        )
        .route(
            "/monetization/donation-tiers/{tier_id}",
            patch(donations::update_donation_tier).delete(donations::delete_donation_tier),
        )
        .route("/donations/process", post(donations::process_public_donation))
        .route("/donations/creator/{creator}", get(donations::get_creator_tiers))
        // Sponsored ads
        .route(
            "/monetization/sponsored-ads",
            get(sponsored_ads::list_campaigns).post(sponsored_ads::create_campaign),
        )
        .route("/monetization/sponsored-ads/{campaign_id}", patch(sponsored_ads::update_campaign))
        .route("/sponsored-ads/{campaign_id}/track", post(sponsored_ads::track_event))
        // Cross-promotions
        .route(
            "/monetization/cross-promotions",
            get(cross_promotions::list_promotions).post(cross_promotions::create_promotion),
        )
        .route(
            "/monetization/cross-promotions/{promotion_id}",
            patch(cross_promotions::update_promotion).delete(cross_promotions::delete_promotion),
        )
        .route("/cross-promotions/{promotion_id}/track", post(cross_promotions::track_event))
        // Digital products
        .route(
            "/monetization/digital-products",
            get(digital_products::list_products).post(digital_products::create_product),
        )
        .route(
            "/monetization/digital-products/{product_id}",
            patch(digital_products::update_product).delete(digital_products::delete_product),
        )
        .route(
            "/monetization/digital-products/{product_id}/purchase",
            post(digital_products::purchase_product),
        )
        .route("/downloads/{purchase_id}", get(digital_products::download))
        // Affiliates
        .route(
            "/monetization/affiliate-links",
            get(affiliates::list_links).post(affiliates::create_link),
        )
        .route(
            "/monetization/affiliate-links/{link_id}",
            patch(affiliates::update_link).delete(affiliates::delete_link),
        )
        .route("/monetization/affiliate-referrals", get(affiliates::list_referrals))
        .route("/affiliate-links/{code}/track", post(affiliates::track_event))
        // Funds
        .route("/funds", get(funds::get_funds))
        .route("/funds/withdrawals", post(funds::request_withdrawal))
        .route("/funds/withdrawal-methods", post(funds::create_withdrawal_method))
        .route(
            "/funds/withdrawal-methods/{method_id}",
            axum::routing::delete(funds::delete_withdrawal_method),
        )
        .route("/brand/funds", get(brand_funds::get_brand_funds).post(brand_funds::add_brand_funds))
        .route(
            "/admin/billing",
            get(billing::get_billing).put(billing::update_plan).post(billing::add_payment_method),
        );

    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/signup", get(affiliates::signup_redirect))
        // Webhook routes (external services, not part of client API docs)
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        .merge(auth_routes)
        .nest("/api", api_routes)
        .with_state(state)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct that owns the router, the pool and the configuration.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations, ensures the
///    admin user and builds the router
/// 2. **Serve**: [`Application::serve`] binds to the configured address and handles requests
/// 3. **Shutdown**: when the shutdown future resolves, the pool is closed and telemetry flushed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting letterbox with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;
        if config.payment.is_none() {
            info!("No payment provider configured, payment routes are disabled");
        }

        let state = AppState::new(pool.clone(), config.clone());
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Letterbox listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
