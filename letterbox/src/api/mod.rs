//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): registration, login, logout
//! - **Monetization** (`/api/monetization/*`): one resource per revenue stream, owned by creators
//! - **Tracking** (`/api/sponsored-ads/*`, `/api/cross-promotions/*`, `/api/affiliate-links/*`):
//!   public click, impression and conversion events
//! - **Public pages** (`/api/donations/*`, `/api/downloads/*`, `/signup`)
//! - **Funds** (`/api/funds`, `/api/brand/funds`): creator and brand balances
//! - **Billing** (`/api/admin/billing`): the operator plan
//! - **Webhooks** (`/webhooks/payments`): payment provider events
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. The rendered documentation is served
//! at `/docs` and the raw document at `/api-docs/openapi.json`.

pub mod handlers;
pub mod models;
