//! Database models for users.

use crate::api::models::users::Role;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub auth_source: String,
    pub password_hash: Option<String>,
}

/// Database request for updating a user
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
}

/// Database response for a user, including balances
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub password_hash: Option<String>,
    pub auth_source: String,
    pub payment_provider_id: Option<String>,
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub total_earnings: Decimal,
    pub withdrawn_amount: Decimal,
    pub donations_received: i64,
    pub donations_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
