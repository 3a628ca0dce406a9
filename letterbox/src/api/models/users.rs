//! API request/response models for users.

use super::pagination::Pagination;
use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Platform role. Every account has exactly one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Creator,
    Brand,
}

// User response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub auth_source: String,
    pub balance: BalanceStats,
    pub donations_received: i64,
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub donations_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Whether the account has a payment provider customer record. The customer id itself is
    /// never returned.
    pub has_payment_provider_id: bool,
}

/// Creator balance figures
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceStats {
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub available_balance: Decimal,
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub pending_balance: Decimal,
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub total_earnings: Decimal,
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub withdrawn_amount: Decimal,
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// The authenticated caller, as extracted from a session cookie or proxy header.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            display_name: db.display_name,
            role: db.role,
            auth_source: db.auth_source,
            balance: BalanceStats {
                available_balance: db.available_balance,
                pending_balance: db.pending_balance,
                total_earnings: db.total_earnings,
                withdrawn_amount: db.withdrawn_amount,
            },
            donations_received: db.donations_received,
            donations_total: db.donations_total,
            created_at: db.created_at,
            updated_at: db.updated_at,
            has_payment_provider_id: db.payment_provider_id.is_some(),
        }
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            role: db.role,
            display_name: db.display_name,
        }
    }
}
