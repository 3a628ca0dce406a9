//! Database models for subscription tiers and subscriptions.

use crate::types::{TierId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

impl BillingPeriod {
    /// Length of one period in whole months.
    pub fn months(self) -> i64 {
        match self {
            BillingPeriod::Monthly => 1,
            BillingPeriod::Yearly => 12,
        }
    }
}

/// Status shared by tiers of both subscriptions and donations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TierStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TierCreateDBRequest {
    pub creator_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub billing_period: BillingPeriod,
    pub perks: Vec<String>,
    pub status: TierStatus,
}

#[derive(Debug, Clone, Default)]
pub struct TierUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub billing_period: Option<BillingPeriod>,
    pub perks: Option<Vec<String>>,
    pub status: Option<TierStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TierDBResponse {
    pub id: TierId,
    pub creator_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub billing_period: BillingPeriod,
    pub perks: Vec<String>,
    pub status: TierStatus,
    pub subscribers: i64,
    pub revenue: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionCreateDBRequest {
    pub subscriber_id: UserId,
    pub creator_id: UserId,
    pub tier_id: TierId,
    pub amount: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
    pub current_period_end: DateTime<Utc>,
}

/// Subscription row joined with its tier's name and billing period
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionDBResponse {
    pub id: Uuid,
    pub subscriber_id: UserId,
    pub creator_id: UserId,
    pub tier_id: TierId,
    pub tier_name: String,
    pub billing_period: BillingPeriod,
    pub status: SubscriptionStatus,
    pub amount: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregates over a creator's subscriptions
#[derive(Debug, Clone, Default, FromRow)]
pub struct SubscriptionAnalyticsDBResponse {
    pub total_subscribers: i64,
    pub monthly_revenue: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
    pub active_tiers: i64,
}
