//! Database models for affiliate links and referrals.

use super::subscriptions::TierStatus;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    SignedUp,
    Converted,
}

#[derive(Debug, Clone)]
pub struct LinkCreateDBRequest {
    pub owner_id: UserId,
    pub code: String,
    pub target_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct LinkUpdateDBRequest {
    pub target_url: Option<String>,
    pub status: Option<TierStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LinkDBResponse {
    pub id: Uuid,
    pub owner_id: UserId,
    pub code: String,
    pub target_url: String,
    pub clicks: i64,
    pub conversions: i64,
    pub commission_earned: Decimal,
    pub status: TierStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReferralCreateDBRequest {
    pub link_id: Uuid,
    pub referrer_id: UserId,
    pub referred_user_id: Option<UserId>,
    pub amount: Decimal,
    pub commission: Decimal,
    pub platform_fee: Decimal,
    pub status: ReferralStatus,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReferralDBResponse {
    pub id: Uuid,
    pub link_id: Uuid,
    pub referrer_id: UserId,
    pub referred_user_id: Option<UserId>,
    pub amount: Decimal,
    pub commission: Decimal,
    pub platform_fee: Decimal,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
}
