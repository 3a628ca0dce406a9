//! Database models for donation tiers and donations.

use super::subscriptions::TierStatus;
use crate::types::{TierId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DonationTierCreateDBRequest {
    pub creator_id: UserId,
    pub name: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub perks: Vec<String>,
    pub status: TierStatus,
}

#[derive(Debug, Clone, Default)]
pub struct DonationTierUpdateDBRequest {
    pub name: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub perks: Option<Vec<String>>,
    pub status: Option<TierStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DonationTierDBResponse {
    pub id: TierId,
    pub creator_id: UserId,
    pub name: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub perks: Vec<String>,
    pub status: TierStatus,
    pub donors: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DonationCreateDBRequest {
    pub donor_id: Option<UserId>,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub recipient_id: UserId,
    pub tier_id: Option<TierId>,
    pub amount: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
    pub message: Option<String>,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DonationUpdateDBRequest {
    pub message: Option<String>,
    pub is_anonymous: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DonationDBResponse {
    pub id: Uuid,
    pub donor_id: Option<UserId>,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub recipient_id: UserId,
    pub tier_id: Option<TierId>,
    pub amount: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
    pub message: Option<String>,
    pub is_anonymous: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregates over donations received by one creator
#[derive(Debug, Clone, Default, FromRow)]
pub struct DonationAnalyticsDBResponse {
    pub total_donations: i64,
    pub total_amount: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
    pub unique_donors: i64,
}
