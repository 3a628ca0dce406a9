//! Database models for cross-promotions.

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
pub enum PromotionStatus {
    Active,
    Paused,
    Ended,
}

#[derive(Debug, Clone)]
pub struct PromotionCreateDBRequest {
    pub creator_id: UserId,
    pub newsletter_name: String,
    pub description: Option<String>,
    pub revenue_per_click: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct PromotionUpdateDBRequest {
    pub newsletter_name: Option<String>,
    pub description: Option<String>,
    pub revenue_per_click: Option<Decimal>,
    pub status: Option<PromotionStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PromotionDBResponse {
    pub id: Uuid,
    pub creator_id: UserId,
    pub newsletter_name: String,
    pub description: Option<String>,
    pub status: PromotionStatus,
    pub subscribers: i64,
    pub revenue_per_click: Decimal,
    pub clicks: i64,
    pub revenue: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
