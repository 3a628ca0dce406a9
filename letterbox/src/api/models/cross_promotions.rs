//! API request/response models for cross-promotions between newsletters.

use crate::{
    db::models::cross_promotions::{PromotionDBResponse, PromotionStatus},
    types::UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PromotionCreate {
    pub newsletter_name: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub revenue_per_click: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PromotionUpdate {
    pub newsletter_name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub revenue_per_click: Option<Decimal>,
    pub status: Option<PromotionStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PromotionEvent {
    Click,
    /// A reader subscribed through the promotion
    Subscribe,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PromotionTrackRequest {
    #[serde(rename = "type")]
    pub event: PromotionEvent,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PromotionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub creator_id: UserId,
    pub newsletter_name: String,
    pub description: Option<String>,
    pub status: PromotionStatus,
    pub subscribers: i64,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub revenue_per_click: Decimal,
    pub clicks: i64,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub revenue: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub user_share: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub platform_fee: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<PromotionDBResponse> for PromotionResponse {
    fn from(db: PromotionDBResponse) -> Self {
        Self {
            id: db.id,
            creator_id: db.creator_id,
            newsletter_name: db.newsletter_name,
            description: db.description,
            status: db.status,
            subscribers: db.subscribers,
            revenue_per_click: db.revenue_per_click,
            clicks: db.clicks,
            revenue: db.revenue,
            user_share: db.user_share,
            platform_fee: db.platform_fee,
            created_at: db.created_at,
        }
    }
}
