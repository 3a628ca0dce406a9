//! API request/response models for paid subscriptions.

use crate::{
    db::models::subscriptions::{
        BillingPeriod, SubscriptionAnalyticsDBResponse, SubscriptionDBResponse, SubscriptionStatus, TierDBResponse, TierStatus,
    },
    types::{TierId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Request models
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubscriptionTierCreate {
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[serde(default = "default_billing_period")]
    pub billing_period: BillingPeriod,
    #[serde(default)]
    pub perks: Vec<String>,
    pub status: Option<TierStatus>,
}

fn default_billing_period() -> BillingPeriod {
    BillingPeriod::Monthly
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SubscriptionTierUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub billing_period: Option<BillingPeriod>,
    pub perks: Option<Vec<String>>,
    pub status: Option<TierStatus>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubscriptionCreate {
    #[schema(value_type = String, format = "uuid")]
    pub tier_id: TierId,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubscriptionUpdate {
    pub status: SubscriptionStatus,
}

// Response models
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionTierResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TierId,
    #[schema(value_type = String, format = "uuid")]
    pub creator_id: UserId,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub price: Decimal,
    pub billing_period: BillingPeriod,
    pub perks: Vec<String>,
    pub status: TierStatus,
    pub subscribers: i64,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub revenue: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub subscriber_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub creator_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub tier_id: TierId,
    pub tier_name: String,
    pub billing_period: BillingPeriod,
    pub status: SubscriptionStatus,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub amount: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub user_share: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub platform_fee: Decimal,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionAnalytics {
    pub total_subscribers: i64,
    /// Active subscription revenue per month; yearly prices count as one twelfth
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub monthly_revenue: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub user_share: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub platform_fee: Decimal,
    pub active_tiers: i64,
}

/// A creator's recent subscriptions with headline figures
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionsOverview {
    pub subscriptions: Vec<SubscriptionResponse>,
    pub analytics: SubscriptionAnalytics,
}

// Conversions
impl From<TierDBResponse> for SubscriptionTierResponse {
    fn from(db: TierDBResponse) -> Self {
        Self {
            id: db.id,
            creator_id: db.creator_id,
            name: db.name,
            description: db.description,
            price: db.price,
            billing_period: db.billing_period,
            perks: db.perks,
            status: db.status,
            subscribers: db.subscribers,
            revenue: db.revenue,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<SubscriptionDBResponse> for SubscriptionResponse {
    fn from(db: SubscriptionDBResponse) -> Self {
        Self {
            id: db.id,
            subscriber_id: db.subscriber_id,
            creator_id: db.creator_id,
            tier_id: db.tier_id,
            tier_name: db.tier_name,
            billing_period: db.billing_period,
            status: db.status,
            amount: db.amount,
            user_share: db.user_share,
            platform_fee: db.platform_fee,
            current_period_end: db.current_period_end,
            created_at: db.created_at,
        }
    }
}

impl From<SubscriptionAnalyticsDBResponse> for SubscriptionAnalytics {
    fn from(db: SubscriptionAnalyticsDBResponse) -> Self {
        Self {
            total_subscribers: db.total_subscribers,
            monthly_revenue: db.monthly_revenue,
            user_share: db.user_share,
            platform_fee: db.platform_fee,
            active_tiers: db.active_tiers,
        }
    }
}
