//! API request/response models for the affiliate program.

use super::pagination::Pagination;
use crate::{
    db::models::{
        affiliates::{LinkDBResponse, ReferralDBResponse, ReferralStatus},
        subscriptions::TierStatus,
    },
    types::UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AffiliateLinkCreate {
    pub target_url: String,
    /// Generated when absent
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AffiliateLinkUpdate {
    pub target_url: Option<String>,
    pub status: Option<TierStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateEvent {
    Click,
    Conversion,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AffiliateTrackRequest {
    #[serde(rename = "type")]
    pub event: AffiliateEvent,
    /// Sale amount; required for conversions
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub referred_user_id: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SignupQuery {
    #[serde(rename = "ref")]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListReferralsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AffiliateLinkResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub code: String,
    pub target_url: String,
    pub clicks: i64,
    pub conversions: i64,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub commission_earned: Decimal,
    pub status: TierStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReferralResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub link_id: Uuid,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub referred_user_id: Option<UserId>,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub amount: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub commission: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub platform_fee: Decimal,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
}

impl From<LinkDBResponse> for AffiliateLinkResponse {
    fn from(db: LinkDBResponse) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            code: db.code,
            target_url: db.target_url,
            clicks: db.clicks,
            conversions: db.conversions,
            commission_earned: db.commission_earned,
            status: db.status,
            created_at: db.created_at,
        }
    }
}

impl From<ReferralDBResponse> for ReferralResponse {
    fn from(db: ReferralDBResponse) -> Self {
        Self {
            id: db.id,
            link_id: db.link_id,
            referred_user_id: db.referred_user_id,
            amount: db.amount,
            commission: db.commission,
            platform_fee: db.platform_fee,
            status: db.status,
            created_at: db.created_at,
        }
    }
}
