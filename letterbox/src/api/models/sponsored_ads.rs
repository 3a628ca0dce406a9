//! API request/response models for sponsored ad campaigns.

use crate::{
    db::models::sponsored_ads::{CampaignDBResponse, CampaignStatus},
    types::{CampaignId, UserId},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CampaignCreate {
    /// Creator whose newsletter carries the ad
    #[schema(value_type = String, format = "uuid")]
    pub creator_id: UserId,
    pub brand_name: String,
    pub campaign_name: String,
    /// Reserved from the brand's available funds
    #[schema(value_type = String)]
    pub budget: Decimal,
    #[schema(value_type = String)]
    pub cost_per_click: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CampaignUpdate {
    pub status: CampaignStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdEvent {
    Impression,
    Click,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdTrackRequest {
    #[serde(rename = "type")]
    pub event: AdEvent,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CampaignId,
    #[schema(value_type = String, format = "uuid")]
    pub brand_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub creator_id: UserId,
    pub brand_name: String,
    pub campaign_name: String,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub budget: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub cost_per_click: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CampaignStatus,
    pub clicks: i64,
    pub impressions: i64,
    /// Budget spent on clicks so far
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

/// Outcome of a tracked event on a public route
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrackResponse {
    pub tracked: bool,
    pub message: String,
}

impl TrackResponse {
    pub fn tracked(message: impl Into<String>) -> Self {
        Self {
            tracked: true,
            message: message.into(),
        }
    }

    pub fn ignored(message: impl Into<String>) -> Self {
        Self {
            tracked: false,
            message: message.into(),
        }
    }
}

impl From<CampaignDBResponse> for CampaignResponse {
    fn from(db: CampaignDBResponse) -> Self {
        Self {
            id: db.id,
            brand_id: db.brand_id,
            creator_id: db.creator_id,
            brand_name: db.brand_name,
            campaign_name: db.campaign_name,
            budget: db.budget,
            cost_per_click: db.cost_per_click,
            start_date: db.start_date,
            end_date: db.end_date,
            status: db.status,
            clicks: db.clicks,
            impressions: db.impressions,
            revenue: db.revenue,
            user_share: db.user_share,
            platform_fee: db.platform_fee,
            created_at: db.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_request_reads_type_field() {
        let request: AdTrackRequest = serde_json::from_value(serde_json::json!({"type": "click"})).unwrap();
        assert_eq!(request.event, AdEvent::Click);
        assert!(serde_json::from_value::<AdTrackRequest>(serde_json::json!({"type": "view"})).is_err());
    }
}
