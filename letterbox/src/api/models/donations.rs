//! API request/response models for tips, donations and donation tiers.

use crate::{
    db::models::{
        donations::{DonationAnalyticsDBResponse, DonationDBResponse, DonationTierDBResponse},
        subscriptions::TierStatus,
        users::UserDBResponse,
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
pub struct DonationTierCreate {
    pub name: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub description: Option<String>,
    #[serde(default)]
    pub perks: Vec<String>,
    pub status: Option<TierStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DonationTierUpdate {
    pub name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub perks: Option<Vec<String>>,
    pub status: Option<TierStatus>,
}

/// Donation from a signed-in user. Amount and recipient are optional in the schema so that
/// missing values answer with a specific 400.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DonationCreate {
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub recipient_id: Option<UserId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub tier_id: Option<TierId>,
    pub message: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

/// Donation from a public creator page; the donor does not need an account.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PublicDonationRequest {
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub recipient_id: Option<UserId>,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub tier_id: Option<TierId>,
    pub message: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DonationUpdate {
    pub message: Option<String>,
    pub is_anonymous: Option<bool>,
}

// Response models
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DonationTierResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TierId,
    #[schema(value_type = String, format = "uuid")]
    pub creator_id: UserId,
    pub name: String,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub amount: Decimal,
    pub description: Option<String>,
    pub perks: Vec<String>,
    pub status: TierStatus,
    pub donors: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DonationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    /// Hidden when the donation is anonymous
    #[schema(value_type = Option<String>, format = "uuid")]
    pub donor_id: Option<UserId>,
    /// Hidden when the donation is anonymous
    pub donor_name: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub recipient_id: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub tier_id: Option<TierId>,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub amount: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub user_share: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub platform_fee: Decimal,
    pub message: Option<String>,
    pub is_anonymous: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DonationAnalytics {
    pub total_donations: i64,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub total_amount: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub user_share: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub platform_fee: Decimal,
    pub unique_donors: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DonationsOverview {
    pub donations: Vec<DonationResponse>,
    pub analytics: DonationAnalytics,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicDonationResponse {
    pub message: String,
    pub donation: DonationResponse,
}

/// Public profile of a creator accepting donations
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DonationCreator {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatorDonationTiers {
    pub creator: DonationCreator,
    pub tiers: Vec<DonationTierResponse>,
}

// Conversions
impl From<DonationTierDBResponse> for DonationTierResponse {
    fn from(db: DonationTierDBResponse) -> Self {
        Self {
            id: db.id,
            creator_id: db.creator_id,
            name: db.name,
            amount: db.amount,
            description: db.description,
            perks: db.perks,
            status: db.status,
            donors: db.donors,
            created_at: db.created_at,
        }
    }
}

impl From<DonationDBResponse> for DonationResponse {
    fn from(db: DonationDBResponse) -> Self {
        let (donor_id, donor_name) = if db.is_anonymous {
            (None, None)
        } else {
            (db.donor_id, db.donor_name)
        };

        Self {
            id: db.id,
            donor_id,
            donor_name,
            recipient_id: db.recipient_id,
            tier_id: db.tier_id,
            amount: db.amount,
            user_share: db.user_share,
            platform_fee: db.platform_fee,
            message: db.message,
            is_anonymous: db.is_anonymous,
            status: db.status,
            created_at: db.created_at,
        }
    }
}

impl From<DonationAnalyticsDBResponse> for DonationAnalytics {
    fn from(db: DonationAnalyticsDBResponse) -> Self {
        Self {
            total_donations: db.total_donations,
            total_amount: db.total_amount,
            user_share: db.user_share,
            platform_fee: db.platform_fee,
            unique_donors: db.unique_donors,
        }
    }
}

impl From<UserDBResponse> for DonationCreator {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            display_name: db.display_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donation(is_anonymous: bool) -> DonationDBResponse {
        DonationDBResponse {
            id: Uuid::new_v4(),
            donor_id: Some(Uuid::new_v4()),
            donor_name: Some("Ada".to_string()),
            donor_email: Some("ada@example.com".to_string()),
            recipient_id: Uuid::new_v4(),
            tier_id: None,
            amount: Decimal::TEN,
            user_share: Decimal::new(900, 2),
            platform_fee: Decimal::new(100, 2),
            message: Some("Thanks!".to_string()),
            is_anonymous,
            status: "completed".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn anonymous_donations_hide_the_donor() {
        let response = DonationResponse::from(donation(true));
        assert!(response.donor_id.is_none());
        assert!(response.donor_name.is_none());

        let response = DonationResponse::from(donation(false));
        assert_eq!(response.donor_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn donor_email_is_never_serialized() {
        let value = serde_json::to_value(DonationResponse::from(donation(false))).unwrap();
        assert!(value.get("donor_email").is_none());
    }

    #[test]
    fn public_request_accepts_missing_fields() {
        let request: PublicDonationRequest = serde_json::from_value(serde_json::json!({"donor_name": "Ada"})).unwrap();
        assert!(request.amount.is_none());
        assert!(request.recipient_id.is_none());
        assert!(!request.is_anonymous);
    }
}
