//! API response model for the monetization overview page.

use super::{
    affiliates::{AffiliateLinkResponse, ReferralResponse},
    cross_promotions::PromotionResponse,
    digital_products::ProductResponse,
    donations::{DonationResponse, DonationTierResponse},
    sponsored_ads::CampaignResponse,
    subscriptions::SubscriptionTierResponse,
};
use crate::revenue::RevenueStream;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// Totals for one revenue stream
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StreamStats {
    pub stream: RevenueStream,
    /// Number of active items (campaigns, tiers, products, links...)
    pub active: i64,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub total_revenue: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub user_share: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub platform_fee: Decimal,
    pub platform_fee_percent: u32,
}

impl StreamStats {
    pub fn new(stream: RevenueStream) -> Self {
        Self {
            stream,
            active: 0,
            total_revenue: Decimal::ZERO,
            user_share: Decimal::ZERO,
            platform_fee: Decimal::ZERO,
            platform_fee_percent: stream.platform_fee_percent(),
        }
    }

    /// Add revenue whose split is already known
    pub fn add(&mut self, revenue: Decimal, user_share: Decimal, platform_fee: Decimal) {
        self.total_revenue += revenue;
        self.user_share += user_share;
        self.platform_fee += platform_fee;
    }

    /// Add gross revenue, splitting it with the stream's rate
    pub fn add_gross(&mut self, revenue: Decimal) {
        let split = crate::revenue::split(self.stream, revenue);
        self.add(split.amount, split.creator_share, split.platform_fee);
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonetizationStats {
    pub sponsored_ads: StreamStats,
    pub cross_promotions: StreamStats,
    pub subscriptions: StreamStats,
    pub donations: StreamStats,
    pub digital_products: StreamStats,
    pub affiliates: StreamStats,
}

impl Default for MonetizationStats {
    fn default() -> Self {
        Self {
            sponsored_ads: StreamStats::new(RevenueStream::SponsoredAd),
            cross_promotions: StreamStats::new(RevenueStream::CrossPromotion),
            subscriptions: StreamStats::new(RevenueStream::Subscription),
            donations: StreamStats::new(RevenueStream::Donation),
            digital_products: StreamStats::new(RevenueStream::DigitalProduct),
            affiliates: StreamStats::new(RevenueStream::Affiliate),
        }
    }
}

/// Everything the current user earns from, across all six streams
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonetizationOverview {
    pub sponsored_ads: Vec<CampaignResponse>,
    pub cross_promotions: Vec<PromotionResponse>,
    pub subscription_tiers: Vec<SubscriptionTierResponse>,
    pub donations: Vec<DonationResponse>,
    pub donation_tiers: Vec<DonationTierResponse>,
    pub digital_products: Vec<ProductResponse>,
    pub affiliate_referrals: Vec<ReferralResponse>,
    pub affiliate_links: Vec<AffiliateLinkResponse>,
    pub stats: MonetizationStats,
}
