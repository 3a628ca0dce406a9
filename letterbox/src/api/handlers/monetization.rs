//! Monetization overview: every revenue stream of the current user on one page.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        affiliates::{AffiliateLinkResponse, ReferralResponse},
        cross_promotions::PromotionResponse,
        digital_products::ProductResponse,
        donations::{DonationResponse, DonationTierResponse},
        monetization::{MonetizationOverview, MonetizationStats},
        sponsored_ads::CampaignResponse,
        subscriptions::SubscriptionTierResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{
            AffiliateLinks, CrossPromotions, DigitalProducts, DonationTiers, Donations, OwnerFilter, Referrals, Repository, SponsoredAds,
            SubscriptionTiers,
        },
        models::{
            affiliates::ReferralStatus, cross_promotions::PromotionStatus, digital_products::ProductStatus, sponsored_ads::CampaignStatus,
            subscriptions::TierStatus,
        },
    },
    errors::{Error, Result},
};

#[utoipa::path(
    get,
    path = "/monetization",
    tag = "monetization",
    responses(
        (status = 200, description = "All revenue streams with per-stream totals", body = MonetizationOverview),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_overview(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<MonetizationOverview>> {
    let owner = OwnerFilter::all(current_user.id);
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let campaigns = SponsoredAds::new(&mut pool_conn)
        .list_for_creator(current_user.id, owner.skip, owner.limit)
        .await?;
    let promotions = CrossPromotions::new(&mut pool_conn).list(&owner).await?;
    let tiers = SubscriptionTiers::new(&mut pool_conn).list(&owner).await?;
    let donations = Donations::new(&mut pool_conn).list_received(&owner).await?;
    let donation_tiers = DonationTiers::new(&mut pool_conn).list(&owner).await?;
    let products = DigitalProducts::new(&mut pool_conn).list(&owner).await?;
    let referrals = Referrals::new(&mut pool_conn)
        .list_for_referrer(current_user.id, owner.skip, owner.limit)
        .await?;
    let links = AffiliateLinks::new(&mut pool_conn).list(&owner).await?;

    let mut stats = MonetizationStats::default();
    for campaign in campaigns.iter() {
        if campaign.status == CampaignStatus::Active {
            stats.sponsored_ads.active += 1;
        }
        stats.sponsored_ads.add(campaign.revenue, campaign.user_share, campaign.platform_fee);
    }
    for promotion in promotions.iter() {
        if promotion.status == PromotionStatus::Active {
            stats.cross_promotions.active += 1;
        }
        stats.cross_promotions.add(promotion.revenue, promotion.user_share, promotion.platform_fee);
    }
    for tier in tiers.iter() {
        if tier.status == TierStatus::Active {
            stats.subscriptions.active += 1;
        }
        stats.subscriptions.add_gross(tier.revenue);
    }
    stats.donations.active = donation_tiers.iter().filter(|tier| tier.status == TierStatus::Active).count() as i64;
    for donation in donations.iter() {
        stats.donations.add(donation.amount, donation.user_share, donation.platform_fee);
    }
    for product in products.iter() {
        if product.status == ProductStatus::Published {
            stats.digital_products.active += 1;
        }
        stats.digital_products.add_gross(product.revenue);
    }
    stats.affiliates.active = links.iter().filter(|link| link.status == TierStatus::Active).count() as i64;
    for referral in referrals.iter().filter(|r| r.status == ReferralStatus::Converted) {
        stats.affiliates.add(referral.amount, referral.commission, referral.platform_fee);
    }

    Ok(Json(MonetizationOverview {
        sponsored_ads: campaigns.into_iter().map(CampaignResponse::from).collect(),
        cross_promotions: promotions.into_iter().map(PromotionResponse::from).collect(),
        subscription_tiers: tiers.into_iter().map(SubscriptionTierResponse::from).collect(),
        donations: donations.into_iter().map(DonationResponse::from).collect(),
        donation_tiers: donation_tiers.into_iter().map(DonationTierResponse::from).collect(),
        digital_products: products.into_iter().map(ProductResponse::from).collect(),
        affiliate_referrals: referrals.into_iter().map(ReferralResponse::from).collect(),
        affiliate_links: links.into_iter().map(AffiliateLinkResponse::from).collect(),
        stats,
    }))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::Role,
        test_utils::{add_auth_headers, create_test_app, create_test_config, create_test_user},
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_overview_totals_each_stream(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let reader = create_test_user(&pool, Role::Creator).await;
        let creator_auth = add_auth_headers(&creator);
        let reader_auth = add_auth_headers(&reader);

        let product: serde_json::Value = server
            .post("/api/monetization/digital-products")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .json(&json!({"title": "Style guide", "price": "20", "file_url": "https://files.example.com/guide.pdf", "status": "published"}))
            .await
            .json();
        server
            .post(&format!("/api/monetization/digital-products/{}/purchase", product["id"].as_str().unwrap()))
            .add_header(&reader_auth[0].0, &reader_auth[0].1)
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post("/api/monetization/cross-promotions")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .json(&json!({"newsletter_name": "Partner Weekly", "revenue_per_click": "1"}))
            .await
            .assert_status(StatusCode::CREATED);

        let overview: serde_json::Value = server
            .get("/api/monetization")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .await
            .json();

        assert_eq!(overview["digital_products"].as_array().unwrap().len(), 1);
        assert_eq!(overview["cross_promotions"].as_array().unwrap().len(), 1);
        assert!(overview["sponsored_ads"].as_array().unwrap().is_empty());

        let products = &overview["stats"]["digital_products"];
        assert_eq!(products["active"], 1);
        assert_eq!(products["total_revenue"], "20.00");
        assert_eq!(products["user_share"], "18.00");
        assert_eq!(products["platform_fee"], "2.00");
        assert_eq!(products["platform_fee_percent"], 10);
        assert_eq!(overview["stats"]["cross_promotions"]["active"], 1);
        assert_eq!(overview["stats"]["affiliates"]["platform_fee_percent"], 50);
    }

    #[sqlx::test]
    async fn test_overview_requires_authentication(pool: PgPool) {
        let server = create_test_app(pool, create_test_config()).await;
        server.get("/api/monetization").await.assert_status(StatusCode::UNAUTHORIZED);
    }
}
