//! Database repository for sponsored ad campaigns.

use crate::db::{
    errors::Result,
    models::sponsored_ads::{CampaignCreateDBRequest, CampaignDBResponse, CampaignStatus},
};
use crate::revenue::RevenueSplit;
use crate::types::{CampaignId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct SponsoredAds<'c> {
    db: &'c mut PgConnection,
}

impl<'c> SponsoredAds<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(brand_id = %abbrev_uuid(&request.brand_id), budget = %request.budget), err)]
    pub async fn create(&mut self, request: &CampaignCreateDBRequest) -> Result<CampaignDBResponse> {
        let campaign = sqlx::query_as::<_, CampaignDBResponse>(
            r#"
            INSERT INTO sponsored_ads (brand_id, creator_id, brand_name, campaign_name, budget, cost_per_click, start_date, end_date, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active')
            RETURNING *
            "#,
        )
        .bind(request.brand_id)
        .bind(request.creator_id)
        .bind(&request.brand_name)
        .bind(&request.campaign_name)
        .bind(request.budget)
        .bind(request.cost_per_click)
        .bind(request.start_date)
        .bind(request.end_date)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(campaign)
    }

    #[instrument(skip(self), fields(campaign_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: CampaignId) -> Result<Option<CampaignDBResponse>> {
        let campaign = sqlx::query_as::<_, CampaignDBResponse>("SELECT * FROM sponsored_ads WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(campaign)
    }

    /// Lock the campaign row for the rest of the transaction.
    #[instrument(skip(self), fields(campaign_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: CampaignId) -> Result<Option<CampaignDBResponse>> {
        let campaign = sqlx::query_as::<_, CampaignDBResponse>("SELECT * FROM sponsored_ads WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(campaign)
    }

    /// Campaigns placed in a creator's newsletter
    #[instrument(skip(self), fields(creator_id = %abbrev_uuid(&creator_id)), err)]
    pub async fn list_for_creator(&mut self, creator_id: UserId, skip: i64, limit: i64) -> Result<Vec<CampaignDBResponse>> {
        let campaigns = sqlx::query_as::<_, CampaignDBResponse>(
            "SELECT * FROM sponsored_ads WHERE creator_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(creator_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(campaigns)
    }

    /// Campaigns funded by a brand
    #[instrument(skip(self), fields(brand_id = %abbrev_uuid(&brand_id)), err)]
    pub async fn list_for_brand(&mut self, brand_id: UserId, skip: i64, limit: i64) -> Result<Vec<CampaignDBResponse>> {
        let campaigns = sqlx::query_as::<_, CampaignDBResponse>(
            "SELECT * FROM sponsored_ads WHERE brand_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(brand_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(campaigns)
    }

    #[instrument(skip(self), fields(campaign_id = %abbrev_uuid(&id)), err)]
    pub async fn update_status(&mut self, id: CampaignId, status: CampaignStatus) -> Result<CampaignDBResponse> {
        let campaign = sqlx::query_as::<_, CampaignDBResponse>("UPDATE sponsored_ads SET status = $2, updated_at = now() WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(status)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(campaign)
    }

    #[instrument(skip(self), fields(campaign_id = %abbrev_uuid(&id)), err)]
    pub async fn record_impression(&mut self, id: CampaignId) -> Result<bool> {
        let result = sqlx::query("UPDATE sponsored_ads SET impressions = impressions + 1, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Charge one click. The campaign completes once its whole budget is spent.
    #[instrument(skip(self, split), fields(campaign_id = %abbrev_uuid(&id), charge = %split.amount), err)]
    pub async fn record_click(&mut self, id: CampaignId, split: &RevenueSplit) -> Result<CampaignDBResponse> {
        let campaign = sqlx::query_as::<_, CampaignDBResponse>(
            r#"
            UPDATE sponsored_ads SET
                clicks = clicks + 1,
                revenue = revenue + $2,
                user_share = user_share + $3,
                platform_fee = platform_fee + $4,
                status = CASE WHEN revenue + $2 >= budget THEN 'completed' ELSE status END,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(split.amount)
        .bind(split.creator_share)
        .bind(split.platform_fee)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(campaign)
    }
}
