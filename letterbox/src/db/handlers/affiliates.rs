//! Database repositories for affiliate links and the referrals they produce.

use crate::db::{
    errors::Result,
    handlers::repository::{OwnerFilter, Repository},
    models::affiliates::{
        LinkCreateDBRequest, LinkDBResponse, LinkUpdateDBRequest, ReferralCreateDBRequest, ReferralDBResponse,
    },
};
use crate::types::{UserId, abbrev_uuid};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

pub const CODE_CONSTRAINT: &str = "affiliate_links_code_unique";

pub struct AffiliateLinks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AffiliateLinks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_code(&mut self, code: &str) -> Result<Option<LinkDBResponse>> {
        let link = sqlx::query_as::<_, LinkDBResponse>("SELECT * FROM affiliate_links WHERE code = $1")
            .bind(code)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(link)
    }

    /// Count a click on an active link. `None` when the code is unknown or the link is inactive.
    #[instrument(skip(self), err)]
    pub async fn record_click(&mut self, code: &str) -> Result<Option<LinkDBResponse>> {
        let link = sqlx::query_as::<_, LinkDBResponse>(
            "UPDATE affiliate_links SET clicks = clicks + 1, updated_at = now() WHERE code = $1 AND status = 'active' RETURNING *",
        )
        .bind(code)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(link)
    }

    #[instrument(skip(self), fields(link_id = %abbrev_uuid(&id)), err)]
    pub async fn record_conversion(&mut self, id: Uuid, commission: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE affiliate_links SET
                conversions = conversions + 1,
                commission_earned = commission_earned + $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(commission)
        .execute(&mut *self.db)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for AffiliateLinks<'c> {
    type CreateRequest = LinkCreateDBRequest;
    type UpdateRequest = LinkUpdateDBRequest;
    type Response = LinkDBResponse;
    type Id = Uuid;
    type Filter = OwnerFilter;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let link = sqlx::query_as::<_, LinkDBResponse>(
            "INSERT INTO affiliate_links (owner_id, code, target_url) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(request.owner_id)
        .bind(&request.code)
        .bind(&request.target_url)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(link)
    }

    #[instrument(skip(self), fields(link_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let link = sqlx::query_as::<_, LinkDBResponse>("SELECT * FROM affiliate_links WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(link)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let links = sqlx::query_as::<_, LinkDBResponse>("SELECT * FROM affiliate_links WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(links.into_iter().map(|l| (l.id, l)).collect())
    }

    #[instrument(skip(self, filter), fields(owner_id = %abbrev_uuid(&filter.owner_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let links = sqlx::query_as::<_, LinkDBResponse>(
            "SELECT * FROM affiliate_links WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(filter.owner_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(links)
    }

    #[instrument(skip(self), fields(link_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM affiliate_links WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(link_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let link = sqlx::query_as::<_, LinkDBResponse>(
            r#"
            UPDATE affiliate_links SET
                target_url = COALESCE($2, target_url),
                status = COALESCE($3, status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.target_url)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(link)
    }
}

pub struct Referrals<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Referrals<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(link_id = %abbrev_uuid(&request.link_id)), err)]
    pub async fn create(&mut self, request: &ReferralCreateDBRequest) -> Result<ReferralDBResponse> {
        let referral = sqlx::query_as::<_, ReferralDBResponse>(
            r#"
            INSERT INTO referrals (link_id, referrer_id, referred_user_id, amount, commission, platform_fee, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.link_id)
        .bind(request.referrer_id)
        .bind(request.referred_user_id)
        .bind(request.amount)
        .bind(request.commission)
        .bind(request.platform_fee)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(referral)
    }

    #[instrument(skip(self), fields(referrer_id = %abbrev_uuid(&referrer_id)), err)]
    pub async fn list_for_referrer(&mut self, referrer_id: UserId, skip: i64, limit: i64) -> Result<Vec<ReferralDBResponse>> {
        let referrals = sqlx::query_as::<_, ReferralDBResponse>(
            "SELECT * FROM referrals WHERE referrer_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(referrer_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(referrals)
    }
}
