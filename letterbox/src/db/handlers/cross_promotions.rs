//! Database repository for cross-promotions.

use crate::db::{
    errors::Result,
    handlers::repository::{OwnerFilter, Repository},
    models::cross_promotions::{PromotionCreateDBRequest, PromotionDBResponse, PromotionUpdateDBRequest},
};
use crate::revenue::RevenueSplit;
use crate::types::abbrev_uuid;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

pub struct CrossPromotions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> CrossPromotions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Count a paid click on an active promotion. `None` when the promotion is missing or not
    /// active.
    #[instrument(skip(self, split), fields(promotion_id = %abbrev_uuid(&id)), err)]
    pub async fn record_click(&mut self, id: Uuid, split: &RevenueSplit) -> Result<Option<PromotionDBResponse>> {
        let promotion = sqlx::query_as::<_, PromotionDBResponse>(
            r#"
            UPDATE cross_promotions SET
                clicks = clicks + 1,
                revenue = revenue + $2,
                user_share = user_share + $3,
                platform_fee = platform_fee + $4,
                updated_at = now()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(split.amount)
        .bind(split.creator_share)
        .bind(split.platform_fee)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(promotion)
    }

    #[instrument(skip(self), fields(promotion_id = %abbrev_uuid(&id)), err)]
    pub async fn record_subscriber(&mut self, id: Uuid) -> Result<Option<PromotionDBResponse>> {
        let promotion = sqlx::query_as::<_, PromotionDBResponse>(
            "UPDATE cross_promotions SET subscribers = subscribers + 1, updated_at = now() WHERE id = $1 AND status = 'active' RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(promotion)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for CrossPromotions<'c> {
    type CreateRequest = PromotionCreateDBRequest;
    type UpdateRequest = PromotionUpdateDBRequest;
    type Response = PromotionDBResponse;
    type Id = Uuid;
    type Filter = OwnerFilter;

    #[instrument(skip(self, request), fields(creator_id = %abbrev_uuid(&request.creator_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let promotion = sqlx::query_as::<_, PromotionDBResponse>(
            r#"
            INSERT INTO cross_promotions (creator_id, newsletter_name, description, revenue_per_click)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.creator_id)
        .bind(&request.newsletter_name)
        .bind(&request.description)
        .bind(request.revenue_per_click)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(promotion)
    }

    #[instrument(skip(self), fields(promotion_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let promotion = sqlx::query_as::<_, PromotionDBResponse>("SELECT * FROM cross_promotions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(promotion)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let promotions = sqlx::query_as::<_, PromotionDBResponse>("SELECT * FROM cross_promotions WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(promotions.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(creator_id = %abbrev_uuid(&filter.owner_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let promotions = sqlx::query_as::<_, PromotionDBResponse>(
            "SELECT * FROM cross_promotions WHERE creator_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(filter.owner_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(promotions)
    }

    #[instrument(skip(self), fields(promotion_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cross_promotions WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(promotion_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let promotion = sqlx::query_as::<_, PromotionDBResponse>(
            r#"
            UPDATE cross_promotions SET
                newsletter_name = COALESCE($2, newsletter_name),
                description = COALESCE($3, description),
                revenue_per_click = COALESCE($4, revenue_per_click),
                status = COALESCE($5, status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.newsletter_name)
        .bind(&request.description)
        .bind(request.revenue_per_click)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(promotion)
    }
}
