//! Database repositories for subscription tiers and subscriptions.

use crate::db::{
    errors::Result,
    handlers::repository::{OwnerFilter, Repository},
    models::subscriptions::{
        SubscriptionAnalyticsDBResponse, SubscriptionCreateDBRequest, SubscriptionDBResponse, SubscriptionStatus, TierCreateDBRequest,
        TierDBResponse, TierUpdateDBRequest,
    },
};
use crate::types::{TierId, UserId, abbrev_uuid};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

pub struct SubscriptionTiers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> SubscriptionTiers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Count a new subscriber and add the payment to the tier's revenue.
    #[instrument(skip(self), fields(tier_id = %abbrev_uuid(&id)), err)]
    pub async fn record_subscriber(&mut self, id: TierId, amount: Decimal) -> Result<()> {
        sqlx::query("UPDATE subscription_tiers SET subscribers = subscribers + 1, revenue = revenue + $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(amount)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(tier_id = %abbrev_uuid(&id)), err)]
    pub async fn remove_subscriber(&mut self, id: TierId) -> Result<()> {
        sqlx::query("UPDATE subscription_tiers SET subscribers = GREATEST(subscribers - 1, 0), updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for SubscriptionTiers<'c> {
    type CreateRequest = TierCreateDBRequest;
    type UpdateRequest = TierUpdateDBRequest;
    type Response = TierDBResponse;
    type Id = TierId;
    type Filter = OwnerFilter;

    #[instrument(skip(self, request), fields(creator_id = %abbrev_uuid(&request.creator_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let tier = sqlx::query_as::<_, TierDBResponse>(
            r#"
            INSERT INTO subscription_tiers (creator_id, name, description, price, billing_period, perks, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.creator_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(request.billing_period)
        .bind(&request.perks)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(tier)
    }

    #[instrument(skip(self), fields(tier_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let tier = sqlx::query_as::<_, TierDBResponse>("SELECT * FROM subscription_tiers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(tier)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let tiers = sqlx::query_as::<_, TierDBResponse>("SELECT * FROM subscription_tiers WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(tiers.into_iter().map(|t| (t.id, t)).collect())
    }

    #[instrument(skip(self, filter), fields(creator_id = %abbrev_uuid(&filter.owner_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tiers = sqlx::query_as::<_, TierDBResponse>(
            "SELECT * FROM subscription_tiers WHERE creator_id = $1 ORDER BY price ASC, created_at ASC LIMIT $2 OFFSET $3",
        )
        .bind(filter.owner_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(tiers)
    }

    #[instrument(skip(self), fields(tier_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscription_tiers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(tier_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let tier = sqlx::query_as::<_, TierDBResponse>(
            r#"
            UPDATE subscription_tiers SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                billing_period = COALESCE($5, billing_period),
                perks = COALESCE($6, perks),
                status = COALESCE($7, status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(request.billing_period)
        .bind(&request.perks)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(tier)
    }
}

const SUBSCRIPTION_COLUMNS: &str = r#"
    s.id, s.subscriber_id, s.creator_id, s.tier_id, t.name AS tier_name, t.billing_period,
    s.status, s.amount, s.user_share, s.platform_fee, s.current_period_end, s.created_at, s.updated_at
"#;

pub struct Subscriptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Subscriptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert an active subscription. A second active subscription to the same tier violates
    /// `subscriptions_active_unique`.
    #[instrument(skip(self, request), fields(tier_id = %abbrev_uuid(&request.tier_id)), err)]
    pub async fn create(&mut self, request: &SubscriptionCreateDBRequest) -> Result<SubscriptionDBResponse> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO subscriptions (subscriber_id, creator_id, tier_id, status, amount, user_share, platform_fee, current_period_end)
            VALUES ($1, $2, $3, 'active', $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(request.subscriber_id)
        .bind(request.creator_id)
        .bind(request.tier_id)
        .bind(request.amount)
        .bind(request.user_share)
        .bind(request.platform_fee)
        .bind(request.current_period_end)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(crate::db::errors::DbError::NotFound)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<SubscriptionDBResponse>> {
        let query = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions s JOIN subscription_tiers t ON t.id = s.tier_id WHERE s.id = $1");
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(&query)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(subscription)
    }

    /// Most recent subscriptions to one creator's tiers
    #[instrument(skip(self), fields(creator_id = %abbrev_uuid(&creator_id)), err)]
    pub async fn list_for_creator(&mut self, creator_id: UserId, limit: i64) -> Result<Vec<SubscriptionDBResponse>> {
        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions s JOIN subscription_tiers t ON t.id = s.tier_id \
             WHERE s.creator_id = $1 ORDER BY s.created_at DESC LIMIT $2"
        );
        let subscriptions = sqlx::query_as::<_, SubscriptionDBResponse>(&query)
            .bind(creator_id)
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(subscriptions)
    }

    /// Yearly subscriptions count towards monthly revenue at a twelfth of their amount.
    #[instrument(skip(self), fields(creator_id = %abbrev_uuid(&creator_id)), err)]
    pub async fn analytics(&mut self, creator_id: UserId) -> Result<SubscriptionAnalyticsDBResponse> {
        let analytics = sqlx::query_as::<_, SubscriptionAnalyticsDBResponse>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE s.status = 'active') AS total_subscribers,
                COALESCE(ROUND(SUM(CASE WHEN t.billing_period = 'yearly' THEN s.amount / 12 ELSE s.amount END)
                    FILTER (WHERE s.status = 'active'), 2), 0) AS monthly_revenue,
                COALESCE(SUM(s.user_share), 0) AS user_share,
                COALESCE(SUM(s.platform_fee), 0) AS platform_fee,
                (SELECT COUNT(*) FROM subscription_tiers WHERE creator_id = $1 AND status = 'active') AS active_tiers
            FROM subscriptions s
            JOIN subscription_tiers t ON t.id = s.tier_id
            WHERE s.creator_id = $1
            "#,
        )
        .bind(creator_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(analytics)
    }

    #[instrument(skip(self), err)]
    pub async fn update_status(&mut self, id: Uuid, status: SubscriptionStatus) -> Result<()> {
        sqlx::query("UPDATE subscriptions SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::errors::DbError;
    use crate::db::models::subscriptions::{BillingPeriod, TierStatus};
    use crate::test_utils::create_test_user;
    use chrono::Utc;
    use sqlx::PgPool;

    fn tier(creator_id: UserId, price: i64, period: BillingPeriod) -> TierCreateDBRequest {
        TierCreateDBRequest {
            creator_id,
            name: format!("{period:?} tier"),
            description: None,
            price: Decimal::from(price),
            billing_period: period,
            perks: vec!["Bonus issue".to_string()],
            status: TierStatus::Active,
        }
    }

    fn subscribe(subscriber_id: UserId, tier: &TierDBResponse) -> SubscriptionCreateDBRequest {
        SubscriptionCreateDBRequest {
            subscriber_id,
            creator_id: tier.creator_id,
            tier_id: tier.id,
            amount: tier.price,
            user_share: tier.price * Decimal::new(9, 1),
            platform_fee: tier.price * Decimal::new(1, 1),
            current_period_end: Utc::now(),
        }
    }

    #[sqlx::test]
    async fn test_analytics_normalises_yearly_revenue(pool: PgPool) {
        let creator = create_test_user(&pool, Role::Creator).await;
        let reader = create_test_user(&pool, Role::Creator).await;
        let mut conn = pool.acquire().await.unwrap();

        let monthly = SubscriptionTiers::new(&mut conn).create(&tier(creator.id, 5, BillingPeriod::Monthly)).await.unwrap();
        let yearly = SubscriptionTiers::new(&mut conn).create(&tier(creator.id, 120, BillingPeriod::Yearly)).await.unwrap();

        let mut subs = Subscriptions::new(&mut conn);
        let first = subs.create(&subscribe(reader.id, &monthly)).await.unwrap();
        assert_eq!(first.tier_name, "Monthly tier");
        subs.create(&subscribe(reader.id, &yearly)).await.unwrap();

        let analytics = subs.analytics(creator.id).await.unwrap();
        assert_eq!(analytics.total_subscribers, 2);
        assert_eq!(analytics.monthly_revenue, Decimal::from(15));
        assert_eq!(analytics.active_tiers, 2);

        subs.update_status(first.id, SubscriptionStatus::Cancelled).await.unwrap();
        let analytics = subs.analytics(creator.id).await.unwrap();
        assert_eq!(analytics.total_subscribers, 1);
        assert_eq!(analytics.monthly_revenue, Decimal::from(10));
    }

    #[sqlx::test]
    async fn test_one_active_subscription_per_tier(pool: PgPool) {
        let creator = create_test_user(&pool, Role::Creator).await;
        let reader = create_test_user(&pool, Role::Creator).await;
        let mut conn = pool.acquire().await.unwrap();

        let t = SubscriptionTiers::new(&mut conn).create(&tier(creator.id, 5, BillingPeriod::Monthly)).await.unwrap();
        let mut subs = Subscriptions::new(&mut conn);
        subs.create(&subscribe(reader.id, &t)).await.unwrap();
        let err = subs.create(&subscribe(reader.id, &t)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    async fn test_tier_counters(pool: PgPool) {
        let creator = create_test_user(&pool, Role::Creator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut tiers = SubscriptionTiers::new(&mut conn);
        let t = tiers.create(&tier(creator.id, 8, BillingPeriod::Monthly)).await.unwrap();

        tiers.record_subscriber(t.id, Decimal::from(8)).await.unwrap();
        tiers.remove_subscriber(t.id).await.unwrap();
        tiers.remove_subscriber(t.id).await.unwrap();

        let t = tiers.get_by_id(t.id).await.unwrap().unwrap();
        assert_eq!(t.subscribers, 0);
        assert_eq!(t.revenue, Decimal::from(8));
    }
}
