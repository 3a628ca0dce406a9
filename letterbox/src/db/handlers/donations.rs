//! Database repositories for donation tiers and donations.

use crate::db::{
    errors::Result,
    handlers::repository::{OwnerFilter, Repository},
    models::donations::{
        DonationAnalyticsDBResponse, DonationCreateDBRequest, DonationDBResponse, DonationTierCreateDBRequest, DonationTierDBResponse,
        DonationTierUpdateDBRequest, DonationUpdateDBRequest,
    },
};
use crate::types::{TierId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

pub struct DonationTiers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> DonationTiers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Active tiers of one creator, cheapest first
    #[instrument(skip(self), fields(creator_id = %abbrev_uuid(&creator_id)), err)]
    pub async fn list_active_for_creator(&mut self, creator_id: UserId) -> Result<Vec<DonationTierDBResponse>> {
        let tiers = sqlx::query_as::<_, DonationTierDBResponse>(
            "SELECT * FROM donation_tiers WHERE creator_id = $1 AND status = 'active' ORDER BY amount ASC",
        )
        .bind(creator_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(tiers)
    }

    #[instrument(skip(self), fields(tier_id = %abbrev_uuid(&id)), err)]
    pub async fn record_donor(&mut self, id: TierId) -> Result<()> {
        sqlx::query("UPDATE donation_tiers SET donors = donors + 1, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for DonationTiers<'c> {
    type CreateRequest = DonationTierCreateDBRequest;
    type UpdateRequest = DonationTierUpdateDBRequest;
    type Response = DonationTierDBResponse;
    type Id = TierId;
    type Filter = OwnerFilter;

    #[instrument(skip(self, request), fields(creator_id = %abbrev_uuid(&request.creator_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let tier = sqlx::query_as::<_, DonationTierDBResponse>(
            r#"
            INSERT INTO donation_tiers (creator_id, name, amount, description, perks, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.creator_id)
        .bind(&request.name)
        .bind(request.amount)
        .bind(&request.description)
        .bind(&request.perks)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(tier)
    }

    #[instrument(skip(self), fields(tier_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let tier = sqlx::query_as::<_, DonationTierDBResponse>("SELECT * FROM donation_tiers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(tier)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let tiers = sqlx::query_as::<_, DonationTierDBResponse>("SELECT * FROM donation_tiers WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(tiers.into_iter().map(|t| (t.id, t)).collect())
    }

    #[instrument(skip(self, filter), fields(creator_id = %abbrev_uuid(&filter.owner_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tiers = sqlx::query_as::<_, DonationTierDBResponse>(
            "SELECT * FROM donation_tiers WHERE creator_id = $1 ORDER BY amount ASC LIMIT $2 OFFSET $3",
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
        let result = sqlx::query("DELETE FROM donation_tiers WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(tier_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let tier = sqlx::query_as::<_, DonationTierDBResponse>(
            r#"
            UPDATE donation_tiers SET
                name = COALESCE($2, name),
                amount = COALESCE($3, amount),
                description = COALESCE($4, description),
                perks = COALESCE($5, perks),
                status = COALESCE($6, status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.amount)
        .bind(&request.description)
        .bind(&request.perks)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(tier)
    }
}

pub struct Donations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Donations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(recipient_id = %abbrev_uuid(&request.recipient_id), amount = %request.amount), err)]
    pub async fn create(&mut self, request: &DonationCreateDBRequest) -> Result<DonationDBResponse> {
        let donation = sqlx::query_as::<_, DonationDBResponse>(
            r#"
            INSERT INTO donations (donor_id, donor_name, donor_email, recipient_id, tier_id, amount, user_share, platform_fee, message, is_anonymous)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(request.donor_id)
        .bind(&request.donor_name)
        .bind(&request.donor_email)
        .bind(request.recipient_id)
        .bind(request.tier_id)
        .bind(request.amount)
        .bind(request.user_share)
        .bind(request.platform_fee)
        .bind(&request.message)
        .bind(request.is_anonymous)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(donation)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<DonationDBResponse>> {
        let donation = sqlx::query_as::<_, DonationDBResponse>("SELECT * FROM donations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(donation)
    }

    /// Donations received by `filter.owner_id`, newest first
    #[instrument(skip(self, filter), fields(recipient_id = %abbrev_uuid(&filter.owner_id)), err)]
    pub async fn list_received(&mut self, filter: &OwnerFilter) -> Result<Vec<DonationDBResponse>> {
        let donations = sqlx::query_as::<_, DonationDBResponse>(
            "SELECT * FROM donations WHERE recipient_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(filter.owner_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(donations)
    }

    /// Donors are counted by account when known, otherwise by email.
    #[instrument(skip(self), fields(recipient_id = %abbrev_uuid(&recipient_id)), err)]
    pub async fn analytics(&mut self, recipient_id: UserId) -> Result<DonationAnalyticsDBResponse> {
        let analytics = sqlx::query_as::<_, DonationAnalyticsDBResponse>(
            r#"
            SELECT
                COUNT(*) AS total_donations,
                COALESCE(SUM(amount), 0) AS total_amount,
                COALESCE(SUM(user_share), 0) AS user_share,
                COALESCE(SUM(platform_fee), 0) AS platform_fee,
                COUNT(DISTINCT COALESCE(donor_id::text, lower(donor_email))) AS unique_donors
            FROM donations
            WHERE recipient_id = $1
            "#,
        )
        .bind(recipient_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(analytics)
    }

    /// Update a donation made by `donor_id`; `None` when there is no such donation.
    #[instrument(skip(self, request), err)]
    pub async fn update_for_donor(&mut self, id: Uuid, donor_id: UserId, request: &DonationUpdateDBRequest) -> Result<Option<DonationDBResponse>> {
        let donation = sqlx::query_as::<_, DonationDBResponse>(
            r#"
            UPDATE donations SET
                message = COALESCE($3, message),
                is_anonymous = COALESCE($4, is_anonymous),
                updated_at = now()
            WHERE id = $1 AND donor_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(donor_id)
        .bind(&request.message)
        .bind(request.is_anonymous)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(donation)
    }

    #[instrument(skip(self), err)]
    pub async fn delete_for_donor(&mut self, id: Uuid, donor_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM donations WHERE id = $1 AND donor_id = $2")
            .bind(id)
            .bind(donor_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::models::subscriptions::TierStatus;
    use crate::test_utils::create_test_user;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    fn donation(recipient_id: UserId, donor_id: Option<UserId>, email: Option<&str>, amount: i64) -> DonationCreateDBRequest {
        DonationCreateDBRequest {
            donor_id,
            donor_name: Some("Reader".to_string()),
            donor_email: email.map(str::to_string),
            recipient_id,
            tier_id: None,
            amount: Decimal::from(amount),
            user_share: Decimal::from(amount) * Decimal::new(9, 1),
            platform_fee: Decimal::from(amount) * Decimal::new(1, 1),
            message: None,
            is_anonymous: false,
        }
    }

    #[sqlx::test]
    async fn test_analytics_counts_unique_donors(pool: PgPool) {
        let creator = create_test_user(&pool, Role::Creator).await;
        let fan = create_test_user(&pool, Role::Creator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut donations = Donations::new(&mut conn);

        donations.create(&donation(creator.id, Some(fan.id), None, 5)).await.unwrap();
        donations.create(&donation(creator.id, Some(fan.id), None, 10)).await.unwrap();
        donations.create(&donation(creator.id, None, Some("anon@example.com"), 20)).await.unwrap();

        let analytics = donations.analytics(creator.id).await.unwrap();
        assert_eq!(analytics.total_donations, 3);
        assert_eq!(analytics.total_amount, Decimal::from(35));
        assert_eq!(analytics.unique_donors, 2);
        assert_eq!(analytics.user_share + analytics.platform_fee, analytics.total_amount);
    }

    #[sqlx::test]
    async fn test_updates_are_scoped_to_donor(pool: PgPool) {
        let creator = create_test_user(&pool, Role::Creator).await;
        let fan = create_test_user(&pool, Role::Creator).await;
        let other = create_test_user(&pool, Role::Creator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut donations = Donations::new(&mut conn);

        let d = donations.create(&donation(creator.id, Some(fan.id), None, 5)).await.unwrap();
        let update = DonationUpdateDBRequest {
            message: Some("Keep writing!".to_string()),
            is_anonymous: Some(true),
        };

        assert!(donations.update_for_donor(d.id, other.id, &update).await.unwrap().is_none());
        let updated = donations.update_for_donor(d.id, fan.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.message.as_deref(), Some("Keep writing!"));
        assert!(updated.is_anonymous);

        assert!(!donations.delete_for_donor(d.id, other.id).await.unwrap());
        assert!(donations.delete_for_donor(d.id, fan.id).await.unwrap());
    }

    #[sqlx::test]
    async fn test_active_tiers_sorted_by_amount(pool: PgPool) {
        let creator = create_test_user(&pool, Role::Creator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut tiers = DonationTiers::new(&mut conn);

        for (name, amount, status) in [("Coffee", 5, TierStatus::Active), ("Lunch", 15, TierStatus::Active), ("Retired", 1, TierStatus::Inactive)] {
            tiers
                .create(&DonationTierCreateDBRequest {
                    creator_id: creator.id,
                    name: name.to_string(),
                    amount: Decimal::from(amount),
                    description: None,
                    perks: vec![],
                    status,
                })
                .await
                .unwrap();
        }

        let active = tiers.list_active_for_creator(creator.id).await.unwrap();
        let names: Vec<_> = active.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Coffee", "Lunch"]);
    }
}
