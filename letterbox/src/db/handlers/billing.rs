//! Database repositories for the operator plan: payment methods, the platform subscription and
//! payment history.

use crate::db::{
    errors::Result,
    models::billing::{
        BillingPaymentCreateDBRequest, BillingPaymentDBResponse, PaymentMethodDBResponse, PlatformSubscriptionDBResponse,
        PlatformSubscriptionUpsertDBRequest,
    },
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct PaymentMethods<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PaymentMethods<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<PaymentMethodDBResponse>> {
        let methods = sqlx::query_as::<_, PaymentMethodDBResponse>(
            "SELECT * FROM payment_methods WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(methods)
    }

    /// Store a payment method as the user's only default.
    #[instrument(skip(self, stripe_payment_method_id), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn add_default(&mut self, user_id: UserId, stripe_payment_method_id: &str) -> Result<PaymentMethodDBResponse> {
        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE payment_methods SET is_default = false WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let method = sqlx::query_as::<_, PaymentMethodDBResponse>(
            "INSERT INTO payment_methods (user_id, stripe_payment_method_id, is_default) VALUES ($1, $2, true) RETURNING *",
        )
        .bind(user_id)
        .bind(stripe_payment_method_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(method)
    }
}

pub struct PlatformSubscriptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PlatformSubscriptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get(&mut self, user_id: UserId) -> Result<Option<PlatformSubscriptionDBResponse>> {
        let subscription =
            sqlx::query_as::<_, PlatformSubscriptionDBResponse>("SELECT * FROM platform_subscriptions WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(subscription)
    }

    /// Insert or replace the plan, always leaving it active.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), plan = %request.plan), err)]
    pub async fn upsert(&mut self, request: &PlatformSubscriptionUpsertDBRequest) -> Result<PlatformSubscriptionDBResponse> {
        let subscription = sqlx::query_as::<_, PlatformSubscriptionDBResponse>(
            r#"
            INSERT INTO platform_subscriptions (user_id, plan, stripe_subscription_id, status, current_period_end)
            VALUES ($1, $2, $3, 'active', $4)
            ON CONFLICT (user_id) DO UPDATE SET
                plan = EXCLUDED.plan,
                stripe_subscription_id = COALESCE(EXCLUDED.stripe_subscription_id, platform_subscriptions.stripe_subscription_id),
                status = 'active',
                current_period_end = EXCLUDED.current_period_end,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(&request.plan)
        .bind(&request.stripe_subscription_id)
        .bind(request.current_period_end)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(subscription)
    }
}

pub struct BillingPayments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> BillingPayments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: UserId, limit: i64) -> Result<Vec<BillingPaymentDBResponse>> {
        let payments = sqlx::query_as::<_, BillingPaymentDBResponse>(
            "SELECT * FROM billing_payments WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(payments)
    }

    /// Record a payment. Returns `None` when a payment for the same invoice already exists.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn create(&mut self, request: &BillingPaymentCreateDBRequest) -> Result<Option<BillingPaymentDBResponse>> {
        let payment = sqlx::query_as::<_, BillingPaymentDBResponse>(
            r#"
            INSERT INTO billing_payments (user_id, amount, status, description, stripe_invoice_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (stripe_invoice_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(request.amount)
        .bind(&request.status)
        .bind(&request.description)
        .bind(&request.stripe_invoice_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::create_test_user;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_invoice_payments_recorded_once(pool: PgPool) {
        let admin = create_test_user(&pool, Role::Admin).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut payments = BillingPayments::new(&mut conn);

        let request = BillingPaymentCreateDBRequest {
            user_id: admin.id,
            amount: Decimal::new(4900, 2),
            status: "paid".to_string(),
            description: Some("Pro plan".to_string()),
            stripe_invoice_id: Some("in_123".to_string()),
        };
        assert!(payments.create(&request).await.unwrap().is_some());
        assert!(payments.create(&request).await.unwrap().is_none());
        assert_eq!(payments.list_for_user(admin.id, 10).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    async fn test_plan_upsert_and_single_default_method(pool: PgPool) {
        let admin = create_test_user(&pool, Role::Admin).await;
        let mut conn = pool.acquire().await.unwrap();

        let period_end = Utc::now() + Duration::days(30);
        let mut plans = PlatformSubscriptions::new(&mut conn);
        plans
            .upsert(&PlatformSubscriptionUpsertDBRequest {
                user_id: admin.id,
                plan: "starter".to_string(),
                stripe_subscription_id: Some("sub_1".to_string()),
                current_period_end: period_end,
            })
            .await
            .unwrap();
        let plan = plans
            .upsert(&PlatformSubscriptionUpsertDBRequest {
                user_id: admin.id,
                plan: "pro".to_string(),
                stripe_subscription_id: None,
                current_period_end: period_end,
            })
            .await
            .unwrap();
        assert_eq!(plan.plan, "pro");
        assert_eq!(plan.stripe_subscription_id.as_deref(), Some("sub_1"));

        let mut methods = PaymentMethods::new(&mut conn);
        methods.add_default(admin.id, "pm_1").await.unwrap();
        methods.add_default(admin.id, "pm_2").await.unwrap();
        let listed = methods.list_for_user(admin.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed.iter().filter(|m| m.is_default).count(), 1);
        assert_eq!(listed[0].stripe_payment_method_id, "pm_2");
    }
}
