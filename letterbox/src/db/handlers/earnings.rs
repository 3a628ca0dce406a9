//! Creator ledger: earnings credited from every revenue stream, and withdrawals.

use crate::db::{
    errors::{DbError, Result},
    models::earnings::{BalanceDBResponse, TransactionDBResponse, TransactionStatus, TransactionType},
};
use crate::revenue::{RevenueSplit, RevenueStream};
use crate::types::{UserId, abbrev_uuid};
use rust_decimal::Decimal;
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Constraint that makes crediting idempotent per source event
pub const SOURCE_ID_CONSTRAINT: &str = "transactions_source_id_unique";

pub struct Earnings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Earnings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Credit the creator share of `split` to `user_id`.
    ///
    /// Adds the share to the available balance and lifetime earnings and writes an `earning` ledger
    /// row in the same transaction. A repeated `source_id` fails with a unique violation on
    /// [`SOURCE_ID_CONSTRAINT`] and leaves the balance untouched.
    #[instrument(skip(self, split, description), fields(user_id = %abbrev_uuid(&user_id), share = %split.creator_share), err)]
    pub async fn credit_earnings(
        &mut self,
        user_id: UserId,
        stream: RevenueStream,
        split: &RevenueSplit,
        source_id: &str,
        description: Option<String>,
    ) -> Result<TransactionDBResponse> {
        let mut tx = self.db.begin().await?;

        let transaction = sqlx::query_as::<_, TransactionDBResponse>(
            r#"
            INSERT INTO transactions (user_id, transaction_type, source, amount, status, description, source_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(TransactionType::Earning)
        .bind(stream.as_str())
        .bind(split.creator_share)
        .bind(TransactionStatus::Completed)
        .bind(description)
        .bind(source_id)
        .fetch_one(&mut *tx)
        .await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET available_balance = available_balance + $2,
                total_earnings = total_earnings + $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(split.creator_share)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(transaction)
    }

    /// Move `amount` from the available balance to `withdrawn_amount` and record a pending
    /// withdrawal. Returns `None` when the available balance does not cover the amount.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn withdraw(&mut self, user_id: UserId, amount: Decimal, method_label: &str) -> Result<Option<TransactionDBResponse>> {
        let mut tx = self.db.begin().await?;

        let debited = sqlx::query(
            r#"
            UPDATE users
            SET available_balance = available_balance - $2,
                withdrawn_amount = withdrawn_amount + $2,
                updated_at = now()
            WHERE id = $1 AND available_balance >= $2
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            return Ok(None);
        }

        let transaction = sqlx::query_as::<_, TransactionDBResponse>(
            r#"
            INSERT INTO transactions (user_id, transaction_type, source, amount, status, description, source_id)
            VALUES ($1, $2, 'withdrawal', $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(TransactionType::Withdrawal)
        .bind(amount)
        .bind(TransactionStatus::Pending)
        .bind(format!("Withdrawal to {method_label}"))
        .bind(format!("withdrawal_{}", Uuid::new_v4()))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(transaction))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn balance(&mut self, user_id: UserId) -> Result<BalanceDBResponse> {
        let balance = sqlx::query_as::<_, BalanceDBResponse>(
            "SELECT available_balance, pending_balance, total_earnings, withdrawn_amount FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(balance)
    }

    /// Most recent ledger rows first
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_transactions(&mut self, user_id: UserId, limit: i64) -> Result<Vec<TransactionDBResponse>> {
        let transactions = sqlx::query_as::<_, TransactionDBResponse>(
            "SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::revenue::split;
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_credit_earnings_updates_balance_and_ledger(pool: PgPool) {
        let user = create_test_user(&pool, Role::Creator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut earnings = Earnings::new(&mut conn);

        let s = split(RevenueStream::Subscription, Decimal::new(1000, 2));
        let tx = earnings
            .credit_earnings(user.id, RevenueStream::Subscription, &s, "subscription_1", None)
            .await
            .unwrap();
        assert_eq!(tx.amount, Decimal::new(900, 2));
        assert_eq!(tx.source, "subscription");

        let balance = earnings.balance(user.id).await.unwrap();
        assert_eq!(balance.available_balance, Decimal::new(900, 2));
        assert_eq!(balance.total_earnings, Decimal::new(900, 2));
    }

    #[sqlx::test]
    async fn test_credit_earnings_is_idempotent_per_source(pool: PgPool) {
        let user = create_test_user(&pool, Role::Creator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut earnings = Earnings::new(&mut conn);

        let s = split(RevenueStream::Donation, Decimal::new(500, 2));
        earnings
            .credit_earnings(user.id, RevenueStream::Donation, &s, "donation_1", None)
            .await
            .unwrap();
        let err = earnings
            .credit_earnings(user.id, RevenueStream::Donation, &s, "donation_1", None)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_of(SOURCE_ID_CONSTRAINT));

        let balance = earnings.balance(user.id).await.unwrap();
        assert_eq!(balance.available_balance, Decimal::new(450, 2));
    }

    #[sqlx::test]
    async fn test_withdraw_respects_available_balance(pool: PgPool) {
        let user = create_test_user(&pool, Role::Creator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut earnings = Earnings::new(&mut conn);

        let s = split(RevenueStream::Affiliate, Decimal::from(40));
        earnings
            .credit_earnings(user.id, RevenueStream::Affiliate, &s, "referral_1", None)
            .await
            .unwrap();

        assert!(earnings.withdraw(user.id, Decimal::from(25), "PayPal").await.unwrap().is_none());

        let withdrawal = earnings.withdraw(user.id, Decimal::from(15), "PayPal").await.unwrap().unwrap();
        assert_eq!(withdrawal.transaction_type, TransactionType::Withdrawal);
        assert_eq!(withdrawal.status, TransactionStatus::Pending);

        let balance = earnings.balance(user.id).await.unwrap();
        assert_eq!(balance.available_balance, Decimal::from(5));
        assert_eq!(balance.withdrawn_amount, Decimal::from(15));

        let ledger = earnings.list_transactions(user.id, 50).await.unwrap();
        assert_eq!(ledger.len(), 2);
    }
}
