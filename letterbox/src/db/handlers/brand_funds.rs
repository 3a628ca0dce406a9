//! Brand funds: deposited money, reservations for campaigns and the brand ledger.
//!
//! `available_balance` is money a brand can commit; `pending_balance` is reserved for running
//! campaigns. Every movement is a conditional update, so balances never go negative.

use crate::db::{
    errors::Result,
    models::brand_funds::{BrandFundsDBResponse, BrandTransactionCreateDBRequest, BrandTransactionDBResponse, BrandTransactionType},
};
use crate::types::{CampaignId, UserId, abbrev_uuid};
use rust_decimal::Decimal;
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct BrandFunds<'c> {
    db: &'c mut PgConnection,
}

impl<'c> BrandFunds<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// The brand's funds row, created empty on first use
    #[instrument(skip(self), fields(brand_id = %abbrev_uuid(&brand_id)), err)]
    pub async fn get_or_create(&mut self, brand_id: UserId) -> Result<BrandFundsDBResponse> {
        let funds = sqlx::query_as::<_, BrandFundsDBResponse>(
            r#"
            INSERT INTO brand_funds (brand_id) VALUES ($1)
            ON CONFLICT (brand_id) DO UPDATE SET brand_id = EXCLUDED.brand_id
            RETURNING *
            "#,
        )
        .bind(brand_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(funds)
    }

    #[instrument(skip(self), fields(brand_id = %abbrev_uuid(&brand_id)), err)]
    pub async fn set_customer_id(&mut self, brand_id: UserId, customer_id: &str) -> Result<()> {
        sqlx::query("UPDATE brand_funds SET stripe_customer_id = $2, updated_at = now() WHERE brand_id = $1")
            .bind(brand_id)
            .bind(customer_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Record a deposit and add it to the available balance.
    ///
    /// Returns `None` when a deposit for the same payment intent was already recorded.
    #[instrument(skip(self, payment_method), fields(brand_id = %abbrev_uuid(&brand_id), amount = %amount), err)]
    pub async fn record_deposit(
        &mut self,
        brand_id: UserId,
        amount: Decimal,
        payment_method: &str,
        payment_intent_id: &str,
    ) -> Result<Option<BrandTransactionDBResponse>> {
        let mut tx = self.db.begin().await?;

        let transaction = sqlx::query_as::<_, BrandTransactionDBResponse>(
            r#"
            INSERT INTO brand_transactions (brand_id, transaction_type, amount, payment_method, description, stripe_payment_intent_id)
            VALUES ($1, $2, $3, $4, 'Funds added', $5)
            ON CONFLICT (stripe_payment_intent_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(brand_id)
        .bind(BrandTransactionType::Deposit)
        .bind(amount)
        .bind(payment_method)
        .bind(payment_intent_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(transaction) = transaction else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO brand_funds (brand_id, available_balance) VALUES ($1, $2)
            ON CONFLICT (brand_id) DO UPDATE SET
                available_balance = brand_funds.available_balance + EXCLUDED.available_balance,
                updated_at = now()
            "#,
        )
        .bind(brand_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(transaction))
    }

    /// Move `amount` from available to reserved funds for a new campaign.
    /// Returns false when the available balance is short.
    #[instrument(skip(self), fields(brand_id = %abbrev_uuid(&brand_id), amount = %amount), err)]
    pub async fn reserve(&mut self, brand_id: UserId, amount: Decimal) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE brand_funds SET
                available_balance = available_balance - $2,
                pending_balance = pending_balance + $2,
                total_budget = total_budget + $2,
                updated_at = now()
            WHERE brand_id = $1 AND available_balance >= $2
            "#,
        )
        .bind(brand_id)
        .bind(amount)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pay a click out of reserved funds.
    #[instrument(skip(self), fields(brand_id = %abbrev_uuid(&brand_id), amount = %amount), err)]
    pub async fn spend(&mut self, brand_id: UserId, amount: Decimal) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE brand_funds SET
                pending_balance = pending_balance - $2,
                total_spent = total_spent + $2,
                updated_at = now()
            WHERE brand_id = $1 AND pending_balance >= $2
            "#,
        )
        .bind(brand_id)
        .bind(amount)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return unspent reserved funds to the available balance.
    #[instrument(skip(self), fields(brand_id = %abbrev_uuid(&brand_id), amount = %amount), err)]
    pub async fn release(&mut self, brand_id: UserId, amount: Decimal) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE brand_funds SET
                pending_balance = pending_balance - $2,
                available_balance = available_balance + $2,
                total_budget = total_budget - $2,
                updated_at = now()
            WHERE brand_id = $1 AND pending_balance >= $2
            "#,
        )
        .bind(brand_id)
        .bind(amount)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(brand_id = %abbrev_uuid(&request.brand_id)), err)]
    pub async fn create_transaction(&mut self, request: &BrandTransactionCreateDBRequest) -> Result<BrandTransactionDBResponse> {
        let transaction = sqlx::query_as::<_, BrandTransactionDBResponse>(
            r#"
            INSERT INTO brand_transactions (brand_id, transaction_type, amount, payment_method, description, stripe_payment_intent_id, campaign_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.brand_id)
        .bind(request.transaction_type)
        .bind(request.amount)
        .bind(&request.payment_method)
        .bind(&request.description)
        .bind(&request.stripe_payment_intent_id)
        .bind(request.campaign_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(transaction)
    }

    /// Ledger row for a campaign movement
    pub async fn record_campaign_movement(
        &mut self,
        brand_id: UserId,
        campaign_id: CampaignId,
        transaction_type: BrandTransactionType,
        amount: Decimal,
        description: String,
    ) -> Result<BrandTransactionDBResponse> {
        self.create_transaction(&BrandTransactionCreateDBRequest {
            brand_id,
            transaction_type,
            amount,
            payment_method: None,
            description: Some(description),
            stripe_payment_intent_id: None,
            campaign_id: Some(campaign_id),
        })
        .await
    }

    #[instrument(skip(self), fields(brand_id = %abbrev_uuid(&brand_id)), err)]
    pub async fn list_transactions(&mut self, brand_id: UserId, limit: i64) -> Result<Vec<BrandTransactionDBResponse>> {
        let transactions = sqlx::query_as::<_, BrandTransactionDBResponse>(
            "SELECT * FROM brand_transactions WHERE brand_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(brand_id)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(transactions)
    }
}
