//! Database models for brand funds and the brand ledger.

use crate::types::{CampaignId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BrandTransactionType {
    Deposit,
    CampaignReserve,
    CampaignSpend,
    CampaignRelease,
}

#[derive(Debug, Clone, FromRow)]
pub struct BrandFundsDBResponse {
    pub brand_id: UserId,
    pub stripe_customer_id: Option<String>,
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub total_spent: Decimal,
    pub total_budget: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BrandTransactionCreateDBRequest {
    pub brand_id: UserId,
    pub transaction_type: BrandTransactionType,
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub description: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub campaign_id: Option<CampaignId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BrandTransactionDBResponse {
    pub id: Uuid,
    pub brand_id: UserId,
    pub transaction_type: BrandTransactionType,
    pub amount: Decimal,
    pub status: String,
    pub payment_method: Option<String>,
    pub description: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub created_at: DateTime<Utc>,
}
