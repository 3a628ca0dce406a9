//! API request/response models for creator balances, withdrawals and withdrawal methods.

use super::users::BalanceStats;
use crate::{
    db::models::earnings::{
        BalanceDBResponse, TransactionDBResponse, TransactionStatus, TransactionType, WithdrawalMethodDBResponse, WithdrawalMethodType,
    },
    types::UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WithdrawalRequest {
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = String, format = "uuid")]
    pub withdrawal_method_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WithdrawalMethodCreate {
    pub method_type: WithdrawalMethodType,
    pub label: String,
    pub last4: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub transaction_type: TransactionType,
    /// Revenue stream for earnings, `withdrawal` for withdrawals
    pub source: String,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WithdrawalMethodResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub method_type: WithdrawalMethodType,
    pub label: String,
    pub last4: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FundsOverview {
    pub balance_stats: BalanceStats,
    pub transactions: Vec<TransactionResponse>,
    pub withdrawal_methods: Vec<WithdrawalMethodResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WithdrawalResponse {
    pub message: String,
    pub transaction: TransactionResponse,
    pub balance_stats: BalanceStats,
}

impl From<BalanceDBResponse> for BalanceStats {
    fn from(db: BalanceDBResponse) -> Self {
        Self {
            available_balance: db.available_balance,
            pending_balance: db.pending_balance,
            total_earnings: db.total_earnings,
            withdrawn_amount: db.withdrawn_amount,
        }
    }
}

impl From<TransactionDBResponse> for TransactionResponse {
    fn from(db: TransactionDBResponse) -> Self {
        Self {
            id: db.id,
            transaction_type: db.transaction_type,
            source: db.source,
            amount: db.amount,
            status: db.status,
            description: db.description,
            created_at: db.created_at,
        }
    }
}

impl From<WithdrawalMethodDBResponse> for WithdrawalMethodResponse {
    fn from(db: WithdrawalMethodDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            method_type: db.method_type,
            label: db.label,
            last4: db.last4,
            is_default: db.is_default,
            created_at: db.created_at,
        }
    }
}
