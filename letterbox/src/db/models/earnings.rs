//! Database models for the creator ledger and withdrawal methods.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Ledger row type stored as TEXT in database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Earning,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionDBResponse {
    pub id: Uuid,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    pub source: String,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub source_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalMethodType {
    BankAccount,
    Paypal,
}

#[derive(Debug, Clone)]
pub struct WithdrawalMethodCreateDBRequest {
    pub user_id: UserId,
    pub method_type: WithdrawalMethodType,
    pub label: String,
    pub last4: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct WithdrawalMethodDBResponse {
    pub id: Uuid,
    pub user_id: UserId,
    pub method_type: WithdrawalMethodType,
    pub label: String,
    pub last4: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Balance columns of a user
#[derive(Debug, Clone, FromRow)]
pub struct BalanceDBResponse {
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub total_earnings: Decimal,
    pub withdrawn_amount: Decimal,
}
