//! Database models for the operator plan billing.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PaymentMethodDBResponse {
    pub id: Uuid,
    pub user_id: UserId,
    pub stripe_payment_method_id: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PlatformSubscriptionUpsertDBRequest {
    pub user_id: UserId,
    pub plan: String,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PlatformSubscriptionDBResponse {
    pub user_id: UserId,
    pub stripe_subscription_id: Option<String>,
    pub plan: String,
    pub status: String,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BillingPaymentCreateDBRequest {
    pub user_id: UserId,
    pub amount: Decimal,
    pub status: String,
    pub description: Option<String>,
    pub stripe_invoice_id: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BillingPaymentDBResponse {
    pub id: Uuid,
    pub user_id: UserId,
    pub amount: Decimal,
    pub status: String,
    pub description: Option<String>,
    pub stripe_invoice_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
