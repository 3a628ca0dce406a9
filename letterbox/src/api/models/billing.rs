//! API request/response models for the operator's own platform billing.

use crate::db::models::billing::{BillingPaymentDBResponse, PaymentMethodDBResponse, PlatformSubscriptionDBResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePlanRequest {
    pub plan: String,
    /// When present a provider subscription is started with this card
    pub payment_method_id: Option<String>,
    /// Defaults to the configured plan price
    pub price_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddPaymentMethodRequest {
    pub payment_method_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlatformSubscriptionResponse {
    pub plan: String,
    pub status: String,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentMethodResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub stripe_payment_method_id: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillingPaymentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub amount: Decimal,
    pub status: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillingOverview {
    pub subscription: Option<PlatformSubscriptionResponse>,
    pub payment_methods: Vec<PaymentMethodResponse>,
    pub payment_history: Vec<BillingPaymentResponse>,
}

impl From<PlatformSubscriptionDBResponse> for PlatformSubscriptionResponse {
    fn from(db: PlatformSubscriptionDBResponse) -> Self {
        Self {
            plan: db.plan,
            status: db.status,
            stripe_subscription_id: db.stripe_subscription_id,
            current_period_end: db.current_period_end,
            updated_at: db.updated_at,
        }
    }
}

impl From<PaymentMethodDBResponse> for PaymentMethodResponse {
    fn from(db: PaymentMethodDBResponse) -> Self {
        Self {
            id: db.id,
            stripe_payment_method_id: db.stripe_payment_method_id,
            is_default: db.is_default,
            created_at: db.created_at,
        }
    }
}

impl From<BillingPaymentDBResponse> for BillingPaymentResponse {
    fn from(db: BillingPaymentDBResponse) -> Self {
        Self {
            id: db.id,
            amount: db.amount,
            status: db.status,
            description: db.description,
            created_at: db.created_at,
        }
    }
}
