//! Payment provider abstraction layer
//!
//! The [`PaymentProvider`] trait covers the gateway calls the service makes: customers, saved
//! cards, one-off charges, the operator plan subscription and webhook verification. Providers
//! never touch the database; handlers record the outcome.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::PaymentConfig;
use crate::errors::Error;

pub mod dummy;
pub mod stripe;

/// Create a payment provider from configuration
///
/// This is the single point where config is turned into a provider instance.
pub fn create_provider(config: PaymentConfig) -> Box<dyn PaymentProvider> {
    match config {
        PaymentConfig::Stripe(stripe_config) => Box::new(stripe::StripeProvider::from(stripe_config)),
        PaymentConfig::Dummy(dummy_config) => Box::new(dummy::DummyProvider::from(dummy_config)),
    }
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    /// The gateway refused the charge (card declined, authentication required, ...)
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),

    #[error("Webhook signature verification failed: {0}")]
    InvalidSignature(String),
}

impl From<PaymentError> for Error {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined(message) => Error::PaymentFailed { message },
            PaymentError::InvalidData(message) => Error::BadRequest { message },
            PaymentError::InvalidSignature(message) => Error::BadRequest {
                message: format!("Invalid webhook signature: {message}"),
            },
            PaymentError::ProviderApi(message) => Error::Internal {
                operation: format!("call payment provider: {message}"),
            },
        }
    }
}

/// Card stored on a customer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCard {
    /// Provider payment method id
    pub id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
    pub cardholder_name: Option<String>,
    pub is_default: bool,
}

/// A one-off charge against a customer's card
#[derive(Debug, Clone)]
pub struct ChargeRequest<'a> {
    pub customer_id: &'a str,
    pub payment_method_id: &'a str,
    /// Amount in dollars; providers convert to their minor unit
    pub amount: Decimal,
    pub description: &'a str,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresCapture,
    Canceled,
}

#[derive(Debug, Clone)]
pub struct Charge {
    /// Provider id of the payment (PaymentIntent id for Stripe), used as the idempotency key
    pub id: String,
    pub status: ChargeStatus,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// A verified webhook event
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// String field of the event object
    pub fn object_str(&self, field: &str) -> Option<&str> {
        self.data.object.get(field).and_then(|v| v.as_str())
    }

    /// Metadata value attached by us when the object was created
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.data.object.get("metadata").and_then(|m| m.get(key)).and_then(|v| v.as_str())
    }

    /// Amount field in minor units, converted to dollars
    pub fn amount(&self, field: &str) -> Option<Decimal> {
        self.data.object.get(field).and_then(|v| v.as_i64()).map(from_cents)
    }
}

/// Dollars to cents, rounding to the nearest cent.
pub fn to_cents(amount: Decimal) -> Result<i64> {
    use rust_decimal::{RoundingStrategy, prelude::ToPrimitive};
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| PaymentError::InvalidData(format!("amount {amount} out of range")))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Abstract payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer record and return its id
    async fn create_customer(&self, email: &str, name: Option<&str>) -> Result<String>;

    /// Attach a payment method to a customer and make it the default
    async fn attach_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<()>;

    /// Cards saved on a customer
    async fn list_cards(&self, customer_id: &str) -> Result<Vec<SavedCard>>;

    /// Charge a card immediately, off session
    async fn charge(&self, request: &ChargeRequest<'_>) -> Result<Charge>;

    /// Start a recurring subscription to a price
    async fn create_subscription(&self, customer_id: &str, price_id: &str, payment_method_id: &str) -> Result<ProviderSubscription>;

    /// Price used for the operator plan when the request does not name one
    fn default_plan_price(&self) -> Option<&str>;

    /// Validate and parse a webhook delivery
    ///
    /// Returns Err if the signature is missing or wrong, or the body is malformed.
    async fn validate_webhook(&self, headers: &HeaderMap, body: &str) -> Result<WebhookEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_cents_conversion() {
        assert_eq!(to_cents(Decimal::new(1999, 2)).unwrap(), 1999);
        assert_eq!(to_cents(Decimal::new(5, 0)).unwrap(), 500);
        assert_eq!(to_cents(Decimal::new(10005, 3)).unwrap(), 1001);
        assert_eq!(from_cents(4250), Decimal::new(4250, 2));
    }

    #[test]
    fn test_declines_are_payment_required() {
        let err: Error = PaymentError::Declined("card_declined".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);

        let err: Error = PaymentError::ProviderApi("timeout".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_event_accessors() {
        let event: WebhookEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_1", "amount": 2500, "metadata": {"brand_id": "abc"}}}
        }))
        .unwrap();

        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.object_str("id"), Some("pi_1"));
        assert_eq!(event.metadata("brand_id"), Some("abc"));
        assert_eq!(event.amount("amount"), Some(Decimal::new(2500, 2)));
        assert_eq!(event.amount("missing"), None);
    }
}
