//! Dummy payment provider implementation
//!
//! Every charge succeeds and every customer has one test card. Useful for testing and development
//! purposes.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};

use crate::{
    config::DummyConfig,
    payment_providers::{
        Charge, ChargeRequest, ChargeStatus, PaymentError, PaymentProvider, ProviderSubscription, Result, SavedCard, WebhookEvent,
    },
};

/// Dummy payment provider that accepts every charge
pub struct DummyProvider {
    plan_price_id: String,
}

impl From<DummyConfig> for DummyProvider {
    fn from(config: DummyConfig) -> Self {
        Self {
            plan_price_id: config.plan_price_id,
        }
    }
}

fn dummy_id(prefix: &str) -> String {
    format!("{}_dummy_{}", prefix, uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    async fn create_customer(&self, email: &str, _name: Option<&str>) -> Result<String> {
        let id = dummy_id("cus");
        tracing::info!("Dummy provider created customer {} for {}", id, email);
        Ok(id)
    }

    async fn attach_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<()> {
        tracing::info!("Dummy provider attached {} to {}", payment_method_id, customer_id);
        Ok(())
    }

    async fn list_cards(&self, _customer_id: &str) -> Result<Vec<SavedCard>> {
        Ok(vec![SavedCard {
            id: "pm_dummy_visa".to_string(),
            brand: "visa".to_string(),
            last4: "4242".to_string(),
            exp_month: 12,
            exp_year: 2034,
            cardholder_name: None,
            is_default: true,
        }])
    }

    async fn charge(&self, request: &ChargeRequest<'_>) -> Result<Charge> {
        if request.amount <= rust_decimal::Decimal::ZERO {
            return Err(PaymentError::InvalidData("amount must be positive".to_string()));
        }

        let id = dummy_id("pi");
        tracing::info!("Dummy provider charged {} to {} ({})", request.amount, request.customer_id, id);
        Ok(Charge {
            id,
            status: ChargeStatus::Succeeded,
            amount: request.amount,
        })
    }

    async fn create_subscription(&self, customer_id: &str, price_id: &str, _payment_method_id: &str) -> Result<ProviderSubscription> {
        let id = dummy_id("sub");
        tracing::info!("Dummy provider subscribed {} to {} ({})", customer_id, price_id, id);
        Ok(ProviderSubscription {
            id,
            status: "active".to_string(),
            current_period_end: Some(Utc::now() + Duration::days(30)),
        })
    }

    fn default_plan_price(&self) -> Option<&str> {
        Some(&self.plan_price_id)
    }

    async fn validate_webhook(&self, _headers: &HeaderMap, body: &str) -> Result<WebhookEvent> {
        // Deliveries are trusted as-is; only the event shape is checked
        serde_json::from_str(body).map_err(|e| PaymentError::InvalidData(format!("malformed webhook event: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_charges_always_succeed() {
        let provider = DummyProvider::from(DummyConfig::default());
        let customer = provider.create_customer("brand@example.com", Some("Acme")).await.unwrap();
        assert!(customer.starts_with("cus_dummy_"));

        let charge = provider
            .charge(&ChargeRequest {
                customer_id: &customer,
                payment_method_id: "pm_dummy_visa",
                amount: Decimal::new(1000, 2),
                description: "Funds added",
                metadata: HashMap::new(),
            })
            .await
            .unwrap();
        assert_eq!(charge.status, ChargeStatus::Succeeded);
        assert_eq!(charge.amount, Decimal::TEN);

        let zero = provider
            .charge(&ChargeRequest {
                customer_id: &customer,
                payment_method_id: "pm_dummy_visa",
                amount: Decimal::ZERO,
                description: "Funds added",
                metadata: HashMap::new(),
            })
            .await;
        assert!(matches!(zero, Err(PaymentError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_webhook_deliveries_are_only_parsed() {
        let provider = DummyProvider::from(DummyConfig::default());
        let body = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        let event = provider.validate_webhook(&HeaderMap::new(), body).await.unwrap();
        assert_eq!(event.id, "evt_1");

        assert!(provider.validate_webhook(&HeaderMap::new(), "not json").await.is_err());
    }

    #[test]
    fn test_plan_price_is_configurable() {
        let provider = DummyProvider::from(DummyConfig::default());
        assert_eq!(provider.default_plan_price(), Some("price_dummy_plan"));

        let provider = DummyProvider::from(DummyConfig {
            plan_price_id: "price_local".to_string(),
        });
        assert_eq!(provider.default_plan_price(), Some("price_local"));
    }
}
