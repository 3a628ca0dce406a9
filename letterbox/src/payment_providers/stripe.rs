//! Stripe payment provider implementation

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use stripe::{
    AttachPaymentMethod, Client, CreateCustomer, CreatePaymentIntent, CreateSubscription, CreateSubscriptionItems, Currency, Customer,
    CustomerId, CustomerInvoiceSettings, ErrorType, ListPaymentMethods, PaymentIntent, PaymentIntentOffSession, PaymentIntentStatus,
    PaymentMethod, PaymentMethodId, PaymentMethodTypeFilter, StripeError, Subscription, UpdateCustomer, Webhook,
};

use crate::{
    config::StripeConfig,
    payment_providers::{
        Charge, ChargeRequest, ChargeStatus, PaymentError, PaymentProvider, ProviderSubscription, Result, SavedCard, WebhookEvent,
        from_cents, to_cents,
    },
};

/// Maximum age of a webhook signature timestamp, in seconds
pub const WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Stripe payment provider
pub struct StripeProvider {
    api_key: String,
    webhook_secret: String,
    plan_price_id: Option<String>,
    api_base: String,
}

impl From<StripeConfig> for StripeProvider {
    fn from(config: StripeConfig) -> Self {
        Self {
            api_key: config.api_key,
            webhook_secret: config.webhook_secret,
            plan_price_id: config.plan_price_id,
            api_base: format!("{}/", config.api_base.trim_end_matches('/')),
        }
    }
}

impl StripeProvider {
    /// Get a Stripe client
    fn client(&self) -> Client {
        Client::from_url(self.api_base.as_str(), self.api_key.as_str())
    }
}

fn api_error(context: &str, err: StripeError) -> PaymentError {
    match err {
        StripeError::Stripe(request_error) if matches!(request_error.error_type, ErrorType::Card) || request_error.http_status == 402 => {
            let message = request_error
                .message
                .unwrap_or_else(|| "card declined".to_string());
            tracing::warn!("Stripe declined {}: {}", context, message);
            PaymentError::Declined(message)
        }
        other => {
            tracing::error!("Failed to {}: {:?}", context, other);
            PaymentError::ProviderApi(other.to_string())
        }
    }
}

fn parse_customer_id(customer_id: &str) -> Result<CustomerId> {
    customer_id
        .parse()
        .map_err(|_| PaymentError::InvalidData(format!("Invalid Stripe customer ID: {customer_id}")))
}

fn parse_payment_method_id(payment_method_id: &str) -> Result<PaymentMethodId> {
    payment_method_id
        .parse()
        .map_err(|_| PaymentError::InvalidData(format!("Invalid Stripe payment method ID: {payment_method_id}")))
}

fn charge_status(status: PaymentIntentStatus) -> ChargeStatus {
    match status {
        PaymentIntentStatus::Succeeded => ChargeStatus::Succeeded,
        PaymentIntentStatus::Processing => ChargeStatus::Processing,
        PaymentIntentStatus::RequiresAction => ChargeStatus::RequiresAction,
        PaymentIntentStatus::RequiresPaymentMethod => ChargeStatus::RequiresPaymentMethod,
        PaymentIntentStatus::RequiresConfirmation => ChargeStatus::RequiresConfirmation,
        PaymentIntentStatus::RequiresCapture => ChargeStatus::RequiresCapture,
        PaymentIntentStatus::Canceled => ChargeStatus::Canceled,
    }
}

/// Reject signature timestamps outside the tolerance window before handing the header to Stripe.
///
/// Works on the raw `t=` value so that absurd timestamps never reach signed arithmetic.
fn timestamp_within_tolerance(signature: &str, now: i64) -> bool {
    signature
        .split(',')
        .filter_map(|part| part.trim().strip_prefix("t="))
        .next()
        .and_then(|t| t.parse::<i64>().ok())
        .is_some_and(|issued_at| now.abs_diff(issued_at) <= WEBHOOK_TOLERANCE_SECS)
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_customer(&self, email: &str, name: Option<&str>) -> Result<String> {
        let client = self.client();

        let params = CreateCustomer {
            email: Some(email),
            name,
            ..Default::default()
        };
        let customer = Customer::create(&client, params)
            .await
            .map_err(|e| api_error("create Stripe customer", e))?;

        tracing::info!("Created Stripe customer {}", customer.id);
        Ok(customer.id.to_string())
    }

    async fn attach_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<()> {
        let client = self.client();
        let customer = parse_customer_id(customer_id)?;
        let payment_method = parse_payment_method_id(payment_method_id)?;

        PaymentMethod::attach(
            &client,
            &payment_method,
            AttachPaymentMethod {
                customer: customer.clone(),
            },
        )
        .await
        .map_err(|e| api_error("attach payment method", e))?;

        let params = UpdateCustomer {
            invoice_settings: Some(CustomerInvoiceSettings {
                default_payment_method: Some(payment_method.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        Customer::update(&client, &customer, params)
            .await
            .map_err(|e| api_error("set default payment method", e))?;

        tracing::info!("Attached payment method {} to customer {}", payment_method, customer);
        Ok(())
    }

    async fn list_cards(&self, customer_id: &str) -> Result<Vec<SavedCard>> {
        let client = self.client();
        let customer_id = parse_customer_id(customer_id)?;

        let customer = Customer::retrieve(&client, &customer_id, &[])
            .await
            .map_err(|e| api_error("retrieve Stripe customer", e))?;
        let default_id = customer
            .invoice_settings
            .and_then(|settings| settings.default_payment_method)
            .map(|method| method.id().to_string());

        let params = ListPaymentMethods {
            customer: Some(customer_id),
            type_: Some(PaymentMethodTypeFilter::Card),
            ..Default::default()
        };
        let methods = PaymentMethod::list(&client, &params)
            .await
            .map_err(|e| api_error("list payment methods", e))?;

        Ok(methods
            .data
            .into_iter()
            .filter_map(|method| {
                let card = method.card?;
                let id = method.id.to_string();
                Some(SavedCard {
                    is_default: default_id.as_deref() == Some(id.as_str()),
                    id,
                    brand: card.brand,
                    last4: card.last4,
                    exp_month: u32::try_from(card.exp_month).unwrap_or_default(),
                    exp_year: u32::try_from(card.exp_year).unwrap_or_default(),
                    cardholder_name: method.billing_details.name,
                })
            })
            .collect())
    }

    async fn charge(&self, request: &ChargeRequest<'_>) -> Result<Charge> {
        let client = self.client();

        let mut params = CreatePaymentIntent::new(to_cents(request.amount)?, Currency::USD);
        params.customer = Some(parse_customer_id(request.customer_id)?);
        params.payment_method = Some(parse_payment_method_id(request.payment_method_id)?);
        params.description = Some(request.description);
        params.metadata = Some(request.metadata.clone());
        params.confirm = Some(true);
        params.off_session = Some(PaymentIntentOffSession::Exists(true));

        let intent = PaymentIntent::create(&client, params)
            .await
            .map_err(|e| api_error("create payment intent", e))?;
        tracing::info!("Stripe payment intent {} is {:?}", intent.id, intent.status);

        Ok(Charge {
            id: intent.id.to_string(),
            status: charge_status(intent.status),
            amount: from_cents(intent.amount),
        })
    }

    async fn create_subscription(&self, customer_id: &str, price_id: &str, payment_method_id: &str) -> Result<ProviderSubscription> {
        let client = self.client();

        let mut params = CreateSubscription::new(parse_customer_id(customer_id)?);
        params.items = Some(vec![CreateSubscriptionItems {
            price: Some(price_id.to_string()),
            ..Default::default()
        }]);
        params.default_payment_method = Some(payment_method_id);

        let subscription = Subscription::create(&client, params)
            .await
            .map_err(|e| api_error("create subscription", e))?;
        tracing::info!("Created Stripe subscription {} for customer {}", subscription.id, customer_id);

        Ok(ProviderSubscription {
            id: subscription.id.to_string(),
            status: subscription.status.as_str().to_string(),
            current_period_end: DateTime::<Utc>::from_timestamp(subscription.current_period_end, 0),
        })
    }

    fn default_plan_price(&self) -> Option<&str> {
        self.plan_price_id.as_deref()
    }

    async fn validate_webhook(&self, headers: &HeaderMap, body: &str) -> Result<WebhookEvent> {
        // Get the Stripe signature from headers
        let signature = headers
            .get("stripe-signature")
            .ok_or_else(|| {
                tracing::error!("Missing stripe-signature header");
                PaymentError::InvalidSignature("missing stripe-signature header".to_string())
            })?
            .to_str()
            .map_err(|e| {
                tracing::error!("Invalid stripe-signature header: {:?}", e);
                PaymentError::InvalidSignature("invalid stripe-signature header".to_string())
            })?;

        if !timestamp_within_tolerance(signature, Utc::now().timestamp()) {
            return Err(PaymentError::InvalidSignature("timestamp missing or outside tolerance".to_string()));
        }

        // Validate the webhook signature and construct the event
        let event = Webhook::construct_event(body, signature, &self.webhook_secret).map_err(|e| {
            tracing::error!("Failed to construct webhook event: {:?}", e);
            PaymentError::InvalidSignature(format!("webhook validation failed: {e}"))
        })?;
        tracing::trace!("Validated Stripe webhook event {} ({:?})", event.id, event.type_);

        // Handlers read the raw object so that amounts and metadata keep Stripe's field names
        serde_json::from_str(body).map_err(|e| PaymentError::InvalidData(format!("malformed webhook event: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StripeProvider {
        StripeProvider::from(StripeConfig {
            api_key: "sk_test_fake".to_string(),
            webhook_secret: "whsec_fake".to_string(),
            plan_price_id: Some("price_plan".to_string()),
            api_base: "https://api.stripe.com".to_string(),
        })
    }

    fn signed_headers(signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", signature.parse().unwrap());
        headers
    }

    #[test]
    fn test_stripe_provider_creation() {
        let provider = provider();

        assert_eq!(provider.api_key, "sk_test_fake");
        assert_eq!(provider.webhook_secret, "whsec_fake");
        assert_eq!(provider.api_base, "https://api.stripe.com/");
        assert_eq!(provider.default_plan_price(), Some("price_plan"));
    }

    #[test]
    fn test_timestamp_tolerance_window() {
        let now = 1_760_000_000;

        assert!(timestamp_within_tolerance(&format!("t={now},v1=00"), now));
        assert!(timestamp_within_tolerance(&format!("v1=00, t={}", now - 300), now));
        assert!(!timestamp_within_tolerance(&format!("t={},v1=00", now - 301), now));
        assert!(!timestamp_within_tolerance(&format!("t={},v1=00", now + 301), now));
        assert!(!timestamp_within_tolerance("v1=00", now));
        assert!(!timestamp_within_tolerance("t=soon,v1=00", now));
    }

    #[test]
    fn test_extreme_timestamps_are_rejected_without_overflow() {
        let now = 1_760_000_000;

        assert!(!timestamp_within_tolerance("t=-9223372036854775808,v1=00", now));
        assert!(!timestamp_within_tolerance("t=9223372036854775807,v1=00", now));
        assert!(!timestamp_within_tolerance("t=-9223372036854775808,v1=00", i64::MAX));
    }

    #[tokio::test]
    async fn test_webhook_rejects_missing_and_bad_signatures() {
        let provider = provider();
        let body = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;

        let missing = provider.validate_webhook(&HeaderMap::new(), body).await;
        assert!(matches!(missing, Err(PaymentError::InvalidSignature(_))));

        let overflowing = provider
            .validate_webhook(&signed_headers("t=-9223372036854775808,v1=00"), body)
            .await;
        assert!(matches!(overflowing, Err(PaymentError::InvalidSignature(_))));

        let forged = format!("t={},v1=deadbeef", Utc::now().timestamp());
        let forged = provider.validate_webhook(&signed_headers(&forged), body).await;
        assert!(matches!(forged, Err(PaymentError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn test_malformed_ids_are_rejected_before_calling_stripe() {
        let provider = provider();

        let result = provider.attach_payment_method("not-a-customer", "pm_123").await;
        assert!(matches!(result, Err(PaymentError::InvalidData(_))));

        let result = provider.list_cards("acct_123").await;
        assert!(matches!(result, Err(PaymentError::InvalidData(_))));
    }

    #[test]
    fn test_intent_statuses_map_to_charge_statuses() {
        assert_eq!(charge_status(PaymentIntentStatus::Succeeded), ChargeStatus::Succeeded);
        assert_eq!(charge_status(PaymentIntentStatus::RequiresAction), ChargeStatus::RequiresAction);
        assert_eq!(charge_status(PaymentIntentStatus::Canceled), ChargeStatus::Canceled);
    }
}
