//! Payment provider webhook receiver.
//!
//! Deliveries are verified by the configured provider, then recorded idempotently: brand deposits
//! by PaymentIntent id and plan payments by invoice id. Processing failures are logged and still
//! acknowledged, so the provider does not keep redelivering an event we cannot handle.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::users::Role,
    db::{
        handlers::{BillingPayments, BrandFunds, Users},
        models::billing::BillingPaymentCreateDBRequest,
    },
    errors::{Error, Result},
    payment_providers::WebhookEvent,
};

const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
const INVOICE_PAID: &str = "invoice.paid";

#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "webhooks",
    request_body(content = String, description = "Raw provider event", content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Invalid signature or payload"),
        (status = 500, description = "Payment provider not configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn payment_webhook(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<StatusCode> {
    let event = state.payment_provider()?.validate_webhook(&headers, &body).await?;
    tracing::info!("Received webhook event {} ({})", event.id, event.event_type);

    let outcome = match event.event_type.as_str() {
        PAYMENT_INTENT_SUCCEEDED => record_brand_deposit(&state, &event).await,
        INVOICE_PAID => record_invoice_payment(&state, &event).await,
        _ => {
            tracing::debug!("Ignoring webhook event type: {}", event.event_type);
            Ok(())
        }
    };
    if let Err(e) = outcome {
        tracing::error!("Failed to process webhook event {}: {:#}", event.id, e);
    }

    Ok(StatusCode::OK)
}

async fn record_brand_deposit(state: &AppState, event: &WebhookEvent) -> Result<()> {
    // Only deposits we started carry the brand id
    let Some(brand_id) = event.metadata("brand_id") else {
        return Ok(());
    };
    let brand_id: Uuid = brand_id
        .parse()
        .map_err(|_| Error::bad_request(format!("Invalid brand_id metadata: {brand_id}")))?;
    let payment_intent_id = event
        .object_str("id")
        .ok_or_else(|| Error::bad_request("Payment intent without id"))?;
    let amount = event
        .amount("amount_received")
        .or_else(|| event.amount("amount"))
        .ok_or_else(|| Error::bad_request("Payment intent without amount"))?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match BrandFunds::new(&mut pool_conn)
        .record_deposit(brand_id, amount, "Credit Card", payment_intent_id)
        .await?
    {
        Some(_) => tracing::info!("Recorded deposit of {} for brand {} from webhook", amount, brand_id),
        None => tracing::debug!("Deposit {} already recorded", payment_intent_id),
    }
    Ok(())
}

async fn record_invoice_payment(state: &AppState, event: &WebhookEvent) -> Result<()> {
    let Some(customer_id) = event.object_str("customer") else {
        return Ok(());
    };
    let invoice_id = event.object_str("id").ok_or_else(|| Error::bad_request("Invoice without id"))?;
    let amount = event
        .amount("amount_paid")
        .ok_or_else(|| Error::bad_request("Invoice without amount_paid"))?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn).get_user_by_payment_provider_id(customer_id).await?;
    let Some(user) = user.filter(|user| user.role == Role::Admin) else {
        tracing::debug!("No admin for customer {}, ignoring invoice {}", customer_id, invoice_id);
        return Ok(());
    };

    let payment = BillingPayments::new(&mut pool_conn)
        .create(&BillingPaymentCreateDBRequest {
            user_id: user.id,
            amount,
            status: "paid".to_string(),
            description: Some("Platform subscription".to_string()),
            stripe_invoice_id: Some(invoice_id.to_string()),
        })
        .await?;
    if payment.is_some() {
        tracing::info!("Recorded plan payment of {} for user {}", amount, user.id);
    }
    Ok(())
}
