//! HTTP handlers for brand advertising funds.

use std::collections::HashMap;

use axum::{Json, extract::State};
use rust_decimal::Decimal;

use crate::{
    AppState,
    api::models::{
        brand_funds::{
            AddFundsRequest, AddFundsResponse, BrandFundsOverview, BrandTransactionResponse, SavedCardResponse, deposit_method_label,
        },
        money,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::handlers::BrandFunds,
    errors::{Error, Result},
    payment_providers::{ChargeRequest, ChargeStatus},
};

const RECENT_TRANSACTIONS: i64 = 50;

/// Balances, ledger and saved cards of the current brand
#[utoipa::path(
    get,
    path = "/brand/funds",
    tag = "brand-funds",
    responses(
        (status = 200, description = "Brand funds overview", body = BrandFundsOverview),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Payment provider unavailable"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_brand_funds(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::BrandFunds, operation::ReadOwn>,
) -> Result<Json<BrandFundsOverview>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = BrandFunds::new(&mut pool_conn);
    let funds = repo.get_or_create(current_user.id).await?;
    let transactions = repo.list_transactions(current_user.id, RECENT_TRANSACTIONS).await?;
    drop(pool_conn);

    let saved_cards = match &funds.stripe_customer_id {
        Some(customer_id) => state
            .payment_provider()?
            .list_cards(customer_id)
            .await?
            .into_iter()
            .map(SavedCardResponse::from)
            .collect(),
        None => Vec::new(),
    };

    Ok(Json(BrandFundsOverview {
        balance_stats: funds.into(),
        transactions: transactions.into_iter().map(BrandTransactionResponse::from).collect(),
        saved_cards,
    }))
}

/// Charge a card and add the amount to the brand's available funds
#[utoipa::path(
    post,
    path = "/brand/funds",
    tag = "brand-funds",
    request_body = AddFundsRequest,
    responses(
        (status = 200, description = "Funds added", body = AddFundsResponse),
        (status = 400, description = "Invalid amount or card"),
        (status = 401, description = "Unauthorized"),
        (status = 402, description = "Payment failed"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_brand_funds(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::BrandFunds, operation::CreateOwn>,
    Json(data): Json<AddFundsRequest>,
) -> Result<Json<AddFundsResponse>> {
    if data.amount <= Decimal::ZERO {
        return Err(Error::bad_request("Amount must be greater than zero"));
    }
    money::require_cents(data.amount)?;
    let provider = state.payment_provider()?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let funds = BrandFunds::new(&mut pool_conn).get_or_create(current_user.id).await?;
    let customer_id = match funds.stripe_customer_id {
        Some(id) => id,
        None => {
            let name = current_user.display_name.as_deref().unwrap_or(&current_user.username);
            let id = provider.create_customer(&current_user.email, Some(name)).await?;
            BrandFunds::new(&mut pool_conn).set_customer_id(current_user.id, &id).await?;
            id
        }
    };

    let (payment_method_id, saved_last4) = match (data.card_id, data.payment_method_id) {
        (Some(card_id), _) => {
            let card = provider
                .list_cards(&customer_id)
                .await?
                .into_iter()
                .find(|card| card.id == card_id)
                .ok_or_else(|| Error::bad_request("Unknown saved card"))?;
            (card.id, Some(card.last4))
        }
        (None, Some(payment_method_id)) => {
            if data.save_card {
                provider.attach_payment_method(&customer_id, &payment_method_id).await?;
            }
            (payment_method_id, None)
        }
        (None, None) => return Err(Error::bad_request("A saved card or a new payment method is required")),
    };

    let charge = provider
        .charge(&ChargeRequest {
            customer_id: &customer_id,
            payment_method_id: &payment_method_id,
            amount: data.amount,
            description: "Funds added",
            metadata: HashMap::from([("brand_id".to_string(), current_user.id.to_string())]),
        })
        .await?;
    if charge.status != ChargeStatus::Succeeded {
        return Err(Error::PaymentFailed {
            message: format!("charge {} ended as {:?}", charge.id, charge.status),
        });
    }

    let mut repo = BrandFunds::new(&mut pool_conn);
    let method = deposit_method_label(saved_last4.as_deref());
    if repo.record_deposit(current_user.id, charge.amount, &method, &charge.id).await?.is_none() {
        tracing::debug!("Deposit for {} already recorded by webhook", charge.id);
    }
    let funds = repo.get_or_create(current_user.id).await?;
    tracing::info!("Brand {} added {} in funds", current_user.id, charge.amount);

    Ok(Json(AddFundsResponse {
        message: "Funds added successfully".to_string(),
        balance_stats: funds.into(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::Role,
        test_utils::{add_auth_headers, create_test_app, create_test_config, create_test_user},
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_new_card_deposit_credits_available_balance(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let brand = create_test_user(&pool, Role::Brand).await;
        let auth = add_auth_headers(&brand);

        let body: serde_json::Value = server
            .post("/api/brand/funds")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"amount": "250", "payment_method_id": "pm_card_visa", "save_card": true}))
            .await
            .json();
        assert_eq!(body["message"], "Funds added successfully");
        assert_eq!(body["balance_stats"]["available_balance"], "250.00");

        let funds: serde_json::Value = server.get("/api/brand/funds").add_header(&auth[0].0, &auth[0].1).await.json();
        let transactions = funds["transactions"].as_array().unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0]["transaction_type"], "deposit");
        assert_eq!(transactions[0]["payment_method"], "Credit Card (New)");
        assert_eq!(transactions[0]["description"], "Funds added");
        assert_eq!(funds["saved_cards"][0]["card_number"], "**** **** **** 4242");
    }

    #[sqlx::test]
    async fn test_saved_card_deposit_is_labelled_with_last4(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let brand = create_test_user(&pool, Role::Brand).await;
        let auth = add_auth_headers(&brand);

        // First deposit creates the customer
        server
            .post("/api/brand/funds")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"amount": "10", "payment_method_id": "pm_card_visa"}))
            .await
            .assert_status_ok();

        server
            .post("/api/brand/funds")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"amount": "5.50", "card_id": "pm_dummy_visa"}))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/brand/funds")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"amount": "5", "card_id": "pm_unknown"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let funds: serde_json::Value = server.get("/api/brand/funds").add_header(&auth[0].0, &auth[0].1).await.json();
        assert_eq!(funds["balance_stats"]["available_balance"], "15.50");
        assert_eq!(funds["transactions"][0]["payment_method"], "Credit Card (**** 4242)");
    }

    #[sqlx::test]
    async fn test_invalid_amounts_and_creators_are_rejected(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let brand = create_test_user(&pool, Role::Brand).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let brand_auth = add_auth_headers(&brand);
        let creator_auth = add_auth_headers(&creator);

        server
            .post("/api/brand/funds")
            .add_header(&brand_auth[0].0, &brand_auth[0].1)
            .json(&json!({"amount": "0", "payment_method_id": "pm_card_visa"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .get("/api/brand/funds")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
