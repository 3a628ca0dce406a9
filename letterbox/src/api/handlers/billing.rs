//! HTTP handlers for the operator's own platform plan.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::{
    AppState,
    api::models::billing::{
        AddPaymentMethodRequest, BillingOverview, BillingPaymentResponse, PaymentMethodResponse, PlatformSubscriptionResponse,
        UpdatePlanRequest,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{BillingPayments, PaymentMethods, PlatformSubscriptions, Repository, Users},
        models::billing::PlatformSubscriptionUpsertDBRequest,
    },
    errors::{Error, Result},
    payment_providers::PaymentProvider,
    types::UserId,
};

const PAYMENT_HISTORY: i64 = 20;

/// Provider customer of the admin, created on first use
async fn ensure_customer(state: &AppState, provider: &dyn PaymentProvider, user_id: UserId) -> Result<String> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut pool_conn);
    let user = users.get_by_id(user_id).await?.ok_or_else(|| Error::not_found("User", user_id))?;
    if let Some(customer_id) = user.payment_provider_id {
        return Ok(customer_id);
    }

    let name = user.display_name.as_deref().unwrap_or(&user.username);
    let customer_id = provider.create_customer(&user.email, Some(name)).await?;
    users.set_payment_provider_id(user_id, &customer_id).await?;
    Ok(customer_id)
}

#[utoipa::path(
    get,
    path = "/admin/billing",
    tag = "billing",
    responses(
        (status = 200, description = "Plan, payment methods and payment history", body = BillingOverview),
        (status = 401, description = "Unauthorized or not an admin"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_billing(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Billing, operation::ReadAll>,
) -> Result<Json<BillingOverview>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let subscription = PlatformSubscriptions::new(&mut pool_conn).get(current_user.id).await?;
    let methods = PaymentMethods::new(&mut pool_conn).list_for_user(current_user.id).await?;
    let payments = BillingPayments::new(&mut pool_conn)
        .list_for_user(current_user.id, PAYMENT_HISTORY)
        .await?;

    Ok(Json(BillingOverview {
        subscription: subscription.map(PlatformSubscriptionResponse::from),
        payment_methods: methods.into_iter().map(PaymentMethodResponse::from).collect(),
        payment_history: payments.into_iter().map(BillingPaymentResponse::from).collect(),
    }))
}

/// Change the platform plan, starting a provider subscription when a card is given
#[utoipa::path(
    put,
    path = "/admin/billing",
    tag = "billing",
    request_body = UpdatePlanRequest,
    responses(
        (status = 200, description = "Plan updated", body = PlatformSubscriptionResponse),
        (status = 400, description = "Invalid plan"),
        (status = 401, description = "Unauthorized or not an admin"),
        (status = 402, description = "Payment failed"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_plan(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Billing, operation::UpdateAll>,
    Json(data): Json<UpdatePlanRequest>,
) -> Result<Json<PlatformSubscriptionResponse>> {
    if data.plan.trim().is_empty() {
        return Err(Error::bad_request("Plan is required"));
    }

    let stripe_subscription_id = match &data.payment_method_id {
        Some(payment_method_id) => {
            let provider = state.payment_provider()?;
            let price_id = data
                .price_id
                .as_deref()
                .or_else(|| provider.default_plan_price())
                .ok_or_else(|| Error::NotConfigured {
                    what: "Plan price".to_string(),
                })?
                .to_string();

            let customer_id = ensure_customer(&state, provider, current_user.id).await?;
            provider.attach_payment_method(&customer_id, payment_method_id).await?;
            let subscription = provider.create_subscription(&customer_id, &price_id, payment_method_id).await?;
            tracing::info!("Started provider subscription {} ({})", subscription.id, subscription.status);
            Some(subscription.id)
        }
        None => None,
    };

    let period = chrono::Duration::from_std(state.config.monetization.platform_plan_period).map_err(|e| Error::Internal {
        operation: format!("convert plan period: {e}"),
    })?;
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let subscription = PlatformSubscriptions::new(&mut pool_conn)
        .upsert(&PlatformSubscriptionUpsertDBRequest {
            user_id: current_user.id,
            plan: data.plan,
            stripe_subscription_id,
            current_period_end: Utc::now() + period,
        })
        .await?;

    Ok(Json(PlatformSubscriptionResponse::from(subscription)))
}

/// Store a card as the default payment method for the plan
#[utoipa::path(
    post,
    path = "/admin/billing",
    tag = "billing",
    request_body = AddPaymentMethodRequest,
    responses(
        (status = 201, description = "Payment method stored", body = PaymentMethodResponse),
        (status = 401, description = "Unauthorized or not an admin"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_payment_method(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Billing, operation::CreateAll>,
    Json(data): Json<AddPaymentMethodRequest>,
) -> Result<(StatusCode, Json<PaymentMethodResponse>)> {
    if data.payment_method_id.trim().is_empty() {
        return Err(Error::bad_request("Payment method is required"));
    }

    let provider = state.payment_provider()?;
    let customer_id = ensure_customer(&state, provider, current_user.id).await?;
    provider.attach_payment_method(&customer_id, &data.payment_method_id).await?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let method = PaymentMethods::new(&mut pool_conn)
        .add_default(current_user.id, &data.payment_method_id)
        .await?;

    Ok((StatusCode::CREATED, Json(PaymentMethodResponse::from(method))))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::Role,
        test_utils::{add_auth_headers, create_test_app, create_test_config, create_test_user},
    };
    use axum::http::StatusCode;
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_plan_change_with_card_starts_subscription(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let auth = add_auth_headers(&admin);

        let plan: serde_json::Value = server
            .put("/api/admin/billing")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"plan": "pro", "payment_method_id": "pm_card_visa"}))
            .await
            .json();
        assert_eq!(plan["plan"], "pro");
        assert_eq!(plan["status"], "active");
        assert!(plan["stripe_subscription_id"].as_str().unwrap().starts_with("sub_dummy_"));

        let period_end: DateTime<Utc> = plan["current_period_end"].as_str().unwrap().parse().unwrap();
        let expected = Utc::now() + Duration::days(30);
        assert!((period_end - expected).num_minutes().abs() < 5);

        // Changing the plan without a card keeps the provider subscription
        let plan: serde_json::Value = server
            .put("/api/admin/billing")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"plan": "enterprise"}))
            .await
            .json();
        assert_eq!(plan["plan"], "enterprise");
        assert!(plan["stripe_subscription_id"].is_string());
    }

    #[sqlx::test]
    async fn test_new_payment_method_becomes_the_only_default(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let auth = add_auth_headers(&admin);

        for pm in ["pm_first", "pm_second"] {
            server
                .post("/api/admin/billing")
                .add_header(&auth[0].0, &auth[0].1)
                .json(&json!({"payment_method_id": pm}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let billing: serde_json::Value = server.get("/api/admin/billing").add_header(&auth[0].0, &auth[0].1).await.json();
        let methods = billing["payment_methods"].as_array().unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0]["stripe_payment_method_id"], "pm_second");
        assert_eq!(methods[0]["is_default"], true);
        assert_eq!(methods[1]["is_default"], false);
        assert!(billing["subscription"].is_null());
    }

    #[sqlx::test]
    async fn test_billing_is_admin_only(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        for role in [Role::Creator, Role::Brand] {
            let user = create_test_user(&pool, role).await;
            let auth = add_auth_headers(&user);
            server
                .get("/api/admin/billing")
                .add_header(&auth[0].0, &auth[0].1)
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }
    }
}
