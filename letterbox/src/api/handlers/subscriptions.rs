//! HTTP handlers for subscription tiers and paid subscriptions.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{Months, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        money,
        pagination::Pagination,
        subscriptions::{
            SubscriptionCreate, SubscriptionResponse, SubscriptionTierCreate, SubscriptionTierResponse, SubscriptionTierUpdate,
            SubscriptionUpdate, SubscriptionsOverview,
        },
        users::CurrentUser,
    },
    auth::permissions::{self, RequiresPermission, operation, resource},
    db::{
        handlers::{Earnings, OwnerFilter, Repository, SubscriptionTiers, Subscriptions},
        models::subscriptions::{SubscriptionCreateDBRequest, SubscriptionStatus, TierCreateDBRequest, TierStatus, TierUpdateDBRequest},
    },
    errors::{Error, Result},
    revenue::{self, RevenueStream},
    types::{Operation, Resource, TierId},
};

/// Most recent subscriptions shown on the creator's subscriptions page
const RECENT_SUBSCRIPTIONS: i64 = 10;

fn validate_price(price: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(Error::bad_request("Price must be greater than zero"));
    }
    money::require_cents(price)?;
    Ok(())
}

/// List the current creator's subscription tiers
#[utoipa::path(
    get,
    path = "/monetization/subscription-tiers",
    tag = "subscriptions",
    params(Pagination),
    responses(
        (status = 200, description = "Subscription tiers", body = [SubscriptionTierResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tiers(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: RequiresPermission<resource::SubscriptionTiers, operation::ReadOwn>,
) -> Result<Json<Vec<SubscriptionTierResponse>>> {
    let (skip, limit) = pagination.params();
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tiers = SubscriptionTiers::new(&mut pool_conn)
        .list(&OwnerFilter::new(current_user.id, skip, limit))
        .await?;

    Ok(Json(tiers.into_iter().map(SubscriptionTierResponse::from).collect()))
}

/// Create a subscription tier
#[utoipa::path(
    post,
    path = "/monetization/subscription-tiers",
    tag = "subscriptions",
    request_body = SubscriptionTierCreate,
    responses(
        (status = 201, description = "Tier created", body = SubscriptionTierResponse),
        (status = 400, description = "Invalid tier"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_tier(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::SubscriptionTiers, operation::CreateOwn>,
    Json(data): Json<SubscriptionTierCreate>,
) -> Result<(StatusCode, Json<SubscriptionTierResponse>)> {
    if data.name.trim().is_empty() {
        return Err(Error::bad_request("Tier name is required"));
    }
    validate_price(data.price)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tier = SubscriptionTiers::new(&mut pool_conn)
        .create(&TierCreateDBRequest {
            creator_id: current_user.id,
            name: data.name,
            description: data.description,
            price: data.price,
            billing_period: data.billing_period,
            perks: data.perks,
            status: data.status.unwrap_or(TierStatus::Active),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(SubscriptionTierResponse::from(tier))))
}

/// Update a subscription tier
#[utoipa::path(
    patch,
    path = "/monetization/subscription-tiers/{tier_id}",
    tag = "subscriptions",
    request_body = SubscriptionTierUpdate,
    params(("tier_id" = String, Path, description = "Tier ID")),
    responses(
        (status = 200, description = "Tier updated", body = SubscriptionTierResponse),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Tier not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_tier(
    State(state): State<AppState>,
    Path(tier_id): Path<TierId>,
    current_user: CurrentUser,
    Json(data): Json<SubscriptionTierUpdate>,
) -> Result<Json<SubscriptionTierResponse>> {
    if let Some(price) = data.price {
        validate_price(price)?;
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = SubscriptionTiers::new(&mut pool_conn);
    let tier = repo
        .get_by_id(tier_id)
        .await?
        .ok_or_else(|| Error::not_found("Subscription tier", tier_id))?;
    permissions::ensure_owner(&current_user, tier.creator_id, Resource::SubscriptionTiers, Operation::UpdateOwn)?;

    let updated = repo
        .update(
            tier_id,
            &TierUpdateDBRequest {
                name: data.name,
                description: data.description,
                price: data.price,
                billing_period: data.billing_period,
                perks: data.perks,
                status: data.status,
            },
        )
        .await?;

    Ok(Json(SubscriptionTierResponse::from(updated)))
}

/// Delete a subscription tier
#[utoipa::path(
    delete,
    path = "/monetization/subscription-tiers/{tier_id}",
    tag = "subscriptions",
    params(("tier_id" = String, Path, description = "Tier ID")),
    responses(
        (status = 204, description = "Tier deleted"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Tier not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_tier(State(state): State<AppState>, Path(tier_id): Path<TierId>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = SubscriptionTiers::new(&mut pool_conn);
    let tier = repo
        .get_by_id(tier_id)
        .await?
        .ok_or_else(|| Error::not_found("Subscription tier", tier_id))?;
    permissions::ensure_owner(&current_user, tier.creator_id, Resource::SubscriptionTiers, Operation::DeleteOwn)?;

    repo.delete(tier_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Recent subscriptions to the current creator, with analytics
#[utoipa::path(
    get,
    path = "/monetization/subscriptions",
    tag = "subscriptions",
    responses(
        (status = 200, description = "Subscriptions and analytics", body = SubscriptionsOverview),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_subscriptions(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SubscriptionsOverview>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Subscriptions::new(&mut pool_conn);
    let subscriptions = repo.list_for_creator(current_user.id, RECENT_SUBSCRIPTIONS).await?;
    let analytics = repo.analytics(current_user.id).await?;

    Ok(Json(SubscriptionsOverview {
        subscriptions: subscriptions.into_iter().map(SubscriptionResponse::from).collect(),
        analytics: analytics.into(),
    }))
}

/// Subscribe the current user to a tier
#[utoipa::path(
    post,
    path = "/monetization/subscriptions",
    tag = "subscriptions",
    request_body = SubscriptionCreate,
    responses(
        (status = 201, description = "Subscribed", body = SubscriptionResponse),
        (status = 400, description = "Invalid subscription tier"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already subscribed to this tier"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_subscription(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Subscriptions, operation::CreateOwn>,
    Json(data): Json<SubscriptionCreate>,
) -> Result<(StatusCode, Json<SubscriptionResponse>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let tier = SubscriptionTiers::new(&mut tx)
        .get_by_id(data.tier_id)
        .await?
        .filter(|tier| tier.status == TierStatus::Active)
        .ok_or_else(|| Error::bad_request("Invalid subscription tier"))?;

    if tier.creator_id == current_user.id {
        return Err(Error::bad_request("Cannot subscribe to your own tier"));
    }

    let split = revenue::split(RevenueStream::Subscription, tier.price);
    let current_period_end = Utc::now()
        .checked_add_months(Months::new(tier.billing_period.months() as u32))
        .ok_or_else(|| Error::Internal {
            operation: "compute subscription period end".to_string(),
        })?;

    let subscription = Subscriptions::new(&mut tx)
        .create(&SubscriptionCreateDBRequest {
            subscriber_id: current_user.id,
            creator_id: tier.creator_id,
            tier_id: tier.id,
            amount: split.amount,
            user_share: split.creator_share,
            platform_fee: split.platform_fee,
            current_period_end,
        })
        .await?;

    SubscriptionTiers::new(&mut tx).record_subscriber(tier.id, tier.price).await?;
    Earnings::new(&mut tx)
        .credit_earnings(
            tier.creator_id,
            RevenueStream::Subscription,
            &split,
            &format!("subscription_{}", subscription.id),
            Some(format!("Subscription to {}", tier.name)),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!("User {} subscribed to tier {}", current_user.id, tier.id);

    Ok((StatusCode::CREATED, Json(SubscriptionResponse::from(subscription))))
}

/// Change the status of one of the current user's subscriptions
#[utoipa::path(
    patch,
    path = "/monetization/subscriptions/{subscription_id}",
    tag = "subscriptions",
    request_body = SubscriptionUpdate,
    params(("subscription_id" = String, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Subscription updated", body = SubscriptionResponse),
        (status = 400, description = "Ended subscriptions cannot be reactivated"),
        (status = 401, description = "Unauthorized or not the subscriber"),
        (status = 404, description = "Subscription not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
    current_user: CurrentUser,
    Json(data): Json<SubscriptionUpdate>,
) -> Result<Json<SubscriptionResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let subscription = Subscriptions::new(&mut tx)
        .get_by_id(subscription_id)
        .await?
        .ok_or_else(|| Error::not_found("Subscription", subscription_id))?;
    permissions::ensure_owner(&current_user, subscription.subscriber_id, Resource::Subscriptions, Operation::UpdateOwn)?;

    let was_active = subscription.status == SubscriptionStatus::Active;
    let is_active = data.status == SubscriptionStatus::Active;

    // Reactivating would restore access without a new payment
    if !was_active && is_active {
        return Err(Error::bad_request("Ended subscriptions cannot be reactivated, subscribe again instead"));
    }

    Subscriptions::new(&mut tx).update_status(subscription_id, data.status).await?;
    if was_active && !is_active {
        SubscriptionTiers::new(&mut tx).remove_subscriber(subscription.tier_id).await?;
    }

    let updated = Subscriptions::new(&mut tx)
        .get_by_id(subscription_id)
        .await?
        .ok_or_else(|| Error::not_found("Subscription", subscription_id))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(SubscriptionResponse::from(updated)))
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
    async fn test_subscribe_splits_and_credits_creator(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let reader = create_test_user(&pool, Role::Creator).await;
        let creator_auth = add_auth_headers(&creator);
        let reader_auth = add_auth_headers(&reader);

        let tier: serde_json::Value = server
            .post("/api/monetization/subscription-tiers")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .json(&json!({"name": "Supporter", "price": "10.00"}))
            .await
            .json();

        let response = server
            .post("/api/monetization/subscriptions")
            .add_header(&reader_auth[0].0, &reader_auth[0].1)
            .json(&json!({"tier_id": tier["id"]}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let subscription: serde_json::Value = response.json();
        assert_eq!(subscription["user_share"], "9.00");
        assert_eq!(subscription["platform_fee"], "1.00");

        // A second active subscription to the same tier conflicts
        server
            .post("/api/monetization/subscriptions")
            .add_header(&reader_auth[0].0, &reader_auth[0].1)
            .json(&json!({"tier_id": tier["id"]}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let me: serde_json::Value = server
            .get("/api/users/current")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .await
            .json();
        assert_eq!(me["balance"]["available_balance"], "9.00");

        let overview: serde_json::Value = server
            .get("/api/monetization/subscriptions")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .await
            .json();
        assert_eq!(overview["analytics"]["total_subscribers"], 1);
        assert_eq!(overview["subscriptions"][0]["tier_name"], "Supporter");
    }

    #[sqlx::test]
    async fn test_cancelled_subscriptions_stay_cancelled(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let reader = create_test_user(&pool, Role::Brand).await;
        let creator_auth = add_auth_headers(&creator);
        let reader_auth = add_auth_headers(&reader);

        let tier: serde_json::Value = server
            .post("/api/monetization/subscription-tiers")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .json(&json!({"name": "Monthly", "price": "5.00"}))
            .await
            .json();
        let subscription: serde_json::Value = server
            .post("/api/monetization/subscriptions")
            .add_header(&reader_auth[0].0, &reader_auth[0].1)
            .json(&json!({"tier_id": tier["id"]}))
            .await
            .json();
        let path = format!("/api/monetization/subscriptions/{}", subscription["id"].as_str().unwrap());

        let cancelled: serde_json::Value = server
            .patch(&path)
            .add_header(&reader_auth[0].0, &reader_auth[0].1)
            .json(&json!({"status": "cancelled"}))
            .await
            .json();
        assert_eq!(cancelled["status"], "cancelled");

        let response = server
            .patch(&path)
            .add_header(&reader_auth[0].0, &reader_auth[0].1)
            .json(&json!({"status": "active"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<serde_json::Value>()["error"],
            "Ended subscriptions cannot be reactivated, subscribe again instead"
        );

        let tiers: serde_json::Value = server
            .get("/api/monetization/subscription-tiers")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .await
            .json();
        assert_eq!(tiers[0]["subscribers"], 0);
        assert_eq!(tiers[0]["revenue"], "5.00");
    }

    #[sqlx::test]
    async fn test_inactive_tier_is_invalid(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let reader = create_test_user(&pool, Role::Brand).await;
        let creator_auth = add_auth_headers(&creator);
        let reader_auth = add_auth_headers(&reader);

        let tier: serde_json::Value = server
            .post("/api/monetization/subscription-tiers")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .json(&json!({"name": "Retired", "price": "3.00", "status": "inactive"}))
            .await
            .json();

        let response = server
            .post("/api/monetization/subscriptions")
            .add_header(&reader_auth[0].0, &reader_auth[0].1)
            .json(&json!({"tier_id": tier["id"]}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>()["error"], "Invalid subscription tier");
    }

    #[sqlx::test]
    async fn test_only_owner_updates_tier(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let owner = create_test_user(&pool, Role::Creator).await;
        let other = create_test_user(&pool, Role::Creator).await;
        let owner_auth = add_auth_headers(&owner);
        let other_auth = add_auth_headers(&other);

        let tier: serde_json::Value = server
            .post("/api/monetization/subscription-tiers")
            .add_header(&owner_auth[0].0, &owner_auth[0].1)
            .json(&json!({"name": "Gold", "price": "20", "billing_period": "yearly"}))
            .await
            .json();
        let path = format!("/api/monetization/subscription-tiers/{}", tier["id"].as_str().unwrap());

        server
            .patch(&path)
            .add_header(&other_auth[0].0, &other_auth[0].1)
            .json(&json!({"price": "1.00"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .delete(&path)
            .add_header(&owner_auth[0].0, &owner_auth[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
