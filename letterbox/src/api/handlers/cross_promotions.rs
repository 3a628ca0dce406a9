//! HTTP handlers for cross-promotions between newsletters.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        cross_promotions::{PromotionCreate, PromotionEvent, PromotionResponse, PromotionTrackRequest, PromotionUpdate},
        money,
        pagination::Pagination,
        sponsored_ads::TrackResponse,
        users::CurrentUser,
    },
    auth::permissions::{self, RequiresPermission, operation, resource},
    db::{
        handlers::{CrossPromotions, Earnings, OwnerFilter, Repository},
        models::cross_promotions::{PromotionCreateDBRequest, PromotionStatus, PromotionUpdateDBRequest},
    },
    errors::{Error, Result},
    revenue::{self, RevenueStream},
    types::{Operation, Resource},
};

fn validate_revenue_per_click(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::bad_request("Revenue per click must be greater than zero"));
    }
    money::require_cents(amount)?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/monetization/cross-promotions",
    tag = "cross-promotions",
    params(Pagination),
    responses(
        (status = 200, description = "Cross-promotions", body = [PromotionResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_promotions(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: RequiresPermission<resource::CrossPromotions, operation::ReadOwn>,
) -> Result<Json<Vec<PromotionResponse>>> {
    let (skip, limit) = pagination.params();
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let promotions = CrossPromotions::new(&mut pool_conn)
        .list(&OwnerFilter::new(current_user.id, skip, limit))
        .await?;

    Ok(Json(promotions.into_iter().map(PromotionResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/monetization/cross-promotions",
    tag = "cross-promotions",
    request_body = PromotionCreate,
    responses(
        (status = 201, description = "Cross-promotion created", body = PromotionResponse),
        (status = 400, description = "Invalid cross-promotion"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_promotion(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::CrossPromotions, operation::CreateOwn>,
    Json(data): Json<PromotionCreate>,
) -> Result<(StatusCode, Json<PromotionResponse>)> {
    if data.newsletter_name.trim().is_empty() {
        return Err(Error::bad_request("Newsletter name is required"));
    }
    validate_revenue_per_click(data.revenue_per_click)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let promotion = CrossPromotions::new(&mut pool_conn)
        .create(&PromotionCreateDBRequest {
            creator_id: current_user.id,
            newsletter_name: data.newsletter_name,
            description: data.description,
            revenue_per_click: data.revenue_per_click,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PromotionResponse::from(promotion))))
}

#[utoipa::path(
    patch,
    path = "/monetization/cross-promotions/{promotion_id}",
    tag = "cross-promotions",
    request_body = PromotionUpdate,
    params(("promotion_id" = String, Path, description = "Cross-promotion ID")),
    responses(
        (status = 200, description = "Cross-promotion updated", body = PromotionResponse),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Cross-promotion not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_promotion(
    State(state): State<AppState>,
    Path(promotion_id): Path<Uuid>,
    current_user: CurrentUser,
    Json(data): Json<PromotionUpdate>,
) -> Result<Json<PromotionResponse>> {
    if let Some(amount) = data.revenue_per_click {
        validate_revenue_per_click(amount)?;
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = CrossPromotions::new(&mut pool_conn);
    let promotion = repo
        .get_by_id(promotion_id)
        .await?
        .ok_or_else(|| Error::not_found("Cross-promotion", promotion_id))?;
    permissions::ensure_owner(&current_user, promotion.creator_id, Resource::CrossPromotions, Operation::UpdateOwn)?;

    let updated = repo
        .update(
            promotion_id,
            &PromotionUpdateDBRequest {
                newsletter_name: data.newsletter_name,
                description: data.description,
                revenue_per_click: data.revenue_per_click,
                status: data.status,
            },
        )
        .await?;

    Ok(Json(PromotionResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/monetization/cross-promotions/{promotion_id}",
    tag = "cross-promotions",
    params(("promotion_id" = String, Path, description = "Cross-promotion ID")),
    responses(
        (status = 204, description = "Cross-promotion deleted"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Cross-promotion not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_promotion(State(state): State<AppState>, Path(promotion_id): Path<Uuid>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = CrossPromotions::new(&mut pool_conn);
    let promotion = repo
        .get_by_id(promotion_id)
        .await?
        .ok_or_else(|| Error::not_found("Cross-promotion", promotion_id))?;
    permissions::ensure_owner(&current_user, promotion.creator_id, Resource::CrossPromotions, Operation::DeleteOwn)?;

    repo.delete(promotion_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Track a click or a subscriber gained through a cross-promotion
#[utoipa::path(
    post,
    path = "/cross-promotions/{promotion_id}/track",
    tag = "cross-promotions",
    request_body = PromotionTrackRequest,
    params(("promotion_id" = String, Path, description = "Cross-promotion ID")),
    responses(
        (status = 200, description = "Event processed", body = TrackResponse),
        (status = 404, description = "Cross-promotion not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn track_event(
    State(state): State<AppState>,
    Path(promotion_id): Path<Uuid>,
    Json(data): Json<PromotionTrackRequest>,
) -> Result<Json<TrackResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let promotion = CrossPromotions::new(&mut tx)
        .get_by_id(promotion_id)
        .await?
        .ok_or_else(|| Error::not_found("Cross-promotion", promotion_id))?;
    if promotion.status != PromotionStatus::Active {
        return Ok(Json(TrackResponse::ignored("Cross-promotion is not active")));
    }

    let response = match data.event {
        PromotionEvent::Subscribe => match CrossPromotions::new(&mut tx).record_subscriber(promotion_id).await? {
            Some(_) => TrackResponse::tracked("Subscriber tracked"),
            None => TrackResponse::ignored("Cross-promotion is not active"),
        },
        PromotionEvent::Click => {
            let split = revenue::split(RevenueStream::CrossPromotion, promotion.revenue_per_click);
            match CrossPromotions::new(&mut tx).record_click(promotion_id, &split).await? {
                Some(_) => {
                    Earnings::new(&mut tx)
                        .credit_earnings(
                            promotion.creator_id,
                            RevenueStream::CrossPromotion,
                            &split,
                            &format!("cross_promotion_click_{}", Uuid::new_v4()),
                            Some(format!("Click on cross-promotion for {}", promotion.newsletter_name)),
                        )
                        .await?;
                    TrackResponse::tracked("Click tracked")
                }
                None => TrackResponse::ignored("Cross-promotion is not active"),
            }
        }
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(response))
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
    async fn test_clicks_credit_owner_and_subscribers_are_counted(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let auth = add_auth_headers(&creator);

        let promotion: serde_json::Value = server
            .post("/api/monetization/cross-promotions")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"newsletter_name": "The Weekly Byte", "revenue_per_click": "0.50"}))
            .await
            .json();
        let track = format!("/api/cross-promotions/{}/track", promotion["id"].as_str().unwrap());

        server.post(&track).json(&json!({"type": "click"})).await.assert_status_ok();
        server.post(&track).json(&json!({"type": "click"})).await.assert_status_ok();
        server.post(&track).json(&json!({"type": "subscribe"})).await.assert_status_ok();

        let promotions: serde_json::Value = server
            .get("/api/monetization/cross-promotions")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(promotions[0]["clicks"], 2);
        assert_eq!(promotions[0]["subscribers"], 1);
        assert_eq!(promotions[0]["revenue"], "1.00");
        assert_eq!(promotions[0]["user_share"], "0.80");

        let me: serde_json::Value = server.get("/api/users/current").add_header(&auth[0].0, &auth[0].1).await.json();
        assert_eq!(me["balance"]["available_balance"], "0.80");
    }

    #[sqlx::test]
    async fn test_paused_promotion_ignores_clicks(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let auth = add_auth_headers(&creator);

        let promotion: serde_json::Value = server
            .post("/api/monetization/cross-promotions")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"newsletter_name": "Dispatch", "revenue_per_click": "1"}))
            .await
            .json();
        let id = promotion["id"].as_str().unwrap();

        server
            .patch(&format!("/api/monetization/cross-promotions/{id}"))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"status": "paused"}))
            .await
            .assert_status_ok();

        let body: serde_json::Value = server
            .post(&format!("/api/cross-promotions/{id}/track"))
            .json(&json!({"type": "click"}))
            .await
            .json();
        assert_eq!(body["tracked"], false);

        server
            .post(&format!("/api/cross-promotions/{}/track", uuid::Uuid::new_v4()))
            .json(&json!({"type": "click"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
