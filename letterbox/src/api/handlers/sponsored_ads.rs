//! HTTP handlers for sponsored ad campaigns.
//!
//! A brand funds a campaign by reserving its budget from available brand funds. Each tracked
//! click moves `cost_per_click` from the reservation to spent funds and credits the creator the
//! sponsored ad share. Ending a campaign early returns the unspent reservation.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        money,
        pagination::Pagination,
        sponsored_ads::{AdEvent, AdTrackRequest, CampaignCreate, CampaignResponse, CampaignUpdate, TrackResponse},
        users::{CurrentUser, Role},
    },
    auth::permissions::{self, RequiresPermission, operation, resource},
    db::{
        handlers::{BrandFunds, Earnings, Repository, SponsoredAds, Users},
        models::{brand_funds::BrandTransactionType, sponsored_ads::CampaignCreateDBRequest},
    },
    errors::{Error, Result},
    revenue::{self, RevenueStream},
    types::{CampaignId, Operation, Resource},
};

/// Campaigns placed in the creator's newsletter, or funded by the brand
#[utoipa::path(
    get,
    path = "/monetization/sponsored-ads",
    tag = "sponsored-ads",
    params(Pagination),
    responses(
        (status = 200, description = "Campaigns", body = [CampaignResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: RequiresPermission<resource::SponsoredAds, operation::ReadOwn>,
) -> Result<Json<Vec<CampaignResponse>>> {
    let (skip, limit) = pagination.params();
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = SponsoredAds::new(&mut pool_conn);
    let campaigns = match current_user.role {
        Role::Brand => repo.list_for_brand(current_user.id, skip, limit).await?,
        _ => repo.list_for_creator(current_user.id, skip, limit).await?,
    };

    Ok(Json(campaigns.into_iter().map(CampaignResponse::from).collect()))
}

/// Create a campaign and reserve its budget
#[utoipa::path(
    post,
    path = "/monetization/sponsored-ads",
    tag = "sponsored-ads",
    request_body = CampaignCreate,
    responses(
        (status = 201, description = "Campaign created", body = CampaignResponse),
        (status = 400, description = "Invalid campaign or insufficient funds"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_campaign(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::SponsoredAds, operation::CreateOwn>,
    Json(data): Json<CampaignCreate>,
) -> Result<(StatusCode, Json<CampaignResponse>)> {
    if data.campaign_name.trim().is_empty() || data.brand_name.trim().is_empty() {
        return Err(Error::bad_request("Brand and campaign names are required"));
    }
    if data.budget <= Decimal::ZERO || data.cost_per_click <= Decimal::ZERO {
        return Err(Error::bad_request("Budget and cost per click must be greater than zero"));
    }
    money::require_cents(data.budget)?;
    money::require_cents(data.cost_per_click)?;
    if data.cost_per_click > data.budget {
        return Err(Error::bad_request("Cost per click cannot exceed the budget"));
    }
    if data.end_date < data.start_date {
        return Err(Error::bad_request("End date cannot be before start date"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    match Users::new(&mut tx).get_by_id(data.creator_id).await? {
        Some(creator) if creator.role == Role::Creator => {}
        _ => return Err(Error::bad_request("Invalid creator")),
    }

    let mut funds = BrandFunds::new(&mut tx);
    funds.get_or_create(current_user.id).await?;
    if !funds.reserve(current_user.id, data.budget).await? {
        return Err(Error::bad_request("Insufficient funds"));
    }

    let campaign = SponsoredAds::new(&mut tx)
        .create(&CampaignCreateDBRequest {
            brand_id: current_user.id,
            creator_id: data.creator_id,
            brand_name: data.brand_name,
            campaign_name: data.campaign_name,
            budget: data.budget,
            cost_per_click: data.cost_per_click,
            start_date: data.start_date,
            end_date: data.end_date,
        })
        .await?;

    BrandFunds::new(&mut tx)
        .record_campaign_movement(
            current_user.id,
            campaign.id,
            BrandTransactionType::CampaignReserve,
            campaign.budget,
            format!("Budget reserved for {}", campaign.campaign_name),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!("Brand {} created campaign {} with budget {}", current_user.id, campaign.id, campaign.budget);

    Ok((StatusCode::CREATED, Json(CampaignResponse::from(campaign))))
}

/// Pause, resume, complete or cancel a campaign
#[utoipa::path(
    patch,
    path = "/monetization/sponsored-ads/{campaign_id}",
    tag = "sponsored-ads",
    request_body = CampaignUpdate,
    params(("campaign_id" = String, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign updated", body = CampaignResponse),
        (status = 400, description = "Campaign has already ended"),
        (status = 401, description = "Unauthorized or not the owning brand"),
        (status = 404, description = "Campaign not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<CampaignId>,
    current_user: CurrentUser,
    Json(data): Json<CampaignUpdate>,
) -> Result<Json<CampaignResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let campaign = SponsoredAds::new(&mut tx)
        .get_for_update(campaign_id)
        .await?
        .ok_or_else(|| Error::not_found("Campaign", campaign_id))?;
    permissions::ensure_owner(&current_user, campaign.brand_id, Resource::SponsoredAds, Operation::UpdateOwn)?;

    if campaign.status.is_terminal() {
        return Err(Error::bad_request("Campaign has already ended"));
    }

    let updated = SponsoredAds::new(&mut tx).update_status(campaign_id, data.status).await?;

    if data.status.is_terminal() {
        let remaining = campaign.remaining_budget();
        if remaining > Decimal::ZERO {
            let mut funds = BrandFunds::new(&mut tx);
            if !funds.release(campaign.brand_id, remaining).await? {
                return Err(Error::Internal {
                    operation: format!("release budget of campaign {campaign_id}"),
                });
            }
            funds
                .record_campaign_movement(
                    campaign.brand_id,
                    campaign.id,
                    BrandTransactionType::CampaignRelease,
                    remaining,
                    format!("Unspent budget released from {}", campaign.campaign_name),
                )
                .await?;
        }
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(CampaignResponse::from(updated)))
}

/// Track an impression or a click on a sponsored ad
#[utoipa::path(
    post,
    path = "/sponsored-ads/{campaign_id}/track",
    tag = "sponsored-ads",
    request_body = AdTrackRequest,
    params(("campaign_id" = String, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Event processed", body = TrackResponse),
        (status = 404, description = "Campaign not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn track_event(
    State(state): State<AppState>,
    Path(campaign_id): Path<CampaignId>,
    Json(data): Json<AdTrackRequest>,
) -> Result<Json<TrackResponse>> {
    match data.event {
        AdEvent::Impression => {
            let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            if !SponsoredAds::new(&mut pool_conn).record_impression(campaign_id).await? {
                return Err(Error::not_found("Campaign", campaign_id));
            }
            Ok(Json(TrackResponse::tracked("Impression tracked")))
        }
        AdEvent::Click => track_click(&state, campaign_id).await.map(Json),
    }
}

async fn track_click(state: &AppState, campaign_id: CampaignId) -> Result<TrackResponse> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let campaign = SponsoredAds::new(&mut tx)
        .get_for_update(campaign_id)
        .await?
        .ok_or_else(|| Error::not_found("Campaign", campaign_id))?;

    let charge = campaign.next_click_charge();
    if !campaign.is_running_on(Utc::now().date_naive()) || charge <= Decimal::ZERO {
        return Ok(TrackResponse::ignored("Campaign is not running"));
    }

    if !BrandFunds::new(&mut tx).spend(campaign.brand_id, charge).await? {
        tracing::warn!("Campaign {} has no reserved funds left for a click", campaign.id);
        return Ok(TrackResponse::ignored("Campaign has no funds left"));
    }

    let split = revenue::split(RevenueStream::SponsoredAd, charge);
    let updated = SponsoredAds::new(&mut tx).record_click(campaign.id, &split).await?;

    Earnings::new(&mut tx)
        .credit_earnings(
            campaign.creator_id,
            RevenueStream::SponsoredAd,
            &split,
            &format!("sponsored_ad_click_{}", Uuid::new_v4()),
            Some(format!("Click on {} by {}", campaign.campaign_name, campaign.brand_name)),
        )
        .await?;

    BrandFunds::new(&mut tx)
        .record_campaign_movement(
            campaign.brand_id,
            campaign.id,
            BrandTransactionType::CampaignSpend,
            charge,
            format!("Click on {}", campaign.campaign_name),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if updated.status.is_terminal() {
        tracing::info!("Campaign {} spent its budget and completed", updated.id);
    }
    Ok(TrackResponse::tracked("Click tracked"))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::Role,
        db::handlers::BrandFunds,
        test_utils::{add_auth_headers, create_test_app, create_test_config, create_test_user},
    };
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;

    async fn fund_brand(pool: &PgPool, brand_id: uuid::Uuid, amount: i64) {
        let mut conn = pool.acquire().await.unwrap();
        BrandFunds::new(&mut conn)
            .record_deposit(brand_id, Decimal::from(amount), "Credit Card (New)", &format!("pi_test_{brand_id}"))
            .await
            .unwrap();
    }

    fn campaign_body(creator_id: uuid::Uuid, budget: &str, cpc: &str) -> serde_json::Value {
        let today = Utc::now().date_naive();
        json!({
            "creator_id": creator_id,
            "brand_name": "Acme",
            "campaign_name": "Launch",
            "budget": budget,
            "cost_per_click": cpc,
            "start_date": today - Duration::days(1),
            "end_date": today + Duration::days(7),
        })
    }

    #[sqlx::test]
    async fn test_campaign_requires_funds(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let brand = create_test_user(&pool, Role::Brand).await;
        let auth = add_auth_headers(&brand);

        let response = server
            .post("/api/monetization/sponsored-ads")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&campaign_body(creator.id, "50", "1"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>()["error"], "Insufficient funds");

        // Creators cannot buy ads
        let creator_auth = add_auth_headers(&creator);
        server
            .post("/api/monetization/sponsored-ads")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .json(&campaign_body(creator.id, "50", "1"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_clicks_charge_brand_and_credit_creator_until_budget_runs_out(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let brand = create_test_user(&pool, Role::Brand).await;
        let brand_auth = add_auth_headers(&brand);
        let creator_auth = add_auth_headers(&creator);
        fund_brand(&pool, brand.id, 100).await;

        let campaign: serde_json::Value = server
            .post("/api/monetization/sponsored-ads")
            .add_header(&brand_auth[0].0, &brand_auth[0].1)
            .json(&campaign_body(creator.id, "5.00", "2.00"))
            .await
            .json();
        let track = format!("/api/sponsored-ads/{}/track", campaign["id"].as_str().unwrap());

        server.post(&track).json(&json!({"type": "impression"})).await.assert_status_ok();
        for _ in 0..3 {
            let body: serde_json::Value = server.post(&track).json(&json!({"type": "click"})).await.json();
            assert_eq!(body["tracked"], true);
        }
        // Budget is exhausted after 2.00 + 2.00 + 1.00
        let body: serde_json::Value = server.post(&track).json(&json!({"type": "click"})).await.json();
        assert_eq!(body["tracked"], false);

        let campaigns: serde_json::Value = server
            .get("/api/monetization/sponsored-ads")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .await
            .json();
        assert_eq!(campaigns[0]["status"], "completed");
        assert_eq!(campaigns[0]["clicks"], 3);
        assert_eq!(campaigns[0]["impressions"], 1);
        assert_eq!(campaigns[0]["user_share"], "4.00");

        let me: serde_json::Value = server
            .get("/api/users/current")
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .await
            .json();
        assert_eq!(me["balance"]["available_balance"], "4.00");

        let funds: serde_json::Value = server
            .get("/api/brand/funds")
            .add_header(&brand_auth[0].0, &brand_auth[0].1)
            .await
            .json();
        assert_eq!(funds["balance_stats"]["available_balance"], "95.00");
        assert_eq!(funds["balance_stats"]["pending_balance"], "0.00");
        assert_eq!(funds["balance_stats"]["total_spent"], "5.00");
    }

    #[sqlx::test]
    async fn test_cancelling_releases_unspent_budget(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let brand = create_test_user(&pool, Role::Brand).await;
        let other_brand = create_test_user(&pool, Role::Brand).await;
        let brand_auth = add_auth_headers(&brand);
        let other_auth = add_auth_headers(&other_brand);
        fund_brand(&pool, brand.id, 30).await;

        let campaign: serde_json::Value = server
            .post("/api/monetization/sponsored-ads")
            .add_header(&brand_auth[0].0, &brand_auth[0].1)
            .json(&campaign_body(creator.id, "20", "1"))
            .await
            .json();
        let id = campaign["id"].as_str().unwrap();
        server
            .post(&format!("/api/sponsored-ads/{id}/track"))
            .json(&json!({"type": "click"}))
            .await
            .assert_status_ok();

        let path = format!("/api/monetization/sponsored-ads/{id}");
        server
            .patch(&path)
            .add_header(&other_auth[0].0, &other_auth[0].1)
            .json(&json!({"status": "cancelled"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .patch(&path)
            .add_header(&brand_auth[0].0, &brand_auth[0].1)
            .json(&json!({"status": "cancelled"}))
            .await
            .assert_status_ok();

        let funds: serde_json::Value = server
            .get("/api/brand/funds")
            .add_header(&brand_auth[0].0, &brand_auth[0].1)
            .await
            .json();
        assert_eq!(funds["balance_stats"]["available_balance"], "29.00");
        assert_eq!(funds["balance_stats"]["pending_balance"], "0.00");

        server
            .patch(&path)
            .add_header(&brand_auth[0].0, &brand_auth[0].1)
            .json(&json!({"status": "active"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
