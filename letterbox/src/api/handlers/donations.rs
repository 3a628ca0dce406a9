//! HTTP handlers for tips, donations and donation tiers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use sqlx::{Connection, PgConnection};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        donations::{
            CreatorDonationTiers, DonationCreate, DonationCreator, DonationResponse, DonationTierCreate, DonationTierResponse,
            DonationTierUpdate, DonationUpdate, DonationsOverview, PublicDonationRequest, PublicDonationResponse,
        },
        money,
        pagination::Pagination,
        users::CurrentUser,
    },
    auth::permissions::{self, RequiresPermission, operation, resource},
    db::{
        handlers::{DonationTiers, Donations, Earnings, OwnerFilter, Repository, Users},
        models::{
            donations::{DonationCreateDBRequest, DonationDBResponse, DonationTierCreateDBRequest, DonationTierUpdateDBRequest, DonationUpdateDBRequest},
            subscriptions::TierStatus,
        },
    },
    errors::{Error, Result},
    revenue::{self, RevenueStream},
    types::{Operation, Resource, TierId, UserId, UserIdOrUsername},
};

/// Everything needed to record one donation, once the request has been validated
struct NewDonation {
    donor_id: Option<UserId>,
    donor_name: Option<String>,
    donor_email: Option<String>,
    recipient_id: UserId,
    tier_id: Option<TierId>,
    amount: Decimal,
    message: Option<String>,
    is_anonymous: bool,
}

/// Check that an optional tier belongs to the recipient.
async fn check_tier(conn: &mut PgConnection, tier_id: Option<TierId>, recipient_id: UserId) -> Result<()> {
    let Some(tier_id) = tier_id else {
        return Ok(());
    };
    match DonationTiers::new(conn).get_by_id(tier_id).await? {
        Some(tier) if tier.creator_id == recipient_id => Ok(()),
        _ => Err(Error::bad_request("Invalid donation tier")),
    }
}

/// Insert the donation with the donation split and credit the recipient.
///
/// The recipient's donation counters are best effort: a failure there is logged and rolled back
/// on its own savepoint without failing the donation.
async fn record_donation(conn: &mut PgConnection, donation: NewDonation) -> Result<DonationDBResponse> {
    let split = revenue::split(RevenueStream::Donation, donation.amount);

    let mut tx = conn.begin().await.map_err(|e| Error::Database(e.into()))?;
    let created = Donations::new(&mut tx)
        .create(&DonationCreateDBRequest {
            donor_id: donation.donor_id,
            donor_name: donation.donor_name,
            donor_email: donation.donor_email,
            recipient_id: donation.recipient_id,
            tier_id: donation.tier_id,
            amount: split.amount,
            user_share: split.creator_share,
            platform_fee: split.platform_fee,
            message: donation.message,
            is_anonymous: donation.is_anonymous,
        })
        .await?;

    if let Some(tier_id) = created.tier_id {
        DonationTiers::new(&mut tx).record_donor(tier_id).await?;
    }

    Earnings::new(&mut tx)
        .credit_earnings(
            created.recipient_id,
            RevenueStream::Donation,
            &split,
            &format!("donation_{}", created.id),
            Some("Donation received".to_string()),
        )
        .await?;

    let mut savepoint = Connection::begin(&mut *tx).await.map_err(|e| Error::Database(e.into()))?;
    match Users::new(&mut savepoint).record_donation_received(created.recipient_id, created.amount).await {
        Ok(()) => savepoint.commit().await.map_err(|e| Error::Database(e.into()))?,
        Err(e) => {
            warn!("Failed to update donation stats for {}: {}", created.recipient_id, e);
            savepoint.rollback().await.map_err(|e| Error::Database(e.into()))?;
        }
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!("Recorded donation {} of {} to {}", created.id, created.amount, created.recipient_id);
    Ok(created)
}

/// Donations received by the current user, with analytics
#[utoipa::path(
    get,
    path = "/monetization/donations",
    tag = "donations",
    params(Pagination),
    responses(
        (status = 200, description = "Donations and analytics", body = DonationsOverview),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_donations(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: CurrentUser,
) -> Result<Json<DonationsOverview>> {
    let (skip, limit) = pagination.params();
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Donations::new(&mut pool_conn);
    let donations = repo.list_received(&OwnerFilter::new(current_user.id, skip, limit)).await?;
    let analytics = repo.analytics(current_user.id).await?;

    Ok(Json(DonationsOverview {
        donations: donations.into_iter().map(DonationResponse::from).collect(),
        analytics: analytics.into(),
    }))
}

/// Donate to a creator as the signed-in user
#[utoipa::path(
    post,
    path = "/monetization/donations",
    tag = "donations",
    request_body = DonationCreate,
    responses(
        (status = 201, description = "Donation recorded", body = DonationResponse),
        (status = 400, description = "Amount and recipient are required"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipient not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_donation(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Donations, operation::CreateOwn>,
    Json(data): Json<DonationCreate>,
) -> Result<(StatusCode, Json<DonationResponse>)> {
    let (amount, recipient_id) = match (data.amount, data.recipient_id) {
        (Some(amount), Some(recipient_id)) if amount > Decimal::ZERO => (amount, recipient_id),
        _ => return Err(Error::bad_request("Amount and recipient are required")),
    };
    money::require_cents(amount)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let donor = Users::new(&mut pool_conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("User", current_user.id))?;
    if Users::new(&mut pool_conn).get_by_id(recipient_id).await?.is_none() {
        return Err(Error::not_found("Recipient", recipient_id));
    }
    check_tier(&mut pool_conn, data.tier_id, recipient_id).await?;

    let donation = record_donation(
        &mut pool_conn,
        NewDonation {
            donor_id: Some(donor.id),
            donor_name: Some(donor.display_name.unwrap_or(donor.username)),
            donor_email: Some(donor.email),
            recipient_id,
            tier_id: data.tier_id,
            amount,
            message: data.message,
            is_anonymous: data.is_anonymous,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(DonationResponse::from(donation))))
}

/// Edit the message or visibility of a donation the current user made
#[utoipa::path(
    patch,
    path = "/monetization/donations/{donation_id}",
    tag = "donations",
    request_body = DonationUpdate,
    params(("donation_id" = String, Path, description = "Donation ID")),
    responses(
        (status = 200, description = "Donation updated", body = DonationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Donation not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    current_user: RequiresPermission<resource::Donations, operation::UpdateOwn>,
    Json(data): Json<DonationUpdate>,
) -> Result<Json<DonationResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let donation = Donations::new(&mut pool_conn)
        .update_for_donor(
            donation_id,
            current_user.id,
            &DonationUpdateDBRequest {
                message: data.message,
                is_anonymous: data.is_anonymous,
            },
        )
        .await?
        .ok_or_else(|| Error::not_found("Donation", donation_id))?;

    Ok(Json(DonationResponse::from(donation)))
}

/// Delete a donation the current user made
#[utoipa::path(
    delete,
    path = "/monetization/donations/{donation_id}",
    tag = "donations",
    params(("donation_id" = String, Path, description = "Donation ID")),
    responses(
        (status = 204, description = "Donation deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Donation not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    current_user: RequiresPermission<resource::Donations, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Donations::new(&mut pool_conn).delete_for_donor(donation_id, current_user.id).await? {
        return Err(Error::not_found("Donation", donation_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Donate from a public creator page, without an account
#[utoipa::path(
    post,
    path = "/donations/process",
    tag = "donations",
    request_body = PublicDonationRequest,
    responses(
        (status = 200, description = "Donation processed", body = PublicDonationResponse),
        (status = 400, description = "Missing fields, invalid amount or tier"),
        (status = 404, description = "Recipient not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn process_public_donation(
    State(state): State<AppState>,
    Json(data): Json<PublicDonationRequest>,
) -> Result<Json<PublicDonationResponse>> {
    let (Some(amount), Some(recipient_id), Some(donor_name), Some(donor_email)) =
        (data.amount, data.recipient_id, data.donor_name, data.donor_email)
    else {
        return Err(Error::bad_request("Missing required fields"));
    };
    if amount <= Decimal::ZERO {
        return Err(Error::bad_request("Invalid donation amount"));
    }
    money::require_cents(amount)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Users::new(&mut pool_conn).get_by_id(recipient_id).await?.is_none() {
        return Err(Error::not_found("Recipient", recipient_id));
    }
    check_tier(&mut pool_conn, data.tier_id, recipient_id).await?;

    let donation = record_donation(
        &mut pool_conn,
        NewDonation {
            donor_id: None,
            donor_name: Some(donor_name),
            donor_email: Some(donor_email),
            recipient_id,
            tier_id: data.tier_id,
            amount,
            message: data.message,
            is_anonymous: data.is_anonymous,
        },
    )
    .await?;

    Ok(Json(PublicDonationResponse {
        message: "Donation processed successfully".to_string(),
        donation: DonationResponse::from(donation),
    }))
}

/// Active donation tiers of a creator, addressed by id or username
#[utoipa::path(
    get,
    path = "/donations/creator/{creator}",
    tag = "donations",
    params(("creator" = String, Path, description = "Creator ID or username")),
    responses(
        (status = 200, description = "Creator and their donation tiers", body = CreatorDonationTiers),
        (status = 404, description = "Creator not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_creator_tiers(State(state): State<AppState>, Path(creator): Path<UserIdOrUsername>) -> Result<Json<CreatorDonationTiers>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut pool_conn);
    let user = match &creator {
        UserIdOrUsername::Id(id) => match users.get_by_id(*id).await? {
            Some(user) => Some(user),
            // A username may itself look like a UUID
            None => users.get_user_by_username(&id.to_string()).await?,
        },
        UserIdOrUsername::Username(username) => users.get_user_by_username(username).await?,
    };
    let user = user.ok_or_else(|| Error::NotFound {
        resource: "Creator".to_string(),
        id: match creator {
            UserIdOrUsername::Id(id) => id.to_string(),
            UserIdOrUsername::Username(username) => username,
        },
    })?;

    let tiers = DonationTiers::new(&mut pool_conn).list_active_for_creator(user.id).await?;

    Ok(Json(CreatorDonationTiers {
        creator: DonationCreator::from(user),
        tiers: tiers.into_iter().map(DonationTierResponse::from).collect(),
    }))
}

/// List the current creator's donation tiers
#[utoipa::path(
    get,
    path = "/monetization/donation-tiers",
    tag = "donations",
    params(Pagination),
    responses(
        (status = 200, description = "Donation tiers", body = [DonationTierResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_donation_tiers(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: RequiresPermission<resource::DonationTiers, operation::ReadOwn>,
) -> Result<Json<Vec<DonationTierResponse>>> {
    let (skip, limit) = pagination.params();
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tiers = DonationTiers::new(&mut pool_conn)
        .list(&OwnerFilter::new(current_user.id, skip, limit))
        .await?;

    Ok(Json(tiers.into_iter().map(DonationTierResponse::from).collect()))
}

/// Create a donation tier
#[utoipa::path(
    post,
    path = "/monetization/donation-tiers",
    tag = "donations",
    request_body = DonationTierCreate,
    responses(
        (status = 201, description = "Tier created", body = DonationTierResponse),
        (status = 400, description = "Invalid tier"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_donation_tier(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::DonationTiers, operation::CreateOwn>,
    Json(data): Json<DonationTierCreate>,
) -> Result<(StatusCode, Json<DonationTierResponse>)> {
    if data.name.trim().is_empty() {
        return Err(Error::bad_request("Tier name is required"));
    }
    if data.amount <= Decimal::ZERO {
        return Err(Error::bad_request("Amount must be greater than zero"));
    }
    money::require_cents(data.amount)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tier = DonationTiers::new(&mut pool_conn)
        .create(&DonationTierCreateDBRequest {
            creator_id: current_user.id,
            name: data.name,
            amount: data.amount,
            description: data.description,
            perks: data.perks,
            status: data.status.unwrap_or(TierStatus::Active),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DonationTierResponse::from(tier))))
}

/// Update a donation tier
#[utoipa::path(
    patch,
    path = "/monetization/donation-tiers/{tier_id}",
    tag = "donations",
    request_body = DonationTierUpdate,
    params(("tier_id" = String, Path, description = "Tier ID")),
    responses(
        (status = 200, description = "Tier updated", body = DonationTierResponse),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Tier not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_donation_tier(
    State(state): State<AppState>,
    Path(tier_id): Path<TierId>,
    current_user: CurrentUser,
    Json(data): Json<DonationTierUpdate>,
) -> Result<Json<DonationTierResponse>> {
    if data.amount.is_some_and(|amount| amount <= Decimal::ZERO) {
        return Err(Error::bad_request("Amount must be greater than zero"));
    }
    money::require_cents_opt(data.amount)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = DonationTiers::new(&mut pool_conn);
    let tier = repo
        .get_by_id(tier_id)
        .await?
        .ok_or_else(|| Error::not_found("Donation tier", tier_id))?;
    permissions::ensure_owner(&current_user, tier.creator_id, Resource::DonationTiers, Operation::UpdateOwn)?;

    let updated = repo
        .update(
            tier_id,
            &DonationTierUpdateDBRequest {
                name: data.name,
                amount: data.amount,
                description: data.description,
                perks: data.perks,
                status: data.status,
            },
        )
        .await?;

    Ok(Json(DonationTierResponse::from(updated)))
}

/// Delete a donation tier
#[utoipa::path(
    delete,
    path = "/monetization/donation-tiers/{tier_id}",
    tag = "donations",
    params(("tier_id" = String, Path, description = "Tier ID")),
    responses(
        (status = 204, description = "Tier deleted"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Tier not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_donation_tier(State(state): State<AppState>, Path(tier_id): Path<TierId>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = DonationTiers::new(&mut pool_conn);
    let tier = repo
        .get_by_id(tier_id)
        .await?
        .ok_or_else(|| Error::not_found("Donation tier", tier_id))?;
    permissions::ensure_owner(&current_user, tier.creator_id, Resource::DonationTiers, Operation::DeleteOwn)?;

    repo.delete(tier_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::Role,
        test_utils::{add_auth_headers, create_test_app, create_test_config, create_test_state, create_test_user},
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::PgPool;

    #[tokio::test]
    async fn test_public_donation_validates_before_touching_the_database() {
        // The lazy pool points at nothing, so any query would fail with a 500
        let state = create_test_state(create_test_config());
        let server = TestServer::new(crate::build_router(state).unwrap()).unwrap();

        let response = server
            .post("/api/donations/process")
            .json(&json!({"amount": "5.00", "donor_name": "Ada", "donor_email": "ada@example.com"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>()["error"], "Missing required fields");

        let response = server
            .post("/api/donations/process")
            .json(&json!({
                "amount": "-1",
                "recipient_id": uuid::Uuid::new_v4(),
                "donor_name": "Ada",
                "donor_email": "ada@example.com",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>()["error"], "Invalid donation amount");
    }

    #[sqlx::test]
    async fn test_public_donation_credits_recipient(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let auth = add_auth_headers(&creator);

        let response = server
            .post("/api/donations/process")
            .json(&json!({
                "amount": "20.00",
                "recipient_id": creator.id,
                "donor_name": "Ada",
                "donor_email": "ada@example.com",
                "message": "Keep writing",
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["donation"]["user_share"], "18.00");
        assert_eq!(body["donation"]["platform_fee"], "2.00");

        let overview: serde_json::Value = server
            .get("/api/monetization/donations")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(overview["analytics"]["total_donations"], 1);
        assert_eq!(overview["analytics"]["unique_donors"], 1);

        let me: serde_json::Value = server.get("/api/users/current").add_header(&auth[0].0, &auth[0].1).await.json();
        assert_eq!(me["balance"]["available_balance"], "18.00");
    }

    #[sqlx::test]
    async fn test_public_donation_rejects_unknown_recipient_and_foreign_tier(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let other = create_test_user(&pool, Role::Creator).await;
        let other_auth = add_auth_headers(&other);

        let body = json!({
            "amount": "5",
            "recipient_id": uuid::Uuid::new_v4(),
            "donor_name": "Ada",
            "donor_email": "ada@example.com",
        });
        server.post("/api/donations/process").json(&body).await.assert_status(StatusCode::NOT_FOUND);

        let tier: serde_json::Value = server
            .post("/api/monetization/donation-tiers")
            .add_header(&other_auth[0].0, &other_auth[0].1)
            .json(&json!({"name": "Coffee", "amount": "5"}))
            .await
            .json();

        let response = server
            .post("/api/donations/process")
            .json(&json!({
                "amount": "5",
                "recipient_id": creator.id,
                "donor_name": "Ada",
                "donor_email": "ada@example.com",
                "tier_id": tier["id"],
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>()["error"], "Invalid donation tier");
    }

    #[sqlx::test]
    async fn test_creator_tiers_by_username_sorted_by_amount(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let auth = add_auth_headers(&creator);

        for (name, amount) in [("Lunch", "15"), ("Coffee", "5")] {
            server
                .post("/api/monetization/donation-tiers")
                .add_header(&auth[0].0, &auth[0].1)
                .json(&json!({"name": name, "amount": amount}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = server.get(&format!("/api/donations/creator/{}", creator.username)).await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["creator"]["id"], creator.id.to_string());
        assert_eq!(body["tiers"][0]["name"], "Coffee");
        assert_eq!(body["tiers"][1]["name"], "Lunch");

        server
            .get(&format!("/api/donations/creator/{}", creator.id))
            .await
            .assert_status_ok();
        server
            .get("/api/donations/creator/nobody-by-this-name")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    async fn test_donation_edits_are_scoped_to_the_donor(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let donor = create_test_user(&pool, Role::Brand).await;
        let donor_auth = add_auth_headers(&donor);
        let creator_auth = add_auth_headers(&creator);

        server
            .post("/api/monetization/donations")
            .add_header(&donor_auth[0].0, &donor_auth[0].1)
            .json(&json!({"recipient_id": creator.id}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let donation: serde_json::Value = server
            .post("/api/monetization/donations")
            .add_header(&donor_auth[0].0, &donor_auth[0].1)
            .json(&json!({"amount": "10", "recipient_id": creator.id, "is_anonymous": true}))
            .await
            .json();
        assert!(donation["donor_id"].is_null());
        let path = format!("/api/monetization/donations/{}", donation["id"].as_str().unwrap());

        server
            .patch(&path)
            .add_header(&creator_auth[0].0, &creator_auth[0].1)
            .json(&json!({"message": "not mine"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let updated: serde_json::Value = server
            .patch(&path)
            .add_header(&donor_auth[0].0, &donor_auth[0].1)
            .json(&json!({"message": "Thanks!", "is_anonymous": false}))
            .await
            .json();
        assert_eq!(updated["message"], "Thanks!");
        assert_eq!(updated["donor_id"], donor.id.to_string());

        server
            .delete(&path)
            .add_header(&donor_auth[0].0, &donor_auth[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
