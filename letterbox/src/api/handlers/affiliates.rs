//! HTTP handlers for the affiliate program: links, referrals and the referral landing redirect.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        affiliates::{
            AffiliateEvent, AffiliateLinkCreate, AffiliateLinkResponse, AffiliateLinkUpdate, AffiliateTrackRequest, ListReferralsQuery,
            ReferralResponse, SignupQuery,
        },
        money,
        pagination::Pagination,
        sponsored_ads::TrackResponse,
        users::CurrentUser,
    },
    auth::{
        permissions::{self, RequiresPermission, operation, resource},
        session,
    },
    crypto,
    db::{
        handlers::{AffiliateLinks, Earnings, OwnerFilter, Referrals, Repository, affiliates::CODE_CONSTRAINT},
        models::{
            affiliates::{LinkCreateDBRequest, LinkUpdateDBRequest, ReferralCreateDBRequest, ReferralStatus},
            subscriptions::TierStatus,
        },
    },
    errors::{Error, Result},
    revenue::{self, RevenueStream},
    types::{Operation, Resource},
};

/// Attempts at drawing an unused random code before giving up
const CODE_ATTEMPTS: usize = 5;

/// Custom codes: 3 to 32 letters, digits, `-` or `_`.
fn validate_code(code: &str) -> Result<()> {
    let valid_chars = code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !(3..=32).contains(&code.len()) || !valid_chars {
        return Err(Error::bad_request(
            "Affiliate code must be 3 to 32 letters, digits, dashes or underscores",
        ));
    }
    Ok(())
}

fn validate_target_url(target_url: &str) -> Result<()> {
    match url::Url::parse(target_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(Error::bad_request("Target URL must be an http or https URL")),
    }
}

#[utoipa::path(
    get,
    path = "/monetization/affiliate-links",
    tag = "affiliates",
    params(Pagination),
    responses(
        (status = 200, description = "Affiliate links", body = [AffiliateLinkResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_links(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: RequiresPermission<resource::AffiliateLinks, operation::ReadOwn>,
) -> Result<Json<Vec<AffiliateLinkResponse>>> {
    let (skip, limit) = pagination.params();
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let links = AffiliateLinks::new(&mut pool_conn)
        .list(&OwnerFilter::new(current_user.id, skip, limit))
        .await?;

    Ok(Json(links.into_iter().map(AffiliateLinkResponse::from).collect()))
}

/// Create an affiliate link; a code is generated when none is given
#[utoipa::path(
    post,
    path = "/monetization/affiliate-links",
    tag = "affiliates",
    request_body = AffiliateLinkCreate,
    responses(
        (status = 201, description = "Link created", body = AffiliateLinkResponse),
        (status = 400, description = "Invalid code or target URL"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Code already taken"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_link(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::AffiliateLinks, operation::CreateOwn>,
    Json(data): Json<AffiliateLinkCreate>,
) -> Result<(StatusCode, Json<AffiliateLinkResponse>)> {
    validate_target_url(&data.target_url)?;
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = AffiliateLinks::new(&mut pool_conn);

    if let Some(code) = data.code {
        validate_code(&code)?;
        let link = repo
            .create(&LinkCreateDBRequest {
                owner_id: current_user.id,
                code,
                target_url: data.target_url,
            })
            .await?;
        return Ok((StatusCode::CREATED, Json(AffiliateLinkResponse::from(link))));
    }

    for _ in 0..CODE_ATTEMPTS {
        let request = LinkCreateDBRequest {
            owner_id: current_user.id,
            code: crypto::generate_affiliate_code(),
            target_url: data.target_url.clone(),
        };
        match repo.create(&request).await {
            Ok(link) => return Ok((StatusCode::CREATED, Json(AffiliateLinkResponse::from(link)))),
            Err(e) if e.is_unique_violation_of(CODE_CONSTRAINT) => {
                warn!("Generated affiliate code {} collided, retrying", request.code);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Internal {
        operation: "generate a unique affiliate code".to_string(),
    })
}

#[utoipa::path(
    patch,
    path = "/monetization/affiliate-links/{link_id}",
    tag = "affiliates",
    request_body = AffiliateLinkUpdate,
    params(("link_id" = String, Path, description = "Link ID")),
    responses(
        (status = 200, description = "Link updated", body = AffiliateLinkResponse),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Link not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_link(
    State(state): State<AppState>,
    Path(link_id): Path<Uuid>,
    current_user: CurrentUser,
    Json(data): Json<AffiliateLinkUpdate>,
) -> Result<Json<AffiliateLinkResponse>> {
    if let Some(target_url) = &data.target_url {
        validate_target_url(target_url)?;
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = AffiliateLinks::new(&mut pool_conn);
    let link = repo
        .get_by_id(link_id)
        .await?
        .ok_or_else(|| Error::not_found("Affiliate link", link_id))?;
    permissions::ensure_owner(&current_user, link.owner_id, Resource::AffiliateLinks, Operation::UpdateOwn)?;

    let updated = repo
        .update(
            link_id,
            &LinkUpdateDBRequest {
                target_url: data.target_url,
                status: data.status,
            },
        )
        .await?;

    Ok(Json(AffiliateLinkResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/monetization/affiliate-links/{link_id}",
    tag = "affiliates",
    params(("link_id" = String, Path, description = "Link ID")),
    responses(
        (status = 204, description = "Link deleted"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Link not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_link(State(state): State<AppState>, Path(link_id): Path<Uuid>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = AffiliateLinks::new(&mut pool_conn);
    let link = repo
        .get_by_id(link_id)
        .await?
        .ok_or_else(|| Error::not_found("Affiliate link", link_id))?;
    permissions::ensure_owner(&current_user, link.owner_id, Resource::AffiliateLinks, Operation::DeleteOwn)?;

    repo.delete(link_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Referrals credited to the current user
#[utoipa::path(
    get,
    path = "/monetization/affiliate-referrals",
    tag = "affiliates",
    params(ListReferralsQuery),
    responses(
        (status = 200, description = "Referrals", body = [ReferralResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_referrals(
    State(state): State<AppState>,
    Query(query): Query<ListReferralsQuery>,
    current_user: RequiresPermission<resource::AffiliateLinks, operation::ReadOwn>,
) -> Result<Json<Vec<ReferralResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let referrals = Referrals::new(&mut pool_conn).list_for_referrer(current_user.id, skip, limit).await?;

    Ok(Json(referrals.into_iter().map(ReferralResponse::from).collect()))
}

/// Track a click or a converted sale through an affiliate link
///
/// Clicks are public. Conversions credit the link owner, so only administrators may report them.
#[utoipa::path(
    post,
    path = "/affiliate-links/{code}/track",
    tag = "affiliates",
    request_body = AffiliateTrackRequest,
    params(("code" = String, Path, description = "Affiliate code")),
    responses(
        (status = 200, description = "Event processed", body = TrackResponse),
        (status = 400, description = "Conversion without a positive amount"),
        (status = 401, description = "Conversion reported without administrator credentials"),
        (status = 404, description = "Affiliate link not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn track_event(
    State(state): State<AppState>,
    Path(code): Path<String>,
    current_user: Option<CurrentUser>,
    Json(data): Json<AffiliateTrackRequest>,
) -> Result<Json<TrackResponse>> {
    let conversion_amount = match data.event {
        AffiliateEvent::Conversion => {
            let Some(user) = current_user else {
                return Err(Error::Unauthenticated { message: None });
            };
            permissions::require_permission(&user, Resource::AffiliateLinks, Operation::UpdateAll)?;
            match data.amount {
                Some(amount) if amount > Decimal::ZERO => Some(money::require_cents(amount)?),
                _ => return Err(Error::bad_request("Conversion amount must be greater than zero")),
            }
        }
        AffiliateEvent::Click => None,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let link = AffiliateLinks::new(&mut tx)
        .get_by_code(&code)
        .await?
        .ok_or_else(|| Error::not_found("Affiliate link", &code))?;
    if link.status != TierStatus::Active {
        return Ok(Json(TrackResponse::ignored("Affiliate link is not active")));
    }

    let response = match conversion_amount {
        None => {
            AffiliateLinks::new(&mut tx).record_click(&code).await?;
            TrackResponse::tracked("Click tracked")
        }
        Some(amount) => {
            let split = revenue::split(RevenueStream::Affiliate, amount);
            let referral = Referrals::new(&mut tx)
                .create(&ReferralCreateDBRequest {
                    link_id: link.id,
                    referrer_id: link.owner_id,
                    referred_user_id: data.referred_user_id,
                    amount: split.amount,
                    commission: split.creator_share,
                    platform_fee: split.platform_fee,
                    status: ReferralStatus::Converted,
                })
                .await?;
            AffiliateLinks::new(&mut tx).record_conversion(link.id, split.creator_share).await?;
            Earnings::new(&mut tx)
                .credit_earnings(
                    link.owner_id,
                    RevenueStream::Affiliate,
                    &split,
                    &format!("referral_{}", referral.id),
                    Some(format!("Affiliate commission via {}", link.code)),
                )
                .await?;
            TrackResponse::tracked("Conversion tracked")
        }
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(response))
}

/// Referral landing: count the click, remember the code and send the visitor to sign up
#[utoipa::path(
    get,
    path = "/signup",
    tag = "affiliates",
    params(SignupQuery),
    responses(
        (status = 307, description = "Redirect to the dashboard sign-up page"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn signup_redirect(State(state): State<AppState>, Query(query): Query<SignupQuery>) -> Result<Response> {
    let target = format!("{}/auth/signup", state.config.dashboard_url.trim_end_matches('/'));
    let redirect = Redirect::temporary(&target);

    let Some(code) = query.code.filter(|code| !code.is_empty()) else {
        return Ok(redirect.into_response());
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match AffiliateLinks::new(&mut pool_conn).record_click(&code).await? {
        Some(link) => {
            info!("Referral visit through affiliate code {}", link.code);
            let cookie = session::referral_cookie(&link.code, &state.config);
            Ok(([(header::SET_COOKIE, cookie)], redirect).into_response())
        }
        None => {
            warn!("Referral visit with unknown or inactive affiliate code {}", code);
            Ok(redirect.into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::validate_code;
    use crate::{
        api::models::users::Role,
        test_utils::{add_auth_headers, create_test_app, create_test_config, create_test_user},
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[test]
    fn test_custom_code_rules() {
        assert!(validate_code("SPRING24").is_ok());
        assert!(validate_code("my-link_1").is_ok());
        assert!(validate_code("ab").is_err());
        assert!(validate_code("has space").is_err());
        assert!(validate_code(&"x".repeat(33)).is_err());
    }

    #[sqlx::test]
    async fn test_generated_codes_and_duplicate_custom_code(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let auth = add_auth_headers(&creator);

        let link: serde_json::Value = server
            .post("/api/monetization/affiliate-links")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"target_url": "https://shop.example.com"}))
            .await
            .json();
        assert_eq!(link["code"].as_str().unwrap().len(), crate::crypto::AFFILIATE_CODE_LENGTH);

        server
            .post("/api/monetization/affiliate-links")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"target_url": "https://shop.example.com", "code": "SPRING24"}))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/monetization/affiliate-links")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"target_url": "https://shop.example.com", "code": "SPRING24"}))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    async fn test_conversion_pays_half_to_link_owner(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let auth = add_auth_headers(&creator);
        let admin_auth = add_auth_headers(&admin);

        server
            .post("/api/monetization/affiliate-links")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"target_url": "https://shop.example.com", "code": "HALF"}))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post("/api/affiliate-links/HALF/track")
            .add_header(&admin_auth[0].0, &admin_auth[0].1)
            .json(&json!({"type": "conversion"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/api/affiliate-links/HALF/track")
            .json(&json!({"type": "click"}))
            .await
            .assert_status_ok();
        let body: serde_json::Value = server
            .post("/api/affiliate-links/HALF/track")
            .add_header(&admin_auth[0].0, &admin_auth[0].1)
            .json(&json!({"type": "conversion", "amount": "40.00"}))
            .await
            .json();
        assert_eq!(body["tracked"], true);

        let referrals: serde_json::Value = server
            .get("/api/monetization/affiliate-referrals")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(referrals[0]["status"], "converted");
        assert_eq!(referrals[0]["commission"], "20.00");

        let links: serde_json::Value = server
            .get("/api/monetization/affiliate-links")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(links[0]["clicks"], 1);
        assert_eq!(links[0]["conversions"], 1);
        assert_eq!(links[0]["commission_earned"], "20.00");
    }

    #[sqlx::test]
    async fn test_conversions_need_an_administrator(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let auth = add_auth_headers(&creator);

        server
            .post("/api/monetization/affiliate-links")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"target_url": "https://shop.example.com", "code": "SELFPAY"}))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post("/api/affiliate-links/SELFPAY/track")
            .json(&json!({"type": "conversion", "amount": "1000.00"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/affiliate-links/SELFPAY/track")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"type": "conversion", "amount": "1000.00"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let referrals: serde_json::Value = server
            .get("/api/monetization/affiliate-referrals")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert!(referrals.as_array().unwrap().is_empty());

        let funds: serde_json::Value = server.get("/api/funds").add_header(&auth[0].0, &auth[0].1).await.json();
        assert_eq!(funds["balance_stats"]["available_balance"], "0.00");
    }

    #[sqlx::test]
    async fn test_signup_redirect_sets_cookie_and_registration_records_referral(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let creator = create_test_user(&pool, Role::Creator).await;
        let auth = add_auth_headers(&creator);

        server
            .post("/api/monetization/affiliate-links")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"target_url": "https://letterbox.test", "code": "FRIEND"}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get("/signup?ref=FRIEND").await;
        response.assert_status(StatusCode::TEMPORARY_REDIRECT);
        assert!(response.header("location").to_str().unwrap().ends_with("/auth/signup"));
        let cookie = response.header("set-cookie").to_str().unwrap().to_string();
        assert!(cookie.starts_with("referral_code=FRIEND;"));

        server
            .post("/authentication/register")
            .add_header("cookie", "referral_code=FRIEND")
            .json(&json!({"username": "newreader", "email": "new@example.com", "password": "long enough pw"}))
            .await
            .assert_status(StatusCode::CREATED);

        let referrals: serde_json::Value = server
            .get("/api/monetization/affiliate-referrals")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(referrals[0]["status"], "signed_up");
        assert_eq!(referrals[0]["commission"], "0.00");

        // Unknown codes still redirect, without a cookie
        let response = server.get("/signup?ref=NOPE").await;
        response.assert_status(StatusCode::TEMPORARY_REDIRECT);
        assert!(response.maybe_header("set-cookie").is_none());
    }
}
