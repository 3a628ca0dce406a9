use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    AppState,
    api::models::{
        auth::{AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse, RegistrationInfo},
        users::{CurrentUser, Role, UserResponse},
    },
    auth::{
        password::{self, Argon2Params},
        session,
    },
    db::{
        handlers::{AffiliateLinks, Referrals, Repository, Users},
        models::{
            affiliates::{ReferralCreateDBRequest, ReferralStatus},
            subscriptions::TierStatus,
            users::UserCreateDBRequest,
        },
    },
    errors::Error,
};

/// Get registration information
#[utoipa::path(
    get,
    path = "/authentication/register",
    tag = "authentication",
    responses(
        (status = 200, description = "Registration info", body = RegistrationInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_registration_info(State(state): State<AppState>) -> Result<Json<RegistrationInfo>, Error> {
    let enabled = state.config.auth.native.enabled && state.config.auth.native.allow_registration;
    Ok(Json(RegistrationInfo {
        enabled,
        message: if enabled {
            "Registration is enabled".to_string()
        } else {
            "Registration is disabled".to_string()
        },
    }))
}

/// Register a new creator or brand account
#[utoipa::path(
    post,
    path = "/authentication/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "User already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::bad_request("Native authentication is disabled"));
    }
    if !state.config.auth.native.allow_registration {
        return Err(Error::bad_request("User registration is disabled"));
    }

    let role = request.role.unwrap_or(Role::Creator);
    if role == Role::Admin {
        return Err(Error::bad_request("Role must be creator or brand"));
    }
    if request.username.trim().is_empty() || request.email.trim().is_empty() {
        return Err(Error::bad_request("Username and email are required"));
    }

    let password_config = &state.config.auth.native.password;
    password::validate_length(&request.password, password_config)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut user_repo = Users::new(&mut tx);
    if user_repo.get_user_by_email(&request.email).await?.is_some() {
        return Err(Error::Conflict {
            message: "An account with this email address already exists".to_string(),
        });
    }

    let password_hash = password::hash_password(request.password, Argon2Params::from(password_config)).await?;
    let created_user = user_repo
        .create(&UserCreateDBRequest {
            username: request.username,
            email: request.email,
            display_name: request.display_name,
            role,
            auth_source: "native".to_string(),
            password_hash: Some(password_hash),
        })
        .await?;

    // Attribute the signup to the affiliate link the visitor arrived through
    let referral_code = headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| session::find_cookie(cookies, &state.config.monetization.referral_cookie_name))
        .map(str::to_string);

    if let Some(code) = referral_code {
        let link = AffiliateLinks::new(&mut tx).get_by_code(&code).await?;
        match link {
            Some(link) if link.status == TierStatus::Active && link.owner_id != created_user.id => {
                Referrals::new(&mut tx)
                    .create(&ReferralCreateDBRequest {
                        link_id: link.id,
                        referrer_id: link.owner_id,
                        referred_user_id: Some(created_user.id),
                        amount: Decimal::ZERO,
                        commission: Decimal::ZERO,
                        platform_fee: Decimal::ZERO,
                        status: ReferralStatus::SignedUp,
                    })
                    .await?;
                info!("Recorded signup referral through affiliate code {}", code);
            }
            _ => warn!("Ignoring referral cookie for unknown or inactive affiliate code {}", code),
        }
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let current_user = CurrentUser::from(created_user.clone());
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = session::session_cookie(&token, &state.config);

    Ok(RegisterResponse {
        auth_response: AuthResponse {
            user: UserResponse::from(created_user),
            message: "Registration successful".to_string(),
        },
        cookie,
    })
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::bad_request("Native authentication is disabled"));
    }

    let invalid_credentials = || Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn)
        .get_user_by_email(&request.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let password_hash = user.password_hash.clone().ok_or_else(invalid_credentials)?;
    if !password::verify_password(request.password, password_hash).await? {
        return Err(invalid_credentials());
    }

    let current_user = CurrentUser::from(user.clone());
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = session::session_cookie(&token, &state.config);

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user: UserResponse::from(user),
            message: "Login successful".to_string(),
        },
        cookie,
    })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: session::clear_session_cookie(&state.config),
    })
}
