//! API request/response models for native authentication.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::users::{Role, UserResponse};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    /// `creator` (default) or `brand`
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// Whether native registration is open
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationInfo {
    pub enabled: bool,
    pub message: String,
}

pub struct RegisterResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: String,
}

impl IntoResponse for RegisterResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, [(header::SET_COOKIE, self.cookie)], Json(self.auth_response)).into_response()
    }
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        ([(header::SET_COOKIE, self.cookie)], Json(self.auth_response)).into_response()
    }
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        ([(header::SET_COOKIE, self.cookie)], Json(self.auth_response)).into_response()
    }
}
