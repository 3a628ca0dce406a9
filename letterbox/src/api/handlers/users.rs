//! HTTP handlers for user profiles.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        users::{CurrentUser, ListUsersQuery, UserResponse},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::handlers::{Repository, Users, users::UserFilter},
    errors::{Error, Result},
};

/// Get the current user's profile and balances
#[utoipa::path(
    get,
    path = "/users/current",
    tag = "users",
    summary = "Get current user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("User", current_user.id))?;

    Ok(Json(UserResponse::from(user)))
}

/// List all users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    description = "Paginated list of every account (admin only)",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Paginated list of users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _perm: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let (skip, limit) = query.pagination.params();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut pool_conn);
    let users = repo.list(&UserFilter::new(skip, limit)).await?;
    let total_count = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}
