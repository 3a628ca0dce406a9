//! HTTP handlers for creator balances, withdrawals and withdrawal methods.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        funds::{
            FundsOverview, TransactionResponse, WithdrawalMethodCreate, WithdrawalMethodResponse, WithdrawalRequest, WithdrawalResponse,
        },
        money,
    },
    auth::permissions::{self, RequiresPermission, operation, resource},
    db::{
        handlers::{Earnings, WithdrawalMethods},
        models::earnings::WithdrawalMethodCreateDBRequest,
    },
    errors::{Error, Result},
    types::{Operation, Resource},
};

/// Ledger rows shown on the funds page
const RECENT_TRANSACTIONS: i64 = 50;

/// Balances, recent ledger rows and withdrawal methods of the current creator
#[utoipa::path(
    get,
    path = "/funds",
    tag = "funds",
    responses(
        (status = 200, description = "Funds overview", body = FundsOverview),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_funds(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Funds, operation::ReadOwn>,
) -> Result<Json<FundsOverview>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut earnings = Earnings::new(&mut pool_conn);
    let balance = earnings.balance(current_user.id).await?;
    let transactions = earnings.list_transactions(current_user.id, RECENT_TRANSACTIONS).await?;
    let methods = WithdrawalMethods::new(&mut pool_conn).list_for_user(current_user.id).await?;

    Ok(Json(FundsOverview {
        balance_stats: balance.into(),
        transactions: transactions.into_iter().map(TransactionResponse::from).collect(),
        withdrawal_methods: methods.into_iter().map(WithdrawalMethodResponse::from).collect(),
    }))
}

/// Withdraw part of the available balance to one of the creator's methods
#[utoipa::path(
    post,
    path = "/funds/withdrawals",
    tag = "funds",
    request_body = WithdrawalRequest,
    responses(
        (status = 200, description = "Withdrawal requested", body = WithdrawalResponse),
        (status = 400, description = "Invalid amount, method or insufficient funds"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn request_withdrawal(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Funds, operation::CreateOwn>,
    Json(data): Json<WithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>> {
    if data.amount <= Decimal::ZERO {
        return Err(Error::bad_request("Amount must be greater than zero"));
    }
    money::require_cents(data.amount)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let method = WithdrawalMethods::new(&mut tx)
        .get_by_id(data.withdrawal_method_id)
        .await?
        .filter(|method| method.user_id == current_user.id)
        .ok_or_else(|| Error::bad_request("Invalid withdrawal method"))?;

    let mut earnings = Earnings::new(&mut tx);
    let transaction = earnings
        .withdraw(current_user.id, data.amount, &method.label)
        .await?
        .ok_or_else(|| Error::bad_request("Insufficient funds"))?;
    let balance = earnings.balance(current_user.id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!("User {} requested a withdrawal of {}", current_user.id, data.amount);

    Ok(Json(WithdrawalResponse {
        message: "Withdrawal requested".to_string(),
        transaction: TransactionResponse::from(transaction),
        balance_stats: balance.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/funds/withdrawal-methods",
    tag = "funds",
    request_body = WithdrawalMethodCreate,
    responses(
        (status = 201, description = "Withdrawal method added", body = WithdrawalMethodResponse),
        (status = 400, description = "Invalid withdrawal method"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_withdrawal_method(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Funds, operation::CreateOwn>,
    Json(data): Json<WithdrawalMethodCreate>,
) -> Result<(StatusCode, Json<WithdrawalMethodResponse>)> {
    if data.label.trim().is_empty() {
        return Err(Error::bad_request("Label is required"));
    }
    if let Some(last4) = &data.last4
        && (last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(Error::bad_request("last4 must be four digits"));
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let method = WithdrawalMethods::new(&mut pool_conn)
        .create(&WithdrawalMethodCreateDBRequest {
            user_id: current_user.id,
            method_type: data.method_type,
            label: data.label,
            last4: data.last4,
            is_default: data.is_default,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(WithdrawalMethodResponse::from(method))))
}

#[utoipa::path(
    delete,
    path = "/funds/withdrawal-methods/{method_id}",
    tag = "funds",
    params(("method_id" = String, Path, description = "Withdrawal method ID")),
    responses(
        (status = 204, description = "Withdrawal method removed"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Withdrawal method not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_withdrawal_method(
    State(state): State<AppState>,
    Path(method_id): Path<Uuid>,
    current_user: RequiresPermission<resource::Funds, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = WithdrawalMethods::new(&mut pool_conn);
    let method = repo
        .get_by_id(method_id)
        .await?
        .ok_or_else(|| Error::not_found("Withdrawal method", method_id))?;
    permissions::ensure_owner(&current_user, method.user_id, Resource::Funds, Operation::DeleteOwn)?;

    repo.delete(method_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
