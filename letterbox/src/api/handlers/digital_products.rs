//! HTTP handlers for digital products, purchases and signed downloads.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use crate::{
    AppState,
    api::models::{
        digital_products::{DownloadQuery, ProductCreate, ProductResponse, ProductUpdate, PurchaseResponse, PurchaseResult},
        money,
        pagination::Pagination,
        users::CurrentUser,
    },
    auth::permissions::{self, RequiresPermission, operation, resource},
    crypto,
    db::{
        handlers::{DigitalProducts, Earnings, OwnerFilter, Purchases, Repository},
        models::digital_products::{ProductCreateDBRequest, ProductStatus, ProductUpdateDBRequest, PurchaseCreateDBRequest},
    },
    errors::{Error, Result},
    revenue::{self, RevenueStream},
    types::{Operation, ProductId, PurchaseId, Resource},
};

fn secret_key(state: &AppState) -> Result<&str> {
    state.config.secret_key.as_deref().ok_or_else(|| Error::NotConfigured {
        what: "Secret key".to_string(),
    })
}

fn validate_price(price: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(Error::bad_request("Price must be greater than zero"));
    }
    money::require_cents(price)?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/monetization/digital-products",
    tag = "digital-products",
    params(Pagination),
    responses(
        (status = 200, description = "Digital products", body = [ProductResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: RequiresPermission<resource::DigitalProducts, operation::ReadOwn>,
) -> Result<Json<Vec<ProductResponse>>> {
    let (skip, limit) = pagination.params();
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let products = DigitalProducts::new(&mut pool_conn)
        .list(&OwnerFilter::new(current_user.id, skip, limit))
        .await?;

    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/monetization/digital-products",
    tag = "digital-products",
    request_body = ProductCreate,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid product"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::DigitalProducts, operation::CreateOwn>,
    Json(data): Json<ProductCreate>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    if data.title.trim().is_empty() || data.file_url.trim().is_empty() {
        return Err(Error::bad_request("Title and file URL are required"));
    }
    validate_price(data.price)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = DigitalProducts::new(&mut pool_conn)
        .create(&ProductCreateDBRequest {
            creator_id: current_user.id,
            title: data.title,
            description: data.description,
            price: data.price,
            file_url: data.file_url,
            status: data.status.unwrap_or(ProductStatus::Draft),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

#[utoipa::path(
    patch,
    path = "/monetization/digital-products/{product_id}",
    tag = "digital-products",
    request_body = ProductUpdate,
    params(("product_id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Product not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    current_user: CurrentUser,
    Json(data): Json<ProductUpdate>,
) -> Result<Json<ProductResponse>> {
    if let Some(price) = data.price {
        validate_price(price)?;
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = DigitalProducts::new(&mut pool_conn);
    let product = repo
        .get_by_id(product_id)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;
    permissions::ensure_owner(&current_user, product.creator_id, Resource::DigitalProducts, Operation::UpdateOwn)?;

    let updated = repo
        .update(
            product_id,
            &ProductUpdateDBRequest {
                title: data.title,
                description: data.description,
                price: data.price,
                file_url: data.file_url,
                status: data.status,
            },
        )
        .await?;

    Ok(Json(ProductResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/monetization/digital-products/{product_id}",
    tag = "digital-products",
    params(("product_id" = String, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Product not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_product(State(state): State<AppState>, Path(product_id): Path<ProductId>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = DigitalProducts::new(&mut pool_conn);
    let product = repo
        .get_by_id(product_id)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;
    permissions::ensure_owner(&current_user, product.creator_id, Resource::DigitalProducts, Operation::DeleteOwn)?;

    repo.delete(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Buy a published product and receive a signed download link
#[utoipa::path(
    post,
    path = "/monetization/digital-products/{product_id}/purchase",
    tag = "digital-products",
    params(("product_id" = String, Path, description = "Product ID")),
    responses(
        (status = 201, description = "Purchase completed", body = PurchaseResult),
        (status = 400, description = "Product is not available for purchase"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Product not found"),
    ),
    security(("CookieAuth" = []), ("X-Letterbox-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn purchase_product(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    current_user: RequiresPermission<resource::Purchases, operation::CreateOwn>,
) -> Result<(StatusCode, Json<PurchaseResult>)> {
    let secret = secret_key(&state)?;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let product = DigitalProducts::new(&mut tx)
        .get_by_id(product_id)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;
    if product.status != ProductStatus::Published {
        return Err(Error::bad_request("Product is not available for purchase"));
    }
    if product.creator_id == current_user.id {
        return Err(Error::bad_request("Cannot purchase your own product"));
    }

    let split = revenue::split(RevenueStream::DigitalProduct, product.price);
    let purchase = Purchases::new(&mut tx)
        .create(&PurchaseCreateDBRequest {
            product_id: product.id,
            buyer_id: current_user.id,
            amount: split.amount,
            user_share: split.creator_share,
            platform_fee: split.platform_fee,
        })
        .await?;

    DigitalProducts::new(&mut tx).record_sale(product.id, split.amount).await?;
    Earnings::new(&mut tx)
        .credit_earnings(
            product.creator_id,
            RevenueStream::DigitalProduct,
            &split,
            &format!("purchase_{}", purchase.id),
            Some(format!("Sale of {}", product.title)),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let ttl = Duration::from_std(state.config.monetization.download_link_ttl).map_err(|e| Error::Other(e.into()))?;
    let download_expires_at = Utc::now() + ttl;
    let download_url = crypto::download_path(secret, purchase.id, download_expires_at).ok_or_else(|| Error::Internal {
        operation: "sign download link".to_string(),
    })?;

    tracing::info!("User {} purchased product {}", current_user.id, product.id);
    Ok((
        StatusCode::CREATED,
        Json(PurchaseResult {
            purchase: PurchaseResponse::from(purchase),
            download_url,
            download_expires_at,
        }),
    ))
}

/// Follow a signed download link to the product file
#[utoipa::path(
    get,
    path = "/downloads/{purchase_id}",
    tag = "digital-products",
    params(
        ("purchase_id" = String, Path, description = "Purchase ID"),
        DownloadQuery,
    ),
    responses(
        (status = 307, description = "Redirect to the product file"),
        (status = 401, description = "Invalid or expired download link"),
        (status = 404, description = "Purchase not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn download(State(state): State<AppState>, Path(purchase_id): Path<PurchaseId>, Query(query): Query<DownloadQuery>) -> Result<Redirect> {
    let secret = secret_key(&state)?;
    if !crypto::verify_download(secret, purchase_id, query.expires, &query.signature, Utc::now()) {
        return Err(Error::Unauthenticated {
            message: Some("Invalid or expired download link".to_string()),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let purchase = Purchases::new(&mut pool_conn)
        .get_by_id(purchase_id)
        .await?
        .ok_or_else(|| Error::not_found("Purchase", purchase_id))?;
    let product = DigitalProducts::new(&mut pool_conn)
        .get_by_id(purchase.product_id)
        .await?
        .ok_or_else(|| Error::not_found("Product", purchase.product_id))?;

    Ok(Redirect::temporary(&product.file_url))
}
