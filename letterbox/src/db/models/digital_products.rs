//! Database models for digital products and their purchases.

use crate::types::{ProductId, PurchaseId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone)]
pub struct ProductCreateDBRequest {
    pub creator_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub file_url: String,
    pub status: ProductStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ProductUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub file_url: Option<String>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProductDBResponse {
    pub id: ProductId,
    pub creator_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub file_url: String,
    pub status: ProductStatus,
    pub sales: i64,
    pub revenue: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PurchaseCreateDBRequest {
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub amount: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct PurchaseDBResponse {
    pub id: PurchaseId,
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub amount: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
