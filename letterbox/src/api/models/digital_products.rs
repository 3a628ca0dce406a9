//! API request/response models for digital products and their purchases.

use crate::{
    db::models::digital_products::{ProductDBResponse, ProductStatus, PurchaseDBResponse},
    types::{ProductId, PurchaseId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProductCreate {
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub price: Decimal,
    /// Location of the file buyers download
    pub file_url: String,
    /// Defaults to `draft`
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub file_url: Option<String>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProductId,
    #[schema(value_type = String, format = "uuid")]
    pub creator_id: UserId,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub price: Decimal,
    pub file_url: String,
    pub status: ProductStatus,
    pub sales: i64,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub revenue: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PurchaseResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PurchaseId,
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
    #[schema(value_type = String, format = "uuid")]
    pub buyer_id: UserId,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A completed purchase and the signed link to fetch the file
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PurchaseResult {
    pub purchase: PurchaseResponse,
    pub download_url: String,
    pub download_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// Unix timestamp after which the link is rejected
    pub expires: i64,
    /// Hex HMAC-SHA256 signature
    pub signature: String,
}

impl From<ProductDBResponse> for ProductResponse {
    fn from(db: ProductDBResponse) -> Self {
        Self {
            id: db.id,
            creator_id: db.creator_id,
            title: db.title,
            description: db.description,
            price: db.price,
            file_url: db.file_url,
            status: db.status,
            sales: db.sales,
            revenue: db.revenue,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<PurchaseDBResponse> for PurchaseResponse {
    fn from(db: PurchaseDBResponse) -> Self {
        Self {
            id: db.id,
            product_id: db.product_id,
            buyer_id: db.buyer_id,
            amount: db.amount,
            status: db.status,
            created_at: db.created_at,
        }
    }
}
