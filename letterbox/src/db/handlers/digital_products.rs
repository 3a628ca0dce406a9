//! Database repositories for digital products and purchases.

use crate::db::{
    errors::Result,
    handlers::repository::{OwnerFilter, Repository},
    models::digital_products::{
        ProductCreateDBRequest, ProductDBResponse, ProductUpdateDBRequest, PurchaseCreateDBRequest, PurchaseDBResponse,
    },
};
use crate::types::{ProductId, PurchaseId, abbrev_uuid};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;

pub struct DigitalProducts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> DigitalProducts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    pub async fn record_sale(&mut self, id: ProductId, amount: Decimal) -> Result<()> {
        sqlx::query("UPDATE digital_products SET sales = sales + 1, revenue = revenue + $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(amount)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for DigitalProducts<'c> {
    type CreateRequest = ProductCreateDBRequest;
    type UpdateRequest = ProductUpdateDBRequest;
    type Response = ProductDBResponse;
    type Id = ProductId;
    type Filter = OwnerFilter;

    #[instrument(skip(self, request), fields(creator_id = %abbrev_uuid(&request.creator_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let product = sqlx::query_as::<_, ProductDBResponse>(
            r#"
            INSERT INTO digital_products (creator_id, title, description, price, file_url, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.creator_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.file_url)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let product = sqlx::query_as::<_, ProductDBResponse>("SELECT * FROM digital_products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(product)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let products = sqlx::query_as::<_, ProductDBResponse>("SELECT * FROM digital_products WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(creator_id = %abbrev_uuid(&filter.owner_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let products = sqlx::query_as::<_, ProductDBResponse>(
            "SELECT * FROM digital_products WHERE creator_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(filter.owner_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM digital_products WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let product = sqlx::query_as::<_, ProductDBResponse>(
            r#"
            UPDATE digital_products SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                file_url = COALESCE($5, file_url),
                status = COALESCE($6, status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.file_url)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(product)
    }
}

pub struct Purchases<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Purchases<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(product_id = %abbrev_uuid(&request.product_id)), err)]
    pub async fn create(&mut self, request: &PurchaseCreateDBRequest) -> Result<PurchaseDBResponse> {
        let purchase = sqlx::query_as::<_, PurchaseDBResponse>(
            r#"
            INSERT INTO purchases (product_id, buyer_id, amount, user_share, platform_fee, status)
            VALUES ($1, $2, $3, $4, $5, 'completed')
            RETURNING *
            "#,
        )
        .bind(request.product_id)
        .bind(request.buyer_id)
        .bind(request.amount)
        .bind(request.user_share)
        .bind(request.platform_fee)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(purchase)
    }

    #[instrument(skip(self), fields(purchase_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: PurchaseId) -> Result<Option<PurchaseDBResponse>> {
        let purchase = sqlx::query_as::<_, PurchaseDBResponse>("SELECT * FROM purchases WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(purchase)
    }
}
