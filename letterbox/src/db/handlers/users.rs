//! Database repository for users.

use crate::api::models::users::Role;
use crate::types::{UserId, abbrev_uuid};
use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_payment_provider_id(&mut self, customer_id: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE payment_provider_id = $1")
            .bind(customer_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn set_payment_provider_id(&mut self, id: UserId, customer_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET payment_provider_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(customer_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Count one donation received and add its amount to the recipient's totals.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn record_donation_received(&mut self, id: UserId, amount: rust_decimal::Decimal) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET donations_received = donations_received + 1, donations_total = donations_total + $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(amount)
        .execute(&mut *self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(crate::db::errors::DbError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (username, email, display_name, role, auth_source, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(request.role)
        .bind(&request.auth_source)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let users = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                password_hash = COALESCE($3, password_hash),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.display_name)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn creator(name: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            display_name: None,
            role: Role::Creator,
            auth_source: "native".to_string(),
            password_hash: None,
        }
    }

    #[sqlx::test]
    async fn test_create_and_lookup_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&creator("ada")).await.unwrap();
        assert_eq!(user.role, Role::Creator);
        assert_eq!(user.available_balance, rust_decimal::Decimal::ZERO);

        let by_email = repo.get_user_by_email("ADA@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        let by_name = repo.get_user_by_username("ada").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);

        let bulk = repo.get_bulk(vec![user.id]).await.unwrap();
        assert!(bulk.contains_key(&user.id));
    }

    #[sqlx::test]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&creator("grace")).await.unwrap();
        let mut dup = creator("grace2");
        dup.email = "grace@example.com".to_string();
        let err = repo.create(&dup).await.unwrap_err();
        assert!(err.is_unique_violation_of("users_email_unique"));
    }

    #[sqlx::test]
    async fn test_record_donation_received(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let user = repo.create(&creator("linus")).await.unwrap();

        repo.record_donation_received(user.id, rust_decimal::Decimal::new(1250, 2)).await.unwrap();
        repo.record_donation_received(user.id, rust_decimal::Decimal::new(500, 2)).await.unwrap();

        let user = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.donations_received, 2);
        assert_eq!(user.donations_total, rust_decimal::Decimal::new(1750, 2));
    }
}
