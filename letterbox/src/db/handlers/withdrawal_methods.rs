//! Database repository for creator withdrawal methods.

use crate::db::{
    errors::Result,
    models::earnings::{WithdrawalMethodCreateDBRequest, WithdrawalMethodDBResponse},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

pub struct WithdrawalMethods<'c> {
    db: &'c mut PgConnection,
}

impl<'c> WithdrawalMethods<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Add a method; a new default replaces the user's previous default.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn create(&mut self, request: &WithdrawalMethodCreateDBRequest) -> Result<WithdrawalMethodDBResponse> {
        let mut tx = self.db.begin().await?;

        if request.is_default {
            sqlx::query("UPDATE withdrawal_methods SET is_default = false WHERE user_id = $1")
                .bind(request.user_id)
                .execute(&mut *tx)
                .await?;
        }

        let method = sqlx::query_as::<_, WithdrawalMethodDBResponse>(
            r#"
            INSERT INTO withdrawal_methods (user_id, method_type, label, last4, is_default)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(request.method_type)
        .bind(&request.label)
        .bind(&request.last4)
        .bind(request.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(method)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<WithdrawalMethodDBResponse>> {
        let method = sqlx::query_as::<_, WithdrawalMethodDBResponse>("SELECT * FROM withdrawal_methods WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(method)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<WithdrawalMethodDBResponse>> {
        let methods = sqlx::query_as::<_, WithdrawalMethodDBResponse>(
            "SELECT * FROM withdrawal_methods WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(methods)
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM withdrawal_methods WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
