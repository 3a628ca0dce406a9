//! API request/response models for brand advertising funds.

use crate::{
    db::models::brand_funds::{BrandFundsDBResponse, BrandTransactionDBResponse, BrandTransactionType},
    payment_providers::SavedCard,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Add funds by charging a card. `card_id` names a saved card; `payment_method_id` a card
/// collected client side.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddFundsRequest {
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub card_id: Option<String>,
    pub payment_method_id: Option<String>,
    /// Attach a new card to the brand's customer for later use
    #[serde(default)]
    pub save_card: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BrandBalanceStats {
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub available_balance: Decimal,
    /// Reserved for running campaigns
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub pending_balance: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub total_spent: Decimal,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub total_budget: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BrandTransactionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    /// Day of the transaction
    pub date: NaiveDate,
    pub transaction_type: BrandTransactionType,
    #[schema(value_type = String)]
    #[serde(serialize_with = "crate::api::models::money::serialize")]
    pub amount: Decimal,
    pub status: String,
    pub payment_method: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub campaign_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SavedCardResponse {
    pub id: String,
    /// Masked number, e.g. `**** **** **** 4242`
    pub card_number: String,
    pub cardholder_name: Option<String>,
    /// `MM/YYYY`
    pub expiry_date: String,
    pub brand: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BrandFundsOverview {
    pub balance_stats: BrandBalanceStats,
    pub transactions: Vec<BrandTransactionResponse>,
    pub saved_cards: Vec<SavedCardResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AddFundsResponse {
    pub message: String,
    pub balance_stats: BrandBalanceStats,
}

impl From<BrandFundsDBResponse> for BrandBalanceStats {
    fn from(db: BrandFundsDBResponse) -> Self {
        Self {
            available_balance: db.available_balance,
            pending_balance: db.pending_balance,
            total_spent: db.total_spent,
            total_budget: db.total_budget,
        }
    }
}

impl From<BrandTransactionDBResponse> for BrandTransactionResponse {
    fn from(db: BrandTransactionDBResponse) -> Self {
        Self {
            id: db.id,
            date: db.created_at.date_naive(),
            transaction_type: db.transaction_type,
            amount: db.amount,
            status: db.status,
            payment_method: db.payment_method,
            description: db.description,
            campaign_id: db.campaign_id,
        }
    }
}

impl From<SavedCard> for SavedCardResponse {
    fn from(card: SavedCard) -> Self {
        Self {
            card_number: format!("**** **** **** {}", card.last4),
            expiry_date: format!("{:02}/{}", card.exp_month, card.exp_year),
            id: card.id,
            cardholder_name: card.cardholder_name,
            brand: card.brand,
            is_default: card.is_default,
        }
    }
}

/// Ledger label of the card a deposit was paid with
pub fn deposit_method_label(saved_card_last4: Option<&str>) -> String {
    match saved_card_last4 {
        Some(last4) => format!("Credit Card (**** {last4})"),
        None => "Credit Card (New)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_cards_are_masked() {
        let card = SavedCard {
            id: "pm_1".to_string(),
            brand: "visa".to_string(),
            last4: "4242".to_string(),
            exp_month: 4,
            exp_year: 2030,
            cardholder_name: Some("Acme Corp".to_string()),
            is_default: true,
        };
        let response = SavedCardResponse::from(card);
        assert_eq!(response.card_number, "**** **** **** 4242");
        assert_eq!(response.expiry_date, "04/2030");
        assert!(response.is_default);
    }

    #[test]
    fn deposit_labels() {
        assert_eq!(deposit_method_label(Some("4242")), "Credit Card (**** 4242)");
        assert_eq!(deposit_method_label(None), "Credit Card (New)");
    }
}
