//! Database models for sponsored ad campaigns.

use crate::types::{CampaignId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    /// Completed and cancelled campaigns no longer hold reserved funds.
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }
}

#[derive(Debug, Clone)]
pub struct CampaignCreateDBRequest {
    pub brand_id: UserId,
    pub creator_id: UserId,
    pub brand_name: String,
    pub campaign_name: String,
    pub budget: Decimal,
    pub cost_per_click: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, FromRow)]
pub struct CampaignDBResponse {
    pub id: CampaignId,
    pub brand_id: UserId,
    pub creator_id: UserId,
    pub brand_name: String,
    pub campaign_name: String,
    pub budget: Decimal,
    pub cost_per_click: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CampaignStatus,
    pub clicks: i64,
    pub impressions: i64,
    pub revenue: Decimal,
    pub user_share: Decimal,
    pub platform_fee: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignDBResponse {
    /// Budget not yet charged to clicks
    pub fn remaining_budget(&self) -> Decimal {
        (self.budget - self.revenue).max(Decimal::ZERO)
    }

    /// Amount the next click charges: the cost per click, capped at what is left.
    pub fn next_click_charge(&self) -> Decimal {
        self.cost_per_click.min(self.remaining_budget())
    }

    pub fn is_running_on(&self, day: NaiveDate) -> bool {
        self.status == CampaignStatus::Active && self.start_date <= day && day <= self.end_date
    }
}
