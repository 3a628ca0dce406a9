//! Common type definitions and permission system types.
//!
//! # Permission System
//!
//! - [`Resource`]: what entity type is being accessed (subscription tiers, campaigns, funds...)
//! - [`Operation`]: what action is being performed. `*All` is unrestricted, `*Own` is restricted
//!   to entities the caller owns.
//! - [`Permission`]: authorization requirement combining resource and operation
//!
//! The role to permission table lives in [`crate::auth::permissions`].

use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type TierId = Uuid;
pub type CampaignId = Uuid;
pub type ProductId = Uuid;
pub type PurchaseId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Public creator pages are addressed either by id or by username.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserIdOrUsername {
    Id(UserId),
    Username(String),
}

// Operations that can be performed on resources
// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    SubscriptionTiers,
    Subscriptions,
    DonationTiers,
    Donations,
    SponsoredAds,
    CrossPromotions,
    DigitalProducts,
    Purchases,
    AffiliateLinks,
    Funds,
    BrandFunds,
    Billing,
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Caller must own the specific resource instance
    Granted,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Users => "users",
            Resource::SubscriptionTiers => "subscription tiers",
            Resource::Subscriptions => "subscriptions",
            Resource::DonationTiers => "donation tiers",
            Resource::Donations => "donations",
            Resource::SponsoredAds => "sponsored ads",
            Resource::CrossPromotions => "cross-promotions",
            Resource::DigitalProducts => "digital products",
            Resource::Purchases => "purchases",
            Resource::AffiliateLinks => "affiliate links",
            Resource::Funds => "funds",
            Resource::BrandFunds => "brand funds",
            Resource::Billing => "billing",
        };
        write!(f, "{name}")
    }
}
