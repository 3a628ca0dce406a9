//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open transaction) and
//! returns models from [`crate::db::models`]. CRUD-shaped entities implement [`Repository`];
//! counters and balance movements are inherent methods.
//!
//! ```ignore
//! use letterbox::db::handlers::{Earnings, Repository, SubscriptionTiers};
//!
//! let mut tx = pool.begin().await?;
//! let tier = SubscriptionTiers::new(&mut tx).get_by_id(tier_id).await?;
//! Earnings::new(&mut tx).credit_earnings(creator_id, stream, &split, &source_id, None).await?;
//! tx.commit().await?;
//! ```

pub mod affiliates;
pub mod billing;
pub mod brand_funds;
pub mod cross_promotions;
pub mod digital_products;
pub mod donations;
pub mod earnings;
pub mod repository;
pub mod sponsored_ads;
pub mod subscriptions;
pub mod users;
pub mod withdrawal_methods;

pub use affiliates::{AffiliateLinks, Referrals};
pub use billing::{BillingPayments, PaymentMethods, PlatformSubscriptions};
pub use brand_funds::BrandFunds;
pub use cross_promotions::CrossPromotions;
pub use digital_products::{DigitalProducts, Purchases};
pub use donations::{DonationTiers, Donations};
pub use earnings::Earnings;
pub use repository::{OwnerFilter, Repository};
pub use sponsored_ads::SponsoredAds;
pub use subscriptions::{SubscriptionTiers, Subscriptions};
pub use users::Users;
pub use withdrawal_methods::WithdrawalMethods;
