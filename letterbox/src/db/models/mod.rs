//! Database models: request structs passed to repositories and the rows they return.
//!
//! Row types derive [`sqlx::FromRow`]; status columns are TEXT mapped onto enums with
//! `#[sqlx(type_name = "text")]`.

pub mod affiliates;
pub mod billing;
pub mod brand_funds;
pub mod cross_promotions;
pub mod digital_products;
pub mod donations;
pub mod earnings;
pub mod sponsored_ads;
pub mod subscriptions;
pub mod users;
