//! API request and response data models.
//!
//! These structures define the public JSON contract. They are distinct from the database models
//! in [`crate::db::models`] so that storage columns (payment provider ids, donor emails, password
//! hashes) never leak into responses by accident. Every model is annotated with `utoipa` for the
//! generated API docs. Money is serialized as a decimal string with two places (see [`money`]).
//!
//! - [`auth`], [`users`]: registration, login, profiles and roles
//! - [`subscriptions`], [`donations`], [`sponsored_ads`], [`cross_promotions`],
//!   [`digital_products`], [`affiliates`]: one module per revenue stream
//! - [`monetization`]: the all-streams overview
//! - [`funds`], [`brand_funds`], [`billing`]: creator balances, brand funds, operator billing

pub mod affiliates;
pub mod auth;
pub mod billing;
pub mod brand_funds;
pub mod cross_promotions;
pub mod digital_products;
pub mod donations;
pub mod funds;
pub mod monetization;
pub mod money;
pub mod pagination;
pub mod sponsored_ads;
pub mod subscriptions;
pub mod users;
