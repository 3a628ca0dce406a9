//! HTTP request handlers for all API endpoints.
//!
//! Each handler validates its input, checks permissions through the extractors in
//! [`crate::auth`], runs the business rules against the repositories in [`crate::db::handlers`]
//! and serializes the response. Errors are returned as [`crate::errors::Error`], which renders
//! the status code and a `{"error": ...}` body.
//!
//! # Handler Modules
//!
//! - [`auth`]: registration, login and logout
//! - [`users`]: the current user's profile and the admin user list
//! - [`subscriptions`]: subscription tiers and subscriptions
//! - [`donations`]: donations, donation tiers and the public donation page
//! - [`sponsored_ads`]: brand campaigns and impression/click tracking
//! - [`cross_promotions`]: cross-promotions and click/subscriber tracking
//! - [`digital_products`]: products, purchases and signed downloads
//! - [`affiliates`]: affiliate links, referrals and the signup redirect
//! - [`monetization`]: the all-streams overview
//! - [`funds`]: creator balances and withdrawals
//! - [`brand_funds`]: brand deposits
//! - [`billing`]: the operator's platform plan
//! - [`webhooks`]: payment provider events

pub mod affiliates;
pub mod auth;
pub mod billing;
pub mod brand_funds;
pub mod cross_promotions;
pub mod digital_products;
pub mod donations;
pub mod funds;
pub mod monetization;
pub mod sponsored_ads;
pub mod subscriptions;
pub mod users;
pub mod webhooks;
