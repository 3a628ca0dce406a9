//! Authentication and authorization.
//!
//! # Authentication Methods
//!
//! ## Native sessions
//!
//! - Users register or log in via `/authentication/register` and `/authentication/login`
//! - Passwords are hashed with Argon2id ([`password`])
//! - A signed JWT is stored in an HTTP-only cookie ([`session`])
//!
//! ## Trusted proxy header
//!
//! An upstream SSO proxy sets a header (default `x-letterbox-user`) carrying the user's email.
//! Unknown users can be created on first sight as creators.
//!
//! # Authorization
//!
//! Every account has one role: `admin`, `creator` or `brand`. [`permissions`] maps roles to
//! `(Resource, Operation)` pairs and checks ownership of individual rows.
//!
//! ```ignore
//! use letterbox::auth::permissions::{RequiresPermission, operation, resource};
//!
//! async fn create_tier(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<resource::SubscriptionTiers, operation::CreateOwn>,
//! ) -> Result<Json<TierResponse>> { ... }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
