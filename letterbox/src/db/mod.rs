//! Data access layer over PostgreSQL with SQLx.
//!
//! - [`handlers`]: repositories, one per table or closely related group of tables
//! - [`models`]: request structs and the rows repositories return
//! - [`errors`]: database error classification
//!
//! Handlers open a transaction (or acquire a connection for read-only work) and build
//! repositories on it:
//!
//! ```ignore
//! let mut tx = state.db.begin().await?;
//! let mut funds = BrandFunds::new(&mut tx);
//! funds.reserve(brand_id, budget).await?;
//! tx.commit().await?;
//! ```
//!
//! Migrations live in `migrations/` and are embedded with [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
