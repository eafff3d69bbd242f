//! PostgreSQL persistence.
//!
//! Each table has a repository in [`handlers`] that borrows a `&mut PgConnection`, and plain
//! row structs in [`models`]. API handlers acquire a connection (or open a transaction) and
//! hand it to whichever repository they need:
//!
//! ```ignore
//! use matchdesk::db::handlers::{Repository, Traffic};
//!
//! let mut conn = pool.acquire().await?;
//! let lead = Traffic::new(&mut conn).get_by_id(traffic_id).await?;
//! ```
//!
//! Role scoping lives here too. Listing and counting queries take a [`crate::types::Scope`] and
//! push it into the same `QueryBuilder` predicate, so a page and its total never disagree.
//!
//! Payment acceptance is two statements on one connection rather than a transaction: the
//! conditional status update decides the race, and [`crate::workflow::reconciler`] covers a
//! lost second write.
//!
//! Migrations live in `migrations/` and are embedded through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
