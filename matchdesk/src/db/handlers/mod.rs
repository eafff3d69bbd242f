//! Repository implementations for database access.
//!
//! This module provides repository structs for each major entity in the system.
//! Repositories follow a consistent pattern and implement the [`Repository`] trait.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//!
//! Role-scoped repositories take a [`crate::types::Scope`] and build one predicate function
//! that both their list and count queries use.
//!
//! # Available Repositories
//!
//! - [`Users`]: Accounts and stored credentials
//! - [`Traffic`]: Leads, including the `paid` promotion
//! - [`Payments`]: Payment requests and their conditional status transition
//! - [`PaidClients`]: Read-only view over leads with an accepted payment
//! - [`Settings`]: Lookup values grouped by category
//! - [`Dashboard`]: Scoped aggregate counts
//!
//! # Common Pattern
//!
//! ```ignore
//! use matchdesk::db::handlers::{Traffic, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = Traffic::new(&mut tx);
//!     let lead = repo.get_by_id(lead_id).await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod dashboard;
pub mod paid_clients;
pub mod payments;
pub mod repository;
pub mod settings;
pub mod traffic;
pub mod users;

pub use dashboard::Dashboard;
pub use paid_clients::PaidClients;
pub use payments::Payments;
pub use repository::Repository;
pub use settings::Settings;
pub use traffic::Traffic;
pub use users::Users;

/// `%q%` for an `ILIKE .. ESCAPE '\'` match that treats `q` literally: `%`, `_` and `\` in
/// user input match themselves rather than acting as wildcards.
pub(crate) fn contains_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
