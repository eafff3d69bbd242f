//! HTTP request handlers, one module per resource.
//!
//! Handlers authenticate through the [`crate::auth::permissions::RequiresPermission`] or
//! [`crate::api::models::users::CurrentUser`] extractors, talk to the database through the
//! repositories in [`crate::db::handlers`], and return [`crate::errors::Error`] on failure.
//! Multi-step operations such as deciding a payment live in [`crate::workflow`] and the
//! handlers here only translate them to HTTP.
//!
//! - [`auth`]: Login, logout and password change
//! - [`users`]: Staff accounts (`/api/accounts`)
//! - [`traffic`]: Leads
//! - [`payments`]: Payment requests and their accept/cancel decision
//! - [`paid_clients`]: Leads with an accepted payment
//! - [`settings`]: Lookup values grouped by category
//! - [`dashboard`]: Scoped headline counts

pub mod auth;
pub mod dashboard;
pub mod paid_clients;
pub mod payments;
pub mod settings;
pub mod traffic;
pub mod users;
