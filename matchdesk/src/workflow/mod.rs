//! Multi-step operations that span more than one repository.
//!
//! - [`payments`]: Payment request creation and the accept/cancel decision
//! - [`reconciler`]: Background task that repairs interrupted acceptances
//!
//! Every operation takes the acting [`crate::api::models::users::CurrentUser`] explicitly and
//! checks its permission before touching the database, so the rules are testable without an
//! HTTP harness.

pub mod payments;
pub mod reconciler;
