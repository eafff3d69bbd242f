//! Authentication and authorization.
//!
//! # Authentication
//!
//! Users log in via `/authentication/login` with username and password and receive a signed
//! JWT, both as an HTTP-only session cookie and in the response. Later requests present it as
//! that cookie or as `Authorization: Bearer <token>`. The token only identifies the account:
//! the [`current_user`] extractor reloads the user on every request, so role changes and
//! disabling apply immediately, and a disabled account is rejected there before any route
//! specific check runs.
//!
//! # Authorization
//!
//! Access is decided by role (`cro_agent`, `matchmaker`, `super_admin`) and, for leads and
//! everything hanging off them, by assignment: non-admins only see records whose
//! `assigned_by` is themselves. See [`permissions`].
//!
//! # Modules
//!
//! - [`current_user`]: Extractor for the authenticated user
//! - [`password`]: Credential hashing and verification using Argon2id
//! - [`permissions`]: Role permission table, scoping and the `RequiresPermission` extractor
//! - [`session`]: JWT creation/verification and the session cookie
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use matchdesk::auth::permissions::{operation, resource, RequiresPermission};
//!
//! async fn accept_payment(
//!     current_user: RequiresPermission<resource::Payments, operation::Review>,
//!     State(state): State<AppState>,
//! ) -> Result<Json<PaymentResponse>> {
//!     // only super admins reach this point
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
