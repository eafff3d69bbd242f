//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response bodies and query parameters
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): Login, logout, password change
//! - **Accounts** (`/api/accounts/*`): Staff account management
//! - **Traffic** (`/api/traffic/*`): Leads
//! - **Payments** (`/api/payments/*`): Payment requests and decisions
//! - **Paid clients** (`/api/paid-clients/*`): Converted leads
//! - **Settings** (`/api/settings/*`): Lookup values
//! - **Dashboard** (`/api/dashboard/stats`)
//!
//! Every route is annotated with `utoipa`; the rendered documentation is served at `/docs`.

pub mod handlers;
pub mod models;
