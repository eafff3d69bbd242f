//! Database record models matching table schemas.
//!
//! Models are distinct from API models so storage and wire representations can evolve
//! independently. Row structs derive `sqlx::FromRow`; closed enumerations (roles, statuses,
//! setting categories) are shared with the API layer and stored as snake_case text.
//!
//! # Conversion to API Models
//!
//! ```ignore
//! use matchdesk::db::models::traffic::TrafficDBResponse;
//! use matchdesk::api::models::traffic::TrafficResponse;
//!
//! let db_row: TrafficDBResponse = /* ... */;
//! let api_response: TrafficResponse = db_row.into();
//! ```

pub mod paid_clients;
pub mod payments;
pub mod settings;
pub mod traffic;
pub mod users;
