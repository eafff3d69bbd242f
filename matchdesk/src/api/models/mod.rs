//! API request and response data models.
//!
//! This module contains the data structures used for HTTP request deserialization
//! and response serialization. These models define the public API contract.
//!
//! # Design Principles
//!
//! - **Separation of Concerns**: API models are distinct from database models,
//!   allowing independent evolution of API and storage representations
//! - **Closed vocabularies**: Roles, statuses, priorities and setting categories are enums,
//!   so unknown values are rejected during deserialization
//! - **OpenAPI**: All models are annotated with `utoipa` for automatic API docs
//! - **camelCase**: Every JSON field is camelCase on the wire
//!
//! # Model Categories
//!
//! - [`users`]: Accounts, roles, and creation/update requests
//! - [`traffic`]: Leads and their profile fields
//! - [`payments`]: Payment requests and their status
//! - [`paid_clients`]: Leads with an accepted payment, with page pagination
//! - [`settings`]: Lookup values grouped by category
//! - [`dashboard`]: Scoped headline statistics
//! - [`auth`]: Login and password management payloads
//! - [`pagination`]: Shared pagination parameters and envelopes
//!
//! # Example
//!
//! ```ignore
//! use matchdesk::api::models::traffic::{TrafficCreate, TrafficResponse};
//!
//! let create_req: TrafficCreate = serde_json::from_str(json_str)?;
//! ```

pub mod auth;
pub mod dashboard;
pub mod paid_clients;
pub mod pagination;
pub mod payments;
pub mod settings;
pub mod traffic;
pub mod users;
