//! OpenAPI document for the HTTP API, served at `/openapi.json` and rendered by Scalar at
//! `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Registers the two ways a session token can be presented.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `POST /authentication/login`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "matchdesk_session",
                    "Session cookie set by `POST /authentication/login`",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "matchdesk",
        description = "Lead intake, payment approval and paid-client tracking for a matchmaking agency.

Agents (`cro_agent`) and matchmakers only see leads assigned to them. Super admins see everything, decide payment requests, and manage accounts and settings."
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::create_user,
        api::handlers::users::update_user,
        api::handlers::users::toggle_user_status,
        api::handlers::users::delete_user,
        api::handlers::traffic::list_traffic,
        api::handlers::traffic::get_traffic,
        api::handlers::traffic::create_traffic,
        api::handlers::traffic::update_traffic,
        api::handlers::traffic::delete_traffic,
        api::handlers::payments::create_payment,
        api::handlers::payments::list_payments,
        api::handlers::payments::list_pending_payments,
        api::handlers::payments::get_payment,
        api::handlers::payments::accept_payment,
        api::handlers::payments::cancel_payment,
        api::handlers::payments::update_payment,
        api::handlers::payments::delete_payment,
        api::handlers::paid_clients::list_paid_clients,
        api::handlers::paid_clients::update_paid_client,
        api::handlers::settings::list_settings,
        api::handlers::settings::create_setting,
        api::handlers::settings::update_setting,
        api::handlers::settings::delete_setting,
        api::handlers::dashboard::get_stats,
    ),
    components(
        schemas(
            api::models::users::Role,
            api::models::users::UserCreate,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::pagination::PaginatedResponse<api::models::users::UserResponse>,
            api::models::traffic::TrafficStatus,
            api::models::traffic::Priority,
            api::models::traffic::TrafficProfile,
            api::models::traffic::TrafficCreate,
            api::models::traffic::TrafficUpdate,
            api::models::traffic::TrafficResponse,
            api::models::pagination::PaginatedResponse<api::models::traffic::TrafficResponse>,
            api::models::payments::PaymentStatus,
            api::models::payments::PaymentCreate,
            api::models::payments::PaymentUpdate,
            api::models::payments::PaymentResponse,
            api::models::payments::PaymentRequestResponse,
            api::models::pagination::PaginatedResponse<api::models::payments::PaymentResponse>,
            api::models::pagination::PageInfo,
            api::models::paid_clients::PaidClientResponse,
            api::models::paid_clients::PaidClientPage,
            api::models::settings::SettingCategory,
            api::models::settings::SettingCreate,
            api::models::settings::SettingUpdate,
            api::models::settings::SettingResponse,
            api::models::dashboard::DashboardStats,
        )
    ),
    tags(
        (name = "accounts", description = "Staff accounts. Managed by super admins; everyone can read their own via `current`."),
        (name = "traffic", description = "Leads. Agents and matchmakers see and edit only the leads assigned to them."),
        (name = "payments", description = "Payment requests raised against a lead.

A request starts `pending`. A super admin either accepts it, which marks the lead `paid`, or cancels it. Both outcomes are final; deciding an already decided request returns 409 with its `currentStatus`."),
        (name = "paid_clients", description = "Leads with at least one accepted payment, paginated by page number and filterable by profile fields."),
        (name = "settings", description = "Lookup values for dropdowns, grouped by category."),
        (name = "dashboard", description = "Headline counts, scoped like the lists they summarize."),
    )
)]
pub struct ApiDoc;

/// Authentication routes live outside `/api`, so they get their own document merged in at
/// serve time.
#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::change_password,
    ),
    components(schemas(
        api::models::auth::LoginRequest,
        api::models::auth::AuthResponse,
        api::models::auth::AuthSuccessResponse,
        api::models::auth::ChangePasswordRequest,
    )),
    tags(
        (name = "authentication", description = "Session login and logout, and password changes."),
    )
)]
pub struct AuthApiDoc;

/// The complete document: management API paths prefixed with `/api`, plus authentication.
pub fn document() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.paths.paths = std::mem::take(&mut doc.paths.paths)
        .into_iter()
        .map(|(path, item)| (format!("/api{path}"), item))
        .collect();
    doc.merge(AuthApiDoc::openapi());
    doc
}
