//! Lead (traffic) handlers.
//!
//! Non-admins only ever see leads assigned to them: reading someone else's lead answers 404 so
//! its existence is not revealed, while writing it answers 403.

use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::traffic::{ListTrafficQuery, TrafficCreate, TrafficResponse, TrafficStatus, TrafficUpdate};
use crate::api::models::users::CurrentUser;
use crate::auth::permissions::{authorize, operation, resource, scope, RequiresPermission};
use crate::db::errors::DbError;
use crate::db::handlers::{traffic::TrafficFilter, Repository, Traffic};
use crate::db::models::traffic::{TrafficCreateDBRequest, TrafficDBResponse};
use crate::errors::{Error, Result};
use crate::types::{Operation, Resource, Scope, TrafficId};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::PgConnection;
use tracing::info;

fn not_found(id: TrafficId) -> Error {
    Error::NotFound {
        resource: "Traffic".to_string(),
        id: id.to_string(),
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

fn is_visible(lead: &TrafficDBResponse, scope: Scope) -> bool {
    match scope {
        Scope::All => true,
        Scope::AssignedTo(assignee) => lead.assigned_by == assignee,
    }
}

const PAID_STATUS_LOCKED: &str = "A paid lead cannot change status";

/// Business rules for a lead patch, checked against the stored lead.
///
/// `paid` is reserved for payment acceptance, so a patch may neither set it nor move a paid
/// lead away from it. Reassignment is a super admin action.
pub(crate) fn check_update(actor: &CurrentUser, lead: &TrafficDBResponse, update: &TrafficUpdate) -> Result<()> {
    if let Some(name) = &update.name {
        require_text("name", name)?;
    }
    if let Some(contact_number) = &update.contact_number {
        require_text("contactNumber", contact_number)?;
    }

    match (lead.status, update.status) {
        (TrafficStatus::Paid, Some(status)) if status != TrafficStatus::Paid => {
            return Err(Error::BadRequest {
                message: PAID_STATUS_LOCKED.to_string(),
            });
        }
        (current, Some(TrafficStatus::Paid)) if current != TrafficStatus::Paid => {
            return Err(Error::BadRequest {
                message: "Status 'paid' is set only by accepting a payment".to_string(),
            });
        }
        _ => {}
    }

    if update.assigned_by.is_some_and(|assignee| assignee != lead.assigned_by) {
        authorize(actor, Resource::Traffic, Operation::UpdateAll)?;
    }

    Ok(())
}

/// Write a checked patch. The lead may have been accepted as paid since [`check_update`] read
/// it; the repository then refuses the status change and this answers 400 like the early check.
pub(crate) async fn apply_update(conn: &mut PgConnection, id: TrafficId, update: &TrafficUpdate) -> Result<TrafficDBResponse> {
    match Traffic::new(conn).update(id, update).await {
        Ok(lead) => Ok(lead),
        Err(DbError::NotFound) => Err(not_found(id)),
        Err(DbError::ProtectedEntity { .. }) => Err(Error::BadRequest {
            message: PAID_STATUS_LOCKED.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Load a lead for writing: 404 when missing, 403 when it belongs to someone else.
pub(crate) async fn load_for_write(conn: &mut PgConnection, actor: &CurrentUser, id: TrafficId, all: Operation) -> Result<TrafficDBResponse> {
    let lead = Traffic::new(conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;
    if !is_visible(&lead, scope(actor)) {
        authorize(actor, Resource::Traffic, all)?;
    }
    Ok(lead)
}

#[utoipa::path(
    get,
    path = "/traffic",
    tag = "traffic",
    summary = "List leads",
    params(ListTrafficQuery),
    responses(
        (status = 200, description = "Page of leads visible to the caller", body = PaginatedResponse<TrafficResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Account disabled"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_traffic(
    State(state): State<AppState>,
    Query(query): Query<ListTrafficQuery>,
    current_user: RequiresPermission<resource::Traffic, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<TrafficResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = TrafficFilter {
        status: query.status,
        priority: query.priority,
        q: query.q,
        ..TrafficFilter::new(scope(&current_user), skip, limit)
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Traffic::new(&mut pool_conn);

    let leads = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    let data = leads.into_iter().map(TrafficResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/traffic/{traffic_id}",
    tag = "traffic",
    summary = "Get lead",
    responses(
        (status = 200, description = "Lead details", body = TrafficResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lead not found or not assigned to the caller"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("traffic_id" = uuid::Uuid, Path, description = "Lead ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_traffic(
    State(state): State<AppState>,
    Path(traffic_id): Path<TrafficId>,
    current_user: RequiresPermission<resource::Traffic, operation::ReadOwn>,
) -> Result<Json<TrafficResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Traffic::new(&mut pool_conn).get_by_id(traffic_id).await? {
        Some(lead) if is_visible(&lead, scope(&current_user)) => Ok(Json(TrafficResponse::from(lead))),
        _ => Err(not_found(traffic_id)),
    }
}

#[utoipa::path(
    post,
    path = "/traffic",
    tag = "traffic",
    summary = "Create lead",
    request_body = TrafficCreate,
    responses(
        (status = 201, description = "Lead created", body = TrafficResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only super admins may assign a lead to someone else"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_traffic(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Traffic, operation::CreateOwn>,
    Json(create): Json<TrafficCreate>,
) -> Result<(StatusCode, Json<TrafficResponse>)> {
    require_text("name", &create.name)?;
    require_text("contactNumber", &create.contact_number)?;

    let status = create.status.unwrap_or_default();
    if status == TrafficStatus::Paid {
        return Err(Error::BadRequest {
            message: "Status 'paid' is set only by accepting a payment".to_string(),
        });
    }

    let assigned_by = match create.assigned_by {
        Some(assignee) if assignee != current_user.id => {
            authorize(&current_user, Resource::Traffic, Operation::CreateAll)?;
            assignee
        }
        _ => current_user.id,
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = Traffic::new(&mut pool_conn)
        .create(&TrafficCreateDBRequest {
            name: create.name,
            contact_number: create.contact_number,
            email: create.email,
            priority: create.priority.unwrap_or_default(),
            status,
            assigned_by,
            created_by: current_user.id,
            profile: create.profile,
        })
        .await?;

    info!(traffic_id = %lead.id, assigned_by = %lead.assigned_by, "Lead created");
    Ok((StatusCode::CREATED, Json(TrafficResponse::from(lead))))
}

#[utoipa::path(
    patch,
    path = "/traffic/{traffic_id}",
    tag = "traffic",
    summary = "Update lead",
    request_body = TrafficUpdate,
    responses(
        (status = 200, description = "Lead updated", body = TrafficResponse),
        (status = 400, description = "Invalid request, including status changes involving 'paid'"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Lead is assigned to someone else, or reassignment by a non-admin"),
        (status = 404, description = "Lead not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("traffic_id" = uuid::Uuid, Path, description = "Lead ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_traffic(
    State(state): State<AppState>,
    Path(traffic_id): Path<TrafficId>,
    current_user: RequiresPermission<resource::Traffic, operation::UpdateOwn>,
    Json(update): Json<TrafficUpdate>,
) -> Result<Json<TrafficResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let lead = load_for_write(&mut pool_conn, &current_user, traffic_id, Operation::UpdateAll).await?;
    check_update(&current_user, &lead, &update)?;

    let lead = apply_update(&mut pool_conn, traffic_id, &update).await?;
    Ok(Json(TrafficResponse::from(lead)))
}

#[utoipa::path(
    delete,
    path = "/traffic/{traffic_id}",
    tag = "traffic",
    summary = "Delete lead",
    responses(
        (status = 204, description = "Lead deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Lead is assigned to someone else"),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "Lead has payment records"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("traffic_id" = uuid::Uuid, Path, description = "Lead ID")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_traffic(
    State(state): State<AppState>,
    Path(traffic_id): Path<TrafficId>,
    current_user: RequiresPermission<resource::Traffic, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    load_for_write(&mut pool_conn, &current_user, traffic_id, Operation::DeleteAll).await?;

    if Traffic::new(&mut pool_conn).delete(traffic_id).await? {
        info!(traffic_id = %traffic_id, "Lead deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(traffic_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::traffic::Priority;
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    fn lead(status: TrafficStatus, assignee: uuid::Uuid) -> TrafficDBResponse {
        TrafficDBResponse {
            id: uuid::Uuid::new_v4(),
            name: "Meera".to_string(),
            contact_number: "01700000000".to_string(),
            email: None,
            priority: Priority::Medium,
            status,
            assigned_by: assignee,
            created_by: assignee,
            profile: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn actor(role: Role) -> CurrentUser {
        CurrentUser {
            id: uuid::Uuid::new_v4(),
            username: "actor".to_string(),
            role,
            is_enabled: true,
        }
    }

    #[test]
    fn test_paid_status_rules() {
        let agent = actor(Role::CroAgent);
        let set_status = |status| TrafficUpdate {
            status: Some(status),
            ..Default::default()
        };

        let pending = lead(TrafficStatus::Pending, agent.id);
        assert!(check_update(&agent, &pending, &set_status(TrafficStatus::Active)).is_ok());
        let err = check_update(&agent, &pending, &set_status(TrafficStatus::Paid)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let paid = lead(TrafficStatus::Paid, agent.id);
        let err = check_update(&agent, &paid, &set_status(TrafficStatus::Inactive)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        // Re-stating the current status and editing other fields is fine
        assert!(check_update(&agent, &paid, &set_status(TrafficStatus::Paid)).is_ok());
        let rename = TrafficUpdate {
            name: Some("Meera K".to_string()),
            ..Default::default()
        };
        assert!(check_update(&agent, &paid, &rename).is_ok());

        // Super admins follow the same status rules
        let admin = actor(Role::SuperAdmin);
        assert!(check_update(&admin, &paid, &set_status(TrafficStatus::Pending)).is_err());
    }

    #[test]
    fn test_reassignment_requires_super_admin() {
        let agent = actor(Role::Matchmaker);
        let own = lead(TrafficStatus::Pending, agent.id);
        let reassign = TrafficUpdate {
            assigned_by: Some(uuid::Uuid::new_v4()),
            ..Default::default()
        };

        let err = check_update(&agent, &own, &reassign).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(check_update(&actor(Role::SuperAdmin), &own, &reassign).is_ok());

        let unchanged = TrafficUpdate {
            assigned_by: Some(agent.id),
            ..Default::default()
        };
        assert!(check_update(&agent, &own, &unchanged).is_ok());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_list_are_scoped(pool: PgPool) {
        let (app, _bg_services) = create_test_app(pool.clone()).await;
        let agent_a = create_test_user(&pool, Role::CroAgent).await;
        let agent_b = create_test_user(&pool, Role::Matchmaker).await;
        let admin = create_test_admin_user(&pool).await;

        let response = app
            .post("/api/traffic")
            .add_header(add_auth_headers(&agent_a).0, add_auth_headers(&agent_a).1)
            .json(&json!({
                "name": "Meera",
                "contactNumber": "+8801700000000",
                "gender": "Female",
                "candidatePictures": ["https://cdn.example.com/a.jpg"]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: TrafficResponse = response.json();
        assert_eq!(created.assigned_by, agent_a.id);
        assert_eq!(created.created_by, agent_a.id);
        assert_eq!(created.priority, Priority::Medium);
        assert_eq!(created.status, TrafficStatus::Pending);
        assert_eq!(created.profile.gender.as_deref(), Some("Female"));

        create_test_traffic(&pool, agent_b.id).await;

        let response = app
            .get("/api/traffic")
            .add_header(add_auth_headers(&agent_a).0, add_auth_headers(&agent_a).1)
            .await;
        response.assert_status_ok();
        let page: PaginatedResponse<TrafficResponse> = response.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, created.id);

        let response = app
            .get("/api/traffic?q=meer")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await;
        let page: PaginatedResponse<TrafficResponse> = response.json();
        assert_eq!(page.total_count, 1);

        let response = app
            .get("/api/traffic")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await;
        let page: PaginatedResponse<TrafficResponse> = response.json();
        assert_eq!(page.total_count, 2);

        // Another agent's lead is invisible, not forbidden
        app.get(&format!("/api/traffic/{}", created.id))
            .add_header(add_auth_headers(&agent_b).0, add_auth_headers(&agent_b).1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.get(&format!("/api/traffic/{}", created.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_assignment_rules(pool: PgPool) {
        let (app, _bg_services) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::CroAgent).await;
        let other = create_test_user(&pool, Role::CroAgent).await;
        let admin = create_test_admin_user(&pool).await;

        app.post("/api/traffic")
            .add_header(add_auth_headers(&agent).0, add_auth_headers(&agent).1)
            .json(&json!({"name": "Rafi", "contactNumber": "017", "assignedBy": other.id}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.post("/api/traffic")
            .add_header(add_auth_headers(&agent).0, add_auth_headers(&agent).1)
            .json(&json!({"name": "Rafi", "contactNumber": "017", "status": "paid"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/api/traffic")
            .add_header(add_auth_headers(&agent).0, add_auth_headers(&agent).1)
            .json(&json!({"name": "  ", "contactNumber": "017"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .post("/api/traffic")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"name": "Rafi", "contactNumber": "017", "assignedBy": other.id, "priority": "high"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: TrafficResponse = response.json();
        assert_eq!(created.assigned_by, other.id);
        assert_eq!(created.created_by, admin.id);
        assert_eq!(created.priority, Priority::High);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_ownership_and_status(pool: PgPool) {
        let (app, _bg_services) = create_test_app(pool.clone()).await;
        let owner = create_test_user(&pool, Role::CroAgent).await;
        let stranger = create_test_user(&pool, Role::CroAgent).await;
        let lead = create_test_traffic(&pool, owner.id).await;

        app.patch(&format!("/api/traffic/{}", lead.id))
            .add_header(add_auth_headers(&stranger).0, add_auth_headers(&stranger).1)
            .json(&json!({"name": "Hijacked"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.patch(&format!("/api/traffic/{}", uuid::Uuid::new_v4()))
            .add_header(add_auth_headers(&owner).0, add_auth_headers(&owner).1)
            .json(&json!({"name": "Nobody"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        app.patch(&format!("/api/traffic/{}", lead.id))
            .add_header(add_auth_headers(&owner).0, add_auth_headers(&owner).1)
            .json(&json!({"status": "paid"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .patch(&format!("/api/traffic/{}", lead.id))
            .add_header(add_auth_headers(&owner).0, add_auth_headers(&owner).1)
            .json(&json!({"status": "active", "email": "meera@example.com", "dateOfBirth": "1994-03-02"}))
            .await;
        response.assert_status_ok();
        let updated: TrafficResponse = response.json();
        assert_eq!(updated.status, TrafficStatus::Active);
        assert_eq!(updated.email.as_deref(), Some("meera@example.com"));

        let response = app
            .patch(&format!("/api/traffic/{}", lead.id))
            .add_header(add_auth_headers(&owner).0, add_auth_headers(&owner).1)
            .json(&json!({"email": null}))
            .await;
        let updated: TrafficResponse = response.json();
        assert!(updated.email.is_none());
        assert!(updated.profile.date_of_birth.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_status_patch_loses_to_concurrent_acceptance(pool: PgPool) {
        let owner = create_test_user(&pool, Role::CroAgent).await;
        let admin = CurrentUser::from(create_test_admin_user(&pool).await);
        let lead = create_test_traffic(&pool, owner.id).await;
        let payment = create_test_payment(&pool, lead.id, owner.id).await;

        let actor = CurrentUser::from(owner);
        let mut conn = pool.acquire().await.unwrap();
        let stale = load_for_write(&mut conn, &actor, lead.id, Operation::UpdateAll).await.unwrap();
        let update = TrafficUpdate {
            status: Some(TrafficStatus::Inactive),
            ..Default::default()
        };
        check_update(&actor, &stale, &update).unwrap();

        crate::workflow::payments::accept_payment(&pool, &admin, payment.id)
            .await
            .unwrap();

        let err = apply_update(&mut conn, lead.id, &update).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let stored = Traffic::new(&mut conn).get_by_id(lead.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TrafficStatus::Paid);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_rules(pool: PgPool) {
        let (app, _bg_services) = create_test_app(pool.clone()).await;
        let owner = create_test_user(&pool, Role::Matchmaker).await;
        let stranger = create_test_user(&pool, Role::CroAgent).await;
        let plain = create_test_traffic(&pool, owner.id).await;
        let with_payment = create_test_traffic(&pool, owner.id).await;
        create_test_payment(&pool, with_payment.id, owner.id).await;

        app.delete(&format!("/api/traffic/{}", plain.id))
            .add_header(add_auth_headers(&stranger).0, add_auth_headers(&stranger).1)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.delete(&format!("/api/traffic/{}", with_payment.id))
            .add_header(add_auth_headers(&owner).0, add_auth_headers(&owner).1)
            .await
            .assert_status(StatusCode::CONFLICT);

        app.delete(&format!("/api/traffic/{}", plain.id))
            .add_header(add_auth_headers(&owner).0, add_auth_headers(&owner).1)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        app.delete(&format!("/api/traffic/{}", plain.id))
            .add_header(add_auth_headers(&owner).0, add_auth_headers(&owner).1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
