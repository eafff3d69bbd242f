//! Role based permission checks.
//!
//! Permissions are a static table keyed by [`Role`]. An `All` grant implies the matching `Own`
//! grant, so super admins pass every `*Own` check as well. Disabled accounts hold no
//! permissions at all; the [`CurrentUser`] extractor already rejects them, and
//! [`has_permission`] fails closed for them too.
//!
//! Handlers either declare the permission in their signature:
//!
//! ```ignore
//! async fn accept(current_user: RequiresPermission<resource::Payments, operation::Review>) { .. }
//! ```
//!
//! or call [`authorize`] / [`scope`] when the rule depends on the row being touched.

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
    types::{Operation, Permission, Resource, Scope},
};

/// Grants for the two agent roles. CRO agents and matchmakers differ only in job function.
const AGENT_PERMISSIONS: &[(Resource, Operation)] = &[
    (Resource::Users, Operation::ReadOwn),
    (Resource::Users, Operation::UpdateOwn),
    (Resource::Traffic, Operation::CreateOwn),
    (Resource::Traffic, Operation::ReadOwn),
    (Resource::Traffic, Operation::UpdateOwn),
    (Resource::Traffic, Operation::DeleteOwn),
    (Resource::Payments, Operation::CreateOwn),
    (Resource::Payments, Operation::ReadOwn),
    (Resource::PaidClients, Operation::ReadOwn),
    (Resource::Settings, Operation::ReadAll),
    (Resource::Dashboard, Operation::ReadOwn),
];

fn role_grants(role: Role, resource: Resource, operation: Operation) -> bool {
    match role {
        Role::SuperAdmin => true,
        Role::CroAgent | Role::Matchmaker => AGENT_PERMISSIONS.contains(&(resource, operation)),
    }
}

/// Whether `user` may perform `operation` on `resource`.
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    if !user.is_enabled {
        return false;
    }
    if role_grants(user.role, resource, operation) {
        return true;
    }
    // An `All` grant covers the `Own` variant of the same operation
    [
        Operation::CreateAll,
        Operation::ReadAll,
        Operation::UpdateAll,
        Operation::DeleteAll,
    ]
    .into_iter()
    .any(|all| all.own() == Some(operation) && role_grants(user.role, resource, all))
}

pub fn can_read_all_resources(user: &CurrentUser, resource: Resource) -> bool {
    has_permission(user, resource, Operation::ReadAll)
}

/// Check a permission, producing the error the caller should return when it is missing.
pub fn authorize(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    if !user.is_enabled {
        return Err(Error::AccountDisabled);
    }
    if has_permission(user, resource, operation) {
        return Ok(());
    }
    Err(Error::InsufficientPermissions {
        required: Permission::Allow(resource, operation),
        action: operation,
        resource: resource.to_string(),
        role: user.role,
    })
}

/// Rows a user may see in role-scoped queries: everything for super admins, otherwise only
/// records assigned to them.
pub fn scope(user: &CurrentUser) -> Scope {
    if user.is_super_admin() {
        Scope::All
    } else {
        Scope::AssignedTo(user.id)
    }
}

/// Type-level resources for [`RequiresPermission`].
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker: Send + Sync + 'static {
        const RESOURCE: Resource;
    }

    macro_rules! resources {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    resources!(Users, Traffic, Payments, PaidClients, Settings, Dashboard);
}

/// Type-level operations for [`RequiresPermission`].
pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker: Send + Sync + 'static {
        const OPERATION: Operation;
    }

    macro_rules! operations {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    operations!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn, Review);
}

/// Extractor that authenticates the caller and checks a permission before the handler runs.
/// Dereferences to the [`CurrentUser`].
pub struct RequiresPermission<R, O> {
    user: CurrentUser,
    _marker: PhantomData<fn() -> (R, O)>,
}

impl<R, O> RequiresPermission<R, O> {
    pub fn into_inner(self) -> CurrentUser {
        self.user
    }
}

impl<R, O> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &CurrentUser {
        &self.user
    }
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: resource::ResourceMarker,
    O: operation::OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        authorize(&user, R::RESOURCE, O::OPERATION)?;

        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}
