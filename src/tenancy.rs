//! # Tenant guard
//!
//! Single source of truth for tenant isolation. Every pipeline resolves the
//! company scope it operates in through [`resolve_scope`] and checks access to
//! an existing batch through [`authorize_resource`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::user::{self, Role};

/// Tenant identifier (a company id)
pub type TenantId = Uuid;

/// The authenticated principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    /// Company the actor belongs to; owners usually have none
    pub company_id: Option<TenantId>,
}

impl Actor {
    pub fn new(id: Uuid, role: Role, company_id: Option<TenantId>) -> Self {
        Self {
            id,
            role,
            company_id,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

impl From<&user::Model> for Actor {
    fn from(user: &user::Model) -> Self {
        Self::new(user.id, user.role, user.company_id)
    }
}

/// Resolve the company scope an operation runs in.
///
/// Owners get `requested` back unchanged, where `None` means global. Any
/// other actor is pinned to their own company.
pub fn resolve_scope(
    actor: &Actor,
    requested: Option<TenantId>,
) -> Result<Option<TenantId>, PipelineError> {
    if actor.is_owner() {
        return Ok(requested);
    }

    if let Some(requested) = requested
        && actor.company_id != Some(requested)
    {
        tracing::warn!(
            actor_id = %actor.id,
            requested = %requested,
            "Cross-tenant access rejected"
        );
        return Err(PipelineError::forbidden(
            "cannot act on behalf of another company",
        ));
    }

    match actor.company_id {
        Some(own) => Ok(Some(own)),
        None => Err(PipelineError::ScopeRequired),
    }
}

/// Only owners and administrators pass
pub fn require_elevated(actor: &Actor) -> Result<(), PipelineError> {
    if actor.role.is_elevated() {
        Ok(())
    } else {
        Err(PipelineError::forbidden("administrator role required"))
    }
}

/// Check that `actor` may touch a resource living in `resource_scope`
pub fn authorize_resource(
    actor: &Actor,
    resource_scope: Option<TenantId>,
) -> Result<(), PipelineError> {
    if actor.is_owner() {
        return Ok(());
    }

    let effective = resolve_scope(actor, None)?;
    if effective == resource_scope {
        Ok(())
    } else {
        Err(PipelineError::forbidden("resource belongs to another company"))
    }
}
