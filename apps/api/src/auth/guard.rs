//! Authorization Guard: role gates and ownership checks.
//!
//! Everything here is pure: decisions depend only on the requester and the
//! owner id of an already-fetched record. Callers check `NotFound` first.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Employer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Employer => "employer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: Uuid,
    pub role: Role,
}

/// A record with a single owning user.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

/// True iff the requester is an admin or owns the resource.
pub fn can_mutate(requester: &Requester, resource_owner_id: Uuid) -> bool {
    match requester.role {
        Role::Admin => true,
        Role::User | Role::Employer => requester.id == resource_owner_id,
    }
}

pub fn ensure_can_mutate<R: Owned>(
    requester: &Requester,
    resource: &R,
    what: &str,
) -> Result<(), AppError> {
    if can_mutate(requester, resource.owner_id()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "User({}) is not allowed to modify this {what}",
            requester.id
        )))
    }
}

/// Route-level role gate.
pub fn require_role(requester: &Requester, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&requester.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role({}) is not allowed to access this resource",
            requester.role
        )))
    }
}
