//! Authorization policy.
//!
//! A pure decision function over (actor, access rule). Every mutating
//! operation in the services consults [`authorize`] before touching the
//! store; there is no ambient request context, the actor is always an
//! explicit parameter.

use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The identity initiating a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    /// No credentials presented, or none that resolved.
    Anonymous,
    /// A resolved, authenticated user.
    User {
        /// The user's id.
        id: UserId,
        /// Whether the user has staff (administrative) rights.
        is_staff: bool,
    },
}

impl Actor {
    /// Convenience constructor for a regular user actor.
    pub fn user(id: UserId) -> Self {
        Actor::User {
            id,
            is_staff: false,
        }
    }

    /// Convenience constructor for a staff actor.
    pub fn staff(id: UserId) -> Self {
        Actor::User { id, is_staff: true }
    }

    /// Returns the user id if the actor is authenticated.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Actor::Anonymous => None,
            Actor::User { id, .. } => Some(*id),
        }
    }

    /// Returns true for authenticated actors.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User { .. })
    }

    /// Returns true for staff actors.
    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::User { is_staff: true, .. })
    }
}

/// What a command requires of its actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    /// Anyone, including anonymous.
    Public,
    /// Any authenticated user.
    Authenticated,
    /// The owner of the resource, or staff.
    OwnerOrStaff {
        /// Who owns the resource.
        owner: UserId,
    },
    /// Staff only.
    StaffOnly,
    /// Nobody, ever.
    DenyAll,
}

/// Decides whether `actor` may proceed under `rule`.
///
/// Anonymous actors failing a rule get `Authentication` (they might succeed
/// after logging in); authenticated actors failing one get `Permission`.
pub fn authorize(actor: &Actor, rule: AccessRule) -> Result<(), DomainError> {
    match rule {
        AccessRule::Public => Ok(()),
        AccessRule::Authenticated => {
            if actor.is_authenticated() {
                Ok(())
            } else {
                Err(DomainError::Authentication(
                    "authentication required".to_string(),
                ))
            }
        }
        AccessRule::OwnerOrStaff { owner } => match actor {
            Actor::Anonymous => Err(DomainError::Authentication(
                "authentication required".to_string(),
            )),
            Actor::User { is_staff: true, .. } => Ok(()),
            Actor::User { id, .. } if *id == owner => Ok(()),
            Actor::User { .. } => Err(DomainError::Permission(
                "only the owner or staff may do this".to_string(),
            )),
        },
        AccessRule::StaffOnly => match actor {
            Actor::Anonymous => Err(DomainError::Authentication(
                "authentication required".to_string(),
            )),
            Actor::User { is_staff: true, .. } => Ok(()),
            Actor::User { .. } => {
                Err(DomainError::Permission("staff access required".to_string()))
            }
        },
        AccessRule::DenyAll => Err(DomainError::Permission(
            "this operation is not permitted".to_string(),
        )),
    }
}
