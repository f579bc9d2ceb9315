//! # Authorization Gate
//!
//! Decides whether a caller may manage replication slots. Allowed:
//! superusers, roles with the replication attribute, and members of the
//! configured delegated role. Pure; runs before any slot state changes.

use crate::errors::{SlotError, SlotResult};

use super::identity::Identity;
use super::roles::RoleProvider;

/// Delegated role used when configuration does not name one.
pub const DEFAULT_DELEGATED_ROLE: &str = "mdb_replication";

/// Slot management authorization.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    delegated_role: Option<String>,
}

impl Default for AuthorizationGate {
    fn default() -> Self {
        Self::new(Some(DEFAULT_DELEGATED_ROLE.to_string()))
    }
}

impl AuthorizationGate {
    /// `delegated_role: None` disables delegation entirely.
    pub fn new(delegated_role: Option<String>) -> Self {
        Self { delegated_role }
    }

    pub fn delegated_role(&self) -> Option<&str> {
        self.delegated_role.as_deref()
    }

    /// Returns `Ok(())` if `identity` may manage replication slots.
    pub fn authorize(&self, roles: &dyn RoleProvider, identity: &Identity) -> SlotResult<()> {
        if roles.is_superuser(identity) || roles.has_replication(identity) {
            return Ok(());
        }

        // A delegated role that was never created grants nothing.
        if let Some(delegated) = self.delegated_role.as_deref() {
            if roles.role_exists(delegated) && roles.is_member_of(identity, delegated) {
                return Ok(());
            }
        }

        Err(SlotError::PermissionDenied {
            role: identity.role().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{RoleCatalog, RoleDefinition};

    fn catalog() -> RoleCatalog {
        RoleCatalog::from_definitions([
            RoleDefinition::new("postgres").superuser(),
            RoleDefinition::new("repl").replication(),
            RoleDefinition::new("mdb_replication"),
            RoleDefinition::new("ops").member_of("mdb_replication"),
            RoleDefinition::new("app"),
        ])
    }

    #[test]
    fn test_superuser_allowed() {
        let gate = AuthorizationGate::default();
        assert!(gate.authorize(&catalog(), &Identity::new("postgres")).is_ok());
    }

    #[test]
    fn test_replication_attribute_allowed() {
        let gate = AuthorizationGate::default();
        assert!(gate.authorize(&catalog(), &Identity::new("repl")).is_ok());
    }

    #[test]
    fn test_delegated_member_allowed() {
        let gate = AuthorizationGate::default();
        assert!(gate.authorize(&catalog(), &Identity::new("ops")).is_ok());
    }

    #[test]
    fn test_plain_role_denied() {
        let gate = AuthorizationGate::default();
        let err = gate.authorize(&catalog(), &Identity::new("app")).unwrap_err();
        assert!(matches!(err, SlotError::PermissionDenied { ref role } if role == "app"));
    }

    #[test]
    fn test_delegation_disabled() {
        let gate = AuthorizationGate::new(None);
        assert!(gate.authorize(&catalog(), &Identity::new("ops")).is_err());
        assert!(gate.authorize(&catalog(), &Identity::new("repl")).is_ok());
    }

    #[test]
    fn test_missing_delegated_role_grants_nothing() {
        let gate = AuthorizationGate::new(Some("slot_admins".into()));
        assert!(gate.authorize(&catalog(), &Identity::new("ops")).is_err());
    }
}
