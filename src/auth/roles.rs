//! # Roles
//!
//! Role attributes and membership as seen by the authorization gate.
//!
//! ## Invariants
//! - Membership is transitive: a member of a member is a member
//! - Unknown roles have no attributes and belong to nothing
//! - Membership cycles terminate

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Role information consumed by the authorization gate.
pub trait RoleProvider: Send + Sync {
    /// Role has superuser privilege
    fn is_superuser(&self, identity: &Identity) -> bool;

    /// Role carries the replication attribute
    fn has_replication(&self, identity: &Identity) -> bool;

    /// Role is a direct or indirect member of `role`
    fn is_member_of(&self, identity: &Identity, role: &str) -> bool;

    /// Role `name` exists
    fn role_exists(&self, name: &str) -> bool;
}

/// A role as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,

    #[serde(default)]
    pub superuser: bool,

    #[serde(default)]
    pub replication: bool,

    /// Roles this role is a member of
    #[serde(default)]
    pub member_of: Vec<String>,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superuser: false,
            replication: false,
            member_of: Vec::new(),
        }
    }

    pub fn superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    pub fn replication(mut self) -> Self {
        self.replication = true;
        self
    }

    pub fn member_of(mut self, role: impl Into<String>) -> Self {
        self.member_of.push(role.into());
        self
    }
}

/// In-memory role catalog.
#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
    roles: HashMap<String, RoleDefinition>,
}

impl RoleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = RoleDefinition>) -> Self {
        let mut catalog = Self::new();
        for def in definitions {
            catalog.insert(def);
        }
        catalog
    }

    /// Adds or replaces a role
    pub fn insert(&mut self, definition: RoleDefinition) {
        self.roles.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&RoleDefinition> {
        self.roles.get(name)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl RoleProvider for RoleCatalog {
    fn is_superuser(&self, identity: &Identity) -> bool {
        self.get(identity.role()).map(|r| r.superuser).unwrap_or(false)
    }

    fn has_replication(&self, identity: &Identity) -> bool {
        self.get(identity.role()).map(|r| r.replication).unwrap_or(false)
    }

    fn is_member_of(&self, identity: &Identity, role: &str) -> bool {
        if !self.roles.contains_key(role) {
            return false;
        }
        if identity.role() == role {
            return true;
        }

        // Breadth-first walk over grants
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(identity.role());

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(def) = self.roles.get(current) else {
                continue;
            };
            for parent in &def.member_of {
                if parent == role {
                    return true;
                }
                queue.push_back(parent.as_str());
            }
        }

        false
    }

    fn role_exists(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> RoleCatalog {
        RoleCatalog::from_definitions([
            RoleDefinition::new("postgres").superuser(),
            RoleDefinition::new("repl").replication(),
            RoleDefinition::new("mdb_replication"),
            RoleDefinition::new("ops").member_of("mdb_replication"),
            RoleDefinition::new("oncall").member_of("ops"),
            RoleDefinition::new("app"),
            RoleDefinition::new("loop_a").member_of("loop_b"),
            RoleDefinition::new("loop_b").member_of("loop_a"),
        ])
    }

    #[test]
    fn test_attributes() {
        let c = catalog();
        assert!(c.is_superuser(&Identity::new("postgres")));
        assert!(!c.is_superuser(&Identity::new("repl")));
        assert!(c.has_replication(&Identity::new("repl")));
        assert!(!c.has_replication(&Identity::new("app")));
    }

    #[test]
    fn test_membership_is_transitive() {
        let c = catalog();
        assert!(c.is_member_of(&Identity::new("ops"), "mdb_replication"));
        assert!(c.is_member_of(&Identity::new("oncall"), "mdb_replication"));
        assert!(!c.is_member_of(&Identity::new("app"), "mdb_replication"));
    }

    #[test]
    fn test_membership_cycle_terminates() {
        let c = catalog();
        assert!(!c.is_member_of(&Identity::new("loop_a"), "mdb_replication"));
        assert!(c.is_member_of(&Identity::new("loop_a"), "loop_b"));
    }

    #[test]
    fn test_unknown_role_has_nothing() {
        let c = catalog();
        let ghost = Identity::new("ghost");
        assert!(!c.is_superuser(&ghost));
        assert!(!c.has_replication(&ghost));
        assert!(!c.is_member_of(&ghost, "mdb_replication"));
    }

    #[test]
    fn test_missing_target_role_grants_nothing() {
        let c = catalog();
        assert!(!c.is_member_of(&Identity::new("ops"), "does_not_exist"));
    }

    #[test]
    fn test_role_definition_from_json() {
        let def: RoleDefinition =
            serde_json::from_str(r#"{"name":"ops","member_of":["mdb_replication"]}"#).unwrap();
        assert_eq!(def.name, "ops");
        assert!(!def.superuser);
        assert_eq!(def.member_of, vec!["mdb_replication".to_string()]);
    }
}
