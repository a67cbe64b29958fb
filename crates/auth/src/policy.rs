//! Declarative role → permission table.
//!
//! Loaded once at startup and shared read-only. The JSON form is a plain
//! object keyed by role name:
//!
//! ```json
//! { "admin": ["*"], "employee": ["products.view", "movements.add"] }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Permission, Role};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid policy table: role '{0}' has an empty name or permission")]
    Blank(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyTable {
    roles: BTreeMap<Role, BTreeSet<Permission>>,
}

impl Default for PolicyTable {
    /// Built-in table: `admin` may do everything, `employee` may read the
    /// catalog and record or view stock movements.
    fn default() -> Self {
        Self::new()
            .grant(Role::ADMIN, [Permission::ALL])
            .grant(
                Role::EMPLOYEE,
                [
                    Permission::CATEGORIES_VIEW,
                    Permission::SUPPLIERS_VIEW,
                    Permission::PRODUCTS_VIEW,
                    Permission::MOVEMENTS_VIEW,
                    Permission::MOVEMENTS_ADD,
                ],
            )
    }
}

impl PolicyTable {
    /// Empty table; grants nothing.
    pub fn new() -> Self {
        Self {
            roles: BTreeMap::new(),
        }
    }

    pub fn grant(mut self, role: Role, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.roles.entry(role).or_default().extend(permissions);
        self
    }

    /// Role names differing only in case are merged into one lowercase role.
    pub fn from_json(raw: &str) -> Result<Self, PolicyError> {
        let entries: BTreeMap<String, BTreeSet<Permission>> = serde_json::from_str(raw)?;
        let mut table = Self::new();
        for (name, perms) in entries {
            if name.trim().is_empty() || perms.iter().any(|p| p.as_str().trim().is_empty()) {
                return Err(PolicyError::Blank(name));
            }
            table = table.grant(Role::new(name), perms);
        }
        Ok(table)
    }

    /// Union of the permissions of every role. Unknown roles contribute nothing.
    pub fn permissions_for(&self, roles: &[Role]) -> BTreeSet<Permission> {
        roles
            .iter()
            .filter_map(|r| self.roles.get(r))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn allows(&self, roles: &[Role], required: &Permission) -> bool {
        roles
            .iter()
            .filter_map(|r| self.roles.get(r))
            .flatten()
            .any(|p| p.is_wildcard() || p == required)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_admin_has_wildcard() {
        let table = PolicyTable::default();
        assert!(table.allows(&[Role::ADMIN], &Permission::PRODUCTS_DELETE));
        assert!(table.allows(&[Role::ADMIN], &Permission::new("anything.else")));
    }

    #[test]
    fn builtin_employee_reads_and_records_movements_only() {
        let table = PolicyTable::default();
        let roles = [Role::EMPLOYEE];
        assert!(table.allows(&roles, &Permission::PRODUCTS_VIEW));
        assert!(table.allows(&roles, &Permission::MOVEMENTS_ADD));
        assert!(!table.allows(&roles, &Permission::PRODUCTS_ADD));
        assert!(!table.allows(&roles, &Permission::CATEGORIES_DELETE));
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let table = PolicyTable::default();
        assert!(!table.allows(&[Role::new("auditor")], &Permission::PRODUCTS_VIEW));
        assert!(table.permissions_for(&[Role::new("auditor")]).is_empty());
    }

    #[test]
    fn permissions_union_across_roles() {
        let table = PolicyTable::new()
            .grant(Role::new("a"), [Permission::PRODUCTS_VIEW])
            .grant(Role::new("b"), [Permission::MOVEMENTS_ADD]);
        let perms = table.permissions_for(&[Role::new("a"), Role::new("b")]);
        assert_eq!(perms.len(), 2);
    }

    #[test]
    fn json_role_names_match_any_case() {
        let table = PolicyTable::from_json(r#"{"Auditor": ["products.view"]}"#).unwrap();
        assert!(table.allows(&[Role::new("auditor")], &Permission::PRODUCTS_VIEW));
        assert!(table.allows(&[Role::new("AUDITOR")], &Permission::PRODUCTS_VIEW));
        assert_eq!(table.roles().map(Role::as_str).collect::<Vec<_>>(), ["auditor"]);

        let merged = PolicyTable::from_json(r#"{"Auditor": ["products.view"], "auditor": ["movements.view"]}"#).unwrap();
        assert_eq!(merged.permissions_for(&[Role::new("auditor")]).len(), 2);
    }

    #[test]
    fn loads_from_json() {
        let table = PolicyTable::from_json(r#"{"auditor": ["movements.view"]}"#).unwrap();
        assert!(table.allows(&[Role::new("auditor")], &Permission::MOVEMENTS_VIEW));
        assert!(!table.allows(&[Role::ADMIN], &Permission::MOVEMENTS_VIEW));
    }

    #[test]
    fn rejects_malformed_json_and_blank_entries() {
        assert!(matches!(
            PolicyTable::from_json("[1, 2]"),
            Err(PolicyError::Parse(_))
        ));
        assert!(matches!(
            PolicyTable::from_json(r#"{"auditor": [" "]}"#),
            Err(PolicyError::Blank(_))
        ));
    }
}
