use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role name as asserted by the upstream identity provider.
///
/// Roles are opaque here; the [`PolicyTable`](crate::PolicyTable) maps them
/// to permissions. Names are case-insensitive and kept in lowercase, both when
/// asserted by the gateway and when loaded from a policy file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const EMPLOYEE: Role = Role(Cow::Borrowed("employee"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        if name.chars().any(char::is_uppercase) {
            Self(Cow::Owned(name.to_lowercase()))
        } else {
            Self(name)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.0.into_owned()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lowercased() {
        assert_eq!(Role::new("Auditor"), Role::new("auditor"));
        assert_eq!(Role::new("ADMIN"), Role::ADMIN);
        assert_eq!(Role::new("employee").as_str(), "employee");
    }

    #[test]
    fn deserialized_names_are_lowercased() {
        let role: Role = serde_json::from_str(r#""Employee""#).unwrap();
        assert_eq!(role, Role::EMPLOYEE);
        assert_eq!(serde_json::to_string(&role).unwrap(), r#""employee""#);
    }
}
