use thiserror::Error;
use tracing::debug;

use crate::{Permission, PolicyTable, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize `principal` for `required` against the policy table.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(
    policy: &PolicyTable,
    principal: &Principal,
    required: &Permission,
) -> Result<(), AuthzError> {
    if policy.allows(&principal.roles, required) {
        Ok(())
    } else {
        debug!(
            user_id = %principal.user_id,
            username = %principal.username,
            permission = %required,
            "authorization denied"
        );
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use stockroom_core::UserId;

    fn principal(roles: Vec<Role>) -> Principal {
        Principal::new(UserId::new(), "ana", roles)
    }

    #[test]
    fn admin_is_allowed_everything() {
        let policy = PolicyTable::default();
        assert!(authorize(&policy, &principal(vec![Role::ADMIN]), &Permission::CATEGORIES_DELETE).is_ok());
    }

    #[test]
    fn employee_cannot_delete_products() {
        let policy = PolicyTable::default();
        let err = authorize(&policy, &principal(vec![Role::EMPLOYEE]), &Permission::PRODUCTS_DELETE).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden("products.delete".to_string()));
    }

    #[test]
    fn principal_without_roles_is_denied() {
        let policy = PolicyTable::default();
        assert!(authorize(&policy, &principal(vec![]), &Permission::PRODUCTS_VIEW).is_err());
    }
}
