use stockroom_auth::{Principal, Role};
use stockroom_core::UserId;
use stockroom_ledger::Actor;

/// Identity of the caller for one request, as asserted by the gateway.
///
/// Immutable; inserted by [`crate::middleware::identity_middleware`] and
/// present for every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn username(&self) -> &str {
        &self.principal.username
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    /// Attribution recorded on stock movements.
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.principal.user_id,
            username: self.principal.username.clone(),
        }
    }
}
