use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockroom_auth::{Principal, Role};
use stockroom_core::UserId;

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USERNAME_HEADER: &str = "x-username";
pub const ROLES_HEADER: &str = "x-roles";

/// Builds the [`PrincipalContext`] from gateway headers; 401 when absent or malformed.
pub async fn identity_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let principal = match extract_principal(req.headers()) {
        Ok(p) => p,
        Err(msg) => return json_error(StatusCode::UNAUTHORIZED, "unauthenticated", msg),
    };

    req.extensions_mut().insert(PrincipalContext::new(principal));
    next.run(req).await
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn extract_principal(headers: &HeaderMap) -> Result<Principal, &'static str> {
    let user_id: UserId = header(headers, USER_ID_HEADER)
        .ok_or("missing x-user-id header")?
        .parse()
        .map_err(|_| "x-user-id must be a UUID")?;
    let username = header(headers, USERNAME_HEADER).ok_or("missing x-username header")?;

    // Roles are optional: a caller without roles is authenticated but may do nothing.
    let roles = header(headers, ROLES_HEADER)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(|r| Role::new(r.to_string()))
                .collect()
        })
        .unwrap_or_default();

    Ok(Principal::new(user_id, username, roles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use stockroom_auth::{Permission, PolicyTable};

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn parses_identity_and_roles() {
        let id = UserId::new();
        let principal = extract_principal(&headers(&[
            (USER_ID_HEADER, &id.to_string()),
            (USERNAME_HEADER, "ana"),
            (ROLES_HEADER, "Employee, ,admin"),
        ]))
        .unwrap();
        assert_eq!(principal.user_id, id);
        assert_eq!(principal.username, "ana");
        assert_eq!(principal.roles, vec![Role::EMPLOYEE, Role::ADMIN]);
    }

    #[test]
    fn missing_or_bad_identity_is_rejected() {
        assert!(extract_principal(&headers(&[(USERNAME_HEADER, "ana")])).is_err());
        assert!(extract_principal(&headers(&[(USER_ID_HEADER, "nope"), (USERNAME_HEADER, "ana")])).is_err());
        let id = UserId::new().to_string();
        assert!(extract_principal(&headers(&[(USER_ID_HEADER, &id)])).is_err());
    }

    #[test]
    fn mixed_case_roles_match_a_loaded_policy() {
        let table = PolicyTable::from_json(r#"{"Auditor": ["products.view"]}"#).unwrap();
        let id = UserId::new().to_string();
        let principal = extract_principal(&headers(&[
            (USER_ID_HEADER, &id),
            (USERNAME_HEADER, "eva"),
            (ROLES_HEADER, "Auditor"),
        ]))
        .unwrap();
        assert!(table.allows(&principal.roles, &Permission::PRODUCTS_VIEW));
        assert!(!table.allows(&principal.roles, &Permission::PRODUCTS_ADD));
    }

    #[test]
    fn roles_header_is_optional() {
        let id = UserId::new().to_string();
        let principal = extract_principal(&headers(&[(USER_ID_HEADER, &id), (USERNAME_HEADER, "bob")])).unwrap();
        assert!(principal.roles.is_empty());
    }
}
