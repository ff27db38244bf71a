use axum::{http::StatusCode, Json};
use crate::models::ErrorResponse;
use crate::services::auth_service::UserIdentity;

const ADMIN_ROLE: &str = "admin";

pub fn is_admin(identity: &UserIdentity) -> bool {
    identity.roles.iter().any(|r| r == ADMIN_ROLE)
}

pub fn ensure_admin(identity: &UserIdentity) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if is_admin(identity) {
        return Ok(());
    }

    let status = StatusCode::FORBIDDEN;
    Err((status, Json(ErrorResponse {
        code: status.as_u16(),
        status: status.to_string(),
        error: "Admin access required".to_string(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_with_roles(roles: &[&str]) -> UserIdentity {
        UserIdentity {
            user_id: "u1".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn admin_role_passes() {
        assert!(ensure_admin(&identity_with_roles(&["admin"])).is_ok());
    }

    #[test]
    fn other_roles_are_rejected() {
        let err = ensure_admin(&identity_with_roles(&["editor"])).unwrap_err();
        assert_eq!(err.0, StatusCode::FORBIDDEN);
    }
}
