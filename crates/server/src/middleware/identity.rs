//! Caller identity extractors.
//!
//! Authentication happens upstream. The gateway in front of this service
//! sets `x-user-id` (UUID) and optionally `x-user-role` (`user` or `admin`,
//! default `user`) on every forwarded request.

use axum::{extract::FromRequestParts, http::request::Parts};

use checkout_core::{UserId, UserRole};

use crate::error::{AppError, set_sentry_user};

/// Header carrying the authenticated user's ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: UserRole,
}

fn identity_from_parts(parts: &Parts) -> Result<Identity, AppError> {
    let user_id = parts
        .headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("missing user identity".to_string()))?
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<UserId>().ok())
        .ok_or_else(|| AppError::Unauthorized("malformed user identity".to_string()))?;

    let role = match parts.headers.get(USER_ROLE_HEADER) {
        None => UserRole::User,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<UserRole>().ok())
            .ok_or_else(|| AppError::Unauthorized("malformed user role".to_string()))?,
    };

    set_sentry_user(&user_id);
    Ok(Identity { user_id, role })
}

/// Extractor that requires an authenticated user of any role.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(identity): RequireUser) -> String {
///     identity.user_id.to_string()
/// }
/// ```
pub struct RequireUser(pub Identity);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_parts(parts).map(Self)
    }
}

/// Extractor that requires an authenticated admin.
///
/// Rejects unauthenticated callers with 401 and non-admins with 403.
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_from_parts(parts)?;
        if !identity.role.is_admin() {
            tracing::warn!(user_id = %identity.user_id, "admin route denied");
            return Err(AppError::Forbidden("admin role required".to_string()));
        }
        Ok(Self(identity))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_require_user_reads_headers() {
        let id = UserId::new_v4();
        let mut p = parts(&[(USER_ID_HEADER, &id.to_string())]);
        let RequireUser(identity) = RequireUser::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(identity.user_id, id);
        assert_eq!(identity.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_identity_is_401() {
        let mut p = parts(&[]);
        let err = RequireUser::from_request_parts(&mut p, &()).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let mut p = parts(&[(USER_ID_HEADER, "not-a-uuid")]);
        let err = RequireUser::from_request_parts(&mut p, &()).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_require_admin_checks_role() {
        let id = UserId::new_v4().to_string();
        let mut p = parts(&[(USER_ID_HEADER, &id), (USER_ROLE_HEADER, "user")]);
        let err = RequireAdmin::from_request_parts(&mut p, &()).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));

        let mut p = parts(&[(USER_ID_HEADER, &id), (USER_ROLE_HEADER, "admin")]);
        assert!(RequireAdmin::from_request_parts(&mut p, &()).await.is_ok());
    }
}
