//! # Session Principal
//!
//! The upstream session layer authenticates the shopper and forwards the
//! account as `X-User-*` headers. Requests without a usable principal are
//! rejected with 401 before any handler logic runs.

use crate::handlers::ApiError;
use axum::{extract::FromRequestParts, http::request::Parts};
use shop_core::{CheckoutError, Principal, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Extractor for the signed-in [`Principal`]
#[derive(Debug, Clone)]
pub struct SessionPrincipal(pub Principal);

impl<S> FromRequestParts<S> for SessionPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = header(USER_ID_HEADER)
            .ok_or_else(|| CheckoutError::Unauthenticated("no session".to_string()))?
            .parse::<i64>()
            .map_err(|_| CheckoutError::Unauthenticated("malformed user id".to_string()))?;

        let role: Role = header(USER_ROLE_HEADER)
            .ok_or_else(|| CheckoutError::Unauthenticated("no session role".to_string()))?
            .parse()?;

        let name = header(USER_NAME_HEADER).unwrap_or_default().to_string();
        let email = header(USER_EMAIL_HEADER).unwrap_or_default().to_string();

        Ok(SessionPrincipal(Principal::new(role, id, name, email)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<SessionPrincipal, ApiError> {
        let mut builder = Request::builder().uri("/create-order");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        SessionPrincipal::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_admin_principal() {
        let SessionPrincipal(principal) = extract(&[
            (USER_ID_HEADER, "3"),
            (USER_ROLE_HEADER, "Admin"),
            (USER_EMAIL_HEADER, "ops@example.com"),
        ])
        .await
        .unwrap();

        assert_eq!(principal.user_id(), 3);
        assert_eq!(principal.role(), Role::Admin);
        assert_eq!(principal.email(), "ops@example.com");
    }

    #[tokio::test]
    async fn test_malformed_session_is_rejected() {
        for headers in [
            vec![(USER_ROLE_HEADER, "user")],
            vec![(USER_ID_HEADER, "seven"), (USER_ROLE_HEADER, "user")],
            vec![(USER_ID_HEADER, "0"), (USER_ROLE_HEADER, "user")],
            vec![(USER_ID_HEADER, "7"), (USER_ROLE_HEADER, "guest")],
            vec![(USER_ID_HEADER, "7")],
        ] {
            let err = extract(&headers).await.unwrap_err();
            assert_eq!(err.0.status_code(), 401, "headers {:?}", headers);
        }
    }
}
